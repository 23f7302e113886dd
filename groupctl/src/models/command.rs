//! Command model

use serde::{Deserialize, Serialize};

/// A runnable script imported from a script definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub id: i64,

    pub name: String,

    #[serde(default)]
    pub title: String,

    /// Script path sent to devices as the `run` action, e.g. `tasks/task_dy_toker`
    pub script_ref: String,

    #[serde(default)]
    pub description: String,

    /// Original definition the command was imported from
    #[serde(default)]
    pub raw_content: String,

    #[serde(default)]
    pub order: i32,

    #[serde(default)]
    pub pinned: bool,
}

impl Command {
    pub fn new(name: impl Into<String>, script_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script_ref: script_ref.into(),
            ..Default::default()
        }
    }
}

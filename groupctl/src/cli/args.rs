//! Command line argument parsing
//!
//! Arguments use the `--key=value` form; a bare `--flag` is stored as
//! `"true"`. The first action flag found selects what the binary does.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, Context};

/// What the binary was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Version,
    Configure,
    Login,
    Logout,
    AddDevice,
    ListDevices,
    AddCommand,
    ListCommands,
    AddTask,
    ListTasks,
    Dispatch,
    Status,
    /// Run the service until interrupted
    Run,
}

const ACTIONS: &[(&str, Action)] = &[
    ("version", Action::Version),
    ("configure", Action::Configure),
    ("login", Action::Login),
    ("logout", Action::Logout),
    ("add-device", Action::AddDevice),
    ("list-devices", Action::ListDevices),
    ("add-command", Action::AddCommand),
    ("list-commands", Action::ListCommands),
    ("add-task", Action::AddTask),
    ("list-tasks", Action::ListTasks),
    ("dispatch", Action::Dispatch),
    ("status", Action::Status),
];

/// Parsed `--key=value` arguments
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    values: HashMap<String, String>,
}

impl CliArgs {
    /// Parse arguments, program name excluded
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = HashMap::new();
        for arg in args {
            let arg = arg.as_ref();
            if let Some((key, value)) = arg.split_once('=') {
                let clean_key = key.trim_start_matches('-');
                values.insert(clean_key.to_string(), value.to_string());
            } else if arg.starts_with("--") {
                let clean_key = arg.trim_start_matches('-');
                values.insert(clean_key.to_string(), "true".to_string());
            }
        }
        Self { values }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    pub fn action(&self) -> Action {
        ACTIONS
            .iter()
            .find(|(key, _)| self.values.contains_key(*key))
            .map(|(_, action)| *action)
            .unwrap_or(Action::Run)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> anyhow::Result<&str> {
        self.get(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| anyhow!("missing required argument --{}=<value>", key))
    }

    /// Parse an optional value
    pub fn parse_value<T>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .with_context(|| format!("invalid value for --{}: {:?}", key, raw))
            })
            .transpose()
    }
}

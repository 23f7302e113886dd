//! Task model and status transitions

use serde::{Deserialize, Serialize};

use crate::utils::now_millis;

/// Task status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    /// Created, never dispatched
    #[default]
    Pending,

    /// Dispatch in progress
    Running,

    /// Accepted by the server
    Completed,

    /// Rejected, unreachable server, or incomplete configuration
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether a persisted task may move from `self` to `next`.
    ///
    /// Finished tasks can be dispatched again or reset to pending. A running
    /// task can only finish.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Pending, TaskStatus::Running) => true,
            (TaskStatus::Running, TaskStatus::Completed | TaskStatus::Failed) => true,
            (TaskStatus::Completed | TaskStatus::Failed, TaskStatus::Running) => true,
            (TaskStatus::Completed | TaskStatus::Failed, TaskStatus::Pending) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(TaskStatus::Pending),
            "RUNNING" => Ok(TaskStatus::Running),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

/// A command bundled with target devices and a run duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: i64,

    pub name: String,

    #[serde(default)]
    pub remark: String,

    pub command_id: i64,

    /// Local device row IDs, in dispatch order
    #[serde(default)]
    pub device_ids: Vec<i64>,

    #[serde(default)]
    pub duration_hours: u32,

    #[serde(default)]
    pub duration_minutes: u32,

    #[serde(default)]
    pub status: TaskStatus,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// New pending task; duplicate device IDs are dropped, first one wins
    pub fn new(name: impl Into<String>, command_id: i64, device_ids: Vec<i64>) -> Self {
        let now = now_millis();
        let mut unique = Vec::with_capacity(device_ids.len());
        for id in device_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        Self {
            id: 0,
            name: name.into(),
            remark: String::new(),
            command_id,
            device_ids: unique,
            duration_hours: 0,
            duration_minutes: 0,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_duration(mut self, hours: u32, minutes: u32) -> Self {
        self.duration_hours = hours;
        self.duration_minutes = minutes;
        self
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }

    /// Run duration sent to devices
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.duration_hours) * 3600 + u64::from(self.duration_minutes) * 60
    }
}

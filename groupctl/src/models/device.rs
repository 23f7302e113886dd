//! Device model

use serde::{Deserialize, Serialize};

use crate::utils::now_millis;

/// A controlled device registered by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Local row ID
    #[serde(default)]
    pub id: i64,

    pub name: String,

    #[serde(default)]
    pub remark: String,

    /// Identifier the control server knows the device by
    pub device_id: String,

    #[serde(default)]
    pub status: DeviceStatus,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Device {
    pub fn new(name: impl Into<String>, device_id: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: 0,
            name: name.into(),
            remark: String::new(),
            device_id: device_id.into(),
            status: DeviceStatus::Offline,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }
}

/// Device connectivity as last reported by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    Online,
    #[default]
    Offline,
    Idle,
    Unknown,
}

impl DeviceStatus {
    /// Map a status string from the server
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "online" => DeviceStatus::Online,
            "offline" => DeviceStatus::Offline,
            "idle" => DeviceStatus::Idle,
            _ => DeviceStatus::Unknown,
        }
    }
}

//! Task dispatch payload

use serde::{Deserialize, Serialize};

/// Kind of action a device should perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Stop whatever the device is currently running
    Close,
    /// Run a script for a number of seconds
    Run,
}

/// One action in a device's action list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub action: String,
    pub second: u64,
}

/// Dispatch entry for a single device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDispatch {
    pub android_id: String,
    pub actions: Vec<DispatchAction>,
}

/// Build the dispatch body: every device first closes its current script,
/// then runs `action` for `total_seconds`.
pub fn dispatch_payload(
    device_ids: &[String],
    action: &str,
    total_seconds: u64,
) -> Vec<DeviceDispatch> {
    let actions = vec![
        DispatchAction {
            action_type: ActionType::Close,
            action: String::new(),
            second: 0,
        },
        DispatchAction {
            action_type: ActionType::Run,
            action: action.to_string(),
            second: total_seconds,
        },
    ];

    device_ids
        .iter()
        .map(|id| DeviceDispatch {
            android_id: id.clone(),
            actions: actions.clone(),
        })
        .collect()
}

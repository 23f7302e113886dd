//! Device status synchronization from health check responses

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::models::device::DeviceStatus;
use crate::repository::DeviceRepository;

/// Sends the registered device list with health checks and applies the
/// per-device status map the server returns (`{"<device_id>": "online", ...}`).
#[derive(Clone)]
pub struct DeviceStatusSync {
    devices: Arc<dyn DeviceRepository>,
}

impl DeviceStatusSync {
    pub fn new(devices: Arc<dyn DeviceRepository>) -> Self {
        Self { devices }
    }

    /// External IDs of every registered device
    pub async fn machines(&self) -> Vec<String> {
        match self.devices.list_devices().await {
            Ok(devices) => devices
                .into_iter()
                .map(|device| device.device_id)
                .filter(|id| !id.trim().is_empty())
                .collect(),
            Err(e) => {
                error!("Failed to list devices for health check: {}", e);
                Vec::new()
            }
        }
    }

    /// Apply a status map; returns how many devices changed
    pub async fn apply(&self, data: &Value) -> usize {
        let Some(statuses) = data.as_object() else {
            return 0;
        };

        let mut updated = 0;
        for (device_id, raw) in statuses {
            let status = DeviceStatus::from_remote(raw.as_str().unwrap_or("offline"));

            let device = match self.devices.device_by_external_id(device_id).await {
                Ok(Some(device)) => device,
                Ok(None) => {
                    debug!("Status for unknown device {} ignored", device_id);
                    continue;
                }
                Err(e) => {
                    error!("Failed to look up device {}: {}", device_id, e);
                    continue;
                }
            };

            match self.devices.set_device_status(device.id, status).await {
                Ok(true) => {
                    info!("Device {} is now {:?}", device_id, status);
                    updated += 1;
                }
                Ok(false) => {}
                Err(e) => error!("Failed to update status of device {}: {}", device_id, e),
            }
        }

        updated
    }
}

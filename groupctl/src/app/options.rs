//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workers::poller;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Run the health check poller
    pub enable_poller: bool,

    /// Send the device list with health checks and apply returned statuses
    pub report_devices: bool,

    /// Mark tasks left RUNNING by a previous process as FAILED on start
    pub reconcile_on_start: bool,

    /// How often the running service re-reads settings and session files
    pub config_reload_interval: Duration,

    /// Poller worker options
    pub poller: poller::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions::default(),
            enable_poller: true,
            report_devices: true,
            reconcile_on_start: true,
            config_reload_interval: Duration::from_secs(1),
            poller: poller::Options::default(),
        }
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.max_shutdown_delay_secs),
            },
            storage: StorageOptions { layout },
            enable_poller: settings.enable_poller,
            report_devices: settings.report_devices,
            reconcile_on_start: settings.reconcile_on_start,
            config_reload_interval: Duration::from_millis(settings.config_reload_ms.max(100)),
            ..Default::default()
        }
    }
}

/// Lifecycle options for the service
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}

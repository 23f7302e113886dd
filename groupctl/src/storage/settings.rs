//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;
use crate::models::config::ServerConfig;

/// Service settings, stored as `settings.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Also write a daily rolling log file under the storage `logs` directory
    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default)]
    pub json_logs: bool,

    /// Control server endpoint (`server_url`, `request_frequency`,
    /// `send_route`, `login_route` at the top level of the document)
    #[serde(flatten)]
    pub server: ServerConfig,

    /// Run the health check poller
    #[serde(default = "default_true")]
    pub enable_poller: bool,

    /// Send the registered device list with every health check and apply
    /// the returned statuses
    #[serde(default = "default_true")]
    pub report_devices: bool,

    /// Mark tasks left RUNNING by a previous process as FAILED at startup
    #[serde(default = "default_true")]
    pub reconcile_on_start: bool,

    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,

    /// How often a running service picks up edits made by CLI commands
    #[serde(default = "default_config_reload_ms")]
    pub config_reload_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_shutdown_delay() -> u64 {
    10
}

fn default_config_reload_ms() -> u64 {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_to_file: false,
            json_logs: false,
            server: ServerConfig::default(),
            enable_poller: true,
            report_devices: true,
            reconcile_on_start: true,
            max_shutdown_delay_secs: default_max_shutdown_delay(),
            config_reload_ms: default_config_reload_ms(),
        }
    }
}

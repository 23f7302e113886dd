//! Health status reporting

use std::fmt;

use control_protocol::ApiResponse;
use tokio::sync::watch;
use tracing::{info, warn};

/// Service health as shown to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Started, waiting for a usable server configuration
    Starting,

    /// Last health check succeeded
    Running,

    /// Last health check failed; polling continues
    Degraded { code: i64, message: String },

    /// The server rejected the session; polling has stopped until the next login
    AuthExpired { code: i64 },

    Stopped,
}

impl HealthStatus {
    /// Classify a health check response
    pub fn from_response(response: &ApiResponse) -> Self {
        if response.is_auth_failure() {
            HealthStatus::AuthExpired {
                code: response.code,
            }
        } else if response.is_healthy() {
            HealthStatus::Running
        } else {
            HealthStatus::Degraded {
                code: response.code,
                message: response.message.clone(),
            }
        }
    }

    /// Whether polling has ended on its own and needs user action
    pub fn is_terminal(&self) -> bool {
        matches!(self, HealthStatus::AuthExpired { .. })
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Starting => write!(f, "service starting"),
            HealthStatus::Running => write!(f, "running normally"),
            HealthStatus::Degraded { code, message } => write!(f, "abnormal ({}): {}", code, message),
            HealthStatus::AuthExpired { code } => {
                write!(f, "authentication expired ({}), please log in again", code)
            }
            HealthStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Receives health updates from the poller
pub trait HealthSink: Send + Sync {
    fn report(&self, status: HealthStatus);
}

/// Sink that keeps the latest status and lets the host observe it
pub struct StatusBoard {
    tx: watch::Sender<HealthStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(HealthStatus::Stopped),
        }
    }

    pub fn current(&self) -> HealthStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthSink for StatusBoard {
    fn report(&self, status: HealthStatus) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status.clone();
            true
        });

        if changed {
            match &status {
                HealthStatus::Degraded { .. } | HealthStatus::AuthExpired { .. } => {
                    warn!("Status: {}", status)
                }
                _ => info!("Status: {}", status),
            }
        }
    }
}

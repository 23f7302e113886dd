//! Service lifecycle
//!
//! Owns the cancellation scope the poller runs in, so whatever hosts the
//! service (daemon, CLI, OS service wrapper) can start and stop it as a unit.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::errors::ControlError;
use crate::status::{HealthSink, HealthStatus};
use crate::workers::poller::Poller;

pub struct ServiceController {
    poller: Arc<Poller>,
    sink: Arc<dyn HealthSink>,
    scope: Mutex<Option<CancellationToken>>,
    max_shutdown_delay: Duration,
}

impl ServiceController {
    pub fn new(poller: Arc<Poller>, sink: Arc<dyn HealthSink>, max_shutdown_delay: Duration) -> Self {
        Self {
            poller,
            sink,
            scope: Mutex::new(None),
            max_shutdown_delay,
        }
    }

    /// Start in a fresh scope; a previous scope is torn down first
    pub fn start(&self) {
        let mut scope = self.lock_scope();
        if let Some(previous) = scope.take() {
            info!("Service already running, restarting");
            previous.cancel();
        }

        let fresh = CancellationToken::new();
        self.sink.report(HealthStatus::Starting);
        self.poller.start(&fresh);
        *scope = Some(fresh);
        info!("Service started");
    }

    /// Cancel the scope and everything running in it. Safe to repeat.
    pub fn stop(&self) {
        let was_running = self.teardown();
        self.sink.report(HealthStatus::Stopped);
        if was_running {
            info!("Service stopped");
        }
    }

    /// Process teardown hook; cancels unconditionally
    pub fn on_teardown(&self) {
        self.teardown();
    }

    pub fn is_running(&self) -> bool {
        self.poller.is_running()
    }

    /// Stop and wait for the poller to exit, bounded by the shutdown delay
    pub async fn shutdown(&self) -> Result<(), ControlError> {
        self.stop();
        match tokio::time::timeout(self.max_shutdown_delay, self.poller.join()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                error!(
                    "Poller did not stop within {:?}",
                    self.max_shutdown_delay
                );
                Err(ControlError::ShutdownError(format!(
                    "poller did not stop within {:?}",
                    self.max_shutdown_delay
                )))
            }
        }
    }

    fn teardown(&self) -> bool {
        let previous = self.lock_scope().take();
        self.poller.stop();
        match previous {
            Some(scope) => {
                scope.cancel();
                true
            }
            None => false,
        }
    }

    fn lock_scope(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.scope.lock().unwrap_or_else(|e| e.into_inner())
    }
}

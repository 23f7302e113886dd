//! Health check poller
//!
//! A supervisor task follows the [`ConfigStore`] and runs at most one polling
//! loop at a time against the latest pollable configuration. Every loop is
//! tagged with a generation; when the configuration changes the running loop
//! is cancelled and awaited before the next generation starts, and results
//! from a superseded generation are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use control_protocol::ApiResponse;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::store::ConfigStore;
use crate::http::api::ControlApi;
use crate::models::config::ServerConfig;
use crate::status::{HealthSink, HealthStatus};
use crate::sync::device_status::DeviceStatusSync;

/// Poller options
#[derive(Debug, Clone)]
pub struct Options {
    /// Lower bound for the wait between checks, whatever the configured
    /// request frequency says
    pub min_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
        }
    }
}

struct Shared {
    config: Arc<ConfigStore>,
    api: Arc<dyn ControlApi>,
    sink: Arc<dyn HealthSink>,
    device_sync: Option<DeviceStatusSync>,
    options: Options,
}

#[derive(Default)]
struct State {
    token: Option<CancellationToken>,
    supervisor: Option<JoinHandle<()>>,
}

/// Background health check poller
pub struct Poller {
    shared: Arc<Shared>,
    state: Mutex<State>,
}

/// Identity of one polling loop
struct LoopHandle {
    generation: u64,
    current: Arc<AtomicU64>,
    cancel: CancellationToken,
    poller: CancellationToken,
}

impl LoopHandle {
    fn is_stale(&self) -> bool {
        self.cancel.is_cancelled() || self.current.load(Ordering::SeqCst) != self.generation
    }
}

impl Poller {
    pub fn new(
        config: Arc<ConfigStore>,
        api: Arc<dyn ControlApi>,
        sink: Arc<dyn HealthSink>,
        device_sync: Option<DeviceStatusSync>,
        options: Options,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                api,
                sink,
                device_sync,
                options,
            }),
            state: Mutex::new(State::default()),
        }
    }

    /// Start polling inside `scope`. Any previous run is cancelled first.
    pub fn start(&self, scope: &CancellationToken) {
        let mut state = self.lock_state();
        if let Some(previous) = state.token.take() {
            debug!("Cancelling previous poller run");
            previous.cancel();
        }

        let token = scope.child_token();
        let supervisor = tokio::spawn(self.shared.clone().supervise(token.clone()));
        state.token = Some(token);
        state.supervisor = Some(supervisor);
        info!("Poller started");
    }

    /// Cancel the active loop and its pending wait. No-op when not running.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        if let Some(token) = state.token.take() {
            token.cancel();
            info!("Poller stopped");
        }
    }

    /// Whether a run is active. Turns false after an authentication failure.
    pub fn is_running(&self) -> bool {
        self.lock_state()
            .token
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Wait for the supervisor task of the last run to exit
    pub async fn join(&self) {
        let supervisor = self.lock_state().supervisor.take();
        if let Some(handle) = supervisor {
            if let Err(e) = handle.await {
                error!("Poller supervisor ended abnormally: {}", e);
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Shared {
    async fn supervise(self: Arc<Self>, token: CancellationToken) {
        let mut config_rx = self.config.subscribe();
        let current = Arc::new(AtomicU64::new(0));
        let mut active: Option<(CancellationToken, JoinHandle<()>)> = None;

        loop {
            let config = config_rx.borrow_and_update().clone();

            if let Some((cancel, handle)) = active.take() {
                cancel.cancel();
                let _ = handle.await;
            }

            let generation = current.fetch_add(1, Ordering::SeqCst) + 1;
            if config.is_pollable() {
                info!(
                    generation,
                    "Polling {} every {}ms",
                    config.send_url(),
                    config.request_frequency_ms
                );
                let handle = LoopHandle {
                    generation,
                    current: current.clone(),
                    cancel: token.child_token(),
                    poller: token.clone(),
                };
                let cancel = handle.cancel.clone();
                let task = tokio::spawn(self.clone().poll_loop(config, handle));
                active = Some((cancel, task));
            } else {
                info!("Server URL or send route not configured, waiting for configuration");
                self.sink.report(HealthStatus::Starting);
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        debug!("Config store dropped, poller exiting");
                        break;
                    }
                }
            }
        }

        if let Some((cancel, handle)) = active.take() {
            cancel.cancel();
            let _ = handle.await;
        }
        debug!("Poller supervisor exited");
    }

    async fn poll_loop(self: Arc<Self>, config: ServerConfig, handle: LoopHandle) {
        let interval = config.request_frequency().max(self.options.min_interval);

        loop {
            if handle.is_stale() {
                return;
            }

            let token = self.config.token();
            let machines = match &self.device_sync {
                Some(sync) => Some(sync.machines().await),
                None => None,
            };

            let response = tokio::select! {
                biased;
                _ = handle.cancel.cancelled() => return,
                response = self.api.check_health(&config, token.as_deref(), machines.as_deref()) => response,
            };

            if handle.is_stale() {
                debug!(generation = handle.generation, "Discarding stale health check result");
                return;
            }

            if response.is_auth_failure() {
                let rejected = token.as_deref().unwrap_or_default();
                if self.on_auth_failure(&response, &handle, rejected).await {
                    return;
                }
            } else if response.is_healthy() {
                self.sink.report(HealthStatus::Running);
                if let (Some(sync), Some(data)) = (&self.device_sync, &response.data) {
                    sync.apply(data).await;
                }
            } else {
                warn!(code = response.code, "Health check failed: {}", response.message);
                self.sink.report(HealthStatus::Degraded {
                    code: response.code,
                    message: response.message,
                });
            }

            tokio::select! {
                biased;
                _ = handle.cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Returns `true` if the poller stopped, `false` if a newer login
    /// replaced the rejected token and polling goes on with it
    async fn on_auth_failure(
        &self,
        response: &ApiResponse,
        handle: &LoopHandle,
        rejected: &str,
    ) -> bool {
        match self.config.clear_token(rejected).await {
            Ok(false) => {
                info!(code = response.code, "Rejected token was already replaced by a new login");
                return false;
            }
            Ok(true) => {}
            Err(e) => error!("Failed to persist cleared session token: {}", e),
        }

        warn!(
            code = response.code,
            "Session rejected by server, token cleared and poller stopped"
        );
        self.sink.report(HealthStatus::AuthExpired {
            code: response.code,
        });
        handle.poller.cancel();
        true
    }
}

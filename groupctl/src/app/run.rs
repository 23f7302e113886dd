//! Main application run loop

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::ControlError;
use crate::status::HealthStatus;

/// Run the group control service until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ControlError> {
    info!("Initializing group control service...");

    let state = AppState::init(&options).await?;
    serve(&state, &options, shutdown_signal).await
}

/// Run an already wired service until `shutdown_signal` resolves
pub async fn serve(
    state: &AppState,
    options: &AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send,
) -> Result<(), ControlError> {
    if options.reconcile_on_start {
        match state.dispatcher.reconcile_stale().await {
            Ok(0) => {}
            Ok(count) => warn!("Marked {} interrupted task(s) as failed", count),
            Err(e) => error!("Failed to reconcile interrupted tasks: {}", e),
        }
    }

    let scope = CancellationToken::new();
    let watcher = {
        let config = state.config.clone();
        let cancel = scope.clone();
        let interval = options.config_reload_interval;
        tokio::spawn(async move { config.watch_files(interval, cancel).await })
    };

    if options.enable_poller {
        state.controller.start();
    } else {
        info!("Poller disabled, not checking server health");
    }

    let mut session_rx = state.config.subscribe_session();
    let mut status_rx = state.status.subscribe();
    tokio::pin!(shutdown_signal);
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => break,
            Ok(()) = session_rx.changed() => {}
            Ok(()) = status_rx.changed() => {}
        }
        if options.enable_poller {
            resume_after_login(state);
        }
    }
    info!("Shutdown signal received, shutting down...");

    scope.cancel();
    let _ = watcher.await;
    state.controller.shutdown().await?;
    if let Err(e) = state.store.flush().await {
        error!("Failed to save local state: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

/// The poller stops itself when the server rejects the session; start it
/// again once a usable session shows up
fn resume_after_login(state: &AppState) {
    let expired = matches!(state.status.current(), HealthStatus::AuthExpired { .. });
    if expired && state.config.session().is_authenticated() {
        info!("New session available, resuming polling");
        state.controller.start();
    }
}

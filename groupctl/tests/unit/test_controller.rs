//! Service controller tests

use std::sync::Arc;
use std::time::Duration;

use groupctl::service::controller::ServiceController;
use groupctl::status::{HealthStatus, StatusBoard};
use groupctl::workers::poller::{Options, Poller};

use crate::mocks::{config_store, logged_in, server_config, MockApi};

fn controller() -> (ServiceController, Arc<MockApi>, Arc<StatusBoard>) {
    let config = config_store(server_config("https://x", 5000), logged_in());
    let api = MockApi::new();
    let board = Arc::new(StatusBoard::new());
    let poller = Arc::new(Poller::new(
        config,
        api.clone(),
        board.clone(),
        None,
        Options::default(),
    ));
    let controller = ServiceController::new(poller, board.clone(), Duration::from_secs(5));
    (controller, api, board)
}

async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_stop_start() {
    let (controller, api, board) = controller();

    controller.start();
    advance(1_000).await;
    assert!(controller.is_running());
    assert_eq!(api.health_calls().len(), 1);
    assert_eq!(board.current(), HealthStatus::Running);

    controller.stop();
    assert!(!controller.is_running());
    assert_eq!(board.current(), HealthStatus::Stopped);
    advance(20_000).await;
    assert_eq!(api.health_calls().len(), 1);

    controller.start();
    advance(1_000).await;
    assert!(controller.is_running());
    assert_eq!(api.health_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_start_keeps_one_loop() {
    let (controller, api, _) = controller();

    controller.start();
    controller.start();
    controller.start();
    advance(12_000).await;

    assert_eq!(api.health_calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_start() {
    let (controller, api, board) = controller();

    controller.stop();
    controller.stop();
    assert!(!controller.is_running());
    assert_eq!(board.current(), HealthStatus::Stopped);
    assert!(api.health_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_on_teardown_cancels() {
    let (controller, api, _) = controller();

    controller.start();
    advance(1_000).await;
    controller.on_teardown();
    advance(20_000).await;

    assert!(!controller.is_running());
    assert_eq!(api.health_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_poller() {
    let (controller, _, board) = controller();

    controller.start();
    advance(1_000).await;
    controller.shutdown().await.unwrap();

    assert!(!controller.is_running());
    assert_eq!(board.current(), HealthStatus::Stopped);
}

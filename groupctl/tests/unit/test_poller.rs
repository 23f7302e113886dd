//! Poller tests, run on paused tokio time

use std::sync::Arc;
use std::time::Duration;

use control_protocol::ApiResponse;
use groupctl::config::store::ConfigStore;
use groupctl::models::config::{ServerConfig, Session};
use groupctl::models::device::DeviceStatus;
use groupctl::repository::DeviceRepository;
use groupctl::status::{HealthStatus, StatusBoard};
use groupctl::sync::device_status::DeviceStatusSync;
use groupctl::workers::poller::{Options, Poller};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::mocks::{config_store, logged_in, seeded_store, server_config, MockApi};

struct Harness {
    config: Arc<ConfigStore>,
    api: Arc<MockApi>,
    board: Arc<StatusBoard>,
    poller: Poller,
    scope: CancellationToken,
}

fn harness(config: ServerConfig, session: Session) -> Harness {
    let config = config_store(config, session);
    let api = MockApi::new();
    let board = Arc::new(StatusBoard::new());
    let poller = Poller::new(
        config.clone(),
        api.clone(),
        board.clone(),
        None,
        Options::default(),
    );
    Harness {
        config,
        api,
        board,
        poller,
        scope: CancellationToken::new(),
    }
}

async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[tokio::test(start_paused = true)]
async fn test_incomplete_config_makes_no_calls() {
    let h = harness(ServerConfig::default(), logged_in());
    h.poller.start(&h.scope);
    advance(20_000).await;

    assert!(h.api.health_calls().is_empty());
    assert_eq!(h.board.current(), HealthStatus::Starting);

    let mut no_route = server_config("https://x", 5000);
    no_route.send_route = String::new();
    h.config.update_config(no_route).await.unwrap();
    advance(20_000).await;
    assert!(h.api.health_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_without_token_stops_after_one_call() {
    let h = harness(server_config("https://x", 5000), Session::default());
    h.api.set_health(ApiResponse::new(401, "unauthorized"));

    h.poller.start(&h.scope);
    advance(30_000).await;

    let calls = h.api.health_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, "https://x/api/send");
    assert_eq!(calls[0].token, None);
    assert_eq!(h.board.current(), HealthStatus::AuthExpired { code: 401 });
    assert!(h.board.current().is_terminal());
    assert!(!h.poller.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_clears_token() {
    let h = harness(server_config("https://x", 5000), logged_in());
    h.api.push_health(ApiResponse::new(0, "ok"));
    h.api.set_health(ApiResponse::new(402, "expired"));

    h.poller.start(&h.scope);
    advance(30_000).await;

    let calls = h.api.health_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].token.as_deref(), Some("tok"));
    assert!(!h.config.session().is_authenticated());
    assert_eq!(h.config.session().username, "alice");
    assert_eq!(h.board.current(), HealthStatus::AuthExpired { code: 402 });
}

#[tokio::test(start_paused = true)]
async fn test_rejected_token_replaced_mid_request_keeps_polling() {
    let h = harness(server_config("https://x", 5000), logged_in());
    h.api.set_health_delay(Duration::from_millis(1_000));
    h.api.push_health(ApiResponse::new(401, "unauthorized"));

    h.poller.start(&h.scope);
    advance(500).await;
    h.config
        .set_session(Session::new("tok2", "alice"))
        .await
        .unwrap();
    advance(7_000).await;

    let calls = h.api.health_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].token.as_deref(), Some("tok"));
    assert_eq!(calls[1].token.as_deref(), Some("tok2"));
    assert_eq!(h.config.token().as_deref(), Some("tok2"));
    assert!(h.poller.is_running());
    assert_eq!(h.board.current(), HealthStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_failures_keep_polling() {
    let h = harness(server_config("https://x", 5000), logged_in());
    h.api.set_health(ApiResponse::new(500, "internal error"));

    h.poller.start(&h.scope);
    advance(12_000).await;

    let calls = h.api.health_calls();
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        let gap = pair[1].at - pair[0].at;
        assert!(gap >= Duration::from_secs(5) && gap < Duration::from_millis(5_010));
    }
    assert_eq!(
        h.board.current(),
        HealthStatus::Degraded {
            code: 500,
            message: "internal error".to_string()
        }
    );
    assert!(h.poller.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_network_errors_keep_polling() {
    let h = harness(server_config("https://x", 1000), logged_in());
    h.api.set_health(ApiResponse::network_error("connection refused"));

    h.poller.start(&h.scope);
    advance(2_500).await;

    assert_eq!(h.api.health_calls().len(), 3);
    assert!(matches!(h.board.current(), HealthStatus::Degraded { code: -1, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_failure() {
    let h = harness(server_config("https://x", 1000), logged_in());
    h.api.push_health(ApiResponse::new(503, "unavailable"));
    h.api.set_health(ApiResponse::new(200, "OK"));

    h.poller.start(&h.scope);
    advance(500).await;
    assert!(matches!(h.board.current(), HealthStatus::Degraded { code: 503, .. }));

    advance(1_000).await;
    assert_eq!(h.board.current(), HealthStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_config_change_restarts_loop() {
    let h = harness(server_config("https://a", 5000), logged_in());

    h.poller.start(&h.scope);
    advance(1_000).await;
    h.config
        .update_config(server_config("https://b", 5000))
        .await
        .unwrap();
    advance(11_500).await;

    let urls: Vec<String> = h.api.health_calls().into_iter().map(|c| c.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://a/api/send",
            "https://b/api/send",
            "https://b/api/send",
            "https://b/api/send"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_identical_config_does_not_restart() {
    let h = harness(server_config("https://a", 5000), logged_in());

    h.poller.start(&h.scope);
    advance(1_000).await;
    let changed = h
        .config
        .update_config(server_config("https://a", 5000))
        .await
        .unwrap();
    assert!(!changed);
    advance(1_000).await;

    assert_eq!(h.api.health_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let h = harness(server_config("https://x", 5000), logged_in());

    h.poller.start(&h.scope);
    advance(1_000).await;
    assert_eq!(h.api.health_calls().len(), 1);

    h.poller.stop();
    h.poller.stop();
    h.poller.join().await;
    advance(20_000).await;

    assert_eq!(h.api.health_calls().len(), 1);
    assert!(!h.poller.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_start_is_noop() {
    let h = harness(server_config("https://x", 5000), logged_in());
    h.poller.stop();
    h.poller.join().await;
    assert!(!h.poller.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_restart_runs_single_loop() {
    let h = harness(server_config("https://x", 5000), logged_in());

    h.poller.start(&h.scope);
    h.poller.start(&h.scope);
    advance(12_000).await;

    assert_eq!(h.api.health_calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_scope_cancellation_stops_poller() {
    let h = harness(server_config("https://x", 5000), logged_in());

    h.poller.start(&h.scope);
    advance(1_000).await;
    h.scope.cancel();
    advance(20_000).await;

    assert_eq!(h.api.health_calls().len(), 1);
    assert!(!h.poller.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_zero_frequency_is_floored() {
    let h = harness(server_config("https://x", 0), logged_in());

    h.poller.start(&h.scope);
    advance(1_050).await;

    assert_eq!(h.api.health_calls().len(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_device_statuses_are_reported_and_applied() {
    let (store, _) = seeded_store().await;
    let config = config_store(server_config("https://x", 5000), logged_in());
    let api = MockApi::new();
    api.set_health(ApiResponse::new(0, "ok").with_data(json!({"dev-1": "online", "dev-9": "online"})));
    let board = Arc::new(StatusBoard::new());
    let poller = Poller::new(
        config,
        api.clone(),
        board,
        Some(DeviceStatusSync::new(store.clone())),
        Options::default(),
    );

    let scope = CancellationToken::new();
    poller.start(&scope);
    advance(1_000).await;

    let calls = api.health_calls();
    assert_eq!(
        calls[0].machines,
        Some(vec!["dev-1".to_string(), "dev-2".to_string()])
    );

    let dev1 = store.device_by_external_id("dev-1").await.unwrap().unwrap();
    let dev2 = store.device_by_external_id("dev-2").await.unwrap().unwrap();
    assert_eq!(dev1.status, DeviceStatus::Online);
    assert_eq!(dev2.status, DeviceStatus::Offline);
}

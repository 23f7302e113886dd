//! Session manager tests

use control_protocol::ApiResponse;
use groupctl::authn::session::SessionManager;
use groupctl::errors::ControlError;
use groupctl::models::config::{ServerConfig, Session};
use groupctl::status::HealthStatus;
use secrecy::SecretString;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};

use crate::mocks::{config_store, logged_in, server_config, MockApi};

fn password(raw: &str) -> SecretString {
    SecretString::from(raw.to_string())
}

#[tokio::test]
async fn test_login_stores_session() {
    let config = config_store(server_config("https://x", 5000), Session::default());
    let api = MockApi::new();
    api.set_login(ApiResponse::new(0, "welcome").with_data(json!({"access_token": "t-9"})));
    let sessions = SessionManager::new(config.clone(), api.clone());

    let session = assert_ok!(sessions.login(" alice ", &password("secret")).await);

    assert_eq!(session, Session::new("t-9", "alice"));
    assert_eq!(config.session(), session);
    assert_eq!(config.token().as_deref(), Some("t-9"));

    let calls = api.login_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].url, "https://x/api/login");
    assert_eq!(calls[0].username, "alice");
    assert_eq!(calls[0].password, "secret");
}

#[tokio::test]
async fn test_login_rejected() {
    let config = config_store(server_config("https://x", 5000), Session::default());
    let api = MockApi::new();
    api.set_login(ApiResponse::new(1, "wrong password"));
    let sessions = SessionManager::new(config.clone(), api);

    let err = assert_err!(sessions.login("alice", &password("nope")).await);

    assert!(matches!(&err, ControlError::AuthError(message) if message == "wrong password"));
    assert_eq!(err.user_message(), "wrong password");
    assert!(!config.session().is_authenticated());
}

#[tokio::test]
async fn test_login_without_token_in_response() {
    let config = config_store(server_config("https://x", 5000), Session::default());
    let api = MockApi::new();
    api.set_login(ApiResponse::new(0, "ok"));
    let sessions = SessionManager::new(config.clone(), api);

    let err = assert_err!(sessions.login("alice", &password("secret")).await);
    assert!(matches!(err, ControlError::AuthError(_)));
    assert!(!config.session().is_authenticated());
}

#[tokio::test]
async fn test_login_requires_route() {
    let mut server = server_config("https://x", 5000);
    server.login_route = String::new();
    let api = MockApi::new();
    let sessions = SessionManager::new(config_store(server, Session::default()), api.clone());

    let err = sessions.login("alice", &password("secret")).await.unwrap_err();
    assert!(matches!(err, ControlError::ConfigError(_)));
    assert!(api.login_calls().is_empty());

    let sessions = SessionManager::new(
        config_store(ServerConfig::default(), Session::default()),
        api.clone(),
    );
    assert!(sessions.login("alice", &password("secret")).await.is_err());
    assert!(api.login_calls().is_empty());
}

#[tokio::test]
async fn test_logout_clears_session() {
    let config = config_store(server_config("https://x", 5000), Session::new("tok", "alice"));
    let sessions = SessionManager::new(config.clone(), MockApi::new());

    assert_ok!(sessions.logout().await);
    assert_eq!(config.session(), Session::default());
}

#[tokio::test]
async fn test_check_health_clears_rejected_token() {
    let config = config_store(server_config("https://x", 5000), logged_in());
    let api = MockApi::new();
    api.set_health(ApiResponse::new(401, "unauthorized"));
    let sessions = SessionManager::new(config.clone(), api.clone());

    let health = assert_ok!(sessions.check_health().await);

    assert_eq!(health, HealthStatus::AuthExpired { code: 401 });
    assert_eq!(api.health_calls()[0].token.as_deref(), Some("tok"));
    assert!(!config.session().is_authenticated());
    assert_eq!(config.session().username, "alice");
}

#[tokio::test]
async fn test_check_health_keeps_accepted_token() {
    let config = config_store(server_config("https://x", 5000), logged_in());
    let api = MockApi::new();
    let sessions = SessionManager::new(config.clone(), api.clone());

    assert_eq!(assert_ok!(sessions.check_health().await), HealthStatus::Running);
    assert_eq!(config.token().as_deref(), Some("tok"));

    let unconfigured = SessionManager::new(
        config_store(ServerConfig::default(), logged_in()),
        api.clone(),
    );
    let err = assert_err!(unconfigured.check_health().await);
    assert!(matches!(err, ControlError::ConfigIncomplete));
    assert_eq!(api.health_calls().len(), 1);
}

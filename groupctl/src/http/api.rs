//! Control server API

use async_trait::async_trait;
use control_protocol::{
    ApiResponse, DeviceDispatch, HealthCheckRequest, LoginRequest, MessageDefaults,
};
use secrecy::{ExposeSecret, SecretString};

use crate::http::client::HttpClient;
use crate::models::config::ServerConfig;

pub const HEALTH_MESSAGES: MessageDefaults = MessageDefaults::new("ok", "request failed");
pub const LOGIN_MESSAGES: MessageDefaults = MessageDefaults::new("login succeeded", "login failed");
pub const DISPATCH_MESSAGES: MessageDefaults =
    MessageDefaults::new("task dispatched", "task dispatch failed");

/// Calls against the control server.
///
/// Every call returns a normalized [`ApiResponse`]; transport failures are
/// reported as code `-1` rather than as errors.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// `POST {server_url}{send_route}` with an optional device list
    async fn check_health(
        &self,
        config: &ServerConfig,
        token: Option<&str>,
        machines: Option<&[String]>,
    ) -> ApiResponse;

    /// `POST {server_url}{login_route}`
    async fn login(
        &self,
        config: &ServerConfig,
        username: &str,
        password: &SecretString,
    ) -> ApiResponse;

    /// `POST {server_url}{send_route}` with one entry per device
    async fn dispatch(
        &self,
        config: &ServerConfig,
        token: &str,
        payload: &[DeviceDispatch],
    ) -> ApiResponse;
}

#[async_trait]
impl ControlApi for HttpClient {
    async fn check_health(
        &self,
        config: &ServerConfig,
        token: Option<&str>,
        machines: Option<&[String]>,
    ) -> ApiResponse {
        let body = machines.map(|machines| HealthCheckRequest {
            machines: machines.to_vec(),
        });
        self.post(&config.send_url(), token, body.as_ref(), HEALTH_MESSAGES)
            .await
    }

    async fn login(
        &self,
        config: &ServerConfig,
        username: &str,
        password: &SecretString,
    ) -> ApiResponse {
        let body = LoginRequest {
            mobile: username,
            password: password.expose_secret(),
        };
        self.post(&config.login_url(), None, Some(&body), LOGIN_MESSAGES)
            .await
    }

    async fn dispatch(
        &self,
        config: &ServerConfig,
        token: &str,
        payload: &[DeviceDispatch],
    ) -> ApiResponse {
        self.post(&config.send_url(), Some(token), Some(payload), DISPATCH_MESSAGES)
            .await
    }
}

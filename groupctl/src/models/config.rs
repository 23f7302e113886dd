//! Server configuration and session

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_REQUEST_FREQUENCY_MS: u64 = 5000;
pub const DEFAULT_SEND_ROUTE: &str = "/api/send";
pub const DEFAULT_LOGIN_ROUTE: &str = "/api/login";

/// Control server endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. `https://control.example.com`
    #[serde(default)]
    pub server_url: String,

    /// Health check interval in milliseconds
    #[serde(rename = "request_frequency", default = "default_request_frequency")]
    pub request_frequency_ms: u64,

    /// Route for health checks and task dispatch
    #[serde(default = "default_send_route")]
    pub send_route: String,

    #[serde(default = "default_login_route")]
    pub login_route: String,
}

fn default_request_frequency() -> u64 {
    DEFAULT_REQUEST_FREQUENCY_MS
}

fn default_send_route() -> String {
    DEFAULT_SEND_ROUTE.to_string()
}

fn default_login_route() -> String {
    DEFAULT_LOGIN_ROUTE.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            request_frequency_ms: DEFAULT_REQUEST_FREQUENCY_MS,
            send_route: default_send_route(),
            login_route: default_login_route(),
        }
    }
}

impl ServerConfig {
    /// Both the server URL and the send route are set
    pub fn is_pollable(&self) -> bool {
        !self.server_url.trim().is_empty() && !self.send_route.trim().is_empty()
    }

    pub fn can_login(&self) -> bool {
        !self.server_url.trim().is_empty() && !self.login_route.trim().is_empty()
    }

    pub fn send_url(&self) -> String {
        format!("{}{}", self.server_url, self.send_route)
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.server_url, self.login_route)
    }

    pub fn request_frequency(&self) -> Duration {
        Duration::from_millis(self.request_frequency_ms)
    }
}

/// Logged-in user session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "auth_token", default)]
    pub token: String,

    #[serde(default)]
    pub username: String,
}

impl Session {
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// The token, or `None` when unauthenticated
    pub fn token(&self) -> Option<&str> {
        self.is_authenticated().then_some(self.token.as_str())
    }
}

//! Login and logout against the control server

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::store::ConfigStore;
use crate::errors::ControlError;
use crate::http::api::ControlApi;
use crate::models::config::Session;
use crate::status::HealthStatus;

/// Keeps the session in the [`ConfigStore`] in step with the server
pub struct SessionManager {
    config: Arc<ConfigStore>,
    api: Arc<dyn ControlApi>,
}

impl SessionManager {
    pub fn new(config: Arc<ConfigStore>, api: Arc<dyn ControlApi>) -> Self {
        Self { config, api }
    }

    /// Log in and store the returned token with the username
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Session, ControlError> {
        let config = self.config.config();
        if !config.can_login() {
            return Err(ControlError::ConfigError(
                "server URL and login route must be set before logging in".to_string(),
            ));
        }
        if username.trim().is_empty() {
            return Err(ControlError::AuthError("username is required".to_string()));
        }

        let response = self.api.login(&config, username.trim(), password).await;
        if !response.is_success() {
            warn!(code = response.code, "Login rejected: {}", response.message);
            return Err(ControlError::AuthError(response.message));
        }

        let token = response
            .data
            .as_ref()
            .and_then(extract_token)
            .ok_or_else(|| ControlError::AuthError("login response carried no token".to_string()))?;

        let session = Session::new(token, username.trim());
        self.config.set_session(session.clone()).await?;
        info!("Logged in as {}", session.username);
        Ok(session)
    }

    /// One health check with the stored token. A token the server rejects
    /// is cleared, as the poller would.
    pub async fn check_health(&self) -> Result<HealthStatus, ControlError> {
        let config = self.config.config();
        if !config.is_pollable() {
            return Err(ControlError::ConfigIncomplete);
        }

        let token = self.config.token();
        let response = self
            .api
            .check_health(&config, token.as_deref(), None)
            .await;
        if response.is_auth_failure() {
            if let Some(rejected) = token.as_deref() {
                if self.config.clear_token(rejected).await? {
                    warn!(code = response.code, "Stored session token rejected and cleared");
                }
            }
        }
        Ok(HealthStatus::from_response(&response))
    }

    /// Forget token and username
    pub async fn logout(&self) -> Result<(), ControlError> {
        self.config.clear_session().await?;
        info!("Logged out");
        Ok(())
    }
}

/// The token is either `data` itself or its `token` / `access_token` field
fn extract_token(data: &Value) -> Option<String> {
    let token = match data {
        Value::String(token) => Some(token.as_str()),
        Value::Object(fields) => fields
            .get("token")
            .or_else(|| fields.get("access_token"))
            .and_then(Value::as_str),
        _ => None,
    }?;

    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

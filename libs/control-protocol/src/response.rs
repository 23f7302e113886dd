//! Normalized response envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Application-level success code
pub const SUCCESS_CODE: i64 = 0;

/// Code used when the request never produced an HTTP response
pub const NETWORK_ERROR_CODE: i64 = -1;

/// Codes the server uses to signal an invalid or expired session
pub const AUTH_FAILURE_CODES: [i64; 2] = [401, 402];

/// Fallback messages used when the server does not supply one
#[derive(Debug, Clone, Copy)]
pub struct MessageDefaults {
    pub success: &'static str,
    pub failure: &'static str,
}

impl MessageDefaults {
    pub const fn new(success: &'static str, failure: &'static str) -> Self {
        Self { success, failure }
    }

    fn pick(&self, code: i64) -> &'static str {
        if is_ok_code(code) {
            self.success
        } else {
            self.failure
        }
    }
}

/// Normalized `{code, message, data}` triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Build from a raw HTTP status and body.
    ///
    /// A JSON object body supplies `code` (falling back to the HTTP status),
    /// `message` or `msg`, and `data`. Anything else keeps the HTTP status as
    /// the code and the raw body as the message.
    pub fn from_http(http_status: u16, body: &str, defaults: MessageDefaults) -> Self {
        let http_code = i64::from(http_status);

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(fields)) => {
                let code = fields.get("code").and_then(as_code).unwrap_or(http_code);
                let message = ["message", "msg"]
                    .iter()
                    .find_map(|key| fields.get(*key).and_then(Value::as_str))
                    .map(str::to_string)
                    .unwrap_or_else(|| defaults.pick(code).to_string());
                let data = fields.get("data").filter(|v| !v.is_null()).cloned();
                Self { code, message, data }
            }
            _ => {
                let trimmed = body.trim();
                let message = if trimmed.is_empty() {
                    defaults.pick(http_code).to_string()
                } else {
                    trimmed.to_string()
                };
                Self::new(http_code, message)
            }
        }
    }

    /// Response for a request that failed below HTTP
    pub fn network_error(detail: impl std::fmt::Display) -> Self {
        Self::new(NETWORK_ERROR_CODE, format!("network error: {}", detail))
    }

    /// `code == 0`
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    pub fn is_auth_failure(&self) -> bool {
        AUTH_FAILURE_CODES.contains(&self.code)
    }

    pub fn is_network_error(&self) -> bool {
        self.code == NETWORK_ERROR_CODE
    }

    /// Success for health checks: code 0, or a 2xx code carried over from
    /// the HTTP status when the body had none.
    pub fn is_healthy(&self) -> bool {
        is_ok_code(self.code)
    }
}

fn is_ok_code(code: i64) -> bool {
    code == SUCCESS_CODE || (200..300).contains(&code)
}

fn as_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

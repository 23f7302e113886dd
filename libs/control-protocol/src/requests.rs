//! Request bodies

use serde::Serialize;

/// Health check body listing the devices whose status should be returned
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckRequest {
    pub machines: Vec<String>,
}

/// Login body
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub mobile: &'a str,
    pub password: &'a str,
}

impl std::fmt::Debug for LoginRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("mobile", &self.mobile)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

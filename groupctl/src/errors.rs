//! Error types for the group control service

use thiserror::Error;

use crate::models::task::TaskStatus;

/// Main error type for the group control service
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("server configuration incomplete or not logged in")]
    ConfigIncomplete,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition for task {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: i64,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task dispatch failed ({code}): {message}")]
    DispatchRejected { code: i64, message: String },

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Message suitable for showing to whoever triggered the operation
    pub fn user_message(&self) -> String {
        match self {
            ControlError::DispatchRejected { message, .. } => message.clone(),
            ControlError::AuthError(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for ControlError {
    fn from(err: anyhow::Error) -> Self {
        ControlError::Internal(err.to_string())
    }
}

//! HTTP client implementation

use std::time::Duration;

use control_protocol::{ApiResponse, MessageDefaults};
use reqwest::{header, Client};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::ControlError;

/// Connect and request timeout for every call to the control server
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the session token
pub const TOKEN_HEADER: &str = "token";

/// HTTP client for control server communication
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self, ControlError> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ControlError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// POST an optional JSON body and normalize whatever comes back.
    ///
    /// Never fails: transport errors become a `-1` response.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        token: Option<&str>,
        body: Option<&B>,
        defaults: MessageDefaults,
    ) -> ApiResponse {
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("POST {} failed: {}", url, e);
                return ApiResponse::network_error(e);
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Reading response from {} failed: {}", url, e);
                return ApiResponse::network_error(e);
            }
        };

        debug!("POST {} returned {}: {}", url, status, body);
        ApiResponse::from_http(status, &body, defaults)
    }
}

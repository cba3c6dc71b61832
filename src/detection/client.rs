//! DetectionClient - one request/response exchange per captured frame.

use std::time::Duration;

use serde::Serialize;

use super::result::DetectionResult;
use crate::encoder::DetectionRequest;

/// Default timeout for a detection exchange (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from a detection exchange. None of them are retried here.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Server error: {status}")]
    ServerError { status: u16 },

    #[error("Detection failed: {0}")]
    ApplicationError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

/// Request body.
#[derive(Debug, Serialize)]
struct DetectBody {
    image: String,
}

/// Client for the remote detection endpoint.
#[derive(Debug, Clone)]
pub struct DetectionClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl DetectionClient {
    /// Create a client posting to `endpoint` with default timeouts.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, DetectionError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DetectionError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| DetectionError::Setup(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post one encoded frame and parse the guidance.
    ///
    /// # Errors
    ///
    /// `ServerError` on a non-2xx status, `ApplicationError` when the body
    /// carries a non-empty `error` field, `NetworkError` when the endpoint
    /// cannot be reached, `InvalidResponse` when the body is not the
    /// expected JSON.
    pub async fn send(&self, request: &DetectionRequest) -> Result<DetectionResult, DetectionError> {
        let body = DetectBody {
            image: request.to_base64(),
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DetectionError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Detection endpoint returned {}", status);
            return Err(DetectionError::ServerError {
                status: status.as_u16(),
            });
        }

        let result: DetectionResult = response.json().await.map_err(|e| {
            if e.is_decode() {
                DetectionError::InvalidResponse(e.to_string())
            } else {
                DetectionError::NetworkError(e.to_string())
            }
        })?;

        if let Some(message) = result.error_message() {
            return Err(DetectionError::ApplicationError(message.to_string()));
        }

        Ok(result)
    }
}

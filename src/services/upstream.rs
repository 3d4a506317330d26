use reqwest::header::RETRY_AFTER;
use reqwest::Response;
use thiserror::Error;

use crate::core::rate_limiter::Retryable;

/// Errors from any external job, detail or inference API
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned status {status}: {message}")]
    Status {
        status: u16,
        retry_after: Option<String>,
        message: String,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: {0}")]
    MissingCredentials(&'static str),
}

impl UpstreamError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        UpstreamError::Status {
            status,
            retry_after: None,
            message: message.into(),
        }
    }

    /// Build a status error from a non-success response, keeping `Retry-After`
    pub async fn from_response(response: Response) -> Self {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let message = response.text().await.unwrap_or_default();

        UpstreamError::Status {
            status,
            retry_after,
            message,
        }
    }
}

impl Retryable for UpstreamError {
    fn status_code(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::RequestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    fn retry_after(&self) -> Option<&str> {
        match self {
            UpstreamError::Status { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}

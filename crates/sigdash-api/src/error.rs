//! API client error types.

use serde::Serialize;
use thiserror::Error;

/// Coarse failure class used for retry decisions and user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend could not be reached or the response was cut off.
    Network,
    /// The backend failed (5xx, 429 or an `{"error": ...}` body).
    Server,
    /// The request itself was wrong or the response was not understood.
    Client,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Server => "server",
            Self::Client => "client",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Status { status, .. } if *status >= 500 || *status == 429 => ErrorKind::Server,
            Self::Backend(_) => ErrorKind::Server,
            Self::Status { .. } | Self::HttpClient(_) | Self::Decode(_) | Self::InvalidRequest(_) => {
                ErrorKind::Client
            }
        }
    }

    /// Network errors, 5xx and 429 are transient; everything else fails fast.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Upstream HTTP status, when the backend answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::HttpClient(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_retryable_classes() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());

        assert!(!status(404).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!ApiError::Decode("eof".into()).is_retryable());
        assert!(!ApiError::Backend("no data".into()).is_retryable());
        assert!(!ApiError::InvalidRequest("days".into()).is_retryable());
    }

    #[test]
    fn test_kind() {
        assert_eq!(ApiError::Network("x".into()).kind(), ErrorKind::Network);
        assert_eq!(status(502).kind(), ErrorKind::Server);
        assert_eq!(status(429).kind(), ErrorKind::Server);
        assert_eq!(status(404).kind(), ErrorKind::Client);
        assert_eq!(ApiError::Backend("x".into()).kind(), ErrorKind::Server);
        assert_eq!(ApiError::InvalidRequest("x".into()).kind(), ErrorKind::Client);
        assert_eq!(status(418).status(), Some(418));
    }
}

//! Error types for the Itinera client

use itinera_core::domain::event::EventDecodeError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Itinera client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// An event block in the stream could not be decoded
    #[error("Failed to decode event stream: {0}")]
    StreamDecode(#[from] EventDecodeError),
}

impl ClientError {
    /// Create an API error from status code and message
    ///
    /// The API answers errors as `{"error": "..."}`; the inner message is
    /// used when present.
    pub fn api_error(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or(body);
        Self::ApiError { status, message }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_unwraps_json_body() {
        let err = ClientError::api_error(404, r#"{"error":"Conversation 42 not found"}"#);
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "API error (status 404): Conversation 42 not found"
        );
    }

    #[test]
    fn test_api_error_keeps_plain_body() {
        let err = ClientError::api_error(502, "Bad Gateway");
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "API error (status 502): Bad Gateway");
    }

    #[test]
    fn test_client_error_range() {
        assert!(ClientError::api_error(400, "").is_client_error());
        assert!(!ClientError::api_error(400, "").is_not_found());
    }
}

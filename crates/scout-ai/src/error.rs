//! Error types for scout-ai

use thiserror::Error;

/// Result type alias using scout-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when interacting with LLM providers
#[derive(Error, Debug)]
pub enum Error {
    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Server-sent events transport error
    #[error("SSE error: {0}")]
    Sse(String),

    /// The provider stream ended with an error event
    #[error("Stream error: {0}")]
    Stream(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The stream finished without producing a message
    #[error("Empty response from provider")]
    EmptyResponse,
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Classify an HTTP error status returned by a provider
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Error::Auth(body),
            429 => Error::RateLimited(body),
            _ => Error::api(format!("http_{}", status), body),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited(_) | Error::Sse(_) => true,
            Error::Api {
                error_type,
                message,
            } => {
                let et = error_type.to_lowercase();
                et.starts_with("http_5") || is_retryable_message(message)
            }
            Error::Stream(message) => is_retryable_message(message),
            _ => false,
        }
    }
}

/// String fallback for errors that were flattened into stream events
fn is_retryable_message(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("rate limit")
        || msg.contains("rate limited")
        || msg.contains("overloaded")
        || msg.contains("too many requests")
        || msg.contains("timed out")
        || msg.contains("connection reset")
        || msg.contains("502")
        || msg.contains("503")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_typed_variants() {
        assert!(Error::RateLimited("slow down".into()).is_retryable());
        assert!(Error::Sse("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(Error::from_status(401, "nope"), Error::Auth(_)));
        assert!(matches!(Error::from_status(429, "busy"), Error::RateLimited(_)));
        assert!(matches!(Error::from_status(400, "bad"), Error::Api { .. }));
    }

    #[test]
    fn test_retryable_server_errors() {
        assert!(Error::from_status(503, "unavailable").is_retryable());
        assert!(!Error::from_status(400, "bad request").is_retryable());
    }

    #[test]
    fn test_retryable_stream_message() {
        assert!(Error::Stream("Rate limited: too many requests".into()).is_retryable());
        assert!(!Error::Stream("Failed to parse chunk".into()).is_retryable());
    }

    #[test]
    fn test_not_retryable_auth() {
        assert!(!Error::from_status(401, "Invalid API key").is_retryable());
        assert!(!Error::InvalidApiKey.is_retryable());
        assert!(!Error::EmptyResponse.is_retryable());
    }
}

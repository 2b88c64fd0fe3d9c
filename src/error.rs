//! Error types for the chat client

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias using [`ChatError`]
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors raised by the conversation store, the response aggregator, and the
/// completion client.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No API key in the config file or environment
    #[error("no API key configured")]
    ApiKeyMissing,

    /// Upstream returned a 5xx-class status
    #[error("provider unavailable (HTTP {0})")]
    ServiceUnavailable(u16),

    /// Upstream rejected the credential
    #[error("provider rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    /// Upstream rate limit hit
    #[error("rate limited by provider (HTTP {0})")]
    RateLimited(u16),

    /// Upstream rejected the request body
    #[error("provider rejected the request (HTTP {0})")]
    MalformedRequest(u16),

    /// Any other unexpected HTTP status
    #[error("unexpected provider status (HTTP {0})")]
    Upstream(u16),

    /// Network-level failure from reqwest
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),

    /// Completion body did not have the expected shape
    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),

    /// Stream closed without a terminal event and without content
    #[error("stream ended unexpectedly")]
    StreamClosed,

    /// An exchange is already in flight
    #[error("an exchange is already in flight")]
    Busy,

    /// Submitted message trimmed to nothing
    #[error("message is empty")]
    EmptyMessage,

    /// A second in-progress assistant turn was requested
    #[error("an assistant turn is already streaming")]
    TurnAlreadyOpen,

    /// The referenced turn is not the open streaming turn
    #[error("turn is not the open streaming turn")]
    NotStreaming,

    /// The referenced turn does not exist
    #[error("unknown turn id")]
    UnknownTurn,
}

impl ChatError {
    /// Classify an HTTP status from the provider.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => ChatError::Unauthorized(status.as_u16()),
            429 => ChatError::RateLimited(status.as_u16()),
            400 | 422 => ChatError::MalformedRequest(status.as_u16()),
            code if status.is_server_error() => ChatError::ServiceUnavailable(code),
            code => ChatError::Upstream(code),
        }
    }

    /// The fixed human-readable string shown in place of the assistant reply
    /// when an exchange fails. Never exposes status codes or transport detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::ApiKeyMissing => {
                "API key is not configured. Please check the configuration."
            }
            ChatError::ServiceUnavailable(_) => {
                "The AI service is temporarily unavailable. Please try again in a moment."
            }
            ChatError::Unauthorized(_) => {
                "Invalid API key. Please check your OpenRouter API key configuration."
            }
            ChatError::RateLimited(_) => {
                "Too many requests. Please wait a moment before trying again."
            }
            ChatError::MalformedRequest(_) => {
                "Invalid request format. Please try rephrasing your message."
            }
            ChatError::Busy => "A reply is still being generated. Wait for it to finish first.",
            ChatError::EmptyMessage => "Type a message before sending.",
            _ => "I'm having trouble connecting right now. Please try again in a moment.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn test_classify_service_unavailable() {
        assert!(matches!(
            ChatError::from_status(status(503)),
            ChatError::ServiceUnavailable(503)
        ));
        assert!(matches!(
            ChatError::from_status(status(500)),
            ChatError::ServiceUnavailable(500)
        ));
    }

    #[test]
    fn test_classify_auth_and_rate_limit() {
        assert!(matches!(
            ChatError::from_status(status(401)),
            ChatError::Unauthorized(401)
        ));
        assert!(matches!(
            ChatError::from_status(status(403)),
            ChatError::Unauthorized(403)
        ));
        assert!(matches!(
            ChatError::from_status(status(429)),
            ChatError::RateLimited(429)
        ));
    }

    #[test]
    fn test_classify_malformed_request() {
        assert!(matches!(
            ChatError::from_status(status(400)),
            ChatError::MalformedRequest(400)
        ));
        assert!(matches!(
            ChatError::from_status(status(422)),
            ChatError::MalformedRequest(422)
        ));
    }

    #[test]
    fn test_classify_everything_else_as_upstream() {
        assert!(matches!(
            ChatError::from_status(status(404)),
            ChatError::Upstream(404)
        ));
        assert!(matches!(
            ChatError::from_status(status(418)),
            ChatError::Upstream(418)
        ));
    }

    #[test]
    fn test_user_message_is_fixed_per_class() {
        assert_eq!(
            ChatError::ApiKeyMissing.user_message(),
            "API key is not configured. Please check the configuration."
        );
        assert_eq!(
            ChatError::RateLimited(429).user_message(),
            "Too many requests. Please wait a moment before trying again."
        );
        // transport failures collapse to the generic apology
        assert_eq!(
            ChatError::StreamClosed.user_message(),
            "I'm having trouble connecting right now. Please try again in a moment."
        );
        assert_eq!(
            ChatError::Upstream(404).user_message(),
            ChatError::StreamClosed.user_message()
        );
    }
}

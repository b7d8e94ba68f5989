//! Client error types

use shared::error::CommandError;
use thiserror::Error;

/// Client error type
///
/// Business-rule rejections from the engine are not errors here: they come
/// back inside `CommandResponse::error`. This enum covers transport and
/// local failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Change feed ended (server restart, forced disconnect)
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// Subscriber fell behind and events were dropped
    #[error("Change feed lagged, {0} events skipped")]
    Lagged(u64),

    /// Engine reported a failure outside a command (snapshot, subscribe)
    #[error("Server error: {0}")]
    Server(CommandError),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cart references a menu item the client has never seen
    #[error("Unknown menu item: {0}")]
    UnknownItem(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ClientError {
    /// Infrastructure failures that a resubscribe + resync can recover from
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            ClientError::Timeout(_) | ClientError::Disconnected(_) | ClientError::Lagged(_) => true,
            ClientError::Server(err) => err.is_retryable(),
            ClientError::InvalidResponse(_)
            | ClientError::Serialization(_)
            | ClientError::UnknownItem(_)
            | ClientError::Validation(_) => false,
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::Lagged(3).is_retryable());
        assert!(ClientError::Disconnected("closed".into()).is_retryable());
        assert!(ClientError::Server(CommandError::new(ErrorCode::Unavailable, "down")).is_retryable());

        assert!(!ClientError::Server(CommandError::not_found("Order o1")).is_retryable());
        assert!(!ClientError::UnknownItem("x".into()).is_retryable());
        assert!(!ClientError::InvalidResponse("garbage".into()).is_retryable());
    }
}

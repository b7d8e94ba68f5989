//! Command error and response structures

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::RecordChange;

/// An item rejected by the authoritative availability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableItem {
    pub menu_item_id: String,
    pub name: String,
}

/// Typed failure of a core operation
///
/// Business-rule failures (`Conflict`, `InvalidTransition`, `ItemUnavailable`,
/// ...) are expected control flow. Only [`ErrorCode::is_retryable`] codes are
/// retried, and only by the client synchronizer.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct CommandError {
    pub code: ErrorCode,
    pub message: String,
    /// Exactly the affected items, for `ItemUnavailable`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable_items: Vec<UnavailableItem>,
}

impl CommandError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            unavailable_items: Vec::new(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, msg)
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", resource.into()))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, msg)
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTransition, msg)
    }

    pub fn item_unavailable(items: Vec<UnavailableItem>) -> Self {
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        Self {
            code: ErrorCode::ItemUnavailable,
            message: format!("Unavailable: {}", names.join(", ")),
            unavailable_items: items,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, msg)
    }

    /// Shortcut for `self.code.is_retryable()`
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }
}

/// Command response
///
/// `records` carries every record the command wrote, so the caller updates
/// its own view from the direct response instead of waiting for the echo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// The command ID this responds to
    pub command_id: String,
    /// Whether the command succeeded
    pub success: bool,
    /// Full records written by the command
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<RecordChange>,
    /// Error details if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl CommandResponse {
    pub fn success(command_id: String, records: Vec<RecordChange>) -> Self {
        Self {
            command_id,
            success: true,
            records,
            error: None,
        }
    }

    pub fn error(command_id: String, error: CommandError) -> Self {
        Self {
            command_id,
            success: false,
            records: Vec::new(),
            error: Some(error),
        }
    }

    /// Command already processed; nothing new was written
    pub fn duplicate(command_id: String) -> Self {
        Self {
            command_id,
            success: true,
            records: Vec::new(),
            error: None,
        }
    }

    /// Convert into a `Result`, keeping the written records on success
    pub fn into_result(self) -> Result<Vec<RecordChange>, CommandError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_unavailable_lists_every_item() {
        let err = CommandError::item_unavailable(vec![
            UnavailableItem {
                menu_item_id: "m1".into(),
                name: "Ramen".into(),
            },
            UnavailableItem {
                menu_item_id: "m2".into(),
                name: "Gyoza".into(),
            },
        ]);
        assert_eq!(err.code, ErrorCode::ItemUnavailable);
        assert_eq!(err.unavailable_items.len(), 2);
        assert!(err.message.contains("Ramen"));
        assert!(err.message.contains("Gyoza"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conflict_user_message() {
        let err = CommandError::conflict("order moved on");
        assert_eq!(
            err.user_message(),
            "This was already updated elsewhere. Refresh and retry."
        );
    }

    #[test]
    fn test_response_into_result() {
        let ok = CommandResponse::duplicate("c1".into());
        assert!(ok.into_result().unwrap().is_empty());

        let err = CommandResponse::error("c2".into(), CommandError::not_found("Order o1"));
        let e = err.into_result().unwrap_err();
        assert_eq!(e.code, ErrorCode::NotFound);
        assert_eq!(e.message, "Order o1 not found");
    }
}

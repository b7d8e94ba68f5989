//! Unified error codes for the ordering platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 6xxx: Menu errors
//! - 7xxx: Table errors
//! - 8xxx: Bill errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed (empty / malformed input)
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Concurrent writer already changed the record
    Conflict = 4,

    // ==================== 4xxx: Order ====================
    /// Target status not reachable from the current status
    InvalidTransition = 4001,

    // ==================== 6xxx: Menu ====================
    /// One or more items became unavailable before commit
    ItemUnavailable = 6001,

    // ==================== 7xxx: Table ====================
    /// Table has no non-cancelled, unbilled orders
    NoActiveOrders = 7001,

    // ==================== 8xxx: Bill ====================
    /// No billable orders in the session
    EmptySession = 8001,
    /// Session or order already billed
    AlreadyBilled = 8002,

    // ==================== 9xxx: System ====================
    /// Store or transport call exceeded its deadline
    Timeout = 9001,
    /// Store or transport unreachable
    Unavailable = 9002,
    /// Storage layer failure
    StorageError = 9003,
    /// Internal error
    InternalError = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Infrastructure failures may be retried (resubscribe / refetch).
    /// Business-rule failures never are.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::Timeout | ErrorCode::Unavailable)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::Conflict => "Record was modified concurrently",
            ErrorCode::InvalidTransition => "Status transition not allowed",
            ErrorCode::ItemUnavailable => "Item is no longer available",
            ErrorCode::NoActiveOrders => "Table has no active orders",
            ErrorCode::EmptySession => "No billable orders in session",
            ErrorCode::AlreadyBilled => "Session already billed",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::Unavailable => "Service unavailable",
            ErrorCode::StorageError => "Storage error",
            ErrorCode::InternalError => "Internal error",
        }
    }

    /// Text shown to staff / customers
    pub const fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::Conflict => "This was already updated elsewhere. Refresh and retry.",
            ErrorCode::ItemUnavailable => "Some items in your cart are no longer available.",
            ErrorCode::InvalidTransition => "This order can no longer move to that status.",
            ErrorCode::AlreadyBilled => "This session has already been billed.",
            ErrorCode::EmptySession | ErrorCode::NoActiveOrders => "There is nothing to bill.",
            ErrorCode::Timeout | ErrorCode::Unavailable => {
                "Connection problem. Please try again in a moment."
            }
            _ => self.message(),
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::Conflict),
            4001 => Ok(ErrorCode::InvalidTransition),
            6001 => Ok(ErrorCode::ItemUnavailable),
            7001 => Ok(ErrorCode::NoActiveOrders),
            8001 => Ok(ErrorCode::EmptySession),
            8002 => Ok(ErrorCode::AlreadyBilled),
            9001 => Ok(ErrorCode::Timeout),
            9002 => Ok(ErrorCode::Unavailable),
            9003 => Ok(ErrorCode::StorageError),
            9004 => Ok(ErrorCode::InternalError),
            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::Conflict.code(), 4);
        assert_eq!(ErrorCode::InvalidTransition.code(), 4001);
        assert_eq!(ErrorCode::ItemUnavailable.code(), 6001);
        assert_eq!(ErrorCode::AlreadyBilled.code(), 8002);
        assert_eq!(ErrorCode::Timeout.code(), 9001);
    }

    #[test]
    fn test_try_from_roundtrip_all_codes() {
        let all = [
            ErrorCode::Success,
            ErrorCode::Unknown,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::Conflict,
            ErrorCode::InvalidTransition,
            ErrorCode::ItemUnavailable,
            ErrorCode::NoActiveOrders,
            ErrorCode::EmptySession,
            ErrorCode::AlreadyBilled,
            ErrorCode::Timeout,
            ErrorCode::Unavailable,
            ErrorCode::StorageError,
            ErrorCode::InternalError,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
        assert_eq!(ErrorCode::try_from(1234), Err(InvalidErrorCode(1234)));
    }

    #[test]
    fn test_only_infrastructure_is_retryable() {
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(ErrorCode::Unavailable.is_retryable());
        assert!(!ErrorCode::Conflict.is_retryable());
        assert!(!ErrorCode::ItemUnavailable.is_retryable());
        assert!(!ErrorCode::InvalidTransition.is_retryable());
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::AlreadyBilled).unwrap();
        assert_eq!(json, "8002");
        let back: ErrorCode = serde_json::from_str("4").unwrap();
        assert_eq!(back, ErrorCode::Conflict);
    }

    #[test]
    fn test_display() {
        assert_eq!(ErrorCode::Conflict.to_string(), "E0004");
        assert_eq!(ErrorCode::EmptySession.to_string(), "E8001");
    }
}

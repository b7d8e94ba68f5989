//! Unified error system for the ordering platform
//!
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`CommandError`]: Typed failure returned by every core operation
//! - [`CommandResponse`]: Result envelope for a processed command
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 4xxx: Order errors
//! - 6xxx: Menu errors
//! - 7xxx: Table errors
//! - 8xxx: Bill errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{CommandError, ErrorCode};
//!
//! let err = CommandError::conflict("order already advanced");
//! assert_eq!(err.code, ErrorCode::Conflict);
//! assert!(!err.is_retryable());
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{CommandError, CommandResponse, UnavailableItem};

/// Result alias for core operations
pub type CommandResult<T> = Result<T, CommandError>;

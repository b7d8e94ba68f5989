//! Shared types for the ordering platform
//!
//! Domain records (orders, tables, bills, menu availability, settings),
//! commands and events, realtime change events and the error taxonomy.
//! Used by both the order engine and its clients.

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{CommandError, CommandResponse, CommandResult, ErrorCode};
pub use message::{ChangeEvent, RecordChange, RecordKey, RecordKind, Topic, TopicSnapshot};

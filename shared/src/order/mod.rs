//! Order types
//!
//! - Commands: Requests from clients to modify orders
//! - Events: Immutable facts recorded after command processing
//! - Order: the record computed from the event stream

pub mod command;
pub mod event;
pub mod types;

// Re-exports
pub use command::{OrderCommand, OrderCommandPayload};
pub use event::{EventPayload, OrderEvent, OrderEventType};
pub use types::*;

//! Order lifecycle module
//!
//! Orders are event sourced; tables, bills and menu items are plain
//! versioned records written in the same transaction.
//!
//! - **actions**: one `CommandHandler` per command, validation + event generation
//! - **appliers**: pure `EventApplier`s, the only code that mutates an `Order`
//! - **manager**: `OrdersManager`, transaction + persistence + broadcast
//! - **traits**: `CommandContext`, `OrderError`, handler / applier traits
//!
//! # Architecture
//!
//! ```text
//! OrderCommand → CommandAction → OrderEvent → EventApplier → Order
//!                      │                                       │
//!                      └──── table / bill / menu item ─────────┤
//!                                                              ↓
//!                                              redb (compare-and-apply)
//!                                                              ↓
//!                                        ChangeEvent → MessageBus topics
//! ```

pub mod actions;
pub mod appliers;
pub mod manager;
pub mod traits;

// Re-exports
pub use manager::{ManagerError, ManagerResult, OrdersManager};
pub use traits::{CommandContext, CommandHandler, CommandMetadata, EventApplier, OrderError};

// Re-export shared types for convenience
pub use shared::error::{CommandError, CommandResponse, ErrorCode};
pub use shared::order::{
    EventPayload, Order, OrderCommand, OrderCommandPayload, OrderEvent, OrderEventType,
    OrderStatus,
};

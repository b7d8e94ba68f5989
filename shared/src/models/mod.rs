//! Data models
//!
//! Shared between order-engine and clients (via API and change events).
//! IDs are strings; every record is scoped by `shop_id`.

pub mod bill;
pub mod dining_table;
pub mod menu_item;
pub mod settings;

// Re-exports
pub use bill::*;
pub use dining_table::*;
pub use menu_item::*;
pub use settings::*;

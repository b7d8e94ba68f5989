//! Menu item availability slice

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The part of a menu item the ordering core cares about
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItemAvailability {
    pub id: String,
    pub shop_id: String,
    pub name: String,
    /// Current price; may diverge from prices already snapshotted on orders
    pub price: Decimal,
    pub is_available: bool,
    /// Per-item quantity cap, falls back to the shop setting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<u32>,
    pub version: u64,
    pub updated_at: i64,
}

impl MenuItemAvailability {
    pub fn new(
        id: impl Into<String>,
        shop_id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            shop_id: shop_id.into(),
            name: name.into(),
            price,
            is_available: true,
            max_quantity: None,
            version: 0,
            updated_at: 0,
        }
    }
}

//! Per-shop financial settings

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default per-line quantity cap
pub const DEFAULT_MAX_ITEM_QUANTITY: u32 = 10;

/// 店铺设置（税率、服务费等）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopSettings {
    pub shop_id: String,
    /// ISO currency code, copied onto every bill
    pub currency: String,
    /// Percent, e.g. 10 for 10%
    pub tax_rate: Decimal,
    /// Percent, applied to dine-in sessions only
    pub service_charge_rate: Decimal,
    pub tax_included_in_price: bool,
    pub max_item_quantity: u32,
    /// Require the table's session OTP on dine-in orders
    pub enable_otp: bool,
    pub updated_at: i64,
}

impl ShopSettings {
    /// Settings used when a shop has never saved any
    pub fn defaults(shop_id: impl Into<String>) -> Self {
        Self {
            shop_id: shop_id.into(),
            currency: "USD".to_string(),
            tax_rate: Decimal::ZERO,
            service_charge_rate: Decimal::ZERO,
            tax_included_in_price: false,
            max_item_quantity: DEFAULT_MAX_ITEM_QUANTITY,
            enable_otp: false,
            updated_at: 0,
        }
    }
}

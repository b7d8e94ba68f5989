//! Bill Model
//!
//! A bill is an immutable snapshot of one closed session. Receipt printing
//! consumes it as-is.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 账单行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillLine {
    pub order_id: String,
    pub menu_item_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    /// Rounded to 2 dp for display
    pub line_total: Decimal,
}

/// Finalized bill (账单快照)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bill {
    pub id: String,
    pub shop_id: String,
    /// Set for table sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    /// Set for standalone (takeaway / delivery) bills
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Contributing orders, in placement order
    pub order_ids: Vec<String>,
    pub lines: Vec<BillLine>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_reason: Option<String>,
    pub tax_rate: Decimal,
    pub tax_included: bool,
    pub tax_amount: Decimal,
    pub service_charge_rate: Decimal,
    pub service_charge_amount: Decimal,
    pub grand_total: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub bill_number: String,
    pub created_at: i64,
    pub created_by: String,
    pub version: u64,
}

/// Staff choices made at billing time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillOptions {
    #[serde(default)]
    pub discount_amount: Decimal,
    /// Required when `discount_amount > 0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_reason: Option<String>,
    /// Waive the service charge when false
    #[serde(default = "default_true")]
    pub include_service_charge: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for BillOptions {
    fn default() -> Self {
        Self {
            discount_amount: Decimal::ZERO,
            discount_reason: None,
            include_service_charge: true,
            payment_method: None,
        }
    }
}

impl BillOptions {
    pub fn with_discount(mut self, amount: Decimal, reason: impl Into<String>) -> Self {
        self.discount_amount = amount;
        self.discount_reason = Some(reason.into());
        self
    }

    pub fn waive_service_charge(mut self) -> Self {
        self.include_service_charge = false;
        self
    }

    pub fn with_payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }
}

/// Computed totals, before a bill is persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillBreakdown {
    pub order_ids: Vec<String>,
    pub lines: Vec<BillLine>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub tax_included: bool,
    pub tax_amount: Decimal,
    pub service_charge_rate: Decimal,
    pub service_charge_amount: Decimal,
    pub grand_total: Decimal,
    pub currency: String,
}

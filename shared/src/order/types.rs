//! Order record and its value types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// Status
// ============================================================================

/// 订单状态（厨房流转）
///
/// `Queued → Preparing → Ready → Served`, one step at a time.
/// `Cancelled` is reachable from the first three only.
/// Bill attachment is not a status, see [`Order::bill_id`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Queued,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl OrderStatus {
    /// Position on the kitchen track; `None` for `Cancelled`
    pub const fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Queued => Some(0),
            OrderStatus::Preparing => Some(1),
            OrderStatus::Ready => Some(2),
            OrderStatus::Served => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    /// The single forward step, if any
    pub const fn next(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Queued => Some(OrderStatus::Preparing),
            OrderStatus::Preparing => Some(OrderStatus::Ready),
            OrderStatus::Ready => Some(OrderStatus::Served),
            OrderStatus::Served | OrderStatus::Cancelled => None,
        }
    }

    /// No transition leaves `Served` or `Cancelled`
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Served | OrderStatus::Cancelled)
    }

    pub const fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Queued | OrderStatus::Preparing | OrderStatus::Ready
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Queued => "queued",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Service Type
// ============================================================================

/// 服务类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// 堂食，必须绑定桌台
    #[default]
    DineIn,
    /// 外带
    Takeaway,
    /// 外卖
    Delivery,
}

impl ServiceType {
    pub const fn requires_table(&self) -> bool {
        matches!(self, ServiceType::DineIn)
    }
}

// ============================================================================
// Items
// ============================================================================

/// Order line with the price snapshotted at creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub menu_item_id: String,
    /// Name snapshot
    pub name: String,
    /// Unit price snapshot, never changes after creation
    pub unit_price: Decimal,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderItem {
    /// Unrounded `unit_price × quantity`
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Item as submitted by a client. Prices are looked up server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItemInput {
    pub menu_item_id: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ============================================================================
// Order
// ============================================================================

/// Order record
///
/// `version` is bumped on every persisted write and is the only ordering
/// key clients use when reducing change events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: String,
    pub shop_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    pub service_type: ServiceType,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    /// Display only, collisions tolerated
    pub order_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Set once the order is attached to a finalized bill; the order is frozen after that
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub version: u64,
}

impl Order {
    /// Blank record for event replay; `OrderCreated` fills it in
    pub fn new(id: impl Into<String>, shop_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            shop_id: shop_id.into(),
            table_id: None,
            service_type: ServiceType::default(),
            items: Vec::new(),
            status: OrderStatus::Queued,
            order_number: String::new(),
            customer_name: None,
            customer_phone: None,
            note: None,
            bill_id: None,
            created_at: 0,
            updated_at: 0,
            version: 0,
        }
    }

    /// Σ unit_price × quantity, unrounded
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    pub fn is_billed(&self) -> bool {
        self.bill_id.is_some()
    }

    /// Part of the table's open session: not cancelled, not billed
    pub fn is_open(&self) -> bool {
        self.status != OrderStatus::Cancelled && self.bill_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_forward_track() {
        assert_eq!(OrderStatus::Queued.next(), Some(OrderStatus::Preparing));
        assert_eq!(OrderStatus::Ready.next(), Some(OrderStatus::Served));
        assert_eq!(OrderStatus::Served.next(), None);
        assert_eq!(OrderStatus::Cancelled.next(), None);
        assert!(OrderStatus::Served.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Served.is_cancellable());
        assert!(OrderStatus::Ready.is_cancellable());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&OrderStatus::Preparing).unwrap();
        assert_eq!(json, "\"preparing\"");
        let st: ServiceType = serde_json::from_str("\"dine_in\"").unwrap();
        assert_eq!(st, ServiceType::DineIn);
        assert!(st.requires_table());
        assert!(!ServiceType::Delivery.requires_table());
    }

    #[test]
    fn test_subtotal_and_open() {
        let mut order = Order::new("o1", "s1");
        order.items = vec![
            OrderItem {
                menu_item_id: "m1".into(),
                name: "Dumpling".into(),
                unit_price: dec("5.00"),
                quantity: 2,
                notes: None,
            },
            OrderItem {
                menu_item_id: "m2".into(),
                name: "Tea".into(),
                unit_price: dec("3.00"),
                quantity: 1,
                notes: None,
            },
        ];
        assert_eq!(order.subtotal(), dec("13.00"));
        assert!(order.is_open());

        order.bill_id = Some("b1".into());
        assert!(!order.is_open());
        assert!(order.is_billed());
    }
}

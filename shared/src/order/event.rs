//! Order events - immutable facts recorded after command processing

use super::types::{OrderItem, OrderStatus, ServiceType};
use serde::{Deserialize, Serialize};

/// Order event - immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Event unique ID
    pub event_id: String,
    /// Per-shop sequence number, authoritative for replay order
    pub sequence: u64,
    pub shop_id: String,
    /// Order this event belongs to
    pub order_id: String,
    /// Server timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// Client timestamp, kept for audit (may differ due to clock skew)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_timestamp: Option<i64>,
    /// Operator who triggered this event
    pub operator_id: String,
    /// Operator name (snapshot for audit)
    pub operator_name: String,
    /// Command that triggered this event (for audit tracing)
    pub command_id: String,
    pub event_type: OrderEventType,
    pub payload: EventPayload,
}

/// Event type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventType {
    OrderCreated,
    OrderStatusChanged,
    OrderCancelled,
    OrderBilled,
}

impl std::fmt::Display for OrderEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderEventType::OrderCreated => write!(f, "ORDER_CREATED"),
            OrderEventType::OrderStatusChanged => write!(f, "ORDER_STATUS_CHANGED"),
            OrderEventType::OrderCancelled => write!(f, "ORDER_CANCELLED"),
            OrderEventType::OrderBilled => write!(f, "ORDER_BILLED"),
        }
    }
}

/// Event payload variants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    OrderCreated {
        #[serde(skip_serializing_if = "Option::is_none")]
        table_id: Option<String>,
        service_type: ServiceType,
        /// Items with prices already snapshotted
        items: Vec<OrderItem>,
        order_number: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        customer_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        customer_phone: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    OrderStatusChanged {
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderCancelled {
        from: OrderStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    OrderBilled {
        bill_id: String,
    },
}

impl EventPayload {
    pub fn event_type(&self) -> OrderEventType {
        match self {
            EventPayload::OrderCreated { .. } => OrderEventType::OrderCreated,
            EventPayload::OrderStatusChanged { .. } => OrderEventType::OrderStatusChanged,
            EventPayload::OrderCancelled { .. } => OrderEventType::OrderCancelled,
            EventPayload::OrderBilled { .. } => OrderEventType::OrderBilled,
        }
    }
}

impl OrderEvent {
    /// Create a new event
    ///
    /// Server timestamp is always set here; `client_timestamp` is kept for audit.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u64,
        shop_id: impl Into<String>,
        order_id: impl Into<String>,
        operator_id: impl Into<String>,
        operator_name: impl Into<String>,
        command_id: impl Into<String>,
        client_timestamp: Option<i64>,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            sequence,
            shop_id: shop_id.into(),
            order_id: order_id.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            client_timestamp,
            operator_id: operator_id.into(),
            operator_name: operator_name.into(),
            command_id: command_id.into(),
            event_type: payload.event_type(),
            payload,
        }
    }
}

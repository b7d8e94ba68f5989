//! Order commands - requests from clients to mutate orders, tables and bills

use super::types::{OrderItemInput, OrderStatus, ServiceType};
use crate::models::BillOptions;
use serde::{Deserialize, Serialize};

/// Command envelope
///
/// `command_id` is the idempotency key: a retried command with the same id
/// is answered as a duplicate and writes nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCommand {
    pub command_id: String,
    pub shop_id: String,
    /// Client timestamp (Unix milliseconds)
    pub timestamp: i64,
    pub operator_id: String,
    pub operator_name: String,
    pub payload: OrderCommandPayload,
}

impl OrderCommand {
    pub fn new(
        shop_id: impl Into<String>,
        operator_id: impl Into<String>,
        operator_name: impl Into<String>,
        payload: OrderCommandPayload,
    ) -> Self {
        Self {
            command_id: uuid::Uuid::new_v4().to_string(),
            shop_id: shop_id.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            operator_id: operator_id.into(),
            operator_name: operator_name.into(),
            payload,
        }
    }

    /// Override the generated command id (client retries reuse it)
    pub fn with_command_id(mut self, command_id: impl Into<String>) -> Self {
        self.command_id = command_id.into();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderCommandPayload {
    CreateOrder {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table_id: Option<String>,
        service_type: ServiceType,
        items: Vec<OrderItemInput>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        customer_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        customer_phone: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        /// 桌台会话验证码 (only checked when the shop enables OTP)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_otp: Option<String>,
    },
    TransitionOrder {
        order_id: String,
        target: OrderStatus,
        /// Version the caller last saw; mismatch ⇒ Conflict
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_version: Option<u64>,
    },
    CancelOrder {
        order_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    BillTable {
        table_id: String,
        #[serde(default)]
        options: BillOptions,
    },
    /// Standalone bill for a takeaway / delivery order
    BillOrder {
        order_id: String,
        #[serde(default)]
        options: BillOptions,
    },
    ClearTable {
        table_id: String,
    },
    SetItemAvailability {
        menu_item_id: String,
        is_available: bool,
    },
}

impl OrderCommandPayload {
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommandPayload::CreateOrder { .. } => "create_order",
            OrderCommandPayload::TransitionOrder { .. } => "transition_order",
            OrderCommandPayload::CancelOrder { .. } => "cancel_order",
            OrderCommandPayload::BillTable { .. } => "bill_table",
            OrderCommandPayload::BillOrder { .. } => "bill_order",
            OrderCommandPayload::ClearTable { .. } => "clear_table",
            OrderCommandPayload::SetItemAvailability { .. } => "set_item_availability",
        }
    }
}

//! Push notification dispatch
//!
//! 推送由外部服务完成，这里只负责把订单事件变成通知并交给
//! [`PushDispatcher`]。任何推送失败都只记录日志，不影响命令结果。

mod worker;

pub use worker::NotificationWorker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::order::{EventPayload, Order, OrderEvent, OrderStatus};

/// 推送失败
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Push rejected: {0}")]
    Rejected(String),

    #[error("Push transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderPlaced,
    StatusChanged,
    OrderCancelled,
}

/// 一条待推送的通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushNotification {
    pub shop_id: String,
    pub order_id: String,
    pub order_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl PushNotification {
    /// Build the notification for an event, `None` for events nobody is told about
    ///
    /// `order` is the state after the event was applied.
    pub fn from_event(event: &OrderEvent, order: &Order) -> Option<Self> {
        let number = &order.order_number;
        let (kind, title, body) = match &event.payload {
            EventPayload::OrderCreated { .. } => (
                NotificationKind::OrderPlaced,
                "Order received".to_string(),
                format!("Order {number} has been sent to the kitchen"),
            ),
            EventPayload::OrderStatusChanged { to, .. } => {
                let body = match to {
                    OrderStatus::Preparing => format!("Order {number} is being prepared"),
                    OrderStatus::Ready => format!("Order {number} is ready"),
                    OrderStatus::Served => format!("Order {number} has been served"),
                    _ => return None,
                };
                (NotificationKind::StatusChanged, "Order update".to_string(), body)
            }
            EventPayload::OrderCancelled { reason, .. } => (
                NotificationKind::OrderCancelled,
                "Order cancelled".to_string(),
                match reason {
                    Some(reason) => format!("Order {number} was cancelled: {reason}"),
                    None => format!("Order {number} was cancelled"),
                },
            ),
            EventPayload::OrderBilled { .. } => return None,
        };

        Some(Self {
            shop_id: event.shop_id.clone(),
            order_id: event.order_id.clone(),
            order_number: number.clone(),
            table_id: order.table_id.clone(),
            kind,
            title,
            body,
        })
    }
}

/// 推送通道
#[async_trait]
pub trait PushDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &PushNotification) -> Result<(), PushError>;
}

/// 只写日志的推送实现（未配置推送服务时使用）
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl PushDispatcher for LogDispatcher {
    async fn dispatch(&self, notification: &PushNotification) -> Result<(), PushError> {
        tracing::info!(
            shop_id = %notification.shop_id,
            order_id = %notification.order_id,
            kind = ?notification.kind,
            body = %notification.body,
            "Push notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        let mut order = Order::new("o1", "s1");
        order.order_number = "A-007".to_string();
        order.table_id = Some("t1".to_string());
        order
    }

    fn event(payload: EventPayload) -> OrderEvent {
        OrderEvent::new(1, "s1", "o1", "user-1", "Test User", "cmd-1", None, payload)
    }

    #[test]
    fn test_ready_notification() {
        let n = PushNotification::from_event(
            &event(EventPayload::OrderStatusChanged {
                from: OrderStatus::Preparing,
                to: OrderStatus::Ready,
            }),
            &order(),
        )
        .unwrap();
        assert_eq!(n.kind, NotificationKind::StatusChanged);
        assert_eq!(n.body, "Order A-007 is ready");
        assert_eq!(n.table_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_cancel_notification_carries_reason() {
        let n = PushNotification::from_event(
            &event(EventPayload::OrderCancelled {
                from: OrderStatus::Queued,
                reason: Some("out of stock".to_string()),
            }),
            &order(),
        )
        .unwrap();
        assert_eq!(n.kind, NotificationKind::OrderCancelled);
        assert!(n.body.ends_with("out of stock"));
    }

    #[test]
    fn test_billed_is_silent() {
        let n = PushNotification::from_event(
            &event(EventPayload::OrderBilled {
                bill_id: "b1".to_string(),
            }),
            &order(),
        );
        assert!(n.is_none());
    }
}

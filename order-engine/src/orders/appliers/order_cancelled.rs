//! OrderCancelled event applier

use crate::orders::appliers::touch;
use super::EventApplier;
use shared::order::{EventPayload, Order, OrderEvent, OrderStatus};

/// OrderCancelled applier
pub struct OrderCancelledApplier;

impl EventApplier for OrderCancelledApplier {
    fn apply(&self, order: &mut Order, event: &OrderEvent) {
        if let EventPayload::OrderCancelled { reason, .. } = &event.payload {
            order.status = OrderStatus::Cancelled;
            // 取消原因记在备注后面，原备注保留
            if let Some(reason) = reason {
                order.note = Some(match order.note.take() {
                    Some(note) => format!("{note}\n[cancelled] {reason}"),
                    None => format!("[cancelled] {reason}"),
                });
            }
            touch(order, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cancelled(reason: Option<&str>) -> OrderEvent {
        OrderEvent::new(
            3,
            "s1",
            "o1",
            "u1",
            "Ann",
            "cmd-3",
            None,
            EventPayload::OrderCancelled {
                from: OrderStatus::Preparing,
                reason: reason.map(str::to_string),
            },
        )
    }

    #[test]
    fn test_order_cancelled_sets_status() {
        let mut order = Order::new("o1", "s1");
        order.status = OrderStatus::Preparing;
        order.version = 2;

        OrderCancelledApplier.apply(&mut order, &cancelled(None));

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.version, 3);
        assert_eq!(order.note, None);
    }

    #[test]
    fn test_order_cancelled_keeps_note() {
        let mut order = Order::new("o1", "s1");
        order.note = Some("window seat".into());

        OrderCancelledApplier.apply(&mut order, &cancelled(Some("guest left")));

        assert_eq!(
            order.note.as_deref(),
            Some("window seat\n[cancelled] guest left")
        );
    }
}

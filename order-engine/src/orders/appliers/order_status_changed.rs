//! OrderStatusChanged event applier

use crate::orders::appliers::touch;
use super::EventApplier;
use shared::order::{EventPayload, Order, OrderEvent};

/// OrderStatusChanged applier
pub struct OrderStatusChangedApplier;

impl EventApplier for OrderStatusChangedApplier {
    fn apply(&self, order: &mut Order, event: &OrderEvent) {
        if let EventPayload::OrderStatusChanged { to, .. } = &event.payload {
            order.status = *to;
            touch(order, event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::OrderStatus;

    #[test]
    fn test_status_changed() {
        let mut order = Order::new("o1", "s1");
        order.version = 1;

        let event = OrderEvent::new(
            2,
            "s1",
            "o1",
            "u1",
            "Chef",
            "cmd-2",
            None,
            EventPayload::OrderStatusChanged {
                from: OrderStatus::Queued,
                to: OrderStatus::Preparing,
            },
        );
        OrderStatusChangedApplier.apply(&mut order, &event);

        assert_eq!(order.status, OrderStatus::Preparing);
        assert_eq!(order.version, 2);
    }

    #[test]
    fn test_ignores_other_payloads() {
        let mut order = Order::new("o1", "s1");
        let event = OrderEvent::new(
            2,
            "s1",
            "o1",
            "u1",
            "Chef",
            "cmd-2",
            None,
            EventPayload::OrderBilled { bill_id: "b1".into() },
        );
        OrderStatusChangedApplier.apply(&mut order, &event);
        assert_eq!(order.version, 0);
    }
}

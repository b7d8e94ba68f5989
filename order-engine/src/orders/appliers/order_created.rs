//! OrderCreated event applier

use crate::orders::appliers::touch;
use super::EventApplier;
use shared::order::{EventPayload, Order, OrderEvent, OrderStatus};

/// OrderCreated applier
pub struct OrderCreatedApplier;

impl EventApplier for OrderCreatedApplier {
    fn apply(&self, order: &mut Order, event: &OrderEvent) {
        if let EventPayload::OrderCreated {
            table_id,
            service_type,
            items,
            order_number,
            customer_name,
            customer_phone,
            note,
        } = &event.payload
        {
            order.id = event.order_id.clone();
            order.shop_id = event.shop_id.clone();
            order.table_id = table_id.clone();
            order.service_type = *service_type;
            order.items = items.clone();
            order.order_number = order_number.clone();
            order.customer_name = customer_name.clone();
            order.customer_phone = customer_phone.clone();
            order.note = note.clone();
            order.status = OrderStatus::Queued;
            order.bill_id = None;
            order.created_at = event.timestamp;

            touch(order, event);
        }
    }
}

//! OrderBilled event applier
//!
//! Attaches the order to a finalized bill. The order is frozen afterwards.

use crate::orders::appliers::touch;
use super::EventApplier;
use shared::order::{EventPayload, Order, OrderEvent};

/// OrderBilled applier
pub struct OrderBilledApplier;

impl EventApplier for OrderBilledApplier {
    fn apply(&self, order: &mut Order, event: &OrderEvent) {
        if let EventPayload::OrderBilled { bill_id } = &event.payload {
            order.bill_id = Some(bill_id.clone());
            touch(order, event);
        }
    }
}

//! Event applier implementations
//!
//! Each applier implements the `EventApplier` trait and handles
//! one specific event type. Appliers are PURE functions: every applier bumps
//! `version` by one and stamps `updated_at` with the event time, so replaying
//! the event log reproduces the stored record exactly.

use enum_dispatch::enum_dispatch;

use shared::order::{EventPayload, Order, OrderEvent};

mod order_billed;
mod order_cancelled;
mod order_created;
mod order_status_changed;

pub use order_billed::OrderBilledApplier;
pub use order_cancelled::OrderCancelledApplier;
pub use order_created::OrderCreatedApplier;
pub use order_status_changed::OrderStatusChangedApplier;

/// Folds one event into an order. Must be pure and deterministic so that
/// replaying the event log reproduces the stored record.
#[enum_dispatch]
pub trait EventApplier {
    fn apply(&self, order: &mut Order, event: &OrderEvent);
}

/// EventAction enum - dispatches to concrete applier implementations
///
/// Uses enum_dispatch for zero-cost static dispatch.
#[enum_dispatch(EventApplier)]
pub enum EventAction {
    OrderCreated(OrderCreatedApplier),
    OrderStatusChanged(OrderStatusChangedApplier),
    OrderCancelled(OrderCancelledApplier),
    OrderBilled(OrderBilledApplier),
}

/// Convert OrderEvent reference to EventAction
///
/// This is the ONLY place with a match on EventPayload.
impl From<&OrderEvent> for EventAction {
    fn from(event: &OrderEvent) -> Self {
        match &event.payload {
            EventPayload::OrderCreated { .. } => EventAction::OrderCreated(OrderCreatedApplier),
            EventPayload::OrderStatusChanged { .. } => {
                EventAction::OrderStatusChanged(OrderStatusChangedApplier)
            }
            EventPayload::OrderCancelled { .. } => {
                EventAction::OrderCancelled(OrderCancelledApplier)
            }
            EventPayload::OrderBilled { .. } => EventAction::OrderBilled(OrderBilledApplier),
        }
    }
}

/// Rebuild an order from its event log
pub fn replay(order_id: &str, shop_id: &str, events: &[OrderEvent]) -> Order {
    let mut order = Order::new(order_id, shop_id);
    for event in events {
        let action: EventAction = event.into();
        action.apply(&mut order, event);
    }
    order
}

/// Common bookkeeping for every applied event
pub(crate) fn touch(order: &mut Order, event: &OrderEvent) {
    order.version += 1;
    order.updated_at = event.timestamp;
}

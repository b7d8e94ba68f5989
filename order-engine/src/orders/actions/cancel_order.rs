//! CancelOrder command handler
//!
//! Cancels an order that has not been served or billed yet. Cancelling an
//! already-cancelled order succeeds without producing an event.

use async_trait::async_trait;

use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::order::{EventPayload, OrderEvent, OrderStatus};

/// CancelOrder action
#[derive(Debug, Clone)]
pub struct CancelOrderAction {
    pub order_id: String,
    pub reason: Option<String>,
}

#[async_trait]
impl CommandHandler for CancelOrderAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let order = ctx.load_order(&self.order_id)?;

        if order.status == OrderStatus::Cancelled {
            return Ok(vec![]);
        }
        if order.is_billed() {
            return Err(OrderError::InvalidTransition(format!(
                "order {} is attached to a bill",
                order.id
            )));
        }
        if !order.status.is_cancellable() {
            return Err(OrderError::InvalidTransition(format!(
                "cannot cancel a {} order",
                order.status
            )));
        }

        let reason = self
            .reason
            .as_ref()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let seq = ctx.next_sequence()?;
        let event = OrderEvent::new(
            seq,
            ctx.shop_id(),
            order.id.clone(),
            metadata.operator_id.clone(),
            metadata.operator_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            EventPayload::OrderCancelled {
                from: order.status,
                reason,
            },
        );

        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::actions::tests_support::{metadata, seed_order, seeded_store, today};

    fn cancel(reason: Option<&str>) -> CancelOrderAction {
        CancelOrderAction {
            order_id: "o1".to_string(),
            reason: reason.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_cancel_from_each_cancellable_status() {
        for status in [OrderStatus::Queued, OrderStatus::Preparing, OrderStatus::Ready] {
            let store = seeded_store();
            seed_order(&store, "o1", status, None);
            let txn = store.begin_write().unwrap();
            let mut ctx = CommandContext::new(&txn, &store, "s1", today());

            let events = cancel(Some(" guest left ")).execute(&mut ctx, &metadata()).await.unwrap();
            assert_eq!(
                events[0].payload,
                EventPayload::OrderCancelled {
                    from: status,
                    reason: Some("guest left".into()),
                }
            );
        }
    }

    #[tokio::test]
    async fn test_cancel_served_is_invalid() {
        let store = seeded_store();
        seed_order(&store, "o1", OrderStatus::Served, None);
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let result = cancel(None).execute(&mut ctx, &metadata()).await;
        assert!(matches!(result, Err(OrderError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_cancel_billed_is_invalid() {
        let store = seeded_store();
        seed_order(&store, "o1", OrderStatus::Queued, Some("b1"));
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let result = cancel(None).execute(&mut ctx, &metadata()).await;
        assert!(matches!(result, Err(OrderError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_cancel_twice_is_noop() {
        let store = seeded_store();
        seed_order(&store, "o1", OrderStatus::Cancelled, None);
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let events = cancel(None).execute(&mut ctx, &metadata()).await.unwrap();
        assert!(events.is_empty());
    }
}

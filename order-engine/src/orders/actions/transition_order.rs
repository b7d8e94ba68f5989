//! TransitionOrder command handler
//!
//! Moves an order exactly one step along
//! `queued → preparing → ready → served`. A target of `cancelled` is
//! routed to [`CancelOrderAction`].

use async_trait::async_trait;

use super::CancelOrderAction;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::order::{EventPayload, OrderEvent, OrderStatus};

/// TransitionOrder action
#[derive(Debug, Clone)]
pub struct TransitionOrderAction {
    pub order_id: String,
    pub target: OrderStatus,
    pub expected_version: Option<u64>,
}

#[async_trait]
impl CommandHandler for TransitionOrderAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let order = ctx.load_order(&self.order_id)?;

        if let Some(expected) = self.expected_version
            && expected != order.version
        {
            return Err(OrderError::Conflict(format!(
                "order {} is at version {}, expected {}",
                order.id, order.version, expected
            )));
        }

        if self.target == OrderStatus::Cancelled {
            return CancelOrderAction {
                order_id: self.order_id.clone(),
                reason: None,
            }
            .execute(ctx, metadata)
            .await;
        }

        if order.is_billed() {
            return Err(OrderError::InvalidTransition(format!(
                "order {} is attached to a bill",
                order.id
            )));
        }

        let (Some(current), Some(target)) = (order.status.rank(), self.target.rank()) else {
            return Err(OrderError::InvalidTransition(format!(
                "{} → {}",
                order.status, self.target
            )));
        };

        // 已经被别的终端推进过：报冲突而不是非法
        if target <= current {
            return Err(OrderError::Conflict(format!(
                "order {} is already {}",
                order.id, order.status
            )));
        }
        if target != current + 1 {
            return Err(OrderError::InvalidTransition(format!(
                "{} → {} skips a step",
                order.status, self.target
            )));
        }

        let seq = ctx.next_sequence()?;
        let event = OrderEvent::new(
            seq,
            ctx.shop_id(),
            order.id.clone(),
            metadata.operator_id.clone(),
            metadata.operator_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            EventPayload::OrderStatusChanged {
                from: order.status,
                to: self.target,
            },
        );

        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::actions::tests_support::{metadata, seed_order, seeded_store, today};
    use shared::order::OrderEventType;

    fn transition(target: OrderStatus) -> TransitionOrderAction {
        TransitionOrderAction {
            order_id: "o1".to_string(),
            target,
            expected_version: None,
        }
    }

    #[tokio::test]
    async fn test_single_step_forward() {
        let store = seeded_store();
        seed_order(&store, "o1", OrderStatus::Queued, None);
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let events = transition(OrderStatus::Preparing)
            .execute(&mut ctx, &metadata())
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, OrderEventType::OrderStatusChanged);
        assert_eq!(
            events[0].payload,
            EventPayload::OrderStatusChanged {
                from: OrderStatus::Queued,
                to: OrderStatus::Preparing,
            }
        );
    }

    #[tokio::test]
    async fn test_skipping_a_step_is_invalid() {
        let store = seeded_store();
        seed_order(&store, "o1", OrderStatus::Queued, None);
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let result = transition(OrderStatus::Ready)
            .execute(&mut ctx, &metadata())
            .await;
        assert!(matches!(result, Err(OrderError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_already_advanced_is_conflict() {
        let store = seeded_store();
        seed_order(&store, "o1", OrderStatus::Ready, None);
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let result = transition(OrderStatus::Ready)
            .execute(&mut ctx, &metadata())
            .await;
        assert!(matches!(result, Err(OrderError::Conflict(_))));

        let result = transition(OrderStatus::Preparing)
            .execute(&mut ctx, &metadata())
            .await;
        assert!(matches!(result, Err(OrderError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_stale_expected_version_is_conflict() {
        let store = seeded_store();
        seed_order(&store, "o1", OrderStatus::Queued, None);
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let mut action = transition(OrderStatus::Preparing);
        action.expected_version = Some(7);
        let result = action.execute(&mut ctx, &metadata()).await;
        assert!(matches!(result, Err(OrderError::Conflict(_))));

        action.expected_version = Some(1);
        assert!(action.execute(&mut ctx, &metadata()).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_and_billed_are_frozen() {
        let store = seeded_store();
        seed_order(&store, "o1", OrderStatus::Cancelled, None);
        seed_order(&store, "o2", OrderStatus::Preparing, Some("b1"));
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let result = transition(OrderStatus::Preparing)
            .execute(&mut ctx, &metadata())
            .await;
        assert!(matches!(result, Err(OrderError::InvalidTransition(_))));

        let mut billed = transition(OrderStatus::Ready);
        billed.order_id = "o2".into();
        let result = billed.execute(&mut ctx, &metadata()).await;
        assert!(matches!(result, Err(OrderError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_cancel_target_routes_to_cancel() {
        let store = seeded_store();
        seed_order(&store, "o1", OrderStatus::Preparing, None);
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let events = transition(OrderStatus::Cancelled)
            .execute(&mut ctx, &metadata())
            .await
            .unwrap();
        assert_eq!(events[0].event_type, OrderEventType::OrderCancelled);
    }

    #[tokio::test]
    async fn test_missing_order() {
        let store = seeded_store();
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let result = transition(OrderStatus::Preparing)
            .execute(&mut ctx, &metadata())
            .await;
        assert!(matches!(result, Err(OrderError::NotFound(_))));
    }
}

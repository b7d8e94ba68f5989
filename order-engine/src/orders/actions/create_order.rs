//! CreateOrder command handler
//!
//! Places a new order. Prices are snapshotted from the menu inside the
//! transaction, so an item marked sold out before commit rejects the order.

use async_trait::async_trait;

use crate::availability::resolve_items;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use crate::tables;
use shared::order::{EventPayload, OrderEvent, OrderItemInput, ServiceType};

/// CreateOrder action
#[derive(Debug, Clone)]
pub struct CreateOrderAction {
    pub table_id: Option<String>,
    pub service_type: ServiceType,
    pub items: Vec<OrderItemInput>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub note: Option<String>,
    pub session_otp: Option<String>,
}

#[async_trait]
impl CommandHandler for CreateOrderAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        // 1. Table binding matches service type
        let table_id = match (self.service_type.requires_table(), &self.table_id) {
            (true, Some(id)) if !id.trim().is_empty() => Some(id.clone()),
            (true, _) => {
                return Err(OrderError::Validation(
                    "dine-in orders require a table".to_string(),
                ));
            }
            (false, Some(_)) => {
                return Err(OrderError::Validation(
                    "takeaway and delivery orders cannot have a table".to_string(),
                ));
            }
            (false, None) => None,
        };

        let settings = ctx.settings()?;

        // 2. Table must exist and accept orders
        if let Some(table_id) = &table_id {
            let table = ctx.load_table(table_id)?;
            tables::ensure_accepts_orders(table.status)?;

            if settings.enable_otp
                && let Some(expected) = &table.session_otp
                && self.session_otp.as_ref() != Some(expected)
            {
                return Err(OrderError::Validation("invalid session code".to_string()));
            }
        }

        // 3. Authoritative availability + price snapshot
        let items = resolve_items(ctx, &self.items, settings.max_item_quantity)?;

        // 4. Allocate ids
        let order_id = shared::util::new_id();
        let order_number = ctx.next_order_number()?;
        let seq = ctx.next_sequence()?;

        let event = OrderEvent::new(
            seq,
            ctx.shop_id(),
            order_id,
            metadata.operator_id.clone(),
            metadata.operator_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            EventPayload::OrderCreated {
                table_id,
                service_type: self.service_type,
                items,
                order_number,
                customer_name: self.customer_name.clone(),
                customer_phone: self.customer_phone.clone(),
                note: self.note.clone(),
            },
        );

        Ok(vec![event])
    }
}

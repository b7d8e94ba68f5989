//! BillTable / BillOrder command handlers
//!
//! Both close a session: compute the bill from the open orders, persist it,
//! and attach every contributing order to it with an `OrderBilled` event.
//! Contributing orders are frozen afterwards.

use async_trait::async_trait;

use crate::billing::compute_bill;
use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use crate::tables;
use shared::models::{Bill, BillBreakdown, BillOptions};
use shared::order::{EventPayload, Order, OrderEvent, OrderStatus};

/// BillTable action - closes the table's session
#[derive(Debug, Clone)]
pub struct BillTableAction {
    pub table_id: String,
    pub options: BillOptions,
}

/// BillOrder action - standalone bill for a takeaway / delivery order
#[derive(Debug, Clone)]
pub struct BillOrderAction {
    pub order_id: String,
    pub options: BillOptions,
}

#[async_trait]
impl CommandHandler for BillTableAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let mut table = ctx.load_table(&self.table_id)?;
        let orders = ctx.orders_for_table(&self.table_id)?;
        let has_open_orders = orders.iter().any(Order::is_open);

        table.status = tables::bill(table.status, has_open_orders).map_err(|e| match e {
            tables::TableError::NoActiveOrders => OrderError::NoActiveOrders(self.table_id.clone()),
            other => other.into(),
        })?;

        let settings = ctx.settings()?;
        let breakdown = compute_bill(&orders, &settings, &self.options)?;
        let bill = build_bill(
            ctx,
            metadata,
            breakdown,
            &self.options,
            Some(self.table_id.clone()),
            None,
        )?;

        let events = attach_orders(ctx, metadata, &bill)?;
        table.bill_id = Some(bill.id.clone());
        ctx.save_table(table)?;
        ctx.add_bill(bill);
        Ok(events)
    }
}

#[async_trait]
impl CommandHandler for BillOrderAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let order = ctx.load_order(&self.order_id)?;

        if order.table_id.is_some() {
            return Err(OrderError::Validation(
                "dine-in orders are billed with their table".to_string(),
            ));
        }
        if order.is_billed() {
            return Err(OrderError::AlreadyBilled(format!("order {}", order.id)));
        }
        if order.status == OrderStatus::Cancelled {
            return Err(OrderError::EmptySession(format!(
                "order {} is cancelled",
                order.id
            )));
        }

        let settings = ctx.settings()?;
        let breakdown = compute_bill(std::slice::from_ref(&order), &settings, &self.options)?;
        let bill = build_bill(
            ctx,
            metadata,
            breakdown,
            &self.options,
            None,
            Some(order.id.clone()),
        )?;

        let events = attach_orders(ctx, metadata, &bill)?;
        ctx.add_bill(bill);
        Ok(events)
    }
}

fn build_bill(
    ctx: &CommandContext<'_>,
    metadata: &CommandMetadata,
    breakdown: BillBreakdown,
    options: &BillOptions,
    table_id: Option<String>,
    order_id: Option<String>,
) -> Result<Bill, OrderError> {
    let discount_reason = if breakdown.discount_amount.is_zero() {
        None
    } else {
        options.discount_reason.clone()
    };

    Ok(Bill {
        id: shared::util::new_id(),
        shop_id: ctx.shop_id().to_string(),
        table_id,
        order_id,
        order_ids: breakdown.order_ids,
        lines: breakdown.lines,
        subtotal: breakdown.subtotal,
        discount_amount: breakdown.discount_amount,
        discount_reason,
        tax_rate: breakdown.tax_rate,
        tax_included: breakdown.tax_included,
        tax_amount: breakdown.tax_amount,
        service_charge_rate: breakdown.service_charge_rate,
        service_charge_amount: breakdown.service_charge_amount,
        grand_total: breakdown.grand_total,
        currency: breakdown.currency,
        payment_method: options.payment_method.clone(),
        bill_number: ctx.next_bill_number()?,
        created_at: shared::util::now_millis(),
        created_by: metadata.operator_name.clone(),
        version: 1,
    })
}

/// One `OrderBilled` event per contributing order
fn attach_orders(
    ctx: &CommandContext<'_>,
    metadata: &CommandMetadata,
    bill: &Bill,
) -> Result<Vec<OrderEvent>, OrderError> {
    let mut events = Vec::with_capacity(bill.order_ids.len());
    for order_id in &bill.order_ids {
        let seq = ctx.next_sequence()?;
        events.push(OrderEvent::new(
            seq,
            ctx.shop_id(),
            order_id.clone(),
            metadata.operator_id.clone(),
            metadata.operator_name.clone(),
            metadata.command_id.clone(),
            Some(metadata.timestamp),
            EventPayload::OrderBilled {
                bill_id: bill.id.clone(),
            },
        ));
    }
    Ok(events)
}

//! Command action implementations
//!
//! Each action implements the `CommandHandler` trait and handles
//! one specific command type.

use async_trait::async_trait;

use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::order::{OrderCommand, OrderCommandPayload, OrderEvent};

mod bill_session;
mod cancel_order;
mod clear_table;
mod create_order;
mod set_item_availability;
mod transition_order;

pub use bill_session::{BillOrderAction, BillTableAction};
pub use cancel_order::CancelOrderAction;
pub use clear_table::ClearTableAction;
pub use create_order::CreateOrderAction;
pub use set_item_availability::SetItemAvailabilityAction;
pub use transition_order::TransitionOrderAction;

/// CommandAction enum - dispatches to concrete action implementations
pub enum CommandAction {
    CreateOrder(CreateOrderAction),
    TransitionOrder(TransitionOrderAction),
    CancelOrder(CancelOrderAction),
    BillTable(BillTableAction),
    BillOrder(BillOrderAction),
    ClearTable(ClearTableAction),
    SetItemAvailability(SetItemAvailabilityAction),
}

/// Manual implementation of CommandHandler for CommandAction
#[async_trait]
impl CommandHandler for CommandAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        match self {
            CommandAction::CreateOrder(action) => action.execute(ctx, metadata).await,
            CommandAction::TransitionOrder(action) => action.execute(ctx, metadata).await,
            CommandAction::CancelOrder(action) => action.execute(ctx, metadata).await,
            CommandAction::BillTable(action) => action.execute(ctx, metadata).await,
            CommandAction::BillOrder(action) => action.execute(ctx, metadata).await,
            CommandAction::ClearTable(action) => action.execute(ctx, metadata).await,
            CommandAction::SetItemAvailability(action) => action.execute(ctx, metadata).await,
        }
    }
}

/// Convert OrderCommand to CommandAction
///
/// This is the ONLY place with a match on OrderCommandPayload.
impl From<&OrderCommand> for CommandAction {
    fn from(cmd: &OrderCommand) -> Self {
        match &cmd.payload {
            OrderCommandPayload::CreateOrder {
                table_id,
                service_type,
                items,
                customer_name,
                customer_phone,
                note,
                session_otp,
            } => CommandAction::CreateOrder(CreateOrderAction {
                table_id: table_id.clone(),
                service_type: *service_type,
                items: items.clone(),
                customer_name: customer_name.clone(),
                customer_phone: customer_phone.clone(),
                note: note.clone(),
                session_otp: session_otp.clone(),
            }),
            OrderCommandPayload::TransitionOrder {
                order_id,
                target,
                expected_version,
            } => CommandAction::TransitionOrder(TransitionOrderAction {
                order_id: order_id.clone(),
                target: *target,
                expected_version: *expected_version,
            }),
            OrderCommandPayload::CancelOrder { order_id, reason } => {
                CommandAction::CancelOrder(CancelOrderAction {
                    order_id: order_id.clone(),
                    reason: reason.clone(),
                })
            }
            OrderCommandPayload::BillTable { table_id, options } => {
                CommandAction::BillTable(BillTableAction {
                    table_id: table_id.clone(),
                    options: options.clone(),
                })
            }
            OrderCommandPayload::BillOrder { order_id, options } => {
                CommandAction::BillOrder(BillOrderAction {
                    order_id: order_id.clone(),
                    options: options.clone(),
                })
            }
            OrderCommandPayload::ClearTable { table_id } => {
                CommandAction::ClearTable(ClearTableAction {
                    table_id: table_id.clone(),
                })
            }
            OrderCommandPayload::SetItemAvailability {
                menu_item_id,
                is_available,
            } => CommandAction::SetItemAvailability(SetItemAvailabilityAction {
                menu_item_id: menu_item_id.clone(),
                is_available: *is_available,
            }),
        }
    }
}

//! ClearTable command handler
//!
//! Returns a billed (or fully cancelled) table to `empty` and rotates its
//! session code. Produces no order events.

use async_trait::async_trait;

use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use crate::tables;
use shared::models::TableStatus;
use shared::order::{Order, OrderEvent};

/// ClearTable action
#[derive(Debug, Clone)]
pub struct ClearTableAction {
    pub table_id: String,
}

#[async_trait]
impl CommandHandler for ClearTableAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let mut table = ctx.load_table(&self.table_id)?;
        if table.status == TableStatus::Empty {
            return Ok(vec![]);
        }

        let has_open_orders = ctx
            .orders_for_table(&self.table_id)?
            .iter()
            .any(Order::is_open);
        table.status = tables::clear(table.status, has_open_orders)?;
        table.bill_id = None;

        // 清台后轮换会话验证码
        if ctx.settings()?.enable_otp {
            table.session_otp = Some(shared::util::session_otp());
        }
        ctx.save_table(table)?;

        Ok(vec![])
    }
}

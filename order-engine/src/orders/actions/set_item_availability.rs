//! SetItemAvailability command handler
//!
//! Marks a menu item sold out (or back in stock). Produces no order events;
//! the menu item record change is broadcast on the shop topic.

use async_trait::async_trait;

use crate::orders::traits::{CommandContext, CommandHandler, CommandMetadata, OrderError};
use shared::order::OrderEvent;

/// SetItemAvailability action
#[derive(Debug, Clone)]
pub struct SetItemAvailabilityAction {
    pub menu_item_id: String,
    pub is_available: bool,
}

#[async_trait]
impl CommandHandler for SetItemAvailabilityAction {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        _metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let mut item = ctx.load_menu_item(&self.menu_item_id)?;
        if item.is_available != self.is_available {
            item.is_available = self.is_available;
            ctx.save_menu_item(item)?;
        }
        Ok(vec![])
    }
}

//! OrdersManager - Core command processing and event generation
//!
//! This module handles:
//! - Command validation and processing
//! - Event generation with per-shop sequence numbers
//! - Table status recompute in the same transaction
//! - Persistence to redb (transactional, compare-and-apply)
//! - Change broadcasting to topic subscribers
//!
//! # Command Flow
//!
//! ```text
//! execute_command(cmd)
//!     ├─ 1. Idempotency check (shop_id, command_id)
//!     ├─ 2. Begin write transaction
//!     ├─ 3. Create CommandContext
//!     ├─ 4. Convert command to action and execute
//!     ├─ 5. Apply events to orders via EventApplier
//!     ├─ 6. Recompute affected table status
//!     ├─ 7. Persist events and records
//!     ├─ 8. Mark command processed
//!     ├─ 9. Commit transaction
//!     ├─ 10. Broadcast domain events + record changes
//!     └─ 11. Return response with the written records
//! ```

mod error;
pub use error::*;

use super::actions::CommandAction;
use super::appliers::{self, EventAction};
use super::traits::{CommandContext, CommandHandler, CommandMetadata, EventApplier, OrderError};
use crate::billing::compute_bill;
use crate::message::MessageBus;
use crate::store::Store;
use crate::tables;
use shared::error::CommandResponse;
use shared::message::{ChangeEvent, RecordChange, Topic, TopicSnapshot};
use shared::models::{
    Bill, BillBreakdown, BillOptions, DiningTable, MenuItemAvailability, ShopSettings, TableStatus,
};
use shared::order::{Order, OrderCommand, OrderEvent};
use std::time::Duration;
use tokio::sync::broadcast;

/// Domain event channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Default deadline for one command, store round trip included
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// OrdersManager for command processing
///
/// The `epoch` field is a unique identifier generated on each startup.
/// Clients use it to detect server restarts and trigger full resync.
#[derive(Clone)]
pub struct OrdersManager {
    store: Store,
    bus: MessageBus,
    event_tx: broadcast::Sender<OrderEvent>,
    /// Server instance epoch - unique ID generated on startup
    epoch: String,
    command_timeout: Duration,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("store", &"<Store>")
            .field("event_tx", &"<broadcast::Sender>")
            .field("epoch", &self.epoch)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl OrdersManager {
    pub fn new(store: Store, bus: MessageBus) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let epoch = uuid::Uuid::new_v4().to_string();
        tracing::info!(epoch = %epoch, "OrdersManager started with new epoch");
        Self {
            store,
            bus,
            event_tx,
            epoch,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// In-memory store and bus (tests, demos)
    pub fn in_memory() -> ManagerResult<Self> {
        let store = Store::open_in_memory()?;
        let bus = MessageBus::new(store.clone());
        Ok(Self::new(store, bus))
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Get the server epoch (unique instance ID)
    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    /// Subscribe to domain event broadcasts
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.event_tx.subscribe()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Execute a command on a blocking worker, bounded by the command timeout
    ///
    /// On `Timeout` the command may still commit in the background; a retry
    /// with the same `command_id` is answered as a duplicate.
    pub async fn execute(&self, cmd: OrderCommand) -> CommandResponse {
        let command_id = cmd.command_id.clone();
        let manager = self.clone();
        let task = tokio::task::spawn_blocking(move || manager.execute_command(cmd));

        match tokio::time::timeout(self.command_timeout, task).await {
            Ok(Ok(response)) => response,
            Ok(Err(join_err)) => {
                tracing::error!(command_id = %command_id, error = %join_err, "Command task failed");
                CommandResponse::error(
                    command_id,
                    ManagerError::Internal(join_err.to_string()).into(),
                )
            }
            Err(_) => {
                tracing::warn!(command_id = %command_id, timeout = ?self.command_timeout, "Command timed out");
                CommandResponse::error(
                    command_id,
                    ManagerError::Timeout(self.command_timeout).into(),
                )
            }
        }
    }

    /// Execute a command and return the response
    pub fn execute_command(&self, cmd: OrderCommand) -> CommandResponse {
        match self.process_command(&cmd) {
            Ok((response, events)) => {
                // Broadcast after successful commit
                for event in events {
                    if self.event_tx.send(event).is_err() {
                        tracing::debug!("Event broadcast skipped: no active receivers");
                        break;
                    }
                }
                for record in &response.records {
                    self.bus.publish(&ChangeEvent::new(record.clone()));
                }
                response
            }
            Err(err) => {
                tracing::info!(
                    command_id = %cmd.command_id,
                    command = cmd.payload.name(),
                    error = %err,
                    "Command rejected"
                );
                CommandResponse::error(cmd.command_id, err.into())
            }
        }
    }

    /// Process command and return response with events
    fn process_command(
        &self,
        cmd: &OrderCommand,
    ) -> ManagerResult<(CommandResponse, Vec<OrderEvent>)> {
        tracing::debug!(command_id = %cmd.command_id, payload = ?cmd.payload, "Processing command");

        if cmd.shop_id.trim().is_empty() {
            return Err(OrderError::Validation("shop_id is required".to_string()).into());
        }

        // 1. Idempotency check (before transaction)
        if self
            .store
            .is_command_processed(&cmd.shop_id, &cmd.command_id)?
        {
            tracing::warn!(command_id = %cmd.command_id, "Duplicate command");
            return Ok((CommandResponse::duplicate(cmd.command_id.clone()), vec![]));
        }

        // 2. Begin write transaction
        let txn = self.store.begin_write()?;

        // Double-check idempotency within transaction
        if self
            .store
            .is_command_processed_txn(&txn, &cmd.shop_id, &cmd.command_id)?
        {
            return Ok((CommandResponse::duplicate(cmd.command_id.clone()), vec![]));
        }

        // 3. Create context and metadata
        let today = chrono::Utc::now().date_naive();
        let mut ctx = CommandContext::new(&txn, &self.store, cmd.shop_id.clone(), today);
        let metadata = CommandMetadata {
            command_id: cmd.command_id.clone(),
            operator_id: cmd.operator_id.clone(),
            operator_name: cmd.operator_name.clone(),
            timestamp: cmd.timestamp,
        };

        // 4. Convert to action and execute
        let action: CommandAction = cmd.into();
        let events = futures::executor::block_on(action.execute(&mut ctx, &metadata))?;

        // 5. Apply events to orders
        for event in &events {
            let mut order = match ctx.load_order(&event.order_id) {
                Ok(order) => order,
                Err(OrderError::NotFound(_)) => Order::new(event.order_id.clone(), cmd.shop_id.clone()),
                Err(e) => return Err(e.into()),
            };
            let applier: EventAction = event.into();
            applier.apply(&mut order, event);
            ctx.save_order(order)?;
        }

        // 6. Recompute table status for tables whose orders changed
        let mut table_ids: Vec<String> = ctx
            .modified_orders()
            .filter_map(|(order, _)| order.table_id.clone())
            .collect();
        table_ids.sort();
        table_ids.dedup();
        for table_id in table_ids {
            let mut table = ctx.load_table(&table_id)?;
            let has_open_orders = ctx
                .orders_for_table(&table_id)?
                .iter()
                .any(Order::is_open);
            let status = tables::derive_status(table.status, has_open_orders);
            if status != table.status {
                tracing::debug!(table_id = %table_id, from = %table.status, to = %status, "Table status changed");
                table.status = status;
                ctx.save_table(table)?;
            }
        }

        // 7. Persist events and records
        for event in &events {
            self.store.store_event(&txn, event)?;
        }

        let mut records = Vec::new();

        let mut orders: Vec<(&Order, u64)> = ctx.modified_orders().collect();
        orders.sort_by(|a, b| a.0.created_at.cmp(&b.0.created_at).then(a.0.id.cmp(&b.0.id)));
        for (order, base_version) in orders {
            self.store.put_order(&txn, order, base_version)?;
            records.push(RecordChange::Order(order.clone()));
        }
        for (table, base_version) in ctx.modified_tables() {
            self.store.put_table(&txn, table, base_version)?;
            records.push(RecordChange::Table(table.clone()));
        }
        for bill in ctx.new_bills() {
            self.store.insert_bill(&txn, bill)?;
            records.push(RecordChange::Bill(bill.clone()));
        }
        for (item, base_version) in ctx.modified_menu_items() {
            self.store.put_menu_item(&txn, item, base_version)?;
            records.push(RecordChange::MenuItem(item.clone()));
        }
        drop(ctx);

        // 8. Mark command processed
        self.store
            .mark_command_processed(&txn, &cmd.shop_id, &cmd.command_id)?;

        // 9. Commit transaction
        txn.commit().map_err(crate::store::StorageError::from)?;

        tracing::info!(
            command_id = %cmd.command_id,
            command = cmd.payload.name(),
            event_count = events.len(),
            record_count = records.len(),
            "Command processed successfully"
        );
        Ok((
            CommandResponse::success(cmd.command_id.clone(), records),
            events,
        ))
    }

    // ========== Bill Preview ==========

    /// Bill the table would get right now; writes nothing
    pub fn preview_table_bill(
        &self,
        shop_id: &str,
        table_id: &str,
        options: &BillOptions,
    ) -> ManagerResult<BillBreakdown> {
        let table = self
            .store
            .get_table(shop_id, table_id)?
            .ok_or_else(|| OrderError::NotFound(format!("Table {table_id}")))?;
        if table.status == TableStatus::Billed {
            return Err(OrderError::AlreadyBilled(format!("table {table_id}")).into());
        }
        let orders = self.store.orders_for_table(shop_id, table_id)?;
        let settings = self.store.get_settings(shop_id)?;
        Ok(compute_bill(&orders, &settings, options).map_err(OrderError::from)?)
    }

    /// Bill a standalone order would get right now; writes nothing
    pub fn preview_order_bill(
        &self,
        shop_id: &str,
        order_id: &str,
        options: &BillOptions,
    ) -> ManagerResult<BillBreakdown> {
        let order = self
            .store
            .get_order(shop_id, order_id)?
            .ok_or_else(|| OrderError::NotFound(format!("Order {order_id}")))?;
        if order.is_billed() {
            return Err(OrderError::AlreadyBilled(format!("order {order_id}")).into());
        }
        let settings = self.store.get_settings(shop_id)?;
        Ok(compute_bill(std::slice::from_ref(&order), &settings, options)
            .map_err(OrderError::from)?)
    }

    // ========== Administrative writes ==========
    // Not commands: no idempotency key, but still versioned and broadcast.

    pub fn upsert_table(&self, table: DiningTable) -> ManagerResult<DiningTable> {
        let table = self.store.upsert_table(table)?;
        self.bus
            .publish(&ChangeEvent::new(RecordChange::Table(table.clone())));
        Ok(table)
    }

    pub fn upsert_menu_item(&self, item: MenuItemAvailability) -> ManagerResult<MenuItemAvailability> {
        let item = self.store.upsert_menu_item(item)?;
        self.bus
            .publish(&ChangeEvent::new(RecordChange::MenuItem(item.clone())));
        Ok(item)
    }

    pub fn put_settings(&self, settings: ShopSettings) -> ManagerResult<ShopSettings> {
        Ok(self.store.put_settings(settings)?)
    }

    // ========== Public Query Methods ==========

    pub fn get_order(&self, shop_id: &str, order_id: &str) -> ManagerResult<Option<Order>> {
        Ok(self.store.get_order(shop_id, order_id)?)
    }

    pub fn list_orders(&self, shop_id: &str) -> ManagerResult<Vec<Order>> {
        Ok(self.store.list_orders(shop_id)?)
    }

    pub fn get_table(&self, shop_id: &str, table_id: &str) -> ManagerResult<Option<DiningTable>> {
        Ok(self.store.get_table(shop_id, table_id)?)
    }

    pub fn list_tables(&self, shop_id: &str) -> ManagerResult<Vec<DiningTable>> {
        Ok(self.store.list_tables(shop_id)?)
    }

    pub fn get_bill(&self, shop_id: &str, bill_id: &str) -> ManagerResult<Option<Bill>> {
        Ok(self.store.get_bill(shop_id, bill_id)?)
    }

    pub fn list_menu_items(&self, shop_id: &str) -> ManagerResult<Vec<MenuItemAvailability>> {
        Ok(self.store.list_menu_items(shop_id)?)
    }

    pub fn get_settings(&self, shop_id: &str) -> ManagerResult<ShopSettings> {
        Ok(self.store.get_settings(shop_id)?)
    }

    /// Get all events for a specific order
    pub fn get_events_for_order(
        &self,
        shop_id: &str,
        order_id: &str,
    ) -> ManagerResult<Vec<OrderEvent>> {
        Ok(self.store.get_events_for_order(shop_id, order_id)?)
    }

    /// Authoritative full view of a topic
    pub fn topic_snapshot(&self, topic: &Topic) -> ManagerResult<TopicSnapshot> {
        self.bus.snapshot(topic).map_err(|e| match e {
            crate::message::BusError::Snapshot(e) => ManagerError::Storage(e),
            other => ManagerError::Internal(other.to_string()),
        })
    }

    /// Rebuild an order from events (for verification)
    pub fn rebuild_order(&self, shop_id: &str, order_id: &str) -> ManagerResult<Order> {
        let events = self.store.get_events_for_order(shop_id, order_id)?;
        if events.is_empty() {
            return Err(OrderError::NotFound(format!("Order {order_id}")).into());
        }
        Ok(appliers::replay(order_id, shop_id, &events))
    }
}

#[cfg(test)]
mod tests;

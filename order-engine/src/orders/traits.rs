//! Command pipeline traits and the per-command write context
//!
//! Actions read and stage records through [`CommandContext`]; nothing is
//! written to redb until the manager persists the staged records at the end
//! of the command, inside the same write transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use redb::WriteTransaction;
use shared::error::UnavailableItem;
use shared::models::{Bill, DiningTable, MenuItemAvailability, ShopSettings};
use shared::order::{Order, OrderEvent};
use thiserror::Error;

use crate::billing::BillingError;
use crate::store::{StorageError, Store};
use crate::tables::TableError;

pub use crate::orders::appliers::EventApplier;

// ============================================================================
// Errors
// ============================================================================

/// Business-rule and lookup failures raised while executing a command
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Items unavailable: {0:?}")]
    ItemUnavailable(Vec<UnavailableItem>),

    #[error("No active orders on table {0}")]
    NoActiveOrders(String),

    #[error("Nothing to bill: {0}")]
    EmptySession(String),

    #[error("Already billed: {0}")]
    AlreadyBilled(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for OrderError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict { kind, id, .. } => {
                OrderError::Conflict(format!("{kind} {id} was modified concurrently"))
            }
            StorageError::Database(e) => OrderError::Unavailable(e.to_string()),
            StorageError::Transaction(e) => OrderError::Unavailable(e.to_string()),
            other => OrderError::Storage(other.to_string()),
        }
    }
}

impl From<BillingError> for OrderError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::EmptySession => OrderError::EmptySession(err.to_string()),
            other => OrderError::Validation(other.to_string()),
        }
    }
}

impl From<TableError> for OrderError {
    fn from(err: TableError) -> Self {
        match err {
            TableError::AlreadyBilled => OrderError::AlreadyBilled(err.to_string()),
            TableError::NoActiveOrders => OrderError::NoActiveOrders(err.to_string()),
            TableError::AwaitingClear => OrderError::Conflict(err.to_string()),
            TableError::OpenOrders(_) => OrderError::InvalidTransition(err.to_string()),
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Who issued the command and when (copied onto every event)
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    pub command_id: String,
    pub operator_id: String,
    pub operator_name: String,
    /// Client-side timestamp
    pub timestamp: i64,
}

// ============================================================================
// Context
// ============================================================================

/// A record loaded (or created) during the command, with the version it had
/// in the store. `base_version == 0` means the record did not exist.
#[derive(Debug, Clone)]
struct Staged<T> {
    base_version: u64,
    record: T,
    dirty: bool,
}

impl<T> Staged<T> {
    fn clean(base_version: u64, record: T) -> Self {
        Self {
            base_version,
            record,
            dirty: false,
        }
    }
}

/// Per-command view over the write transaction
pub struct CommandContext<'a> {
    txn: &'a WriteTransaction,
    store: &'a Store,
    shop_id: String,
    today: NaiveDate,
    orders: HashMap<String, Staged<Order>>,
    tables: HashMap<String, Staged<DiningTable>>,
    menu_items: HashMap<String, Staged<MenuItemAvailability>>,
    bills: Vec<Bill>,
    settings: Option<ShopSettings>,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        txn: &'a WriteTransaction,
        store: &'a Store,
        shop_id: impl Into<String>,
        today: NaiveDate,
    ) -> Self {
        Self {
            txn,
            store,
            shop_id: shop_id.into(),
            today,
            orders: HashMap::new(),
            tables: HashMap::new(),
            menu_items: HashMap::new(),
            bills: Vec::new(),
            settings: None,
        }
    }

    pub fn shop_id(&self) -> &str {
        &self.shop_id
    }

    // ========== Counters ==========

    pub fn next_sequence(&self) -> Result<u64, OrderError> {
        Ok(self.store.next_sequence(self.txn, &self.shop_id)?)
    }

    pub fn next_order_number(&self) -> Result<String, OrderError> {
        Ok(self
            .store
            .next_order_number(self.txn, &self.shop_id, self.today)?)
    }

    pub fn next_bill_number(&self) -> Result<String, OrderError> {
        Ok(self
            .store
            .next_bill_number(self.txn, &self.shop_id, self.today)?)
    }

    // ========== Settings ==========

    pub fn settings(&mut self) -> Result<ShopSettings, OrderError> {
        if let Some(settings) = &self.settings {
            return Ok(settings.clone());
        }
        let settings = self.store.get_settings_txn(self.txn, &self.shop_id)?;
        self.settings = Some(settings.clone());
        Ok(settings)
    }

    // ========== Orders ==========

    /// Load an order, preferring the staged copy
    pub fn load_order(&mut self, order_id: &str) -> Result<Order, OrderError> {
        if let Some(staged) = self.orders.get(order_id) {
            return Ok(staged.record.clone());
        }
        let order = self
            .store
            .get_order_txn(self.txn, &self.shop_id, order_id)?
            .ok_or_else(|| OrderError::NotFound(format!("Order {order_id}")))?;
        self.orders.insert(
            order_id.to_string(),
            Staged::clean(order.version, order.clone()),
        );
        Ok(order)
    }

    /// Stage an order for persistence. Versions are bumped by the appliers.
    pub fn save_order(&mut self, order: Order) -> Result<(), OrderError> {
        let base_version = match self.orders.get(&order.id) {
            Some(staged) => staged.base_version,
            None => self
                .store
                .get_order_txn(self.txn, &self.shop_id, &order.id)?
                .map(|o| o.version)
                .unwrap_or(0),
        };
        self.orders.insert(
            order.id.clone(),
            Staged {
                base_version,
                record: order,
                dirty: true,
            },
        );
        Ok(())
    }

    /// Every order on the table, staged copies taking precedence
    pub fn orders_for_table(&mut self, table_id: &str) -> Result<Vec<Order>, OrderError> {
        let stored = self
            .store
            .orders_for_table_txn(self.txn, &self.shop_id, table_id)?;

        let mut orders: Vec<Order> = stored
            .into_iter()
            .map(|o| match self.orders.get(&o.id) {
                Some(staged) => staged.record.clone(),
                None => o,
            })
            .collect();

        // staged orders that are not in the store yet
        for staged in self.orders.values() {
            let order = &staged.record;
            if staged.base_version == 0
                && order.table_id.as_deref() == Some(table_id)
                && !orders.iter().any(|o| o.id == order.id)
            {
                orders.push(order.clone());
            }
        }
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    // ========== Tables ==========

    pub fn load_table(&mut self, table_id: &str) -> Result<DiningTable, OrderError> {
        if let Some(staged) = self.tables.get(table_id) {
            return Ok(staged.record.clone());
        }
        let table = self
            .store
            .get_table_txn(self.txn, &self.shop_id, table_id)?
            .ok_or_else(|| OrderError::NotFound(format!("Table {table_id}")))?;
        self.tables.insert(
            table_id.to_string(),
            Staged::clean(table.version, table.clone()),
        );
        Ok(table)
    }

    /// Stage a loaded table. The version is bumped once per command.
    pub fn save_table(&mut self, mut table: DiningTable) -> Result<(), OrderError> {
        let base_version = match self.tables.get(&table.id) {
            Some(staged) => staged.base_version,
            None => {
                return Err(OrderError::Storage(format!(
                    "table {} saved without being loaded",
                    table.id
                )));
            }
        };
        table.version = base_version + 1;
        table.updated_at = shared::util::now_millis();
        self.tables.insert(
            table.id.clone(),
            Staged {
                base_version,
                record: table,
                dirty: true,
            },
        );
        Ok(())
    }

    // ========== Menu Items ==========

    /// `None` when the shop has no such item
    pub fn find_menu_item(
        &mut self,
        menu_item_id: &str,
    ) -> Result<Option<MenuItemAvailability>, OrderError> {
        if let Some(staged) = self.menu_items.get(menu_item_id) {
            return Ok(Some(staged.record.clone()));
        }
        let item = self
            .store
            .get_menu_item_txn(self.txn, &self.shop_id, menu_item_id)?;
        if let Some(item) = &item {
            self.menu_items.insert(
                menu_item_id.to_string(),
                Staged::clean(item.version, item.clone()),
            );
        }
        Ok(item)
    }

    pub fn load_menu_item(
        &mut self,
        menu_item_id: &str,
    ) -> Result<MenuItemAvailability, OrderError> {
        self.find_menu_item(menu_item_id)?
            .ok_or_else(|| OrderError::NotFound(format!("Menu item {menu_item_id}")))
    }

    pub fn save_menu_item(&mut self, mut item: MenuItemAvailability) -> Result<(), OrderError> {
        let base_version = match self.menu_items.get(&item.id) {
            Some(staged) => staged.base_version,
            None => {
                return Err(OrderError::Storage(format!(
                    "menu item {} saved without being loaded",
                    item.id
                )));
            }
        };
        item.version = base_version + 1;
        item.updated_at = shared::util::now_millis();
        self.menu_items.insert(
            item.id.clone(),
            Staged {
                base_version,
                record: item,
                dirty: true,
            },
        );
        Ok(())
    }

    // ========== Bills ==========

    pub fn add_bill(&mut self, bill: Bill) {
        self.bills.push(bill);
    }

    // ========== Staged output ==========

    /// Modified orders with the version they had in the store
    pub fn modified_orders(&self) -> impl Iterator<Item = (&Order, u64)> {
        self.orders
            .values()
            .filter(|s| s.dirty)
            .map(|s| (&s.record, s.base_version))
    }

    pub fn modified_tables(&self) -> impl Iterator<Item = (&DiningTable, u64)> {
        self.tables
            .values()
            .filter(|s| s.dirty)
            .map(|s| (&s.record, s.base_version))
    }

    pub fn modified_menu_items(&self) -> impl Iterator<Item = (&MenuItemAvailability, u64)> {
        self.menu_items
            .values()
            .filter(|s| s.dirty)
            .map(|s| (&s.record, s.base_version))
    }

    pub fn new_bills(&self) -> &[Bill] {
        &self.bills
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Validates a command against current state and produces events
#[async_trait]
pub trait CommandHandler {
    async fn execute(
        &self,
        ctx: &mut CommandContext<'_>,
        metadata: &CommandMetadata,
    ) -> Result<Vec<OrderEvent>, OrderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::TableStatus;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_load_missing_order_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let err = ctx.load_order("nope").unwrap_err();
        assert_eq!(err, OrderError::NotFound("Order nope".to_string()));
    }

    #[test]
    fn test_staged_order_visible_to_table_query() {
        let store = Store::open_in_memory().unwrap();
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let mut order = Order::new("o1", "s1");
        order.table_id = Some("t1".into());
        order.version = 1;
        ctx.save_order(order).unwrap();

        let orders = ctx.orders_for_table("t1").unwrap();
        assert_eq!(orders.len(), 1);
        let (_, base) = ctx.modified_orders().next().unwrap();
        assert_eq!(base, 0);
    }

    #[test]
    fn test_table_version_bumped_once_per_command() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_table(DiningTable::new("t1", "s1", "T1", 4))
            .unwrap();
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let mut table = ctx.load_table("t1").unwrap();
        table.status = TableStatus::Occupied;
        ctx.save_table(table).unwrap();
        let mut table = ctx.load_table("t1").unwrap();
        table.status = TableStatus::Billed;
        ctx.save_table(table).unwrap();

        let (table, base) = ctx.modified_tables().next().unwrap();
        assert_eq!(base, 1);
        assert_eq!(table.version, 2);
        assert_eq!(table.status, TableStatus::Billed);
    }

    #[test]
    fn test_storage_conflict_maps_to_conflict() {
        let err: OrderError = StorageError::VersionConflict {
            kind: "order",
            id: "o1".to_string(),
            expected: 1,
            found: 2,
        }
        .into();
        assert!(matches!(err, OrderError::Conflict(_)));
    }
}

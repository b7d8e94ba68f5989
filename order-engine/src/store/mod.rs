//! redb-based persistent store for the ordering engine
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `(shop_id, order_id)` | `Order` | Current order records |
//! | `table_orders` | `(shop_id, table_id, order_id)` | `()` | Orders placed against a table |
//! | `kitchen_orders` | `(shop_id, order_id)` | `()` | Orders still queued / preparing / ready |
//! | `order_events` | `(shop_id, order_id, sequence)` | `OrderEvent` | Event log (append-only) |
//! | `dining_tables` | `(shop_id, table_id)` | `DiningTable` | Tables with materialized status |
//! | `bills` | `(shop_id, bill_id)` | `Bill` | Finalized bills (insert-only) |
//! | `menu_items` | `(shop_id, item_id)` | `MenuItemAvailability` | Availability slice |
//! | `settings` | `shop_id` | `ShopSettings` | Tax / service charge |
//! | `processed_commands` | `(shop_id, command_id)` | `()` | Idempotency check |
//! | `counters` | `(shop_id, name)` | `u64` | Sequence, order / bill numbers |
//!
//! Every key starts with `shop_id`, so no lookup can cross shops. The two
//! order indexes are written by `put_order` in the caller's transaction.
//!
//! # Concurrency
//!
//! redb allows a single write transaction at a time. Every command reads and
//! writes inside one write transaction, which makes the version comparison in
//! the `put_*` helpers a true compare-and-apply.

use chrono::NaiveDate;
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::message::{RecordChange, Topic};
use shared::models::{Bill, DiningTable, MenuItemAvailability, ShopSettings, TableStatus};
use shared::order::{Order, OrderEvent};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

type RecordKey = (&'static str, &'static str);

const ORDERS_TABLE: TableDefinition<RecordKey, &[u8]> = TableDefinition::new("orders");

/// key = (shop_id, table_id, order_id)
const TABLE_ORDERS_TABLE: TableDefinition<(&str, &str, &str), ()> =
    TableDefinition::new("table_orders");

const KITCHEN_ORDERS_TABLE: TableDefinition<RecordKey, ()> =
    TableDefinition::new("kitchen_orders");

/// key = (shop_id, order_id, sequence)
const ORDER_EVENTS_TABLE: TableDefinition<(&str, &str, u64), &[u8]> =
    TableDefinition::new("order_events");

const DINING_TABLES_TABLE: TableDefinition<RecordKey, &[u8]> =
    TableDefinition::new("dining_tables");

const BILLS_TABLE: TableDefinition<RecordKey, &[u8]> = TableDefinition::new("bills");

const MENU_ITEMS_TABLE: TableDefinition<RecordKey, &[u8]> = TableDefinition::new("menu_items");

const SETTINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("settings");

const PROCESSED_COMMANDS_TABLE: TableDefinition<RecordKey, ()> =
    TableDefinition::new("processed_commands");

const COUNTERS_TABLE: TableDefinition<RecordKey, u64> = TableDefinition::new("counters");

const SEQUENCE_KEY: &str = "seq";
const ORDER_NUMBER_KEY: &str = "order_number";
const ORDER_DATE_KEY: &str = "order_date";
const BILL_NUMBER_KEY: &str = "bill_number";
const BILL_DATE_KEY: &str = "bill_date";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{kind} {id} version conflict: expected {expected}, found {found}")]
    VersionConflict {
        kind: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Record stored under a `(shop_id, id)` key with a version counter
trait StoredRecord: Serialize + DeserializeOwned {
    const KIND: &'static str;
    fn shop_id(&self) -> &str;
    fn id(&self) -> &str;
    fn version(&self) -> u64;
}

impl StoredRecord for Order {
    const KIND: &'static str = "order";
    fn shop_id(&self) -> &str {
        &self.shop_id
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
}

impl StoredRecord for DiningTable {
    const KIND: &'static str = "table";
    fn shop_id(&self) -> &str {
        &self.shop_id
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
}

impl StoredRecord for Bill {
    const KIND: &'static str = "bill";
    fn shop_id(&self) -> &str {
        &self.shop_id
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
}

impl StoredRecord for MenuItemAvailability {
    const KIND: &'static str = "menu_item";
    fn shop_id(&self) -> &str {
        &self.shop_id
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
}

fn get_record<T, R>(table: &R, shop_id: &str, id: &str) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<RecordKey, &'static [u8]>,
{
    match table.get((shop_id, id))? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// All records of one shop (keys are sorted, so the shop prefix is contiguous)
fn scan_shop<T, R>(table: &R, shop_id: &str) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<RecordKey, &'static [u8]>,
{
    let mut records = Vec::new();
    for entry in table.range((shop_id, "")..)? {
        let (key, value) = entry?;
        if key.value().0 != shop_id {
            break;
        }
        records.push(serde_json::from_slice(value.value())?);
    }
    Ok(records)
}

/// Order ids filed under one table
fn table_order_ids<R>(index: &R, shop_id: &str, table_id: &str) -> StorageResult<Vec<String>>
where
    R: ReadableTable<(&'static str, &'static str, &'static str), ()>,
{
    let mut ids = Vec::new();
    for entry in index.range((shop_id, table_id, "")..)? {
        let (key, _) = entry?;
        let (shop, table, order_id) = key.value();
        if shop != shop_id || table != table_id {
            break;
        }
        ids.push(order_id.to_string());
    }
    Ok(ids)
}

/// Ids under one shop prefix of a key-only index
fn shop_ids<R>(index: &R, shop_id: &str) -> StorageResult<Vec<String>>
where
    R: ReadableTable<RecordKey, ()>,
{
    let mut ids = Vec::new();
    for entry in index.range((shop_id, "")..)? {
        let (key, _) = entry?;
        let (shop, id) = key.value();
        if shop != shop_id {
            break;
        }
        ids.push(id.to_string());
    }
    Ok(ids)
}

/// Resolve order ids, oldest first
fn load_orders<R>(table: &R, shop_id: &str, ids: &[String]) -> StorageResult<Vec<Order>>
where
    R: ReadableTable<RecordKey, &'static [u8]>,
{
    let mut orders = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(order) = get_record::<Order, _>(table, shop_id, id)? {
            orders.push(order);
        }
    }
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    Ok(orders)
}

/// Keep the order indexes in step with the record
///
/// `table_id` never changes after creation, so the table entry is only
/// ever inserted.
fn index_order(txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
    if let Some(table_id) = &order.table_id {
        let mut by_table = txn.open_table(TABLE_ORDERS_TABLE)?;
        by_table.insert(
            (order.shop_id.as_str(), table_id.as_str(), order.id.as_str()),
            (),
        )?;
    }
    let mut kitchen = txn.open_table(KITCHEN_ORDERS_TABLE)?;
    let key = (order.shop_id.as_str(), order.id.as_str());
    if order.status.is_cancellable() {
        kitchen.insert(key, ())?;
    } else {
        kitchen.remove(key)?;
    }
    Ok(())
}

/// Compare-and-apply write
///
/// `expected_version` is the version the caller read (0 = must not exist yet).
fn put_versioned<T: StoredRecord>(
    txn: &WriteTransaction,
    definition: TableDefinition<'static, RecordKey, &'static [u8]>,
    record: &T,
    expected_version: u64,
) -> StorageResult<()> {
    let mut table = txn.open_table(definition)?;
    let found = match table.get((record.shop_id(), record.id()))? {
        Some(value) => serde_json::from_slice::<T>(value.value())?.version(),
        None => 0,
    };
    if found != expected_version {
        return Err(StorageError::VersionConflict {
            kind: T::KIND,
            id: record.id().to_string(),
            expected: expected_version,
            found,
        });
    }
    let value = serde_json::to_vec(record)?;
    table.insert((record.shop_id(), record.id()), value.as_slice())?;
    Ok(())
}

fn date_key(date: NaiveDate) -> u64 {
    date.format("%Y%m%d")
        .to_string()
        .parse()
        .unwrap_or_default()
}

/// Store backed by redb
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns the write survives a power loss.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, demos)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(TABLE_ORDERS_TABLE)?;
            let _ = write_txn.open_table(KITCHEN_ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_EVENTS_TABLE)?;
            let _ = write_txn.open_table(DINING_TABLES_TABLE)?;
            let _ = write_txn.open_table(BILLS_TABLE)?;
            let _ = write_txn.open_table(MENU_ITEMS_TABLE)?;
            let _ = write_txn.open_table(SETTINGS_TABLE)?;
            let _ = write_txn.open_table(PROCESSED_COMMANDS_TABLE)?;
            let _ = write_txn.open_table(COUNTERS_TABLE)?;
        }
        Self::rebuild_order_indexes(&write_txn)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Fill empty order indexes from the order records (databases written
    /// before the indexes existed)
    fn rebuild_order_indexes(txn: &WriteTransaction) -> StorageResult<()> {
        let orders = txn.open_table(ORDERS_TABLE)?;
        let indexed = !txn.open_table(TABLE_ORDERS_TABLE)?.is_empty()?
            || !txn.open_table(KITCHEN_ORDERS_TABLE)?.is_empty()?;
        if indexed || orders.is_empty()? {
            return Ok(());
        }

        let mut rebuilt = 0usize;
        for entry in orders.iter()? {
            let (_, value) = entry?;
            let order: Order = serde_json::from_slice(value.value())?;
            index_order(txn, &order)?;
            rebuilt += 1;
        }
        tracing::info!(orders = rebuilt, "Rebuilt order indexes");
        Ok(())
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Counters ==========

    fn read_counter(
        table: &impl ReadableTable<RecordKey, u64>,
        shop_id: &str,
        name: &str,
    ) -> StorageResult<u64> {
        Ok(table.get((shop_id, name))?.map(|g| g.value()).unwrap_or(0))
    }

    /// Increment and return the per-shop event sequence
    pub fn next_sequence(&self, txn: &WriteTransaction, shop_id: &str) -> StorageResult<u64> {
        let mut table = txn.open_table(COUNTERS_TABLE)?;
        let next = Self::read_counter(&table, shop_id, SEQUENCE_KEY)? + 1;
        table.insert((shop_id, SEQUENCE_KEY), next)?;
        Ok(next)
    }

    /// Get current sequence (read-only)
    pub fn current_sequence(&self, shop_id: &str) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COUNTERS_TABLE)?;
        Self::read_counter(&table, shop_id, SEQUENCE_KEY)
    }

    /// Daily counter that restarts at 1 when the date changes
    fn next_daily(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
        date: NaiveDate,
        date_name: &str,
        counter_name: &str,
    ) -> StorageResult<u64> {
        let today = date_key(date);
        let mut table = txn.open_table(COUNTERS_TABLE)?;
        let stored_date = Self::read_counter(&table, shop_id, date_name)?;
        let next = if stored_date != today {
            table.insert((shop_id, date_name), today)?;
            1
        } else {
            Self::read_counter(&table, shop_id, counter_name)? + 1
        };
        table.insert((shop_id, counter_name), next)?;
        Ok(next)
    }

    /// 取餐号 `A-###`, display only (wraps after 999, collisions tolerated)
    pub fn next_order_number(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
        date: NaiveDate,
    ) -> StorageResult<String> {
        let n = self.next_daily(txn, shop_id, date, ORDER_DATE_KEY, ORDER_NUMBER_KEY)?;
        Ok(format!("A-{:03}", (n - 1) % 999 + 1))
    }

    /// 账单号 `B{yyyymmdd}-{n:04}`
    pub fn next_bill_number(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
        date: NaiveDate,
    ) -> StorageResult<String> {
        let n = self.next_daily(txn, shop_id, date, BILL_DATE_KEY, BILL_NUMBER_KEY)?;
        Ok(format!("B{}-{:04}", date.format("%Y%m%d"), n))
    }

    // ========== Command Idempotency ==========

    /// Check if a command has been processed
    pub fn is_command_processed(&self, shop_id: &str, command_id: &str) -> StorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROCESSED_COMMANDS_TABLE)?;
        Ok(table.get((shop_id, command_id))?.is_some())
    }

    /// Check if a command has been processed (within transaction)
    pub fn is_command_processed_txn(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
        command_id: &str,
    ) -> StorageResult<bool> {
        let table = txn.open_table(PROCESSED_COMMANDS_TABLE)?;
        Ok(table.get((shop_id, command_id))?.is_some())
    }

    /// Mark a command as processed
    pub fn mark_command_processed(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
        command_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PROCESSED_COMMANDS_TABLE)?;
        table.insert((shop_id, command_id), ())?;
        Ok(())
    }

    // ========== Orders ==========

    pub fn get_order(&self, shop_id: &str, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        get_record(&table, shop_id, order_id)
    }

    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        get_record(&table, shop_id, order_id)
    }

    pub fn put_order(
        &self,
        txn: &WriteTransaction,
        order: &Order,
        expected_version: u64,
    ) -> StorageResult<()> {
        put_versioned(txn, ORDERS_TABLE, order, expected_version)?;
        index_order(txn, order)
    }

    pub fn list_orders(&self, shop_id: &str) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        let mut orders: Vec<Order> = scan_shop(&table, shop_id)?;
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    /// Orders placed against a table, oldest first
    pub fn orders_for_table(&self, shop_id: &str, table_id: &str) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TABLE_ORDERS_TABLE)?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        let ids = table_order_ids(&index, shop_id, table_id)?;
        load_orders(&table, shop_id, &ids)
    }

    /// Orders placed against a table, oldest first (within transaction)
    pub fn orders_for_table_txn(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
        table_id: &str,
    ) -> StorageResult<Vec<Order>> {
        let ids = {
            let index = txn.open_table(TABLE_ORDERS_TABLE)?;
            table_order_ids(&index, shop_id, table_id)?
        };
        let table = txn.open_table(ORDERS_TABLE)?;
        load_orders(&table, shop_id, &ids)
    }

    // ========== Order Events ==========

    /// Append an event to the log
    pub fn store_event(&self, txn: &WriteTransaction, event: &OrderEvent) -> StorageResult<()> {
        let mut table = txn.open_table(ORDER_EVENTS_TABLE)?;
        let key = (event.shop_id.as_str(), event.order_id.as_str(), event.sequence);
        let value = serde_json::to_vec(event)?;
        table.insert(key, value.as_slice())?;
        Ok(())
    }

    /// Get all events for an order, in sequence order
    pub fn get_events_for_order(
        &self,
        shop_id: &str,
        order_id: &str,
    ) -> StorageResult<Vec<OrderEvent>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDER_EVENTS_TABLE)?;

        let mut events = Vec::new();
        let range_start = (shop_id, order_id, 0u64);
        let range_end = (shop_id, order_id, u64::MAX);
        for result in table.range(range_start..=range_end)? {
            let (_key, value) = result?;
            let event: OrderEvent = serde_json::from_slice(value.value())?;
            events.push(event);
        }

        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    // ========== Dining Tables ==========

    pub fn get_table(&self, shop_id: &str, table_id: &str) -> StorageResult<Option<DiningTable>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DINING_TABLES_TABLE)?;
        get_record(&table, shop_id, table_id)
    }

    pub fn get_table_txn(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
        table_id: &str,
    ) -> StorageResult<Option<DiningTable>> {
        let table = txn.open_table(DINING_TABLES_TABLE)?;
        get_record(&table, shop_id, table_id)
    }

    pub fn put_table(
        &self,
        txn: &WriteTransaction,
        dining_table: &DiningTable,
        expected_version: u64,
    ) -> StorageResult<()> {
        put_versioned(txn, DINING_TABLES_TABLE, dining_table, expected_version)
    }

    pub fn list_tables(&self, shop_id: &str) -> StorageResult<Vec<DiningTable>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DINING_TABLES_TABLE)?;
        scan_shop(&table, shop_id)
    }

    // ========== Bills ==========

    pub fn get_bill(&self, shop_id: &str, bill_id: &str) -> StorageResult<Option<Bill>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BILLS_TABLE)?;
        get_record(&table, shop_id, bill_id)
    }

    /// Bills are immutable: inserting an existing id is a conflict
    pub fn insert_bill(&self, txn: &WriteTransaction, bill: &Bill) -> StorageResult<()> {
        put_versioned(txn, BILLS_TABLE, bill, 0)
    }

    pub fn list_bills(&self, shop_id: &str) -> StorageResult<Vec<Bill>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BILLS_TABLE)?;
        let mut bills: Vec<Bill> = scan_shop(&table, shop_id)?;
        bills.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bills)
    }

    // ========== Menu Items ==========

    pub fn get_menu_item(
        &self,
        shop_id: &str,
        item_id: &str,
    ) -> StorageResult<Option<MenuItemAvailability>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MENU_ITEMS_TABLE)?;
        get_record(&table, shop_id, item_id)
    }

    pub fn get_menu_item_txn(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
        item_id: &str,
    ) -> StorageResult<Option<MenuItemAvailability>> {
        let table = txn.open_table(MENU_ITEMS_TABLE)?;
        get_record(&table, shop_id, item_id)
    }

    pub fn put_menu_item(
        &self,
        txn: &WriteTransaction,
        item: &MenuItemAvailability,
        expected_version: u64,
    ) -> StorageResult<()> {
        put_versioned(txn, MENU_ITEMS_TABLE, item, expected_version)
    }

    pub fn list_menu_items(&self, shop_id: &str) -> StorageResult<Vec<MenuItemAvailability>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MENU_ITEMS_TABLE)?;
        scan_shop(&table, shop_id)
    }

    // ========== Settings ==========

    /// Shop settings, or defaults when the shop never saved any
    pub fn get_settings(&self, shop_id: &str) -> StorageResult<ShopSettings> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SETTINGS_TABLE)?;
        match table.get(shop_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Ok(ShopSettings::defaults(shop_id)),
        }
    }

    pub fn get_settings_txn(
        &self,
        txn: &WriteTransaction,
        shop_id: &str,
    ) -> StorageResult<ShopSettings> {
        let table = txn.open_table(SETTINGS_TABLE)?;
        match table.get(shop_id)? {
            Some(value) => Ok(serde_json::from_slice(value.value())?),
            None => Ok(ShopSettings::defaults(shop_id)),
        }
    }

    // ========== Administrative seeding ==========
    // 桌台 / 菜品 / 设置由管理端维护，这里只提供写入入口

    /// Create a table, or redefine an existing one, bumping its version
    ///
    /// An existing table only takes `label` and `seats` from the input; its
    /// session state is owned by the command pipeline. New tables start empty.
    pub fn upsert_table(&self, definition: DiningTable) -> StorageResult<DiningTable> {
        let txn = self.db.begin_write()?;
        let (mut dining_table, current) =
            match self.get_table_txn(&txn, &definition.shop_id, &definition.id)? {
                Some(mut existing) => {
                    let version = existing.version;
                    existing.redefine(&definition);
                    (existing, version)
                }
                None => {
                    let mut created = definition;
                    created.status = TableStatus::Empty;
                    created.bill_id = None;
                    (created, 0)
                }
            };
        dining_table.version = current + 1;
        dining_table.updated_at = shared::util::now_millis();
        self.put_table(&txn, &dining_table, current)?;
        txn.commit()?;
        Ok(dining_table)
    }

    /// Create or replace a menu item, bumping its version
    pub fn upsert_menu_item(
        &self,
        mut item: MenuItemAvailability,
    ) -> StorageResult<MenuItemAvailability> {
        let txn = self.db.begin_write()?;
        let current = self
            .get_menu_item_txn(&txn, &item.shop_id, &item.id)?
            .map(|i| i.version)
            .unwrap_or(0);
        item.version = current + 1;
        item.updated_at = shared::util::now_millis();
        self.put_menu_item(&txn, &item, current)?;
        txn.commit()?;
        Ok(item)
    }

    pub fn put_settings(&self, mut settings: ShopSettings) -> StorageResult<ShopSettings> {
        settings.updated_at = shared::util::now_millis();
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS_TABLE)?;
            let value = serde_json::to_vec(&settings)?;
            table.insert(settings.shop_id.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(settings)
    }

    // ========== Topic snapshots ==========

    /// Authoritative live view of a topic
    ///
    /// Contains the records routed to `topic` that a live view still holds:
    /// open orders and the bill of the current session, never closed
    /// history. Read from one transaction, so the records are consistent
    /// with each other.
    pub fn topic_snapshot(&self, topic: &Topic) -> StorageResult<Vec<RecordChange>> {
        let shop_id = topic.shop_id();
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let tables = read_txn.open_table(DINING_TABLES_TABLE)?;
        let bills = read_txn.open_table(BILLS_TABLE)?;

        let mut records = Vec::new();
        let mut bill_ids = Vec::new();
        match topic {
            Topic::Shop { .. } => {
                let menu = read_txn.open_table(MENU_ITEMS_TABLE)?;
                let kitchen = read_txn.open_table(KITCHEN_ORDERS_TABLE)?;
                for table in scan_shop::<DiningTable, _>(&tables, shop_id)? {
                    bill_ids.extend(table.bill_id.clone());
                    records.push(RecordChange::Table(table));
                }
                records.extend(
                    scan_shop::<MenuItemAvailability, _>(&menu, shop_id)?
                        .into_iter()
                        .map(RecordChange::MenuItem),
                );
                let ids = shop_ids(&kitchen, shop_id)?;
                for order in load_orders(&orders, shop_id, &ids)? {
                    // 先付款的外卖单：账单随订单一起保留
                    if order.table_id.is_none() {
                        bill_ids.extend(order.bill_id.clone());
                    }
                    records.push(RecordChange::Order(order));
                }
            }
            Topic::Table { table_id, .. } => {
                if let Some(table) = get_record::<DiningTable, _>(&tables, shop_id, table_id)? {
                    bill_ids.extend(table.bill_id.clone());
                    records.push(RecordChange::Table(table));
                }
                let index = read_txn.open_table(TABLE_ORDERS_TABLE)?;
                let ids = table_order_ids(&index, shop_id, table_id)?;
                records.extend(
                    load_orders(&orders, shop_id, &ids)?
                        .into_iter()
                        .map(RecordChange::Order),
                );
            }
            Topic::Order { order_id, .. } => {
                if let Some(order) = get_record::<Order, _>(&orders, shop_id, order_id)? {
                    bill_ids.extend(order.bill_id.clone());
                    records.push(RecordChange::Order(order));
                }
            }
        }
        for bill_id in &bill_ids {
            records.extend(get_record::<Bill, _>(&bills, shop_id, bill_id)?.map(RecordChange::Bill));
        }

        Ok(records
            .into_iter()
            .filter(|record| record.belongs_to(topic) && record.is_live_in(topic))
            .collect())
    }

    // ========== Statistics ==========

    /// Get storage statistics
    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let events = read_txn.open_table(ORDER_EVENTS_TABLE)?;
        let tables = read_txn.open_table(DINING_TABLES_TABLE)?;
        let bills = read_txn.open_table(BILLS_TABLE)?;
        let commands = read_txn.open_table(PROCESSED_COMMANDS_TABLE)?;

        Ok(StorageStats {
            order_count: orders.len()?,
            event_count: events.len()?,
            table_count: tables.len()?,
            bill_count: bills.len()?,
            processed_command_count: commands.len()?,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub order_count: u64,
    pub event_count: u64,
    pub table_count: u64,
    pub bill_count: u64,
    pub processed_command_count: u64,
}

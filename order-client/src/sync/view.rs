//! 本地视图与归并器
//!
//! 视图只按记录版本归并，从不依赖到达顺序：
//!
//! | 收到的版本 | 结果 |
//! |-----------|------|
//! | 新记录 | `Inserted` |
//! | 大于持有版本 | `Updated` |
//! | 等于持有版本 | `Duplicate` (不变) |
//! | 小于持有版本 | `Stale` (丢弃) |
//! | 较新但已离开视图 | `Removed` |
//! | 不属于视图主题 | `OutOfScope` |
//!
//! 重复投递、乱序投递都不会破坏视图。
//!
//! 视图只保留仍在进行中的记录（见 [`RecordChange::is_live_in`]）：出餐、取消、
//! 结账的订单会移出厨房视图，清台后旧账单移出桌台视图。移出的记录只留下
//! 版本号，晚到的旧事件仍按 `Stale`/`Duplicate` 丢弃。

use std::collections::HashMap;

use shared::message::{ChangeEvent, RecordChange, RecordKey, RecordKind, Topic, TopicSnapshot};
use shared::models::{Bill, DiningTable, MenuItemAvailability};
use shared::order::Order;

/// 一次归并的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Updated,
    Duplicate,
    Stale,
    /// 新版本已不属于活动视图，记录被移出
    Removed,
    OutOfScope,
}

impl Applied {
    /// 视图是否发生了变化
    pub fn changed(self) -> bool {
        matches!(self, Applied::Inserted | Applied::Updated | Applied::Removed)
    }
}

/// 客户端本地视图
#[derive(Debug, Clone, Default)]
pub struct LocalView {
    scope: Vec<Topic>,
    /// 只保留这些类型的记录，`None` 表示全部
    kinds: Option<Vec<RecordKind>>,
    records: HashMap<RecordKey, RecordChange>,
    /// 已移出记录的最后版本
    retired: HashMap<RecordKey, u64>,
}

impl LocalView {
    pub fn new(scope: Vec<Topic>) -> Self {
        Self {
            scope,
            kinds: None,
            records: HashMap::new(),
            retired: HashMap::new(),
        }
    }

    /// 限制记录类型（例如菜单视图只要 `MenuItem`）
    pub fn with_kinds(mut self, kinds: Vec<RecordKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn scope(&self) -> &[Topic] {
        &self.scope
    }

    fn in_scope(&self, record: &RecordChange) -> bool {
        if self
            .kinds
            .as_ref()
            .is_some_and(|kinds| !kinds.contains(&record.kind()))
        {
            return false;
        }
        self.scope.iter().any(|topic| record.belongs_to(topic))
    }

    /// 记录在视图的任一主题里仍处于活动状态
    fn is_live(&self, record: &RecordChange) -> bool {
        self.scope
            .iter()
            .filter(|topic| record.belongs_to(topic))
            .any(|topic| record.is_live_in(topic))
    }

    /// 归并一条完整记录
    pub fn apply(&mut self, record: RecordChange) -> Applied {
        if !self.in_scope(&record) {
            return Applied::OutOfScope;
        }

        let key = record.key();
        let held = self
            .records
            .get(&key)
            .map(RecordChange::version)
            .or_else(|| self.retired.get(&key).copied());
        let outcome = match held {
            None => Applied::Inserted,
            Some(version) if record.version() > version => Applied::Updated,
            Some(version) if record.version() == version => return Applied::Duplicate,
            Some(_) => return Applied::Stale,
        };

        let live = self.is_live(&record);
        self.retire_bills_closed_by(&record, live);
        if !live {
            self.records.remove(&key);
            self.retired.insert(key, record.version());
            return Applied::Removed;
        }
        self.retired.remove(&key);
        self.records.insert(key, record);
        outcome
    }

    /// 账单的去留取决于它的桌台或订单
    ///
    /// 桌台不再指向的账单（已清台）随桌台更新移出；外卖单移出时带走它的账单。
    fn retire_bills_closed_by(&mut self, record: &RecordChange, live: bool) {
        let closed: Vec<(RecordKey, u64)> = self
            .records
            .values()
            .filter_map(|held| match held {
                RecordChange::Bill(bill) => Some(bill),
                _ => None,
            })
            .filter(|bill| match record {
                RecordChange::Table(table) => {
                    bill.table_id.as_deref() == Some(table.id.as_str())
                        && table.bill_id.as_deref() != Some(bill.id.as_str())
                        && table.updated_at >= bill.created_at
                }
                RecordChange::Order(order) => {
                    !live && bill.order_id.as_deref() == Some(order.id.as_str())
                }
                _ => false,
            })
            .map(|bill| {
                let key = RecordKey {
                    kind: RecordKind::Bill,
                    shop_id: bill.shop_id.clone(),
                    id: bill.id.clone(),
                };
                (key, bill.version)
            })
            .collect();

        for (key, version) in closed {
            self.records.remove(&key);
            self.retired.insert(key, version);
        }
    }

    pub fn apply_event(&mut self, event: &ChangeEvent) -> Applied {
        self.apply(event.record.clone())
    }

    /// 用权威快照整体替换
    ///
    /// 断线期间可能有记录离开了主题（如顾客的订单被结账），所以不做合并，
    /// 直接以快照为准。随后到达的旧事件会被当作 `Stale`/`Duplicate` 丢弃；
    /// 快照之前已移出的记录，其旧事件可能短暂重新出现，随后的移出事件
    /// (至少投递一次) 会再次把它移走。
    pub fn replace(&mut self, snapshots: Vec<TopicSnapshot>) {
        self.records.clear();
        self.retired.clear();
        for snapshot in snapshots {
            for record in snapshot.records {
                self.apply(record);
            }
        }
    }

    pub fn get(&self, key: &RecordKey) -> Option<&RecordChange> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordChange> {
        self.records.values()
    }

    pub fn order(&self, shop_id: &str, order_id: &str) -> Option<&Order> {
        let key = RecordKey {
            kind: RecordKind::Order,
            shop_id: shop_id.to_string(),
            id: order_id.to_string(),
        };
        match self.records.get(&key) {
            Some(RecordChange::Order(order)) => Some(order),
            _ => None,
        }
    }

    /// 按下单时间排序（厨房显示顺序）
    pub fn orders(&self) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self
            .records
            .values()
            .filter_map(|r| match r {
                RecordChange::Order(order) => Some(order),
                _ => None,
            })
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        orders
    }

    pub fn tables(&self) -> Vec<&DiningTable> {
        let mut tables: Vec<&DiningTable> = self
            .records
            .values()
            .filter_map(|r| match r {
                RecordChange::Table(table) => Some(table),
                _ => None,
            })
            .collect();
        tables.sort_by(|a, b| a.label.cmp(&b.label));
        tables
    }

    pub fn bills(&self) -> Vec<&Bill> {
        self.records
            .values()
            .filter_map(|r| match r {
                RecordChange::Bill(bill) => Some(bill),
                _ => None,
            })
            .collect()
    }

    pub fn menu_items(&self) -> Vec<&MenuItemAvailability> {
        self.records
            .values()
            .filter_map(|r| match r {
                RecordChange::MenuItem(item) => Some(item),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::OrderStatus;

    fn order(id: &str, version: u64, status: OrderStatus) -> RecordChange {
        let mut order = Order::new(id, "s1");
        order.table_id = Some("t1".to_string());
        order.status = status;
        order.version = version;
        RecordChange::Order(order)
    }

    fn kitchen_view() -> LocalView {
        LocalView::new(vec![Topic::shop("s1")])
    }

    fn table_view() -> LocalView {
        LocalView::new(vec![Topic::table("s1", "t1")])
    }

    #[test]
    fn test_duplicate_event_is_idempotent() {
        let mut view = kitchen_view();
        let event = ChangeEvent::new(order("o1", 2, OrderStatus::Preparing));

        assert_eq!(view.apply_event(&event), Applied::Inserted);
        let once = view.clone();
        assert_eq!(view.apply_event(&event), Applied::Duplicate);

        assert_eq!(view.order("s1", "o1"), once.order("s1", "o1"));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_reordered_delivery_keeps_newest() {
        let mut view = kitchen_view();
        assert_eq!(view.apply(order("o1", 3, OrderStatus::Ready)), Applied::Inserted);
        assert_eq!(view.apply(order("o1", 2, OrderStatus::Preparing)), Applied::Stale);
        assert_eq!(view.apply(order("o1", 1, OrderStatus::Queued)), Applied::Stale);
        assert_eq!(view.order("s1", "o1").unwrap().status, OrderStatus::Ready);

        // 出餐后离开厨房视图，更早的事件不会把它带回来
        assert_eq!(view.apply(order("o1", 4, OrderStatus::Served)), Applied::Removed);
        assert!(view.order("s1", "o1").is_none());
        assert_eq!(view.apply(order("o1", 3, OrderStatus::Ready)), Applied::Stale);
        assert_eq!(view.apply(order("o1", 4, OrderStatus::Served)), Applied::Duplicate);
        assert!(view.is_empty());
    }

    #[test]
    fn test_any_arrival_order_converges() {
        let events: Vec<RecordChange> = (1..=4)
            .map(|v| {
                let status = [
                    OrderStatus::Queued,
                    OrderStatus::Preparing,
                    OrderStatus::Ready,
                    OrderStatus::Served,
                ][(v - 1) as usize];
                order("o1", v, status)
            })
            .collect();

        for rotation in 0..events.len() {
            let mut view = table_view();
            let mut shuffled = events.clone();
            shuffled.rotate_left(rotation);
            shuffled.extend(events.iter().cloned());
            for record in shuffled {
                view.apply(record);
            }
            let held = view.order("s1", "o1").unwrap();
            assert_eq!(held.version, 4);
            assert_eq!(held.status, OrderStatus::Served);
        }
    }

    #[test]
    fn test_kitchen_view_holds_only_open_orders() {
        let mut view = kitchen_view();
        assert_eq!(view.apply(order("o1", 1, OrderStatus::Queued)), Applied::Inserted);
        assert_eq!(view.apply(order("o2", 2, OrderStatus::Cancelled)), Applied::Removed);
        assert_eq!(view.apply(order("o3", 4, OrderStatus::Served)), Applied::Removed);
        assert_eq!(view.len(), 1);

        // 桌台视图保留已出餐、未结账的订单
        let mut table = table_view();
        assert_eq!(table.apply(order("o3", 4, OrderStatus::Served)), Applied::Inserted);
        let mut billed = Order::new("o3", "s1");
        billed.table_id = Some("t1".to_string());
        billed.status = OrderStatus::Served;
        billed.bill_id = Some("b1".to_string());
        billed.version = 5;
        assert_eq!(table.apply(RecordChange::Order(billed)), Applied::Removed);
        assert!(table.is_empty());
    }

    fn bill(id: &str, table_id: Option<&str>, order_id: Option<&str>, created_at: i64) -> RecordChange {
        use rust_decimal::Decimal;

        RecordChange::Bill(Bill {
            id: id.to_string(),
            shop_id: "s1".to_string(),
            table_id: table_id.map(str::to_string),
            order_id: order_id.map(str::to_string),
            order_ids: Vec::new(),
            lines: Vec::new(),
            subtotal: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            discount_reason: None,
            tax_rate: Decimal::ZERO,
            tax_included: false,
            tax_amount: Decimal::ZERO,
            service_charge_rate: Decimal::ZERO,
            service_charge_amount: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            currency: "EUR".to_string(),
            payment_method: None,
            bill_number: format!("B-{id}"),
            created_at,
            created_by: "op".to_string(),
            version: 1,
        })
    }

    fn table(version: u64, bill_id: Option<&str>, updated_at: i64) -> RecordChange {
        let mut table = DiningTable::new("t1", "s1", "T1", 4);
        table.bill_id = bill_id.map(str::to_string);
        table.version = version;
        table.updated_at = updated_at;
        RecordChange::Table(table)
    }

    #[test]
    fn test_cleared_table_drops_its_bill() {
        let mut view = table_view();
        view.apply(table(3, Some("b1"), 100));
        assert_eq!(view.apply(bill("b1", Some("t1"), None, 100)), Applied::Inserted);

        // 结账前的桌台旧版本不影响账单
        view.apply(table(2, None, 50));
        assert_eq!(view.bills().len(), 1);

        assert_eq!(view.apply(table(4, None, 200)), Applied::Updated);
        assert!(view.bills().is_empty());
        assert_eq!(view.apply(bill("b1", Some("t1"), None, 100)), Applied::Duplicate);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn test_collected_takeaway_drops_its_bill() {
        let mut view = kitchen_view();
        let mut paid = Order::new("o9", "s1");
        paid.status = OrderStatus::Ready;
        paid.bill_id = Some("b9".to_string());
        paid.version = 4;
        view.apply(RecordChange::Order(paid.clone()));
        view.apply(bill("b9", None, Some("o9"), 10));
        assert_eq!(view.len(), 2);

        paid.status = OrderStatus::Served;
        paid.version = 5;
        assert_eq!(view.apply(RecordChange::Order(paid)), Applied::Removed);
        assert!(view.is_empty());
    }

    #[test]
    fn test_out_of_scope_records_are_ignored() {
        let mut tracker = LocalView::new(vec![Topic::order("s1", "o1")]);
        assert_eq!(tracker.apply(order("o2", 1, OrderStatus::Queued)), Applied::OutOfScope);
        assert_eq!(tracker.apply(order("o1", 1, OrderStatus::Queued)), Applied::Inserted);

        let mut other_shop = Order::new("o1", "s2");
        other_shop.version = 9;
        assert_eq!(
            tracker.apply(RecordChange::Order(other_shop)),
            Applied::OutOfScope
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_kind_filter() {
        use shared::models::MenuItemAvailability;
        use rust_decimal::Decimal;

        let mut menu = kitchen_view().with_kinds(vec![RecordKind::MenuItem]);
        assert_eq!(menu.apply(order("o1", 1, OrderStatus::Queued)), Applied::OutOfScope);

        let mut item = MenuItemAvailability::new("tea", "s1", "Tea", Decimal::new(300, 2));
        item.version = 1;
        assert_eq!(menu.apply(RecordChange::MenuItem(item)), Applied::Inserted);
        assert_eq!(menu.menu_items().len(), 1);
    }

    #[test]
    fn test_replace_drops_records_missing_from_snapshot() {
        let mut view = kitchen_view();
        view.apply(order("o1", 2, OrderStatus::Preparing));
        view.apply(order("gone", 1, OrderStatus::Queued));

        view.replace(vec![TopicSnapshot {
            topic: Topic::shop("s1"),
            records: vec![order("o1", 3, OrderStatus::Ready)],
            taken_at: 0,
        }]);

        assert_eq!(view.len(), 1);
        assert_eq!(view.order("s1", "o1").unwrap().version, 3);
        // 快照之前的事件晚到
        assert_eq!(view.apply(order("o1", 2, OrderStatus::Preparing)), Applied::Stale);
    }
}

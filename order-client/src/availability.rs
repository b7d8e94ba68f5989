//! 客户端售罄协调
//!
//! 每个店铺一份共享的售罄表 [`ShopAvailability`]，由一个订阅喂数据；
//! 所有购物车共用它，不单独订阅。
//!
//! 购物车里的菜品变成售罄时只做标记不删除：
//! - 显示合计、提交内容都不包含被标记的行
//! - 用户可以自己删掉，或者等补货后标记自动清除
//!
//! 这里的标记只是提示，下单时服务端会再次校验。

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::{Decimal, RoundingStrategy};
use shared::error::UnavailableItem;
use shared::message::RecordChange;
use shared::models::{DEFAULT_MAX_ITEM_QUANTITY, MenuItemAvailability};
use shared::order::OrderItemInput;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};
use crate::sync::SharedView;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// 店铺售罄表
pub struct ShopAvailability {
    shop_id: String,
    items: RwLock<HashMap<String, MenuItemAvailability>>,
    updates: broadcast::Sender<MenuItemAvailability>,
}

impl ShopAvailability {
    pub fn new(shop_id: impl Into<String>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            shop_id: shop_id.into(),
            items: RwLock::new(HashMap::new()),
            updates,
        }
    }

    pub fn shop_id(&self) -> &str {
        &self.shop_id
    }

    /// 归并一条菜单记录，只接受更高版本
    pub fn apply(&self, item: MenuItemAvailability) -> bool {
        if item.shop_id != self.shop_id {
            return false;
        }
        {
            let mut items = self.items.write();
            if items
                .get(&item.id)
                .is_some_and(|held| held.version >= item.version)
            {
                return false;
            }
            items.insert(item.id.clone(), item.clone());
        }
        tracing::debug!(menu_item_id = %item.id, is_available = item.is_available, version = item.version, "Availability updated");
        let _ = self.updates.send(item);
        true
    }

    pub fn apply_change(&self, record: &RecordChange) -> bool {
        match record {
            RecordChange::MenuItem(item) => self.apply(item.clone()),
            _ => false,
        }
    }

    /// 全量载入（首次同步、落后后重载）
    pub fn load(&self, items: impl IntoIterator<Item = MenuItemAvailability>) -> usize {
        items.into_iter().filter(|item| self.apply(item.clone())).count()
    }

    pub fn get(&self, menu_item_id: &str) -> Option<MenuItemAvailability> {
        self.items.read().get(menu_item_id).cloned()
    }

    /// `None` 表示还没见过这个菜品
    pub fn is_available(&self, menu_item_id: &str) -> Option<bool> {
        self.items.read().get(menu_item_id).map(|item| item.is_available)
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// 购物车监听售罄变化
    pub fn subscribe(&self) -> broadcast::Receiver<MenuItemAvailability> {
        self.updates.subscribe()
    }

    /// 跟随一个同步器的变更通知
    ///
    /// 启动时先从视图载入；通知落后时同样从视图重载。
    pub async fn follow(
        &self,
        view: SharedView,
        mut changes: broadcast::Receiver<RecordChange>,
        shutdown: CancellationToken,
    ) {
        self.reload_from(&view);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                change = changes.recv() => match change {
                    Ok(record) => {
                        self.apply_change(&record);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(shop_id = %self.shop_id, skipped, "Availability updates lagged, reloading");
                        self.reload_from(&view);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        tracing::debug!(shop_id = %self.shop_id, "Availability follower stopped");
    }

    fn reload_from(&self, view: &SharedView) {
        let items: Vec<MenuItemAvailability> =
            view.read().menu_items().into_iter().cloned().collect();
        self.load(items);
    }
}

/// 购物车行
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub menu_item_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub notes: Option<String>,
    /// 已售罄（保留在购物车里，但不计价、不提交）
    pub unavailable: bool,
    /// 被服务端拒绝时售罄表里该菜品的版本；只有更高版本的记录才能解除
    pub rejected_at: Option<u64>,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// 购物车
///
/// 每次修改都先查售罄表。
pub struct Cart<'a> {
    availability: &'a ShopAvailability,
    lines: Vec<CartLine>,
    /// 菜品没有单独上限时使用的店铺上限
    max_item_quantity: u32,
}

impl<'a> Cart<'a> {
    pub fn new(availability: &'a ShopAvailability) -> Self {
        Self {
            availability,
            lines: Vec::new(),
            max_item_quantity: DEFAULT_MAX_ITEM_QUANTITY,
        }
    }

    /// 店铺设置里的 `max_item_quantity`
    pub fn with_max_item_quantity(mut self, max: u32) -> Self {
        self.max_item_quantity = max.max(1);
        self
    }

    fn quantity_cap(&self, item: &MenuItemAvailability) -> u32 {
        item.max_quantity.unwrap_or(self.max_item_quantity)
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, menu_item_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.menu_item_id == menu_item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 加入购物车；同一菜品合并数量
    ///
    /// 售罄的菜品也可以加入，但会被标记。
    pub fn add(
        &mut self,
        menu_item_id: &str,
        quantity: u32,
        notes: Option<String>,
    ) -> ClientResult<&CartLine> {
        if quantity == 0 {
            return Err(ClientError::Validation("quantity must be at least 1".into()));
        }
        let item = self
            .availability
            .get(menu_item_id)
            .ok_or_else(|| ClientError::UnknownItem(menu_item_id.to_string()))?;

        let cap = self.quantity_cap(&item);
        let index = match self.lines.iter().position(|l| l.menu_item_id == menu_item_id) {
            Some(index) => {
                let line = &mut self.lines[index];
                line.quantity = line.quantity.saturating_add(quantity).min(cap);
                if notes.is_some() {
                    line.notes = notes;
                }
                index
            }
            None => {
                self.lines.push(CartLine {
                    menu_item_id: item.id.clone(),
                    name: item.name.clone(),
                    unit_price: item.price,
                    quantity: quantity.min(cap),
                    notes,
                    unavailable: false,
                    rejected_at: None,
                });
                self.lines.len() - 1
            }
        };
        Self::refresh_line(&mut self.lines[index], &item);
        Ok(&self.lines[index])
    }

    /// 修改数量，0 表示删除；超过上限按上限
    pub fn set_quantity(&mut self, menu_item_id: &str, quantity: u32) -> ClientResult<()> {
        if quantity == 0 {
            self.remove(menu_item_id);
            return Ok(());
        }
        let item = self.availability.get(menu_item_id);
        let quantity = match &item {
            Some(item) => quantity.min(self.quantity_cap(item)),
            None => quantity,
        };
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.menu_item_id == menu_item_id)
            .ok_or_else(|| ClientError::Validation(format!("{menu_item_id} is not in the cart")))?;
        line.quantity = quantity;
        if let Some(item) = item {
            Self::refresh_line(line, &item);
        }
        Ok(())
    }

    pub fn remove(&mut self, menu_item_id: &str) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| l.menu_item_id == menu_item_id)?;
        Some(self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// 推送到达：更新购物车里对应的行，返回标记是否变化
    pub fn on_availability(&mut self, item: &MenuItemAvailability) -> bool {
        match self.lines.iter_mut().find(|l| l.menu_item_id == item.id) {
            Some(line) => Self::refresh_line(line, item),
            None => false,
        }
    }

    /// 对照售罄表重新检查所有行，返回标记变化的菜品
    pub fn reconcile(&mut self) -> Vec<String> {
        let mut flipped = Vec::new();
        for line in &mut self.lines {
            let Some(item) = self.availability.get(&line.menu_item_id) else {
                continue;
            };
            if Self::refresh_line(line, &item) {
                flipped.push(line.menu_item_id.clone());
            }
        }
        flipped
    }

    /// 服务端以 `ItemUnavailable` 拒绝下单时，按返回的清单标记
    ///
    /// 本地售罄表可能还没收到这次变化，所以标记一直保留到该菜品
    /// 出现更高版本的记录为止。返回新标记的行数。
    pub fn flag_unavailable(&mut self, items: &[UnavailableItem]) -> usize {
        let mut flagged = 0;
        for line in &mut self.lines {
            if !items.iter().any(|i| i.menu_item_id == line.menu_item_id) {
                continue;
            }
            let held_version = self
                .availability
                .get(&line.menu_item_id)
                .map_or(0, |item| item.version);
            line.rejected_at = Some(held_version);
            if !line.unavailable {
                line.unavailable = true;
                flagged += 1;
            }
        }
        flagged
    }

    pub fn unavailable_lines(&self) -> Vec<&CartLine> {
        self.lines.iter().filter(|l| l.unavailable).collect()
    }

    /// 显示合计（不含售罄行），2 位小数
    pub fn displayed_total(&self) -> Decimal {
        let total: Decimal = self
            .lines
            .iter()
            .filter(|l| !l.unavailable)
            .map(CartLine::line_total)
            .sum();
        total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// 提交内容（不含售罄行）
    pub fn submission(&self) -> Vec<OrderItemInput> {
        self.lines
            .iter()
            .filter(|l| !l.unavailable)
            .map(|l| OrderItemInput {
                menu_item_id: l.menu_item_id.clone(),
                quantity: l.quantity,
                notes: l.notes.clone(),
            })
            .collect()
    }

    /// 按最新菜单刷新一行；返回售罄标记是否变化
    fn refresh_line(line: &mut CartLine, item: &MenuItemAvailability) -> bool {
        line.name = item.name.clone();
        line.unit_price = item.price;
        if line.rejected_at.is_some_and(|version| item.version > version) {
            line.rejected_at = None;
        }
        let unavailable = !item.is_available || line.rejected_at.is_some();
        let flipped = line.unavailable != unavailable;
        line.unavailable = unavailable;
        flipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu_item(id: &str, cents: i64, available: bool, version: u64) -> MenuItemAvailability {
        let mut item = MenuItemAvailability::new(id, "s1", id.to_uppercase(), Decimal::new(cents, 2));
        item.is_available = available;
        item.version = version;
        item
    }

    fn shop() -> ShopAvailability {
        let availability = ShopAvailability::new("s1");
        availability.load([
            menu_item("dumpling", 500, true, 1),
            menu_item("tea", 300, true, 1),
        ]);
        availability
    }

    #[test]
    fn test_versions_are_respected() {
        let availability = shop();
        assert!(availability.apply(menu_item("tea", 300, false, 3)));
        assert!(!availability.apply(menu_item("tea", 300, true, 2)));
        assert!(!availability.apply(menu_item("tea", 300, true, 3)));
        assert_eq!(availability.is_available("tea"), Some(false));

        assert!(!availability.apply(MenuItemAvailability::new("x", "other-shop", "X", Decimal::ONE)));
        assert_eq!(availability.is_available("x"), None);
    }

    #[test]
    fn test_sold_out_line_is_flagged_not_removed() {
        let availability = shop();
        let mut cart = Cart::new(&availability);
        cart.add("dumpling", 2, None).unwrap();
        cart.add("tea", 1, None).unwrap();
        assert_eq!(cart.displayed_total(), Decimal::new(1300, 2));

        let update = menu_item("dumpling", 500, false, 2);
        availability.apply(update.clone());
        assert!(cart.on_availability(&update));

        assert_eq!(cart.lines().len(), 2);
        assert!(cart.line("dumpling").unwrap().unavailable);
        assert_eq!(cart.displayed_total(), Decimal::new(300, 2));
        let submission = cart.submission();
        assert_eq!(submission.len(), 1);
        assert_eq!(submission[0].menu_item_id, "tea");

        // 补货后标记清除
        let restock = menu_item("dumpling", 500, true, 3);
        availability.apply(restock.clone());
        assert!(cart.on_availability(&restock));
        assert_eq!(cart.displayed_total(), Decimal::new(1300, 2));
    }

    #[test]
    fn test_mutations_consult_the_map() {
        let availability = shop();
        availability.apply(menu_item("tea", 300, false, 2));

        let mut cart = Cart::new(&availability);
        assert!(cart.add("tea", 1, None).unwrap().unavailable);
        assert!(matches!(cart.add("ghost", 1, None), Err(ClientError::UnknownItem(_))));
        assert!(matches!(cart.add("dumpling", 0, None), Err(ClientError::Validation(_))));

        cart.add("dumpling", 1, Some("extra vinegar".into())).unwrap();
        cart.add("dumpling", 2, None).unwrap();
        let line = cart.line("dumpling").unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.notes.as_deref(), Some("extra vinegar"));

        cart.set_quantity("dumpling", 0).unwrap();
        assert!(cart.line("dumpling").is_none());
        assert!(cart.set_quantity("dumpling", 1).is_err());
    }

    #[test]
    fn test_reconcile_and_server_rejection() {
        let availability = shop();
        let mut cart = Cart::new(&availability);
        cart.add("dumpling", 1, None).unwrap();
        cart.add("tea", 1, None).unwrap();

        // 推送被错过，靠下一次修改前的对照发现
        availability.apply(menu_item("tea", 350, false, 2));
        assert_eq!(cart.reconcile(), vec!["tea".to_string()]);
        assert_eq!(cart.line("tea").unwrap().unit_price, Decimal::new(350, 2));
        assert!(cart.reconcile().is_empty());

        let rejected = vec![UnavailableItem {
            menu_item_id: "dumpling".into(),
            name: "DUMPLING".into(),
        }];
        assert_eq!(cart.flag_unavailable(&rejected), 1);
        assert!(cart.submission().is_empty());
        assert_eq!(cart.unavailable_lines().len(), 2);
    }

    #[test]
    fn test_rejection_survives_stale_map() {
        let availability = shop();
        let mut cart = Cart::new(&availability);
        cart.add("dumpling", 2, None).unwrap();
        cart.add("tea", 1, None).unwrap();

        // 服务端说饺子售罄，本地售罄表还是 v1 可售
        let rejected = vec![UnavailableItem {
            menu_item_id: "dumpling".into(),
            name: "DUMPLING".into(),
        }];
        assert_eq!(cart.flag_unavailable(&rejected), 1);

        cart.set_quantity("tea", 2).unwrap();
        cart.set_quantity("dumpling", 3).unwrap();
        assert!(cart.reconcile().is_empty());
        let v1 = menu_item("dumpling", 500, true, 1);
        assert!(!cart.on_availability(&v1));

        let submission = cart.submission();
        assert_eq!(submission.len(), 1);
        assert_eq!(submission[0].menu_item_id, "tea");
        assert_eq!(cart.displayed_total(), Decimal::new(600, 2));

        // 更高版本的记录到达后才按它的状态走
        availability.apply(menu_item("dumpling", 500, false, 2));
        assert!(cart.reconcile().is_empty());
        assert!(cart.line("dumpling").unwrap().unavailable);

        let restock = menu_item("dumpling", 500, true, 3);
        availability.apply(restock.clone());
        assert!(cart.on_availability(&restock));
        assert!(cart.line("dumpling").unwrap().rejected_at.is_none());
        assert_eq!(cart.submission().len(), 2);
    }

    #[test]
    fn test_quantity_is_capped() {
        let availability = shop();
        let mut limited = menu_item("tea", 300, true, 2);
        limited.max_quantity = Some(4);
        availability.apply(limited);

        let mut cart = Cart::new(&availability);
        cart.add("tea", 3, None).unwrap();
        assert_eq!(cart.add("tea", 3, None).unwrap().quantity, 4);
        assert_eq!(cart.add("tea", u32::MAX, None).unwrap().quantity, 4);

        // 没有单独上限的菜品用店铺上限
        assert_eq!(cart.add("dumpling", u32::MAX, None).unwrap().quantity, 10);
        cart.set_quantity("dumpling", 50).unwrap();
        assert_eq!(cart.line("dumpling").unwrap().quantity, 10);

        let mut strict = Cart::new(&availability).with_max_item_quantity(2);
        assert_eq!(strict.add("dumpling", 5, None).unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_follow_applies_menu_changes_only() {
        use crate::sync::LocalView;
        use shared::message::Topic;
        use std::sync::Arc;

        let availability = Arc::new(ShopAvailability::new("s1"));
        let view: SharedView = Arc::new(RwLock::new(LocalView::new(vec![Topic::shop("s1")])));
        view.write()
            .apply(RecordChange::MenuItem(menu_item("tea", 300, true, 1)));

        let mut updates = availability.subscribe();
        let (tx, rx) = broadcast::channel(8);
        let shutdown = CancellationToken::new();
        let follower = tokio::spawn({
            let availability = availability.clone();
            let view = view.clone();
            let shutdown = shutdown.clone();
            async move { availability.follow(view, rx, shutdown).await }
        });

        tx.send(RecordChange::Order(shared::order::Order::new("o1", "s1"))).unwrap();
        tx.send(RecordChange::MenuItem(menu_item("tea", 300, false, 2))).unwrap();

        // 先是启动时从视图载入的 v1，然后是推送的 v2
        for expected in [true, false] {
            let update = tokio::time::timeout(std::time::Duration::from_secs(1), updates.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(update.id, "tea");
            assert_eq!(update.is_available, expected);
        }
        assert_eq!(availability.is_available("tea"), Some(false));

        shutdown.cancel();
        follower.await.unwrap();
    }
}

//! Authoritative availability check
//!
//! Runs inside the create-order transaction, so a concurrent "mark sold out"
//! either commits before (order rejected) or after (order accepted). Client
//! side hiding of sold-out items is advisory only.

use shared::error::UnavailableItem;
use shared::order::{OrderItem, OrderItemInput};

use crate::orders::traits::{CommandContext, OrderError};

/// Resolve requested items against the menu, snapshotting current prices
///
/// Every unavailable or unknown item is reported together, not just the
/// first one.
pub fn resolve_items(
    ctx: &mut CommandContext<'_>,
    requested: &[OrderItemInput],
    default_max_quantity: u32,
) -> Result<Vec<OrderItem>, OrderError> {
    if requested.is_empty() {
        return Err(OrderError::Validation("order has no items".to_string()));
    }

    let mut resolved = Vec::with_capacity(requested.len());
    let mut unavailable: Vec<UnavailableItem> = Vec::new();

    for input in requested {
        let Some(item) = ctx.find_menu_item(&input.menu_item_id)? else {
            unavailable.push(UnavailableItem {
                menu_item_id: input.menu_item_id.clone(),
                name: input.menu_item_id.clone(),
            });
            continue;
        };

        if !item.is_available {
            if !unavailable.iter().any(|u| u.menu_item_id == item.id) {
                unavailable.push(UnavailableItem {
                    menu_item_id: item.id.clone(),
                    name: item.name.clone(),
                });
            }
            continue;
        }

        let max_quantity = item.max_quantity.unwrap_or(default_max_quantity);
        if input.quantity == 0 || input.quantity > max_quantity {
            return Err(OrderError::Validation(format!(
                "quantity for {} must be between 1 and {max_quantity}",
                item.name
            )));
        }

        resolved.push(OrderItem {
            menu_item_id: item.id,
            name: item.name,
            unit_price: item.price,
            quantity: input.quantity,
            notes: input.notes.clone(),
        });
    }

    if !unavailable.is_empty() {
        return Err(OrderError::ItemUnavailable(unavailable));
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use shared::models::MenuItemAvailability;

    fn seed() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_menu_item(MenuItemAvailability::new("m1", "s1", "Dumpling", Decimal::new(500, 2)))
            .unwrap();
        store
            .upsert_menu_item(MenuItemAvailability::new("m2", "s1", "Tea", Decimal::new(300, 2)))
            .unwrap();
        let mut sold_out = MenuItemAvailability::new("m3", "s1", "Noodle", Decimal::new(700, 2));
        sold_out.is_available = false;
        store.upsert_menu_item(sold_out).unwrap();
        let mut sold_out = MenuItemAvailability::new("m4", "s1", "Soup", Decimal::new(400, 2));
        sold_out.is_available = false;
        store.upsert_menu_item(sold_out).unwrap();
        store
    }

    fn input(id: &str, quantity: u32) -> OrderItemInput {
        OrderItemInput {
            menu_item_id: id.to_string(),
            quantity,
            notes: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_snapshots_current_price() {
        let store = seed();
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let items = resolve_items(&mut ctx, &[input("m1", 2), input("m2", 1)], 10).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].unit_price, Decimal::new(500, 2));
        assert_eq!(items[0].name, "Dumpling");
    }

    #[test]
    fn test_reports_all_unavailable_items() {
        let store = seed();
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let err = resolve_items(
            &mut ctx,
            &[input("m1", 1), input("m3", 1), input("m4", 2), input("m3", 1)],
            10,
        )
        .unwrap_err();

        let OrderError::ItemUnavailable(items) = err else {
            panic!("expected ItemUnavailable");
        };
        let ids: Vec<&str> = items.iter().map(|i| i.menu_item_id.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m4"]);
    }

    #[test]
    fn test_unknown_item_is_unavailable() {
        let store = seed();
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        let err = resolve_items(&mut ctx, &[input("ghost", 1)], 10).unwrap_err();
        assert!(matches!(err, OrderError::ItemUnavailable(ref items) if items.len() == 1));
    }

    #[test]
    fn test_quantity_bounds() {
        let store = seed();
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        assert!(matches!(
            resolve_items(&mut ctx, &[input("m1", 0)], 10),
            Err(OrderError::Validation(_))
        ));
        assert!(matches!(
            resolve_items(&mut ctx, &[input("m1", 11)], 10),
            Err(OrderError::Validation(_))
        ));
        assert!(resolve_items(&mut ctx, &[input("m1", 10)], 10).is_ok());
    }

    #[test]
    fn test_empty_order_rejected() {
        let store = seed();
        let txn = store.begin_write().unwrap();
        let mut ctx = CommandContext::new(&txn, &store, "s1", today());

        assert!(matches!(
            resolve_items(&mut ctx, &[], 10),
            Err(OrderError::Validation(_))
        ));
    }
}

//! Bill aggregation using rust_decimal for precision
//!
//! `compute_bill` is a pure function of the contributing orders' snapshotted
//! prices, the shop settings and the staff options. Line totals stay
//! unrounded; only the final figures are rounded (2 dp, half away from zero).
//!
//! ```text
//! tax excluded:  base  = subtotal - discount
//!                tax   = base × tax_rate / 100
//!                svc   = base × service_rate / 100
//!                grand = base + tax + svc
//!
//! tax included:  gross = subtotal - discount
//!                tax   = gross × tax_rate / (100 + tax_rate)
//!                svc   = (gross - tax) × service_rate / 100
//!                grand = gross + svc
//! ```
//!
//! Tax and service charge never compound on each other.

use rust_decimal::prelude::*;
use shared::models::{BillBreakdown, BillLine, BillOptions, ShopSettings};
use shared::order::{Order, ServiceType};
use thiserror::Error;

/// Rounding precision for displayed monetary values
const DECIMAL_PLACES: u32 = 2;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillingError {
    #[error("no billable orders")]
    EmptySession,

    #[error("discount must not be negative")]
    NegativeDiscount,

    #[error("discount reason is required")]
    DiscountReasonRequired,

    #[error("discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: Decimal, subtotal: Decimal },
}

/// Round a monetary value for display
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Open (non-cancelled, unbilled) orders in placement order
pub fn billable_orders(orders: &[Order]) -> Vec<&Order> {
    let mut billable: Vec<&Order> = orders.iter().filter(|o| o.is_open()).collect();
    billable.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    billable
}

/// Compute the bill for a set of orders
///
/// Cancelled and already-billed orders are skipped. The result does not
/// depend on the order of `orders`.
pub fn compute_bill(
    orders: &[Order],
    settings: &ShopSettings,
    options: &BillOptions,
) -> Result<BillBreakdown, BillingError> {
    let billable = billable_orders(orders);
    if billable.is_empty() {
        return Err(BillingError::EmptySession);
    }

    let subtotal: Decimal = billable.iter().map(|o| o.subtotal()).sum();

    let discount = options.discount_amount;
    if discount.is_sign_negative() && !discount.is_zero() {
        return Err(BillingError::NegativeDiscount);
    }
    if discount > Decimal::ZERO {
        let has_reason = options
            .discount_reason
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if !has_reason {
            return Err(BillingError::DiscountReasonRequired);
        }
        if discount > subtotal {
            return Err(BillingError::DiscountExceedsSubtotal { discount, subtotal });
        }
    }

    // 会话里有堂食订单就收服务费，可按单免除
    let dine_in = billable.iter().any(|o| o.service_type == ServiceType::DineIn);
    let service_charge_rate = if dine_in && options.include_service_charge {
        settings.service_charge_rate
    } else {
        Decimal::ZERO
    };
    let tax_rate = settings.tax_rate;

    let base = subtotal - discount;
    let (tax, service_charge, grand_total) = if settings.tax_included_in_price {
        let tax = base * tax_rate / (HUNDRED + tax_rate);
        let service_charge = (base - tax) * service_charge_rate / HUNDRED;
        (tax, service_charge, base + service_charge)
    } else {
        let tax = base * tax_rate / HUNDRED;
        let service_charge = base * service_charge_rate / HUNDRED;
        (tax, service_charge, base + tax + service_charge)
    };

    let lines = billable
        .iter()
        .flat_map(|order| {
            order.items.iter().map(|item| BillLine {
                order_id: order.id.clone(),
                menu_item_id: item.menu_item_id.clone(),
                name: item.name.clone(),
                unit_price: item.unit_price,
                quantity: item.quantity,
                line_total: round_money(item.line_total()),
            })
        })
        .collect();

    Ok(BillBreakdown {
        order_ids: billable.iter().map(|o| o.id.clone()).collect(),
        lines,
        subtotal: round_money(subtotal),
        discount_amount: round_money(discount),
        tax_rate,
        tax_included: settings.tax_included_in_price,
        tax_amount: round_money(tax),
        service_charge_rate,
        service_charge_amount: round_money(service_charge),
        grand_total: round_money(grand_total),
        currency: settings.currency.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderItem, OrderStatus};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(id: &str, price: &str, qty: u32) -> OrderItem {
        OrderItem {
            menu_item_id: id.to_string(),
            name: id.to_uppercase(),
            unit_price: dec(price),
            quantity: qty,
            notes: None,
        }
    }

    fn order(id: &str, created_at: i64, items: Vec<OrderItem>) -> Order {
        let mut o = Order::new(id, "s1");
        o.table_id = Some("t1".into());
        o.items = items;
        o.created_at = created_at;
        o.version = 1;
        o
    }

    fn settings(tax: &str, service: &str, included: bool) -> ShopSettings {
        let mut s = ShopSettings::defaults("s1");
        s.tax_rate = dec(tax);
        s.service_charge_rate = dec(service);
        s.tax_included_in_price = included;
        s
    }

    fn o1() -> Order {
        order("o1", 1, vec![item("dumpling", "5.00", 2), item("tea", "3.00", 1)])
    }

    fn o2() -> Order {
        order("o2", 2, vec![item("noodle", "7.00", 1)])
    }

    #[test]
    fn test_single_order_tax_excluded() {
        let bill = compute_bill(&[o1()], &settings("10", "5", false), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.subtotal, dec("13.00"));
        assert_eq!(bill.tax_amount, dec("1.30"));
        assert_eq!(bill.service_charge_amount, dec("0.65"));
        assert_eq!(bill.grand_total, dec("14.95"));
        assert_eq!(bill.lines.len(), 2);
    }

    #[test]
    fn test_two_orders_combined() {
        let bill = compute_bill(&[o1(), o2()], &settings("10", "5", false), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.subtotal, dec("20.00"));
        assert_eq!(bill.tax_amount, dec("2.00"));
        assert_eq!(bill.service_charge_amount, dec("1.00"));
        assert_eq!(bill.grand_total, dec("23.00"));
        assert_eq!(bill.order_ids, vec!["o1".to_string(), "o2".to_string()]);
    }

    #[test]
    fn test_cancelled_order_contributes_nothing() {
        let mut cancelled = o1();
        cancelled.status = OrderStatus::Cancelled;
        let bill = compute_bill(&[cancelled, o2()], &settings("10", "5", false), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.subtotal, dec("7.00"));
        assert_eq!(bill.grand_total, dec("8.05"));
        assert_eq!(bill.order_ids, vec!["o2".to_string()]);
    }

    #[test]
    fn test_already_billed_orders_are_skipped() {
        let mut billed = o1();
        billed.bill_id = Some("b0".into());
        let bill = compute_bill(&[billed, o2()], &settings("0", "0", false), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.grand_total, dec("7.00"));
    }

    #[test]
    fn test_empty_session() {
        let mut cancelled = o1();
        cancelled.status = OrderStatus::Cancelled;
        assert_eq!(
            compute_bill(&[cancelled], &settings("10", "5", false), &BillOptions::default()),
            Err(BillingError::EmptySession)
        );
        assert_eq!(
            compute_bill(&[], &settings("10", "5", false), &BillOptions::default()),
            Err(BillingError::EmptySession)
        );
    }

    #[test]
    fn test_tax_included_backs_out_tax() {
        // gross 22.00 at 10% included: tax = 22 × 10 / 110 = 2.00
        let orders = [order("o1", 1, vec![item("set", "11.00", 2)])];
        let bill = compute_bill(&orders, &settings("10", "0", true), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.tax_amount, dec("2.00"));
        assert_eq!(bill.grand_total, dec("22.00"));
    }

    #[test]
    fn test_tax_included_service_on_net() {
        // net = 22 - 2 = 20, service 5% = 1.00
        let orders = [order("o1", 1, vec![item("set", "11.00", 2)])];
        let bill = compute_bill(&orders, &settings("10", "5", true), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.service_charge_amount, dec("1.00"));
        assert_eq!(bill.grand_total, dec("23.00"));
    }

    #[test]
    fn test_order_of_aggregation_invariance() {
        let s = settings("8.875", "12.5", false);
        let a = order("a", 1, vec![item("x", "3.33", 3), item("y", "0.01", 7)]);
        let b = order("b", 2, vec![item("z", "19.99", 1)]);
        let c = order("c", 3, vec![item("w", "4.45", 5)]);

        let forward = compute_bill(&[a.clone(), b.clone(), c.clone()], &s, &BillOptions::default()).unwrap();
        let reversed = compute_bill(&[c.clone(), b.clone(), a.clone()], &s, &BillOptions::default()).unwrap();
        let shuffled = compute_bill(&[b, a, c], &s, &BillOptions::default()).unwrap();
        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);

        // repeated computation from the same inputs is stable
        let again = compute_bill(
            &[
                order("c", 3, vec![item("w", "4.45", 5)]),
                order("a", 1, vec![item("x", "3.33", 3), item("y", "0.01", 7)]),
                order("b", 2, vec![item("z", "19.99", 1)]),
            ],
            &s,
            &BillOptions::default(),
        )
        .unwrap();
        assert_eq!(again, forward);
    }

    #[test]
    fn test_no_per_line_rounding() {
        // 3 × 0.335 = 1.005 → one rounding at the end
        let orders = [order("o1", 1, vec![item("a", "0.335", 3)])];
        let bill = compute_bill(&orders, &settings("0", "0", false), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.grand_total, dec("1.01"));

        // per-line rounding would give 3 × 0.34 = 1.02
        let orders = [order(
            "o1",
            1,
            vec![item("a", "0.335", 1), item("b", "0.335", 1), item("c", "0.335", 1)],
        )];
        let bill = compute_bill(&orders, &settings("0", "0", false), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.grand_total, dec("1.01"));
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(round_money(dec("0.125")), dec("0.13"));
        assert_eq!(round_money(dec("0.124")), dec("0.12"));
        assert_eq!(round_money(dec("-0.125")), dec("-0.13"));
    }

    #[test]
    fn test_discount_before_tax_and_service() {
        let options = BillOptions::default().with_discount(dec("3.00"), "regular");
        let bill = compute_bill(&[o1()], &settings("10", "5", false), &options).unwrap();
        // base = 10.00
        assert_eq!(bill.subtotal, dec("13.00"));
        assert_eq!(bill.discount_amount, dec("3.00"));
        assert_eq!(bill.tax_amount, dec("1.00"));
        assert_eq!(bill.service_charge_amount, dec("0.50"));
        assert_eq!(bill.grand_total, dec("11.50"));
    }

    #[test]
    fn test_discount_validation() {
        let s = settings("10", "5", false);

        let no_reason = BillOptions {
            discount_amount: dec("1.00"),
            ..BillOptions::default()
        };
        assert_eq!(
            compute_bill(&[o1()], &s, &no_reason),
            Err(BillingError::DiscountReasonRequired)
        );

        let blank_reason = BillOptions::default().with_discount(dec("1.00"), "  ");
        assert_eq!(
            compute_bill(&[o1()], &s, &blank_reason),
            Err(BillingError::DiscountReasonRequired)
        );

        let too_big = BillOptions::default().with_discount(dec("13.01"), "vip");
        assert!(matches!(
            compute_bill(&[o1()], &s, &too_big),
            Err(BillingError::DiscountExceedsSubtotal { .. })
        ));

        let negative = BillOptions::default().with_discount(dec("-1.00"), "oops");
        assert_eq!(
            compute_bill(&[o1()], &s, &negative),
            Err(BillingError::NegativeDiscount)
        );
    }

    #[test]
    fn test_service_charge_waived() {
        let options = BillOptions::default().waive_service_charge();
        let bill = compute_bill(&[o1()], &settings("10", "5", false), &options).unwrap();
        assert_eq!(bill.service_charge_amount, Decimal::ZERO);
        assert_eq!(bill.service_charge_rate, Decimal::ZERO);
        assert_eq!(bill.grand_total, dec("14.30"));
    }

    #[test]
    fn test_takeaway_has_no_service_charge() {
        let mut takeaway = o1();
        takeaway.table_id = None;
        takeaway.service_type = ServiceType::Takeaway;
        let bill = compute_bill(&[takeaway], &settings("10", "5", false), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.service_charge_amount, Decimal::ZERO);
        assert_eq!(bill.grand_total, dec("14.30"));
    }

    #[test]
    fn test_mixed_session_keeps_service_charge() {
        let mut to_go = o2();
        to_go.service_type = ServiceType::Takeaway;
        let bill = compute_bill(&[o1(), to_go], &settings("10", "5", false), &BillOptions::default())
            .unwrap();
        assert_eq!(bill.subtotal, dec("20.00"));
        assert_eq!(bill.service_charge_rate, dec("5"));
        assert_eq!(bill.service_charge_amount, dec("1.00"));
        assert_eq!(bill.grand_total, dec("23.00"));
    }

    #[test]
    fn test_snapshot_prices_not_menu_prices() {
        // bill only sees the prices on the orders; nothing else is consulted
        let mut o = o2();
        let before = compute_bill(&[o.clone()], &settings("0", "0", false), &BillOptions::default())
            .unwrap();
        o.items[0].name = "renamed".into();
        let after = compute_bill(&[o], &settings("0", "0", false), &BillOptions::default()).unwrap();
        assert_eq!(before.grand_total, after.grand_total);
    }
}

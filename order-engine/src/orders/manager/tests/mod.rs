use super::*;
use rust_decimal::Decimal;
use shared::error::ErrorCode;
use shared::order::{OrderCommandPayload, OrderItemInput, OrderStatus, ServiceType};


const SHOP: &str = "s1";

/// Shop s1: tables t1/t2, dumpling 5.00, tea 3.00, noodle 7.00 (sold out),
/// tax 10% excluded, service charge 5%
fn create_test_manager() -> OrdersManager {
    let manager = OrdersManager::in_memory().unwrap();
    manager
        .upsert_table(DiningTable::new("t1", SHOP, "Table 1", 4))
        .unwrap();
    manager
        .upsert_table(DiningTable::new("t2", SHOP, "Table 2", 2))
        .unwrap();
    manager
        .upsert_menu_item(MenuItemAvailability::new(
            "dumpling",
            SHOP,
            "Dumpling",
            Decimal::new(500, 2),
        ))
        .unwrap();
    manager
        .upsert_menu_item(MenuItemAvailability::new("tea", SHOP, "Tea", Decimal::new(300, 2)))
        .unwrap();
    let mut noodle = MenuItemAvailability::new("noodle", SHOP, "Noodle", Decimal::new(700, 2));
    noodle.is_available = false;
    manager.upsert_menu_item(noodle).unwrap();

    let mut settings = ShopSettings::defaults(SHOP);
    settings.tax_rate = Decimal::from(10);
    settings.service_charge_rate = Decimal::from(5);
    manager.put_settings(settings).unwrap();
    manager
}

fn cmd(payload: OrderCommandPayload) -> OrderCommand {
    OrderCommand::new(SHOP, "staff-1", "Test Staff", payload)
}

fn item(menu_item_id: &str, quantity: u32) -> OrderItemInput {
    OrderItemInput {
        menu_item_id: menu_item_id.to_string(),
        quantity,
        notes: None,
    }
}

fn create_cmd(table_id: Option<&str>, items: Vec<OrderItemInput>) -> OrderCommand {
    let service_type = if table_id.is_some() {
        ServiceType::DineIn
    } else {
        ServiceType::Takeaway
    };
    cmd(OrderCommandPayload::CreateOrder {
        table_id: table_id.map(str::to_string),
        service_type,
        items,
        customer_name: None,
        customer_phone: None,
        note: None,
        session_otp: None,
    })
}

fn transition_cmd(order_id: &str, target: OrderStatus) -> OrderCommand {
    cmd(OrderCommandPayload::TransitionOrder {
        order_id: order_id.to_string(),
        target,
        expected_version: None,
    })
}

fn cancel_cmd(order_id: &str) -> OrderCommand {
    cmd(OrderCommandPayload::CancelOrder {
        order_id: order_id.to_string(),
        reason: None,
    })
}

fn bill_table_cmd(table_id: &str) -> OrderCommand {
    cmd(OrderCommandPayload::BillTable {
        table_id: table_id.to_string(),
        options: BillOptions::default(),
    })
}

fn clear_table_cmd(table_id: &str) -> OrderCommand {
    cmd(OrderCommandPayload::ClearTable {
        table_id: table_id.to_string(),
    })
}

/// Place an order and return its id
fn place_order(
    manager: &OrdersManager,
    table_id: Option<&str>,
    items: Vec<OrderItemInput>,
) -> String {
    let resp = manager.execute_command(create_cmd(table_id, items));
    assert!(resp.success, "Failed to create order: {:?}", resp.error);
    order_from(&resp).id
}

fn order_from(resp: &CommandResponse) -> Order {
    resp.records
        .iter()
        .find_map(|r| match r {
            RecordChange::Order(o) => Some(o.clone()),
            _ => None,
        })
        .expect("response carries an order")
}

fn bill_from(resp: &CommandResponse) -> Bill {
    resp.records
        .iter()
        .find_map(|r| match r {
            RecordChange::Bill(b) => Some(b.clone()),
            _ => None,
        })
        .expect("response carries a bill")
}

fn error_code(resp: &CommandResponse) -> ErrorCode {
    resp.error.as_ref().expect("command should fail").code
}

fn table_status(manager: &OrdersManager, table_id: &str) -> TableStatus {
    manager.get_table(SHOP, table_id).unwrap().unwrap().status
}

fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

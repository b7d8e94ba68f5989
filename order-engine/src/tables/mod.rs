//! Table lifecycle
//!
//! ```text
//! empty ──(first order)──▶ occupied ──(bill)──▶ billed ──(clear)──▶ empty
//! ```
//!
//! Pure transition rules. The manager persists the result in the same
//! transaction as the command that triggered it.

use shared::models::TableStatus;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("table already billed")]
    AlreadyBilled,

    #[error("table has no active orders")]
    NoActiveOrders,

    #[error("table is billed and awaiting clear")]
    AwaitingClear,

    #[error("cannot clear a {0} table with open orders")]
    OpenOrders(TableStatus),
}

/// Status after order activity on the table
///
/// Only empty → occupied is automatic. An occupied table whose orders were
/// all cancelled stays occupied until staff clears it.
pub fn derive_status(current: TableStatus, has_open_orders: bool) -> TableStatus {
    match current {
        TableStatus::Empty if has_open_orders => TableStatus::Occupied,
        other => other,
    }
}

/// A billed table refuses new orders until it is cleared
pub fn ensure_accepts_orders(current: TableStatus) -> Result<(), TableError> {
    match current {
        TableStatus::Billed => Err(TableError::AwaitingClear),
        _ => Ok(()),
    }
}

/// Status after billing the session
pub fn bill(current: TableStatus, has_open_orders: bool) -> Result<TableStatus, TableError> {
    if current == TableStatus::Billed {
        return Err(TableError::AlreadyBilled);
    }
    if !has_open_orders {
        return Err(TableError::NoActiveOrders);
    }
    Ok(TableStatus::Billed)
}

/// Status after staff clears the table
///
/// billed → empty is the normal path. An occupied table may be released
/// once nothing open remains on it (everything cancelled). Clearing an
/// empty table is a no-op.
pub fn clear(current: TableStatus, has_open_orders: bool) -> Result<TableStatus, TableError> {
    match current {
        TableStatus::Billed | TableStatus::Empty => Ok(TableStatus::Empty),
        TableStatus::Occupied if !has_open_orders => Ok(TableStatus::Empty),
        TableStatus::Occupied => Err(TableError::OpenOrders(current)),
    }
}

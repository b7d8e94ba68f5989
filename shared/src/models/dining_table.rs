//! Dining Table Model

use serde::{Deserialize, Serialize};

/// 桌台状态 (materialized from the table's order set)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    #[default]
    Empty,
    Occupied,
    /// Session closed by a bill, waiting for staff to clear
    Billed,
}

impl TableStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Empty => "empty",
            TableStatus::Occupied => "occupied",
            TableStatus::Billed => "billed",
        }
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dining table entity (桌台)
///
/// Tables are created administratively; the engine only writes `status`,
/// `session_otp`, `bill_id` and the version bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiningTable {
    pub id: String,
    pub shop_id: String,
    pub label: String,
    pub status: TableStatus,
    pub seats: u32,
    /// 4 位会话验证码，清台时轮换
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_otp: Option<String>,
    /// Bill closing the current session, set while the table is billed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
    pub version: u64,
    pub updated_at: i64,
}

impl DiningTable {
    /// Take over the administrative fields of `definition`
    ///
    /// Session state (`status`, `session_otp`, `bill_id`) stays untouched.
    pub fn redefine(&mut self, definition: &DiningTable) {
        self.label = definition.label.clone();
        self.seats = definition.seats;
    }

    pub fn new(
        id: impl Into<String>,
        shop_id: impl Into<String>,
        label: impl Into<String>,
        seats: u32,
    ) -> Self {
        Self {
            id: id.into(),
            shop_id: shop_id.into(),
            label: label.into(),
            status: TableStatus::Empty,
            seats,
            session_otp: None,
            bill_id: None,
            version: 0,
            updated_at: 0,
        }
    }
}

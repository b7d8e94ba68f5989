//! 实时变更事件类型定义
//!
//! 这些类型在 order-engine 和 clients 之间共享。每个事件携带完整记录，
//! 客户端按记录版本号归并，不依赖到达顺序。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{Bill, DiningTable, MenuItemAvailability};
use crate::order::Order;

// ============================================================================
// Topic
// ============================================================================

/// Subscribable scope
///
/// Wire form is `shop:{shop}`, `table:{shop}:{table}`, `order:{shop}:{order}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Topic {
    Shop { shop_id: String },
    Table { shop_id: String, table_id: String },
    Order { shop_id: String, order_id: String },
}

impl Topic {
    pub fn shop(shop_id: impl Into<String>) -> Self {
        Topic::Shop {
            shop_id: shop_id.into(),
        }
    }

    pub fn table(shop_id: impl Into<String>, table_id: impl Into<String>) -> Self {
        Topic::Table {
            shop_id: shop_id.into(),
            table_id: table_id.into(),
        }
    }

    pub fn order(shop_id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Topic::Order {
            shop_id: shop_id.into(),
            order_id: order_id.into(),
        }
    }

    pub fn shop_id(&self) -> &str {
        match self {
            Topic::Shop { shop_id }
            | Topic::Table { shop_id, .. }
            | Topic::Order { shop_id, .. } => shop_id,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Shop { shop_id } => write!(f, "shop:{}", shop_id),
            Topic::Table { shop_id, table_id } => write!(f, "table:{}:{}", shop_id, table_id),
            Topic::Order { shop_id, order_id } => write!(f, "order:{}:{}", shop_id, order_id),
        }
    }
}

/// Error parsing a topic string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid topic: {0}")]
pub struct InvalidTopic(pub String);

impl FromStr for Topic {
    type Err = InvalidTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(InvalidTopic(s.to_string()));
        }
        match parts.as_slice() {
            ["shop", shop] => Ok(Topic::shop(*shop)),
            ["table", shop, table] => Ok(Topic::table(*shop, *table)),
            ["order", shop, order] => Ok(Topic::order(*shop, *order)),
            _ => Err(InvalidTopic(s.to_string())),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Order,
    Table,
    Bill,
    MenuItem,
}

/// Identity of a record in a local view
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub shop_id: String,
    pub id: String,
}

/// Full record carried by a change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum RecordChange {
    Order(Order),
    Table(DiningTable),
    Bill(Bill),
    MenuItem(MenuItemAvailability),
}

impl RecordChange {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordChange::Order(_) => RecordKind::Order,
            RecordChange::Table(_) => RecordKind::Table,
            RecordChange::Bill(_) => RecordKind::Bill,
            RecordChange::MenuItem(_) => RecordKind::MenuItem,
        }
    }

    pub fn shop_id(&self) -> &str {
        match self {
            RecordChange::Order(r) => &r.shop_id,
            RecordChange::Table(r) => &r.shop_id,
            RecordChange::Bill(r) => &r.shop_id,
            RecordChange::MenuItem(r) => &r.shop_id,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RecordChange::Order(r) => &r.id,
            RecordChange::Table(r) => &r.id,
            RecordChange::Bill(r) => &r.id,
            RecordChange::MenuItem(r) => &r.id,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            kind: self.kind(),
            shop_id: self.shop_id().to_string(),
            id: self.id().to_string(),
        }
    }

    /// Monotonic write counter of the record
    pub fn version(&self) -> u64 {
        match self {
            RecordChange::Order(r) => r.version,
            RecordChange::Table(r) => r.version,
            RecordChange::Bill(r) => r.version,
            RecordChange::MenuItem(r) => r.version,
        }
    }

    /// Topics this record fans out to
    ///
    /// Everything goes to the shop topic. Orders also go to their order
    /// topic and their table topic. Bills go to the table topic, or to the
    /// order topic when standalone.
    pub fn topics(&self) -> Vec<Topic> {
        let shop_id = self.shop_id();
        let mut topics = vec![Topic::shop(shop_id)];
        match self {
            RecordChange::Order(order) => {
                topics.push(Topic::order(shop_id, &order.id));
                if let Some(table_id) = &order.table_id {
                    topics.push(Topic::table(shop_id, table_id));
                }
            }
            RecordChange::Table(table) => topics.push(Topic::table(shop_id, &table.id)),
            RecordChange::Bill(bill) => {
                if let Some(table_id) = &bill.table_id {
                    topics.push(Topic::table(shop_id, table_id));
                }
                if let Some(order_id) = &bill.order_id {
                    topics.push(Topic::order(shop_id, order_id));
                }
            }
            RecordChange::MenuItem(_) => {}
        }
        topics
    }

    /// Whether a subscriber of `topic` should see this record
    pub fn belongs_to(&self, topic: &Topic) -> bool {
        self.topics().iter().any(|t| t == topic)
    }

    /// Whether a live view of `topic` keeps holding this record
    ///
    /// Shop views keep orders still on the kitchen track. Table views also
    /// keep served orders of the unbilled session. Order views keep their
    /// order in any state. A bill stays while its table or its order still
    /// points at it; that needs the other record and is checked by the view.
    pub fn is_live_in(&self, topic: &Topic) -> bool {
        match (self, topic) {
            (RecordChange::Order(order), Topic::Shop { .. }) => order.status.is_cancellable(),
            (RecordChange::Order(order), Topic::Table { .. }) => {
                order.status.is_cancellable() || order.is_open()
            }
            _ => true,
        }
    }
}

// ============================================================================
// Change events
// ============================================================================

/// Change notification pushed to subscribers (at-least-once, unordered)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: String,
    pub shop_id: String,
    pub record: RecordChange,
    /// Server time (Unix milliseconds)
    pub emitted_at: i64,
}

impl ChangeEvent {
    pub fn new(record: RecordChange) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            shop_id: record.shop_id().to_string(),
            record,
            emitted_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.record.topics()
    }
}

/// Authoritative full view of a topic, used on (re)connect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSnapshot {
    pub topic: Topic,
    pub records: Vec<RecordChange>,
    pub taken_at: i64,
}

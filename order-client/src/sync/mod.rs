//! 客户端同步
//!
//! - [`view`] - 本地视图 + 按版本归并（纯函数，可单测）
//! - [`synchronizer`] - 订阅 / 快照 / 重连循环

pub mod synchronizer;
pub mod view;

pub use synchronizer::{SharedView, SyncStatus, Synchronizer, ViewKind};
pub use view::{Applied, LocalView};

//! Order Client - 订单引擎的客户端同步库
//!
//! 每个终端（顾客手机、厨房屏、收银台）各自运行：
//! - [`sync::Synchronizer`] - 订阅主题、断线后全量重同步、按版本归并事件
//! - [`availability`] - 店铺共享的售罄表 + 购物车
//! - [`transport`] - HTTP/SSE 或同进程直连

pub mod availability;
pub mod config;
pub mod error;
pub mod sync;
pub mod transport;

pub use availability::{Cart, CartLine, ShopAvailability};
pub use config::{ClientConfig, SyncConfig};
pub use error::{ClientError, ClientResult};
pub use sync::{Applied, LocalView, SharedView, SyncStatus, Synchronizer, ViewKind};
pub use transport::{Authority, ChangeFeed, HttpTransport, Transport};
#[cfg(feature = "in-process")]
pub use transport::LocalTransport;

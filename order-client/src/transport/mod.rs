//! 传输层抽象
//!
//! 同步器只依赖两个能力：
//! - [`ChangeFeed`] - 订阅主题的变更流（至少一次，不保证顺序，无补发）
//! - [`Authority`] - 权威快照 + 命令提交
//!
//! 变更流正常结束表示断线；`Err(ClientError::Lagged)` 表示丢了消息。
//! 两种情况都需要重新订阅并拉快照。

mod http;
#[cfg(feature = "in-process")]
mod local;

pub use http::HttpTransport;
#[cfg(feature = "in-process")]
pub use local::LocalTransport;

use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::error::CommandResponse;
use shared::message::{ChangeEvent, Topic, TopicSnapshot};
use shared::order::OrderCommand;

use crate::error::ClientResult;

/// 一个主题的变更流
pub type ChangeStream = BoxStream<'static, ClientResult<ChangeEvent>>;

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// 订阅主题；返回之后提交的变更都会出现在流里
    async fn subscribe(&self, topic: &Topic) -> ClientResult<ChangeStream>;
}

#[async_trait]
pub trait Authority: Send + Sync {
    /// 主题的权威全量快照
    async fn snapshot(&self, topic: &Topic) -> ClientResult<TopicSnapshot>;

    /// 提交命令
    ///
    /// 业务拒绝（冲突、售罄...）以 `Ok(CommandResponse { error: Some(..) })`
    /// 返回；`Err` 只表示没拿到答复，可以用同一个 `command_id` 重发。
    async fn submit(&self, cmd: OrderCommand) -> ClientResult<CommandResponse>;
}

/// 同时提供两种能力的传输
pub trait Transport: ChangeFeed + Authority {}

impl<T: ChangeFeed + Authority> Transport for T {}

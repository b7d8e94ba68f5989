//! In-process transport
//!
//! 直接持有 `OrdersManager`，订阅走引擎内的 `MessageBus`，零网络开销。
//! 嵌入式部署（收银台与引擎同进程）和测试使用。

use async_trait::async_trait;
use futures::StreamExt;
use order_engine::OrdersManager;
use order_engine::message::OwnedSubscription;
use shared::error::{CommandError, CommandResponse};
use shared::message::{Topic, TopicSnapshot};
use shared::order::OrderCommand;
use tokio::sync::broadcast::error::RecvError;

use super::{Authority, ChangeFeed, ChangeStream};
use crate::error::{ClientError, ClientResult};

#[derive(Clone)]
pub struct LocalTransport {
    manager: OrdersManager,
}

impl LocalTransport {
    pub fn new(manager: OrdersManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &OrdersManager {
        &self.manager
    }
}

#[async_trait]
impl Authority for LocalTransport {
    async fn snapshot(&self, topic: &Topic) -> ClientResult<TopicSnapshot> {
        self.manager
            .topic_snapshot(topic)
            .map_err(|e| ClientError::Server(CommandError::from(e)))
    }

    async fn submit(&self, cmd: OrderCommand) -> ClientResult<CommandResponse> {
        let resp = self.manager.execute(cmd).await;
        match &resp.error {
            Some(err) if err.is_retryable() => {
                Err(ClientError::Server(err.clone()))
            }
            _ => Ok(resp),
        }
    }
}

#[async_trait]
impl ChangeFeed for LocalTransport {
    async fn subscribe(&self, topic: &Topic) -> ClientResult<ChangeStream> {
        let subscription = self
            .manager
            .bus()
            .subscribe_owned(topic)
            .map_err(|e| ClientError::Disconnected(e.to_string()))?;
        Ok(subscription_stream(subscription))
    }
}

/// `Lagged` 产出一次错误后结束；`Closed` 直接结束。流被 drop 时退订
fn subscription_stream(subscription: OwnedSubscription) -> ChangeStream {
    futures::stream::unfold(Some(subscription), |subscription| async move {
        let mut subscription = subscription?;
        match subscription.recv().await {
            Ok(change) => Some((Ok(change), Some(subscription))),
            Err(RecvError::Lagged(skipped)) => Some((Err(ClientError::Lagged(skipped)), None)),
            Err(RecvError::Closed) => None,
        }
    })
    .boxed()
}

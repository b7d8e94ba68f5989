//! 消息总线核心实现
//!
//! # 架构
//!
//! ```text
//! OrdersManager ──commit──▶ publish(ChangeEvent)
//!                                │
//!                     event.topics() 路由
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        ▼                       ▼                       ▼
//!  shop:{shop}           table:{shop}:{table}     order:{shop}:{order}
//!  broadcast::Sender     broadcast::Sender        broadcast::Sender
//!        │                       │                       │
//!   subscribers             subscribers             subscribers
//! ```
//!
//! Delivery is at-least-once per live subscription. Nothing is buffered for
//! a topic with no subscribers; a subscriber that falls behind sees
//! `Lagged` and must resync from [`MessageBus::snapshot`].

use std::sync::Arc;

use dashmap::DashMap;
use shared::message::{ChangeEvent, Topic, TopicSnapshot};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::store::{StorageError, Store};

/// Default per-topic channel capacity
const DEFAULT_TOPIC_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("message bus is shut down")]
    Shutdown,

    #[error("snapshot failed: {0}")]
    Snapshot(#[from] StorageError),
}

/// 一个主题的订阅
///
/// Dropping the subscription (or passing it to [`MessageBus::unsubscribe`])
/// stops delivery.
#[derive(Debug)]
pub struct TopicSubscription {
    topic: Topic,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl TopicSubscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Next change on this topic
    ///
    /// `RecvError::Lagged` means events were dropped for this subscriber;
    /// `RecvError::Closed` means the topic channel went away (shutdown or
    /// forced disconnect). Both require a resync.
    pub async fn recv(&mut self) -> Result<ChangeEvent, RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Result<ChangeEvent, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// 离开作用域时自动退订的订阅（SSE 连接、同进程客户端）
#[derive(Debug)]
pub struct OwnedSubscription {
    bus: MessageBus,
    subscription: Option<TopicSubscription>,
}

impl OwnedSubscription {
    pub fn topic(&self) -> Option<&Topic> {
        self.subscription.as_ref().map(TopicSubscription::topic)
    }

    /// Same as [`TopicSubscription::recv`]; `Closed` once dropped from the bus
    pub async fn recv(&mut self) -> Result<ChangeEvent, RecvError> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for OwnedSubscription {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.bus.unsubscribe(subscription);
        }
    }
}

/// 消息总线 - 负责按主题路由变更事件
///
/// # 职责
///
/// - 主题订阅管理 (subscribe, unsubscribe)
/// - 变更广播 (publish)
/// - 权威快照 (snapshot)
#[derive(Debug, Clone)]
pub struct MessageBus {
    /// 快照来源
    store: Store,
    /// 主题 -> 广播通道（按需创建）
    topics: Arc<DashMap<Topic, broadcast::Sender<ChangeEvent>>>,
    /// 每个主题通道的容量
    capacity: usize,
    /// 关闭信号令牌
    shutdown_token: CancellationToken,
}

impl MessageBus {
    /// 创建默认容量的消息总线
    pub fn new(store: Store) -> Self {
        Self::with_capacity(store, DEFAULT_TOPIC_CAPACITY)
    }

    /// 创建指定容量的消息总线
    pub fn with_capacity(store: Store, capacity: usize) -> Self {
        Self {
            store,
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// 订阅主题
    ///
    /// Changes committed after this call are delivered. Call
    /// [`snapshot`](Self::snapshot) afterwards to get everything before it;
    /// overlap is harmless because consumers reduce by version.
    pub fn subscribe(&self, topic: &Topic) -> Result<TopicSubscription, BusError> {
        if self.shutdown_token.is_cancelled() {
            return Err(BusError::Shutdown);
        }
        let receiver = self
            .topics
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        tracing::debug!(topic = %topic, "Topic subscribed");
        Ok(TopicSubscription {
            topic: topic.clone(),
            receiver,
        })
    }

    /// 订阅主题，drop 时自动退订
    pub fn subscribe_owned(&self, topic: &Topic) -> Result<OwnedSubscription, BusError> {
        let subscription = self.subscribe(topic)?;
        Ok(OwnedSubscription {
            bus: self.clone(),
            subscription: Some(subscription),
        })
    }

    /// 取消订阅，最后一个订阅者离开时释放主题通道
    pub fn unsubscribe(&self, subscription: TopicSubscription) {
        let topic = subscription.topic.clone();
        drop(subscription);
        self.topics
            .remove_if(&topic, |_, tx| tx.receiver_count() == 0);
        tracing::debug!(topic = %topic, "Topic unsubscribed");
    }

    /// 发布变更 (引擎提交后调用)
    ///
    /// Returns how many subscriber deliveries were queued.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        if self.shutdown_token.is_cancelled() {
            return 0;
        }
        let mut delivered = 0;
        for topic in event.topics() {
            let Some(tx) = self.topics.get(&topic) else {
                continue;
            };
            // 无订阅者时 send 返回 Err，不缓存
            if let Ok(count) = tx.send(event.clone()) {
                delivered += count;
            }
        }
        tracing::trace!(
            event_id = %event.event_id,
            kind = ?event.record.kind(),
            delivered,
            "Change published"
        );
        delivered
    }

    /// 主题的权威快照
    pub fn snapshot(&self, topic: &Topic) -> Result<TopicSnapshot, BusError> {
        let records = self.store.topic_snapshot(topic)?;
        Ok(TopicSnapshot {
            topic: topic.clone(),
            records,
            taken_at: shared::util::now_millis(),
        })
    }

    /// 断开主题上的所有订阅者 (订阅者收到 `Closed`)
    pub fn close_topic(&self, topic: &Topic) {
        if self.topics.remove(topic).is_some() {
            tracing::info!(topic = %topic, "Topic closed, subscribers disconnected");
        }
    }

    /// 当前活跃主题数
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// 主题订阅者数量
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// 获取关闭令牌 (用于监控关闭信号)
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// 优雅关闭消息总线
    ///
    /// 所有订阅者收到 `Closed`，之后的 subscribe 返回错误
    pub fn shutdown(&self) {
        tracing::info!("Shutting down message bus");
        self.shutdown_token.cancel();
        self.topics.clear();
    }
}

//! Synchronizer - 订阅 + 全量重同步 + 增量归并
//!
//! # 会话流程
//!
//! ```text
//! run()
//!   └─ loop
//!        ├─ 1. 订阅视图需要的所有主题
//!        ├─ 2. 拉取每个主题的权威快照，整体替换本地视图
//!        ├─ 3. 状态 Live，逐条归并增量事件
//!        └─ 流结束 / 落后 / 超时
//!             ├─ 可重试 → 退避等待，回到 1
//!             └─ 不可重试 → 返回错误
//! ```
//!
//! 先订阅再拉快照：两者之间提交的变更会同时出现在快照和事件流里，
//! 归并器按版本去重。

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use shared::error::CommandResponse;
use shared::message::{ChangeEvent, RecordChange, RecordKind, Topic};
use shared::order::OrderCommand;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::view::{Applied, LocalView};
use crate::config::SyncConfig;
use crate::error::{ClientError, ClientResult};
use crate::transport::{ChangeStream, Transport};

/// 本地记录变更通知容量
const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// 提交命令的最多尝试次数（同一个 command_id）
const SUBMIT_ATTEMPTS: u32 = 3;

/// 多个组件共享的视图
pub type SharedView = Arc<RwLock<LocalView>>;

/// 客户端视图类型，决定订阅哪些主题
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    /// 厨房显示：全店订单
    KitchenDisplay,
    /// 前台桌台总览：全店桌台、订单、账单
    TableBoard,
    /// 桌边点餐：本桌会话
    TableSide { table_id: String },
    /// 顾客追踪：只看自己的订单
    CustomerTracker { order_id: String },
    /// 菜单售罄状态
    Menu,
}

impl ViewKind {
    pub fn topics(&self, shop_id: &str) -> Vec<Topic> {
        match self {
            ViewKind::KitchenDisplay | ViewKind::TableBoard | ViewKind::Menu => {
                vec![Topic::shop(shop_id)]
            }
            ViewKind::TableSide { table_id } => vec![Topic::table(shop_id, table_id)],
            ViewKind::CustomerTracker { order_id } => vec![Topic::order(shop_id, order_id)],
        }
    }

    /// 视图保留的记录类型
    pub fn record_kinds(&self) -> Option<Vec<RecordKind>> {
        match self {
            ViewKind::KitchenDisplay => Some(vec![RecordKind::Order]),
            ViewKind::Menu => Some(vec![RecordKind::MenuItem]),
            ViewKind::TableBoard => Some(vec![
                RecordKind::Table,
                RecordKind::Order,
                RecordKind::Bill,
            ]),
            ViewKind::TableSide { .. } | ViewKind::CustomerTracker { .. } => None,
        }
    }

    fn view(&self, shop_id: &str) -> LocalView {
        let view = LocalView::new(self.topics(shop_id));
        match self.record_kinds() {
            Some(kinds) => view.with_kinds(kinds),
            None => view,
        }
    }
}

/// 同步状态（UI 显示"离线/重连中"用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Connecting,
    Live,
    Reconnecting { attempt: u32 },
    Stopped,
    Failed(String),
}

/// 单个视图的同步器
pub struct Synchronizer<T> {
    transport: Arc<T>,
    shop_id: String,
    kind: ViewKind,
    config: SyncConfig,
    view: SharedView,
    status: watch::Sender<SyncStatus>,
    changes: broadcast::Sender<RecordChange>,
}

impl<T: Transport + 'static> Synchronizer<T> {
    pub fn new(transport: Arc<T>, shop_id: impl Into<String>, kind: ViewKind, config: SyncConfig) -> Self {
        let shop_id = shop_id.into();
        let view = Arc::new(RwLock::new(kind.view(&shop_id)));
        let (status, _) = watch::channel(SyncStatus::Connecting);
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            transport,
            shop_id,
            kind,
            config,
            view,
            status,
            changes,
        }
    }

    pub fn shop_id(&self) -> &str {
        &self.shop_id
    }

    pub fn kind(&self) -> &ViewKind {
        &self.kind
    }

    pub fn view(&self) -> SharedView {
        self.view.clone()
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// 视图中实际发生变化的记录（重同步时快照里的全部记录也会发出）
    pub fn subscribe_changes(&self) -> broadcast::Receiver<RecordChange> {
        self.changes.subscribe()
    }

    /// 运行直到 shutdown 或遇到不可重试的错误
    pub async fn run(&self, shutdown: CancellationToken) -> ClientResult<()> {
        let mut attempt = 0u32;
        loop {
            let err = tokio::select! {
                _ = shutdown.cancelled() => {
                    self.status.send_replace(SyncStatus::Stopped);
                    return Ok(());
                }
                err = self.session(&mut attempt) => err,
            };

            if !err.is_retryable() {
                tracing::error!(view = ?self.kind, error = %err, "Sync failed");
                self.status.send_replace(SyncStatus::Failed(err.to_string()));
                return Err(err);
            }

            attempt += 1;
            if self.config.exhausted(attempt) {
                tracing::error!(view = ?self.kind, attempt, error = %err, "Sync gave up reconnecting");
                self.status.send_replace(SyncStatus::Failed(err.to_string()));
                return Err(err);
            }

            let delay = self.config.backoff(attempt);
            tracing::warn!(view = ?self.kind, attempt, delay = ?delay, error = %err, "Sync session lost, reconnecting");
            self.status.send_replace(SyncStatus::Reconnecting { attempt });
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.status.send_replace(SyncStatus::Stopped);
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// 一次连接会话；返回结束它的错误
    async fn session(&self, attempt: &mut u32) -> ClientError {
        self.status.send_replace(SyncStatus::Connecting);

        let mut streams: Vec<ChangeStream> = Vec::new();
        for topic in self.kind.topics(&self.shop_id) {
            let stream = match self.bounded("subscribe", self.transport.subscribe(&topic)).await {
                Ok(stream) => stream,
                Err(e) => return e,
            };
            // 任意一个主题断开都要整体重连
            let marker = topic.to_string();
            streams.push(
                stream
                    .chain(futures::stream::once(async move {
                        Err(ClientError::Disconnected(format!("{marker} feed ended")))
                    }))
                    .boxed(),
            );
        }
        let mut incoming = futures::stream::select_all(streams);

        if let Err(e) = self.resync().await {
            return e;
        }
        *attempt = 0;
        self.status.send_replace(SyncStatus::Live);
        tracing::info!(view = ?self.kind, shop_id = %self.shop_id, "Sync live");

        loop {
            match incoming.next().await {
                Some(Ok(event)) => {
                    self.apply_incoming(&event);
                }
                Some(Err(e)) => return e,
                None => return ClientError::Disconnected("no topics".to_string()),
            }
        }
    }

    /// 拉取所有主题的权威快照并替换视图
    ///
    /// 收到 `Conflict` 后"刷新再重试"也走这里。
    pub async fn resync(&self) -> ClientResult<()> {
        let mut snapshots = Vec::new();
        for topic in self.kind.topics(&self.shop_id) {
            snapshots.push(self.bounded("snapshot", self.transport.snapshot(&topic)).await?);
        }

        let records: Vec<RecordChange> = {
            let mut view = self.view.write();
            view.replace(snapshots);
            view.records().cloned().collect()
        };
        tracing::debug!(view = ?self.kind, records = records.len(), "View resynced");
        for record in records {
            let _ = self.changes.send(record);
        }
        Ok(())
    }

    fn apply_incoming(&self, event: &ChangeEvent) -> Applied {
        let applied = self.view.write().apply_event(event);
        tracing::trace!(event_id = %event.event_id, kind = ?event.record.kind(), ?applied, "Change applied");
        if applied.changed() {
            let _ = self.changes.send(event.record.clone());
        }
        applied
    }

    /// 用写操作的直接响应更新自己的视图，不等事件回流
    pub fn apply_own_write(&self, records: &[RecordChange]) -> usize {
        let mut changed = Vec::new();
        {
            let mut view = self.view.write();
            for record in records {
                if view.apply(record.clone()).changed() {
                    changed.push(record.clone());
                }
            }
        }
        let count = changed.len();
        for record in changed {
            let _ = self.changes.send(record);
        }
        count
    }

    /// 提交命令
    ///
    /// 没拿到答复（超时、断线）时用同一个 command_id 重发，服务端去重；
    /// 业务拒绝原样返回，不重试。
    pub async fn submit(&self, cmd: OrderCommand) -> ClientResult<CommandResponse> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.bounded("submit", self.transport.submit(cmd.clone())).await {
                Ok(resp) => {
                    if resp.success {
                        self.apply_own_write(&resp.records);
                    }
                    return Ok(resp);
                }
                Err(e) if e.is_retryable() && attempt < SUBMIT_ATTEMPTS => {
                    let delay = self.config.backoff(attempt);
                    tracing::warn!(command_id = %cmd.command_id, attempt, error = %e, "Submit failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn bounded<F, R>(&self, what: &str, fut: F) -> ClientResult<R>
    where
        F: Future<Output = ClientResult<R>>,
    {
        match tokio::time::timeout(self.config.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(format!(
                "{what} exceeded {:?}",
                self.config.request_timeout
            ))),
        }
    }
}

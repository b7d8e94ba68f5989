use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{BackgroundTasks, Config, EventRouter, Result, TaskKind};
use crate::message::MessageBus;
use crate::notify::{LogDispatcher, NotificationWorker, PushDispatcher};
use crate::orders::OrdersManager;
use crate::store::Store;

/// 推送通道 buffer
const NOTIFY_BUFFER: usize = 256;

/// 服务器状态 - 持有所有服务的共享引用
///
/// 所有字段都是廉价 Clone（内部 Arc）。
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 配置项 (不可变) |
/// | orders | 命令处理 + 查询 |
/// | dispatcher | 推送通道，默认只写日志 |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub orders: OrdersManager,
    pub dispatcher: Arc<dyn PushDispatcher>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("orders", &self.orders)
            .finish()
    }
}

impl ServerState {
    pub fn new(config: Config, orders: OrdersManager) -> Self {
        Self {
            config,
            orders,
            dispatcher: Arc::new(LogDispatcher),
        }
    }

    /// 初始化服务器状态
    ///
    /// 1. 工作目录 (不存在则创建)
    /// 2. redb 数据文件 (work_dir/orders.redb)
    /// 3. MessageBus + OrdersManager
    pub fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db_path = config.database_path();
        tracing::info!(path = %db_path.display(), "Opening order store");
        let store = Store::open(&db_path)?;

        let bus = MessageBus::with_capacity(store.clone(), config.event_channel_capacity);
        let orders = OrdersManager::new(store, bus).with_command_timeout(config.store_timeout());

        Ok(Self::new(config.clone(), orders))
    }

    /// 内存存储（测试用）
    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Store::open_in_memory()?;
        let bus = MessageBus::with_capacity(store.clone(), config.event_channel_capacity);
        let orders = OrdersManager::new(store, bus).with_command_timeout(config.store_timeout());
        Ok(Self::new(config, orders))
    }

    /// 替换推送实现
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn PushDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// 启动后台任务
    ///
    /// - EventRouter: OrdersManager broadcast → 推送通道
    /// - NotificationWorker: 推送
    ///
    /// 与 MessageBus 共用取消令牌，`tasks.shutdown()` 时总线一起关闭。
    pub fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::with_token(self.orders.bus().shutdown_token().clone());

        let (router, channels) = EventRouter::new(NOTIFY_BUFFER);
        tasks.spawn(
            "event_router",
            TaskKind::Listener,
            router.run(self.orders.subscribe(), tasks.shutdown_token()),
        );

        let worker = NotificationWorker::new(
            self.orders.clone(),
            self.dispatcher.clone(),
            self.config.push_timeout(),
        );
        tasks.spawn(
            "notification_worker",
            TaskKind::Worker,
            worker.run(channels.notify_rx, tasks.shutdown_token()),
        );

        tasks
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.work_dir)
    }

    pub fn bus(&self) -> &MessageBus {
        self.orders.bus()
    }
}

//! 核心模块 - 配置、状态、后台任务和 HTTP 服务
//!
//! - [`Config`] - 环境变量配置
//! - [`ServerState`] - 共享状态 (OrdersManager + MessageBus)
//! - [`EventRouter`] - 订单事件分发到后台 Worker
//! - [`BackgroundTasks`] - 后台任务生命周期
//! - [`Server`] - HTTP 服务器

pub mod config;
pub mod error;
pub mod event_router;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use error::{Result, ServerError};
pub use event_router::{EventChannels, EventRouter};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};

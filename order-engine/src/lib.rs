//! Order Engine - 订单与桌台生命周期引擎
//!
//! # 架构概述
//!
//! - **订单状态机** (`orders`): 命令 → 动作 → 事件 → 应用器，redb 单事务条件写入
//! - **桌台状态机** (`tables`): 由订单集合推导的桌台状态
//! - **结账** (`billing`): 纯函数账单计算
//! - **售罄校验** (`availability`): 下单事务内的权威检查
//! - **消息总线** (`message`): 按主题扇出完整记录
//! - **推送** (`notify`): fire-and-forget 推送通知
//! - **HTTP API** (`api`): axum 路由
//!
//! # 模块结构
//!
//! ```text
//! order-engine/src/
//! ├── core/          # 配置、状态、后台任务、HTTP 服务
//! ├── store/         # redb 存储
//! ├── orders/        # 订单命令管线
//! ├── tables/        # 桌台状态推导
//! ├── billing/       # 账单计算
//! ├── availability/  # 售罄校验
//! ├── message/       # 主题总线
//! ├── notify/        # 推送
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod availability;
pub mod billing;
pub mod core;
pub mod message;
pub mod notify;
pub mod orders;
pub mod store;
pub mod tables;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use message::MessageBus;
pub use orders::{ManagerError, OrdersManager};
pub use store::{Store, StorageError};
pub use utils::{ApiResponse, AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境
///
/// 1. 加载 `.env`（不存在则忽略）
/// 2. 读取配置
/// 3. 初始化日志
pub fn setup_environment() -> Config {
    if let Err(e) = dotenv::dotenv() {
        // .env 是可选的
        eprintln!("No .env loaded: {e}");
    }
    let config = Config::from_env();
    init_logger_with_file(
        Some(&config.log_level),
        config.is_production(),
        config.log_dir.as_deref(),
    );
    config
}

pub fn print_banner() {
    println!(
        r#"
   ____          __             ______            _
  / __ \_______/ /__  _____   / ____/___  ____ _(_)___  ___
 / / / / ___/ __  / _ \/ ___/  / __/ / __ \/ __ `/ / __ \/ _ \
/ /_/ / /  / /_/ /  __/ /     / /___/ / / / /_/ / / / / /  __/
\____/_/   \__,_/\___/_/     /_____/_/ /_/\__, /_/_/ /_/\___/
                                         /____/
    "#
    );
}

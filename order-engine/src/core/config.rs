use std::path::PathBuf;
use std::time::Duration;

/// 服务配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖（`.env` 由 `setup_environment` 加载）：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/order-engine | 工作目录 (数据库、日志) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | STORE_TIMEOUT_MS | 5000 | 单条命令的存储超时(毫秒) |
/// | PUSH_TIMEOUT_MS | 3000 | 推送通知超时(毫秒) |
/// | EVENT_CHANNEL_CAPACITY | 1024 | 每个主题的广播缓冲 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (空) | 设置后按天滚动写入文件 |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/orders HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存放 redb 数据文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 命令超时 (毫秒)，超时返回可重试的 Timeout
    pub store_timeout_ms: u64,
    /// 推送通知超时 (毫秒)
    pub push_timeout_ms: u64,
    /// 主题广播通道容量
    pub event_channel_capacity: usize,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/order-engine".into()),
            http_port: env_or("HTTP_PORT", 3000),
            store_timeout_ms: env_or("STORE_TIMEOUT_MS", 5000),
            push_timeout_ms: env_or("PUSH_TIMEOUT_MS", 3000),
            event_channel_capacity: env_or("EVENT_CHANNEL_CAPACITY", 1024),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// redb 数据文件路径
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("orders.redb")
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_and_paths() {
        let config = Config::with_overrides("/tmp/orders-test", 8088);
        assert_eq!(config.http_port, 8088);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/orders-test/orders.redb")
        );
        assert_eq!(
            config.store_timeout(),
            Duration::from_millis(config.store_timeout_ms)
        );
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        assert_eq!(env_or("ORDER_ENGINE_TEST_UNSET_KEY", 42u16), 42);
    }
}

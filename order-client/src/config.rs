//! Client configuration

use std::time::Duration;

use shared::order::{OrderCommand, OrderCommandPayload};

/// 同步重连策略
///
/// 断线、落后、超时都会触发：退避等待 → 重新订阅 → 全量快照。
/// 业务错误（冲突、售罄等）不会走这里。
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// 第一次重连前的等待
    pub initial_delay: Duration,
    /// 退避上限
    pub max_delay: Duration,
    /// 每次失败后等待时间的倍数
    pub backoff_multiplier: u32,
    /// 连续失败次数上限，`None` 表示一直重试
    pub max_attempts: Option<u32>,
    /// 单次快照 / 命令请求的超时
    pub request_timeout: Duration,
}

impl SyncConfig {
    /// 店内局域网：快速重连，无限重试
    pub fn lan() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2,
            max_attempts: None,
            request_timeout: Duration::from_secs(3),
        }
    }

    /// 公网（顾客手机）：更长的超时和退避
    pub fn wan() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2,
            max_attempts: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// 第 `attempt` 次重连前的等待 (attempt 从 1 开始)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = self.backoff_multiplier.max(1).saturating_pow(exponent);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// 是否已用完重试次数
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt > max)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::lan()
    }
}

/// Client configuration for connecting to the order engine
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://localhost:3000")
    pub base_url: String,
    /// 店铺 ID
    pub shop_id: String,
    /// 操作者（员工 ID / 设备 ID）
    pub operator_id: String,
    pub operator_name: String,
    pub sync: SyncConfig,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, shop_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            shop_id: shop_id.into(),
            operator_id: "anonymous".to_string(),
            operator_name: String::new(),
            sync: SyncConfig::default(),
        }
    }

    /// Set the operator recorded on every command
    pub fn with_operator(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.operator_id = id.into();
        self.operator_name = name.into();
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// 以本终端的身份包装命令（每次生成新的 command_id）
    pub fn command(&self, payload: OrderCommandPayload) -> OrderCommand {
        OrderCommand::new(
            self.shop_id.clone(),
            self.operator_id.clone(),
            self.operator_name.clone(),
            payload,
        )
    }

    /// Create an HTTP transport from this configuration
    pub fn build_http_transport(&self) -> crate::ClientResult<crate::transport::HttpTransport> {
        crate::transport::HttpTransport::new(&self.base_url, self.sync.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = SyncConfig::lan();
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(4), Duration::from_millis(800));
        assert_eq!(config.backoff(10), Duration::from_secs(2));
        assert_eq!(config.backoff(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn test_command_carries_operator() {
        let config = ClientConfig::new("http://pos.local:3000/", "s1").with_operator("kds-1", "Kitchen");
        let cmd = config.command(OrderCommandPayload::ClearTable {
            table_id: "t1".into(),
        });
        assert_eq!(cmd.shop_id, "s1");
        assert_eq!(cmd.operator_id, "kds-1");
        assert_ne!(cmd.command_id, config.command(cmd.payload.clone()).command_id);
    }

    #[test]
    fn test_attempt_limit() {
        let unlimited = SyncConfig::wan();
        assert!(!unlimited.exhausted(1_000));

        let limited = SyncConfig::lan().with_max_attempts(3);
        assert!(!limited.exhausted(3));
        assert!(limited.exhausted(4));
    }
}

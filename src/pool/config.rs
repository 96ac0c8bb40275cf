//! 连接池配置模块

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 连接池配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// 建立连接超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 单次网络操作超时（ping、浏览数据库等，毫秒）
    pub operation_timeout_ms: u64,
    /// 建立连接失败后的立即重试次数
    pub connect_retries: u32,
}

impl PoolConfig {
    /// 创建连接池配置构建器
    pub fn builder() -> crate::config::PoolConfigBuilder {
        crate::config::PoolConfigBuilder::new()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            operation_timeout_ms: 10_000,
            // 交互式的管理操作，只做一次立即重试，之后由操作员手动重连
            connect_retries: 1,
        }
    }
}

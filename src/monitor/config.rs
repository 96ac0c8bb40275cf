//! 监控配置

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 监控调度器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 是否启用监控
    pub enabled: bool,
    /// 轮询间隔（秒）
    pub interval_sec: u64,
    /// 单个连接获取状态的超时（毫秒），必须小于轮询间隔
    pub fetch_timeout_ms: u64,
    /// 样本保留时长（秒），`None` 表示永久保留
    pub retention_sec: Option<u64>,
}

impl MonitorConfig {
    /// 创建监控配置构建器
    pub fn builder() -> crate::config::MonitorConfigBuilder {
        crate::config::MonitorConfigBuilder::new()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_sec)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retention(&self) -> Option<Duration> {
        self.retention_sec.map(Duration::from_secs)
    }

    /// 清理前允许超出保留时长的余量
    ///
    /// 取保留时长的十分之一与轮询间隔中较大者，最早的样本超出余量后才清理
    pub fn prune_slack(&self) -> Duration {
        let retention = self.retention().unwrap_or_default();
        (retention / 10).max(self.interval())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_sec: 30,
            fetch_timeout_ms: 10_000,
            retention_sec: Some(24 * 60 * 60),
        }
    }
}

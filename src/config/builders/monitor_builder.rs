//! # 监控配置构建器模块

use crate::error::AdminResult;
use crate::monitor::MonitorConfig;
use rat_logger::info;

/// 监控配置构建器
///
/// 严格要求所有配置项必须显式设置，严禁使用默认值
#[derive(Debug)]
pub struct MonitorConfigBuilder {
    enabled: Option<bool>,
    interval_sec: Option<u64>,
    fetch_timeout_ms: Option<u64>,
    retention_sec: Option<Option<u64>>,
}

impl MonitorConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            enabled: None,
            interval_sec: None,
            fetch_timeout_ms: None,
            retention_sec: None,
        }
    }

    /// 设置是否启用监控
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// 设置轮询间隔（秒）
    pub fn interval_sec(mut self, interval: u64) -> Self {
        self.interval_sec = Some(interval);
        self
    }

    /// 设置单个连接获取状态的超时（毫秒）
    pub fn fetch_timeout_ms(mut self, timeout: u64) -> Self {
        self.fetch_timeout_ms = Some(timeout);
        self
    }

    /// 设置样本保留时长（秒）
    ///
    /// # 参数
    ///
    /// * `retention` - 保留时长，`None` 表示永久保留
    pub fn retention_sec(mut self, retention: Option<u64>) -> Self {
        self.retention_sec = Some(retention);
        self
    }

    /// 构建监控配置
    ///
    /// # 错误
    ///
    /// 配置项未设置、为零，或者获取超时不小于轮询间隔时返回错误
    pub fn build(self) -> AdminResult<MonitorConfig> {
        let enabled = self
            .enabled
            .ok_or_else(|| crate::admin_error!(config, "是否启用监控必须设置"))?;

        let interval_sec = self
            .interval_sec
            .ok_or_else(|| crate::admin_error!(config, "轮询间隔必须设置"))?;

        let fetch_timeout_ms = self
            .fetch_timeout_ms
            .ok_or_else(|| crate::admin_error!(config, "获取状态超时时间必须设置"))?;

        let retention_sec = self
            .retention_sec
            .ok_or_else(|| crate::admin_error!(config, "样本保留时长必须设置"))?;

        if interval_sec == 0 {
            return Err(crate::admin_error!(config, "轮询间隔不能为零"));
        }

        if fetch_timeout_ms == 0 {
            return Err(crate::admin_error!(config, "获取状态超时时间不能为零"));
        }

        if fetch_timeout_ms >= interval_sec.saturating_mul(1000) {
            return Err(crate::admin_error!(
                config,
                format!(
                    "获取状态超时({}ms)必须小于轮询间隔({}s)",
                    fetch_timeout_ms, interval_sec
                )
            ));
        }

        if retention_sec == Some(0) {
            return Err(crate::admin_error!(config, "样本保留时长不能为零"));
        }

        info!(
            "创建监控配置: 启用={}, 间隔={}s, 超时={}ms, 保留={:?}s",
            enabled, interval_sec, fetch_timeout_ms, retention_sec
        );

        Ok(MonitorConfig {
            enabled,
            interval_sec,
            fetch_timeout_ms,
            retention_sec,
        })
    }
}

impl Default for MonitorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

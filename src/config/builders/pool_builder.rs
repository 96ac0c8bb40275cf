//! # 连接池配置构建器模块
//!
//! 提供连接池配置的构建器实现，支持链式调用和严格验证

use crate::error::AdminResult;
use crate::pool::PoolConfig;
use rat_logger::info;

/// 连接池配置构建器
///
/// 严格要求所有配置项必须显式设置，严禁使用默认值
#[derive(Debug)]
pub struct PoolConfigBuilder {
    connect_timeout_ms: Option<u64>,
    operation_timeout_ms: Option<u64>,
    connect_retries: Option<u32>,
}

impl PoolConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            connect_timeout_ms: None,
            operation_timeout_ms: None,
            connect_retries: None,
        }
    }

    /// 设置建立连接超时时间（毫秒）
    ///
    /// # 参数
    ///
    /// * `timeout` - 建立连接超时时间（毫秒）
    pub fn connect_timeout_ms(mut self, timeout: u64) -> Self {
        self.connect_timeout_ms = Some(timeout);
        self
    }

    /// 设置单次操作超时时间（毫秒）
    ///
    /// # 参数
    ///
    /// * `timeout` - ping、列出数据库等操作的超时时间（毫秒）
    pub fn operation_timeout_ms(mut self, timeout: u64) -> Self {
        self.operation_timeout_ms = Some(timeout);
        self
    }

    /// 设置建立连接失败后的立即重试次数
    ///
    /// # 参数
    ///
    /// * `retries` - 重试次数，0 表示不重试
    pub fn connect_retries(mut self, retries: u32) -> Self {
        self.connect_retries = Some(retries);
        self
    }

    /// 构建连接池配置
    ///
    /// # 错误
    ///
    /// 如果任何必需的配置项未设置，将返回错误
    pub fn build(self) -> AdminResult<PoolConfig> {
        let connect_timeout_ms = self
            .connect_timeout_ms
            .ok_or_else(|| crate::admin_error!(config, "建立连接超时时间必须设置"))?;

        let operation_timeout_ms = self
            .operation_timeout_ms
            .ok_or_else(|| crate::admin_error!(config, "操作超时时间必须设置"))?;

        let connect_retries = self
            .connect_retries
            .ok_or_else(|| crate::admin_error!(config, "连接重试次数必须设置"))?;

        // 验证配置的合理性
        if connect_timeout_ms == 0 {
            return Err(crate::admin_error!(config, "建立连接超时时间不能为零"));
        }

        if operation_timeout_ms == 0 {
            return Err(crate::admin_error!(config, "操作超时时间不能为零"));
        }

        info!(
            "创建连接池配置: 连接超时={}ms, 操作超时={}ms, 重试次数={}",
            connect_timeout_ms, operation_timeout_ms, connect_retries
        );

        Ok(PoolConfig {
            connect_timeout_ms,
            operation_timeout_ms,
            connect_retries,
        })
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_every_field() {
        let err = PoolConfigBuilder::new()
            .connect_timeout_ms(5000)
            .operation_timeout_ms(5000)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("重试次数"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = PoolConfig::builder()
            .connect_timeout_ms(0)
            .operation_timeout_ms(5000)
            .connect_retries(1)
            .build();
        assert!(matches!(result, Err(crate::AdminError::ConfigError { .. })));
    }

    #[test]
    fn test_build_ok() {
        let config = PoolConfig::builder()
            .connect_timeout_ms(2000)
            .operation_timeout_ms(3000)
            .connect_retries(0)
            .build()
            .unwrap();
        assert_eq!(config.connect_timeout().as_millis(), 2000);
        assert_eq!(config.operation_timeout().as_millis(), 3000);
        assert_eq!(config.connect_retries, 0);
    }
}

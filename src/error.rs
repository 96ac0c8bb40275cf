//! 错误类型定义模块
//!
//! 结构性错误（名称重复、未找到、连接字符串非法）直接返回给调用方；
//! 连接与监控过程中的瞬时错误被记录到连接记录上，不会向上抛出

use thiserror::Error;

/// 管理核心统一错误类型
#[derive(Error, Debug)]
pub enum AdminError {
    /// 连接名称已存在
    #[error("连接名称 '{name}' 已存在")]
    DuplicateName { name: String },

    /// 连接名称不存在
    #[error("连接 '{name}' 不存在")]
    NotFound { name: String },

    /// 连接字符串无法解析
    #[error("连接字符串非法: {message}")]
    InvalidConnectionString { message: String },

    /// 连接当前没有可用的客户端句柄
    #[error("连接 '{name}' 尚未建立")]
    NotConnected { name: String },

    /// 建立连接失败
    #[error("连接 '{name}' 建立失败: {message}")]
    ConnectFailed { name: String, message: String },

    /// 轮询超时
    #[error("连接 '{name}' 操作超时 ({timeout_ms}ms)")]
    PollTimeout { name: String, timeout_ms: u64 },

    /// 获取服务器状态失败
    #[error("连接 '{name}' 获取服务器状态失败: {message}")]
    StatsFetchFailed { name: String, message: String },

    /// 统计存储不可写
    #[error("统计存储不可用: {message}")]
    StoreUnavailable { message: String },

    /// 配置错误
    #[error("配置错误: {message}")]
    ConfigError { message: String },

    /// 序列化错误
    #[error("数据序列化失败: {message}")]
    SerializationError { message: String },

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),
}

/// 结果类型别名
pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    /// 稳定的错误代码，写入连接记录的 `last_error`
    pub fn code(&self) -> &'static str {
        match self {
            AdminError::DuplicateName { .. } => "duplicate_name",
            AdminError::NotFound { .. } => "not_found",
            AdminError::InvalidConnectionString { .. } => "invalid_connection_string",
            AdminError::NotConnected { .. } => "not_connected",
            AdminError::ConnectFailed { .. } => "connect_failed",
            AdminError::PollTimeout { .. } => "poll_timeout",
            AdminError::StatsFetchFailed { .. } => "stats_fetch_failed",
            AdminError::StoreUnavailable { .. } => "store_unavailable",
            AdminError::ConfigError { .. } => "config",
            AdminError::SerializationError { .. } => "serialization",
            AdminError::IoError(_) => "io",
        }
    }

    /// 是否为瞬时错误（只记录在连接记录上，不影响连接在池中的存在）
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdminError::ConnectFailed { .. }
                | AdminError::PollTimeout { .. }
                | AdminError::StatsFetchFailed { .. }
                | AdminError::StoreUnavailable { .. }
        )
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(e: serde_json::Error) -> Self {
        AdminError::SerializationError {
            message: e.to_string(),
        }
    }
}

/// 快速构造错误的便捷宏
///
/// ```ignore
/// return Err(admin_error!(not_found, name));
/// return Err(admin_error!(config, "轮询间隔不能为零"));
/// ```
#[macro_export]
macro_rules! admin_error {
    (duplicate_name, $name:expr) => {
        $crate::error::AdminError::DuplicateName {
            name: $name.to_string(),
        }
    };
    (not_found, $name:expr) => {
        $crate::error::AdminError::NotFound {
            name: $name.to_string(),
        }
    };
    (not_connected, $name:expr) => {
        $crate::error::AdminError::NotConnected {
            name: $name.to_string(),
        }
    };
    (invalid_uri, $msg:expr) => {
        $crate::error::AdminError::InvalidConnectionString {
            message: $msg.to_string(),
        }
    };
    (connect, $name:expr, $msg:expr) => {
        $crate::error::AdminError::ConnectFailed {
            name: $name.to_string(),
            message: $msg.to_string(),
        }
    };
    (stats, $name:expr, $msg:expr) => {
        $crate::error::AdminError::StatsFetchFailed {
            name: $name.to_string(),
            message: $msg.to_string(),
        }
    };
    (timeout, $name:expr, $duration:expr) => {
        $crate::error::AdminError::PollTimeout {
            name: $name.to_string(),
            timeout_ms: $duration.as_millis() as u64,
        }
    };
    (store, $msg:expr) => {
        $crate::error::AdminError::StoreUnavailable {
            message: $msg.to_string(),
        }
    };
    (config, $msg:expr) => {
        $crate::error::AdminError::ConfigError {
            message: $msg.to_string(),
        }
    };
    (serialization, $msg:expr) => {
        $crate::error::AdminError::SerializationError {
            message: $msg.to_string(),
        }
    };
}

//! 连接记录相关类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::StatsSample;
use crate::error::AdminError;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// 正在建立连接
    Connecting,
    /// 已连接
    Connected,
    /// 连接或轮询失败
    Failed,
    /// 已断开（移除或关闭）
    Disconnected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Failed => "failed",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

/// 驱动相关的连接选项（超时、TLS开关等）
///
/// 保持与配置文件中 `connection_options` 一致的结构，由驱动自行解释
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionOptions(pub BTreeMap<String, serde_json::Value>);

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置选项
    pub fn with<K: Into<String>, V: Into<serde_json::Value>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 读取毫秒数选项，接受数字或数字字符串
    pub fn get_duration_ms(&self, key: &str) -> Option<Duration> {
        match self.0.get(key)? {
            serde_json::Value::Number(n) => n.as_u64().map(Duration::from_millis),
            serde_json::Value::String(s) => s.parse::<u64>().ok().map(Duration::from_millis),
            _ => None,
        }
    }

    /// 读取布尔选项，接受 true/false 或 "true"/"false"
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => s.parse::<bool>().ok(),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }
}

/// 最近一次错误的详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// 稳定的错误代码
    pub code: String,
    /// 错误描述
    pub message: String,
    /// 发生时间
    pub occurred_at: DateTime<Utc>,
}

impl From<&AdminError> for ErrorDetail {
    fn from(e: &AdminError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// 连接记录的只读快照
///
/// 不包含客户端句柄，句柄始终由连接池独占
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// 连接名称
    pub name: String,
    /// 原始连接字符串
    pub connection_string: String,
    /// 连接选项
    pub options: ConnectionOptions,
    /// 当前状态
    pub status: ConnectionStatus,
    /// 最近一次错误
    pub last_error: Option<ErrorDetail>,
    /// 最近一次成功获取的统计样本
    pub last_stats: Option<StatsSample>,
    /// 加入连接池的时间
    pub added_at: DateTime<Utc>,
    /// 最近一次连接成功的时间
    pub connected_at: Option<DateTime<Utc>>,
    /// 是否持有客户端句柄
    pub has_client: bool,
}

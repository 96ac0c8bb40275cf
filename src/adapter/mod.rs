//! 数据库驱动适配器模块
//!
//! 连接池和监控调度器只依赖这里定义的最小能力契约：
//! 建立连接、ping、列出数据库与集合、获取服务器状态、关闭连接

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AdminResult;
use crate::types::{ConnectionOptions, ConnectionString, StatsMetrics};

#[cfg(feature = "mongodb-support")]
mod mongodb;

#[cfg(feature = "mongodb-support")]
pub use self::mongodb::{MongoConnection, MongoDriver};

/// 客户端句柄
///
/// 由连接池独占持有；监控调度器在快照时克隆一份引用用于本轮轮询。
/// `close` 之后句柄失效，后续操作必须返回错误而不是阻塞
pub type ClientHandle = Arc<dyn DriverConnection>;

/// 数据库驱动trait，负责创建连接
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// 驱动名称，用于日志
    fn name(&self) -> &'static str;

    /// 建立连接，必须在 `timeout` 内返回
    async fn connect(
        &self,
        uri: &ConnectionString,
        options: &ConnectionOptions,
        timeout: Duration,
    ) -> AdminResult<ClientHandle>;
}

/// 已建立的数据库连接
#[async_trait]
pub trait DriverConnection: Send + Sync + Debug {
    /// 检查服务器是否可达
    async fn ping(&self, timeout: Duration) -> AdminResult<bool>;

    /// 获取服务器统计指标
    async fn fetch_server_stats(&self, timeout: Duration) -> AdminResult<StatsMetrics>;

    /// 列出所有数据库
    async fn list_databases(&self, timeout: Duration) -> AdminResult<Vec<String>>;

    /// 列出指定数据库下的集合
    async fn list_collections(&self, database: &str, timeout: Duration) -> AdminResult<Vec<String>>;

    /// 释放连接，重复调用无副作用
    async fn close(&self);
}

//! 服务器统计存储模块
//!
//! 追加写入的统计样本存储，按连接名称和时间戳索引，用于历史图表

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AdminResult;
use crate::types::{StatsSample, TimeRange};

mod file;
mod memory;

pub use file::FileStatsStore;
pub use memory::MemoryStatsStore;

/// 统计存储trait
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// 追加一个样本，存储不可写时返回 `StoreUnavailable`
    async fn record(&self, sample: &StatsSample) -> AdminResult<()>;

    /// 查询指定连接在时间范围内的样本，按时间戳升序
    async fn query(&self, connection_name: &str, range: TimeRange) -> Vec<StatsSample>;

    /// 指定连接最新的样本
    async fn latest(&self, connection_name: &str) -> Option<StatsSample>;

    /// 所有连接中最早的样本时间戳，存储为空时返回 `None`
    async fn oldest(&self) -> Option<DateTime<Utc>>;

    /// 删除早于 `cutoff` 的样本，返回删除数量
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> AdminResult<usize>;
}

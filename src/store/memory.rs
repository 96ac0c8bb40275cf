//! 内存统计存储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use super::StatsStore;
use crate::error::AdminResult;
use crate::types::{StatsSample, TimeRange};

/// 内存中的统计存储，进程退出后数据丢失
///
/// 同时作为 [`FileStatsStore`](super::FileStatsStore) 的内存索引
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    /// 连接名称 -> 按时间戳升序排列的样本
    samples: RwLock<HashMap<String, Vec<StatsSample>>>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入样本，保持时间戳非递减
    pub(crate) fn insert(&self, sample: StatsSample) {
        let mut samples = self.samples.write();
        let series = samples.entry(sample.connection_name.clone()).or_default();
        // 时间戳相同时排在已有样本之后
        let pos = series.partition_point(|s| s.timestamp <= sample.timestamp);
        series.insert(pos, sample);
    }

    pub(crate) fn query_sync(&self, connection_name: &str, range: TimeRange) -> Vec<StatsSample> {
        let samples = self.samples.read();
        let Some(series) = samples.get(connection_name) else {
            return Vec::new();
        };
        let start = match range.start {
            Some(start) => series.partition_point(|s| s.timestamp < start),
            None => 0,
        };
        series[start..]
            .iter()
            .take_while(|s| range.end.map_or(true, |end| s.timestamp <= end))
            .cloned()
            .collect()
    }

    pub(crate) fn latest_sync(&self, connection_name: &str) -> Option<StatsSample> {
        self.samples
            .read()
            .get(connection_name)
            .and_then(|series| series.last().cloned())
    }

    /// 所有连接中最早的样本时间戳
    pub(crate) fn oldest_sync(&self) -> Option<DateTime<Utc>> {
        self.samples
            .read()
            .values()
            .filter_map(|series| series.first().map(|s| s.timestamp))
            .min()
    }

    pub(crate) fn prune_sync(&self, cutoff: DateTime<Utc>) -> usize {
        let mut samples = self.samples.write();
        let mut removed = 0;
        for series in samples.values_mut() {
            let keep_from = series.partition_point(|s| s.timestamp < cutoff);
            removed += keep_from;
            series.drain(..keep_from);
        }
        samples.retain(|_, series| !series.is_empty());
        removed
    }

    /// 所有样本，按连接名称分组、时间戳升序
    pub(crate) fn all_samples(&self) -> Vec<StatsSample> {
        let samples = self.samples.read();
        let mut names: Vec<&String> = samples.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| samples[name].iter().cloned())
            .collect()
    }

    /// 样本总数
    pub fn len(&self) -> usize {
        self.samples.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 有样本的连接名称
    pub fn connection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.samples.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn record(&self, sample: &StatsSample) -> AdminResult<()> {
        self.insert(sample.clone());
        Ok(())
    }

    async fn query(&self, connection_name: &str, range: TimeRange) -> Vec<StatsSample> {
        self.query_sync(connection_name, range)
    }

    async fn latest(&self, connection_name: &str) -> Option<StatsSample> {
        self.latest_sync(connection_name)
    }

    async fn oldest(&self) -> Option<DateTime<Utc>> {
        self.oldest_sync()
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> AdminResult<usize> {
        Ok(self.prune_sync(cutoff))
    }
}

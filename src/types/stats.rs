//! 服务器统计样本类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 指标名称 -> 数值
pub type StatsMetrics = BTreeMap<String, f64>;

/// 标准指标名称
pub mod metric {
    pub const UPTIME_SECONDS: &str = "uptime_seconds";
    pub const CONNECTIONS_CURRENT: &str = "connections_current";
    pub const CONNECTIONS_AVAILABLE: &str = "connections_available";
    pub const MEMORY_RESIDENT_MB: &str = "memory_resident_mb";
    pub const MEMORY_VIRTUAL_MB: &str = "memory_virtual_mb";
    pub const NETWORK_BYTES_IN: &str = "network_bytes_in";
    pub const NETWORK_BYTES_OUT: &str = "network_bytes_out";
    pub const NETWORK_REQUESTS: &str = "network_requests";
    pub const OPCOUNTERS_INSERT: &str = "opcounters_insert";
    pub const OPCOUNTERS_QUERY: &str = "opcounters_query";
    pub const OPCOUNTERS_UPDATE: &str = "opcounters_update";
    pub const OPCOUNTERS_DELETE: &str = "opcounters_delete";
    pub const OPCOUNTERS_GETMORE: &str = "opcounters_getmore";
    pub const OPCOUNTERS_COMMAND: &str = "opcounters_command";
}

/// 一次成功轮询得到的服务器统计样本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSample {
    /// 所属连接名称
    pub connection_name: String,
    /// 采样时间
    pub timestamp: DateTime<Utc>,
    /// 指标
    pub metrics: StatsMetrics,
}

impl StatsSample {
    pub fn new<N: Into<String>>(connection_name: N, timestamp: DateTime<Utc>, metrics: StatsMetrics) -> Self {
        Self {
            connection_name: connection_name.into(),
            timestamp,
            metrics,
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    /// 服务器运行时长（秒）
    pub fn uptime_seconds(&self) -> Option<f64> {
        self.metric(metric::UPTIME_SECONDS)
    }
}

/// 查询时间范围，两端均为闭区间，缺省表示不限
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// 不限范围
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *ts >= s) && self.end.map_or(true, |e| *ts <= e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_time_range_contains() {
        let now = Utc::now();
        let range = TimeRange::between(now - Duration::seconds(10), now);
        assert!(range.contains(&now));
        assert!(range.contains(&(now - Duration::seconds(10))));
        assert!(!range.contains(&(now + Duration::seconds(1))));
        assert!(TimeRange::all().contains(&(now - Duration::days(365))));
        assert!(!TimeRange::since(now).contains(&(now - Duration::seconds(1))));
    }
}

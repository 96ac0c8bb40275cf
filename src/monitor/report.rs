//! 轮询周期报告

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// 单个连接在一个周期内的轮询结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    /// 样本已写入
    Recorded,
    /// 获取状态超时
    TimedOut,
    /// 获取状态失败
    FetchFailed { message: String },
    /// 样本写入存储失败
    StoreFailed { message: String },
    /// 没有可用句柄，本周期跳过
    Skipped,
    /// 轮询期间连接被移除，未写入样本
    Removed,
    /// 轮询任务异常退出
    Panicked { message: String },
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Recorded)
    }

    /// 是否属于失败（跳过和移除不算失败）
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PollOutcome::TimedOut
                | PollOutcome::FetchFailed { .. }
                | PollOutcome::StoreFailed { .. }
                | PollOutcome::Panicked { .. }
        )
    }
}

/// 单个连接的轮询记录
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionPoll {
    pub name: String,
    #[serde(flatten)]
    pub outcome: PollOutcome,
    /// 轮询耗时（毫秒）
    pub elapsed_ms: u64,
}

/// 一个轮询周期的汇总
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// 周期序号，从1开始
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    /// 周期总耗时（毫秒）
    pub elapsed_ms: u64,
    /// 按插入顺序排列的各连接结果
    pub polls: Vec<ConnectionPoll>,
    /// 本周期清理的过期样本数量
    pub pruned: usize,
}

impl CycleReport {
    pub(crate) fn new(cycle: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            started_at,
            elapsed_ms: 0,
            polls: Vec::new(),
            pruned: 0,
        }
    }

    pub(crate) fn push(&mut self, name: String, outcome: PollOutcome, elapsed: Duration) {
        self.polls.push(ConnectionPoll {
            name,
            outcome,
            elapsed_ms: elapsed.as_millis() as u64,
        });
    }

    /// 指定连接的结果
    pub fn outcome(&self, name: &str) -> Option<&PollOutcome> {
        self.polls.iter().find(|p| p.name == name).map(|p| &p.outcome)
    }

    pub fn recorded(&self) -> usize {
        self.polls.iter().filter(|p| p.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.polls.iter().filter(|p| p.outcome.is_failure()).count()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

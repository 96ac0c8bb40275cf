//! 服务器状态监控模块
//!
//! 周期性轮询连接池中的所有连接，把服务器状态样本写入统计存储

pub mod config;
pub mod report;
pub mod scheduler;

pub use config::MonitorConfig;
pub use report::{ConnectionPoll, CycleReport, PollOutcome};
pub use scheduler::{MonitoringScheduler, SchedulerHandle};

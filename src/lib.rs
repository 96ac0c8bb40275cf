//! rat_mongo_monitor - MongoDB管理控制台核心
//!
//! 管理多个命名的 MongoDB 连接，周期性采集各服务器的运行状态，
//! 并把采集到的样本保存为可按时间查询的历史数据
//!
//! 三个核心组件：
//! - [`ConnectionPool`]：命名连接的注册表，负责语法校验、后台建立连接和状态跟踪
//! - [`MonitoringScheduler`]：固定间隔并行轮询所有连接
//! - [`StatsStore`]：按连接名称和时间戳索引的样本存储

// 导出所有公共模块
pub mod error;
pub mod types;
pub mod adapter;
pub mod pool;
pub mod store;
pub mod monitor;
pub mod config;

// 重新导出常用类型
pub use error::{AdminError, AdminResult};
pub use types::*;
pub use adapter::{ClientHandle, DatabaseDriver, DriverConnection};
#[cfg(feature = "mongodb-support")]
pub use adapter::{MongoConnection, MongoDriver};
pub use pool::{ConnectionPool, LoadReport, PoolConfig};
pub use store::{FileStatsStore, MemoryStatsStore, StatsStore};
pub use monitor::{
    ConnectionPoll, CycleReport, MonitorConfig, MonitoringScheduler, PollOutcome,
    SchedulerHandle,
};
pub use config::{
    AppConfig, ConnectionEntry, ConnectionsFile, MonitorConfigBuilder, PoolConfigBuilder,
};

// 日志系统导入
use rat_logger::info;

// 条件编译调试宏 - 只有在 debug 模式下才输出调试信息
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        rat_logger::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        // 在 release 模式下不输出调试信息
    };
}

/// 初始化rat_mongo_monitor库
///
/// 注意：日志系统由调用者自行初始化，本库不会自动初始化日志
pub fn init() {
    info!("{} 初始化完成", get_info());
}

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 获取库信息
pub fn get_info() -> String {
    format!("{} v{}", NAME, VERSION)
}

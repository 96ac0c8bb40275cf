//! 核心数据类型
//!
//! 连接记录、连接字符串、统计样本等在连接池、监控调度器和统计存储之间共享的类型

pub mod connection;
pub mod connection_string;
pub mod mongo_builder;
pub mod stats;

// 重新导出所有公共类型
pub use connection::{ConnectionOptions, ConnectionRecord, ConnectionStatus, ErrorDetail};
pub use connection_string::{ConnectionString, HostAddress, Scheme};
pub use mongo_builder::{DEFAULT_MONGODB_PORT, MongoUriBuilder};
pub use stats::{StatsMetrics, StatsSample, TimeRange, metric};

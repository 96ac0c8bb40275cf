//! 连接池模块
//!
//! 管理命名连接的生命周期：语法校验、后台建立连接、状态跟踪与释放

pub mod config;
mod entry;
mod maintenance;
pub mod pool;

// 重新导出主要的公共类型和结构体
pub use config::PoolConfig;
pub(crate) use entry::PoolEntry;
pub use maintenance::LoadReport;
pub use pool::ConnectionPool;

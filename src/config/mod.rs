//! # 配置管理模块
//!
//! 提供统一的配置管理系统，支持构建器模式和链式配置
//! 严格遵循项目规范：构建器中的所有配置项必须显式设置

pub mod builders;
pub mod core;

pub use builders::{MonitorConfigBuilder, PoolConfigBuilder};
pub use core::{AppConfig, ConnectionEntry, ConnectionsFile, DEFAULT_HOST, DEFAULT_PORT};

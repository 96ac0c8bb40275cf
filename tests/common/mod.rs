//! 集成测试公共工具
//!
//! 脚本化的内存驱动：按连接字符串中的主机名决定连接和获取状态的行为

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rat_mongo_monitor::{
    AdminResult, ClientHandle, ConnectionOptions, ConnectionPool, ConnectionString,
    DatabaseDriver, DriverConnection, PoolConfig, StatsMetrics, admin_error, metric,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// 建立连接时的行为
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectBehavior {
    Succeed,
    Fail,
    /// 第一次失败，之后成功
    FailOnce,
    Hang,
    /// 延迟指定毫秒后成功
    Slow(u64),
}

/// 获取服务器状态时的行为
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatsBehavior {
    Succeed,
    Fail,
    Hang,
    Panic,
    /// 延迟指定毫秒后成功
    Slow(u64),
}

#[derive(Debug, Default)]
pub struct MockState {
    connect: Mutex<HashMap<String, ConnectBehavior>>,
    stats: Mutex<HashMap<String, StatsBehavior>>,
    connect_attempts: Mutex<HashMap<String, usize>>,
    stats_calls: Mutex<HashMap<String, usize>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

/// 脚本化驱动，可以克隆共享同一份状态
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    pub state: Arc<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connect(&self, host: &str, behavior: ConnectBehavior) {
        self.state.connect.lock().insert(host.to_string(), behavior);
    }

    pub fn set_stats(&self, host: &str, behavior: StatsBehavior) {
        self.state.stats.lock().insert(host.to_string(), behavior);
    }

    pub fn connect_attempts(&self, host: &str) -> usize {
        self.state
            .connect_attempts
            .lock()
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    pub fn stats_calls(&self, host: &str) -> usize {
        self.state.stats_calls.lock().get(host).copied().unwrap_or(0)
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(
        &self,
        uri: &ConnectionString,
        _options: &ConnectionOptions,
        _timeout: Duration,
    ) -> AdminResult<ClientHandle> {
        let host = uri.primary_host().host.clone();
        let attempt = {
            let mut attempts = self.state.connect_attempts.lock();
            let count = attempts.entry(host.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let behavior = self
            .state
            .connect
            .lock()
            .get(&host)
            .copied()
            .unwrap_or(ConnectBehavior::Succeed);

        match behavior {
            ConnectBehavior::Succeed => {}
            ConnectBehavior::Fail => return Err(admin_error!(connect, host, "connection refused")),
            ConnectBehavior::FailOnce if attempt == 1 => {
                return Err(admin_error!(connect, host, "connection reset"));
            }
            ConnectBehavior::FailOnce => {}
            ConnectBehavior::Hang => std::future::pending::<()>().await,
            ConnectBehavior::Slow(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        }

        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            host,
            state: self.state.clone(),
            closed: AtomicBool::new(false),
            uptime: AtomicUsize::new(0),
        }))
    }
}

#[derive(Debug)]
pub struct MockConnection {
    host: String,
    state: Arc<MockState>,
    closed: AtomicBool,
    uptime: AtomicUsize,
}

#[async_trait]
impl DriverConnection for MockConnection {
    async fn ping(&self, _timeout: Duration) -> AdminResult<bool> {
        Ok(!self.closed.load(Ordering::SeqCst))
    }

    async fn fetch_server_stats(&self, _timeout: Duration) -> AdminResult<StatsMetrics> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(admin_error!(stats, self.host, "client closed"));
        }
        *self
            .state
            .stats_calls
            .lock()
            .entry(self.host.clone())
            .or_insert(0) += 1;
        let behavior = self
            .state
            .stats
            .lock()
            .get(&self.host)
            .copied()
            .unwrap_or(StatsBehavior::Succeed);

        match behavior {
            StatsBehavior::Succeed => {}
            StatsBehavior::Fail => return Err(admin_error!(stats, self.host, "not authorized")),
            StatsBehavior::Hang => std::future::pending::<()>().await,
            StatsBehavior::Panic => panic!("scripted panic for {}", self.host),
            StatsBehavior::Slow(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        }

        let uptime = self.uptime.fetch_add(30, Ordering::SeqCst) + 30;
        let mut metrics = StatsMetrics::new();
        metrics.insert(metric::UPTIME_SECONDS.to_string(), uptime as f64);
        metrics.insert(metric::CONNECTIONS_CURRENT.to_string(), 3.0);
        Ok(metrics)
    }

    async fn list_databases(&self, _timeout: Duration) -> AdminResult<Vec<String>> {
        Ok(vec!["admin".to_string(), "local".to_string()])
    }

    async fn list_collections(&self, database: &str, _timeout: Duration) -> AdminResult<Vec<String>> {
        match database {
            "admin" => Ok(vec!["system.version".to_string()]),
            _ => Ok(Vec::new()),
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// 测试用连接池配置：短超时，一次立即重试
pub fn test_pool_config() -> PoolConfig {
    PoolConfig {
        connect_timeout_ms: 200,
        operation_timeout_ms: 200,
        connect_retries: 1,
    }
}

pub fn new_pool(driver: &MockDriver) -> Arc<ConnectionPool> {
    Arc::new(ConnectionPool::new(Arc::new(driver.clone()), test_pool_config()))
}

pub fn uri(host: &str) -> String {
    format!("mongodb://{}:27017", host)
}

/// 轮询直到条件满足或超时
pub async fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

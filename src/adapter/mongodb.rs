//! MongoDB 驱动适配器
//!
//! 基于官方 mongodb 驱动实现连接、ping、serverStatus 采样以及数据库/集合浏览

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{ClientOptions, Tls, TlsOptions};
use mongodb::Client;
use parking_lot::RwLock;
use rat_logger::{debug, info};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{ClientHandle, DatabaseDriver, DriverConnection};
use crate::error::{AdminError, AdminResult};
use crate::types::{ConnectionOptions, ConnectionString, StatsMetrics, metric};

/// MongoDB 驱动
#[derive(Debug, Default, Clone)]
pub struct MongoDriver;

impl MongoDriver {
    pub fn new() -> Self {
        Self
    }

    /// 把连接选项应用到驱动的客户端配置上
    fn apply_options(client_options: &mut ClientOptions, options: &ConnectionOptions, timeout: Duration) {
        client_options.connect_timeout = Some(
            options
                .get_duration_ms("connectTimeoutMS")
                .map_or(timeout, |t| t.min(timeout)),
        );
        client_options.server_selection_timeout = Some(
            options
                .get_duration_ms("serverSelectionTimeoutMS")
                .map_or(timeout, |t| t.min(timeout)),
        );

        let tls = options.get_bool("tls").or_else(|| options.get_bool("ssl"));
        match tls {
            Some(true) => client_options.tls = Some(Tls::Enabled(TlsOptions::default())),
            Some(false) => client_options.tls = Some(Tls::Disabled),
            None => {}
        }

        if let Some(direct) = options.get_bool("directConnection") {
            client_options.direct_connection = Some(direct);
        }

        match options.get_str("appName") {
            Some(app_name) => client_options.app_name = Some(app_name.to_string()),
            None if client_options.app_name.is_none() => {
                client_options.app_name = Some(crate::NAME.to_string())
            }
            None => {}
        }
    }
}

#[async_trait]
impl DatabaseDriver for MongoDriver {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn connect(
        &self,
        uri: &ConnectionString,
        options: &ConnectionOptions,
        timeout: Duration,
    ) -> AdminResult<ClientHandle> {
        let label = uri.primary_host().to_string();
        debug!("MongoDB连接: {}", uri.redacted());

        let mut client_options = with_timeout(&label, timeout, ClientOptions::parse(uri.as_str()))
            .await?
            .map_err(|e| connect_error(&label, e))?;
        Self::apply_options(&mut client_options, options, timeout);

        let client = Client::with_options(client_options).map_err(|e| connect_error(&label, e))?;

        // 驱动是惰性连接的，用一次 ping 确认服务器可达
        with_timeout(
            &label,
            timeout,
            client.database("admin").run_command(doc! { "ping": 1 }, None),
        )
        .await?
        .map_err(|e| connect_error(&label, e))?;

        info!("MongoDB连接成功: {}", uri.redacted());

        Ok(Arc::new(MongoConnection {
            label,
            client: RwLock::new(Some(client)),
        }))
    }
}

/// 已建立的 MongoDB 连接
#[derive(Debug)]
pub struct MongoConnection {
    label: String,
    client: RwLock<Option<Client>>,
}

impl MongoConnection {
    /// 取出客户端的克隆，连接已关闭时返回错误
    fn client(&self) -> AdminResult<Client> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| crate::admin_error!(stats, self.label, "连接已释放"))
    }
}

#[async_trait]
impl DriverConnection for MongoConnection {
    async fn ping(&self, timeout: Duration) -> AdminResult<bool> {
        let client = self.client()?;
        let result = with_timeout(
            &self.label,
            timeout,
            client.database("admin").run_command(doc! { "ping": 1 }, None),
        )
        .await?;
        Ok(result.is_ok())
    }

    async fn fetch_server_stats(&self, timeout: Duration) -> AdminResult<StatsMetrics> {
        let client = self.client()?;
        let status = with_timeout(
            &self.label,
            timeout,
            client.database("admin").run_command(doc! { "serverStatus": 1 }, None),
        )
        .await?
        .map_err(|e| crate::admin_error!(stats, self.label, e))?;

        let metrics = server_status_metrics(&status);
        if metrics.is_empty() {
            return Err(crate::admin_error!(
                stats,
                self.label,
                "serverStatus 返回结果中没有可用指标"
            ));
        }
        Ok(metrics)
    }

    async fn list_databases(&self, timeout: Duration) -> AdminResult<Vec<String>> {
        let client = self.client()?;
        let mut names = with_timeout(&self.label, timeout, client.list_database_names(None, None))
            .await?
            .map_err(|e| crate::admin_error!(stats, self.label, e))?;
        names.sort();
        Ok(names)
    }

    async fn list_collections(&self, database: &str, timeout: Duration) -> AdminResult<Vec<String>> {
        let client = self.client()?;
        let mut names = with_timeout(
            &self.label,
            timeout,
            client.database(database).list_collection_names(None),
        )
        .await?
        .map_err(|e| crate::admin_error!(stats, self.label, e))?;
        names.sort();
        Ok(names)
    }

    async fn close(&self) {
        // 丢弃客户端即释放底层连接池
        if self.client.write().take().is_some() {
            debug!("MongoDB连接已释放: {}", self.label);
        }
    }
}

async fn with_timeout<F: Future>(label: &str, timeout: Duration, fut: F) -> AdminResult<F::Output> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| crate::admin_error!(timeout, label, timeout))
}

fn connect_error(label: &str, e: mongodb::error::Error) -> AdminError {
    crate::admin_error!(connect, label, e)
}

/// 按路径读取数值字段
fn number_at(doc: &Document, path: &[&str]) -> Option<f64> {
    let (last, parents) = path.split_last()?;
    let mut current = doc;
    for key in parents {
        current = current.get_document(key).ok()?;
    }
    match current.get(last)? {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// 从 serverStatus 结果中提取标准指标
fn server_status_metrics(status: &Document) -> StatsMetrics {
    const PATHS: &[(&str, &[&str])] = &[
        (metric::UPTIME_SECONDS, &["uptime"]),
        (metric::CONNECTIONS_CURRENT, &["connections", "current"]),
        (metric::CONNECTIONS_AVAILABLE, &["connections", "available"]),
        (metric::MEMORY_RESIDENT_MB, &["mem", "resident"]),
        (metric::MEMORY_VIRTUAL_MB, &["mem", "virtual"]),
        (metric::NETWORK_BYTES_IN, &["network", "bytesIn"]),
        (metric::NETWORK_BYTES_OUT, &["network", "bytesOut"]),
        (metric::NETWORK_REQUESTS, &["network", "numRequests"]),
        (metric::OPCOUNTERS_INSERT, &["opcounters", "insert"]),
        (metric::OPCOUNTERS_QUERY, &["opcounters", "query"]),
        (metric::OPCOUNTERS_UPDATE, &["opcounters", "update"]),
        (metric::OPCOUNTERS_DELETE, &["opcounters", "delete"]),
        (metric::OPCOUNTERS_GETMORE, &["opcounters", "getmore"]),
        (metric::OPCOUNTERS_COMMAND, &["opcounters", "command"]),
    ];

    PATHS
        .iter()
        .filter_map(|(name, path)| number_at(status, path).map(|v| (name.to_string(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_status_metrics() {
        let status = doc! {
            "uptime": 3600.0,
            "connections": { "current": 12_i32, "available": 800_i32 },
            "mem": { "resident": 256_i32, "virtual": 1024_i64 },
            "opcounters": { "insert": 5_i64, "query": 42_i64 },
            "host": "db.local",
        };
        let metrics = server_status_metrics(&status);
        assert_eq!(metrics.get(metric::UPTIME_SECONDS), Some(&3600.0));
        assert_eq!(metrics.get(metric::CONNECTIONS_CURRENT), Some(&12.0));
        assert_eq!(metrics.get(metric::MEMORY_VIRTUAL_MB), Some(&1024.0));
        assert_eq!(metrics.get(metric::OPCOUNTERS_QUERY), Some(&42.0));
        assert!(metrics.get(metric::NETWORK_BYTES_IN).is_none());
    }

    #[test]
    fn test_apply_options() {
        let mut client_options = ClientOptions::default();
        let options = ConnectionOptions::new()
            .with("connectTimeoutMS", 2000)
            .with("tls", "true")
            .with("directConnection", true);
        MongoDriver::apply_options(&mut client_options, &options, Duration::from_secs(5));
        assert_eq!(client_options.connect_timeout, Some(Duration::from_secs(2)));
        assert_eq!(client_options.server_selection_timeout, Some(Duration::from_secs(5)));
        assert!(matches!(client_options.tls, Some(Tls::Enabled(_))));
        assert_eq!(client_options.direct_connection, Some(true));
    }
}

//! 维护与浏览相关方法

use futures::future::join_all;
use rat_logger::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;

use super::ConnectionPool;
use super::entry::ReconnectDecision;
use super::pool::connect_entry;
use crate::config::ConnectionsFile;
use crate::error::AdminResult;
use crate::types::ConnectionRecord;

/// 从配置文件加载连接的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// 成功加入连接池的连接名称
    pub loaded: Vec<String>,
    /// 被跳过的连接 (名称, 原因)
    pub skipped: Vec<(String, String)>,
}

impl ConnectionPool {
    /// 重新连接一个失败或已断开的连接
    ///
    /// 连接正在建立或已连接时不做任何事
    pub async fn reconnect(&self, name: &str) -> AdminResult<()> {
        let entry = self.entry(name)?;
        match entry.begin_reconnect() {
            ReconnectDecision::Proceed(old) => {
                if let Some(old) = old {
                    old.close().await;
                }
                info!("重新连接: {}", name);
                tokio::spawn(connect_entry(self.driver.clone(), self.config.clone(), entry));
                Ok(())
            }
            ReconnectDecision::AlreadyActive => {
                debug!("连接 {} 正在连接或已连接，忽略重连请求", name);
                Ok(())
            }
            ReconnectDecision::Released => Err(crate::admin_error!(not_found, name)),
        }
    }

    /// 列出连接上的所有数据库
    pub async fn list_databases(&self, name: &str) -> AdminResult<Vec<String>> {
        let client = self.entry(name)?.require_client()?;
        let timeout = self.config.operation_timeout();
        tokio::time::timeout(timeout, client.list_databases(timeout))
            .await
            .map_err(|_| crate::admin_error!(timeout, name, timeout))?
    }

    /// 列出连接上指定数据库的所有集合
    pub async fn list_collections(&self, name: &str, database: &str) -> AdminResult<Vec<String>> {
        let client = self.entry(name)?.require_client()?;
        let timeout = self.config.operation_timeout();
        tokio::time::timeout(timeout, client.list_collections(database, timeout))
            .await
            .map_err(|_| crate::admin_error!(timeout, name, timeout))?
    }

    /// 并行ping所有持有句柄的连接
    ///
    /// 没有句柄的连接视为不健康
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let timeout = self.config.operation_timeout();
        let checks = self.entries_snapshot().into_iter().map(|entry| async move {
            let healthy = match entry.client() {
                Some(client) => matches!(
                    tokio::time::timeout(timeout, client.ping(timeout)).await,
                    Ok(Ok(true))
                ),
                None => false,
            };
            (entry.name.clone(), healthy)
        });
        join_all(checks).await.into_iter().collect()
    }

    /// 所有连接的状态信息（JSON），连接字符串中的密码已隐藏
    pub fn status_report(&self) -> serde_json::Value {
        use serde_json::json;

        let connections: Vec<serde_json::Value> = self
            .entries_snapshot()
            .iter()
            .map(|entry| {
                let record = entry.snapshot();
                json!({
                    "name": record.name,
                    "address": entry.uri.redacted(),
                    "status": record.status.as_str(),
                    "has_client": record.has_client,
                    "added_at": record.added_at,
                    "connected_at": record.connected_at,
                    "last_error": record.last_error,
                    "last_stats": record.last_stats,
                })
            })
            .collect();

        json!({
            "driver": self.driver.name(),
            "count": connections.len(),
            "config": {
                "connect_timeout_ms": self.config.connect_timeout_ms,
                "operation_timeout_ms": self.config.operation_timeout_ms,
                "connect_retries": self.config.connect_retries,
            },
            "connections": connections,
        })
    }

    /// 从连接配置文件加载连接
    ///
    /// 非法或重复的条目会被跳过并记录在返回结果中
    pub async fn load_connections(&self, file: &ConnectionsFile) -> LoadReport {
        let mut report = LoadReport::default();

        for (name, conn) in &file.connections {
            match self
                .add(name, &conn.connection_string, conn.connection_options.clone())
                .await
            {
                Ok(()) => report.loaded.push(name.clone()),
                Err(e) => {
                    warn!("跳过连接配置 {}: {}", name, e);
                    report.skipped.push((name.clone(), e.to_string()));
                }
            }
        }

        info!(
            "连接配置加载完成: 成功={}, 跳过={}",
            report.loaded.len(),
            report.skipped.len()
        );
        report
    }

    /// 关闭连接池，释放所有句柄
    pub async fn shutdown(&self) -> Vec<ConnectionRecord> {
        info!("开始关闭连接池");

        let mut closed = Vec::new();
        for name in self.names() {
            if let Some((_, entry)) = self.entries.remove(&name) {
                if let Some(handle) = entry.release().await {
                    handle.close().await;
                }
                closed.push(entry.snapshot());
            }
        }

        info!("连接池已关闭，共释放 {} 个连接", closed.len());
        closed
    }
}

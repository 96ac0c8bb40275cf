//! 连接池核心模块

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rat_logger::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::PoolConfig;
use super::entry::PoolEntry;
use crate::adapter::DatabaseDriver;
use crate::error::{AdminError, AdminResult};
use crate::types::{ConnectionOptions, ConnectionRecord, ConnectionString};

/// 连接池 - 管理多个命名的数据库连接
///
/// 连接池本身通过 `Arc` 在展示层和监控调度器之间共享，
/// 内部的映射表是结构性修改（添加/移除）唯一的互斥点
pub struct ConnectionPool {
    /// 连接映射 (名称 -> 条目)
    pub(crate) entries: DashMap<String, Arc<PoolEntry>>,
    /// 数据库驱动
    pub(crate) driver: Arc<dyn DatabaseDriver>,
    /// 连接池配置
    pub(crate) config: PoolConfig,
    /// 插入序号生成器
    next_seq: AtomicU64,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connections", &self.entries.len())
            .field("driver", &self.driver.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ConnectionPool {
    /// 创建连接池
    pub fn new(driver: Arc<dyn DatabaseDriver>, config: PoolConfig) -> Self {
        info!("创建连接池: 驱动={}", driver.name());

        Self {
            entries: DashMap::new(),
            driver,
            config,
            next_seq: AtomicU64::new(0),
        }
    }

    /// 连接池配置
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 添加连接
    ///
    /// 连接字符串通过语法校验后立即加入连接池（状态为 `Connecting`），
    /// 实际的网络连接在后台任务中完成；连接失败时记录保留在池中，状态为 `Failed`
    pub async fn add(
        &self,
        name: &str,
        connection_string: &str,
        options: ConnectionOptions,
    ) -> AdminResult<()> {
        let entry = self.insert_entry(name, connection_string, options)?;
        tokio::spawn(connect_entry(
            self.driver.clone(),
            self.config.clone(),
            entry,
        ));
        Ok(())
    }

    /// 添加连接并等待连接尝试结束
    ///
    /// 连接失败不会返回错误，返回的快照状态为 `Failed`
    pub async fn add_and_wait(
        &self,
        name: &str,
        connection_string: &str,
        options: ConnectionOptions,
    ) -> AdminResult<ConnectionRecord> {
        let entry = self.insert_entry(name, connection_string, options)?;
        let _ = connect_entry(self.driver.clone(), self.config.clone(), entry.clone()).await;
        Ok(entry.snapshot())
    }

    /// 校验并插入新条目
    fn insert_entry(
        &self,
        name: &str,
        connection_string: &str,
        options: ConnectionOptions,
    ) -> AdminResult<Arc<PoolEntry>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(crate::admin_error!(config, "连接名称不能为空"));
        }

        // 名称重复优先于连接字符串校验
        if self.entries.contains_key(name) {
            warn!("连接名称已存在: {}", name);
            return Err(crate::admin_error!(duplicate_name, name));
        }

        let uri = ConnectionString::parse(connection_string).map_err(|e| {
            warn!("连接 {} 的连接字符串非法: {}", name, e);
            e
        })?;

        match self.entries.entry(name.to_string()) {
            Entry::Occupied(_) => {
                warn!("连接名称已存在: {}", name);
                Err(crate::admin_error!(duplicate_name, name))
            }
            Entry::Vacant(vacant) => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                info!("添加连接: 名称={}, 地址={}", name, uri.redacted());
                let entry = Arc::new(PoolEntry::new(seq, name.to_string(), uri, options));
                vacant.insert(entry.clone());
                Ok(entry)
            }
        }
    }

    /// 移除连接
    ///
    /// 返回之前释放客户端句柄，并保证之后不会再为该条目写入统计样本
    pub async fn remove(&self, name: &str) -> AdminResult<()> {
        let (_, entry) = self
            .entries
            .remove(name)
            .ok_or_else(|| crate::admin_error!(not_found, name))?;

        if let Some(handle) = entry.release().await {
            handle.close().await;
        }

        info!("连接已移除: {}", name);
        Ok(())
    }

    /// 获取连接记录快照
    pub fn get(&self, name: &str) -> Option<ConnectionRecord> {
        self.entries.get(name).map(|entry| entry.snapshot())
    }

    /// 按插入顺序列出所有连接记录快照
    pub fn list(&self) -> Vec<ConnectionRecord> {
        self.entries_snapshot()
            .iter()
            .map(|entry| entry.snapshot())
            .collect()
    }

    /// 所有连接名称（按插入顺序）
    pub fn names(&self) -> Vec<String> {
        self.entries_snapshot()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按插入顺序获取条目快照，供监控调度器使用
    pub(crate) fn entries_snapshot(&self) -> Vec<Arc<PoolEntry>> {
        let mut entries: Vec<Arc<PoolEntry>> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }

    pub(crate) fn entry(&self, name: &str) -> AdminResult<Arc<PoolEntry>> {
        self.entries
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| crate::admin_error!(not_found, name))
    }
}

/// 为条目建立连接
///
/// 每次尝试都带有超时；失败后按配置立即重试，不做退避
pub(crate) async fn connect_entry(
    driver: Arc<dyn DatabaseDriver>,
    config: PoolConfig,
    entry: Arc<PoolEntry>,
) -> AdminResult<()> {
    let connect_timeout = config.connect_timeout();
    let op_timeout = config.operation_timeout();
    let attempts = config.connect_retries + 1;
    let mut last_error: Option<AdminError> = None;

    for attempt in 1..=attempts {
        if entry.is_released() {
            debug!("连接 {} 已移除，放弃连接", entry.name);
            return Ok(());
        }
        crate::debug_log!("连接 {} 开始第{}次尝试: {}", entry.name, attempt, entry.uri.redacted());

        let result = match tokio::time::timeout(
            connect_timeout,
            driver.connect(&entry.uri, &entry.options, connect_timeout),
        )
        .await
        {
            Ok(Ok(handle)) => {
                match tokio::time::timeout(op_timeout, handle.ping(op_timeout)).await {
                    Ok(Ok(true)) => Ok(handle),
                    Ok(Ok(false)) => {
                        handle.close().await;
                        Err(crate::admin_error!(connect, entry.name, "服务器未响应ping"))
                    }
                    Ok(Err(e)) => {
                        handle.close().await;
                        Err(e)
                    }
                    Err(_) => {
                        handle.close().await;
                        Err(crate::admin_error!(timeout, entry.name, op_timeout))
                    }
                }
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(crate::admin_error!(timeout, entry.name, connect_timeout)),
        };

        match result {
            Ok(handle) => {
                if entry.commit_connection(handle).await {
                    info!("连接 {} 建立成功", entry.name);
                } else {
                    debug!("连接 {} 在建立过程中被移除，句柄已关闭", entry.name);
                }
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "连接 {} 第{}/{}次尝试失败: {}",
                    entry.name, attempt, attempts, e
                );
                last_error = Some(e);
            }
        }
    }

    let error = match last_error {
        Some(AdminError::ConnectFailed { message, .. }) => AdminError::ConnectFailed {
            name: entry.name.clone(),
            message,
        },
        Some(other) => AdminError::ConnectFailed {
            name: entry.name.clone(),
            message: other.to_string(),
        },
        None => crate::admin_error!(connect, entry.name, "没有进行任何连接尝试"),
    };
    entry.fail_connection(&error).await;
    Err(error)
}

//! 连接池条目
//!
//! 每个条目持有一个连接的身份信息和运行时状态。状态字段使用条目自身的锁，
//! 互不相关的连接之间不会互相阻塞

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::adapter::ClientHandle;
use crate::error::{AdminError, AdminResult};
use crate::store::StatsStore;
use crate::types::{
    ConnectionOptions, ConnectionRecord, ConnectionStatus, ConnectionString, ErrorDetail,
    StatsSample,
};

/// 条目的可变状态
#[derive(Debug)]
struct EntryState {
    status: ConnectionStatus,
    last_error: Option<ErrorDetail>,
    handle: Option<ClientHandle>,
    connected_at: Option<DateTime<Utc>>,
}

/// 重连请求的判定结果
pub(crate) enum ReconnectDecision {
    /// 可以重连，附带需要关闭的旧句柄
    Proceed(Option<ClientHandle>),
    /// 正在连接或已连接，无需重连
    AlreadyActive,
    /// 条目已被移除
    Released,
}

/// 连接池中的一个连接
#[derive(Debug)]
pub(crate) struct PoolEntry {
    /// 插入序号，用于按插入顺序列出
    pub(crate) seq: u64,
    pub(crate) name: String,
    pub(crate) uri: ConnectionString,
    pub(crate) options: ConnectionOptions,
    pub(crate) added_at: DateTime<Utc>,
    state: RwLock<EntryState>,
    last_stats: ArcSwapOption<StatsSample>,
    /// 生命周期闩锁：写入样本持有读锁，释放条目持有写锁
    lifecycle: tokio::sync::RwLock<()>,
    released: AtomicBool,
}

impl PoolEntry {
    pub(crate) fn new(seq: u64, name: String, uri: ConnectionString, options: ConnectionOptions) -> Self {
        Self {
            seq,
            name,
            uri,
            options,
            added_at: Utc::now(),
            state: RwLock::new(EntryState {
                status: ConnectionStatus::Connecting,
                last_error: None,
                handle: None,
                connected_at: None,
            }),
            last_stats: ArcSwapOption::empty(),
            lifecycle: tokio::sync::RwLock::new(()),
            released: AtomicBool::new(false),
        }
    }

    /// 生成只读快照
    pub(crate) fn snapshot(&self) -> ConnectionRecord {
        let state = self.state.read();
        ConnectionRecord {
            name: self.name.clone(),
            connection_string: self.uri.as_str().to_string(),
            options: self.options.clone(),
            status: state.status,
            last_error: state.last_error.clone(),
            last_stats: self.last_stats.load_full().map(|s| (*s).clone()),
            added_at: self.added_at,
            connected_at: state.connected_at,
            has_client: state.handle.is_some(),
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// 当前的客户端句柄
    pub(crate) fn client(&self) -> Option<ClientHandle> {
        self.state.read().handle.clone()
    }

    /// 客户端句柄，不存在时返回 `NotConnected`
    pub(crate) fn require_client(&self) -> AdminResult<ClientHandle> {
        self.client()
            .ok_or_else(|| crate::admin_error!(not_connected, self.name))
    }

    /// 判断是否可以发起重连，可以时状态切换为 `Connecting`
    pub(crate) fn begin_reconnect(&self) -> ReconnectDecision {
        if self.is_released() {
            return ReconnectDecision::Released;
        }
        let mut state = self.state.write();
        match state.status {
            ConnectionStatus::Connecting | ConnectionStatus::Connected => {
                ReconnectDecision::AlreadyActive
            }
            ConnectionStatus::Failed | ConnectionStatus::Disconnected => {
                state.status = ConnectionStatus::Connecting;
                state.connected_at = None;
                ReconnectDecision::Proceed(state.handle.take())
            }
        }
    }

    /// 安装新建立的句柄
    ///
    /// 条目已被移除时关闭句柄并返回 `false`
    pub(crate) async fn commit_connection(&self, handle: ClientHandle) -> bool {
        let (installed, stale) = {
            let _guard = self.lifecycle.read().await;
            if self.is_released() {
                (false, Some(handle))
            } else {
                let mut state = self.state.write();
                state.status = ConnectionStatus::Connected;
                state.last_error = None;
                state.connected_at = Some(Utc::now());
                (true, state.handle.replace(handle))
            }
        };
        if let Some(stale) = stale {
            stale.close().await;
        }
        installed
    }

    /// 记录连接失败
    pub(crate) async fn fail_connection(&self, error: &AdminError) {
        let _guard = self.lifecycle.read().await;
        if self.is_released() {
            return;
        }
        let mut state = self.state.write();
        state.status = ConnectionStatus::Failed;
        state.last_error = Some(ErrorDetail::from(error));
    }

    /// 写入一次轮询得到的样本
    ///
    /// 条目已被移除时返回 `None`，不写入任何数据
    pub(crate) async fn commit_sample(
        &self,
        sample: StatsSample,
        store: &dyn StatsStore,
    ) -> Option<AdminResult<()>> {
        let _guard = self.lifecycle.read().await;
        if self.is_released() {
            return None;
        }

        if let Err(e) = store.record(&sample).await {
            self.state.write().last_error = Some(ErrorDetail::from(&e));
            return Some(Err(e));
        }

        self.last_stats.store(Some(Arc::new(sample)));
        let mut state = self.state.write();
        if state.handle.is_some() {
            state.status = ConnectionStatus::Connected;
        }
        state.last_error = None;
        Some(Ok(()))
    }

    /// 记录一次轮询失败，句柄保留，连接仍在池中
    pub(crate) async fn record_poll_failure(&self, error: &AdminError) {
        let _guard = self.lifecycle.read().await;
        if self.is_released() {
            return;
        }
        let mut state = self.state.write();
        if state.status == ConnectionStatus::Connected {
            state.status = ConnectionStatus::Failed;
        }
        state.last_error = Some(ErrorDetail::from(error));
    }

    /// 释放条目，返回需要关闭的句柄
    ///
    /// 等待正在写入的样本完成；返回之后不会再有样本写入
    pub(crate) async fn release(&self) -> Option<ClientHandle> {
        let _guard = self.lifecycle.write().await;
        self.released.store(true, Ordering::Release);
        let mut state = self.state.write();
        state.status = ConnectionStatus::Disconnected;
        state.handle.take()
    }
}

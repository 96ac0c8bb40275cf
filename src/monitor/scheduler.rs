//! 监控调度器
//!
//! 固定间隔轮询连接池中的每个连接，获取服务器状态并写入统计存储。
//! 每个周期先对连接池做快照，再为每个连接派生独立任务并行轮询，
//! 单个连接的失败、超时或异常不会影响其他连接

use arc_swap::ArcSwapOption;
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use rat_logger::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::config::MonitorConfig;
use super::report::{CycleReport, PollOutcome};
use crate::adapter::ClientHandle;
use crate::error::{AdminError, AdminResult};
use crate::pool::{ConnectionPool, PoolEntry};
use crate::store::StatsStore;
use crate::types::StatsSample;

/// 调度器句柄，用于停止调度循环
///
/// 可以自由克隆，所有克隆共享同一个停止信号
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    id: Uuid,
    shutdown: Arc<watch::Sender<bool>>,
    stopped: Arc<AtomicBool>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SchedulerHandle {
    fn new(shutdown: watch::Sender<bool>, task: Option<JoinHandle<()>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            shutdown: Arc::new(shutdown),
            stopped: Arc::new(AtomicBool::new(task.is_none())),
            task: Arc::new(Mutex::new(task)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 停止调度
    ///
    /// 之后的周期立即取消，正在进行的周期允许完成。
    /// 只有第一次调用返回 `true`，重复调用无副作用
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.shutdown.send_replace(true);
        info!("监控调度器已停止: {}", self.id);
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// 等待调度循环退出（需要先调用 `stop`）
    pub async fn join(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("监控调度循环异常退出: {}", e);
            }
        }
    }
}

/// 调度器共享状态
struct SchedulerInner {
    pool: Arc<ConnectionPool>,
    store: Arc<dyn StatsStore>,
    config: MonitorConfig,
    cycles: AtomicU64,
    last_report: ArcSwapOption<CycleReport>,
}

/// 监控调度器
pub struct MonitoringScheduler {
    inner: Arc<SchedulerInner>,
    running: Mutex<Option<SchedulerHandle>>,
}

impl std::fmt::Debug for MonitoringScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringScheduler")
            .field("config", &self.inner.config)
            .field("cycles", &self.inner.cycles.load(Ordering::Relaxed))
            .field("running", &self.is_running())
            .finish()
    }
}

impl MonitoringScheduler {
    /// 创建调度器，获取状态的超时必须小于轮询间隔
    pub fn new(
        pool: Arc<ConnectionPool>,
        store: Arc<dyn StatsStore>,
        config: MonitorConfig,
    ) -> AdminResult<Self> {
        if config.interval_sec == 0 {
            return Err(crate::admin_error!(config, "轮询间隔不能为零"));
        }
        if config.fetch_timeout_ms == 0 || config.fetch_timeout() >= config.interval() {
            return Err(crate::admin_error!(
                config,
                "获取状态超时必须大于零且小于轮询间隔"
            ));
        }

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                pool,
                store,
                config,
                cycles: AtomicU64::new(0),
                last_report: ArcSwapOption::empty(),
            }),
            running: Mutex::new(None),
        })
    }

    /// 启动调度循环
    ///
    /// 第一个周期立即执行。重复调用返回正在运行的句柄，不会创建新的定时器；
    /// 监控被禁用时返回一个已停止的句柄
    pub fn start(&self) -> SchedulerHandle {
        let mut running = self.running.lock();
        if let Some(handle) = running.as_ref() {
            if !handle.is_stopped() {
                debug!("监控调度器已在运行: {}", handle.id());
                return handle.clone();
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        if !self.inner.config.enabled {
            info!("监控已禁用，不启动调度器");
            return SchedulerHandle::new(shutdown_tx, None);
        }

        let task = tokio::spawn(run_loop(self.inner.clone(), shutdown_rx));
        let handle = SchedulerHandle::new(shutdown_tx, Some(task));
        info!(
            "启动监控调度器: {}, 间隔={}s, 超时={}ms",
            handle.id(),
            self.inner.config.interval_sec,
            self.inner.config.fetch_timeout_ms
        );
        *running = Some(handle.clone());
        handle
    }

    /// 停止调度，等价于 `handle.stop()`
    pub fn stop(&self, handle: &SchedulerHandle) -> bool {
        handle.stop()
    }

    /// 停止当前正在运行的调度循环
    pub fn shutdown(&self) -> bool {
        match self.running.lock().as_ref() {
            Some(handle) => handle.stop(),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_stopped())
    }

    /// 立即执行一个轮询周期
    pub async fn run_cycle(&self) -> Arc<CycleReport> {
        self.inner.run_cycle().await
    }

    /// 最近一个周期的报告
    pub fn last_report(&self) -> Option<Arc<CycleReport>> {
        self.inner.last_report.load_full()
    }

    /// 已完成的周期数量
    pub fn cycles(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.inner.pool
    }

    pub fn store(&self) -> &Arc<dyn StatsStore> {
        &self.inner.store
    }
}

async fn run_loop(inner: Arc<SchedulerInner>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(inner.config.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                if *shutdown.borrow() {
                    break;
                }
                inner.run_cycle().await;
            }
        }
    }

    debug!("监控调度循环退出");
}

impl SchedulerInner {
    async fn run_cycle(&self) -> Arc<CycleReport> {
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        let mut report = CycleReport::new(cycle, Utc::now());
        let timeout = self.config.fetch_timeout();

        // 快照时捕获每个连接的句柄，本轮轮询不再重新查找
        let polls = self.pool.entries_snapshot().into_iter().map(|entry| {
            let task = entry.client().map(|client| {
                tokio::spawn(poll_connection(
                    entry.clone(),
                    client,
                    self.store.clone(),
                    timeout,
                ))
            });
            async move {
                match task {
                    None => (entry.name.clone(), PollOutcome::Skipped, Duration::ZERO),
                    Some(task) => match task.await {
                        Ok((outcome, elapsed)) => (entry.name.clone(), outcome, elapsed),
                        Err(e) => {
                            let message = e.to_string();
                            error!("连接 {} 的轮询任务异常退出: {}", entry.name, message);
                            let failure = crate::admin_error!(stats, entry.name, message);
                            entry.record_poll_failure(&failure).await;
                            (
                                entry.name.clone(),
                                PollOutcome::Panicked { message },
                                started.elapsed(),
                            )
                        }
                    },
                }
            }
        });

        for (name, outcome, elapsed) in join_all(polls).await {
            report.push(name, outcome, elapsed);
        }

        report.pruned = self.prune_expired().await;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            "监控周期 {} 完成: 成功={}, 失败={}, 耗时={}ms",
            cycle,
            report.recorded(),
            report.failed(),
            report.elapsed_ms
        );

        let report = Arc::new(report);
        self.last_report.store(Some(report.clone()));
        report
    }

    /// 清理超出保留时长的样本
    ///
    /// 最早的样本超出保留时长加余量后才清理
    async fn prune_expired(&self) -> usize {
        let Some(retention) = self.config.retention() else {
            return 0;
        };
        let (retention, slack) = match (
            chrono::Duration::from_std(retention),
            chrono::Duration::from_std(self.config.prune_slack()),
        ) {
            (Ok(retention), Ok(slack)) => (retention, slack),
            (Err(e), _) | (_, Err(e)) => {
                warn!("样本保留时长超出范围: {}", e);
                return 0;
            }
        };

        let cutoff = Utc::now() - retention;
        match self.store.oldest().await {
            Some(oldest) if oldest < cutoff - slack => {}
            _ => return 0,
        }

        match self.store.prune_before(cutoff).await {
            Ok(pruned) => {
                debug!("清理了 {} 个过期统计样本", pruned);
                pruned
            }
            Err(e) => {
                error!("清理过期统计样本失败: {}", e);
                0
            }
        }
    }
}

/// 轮询单个连接
///
/// 使用快照时捕获的句柄；连接在轮询期间被移除时不写入样本
async fn poll_connection(
    entry: Arc<PoolEntry>,
    client: ClientHandle,
    store: Arc<dyn StatsStore>,
    timeout: Duration,
) -> (PollOutcome, Duration) {
    let started = Instant::now();

    let fetched = tokio::time::timeout(timeout, client.fetch_server_stats(timeout)).await;
    let outcome = match fetched {
        Ok(Ok(metrics)) => {
            let sample = StatsSample::new(entry.name.clone(), Utc::now(), metrics);
            match entry.commit_sample(sample, store.as_ref()).await {
                None => {
                    debug!("连接 {} 在轮询期间被移除，丢弃样本", entry.name);
                    PollOutcome::Removed
                }
                Some(Ok(())) => PollOutcome::Recorded,
                Some(Err(e)) => {
                    error!("连接 {} 的统计样本写入失败: {}", entry.name, e);
                    PollOutcome::StoreFailed {
                        message: e.to_string(),
                    }
                }
            }
        }
        Ok(Err(e)) => {
            let failure = match e {
                AdminError::PollTimeout { timeout_ms, .. } => AdminError::PollTimeout {
                    name: entry.name.clone(),
                    timeout_ms,
                },
                AdminError::StatsFetchFailed { message, .. } => {
                    crate::admin_error!(stats, entry.name, message)
                }
                other => crate::admin_error!(stats, entry.name, other),
            };
            failure_outcome(&entry, failure).await
        }
        Err(_) => failure_outcome(&entry, crate::admin_error!(timeout, entry.name, timeout)).await,
    };

    (outcome, started.elapsed())
}

async fn failure_outcome(entry: &PoolEntry, failure: AdminError) -> PollOutcome {
    if entry.is_released() {
        return PollOutcome::Removed;
    }
    warn!("连接 {} 轮询失败: {}", entry.name, failure);
    entry.record_poll_failure(&failure).await;
    match failure {
        AdminError::PollTimeout { .. } => PollOutcome::TimedOut,
        other => PollOutcome::FetchFailed {
            message: other.to_string(),
        },
    }
}

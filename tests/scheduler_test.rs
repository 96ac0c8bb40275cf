//! 监控调度器集成测试

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ConnectBehavior, MockDriver, StatsBehavior, new_pool, uri, wait_for};
use rat_mongo_monitor::{
    AdminResult, ConnectionOptions, ConnectionPool, ConnectionStatus, MemoryStatsStore,
    MonitorConfig, MonitoringScheduler, PollOutcome, StatsSample, StatsStore, TimeRange,
    admin_error,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn test_monitor_config() -> MonitorConfig {
    MonitorConfig {
        enabled: true,
        interval_sec: 1,
        fetch_timeout_ms: 200,
        retention_sec: None,
    }
}

async fn connected_pool(driver: &MockDriver, names: &[&str]) -> Arc<ConnectionPool> {
    let pool = new_pool(driver);
    for name in names {
        pool.add_and_wait(name, &uri(name), ConnectionOptions::new())
            .await
            .unwrap();
    }
    pool
}

fn scheduler(pool: &Arc<ConnectionPool>, store: &Arc<MemoryStatsStore>) -> MonitoringScheduler {
    MonitoringScheduler::new(pool.clone(), store.clone(), test_monitor_config()).unwrap()
}

/// 写入总是失败的存储
struct FailingStore;

#[async_trait]
impl StatsStore for FailingStore {
    async fn record(&self, _sample: &StatsSample) -> AdminResult<()> {
        Err(admin_error!(store, "disk full"))
    }

    async fn query(&self, _connection_name: &str, _range: TimeRange) -> Vec<StatsSample> {
        Vec::new()
    }

    async fn latest(&self, _connection_name: &str) -> Option<StatsSample> {
        None
    }

    async fn oldest(&self) -> Option<DateTime<Utc>> {
        None
    }

    async fn prune_before(&self, _cutoff: DateTime<Utc>) -> AdminResult<usize> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_cycle_records_sample_per_connection() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["alpha", "bravo"]).await;
    let store = Arc::new(MemoryStatsStore::new());
    let scheduler = scheduler(&pool, &store);

    let report = scheduler.run_cycle().await;
    assert_eq!(report.cycle, 1);
    assert_eq!(report.recorded(), 2);
    assert_eq!(report.failed(), 0);

    let latest = store.latest("alpha").await.unwrap();
    assert_eq!(latest.uptime_seconds(), Some(30.0));
    assert_eq!(
        pool.get("alpha").unwrap().last_stats.unwrap().uptime_seconds(),
        Some(30.0)
    );

    scheduler.run_cycle().await;
    let history = store.query("alpha", TimeRange::all()).await;
    assert_eq!(history.len(), 2);
    assert!(history[0].timestamp <= history[1].timestamp);
    assert_eq!(scheduler.cycles(), 2);
    assert_eq!(scheduler.last_report().unwrap().cycle, 2);
}

#[tokio::test]
async fn test_hung_connection_does_not_delay_others() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["good", "stuck"]).await;
    driver.set_stats("stuck", StatsBehavior::Hang);
    let store = Arc::new(MemoryStatsStore::new());
    let scheduler = scheduler(&pool, &store);

    let started = Instant::now();
    let report = scheduler.run_cycle().await;

    // 并行轮询，整个周期受单个超时约束
    assert!(started.elapsed() < Duration::from_millis(800));
    assert_eq!(report.outcome("good"), Some(&PollOutcome::Recorded));
    assert_eq!(report.outcome("stuck"), Some(&PollOutcome::TimedOut));

    let stuck = pool.get("stuck").unwrap();
    assert_eq!(stuck.status, ConnectionStatus::Failed);
    assert_eq!(stuck.last_error.unwrap().code, "poll_timeout");
    assert!(stuck.has_client);
    assert!(store.latest("stuck").await.is_none());
}

#[tokio::test]
async fn test_fetch_failure_recovers_on_next_cycle() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["flaky"]).await;
    driver.set_stats("flaky", StatsBehavior::Fail);
    let store = Arc::new(MemoryStatsStore::new());
    let scheduler = scheduler(&pool, &store);

    let report = scheduler.run_cycle().await;
    assert!(matches!(
        report.outcome("flaky"),
        Some(PollOutcome::FetchFailed { message }) if message.contains("not authorized")
    ));
    let record = pool.get("flaky").unwrap();
    assert_eq!(record.status, ConnectionStatus::Failed);
    assert_eq!(record.last_error.unwrap().code, "stats_fetch_failed");

    driver.set_stats("flaky", StatsBehavior::Succeed);
    let report = scheduler.run_cycle().await;
    assert_eq!(report.outcome("flaky"), Some(&PollOutcome::Recorded));
    let record = pool.get("flaky").unwrap();
    assert_eq!(record.status, ConnectionStatus::Connected);
    assert!(record.last_error.is_none());
}

#[tokio::test]
async fn test_panicking_poll_is_isolated() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["bad", "good"]).await;
    driver.set_stats("bad", StatsBehavior::Panic);
    let store = Arc::new(MemoryStatsStore::new());
    let scheduler = scheduler(&pool, &store);

    let report = scheduler.run_cycle().await;
    assert!(matches!(report.outcome("bad"), Some(PollOutcome::Panicked { .. })));
    assert_eq!(report.outcome("good"), Some(&PollOutcome::Recorded));
    assert_eq!(pool.get("bad").unwrap().status, ConnectionStatus::Failed);
}

#[tokio::test]
async fn test_unconnected_entries_are_skipped() {
    let driver = MockDriver::new();
    driver.set_connect("down", ConnectBehavior::Fail);
    let pool = connected_pool(&driver, &["down", "up"]).await;
    let store = Arc::new(MemoryStatsStore::new());
    let scheduler = scheduler(&pool, &store);

    let report = scheduler.run_cycle().await;
    assert_eq!(report.outcome("down"), Some(&PollOutcome::Skipped));
    assert_eq!(report.outcome("up"), Some(&PollOutcome::Recorded));
    assert_eq!(report.failed(), 0);
    assert_eq!(driver.stats_calls("down"), 0);
}

#[tokio::test]
async fn test_removed_connection_gets_no_more_samples() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["gone", "kept"]).await;
    let store = Arc::new(MemoryStatsStore::new());
    let scheduler = scheduler(&pool, &store);

    scheduler.run_cycle().await;
    pool.remove("gone").await.unwrap();

    let report = scheduler.run_cycle().await;
    assert!(report.outcome("gone").is_none());
    assert_eq!(store.query("gone", TimeRange::all()).await.len(), 1);
    assert_eq!(store.query("kept", TimeRange::all()).await.len(), 2);
}

#[tokio::test]
async fn test_remove_during_inflight_poll_discards_sample() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["slow"]).await;
    driver.set_stats("slow", StatsBehavior::Slow(150));
    let store = Arc::new(MemoryStatsStore::new());
    let scheduler = Arc::new(scheduler(&pool, &store));

    let cycle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run_cycle().await })
    };
    assert!(wait_for(|| driver.stats_calls("slow") == 1, Duration::from_secs(1)).await);
    pool.remove("slow").await.unwrap();

    let report = cycle.await.unwrap();
    assert_eq!(report.outcome("slow"), Some(&PollOutcome::Removed));
    assert!(store.latest("slow").await.is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_store_failure_is_not_fatal() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["prod"]).await;
    let scheduler =
        MonitoringScheduler::new(pool.clone(), Arc::new(FailingStore), test_monitor_config())
            .unwrap();

    for _ in 0..2 {
        let report = scheduler.run_cycle().await;
        assert!(matches!(
            report.outcome("prod"),
            Some(PollOutcome::StoreFailed { .. })
        ));
    }

    let record = pool.get("prod").unwrap();
    assert!(record.has_client);
    assert_eq!(record.last_error.unwrap().code, "store_unavailable");
    assert_eq!(scheduler.cycles(), 2);
}

#[tokio::test]
async fn test_retention_prunes_old_samples() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["prod"]).await;
    let store = Arc::new(MemoryStatsStore::new());
    let old = StatsSample::new(
        "prod",
        Utc::now() - chrono::Duration::days(2),
        Default::default(),
    );
    store.record(&old).await.unwrap();

    let config = MonitorConfig {
        retention_sec: Some(3600),
        ..test_monitor_config()
    };
    let scheduler = MonitoringScheduler::new(pool.clone(), store.clone(), config).unwrap();

    let report = scheduler.run_cycle().await;
    assert_eq!(report.pruned, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_retention_waits_for_slack_before_pruning() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["prod"]).await;
    let store = Arc::new(MemoryStatsStore::new());
    // 刚超出保留时长，仍在余量（360秒）之内
    let expired = StatsSample::new(
        "prod",
        Utc::now() - chrono::Duration::seconds(3600 + 60),
        Default::default(),
    );
    store.record(&expired).await.unwrap();

    let config = MonitorConfig {
        retention_sec: Some(3600),
        ..test_monitor_config()
    };
    let scheduler = MonitoringScheduler::new(pool.clone(), store.clone(), config).unwrap();

    for _ in 0..3 {
        let report = scheduler.run_cycle().await;
        assert_eq!(report.pruned, 0);
    }
    assert_eq!(store.len(), 4);
    assert_eq!(store.oldest().await, Some(expired.timestamp));

    // 超出余量后一次清理所有过期样本
    let stale = StatsSample::new(
        "prod",
        Utc::now() - chrono::Duration::seconds(3600 + 600),
        Default::default(),
    );
    store.record(&stale).await.unwrap();
    let report = scheduler.run_cycle().await;
    assert_eq!(report.pruned, 2);
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn test_start_stop_lifecycle() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["prod"]).await;
    let store = Arc::new(MemoryStatsStore::new());
    let scheduler = scheduler(&pool, &store);

    let handle = scheduler.start();
    assert!(scheduler.is_running());

    // 重复启动返回同一个调度循环
    let again = scheduler.start();
    assert_eq!(handle.id(), again.id());

    // 第一个周期立即执行
    assert!(wait_for(|| store.len() >= 1, Duration::from_millis(500)).await);

    assert!(scheduler.stop(&handle));
    assert!(!handle.stop());
    assert!(again.is_stopped());
    assert!(!scheduler.is_running());
    handle.join().await;

    let cycles = scheduler.cycles();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(scheduler.cycles(), cycles);

    // 停止之后可以重新启动
    let restarted = scheduler.start();
    assert_ne!(restarted.id(), handle.id());
    assert!(restarted.stop());
}

#[tokio::test]
async fn test_disabled_monitoring_does_not_start() {
    let driver = MockDriver::new();
    let pool = connected_pool(&driver, &["prod"]).await;
    let store = Arc::new(MemoryStatsStore::new());
    let config = MonitorConfig {
        enabled: false,
        ..test_monitor_config()
    };
    let scheduler = MonitoringScheduler::new(pool, store.clone(), config).unwrap();

    let handle = scheduler.start();
    assert!(handle.is_stopped());
    assert!(!scheduler.is_running());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_timeout_must_be_below_interval() {
    let driver = MockDriver::new();
    let pool = new_pool(&driver);
    let config = MonitorConfig {
        fetch_timeout_ms: 1000,
        ..test_monitor_config()
    };

    let err = MonitoringScheduler::new(pool, Arc::new(MemoryStatsStore::new()), config)
        .unwrap_err();
    assert_eq!(err.code(), "config");
}

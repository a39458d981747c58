use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::profile::LoadProfile;

use super::{IntervalScheduler, RequestSender, TickScheduler};

#[derive(Default)]
struct CountingSender {
    count: AtomicU64,
}

#[async_trait]
impl RequestSender for CountingSender {
    async fn send(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

fn constant(rps: f64) -> Arc<LoadProfile> {
    Arc::new(LoadProfile::Constant { rps })
}

#[tokio::test(start_paused = true)]
async fn interval_scheduler_paces_constant_profile() {
    let sender = Arc::new(CountingSender::default());
    let scheduler = IntervalScheduler::new(
        Duration::from_secs(1),
        Duration::from_millis(100),
        constant(100.0),
        sender.clone(),
    );
    scheduler.start(Instant::now());
    scheduler.completion().wait().await.unwrap();

    let sent = sender.count.load(Ordering::SeqCst);
    assert!((90..=101).contains(&sent), "expected ~100 dispatches, got {sent}");
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn interval_scheduler_idles_on_zero_rate() {
    let sender = Arc::new(CountingSender::default());
    let scheduler = IntervalScheduler::new(
        Duration::from_secs(2),
        Duration::from_millis(100),
        constant(0.0),
        sender.clone(),
    );
    scheduler.start(Instant::now());
    scheduler.completion().wait().await.unwrap();
    assert_eq!(sender.count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_prevents_further_dispatches() {
    let sender = Arc::new(CountingSender::default());
    let scheduler = IntervalScheduler::new(
        Duration::from_secs(60),
        Duration::from_millis(100),
        constant(50.0),
        sender.clone(),
    );
    scheduler.start(Instant::now());

    tokio::time::sleep(Duration::from_millis(205)).await;
    scheduler.stop();
    scheduler.completion().wait().await.unwrap();
    let at_stop = sender.count.load(Ordering::SeqCst);
    assert!(at_stop > 0, "expected some dispatches before stop");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sender.count.load(Ordering::SeqCst), at_stop);
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let sender = Arc::new(CountingSender::default());
    let scheduler = IntervalScheduler::new(
        Duration::from_millis(50),
        Duration::from_millis(100),
        constant(100.0),
        sender.clone(),
    );
    scheduler.start(Instant::now());
    scheduler.completion().wait().await.unwrap();

    // stopping an already-finished scheduler is a no-op
    scheduler.stop();
    scheduler.stop();
    assert!(!scheduler.is_running());
    scheduler.completion().wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn completion_supports_multiple_waiters() {
    let sender = Arc::new(CountingSender::default());
    let scheduler = IntervalScheduler::new(
        Duration::from_millis(20),
        Duration::from_millis(100),
        constant(100.0),
        sender,
    );
    let first = scheduler.completion();
    let second = scheduler.completion();
    scheduler.start(Instant::now());
    let (a, b) = tokio::join!(first.wait(), second.wait());
    a.unwrap();
    b.unwrap();
}

#[tokio::test(start_paused = true)]
async fn tick_scheduler_carries_fractional_remainder() {
    let sender = Arc::new(CountingSender::default());
    let scheduler = TickScheduler::new(
        Duration::from_secs(1),
        Duration::from_millis(100),
        constant(25.0),
        sender.clone(),
    );
    scheduler.start(Instant::now());
    scheduler.completion().wait().await.unwrap();

    // 10 ticks x 2.5 expected per tick, fractional part carried across ticks
    assert_eq!(sender.count.load(Ordering::SeqCst), 25);
}

#[tokio::test(start_paused = true)]
async fn tick_scheduler_stops_cleanly() {
    let sender = Arc::new(CountingSender::default());
    let scheduler = TickScheduler::new(
        Duration::from_secs(60),
        Duration::from_millis(100),
        constant(10.0),
        sender.clone(),
    );
    scheduler.start(Instant::now());
    tokio::time::sleep(Duration::from_millis(350)).await;
    scheduler.stop();
    scheduler.completion().wait().await.unwrap();

    let at_stop = sender.count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(sender.count.load(Ordering::SeqCst), at_stop);
}

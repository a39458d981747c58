use ratelab_types::{FlexDuration, ProfileConfig, TestConfig};
use serde_json::json;
use std::time::Duration;

use crate::error::CoreError;

use super::{LoadMetrics, LoadTestManager, LoadgenSettings, SchedulerKind};

fn manager() -> LoadTestManager {
    LoadTestManager::new(LoadgenSettings::default(), LoadMetrics::new())
}

fn config(target_url: &str, duration: Duration, concurrency: Option<u32>) -> TestConfig {
    TestConfig {
        target_url: target_url.to_string(),
        duration: FlexDuration(duration),
        profile: ProfileConfig { kind: "constant".into(), params: json!({"rps": 10.0}) },
        concurrency,
    }
}

#[tokio::test]
async fn start_rejects_invalid_target_urls() {
    let manager = manager();
    for bad in ["ftp://example.com", "not a url", "http://"] {
        let err = manager.start(config(bad, Duration::from_secs(1), None)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfiguration(_)), "{bad}: {err}");
    }
    assert!(manager.current().is_none(), "no execution may be registered on rejection");
}

#[tokio::test]
async fn start_rejects_zero_duration_and_concurrency() {
    let manager = manager();
    let err = manager
        .start(config("http://localhost:9", Duration::ZERO, None))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfiguration(_)));

    let err = manager
        .start(config("http://localhost:9", Duration::from_secs(1), Some(0)))
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn start_rejects_unknown_profile() {
    let manager = manager();
    let bad = TestConfig {
        target_url: "http://localhost:9".into(),
        duration: FlexDuration(Duration::from_secs(1)),
        profile: ProfileConfig { kind: "sawtooth".into(), params: json!({}) },
        concurrency: None,
    };
    assert!(matches!(manager.start(bad), Err(CoreError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn stop_without_running_test_is_not_found() {
    let manager = manager();
    assert!(matches!(manager.stop(), Err(CoreError::TestNotRunning)));
}

#[test]
fn scheduler_kind_parses() {
    assert_eq!("interval".parse::<SchedulerKind>().unwrap(), SchedulerKind::Interval);
    assert_eq!("TICK".parse::<SchedulerKind>().unwrap(), SchedulerKind::Tick);
    assert!("cron".parse::<SchedulerKind>().is_err());
}

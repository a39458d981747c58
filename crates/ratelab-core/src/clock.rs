//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

#[allow(clippy::expect_used, reason = "system clock before UNIX epoch = fundamentally broken system")]
pub fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as i64
}

#[allow(clippy::expect_used, reason = "system clock before UNIX epoch = fundamentally broken system")]
pub fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}

//! Per-algorithm state reset on algorithm switches.
//!
//! Best effort: a failure is logged and the config swap proceeds anyway.
//! The next decision under the new algorithm then starts from whatever is
//! left, which still yields correct admission against the new config.

use redis::aio::ConnectionManager;

use crate::error::CoreResult;
use crate::store::Store;

use super::{FIXED_KEY_PREFIX, SLIDING_KEY_PREFIX, TOKEN_KEY};

const SCAN_BATCH_SIZE: usize = 500;

pub async fn reset_algorithm_state(store: &Store) {
    if let Err(e) = try_reset(store).await {
        tracing::warn!(error = %e, "Failed to reset store state after algorithm switch");
    }
}

async fn try_reset(store: &Store) -> CoreResult<()> {
    let mut conn = store.connection().await?;
    delete_by_pattern(&mut conn, &format!("{FIXED_KEY_PREFIX}*")).await?;
    delete_by_pattern(&mut conn, &format!("{SLIDING_KEY_PREFIX}*")).await?;
    let _: () = redis::cmd("DEL").arg(TOKEN_KEY).query_async(&mut conn).await?;
    Ok(())
}

/// Cursor SCAN with bounded batches and pipelined deletion.
async fn delete_by_pattern(conn: &mut ConnectionManager, pattern: &str) -> CoreResult<()> {
    let mut cursor: u64 = 0;
    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH_SIZE)
            .query_async(conn)
            .await?;
        for batch in keys.chunks(SCAN_BATCH_SIZE) {
            if batch.is_empty() {
                continue;
            }
            let mut pipe = redis::pipe();
            for key in batch {
                pipe.del(key).ignore();
            }
            let _: () = pipe.query_async(conn).await?;
        }
        if next == 0 {
            return Ok(());
        }
        cursor = next;
    }
}

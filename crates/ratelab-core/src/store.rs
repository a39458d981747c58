//! Shared in-memory store access.
//!
//! One `Store` per process. The managed connection is created lazily so the
//! limiter can boot (and fail open) while the store is down; the fail-open
//! guard drops the handle on failed health probes, which forces a fresh
//! connection attempt on the next use.

use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::error::CoreResult;

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { host: "localhost".to_string(), port: 6379 }
    }
}

impl StoreSettings {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

pub struct Store {
    client: redis::Client,
    conn: RwLock<Option<ConnectionManager>>,
}

impl Store {
    pub fn new(settings: &StoreSettings) -> CoreResult<Self> {
        let client = redis::Client::open(settings.url())?;
        Ok(Self { client, conn: RwLock::new(None) })
    }

    /// Hand out a cheap clone of the managed connection, connecting first if
    /// needed.
    pub async fn connection(&self) -> CoreResult<ConnectionManager> {
        if let Some(conn) = self.conn.read().await.clone() {
            return Ok(conn);
        }
        let mut guard = self.conn.write().await;
        if let Some(conn) = guard.clone() {
            return Ok(conn);
        }
        let manager = self.client.get_connection_manager().await?;
        *guard = Some(manager.clone());
        Ok(manager)
    }

    /// Drop the managed connection so the next use reconnects from scratch.
    pub async fn reset(&self) {
        *self.conn.write().await = None;
    }

    pub async fn ping(&self) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

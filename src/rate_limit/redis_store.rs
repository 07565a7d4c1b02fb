//! Redis-backed counter backend.
//!
//! Counters live in Redis so every gate instance shares the same quota state.
//!
//! ## Commands
//!
//! - `GET key` reads the current count
//! - `PTTL key` reports the remaining window
//! - `MULTI; INCR key; EXPIRE key <window> NX; EXEC` admits a request, setting
//!   the window anchor only on the first increment
//!
//! `EXPIRE ... NX` requires Redis 7.0 or newer.
//!
//! ## Example
//!
//! ```rust,no_run
//! use notification_gate::rate_limit::{FixedWindowCounter, RedisBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = RedisBackend::connect("redis://127.0.0.1/").await?;
//!     let counter = FixedWindowCounter::new(backend);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::fmt;
use std::time::Duration;

use super::error::StoreError;
use super::store::CounterBackend;

/// Redis connection shared by all requests
///
/// `ConnectionManager` multiplexes one connection and reconnects on failure;
/// clones are cheap and share it.
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend").finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., "redis://127.0.0.1/")
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the connection fails.
    pub async fn connect(url: &str) -> Result<Self, RedisError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis counter store");
        Ok(Self { connection })
    }

    /// Round-trip `PING`
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Interpret a `PTTL` reply: `-2` absent key, `-1` no expiry
fn ttl_from_millis(millis: i64) -> Option<Duration> {
    u64::try_from(millis).ok().map(Duration::from_millis)
}

#[async_trait]
impl CounterBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let mut conn = self.connection.clone();
        let millis: i64 = conn.pttl(key).await?;
        Ok(ttl_from_millis(millis))
    }

    async fn incr_and_expire_if_absent(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let (_count, _anchored): (i64, i64) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .cmd("EXPIRE")
            .arg(key)
            .arg(window.as_secs())
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

//! Counter Store
//!
//! Fixed-window counters kept in a shared key/value store with expiry.
//!
//! The algorithm lives in [`FixedWindowCounter`] and is written once against
//! the [`CounterBackend`] primitives, so the Redis and in-memory stores share
//! identical admission semantics.
//!
//! # Window anchoring
//!
//! The first admitted request in a window sets the key's expiry; later
//! increments never touch it (`EXPIRE ... NX`). Windows therefore start on
//! first use rather than on wall-clock boundaries, and a client may get up to
//! `limit` requests at the end of one window and another `limit` right after.
//!
//! # Concurrency
//!
//! The read (`GET`) and the increment are separate round trips. Concurrent
//! callers for one key may all observe `limit - 1` and all be admitted, so the
//! stored count can exceed `limit` by up to `concurrency - 1`. Strict
//! enforcement would need a single conditional-increment script in the store.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::{RateLimitExceeded, StoreError};
use super::key::{CounterKey, DEFAULT_KEY_PREFIX};

/// Store primitives the counter algorithm is built on
#[async_trait]
pub trait CounterBackend: Send + Sync + Debug {
    /// Read the raw value at `key`; `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remaining time to live of `key`; `None` when the key is absent or has
    /// no expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Increment `key` and set its expiry to `window` only if it has none,
    /// applied as one atomic unit
    async fn incr_and_expire_if_absent(&self, key: &str, window: Duration)
        -> Result<(), StoreError>;
}

/// Admission counter contract
#[async_trait]
pub trait CounterStore: Send + Sync + Debug {
    /// Admit one request against `key` if fewer than `limit` were admitted in
    /// the current window of length `window`.
    ///
    /// Returns `Ok(true)` when admitted. A denial is reported as
    /// [`StoreError::RateLimited`] carrying a best-effort retry hint.
    async fn check_and_increment(
        &self,
        key: &CounterKey,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StoreError>;
}

/// Fixed-window counter over any [`CounterBackend`]
#[derive(Debug, Clone)]
pub struct FixedWindowCounter<B> {
    backend: B,
    key_prefix: String,
}

impl<B: CounterBackend> FixedWindowCounter<B> {
    /// Create a counter using the default `rate_limit:` namespace
    pub fn new(backend: B) -> Self {
        Self::with_prefix(backend, DEFAULT_KEY_PREFIX)
    }

    /// Create a counter with a custom key namespace
    pub fn with_prefix(backend: B, key_prefix: impl Into<String>) -> Self {
        Self {
            backend,
            key_prefix: key_prefix.into(),
        }
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Key namespace
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    async fn retry_after(&self, key: &str, window: Duration) -> Duration {
        match self.backend.ttl(key).await {
            Ok(Some(ttl)) if !ttl.is_zero() => ttl,
            Ok(_) => {
                debug!(key, "Counter has no remaining TTL, using window length");
                window
            }
            Err(e) => {
                warn!(key, error = %e, "TTL query failed, using window length");
                window
            }
        }
    }
}

/// Parse a stored counter. Only the canonical decimal form `INCR` writes is
/// accepted; padding, signs and leading zeros are corruption.
fn parse_count(key: &str, raw: &str) -> Result<u64, StoreError> {
    match raw.parse::<u64>() {
        Ok(count) if count.to_string() == raw => Ok(count),
        _ => Err(StoreError::DataCorruption {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[async_trait]
impl<B: CounterBackend> CounterStore for FixedWindowCounter<B> {
    async fn check_and_increment(
        &self,
        key: &CounterKey,
        limit: u64,
        window: Duration,
    ) -> Result<bool, StoreError> {
        let key = key.namespaced(&self.key_prefix);

        let count = match self.backend.get(&key).await? {
            Some(raw) => parse_count(&key, &raw)?,
            None => 0,
        };

        if count >= limit {
            let retry_after = self.retry_after(&key, window).await;
            debug!(key = %key, count, limit, ?retry_after, "Counter exhausted");
            return Err(RateLimitExceeded::new(retry_after).into());
        }

        self.backend
            .incr_and_expire_if_absent(&key, window)
            .await
            .map_err(|e| match e {
                StoreError::Unavailable(msg) => StoreError::Unavailable(format!(
                    "failed to atomically increment rate-limiter counter: {}",
                    msg
                )),
                other => StoreError::Unavailable(other.to_string()),
            })?;

        Ok(true)
    }
}

//! In-memory counter backend
//!
//! Single-process stand-in for the shared store. Expiry is evaluated lazily
//! against a [`Clock`], so tests can move time past a window without sleeping.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::clock::{Clock, SystemClock};
use super::error::StoreError;
use super::store::CounterBackend;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Mutex-guarded key/value map with per-key expiry
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryBackend {
    /// Create a backend driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a backend driven by `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Store a raw value without expiry, replacing any existing entry
    pub async fn set_raw(&self, key: &str, value: impl Into<String>) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Current live value at `key`
    pub async fn raw(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone())
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        let entries = self.entries.lock().await;
        entries.values().filter(|entry| entry.is_live(now)).count()
    }

    /// Whether no live key exists
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries
    pub async fn purge_expired(&self) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.is_live(now));
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.raw(key).await)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = self.clock.now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn incr_and_expire_if_absent(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;

        // An expired entry is gone: the next increment starts from zero.
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });

        let count: i64 = entry.value.parse().map_err(|_| {
            StoreError::Unavailable("value is not an integer or out of range".to_string())
        })?;
        let next = count.checked_add(1).ok_or_else(|| {
            StoreError::Unavailable("increment or decrement would overflow".to_string())
        })?;
        entry.value = next.to_string();
        if entry.expires_at.is_none() {
            entry.expires_at = Some(now + window);
        }

        Ok(())
    }
}

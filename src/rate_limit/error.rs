//! Rate Limit Error Types
//!
//! Errors raised while loading quotas, talking to the counter store, and
//! deciding whether a notification may be dispatched.

use std::fmt;
use std::time::Duration;

use super::quota::Category;

/// A caller exceeded its quota for the current window.
///
/// Carries the machine-usable retry hint. Constructed by the counter store and
/// handed through the dispatcher to the transport layer unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Time until the current window lapses
    pub retry_after: Duration,

    /// Optional human readable message
    pub message: Option<String>,
}

impl RateLimitExceeded {
    /// Create a new rate limit error
    pub fn new(retry_after: Duration) -> Self {
        Self {
            retry_after,
            message: None,
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Retry hint in whole seconds, rounded up.
    ///
    /// Any remaining fraction of a second counts as a full second, so a
    /// caller honouring the hint never retries before the window lapses.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) if !message.is_empty() => f.write_str(message),
            _ => write!(f, "rate limit exceeded, retry after {:?}", self.retry_after),
        }
    }
}

impl std::error::Error for RateLimitExceeded {}

/// Invalid quota configuration
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// Limit must be strictly positive
    #[error("quota for '{0}': limit must be > 0")]
    ZeroLimit(String),

    /// Window must be strictly positive
    #[error("quota for '{0}': window must be > 0 seconds")]
    ZeroWindow(String),

    /// Category name is blank
    #[error("quota table contains a blank category name")]
    BlankCategory,

    /// Quota file could not be read
    #[error("failed to read quota file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Quota file could not be parsed
    #[error("failed to parse quota table: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Counter store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Quota for the key is exhausted in the current window
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    /// Stored counter value is not a non-negative integer
    #[error("corrupt counter at '{key}': {value:?} is not a non-negative integer")]
    DataCorruption { key: String, value: String },

    /// Store round trip failed
    #[error("counter store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Dispatch failures surfaced to the transport layer
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No quota is configured for the category
    #[error("unknown notification type: {0}")]
    UnknownCategory(Category),

    /// Caller exceeded the quota; carries the retry hint
    #[error(transparent)]
    RateLimited(RateLimitExceeded),

    /// Store denied the request without a retry hint
    #[error("too many messages sent to given user")]
    QuotaExceeded,

    /// Stored counter is unreadable
    #[error("corrupt counter at '{key}': {value:?}")]
    DataCorruption { key: String, value: String },

    /// Opaque counter store failure
    #[error("counter store failure: {0}")]
    Store(String),

    /// Caller cancelled or the deadline elapsed mid-call
    #[error("request cancelled: {0}")]
    Cancelled(String),
}

impl DispatchError {
    /// Retry hint, present only for rate limited requests
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            DispatchError::RateLimited(err) => Some(err.retry_after),
            _ => None,
        }
    }

    /// Whether the failure is a deployment or infrastructure fault rather
    /// than caller behaviour
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            DispatchError::UnknownCategory(_)
                | DispatchError::DataCorruption { .. }
                | DispatchError::Store(_)
        )
    }

    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            DispatchError::UnknownCategory(_) => "unknown_category",
            DispatchError::RateLimited(_) => "rate_limited",
            DispatchError::QuotaExceeded => "quota_exceeded",
            DispatchError::DataCorruption { .. } => "data_corruption",
            DispatchError::Store(_) => "store",
            DispatchError::Cancelled(_) => "cancelled",
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RateLimited(limited) => DispatchError::RateLimited(limited),
            StoreError::DataCorruption { key, value } => {
                DispatchError::DataCorruption { key, value }
            }
            StoreError::Unavailable(msg) => DispatchError::Store(msg),
        }
    }
}

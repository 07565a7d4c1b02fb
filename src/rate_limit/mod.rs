//! Rate Limiting and Admission Control Module
//!
//! This module decides, per `(user, notification category)` pair, whether a
//! notification fits in the category's quota and, if not, when to retry.
//!
//! # Features
//!
//! - Fixed-window counters anchored at the first admitted request
//! - Shared Redis counter store, in-memory store for tests
//! - Static category quota table validated at load time
//! - Retry hints derived from the remaining window
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐          ┌──────────────────────────┐  │
//! │  │  QuotaProvider  │          │      CounterStore        │  │
//! │  │  (QuotaTable)   │          │  (FixedWindowCounter)    │  │
//! │  └─────────────────┘          └────────────┬─────────────┘  │
//! ├────────────────────────────────────────────┼────────────────┤
//! │                              ┌─────────────┴─────────────┐  │
//! │                              │ CounterBackend            │  │
//! │                              │ (RedisBackend / Memory)   │  │
//! │                              └───────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod key;
pub mod memory;
pub mod quota;
pub mod redis_store;
pub mod store;

pub use clock::{Clock, MockClock, SystemClock};
pub use dispatcher::{Dispatcher, DEFAULT_STORE_TIMEOUT};
pub use error::{DispatchError, QuotaError, RateLimitExceeded, StoreError};
pub use key::{CounterKey, DEFAULT_KEY_PREFIX};
pub use memory::MemoryBackend;
pub use quota::{Category, Quota, QuotaProvider, QuotaTable, RawQuota};
pub use redis_store::RedisBackend;
pub use store::{CounterBackend, CounterStore, FixedWindowCounter};

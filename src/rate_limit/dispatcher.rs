//! Dispatch Orchestrator
//!
//! Entry point for admitting a notification: resolves the category's quota,
//! derives the counter key, asks the counter store, and turns the outcome
//! into a dispatch decision.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::DispatchError;
use super::key::CounterKey;
use super::quota::{Category, QuotaProvider};
use super::store::CounterStore;
use crate::metrics;

/// Default bound on a single counter store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Stateless admission gate
///
/// Holds no per-key state or locks; concurrent calls only meet in the
/// counter store.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    quotas: Arc<dyn QuotaProvider>,
    store: Arc<dyn CounterStore>,
    store_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with the default store timeout
    pub fn new(quotas: Arc<dyn QuotaProvider>, store: Arc<dyn CounterStore>) -> Self {
        Self {
            quotas,
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Override the store timeout
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Store timeout in effect
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Admit one notification for `user_id` in `category`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnknownCategory`] when no quota is configured
    /// - [`DispatchError::RateLimited`] when the window's quota is used up
    /// - [`DispatchError::Cancelled`] when the store does not answer in time
    /// - store failures otherwise
    pub async fn admit(
        &self,
        user_id: &Uuid,
        category: &Category,
        payload: &str,
    ) -> Result<(), DispatchError> {
        self.admit_until(user_id, category, payload, std::future::pending())
            .await
    }

    /// Like [`Dispatcher::admit`], but abandons the in-flight store call and
    /// returns [`DispatchError::Cancelled`] as soon as `cancel` completes.
    pub async fn admit_until<F>(
        &self,
        user_id: &Uuid,
        category: &Category,
        payload: &str,
        cancel: F,
    ) -> Result<(), DispatchError>
    where
        F: Future<Output = ()>,
    {
        let result = self.decide(user_id, category, cancel).await;

        match &result {
            Ok(()) => {
                metrics::record_admitted(category.as_str());
                info!(user_id = %user_id, category = %category, payload = %payload, "Message sent");
            }
            Err(e) => {
                // Unconfigured names come from the request body and never become label values.
                let label = match e {
                    DispatchError::UnknownCategory(_) => metrics::UNKNOWN_CATEGORY_LABEL,
                    _ => category.as_str(),
                };
                metrics::record_rejected(label, e.reason());
                match e {
                    DispatchError::RateLimited(limited) => debug!(
                        user_id = %user_id,
                        category = %category,
                        retry_after = ?limited.retry_after,
                        "Notification rate limited"
                    ),
                    DispatchError::Cancelled(reason) => warn!(
                        user_id = %user_id,
                        category = %category,
                        reason = %reason,
                        "Notification admission cancelled"
                    ),
                    other => error!(
                        user_id = %user_id,
                        category = %category,
                        error = %other,
                        "Notification admission failed"
                    ),
                }
            }
        }

        result
    }

    async fn decide<F>(
        &self,
        user_id: &Uuid,
        category: &Category,
        cancel: F,
    ) -> Result<(), DispatchError>
    where
        F: Future<Output = ()>,
    {
        let quota = self
            .quotas
            .quota(category)
            .ok_or_else(|| DispatchError::UnknownCategory(category.clone()))?;

        let key = CounterKey::new(category, user_id);

        let _timer = metrics::COUNTER_STORE_DURATION_SECONDS.start_timer();
        let check = tokio::time::timeout(
            self.store_timeout,
            self.store
                .check_and_increment(&key, quota.limit(), quota.window()),
        );

        let outcome = tokio::select! {
            result = check => result.map_err(|_| {
                DispatchError::Cancelled(format!(
                    "counter store did not respond within {:?}",
                    self.store_timeout
                ))
            })?,
            _ = cancel => {
                return Err(DispatchError::Cancelled("caller cancelled the request".to_string()));
            }
        };

        match outcome {
            Ok(true) => Ok(()),
            Ok(false) => Err(DispatchError::QuotaExceeded),
            Err(e) => Err(e.into()),
        }
    }
}

//! Quota Types and Provider
//!
//! This module provides the notification categories, the per-category quota
//! and the read-only table that maps one to the other.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use super::error::QuotaError;

/// Notification category
///
/// Open set of names; a category is only admitted when the quota table has an
/// entry for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// News notifications
    pub const NEWS: &'static str = "news-notification";
    /// Status notifications
    pub const STATUS: &'static str = "status-notification";
    /// Marketing notifications
    pub const MARKETING: &'static str = "marketing-notification";

    /// Create a category from its name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// News category
    pub fn news() -> Self {
        Self::new(Self::NEWS)
    }

    /// Status category
    pub fn status() -> Self {
        Self::new(Self::STATUS)
    }

    /// Marketing category
    pub fn marketing() -> Self {
        Self::new(Self::MARKETING)
    }

    /// Category name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Admission quota for one category: `limit` notifications per `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    limit: u64,
    window: Duration,
}

impl Quota {
    /// Create a validated quota
    ///
    /// # Errors
    ///
    /// Returns an error if either `limit` or `window_secs` is zero.
    pub fn new(limit: u64, window_secs: u64) -> Result<Self, QuotaError> {
        Self::for_category("<unnamed>", limit, window_secs)
    }

    fn for_category(category: &str, limit: u64, window_secs: u64) -> Result<Self, QuotaError> {
        if limit == 0 {
            return Err(QuotaError::ZeroLimit(category.to_string()));
        }
        if window_secs == 0 {
            return Err(QuotaError::ZeroWindow(category.to_string()));
        }
        Ok(Self {
            limit,
            window: Duration::from_secs(window_secs),
        })
    }

    /// Maximum admitted notifications per window
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Unvalidated quota entry as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawQuota {
    /// Notifications per window
    pub limit: u64,

    /// Window length in seconds
    #[serde(alias = "window_size")]
    pub window_secs: u64,
}

/// Port for resolving a category's quota
///
/// `None` means the category is not configured, which is a deployment defect
/// and distinct from quota exhaustion.
pub trait QuotaProvider: Send + Sync + fmt::Debug {
    /// Look up the quota for a category
    fn quota(&self, category: &Category) -> Option<Quota>;
}

/// Validated, immutable category to quota mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotaTable {
    quotas: HashMap<Category, Quota>,
}

impl QuotaTable {
    /// Build a table, validating every entry
    ///
    /// # Errors
    ///
    /// Fails on the first blank category name or invalid quota.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, QuotaError>
    where
        I: IntoIterator<Item = (S, RawQuota)>,
        S: Into<String>,
    {
        let mut quotas = HashMap::new();
        for (name, raw) in entries {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(QuotaError::BlankCategory);
            }
            let quota = Quota::for_category(&name, raw.limit, raw.window_secs)?;
            quotas.insert(Category::new(name), quota);
        }
        Ok(Self { quotas })
    }

    /// Parse a JSON quota table
    ///
    /// ```
    /// use notification_gate::rate_limit::{Category, QuotaProvider, QuotaTable};
    ///
    /// let table = QuotaTable::from_json_str(
    ///     r#"{"news-notification": {"limit": 1, "window_size": 86400}}"#,
    /// ).unwrap();
    /// assert_eq!(table.quota(&Category::news()).unwrap().limit(), 1);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, QuotaError> {
        let raw: HashMap<String, RawQuota> = serde_json::from_str(json)?;
        Self::from_entries(raw)
    }

    /// Load a JSON quota table from disk
    pub fn load_json_file<P: AsRef<Path>>(path: P) -> Result<Self, QuotaError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| QuotaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let table = Self::from_json_str(&content)?;
        tracing::info!(path = %path.display(), categories = table.len(), "Loaded quota table");
        Ok(table)
    }

    /// Table shipped with the binary
    pub fn embedded_default() -> Self {
        let mut quotas = HashMap::new();
        quotas.insert(
            Category::news(),
            Quota {
                limit: 1,
                window: Duration::from_secs(86_400),
            },
        );
        quotas.insert(
            Category::status(),
            Quota {
                limit: 2,
                window: Duration::from_secs(60),
            },
        );
        quotas.insert(
            Category::marketing(),
            Quota {
                limit: 3,
                window: Duration::from_secs(3_600),
            },
        );
        Self { quotas }
    }

    /// Number of configured categories
    pub fn len(&self) -> usize {
        self.quotas.len()
    }

    /// Whether no category is configured
    pub fn is_empty(&self) -> bool {
        self.quotas.is_empty()
    }

    /// Configured categories, sorted by name
    pub fn categories(&self) -> Vec<&Category> {
        let mut categories: Vec<_> = self.quotas.keys().collect();
        categories.sort();
        categories
    }
}

impl QuotaProvider for QuotaTable {
    fn quota(&self, category: &Category) -> Option<Quota> {
        self.quotas.get(category).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_quota_rejects_zero_limit() {
        assert!(matches!(Quota::new(0, 60), Err(QuotaError::ZeroLimit(_))));
    }

    #[test]
    fn test_quota_rejects_zero_window() {
        assert!(matches!(Quota::new(5, 0), Err(QuotaError::ZeroWindow(_))));
    }

    #[test]
    fn test_embedded_default() {
        let table = QuotaTable::embedded_default();
        assert_eq!(table.len(), 3);

        let news = table.quota(&Category::news()).unwrap();
        assert_eq!(news.limit(), 1);
        assert_eq!(news.window(), Duration::from_secs(86_400));

        let status = table.quota(&Category::status()).unwrap();
        assert_eq!(status.limit(), 2);
        assert_eq!(status.window(), Duration::from_secs(60));

        let marketing = table.quota(&Category::marketing()).unwrap();
        assert_eq!(marketing.limit(), 3);
        assert_eq!(marketing.window(), Duration::from_secs(3_600));
    }

    #[test]
    fn test_unknown_category_not_found() {
        let table = QuotaTable::embedded_default();
        assert!(table.quota(&Category::new("sms-notification")).is_none());
    }

    #[test]
    fn test_from_entries_names_bad_category() {
        let err = QuotaTable::from_entries(vec![
            ("news-notification", RawQuota { limit: 1, window_secs: 60 }),
            ("status-notification", RawQuota { limit: 0, window_secs: 60 }),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("status-notification"));
    }

    #[test]
    fn test_from_entries_rejects_blank_name() {
        let err = QuotaTable::from_entries(vec![(" ", RawQuota { limit: 1, window_secs: 1 })])
            .unwrap_err();
        assert!(matches!(err, QuotaError::BlankCategory));
    }

    #[test]
    fn test_from_json_accepts_both_window_spellings() {
        let table = QuotaTable::from_json_str(
            r#"{
                "news-notification": {"limit": 1, "window_size": 86400},
                "status-notification": {"limit": 2, "window_secs": 60}
            }"#,
        )
        .unwrap();
        assert_eq!(
            table.quota(&Category::news()).unwrap().window(),
            Duration::from_secs(86_400)
        );
        assert_eq!(table.quota(&Category::status()).unwrap().limit(), 2);
    }

    #[test]
    fn test_from_json_rejects_invalid_quota() {
        let result = QuotaTable::from_json_str(r#"{"news-notification": {"limit": 1, "window_size": 0}}"#);
        assert!(matches!(result, Err(QuotaError::ZeroWindow(_))));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let result = QuotaTable::from_json_str("not json");
        assert!(matches!(result, Err(QuotaError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = QuotaTable::load_json_file("/nonexistent/quotas.json");
        assert!(matches!(result, Err(QuotaError::Io { .. })));
    }

    #[test]
    fn test_categories_sorted() {
        let table = QuotaTable::embedded_default();
        let names: Vec<_> = table.categories().into_iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec!["marketing-notification", "news-notification", "status-notification"]
        );
    }

    #[test]
    fn test_category_serde_transparent() {
        let json = serde_json::to_string(&Category::news()).unwrap();
        assert_eq!(json, "\"news-notification\"");
    }

    proptest! {
        #[test]
        fn prop_positive_quota_always_valid(limit in 1u64..1_000_000, window in 1u64..10_000_000) {
            let quota = Quota::new(limit, window).unwrap();
            prop_assert_eq!(quota.limit(), limit);
            prop_assert_eq!(quota.window(), Duration::from_secs(window));
        }

        #[test]
        fn prop_zero_field_always_rejected(value in 1u64..1_000_000) {
            prop_assert!(Quota::new(0, value).is_err());
            prop_assert!(Quota::new(value, 0).is_err());
        }
    }
}

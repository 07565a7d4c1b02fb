//! Wire types for the notification API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::rate_limit::Category;

/// Shortest accepted message, in characters
pub const MIN_MESSAGE_CHARS: usize = 10;

/// Longest accepted message, in characters
pub const MAX_MESSAGE_CHARS: usize = 255;

/// One notification addressed to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Category the quota is looked up by
    #[serde(rename = "notificationType")]
    pub category: Category,

    /// Recipient
    #[serde(rename = "userId")]
    pub user_id: Uuid,

    /// Payload handed to delivery
    pub message: String,
}

impl Notification {
    pub fn new(category: Category, user_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            category,
            user_id,
            message: message.into(),
        }
    }

    /// Field problems, keyed by wire field name. Empty when valid.
    pub fn validate(&self) -> BTreeMap<String, String> {
        let mut problems = BTreeMap::new();

        let chars = self.message.chars().count();
        if self.message.trim().is_empty() {
            problems.insert(
                "message".to_string(),
                "this field cannot be blank".to_string(),
            );
        } else if !(MIN_MESSAGE_CHARS..=MAX_MESSAGE_CHARS).contains(&chars) {
            problems.insert(
                "message".to_string(),
                format!(
                    "this field must be between {} and {} characters",
                    MIN_MESSAGE_CHARS, MAX_MESSAGE_CHARS
                ),
            );
        }

        if self.category.as_str().trim().is_empty() {
            problems.insert(
                "notificationType".to_string(),
                "this field cannot be blank".to_string(),
            );
        }

        problems
    }
}

/// Body of every non-error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

//! Counter keys
//!
//! A counter key identifies one `(category, user)` pair. The counter store
//! adds its own namespace prefix before the key reaches the shared store.

use std::fmt;
use uuid::Uuid;

use super::quota::Category;

/// Separator between key components
pub const KEY_SEPARATOR: char = ':';

/// Default namespace prepended by the counter store
pub const DEFAULT_KEY_PREFIX: &str = "rate_limit:";

/// Key of one fixed-window counter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey(String);

impl CounterKey {
    /// Derive the key for a user's counter in a category
    pub fn new(category: &Category, user_id: &Uuid) -> Self {
        Self(format!("{}{}{}", category, KEY_SEPARATOR, user_id))
    }

    /// The key without namespace
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key as stored, under `prefix`
    pub fn namespaced(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.0)
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_format() {
        let user = Uuid::parse_str("968af933-64e3-4890-bd3c-50158bdadf0c").unwrap();
        let key = CounterKey::new(&Category::status(), &user);
        assert_eq!(
            key.as_str(),
            "status-notification:968af933-64e3-4890-bd3c-50158bdadf0c"
        );
        assert_eq!(
            key.namespaced(DEFAULT_KEY_PREFIX),
            "rate_limit:status-notification:968af933-64e3-4890-bd3c-50158bdadf0c"
        );
    }

    #[test]
    fn test_distinct_categories_distinct_keys() {
        let user = Uuid::new_v4();
        assert_ne!(
            CounterKey::new(&Category::news(), &user),
            CounterKey::new(&Category::marketing(), &user)
        );
    }

    proptest! {
        // Keys within one category collide only for the same user.
        #[test]
        fn prop_key_ends_with_user(a in any::<u128>(), b in any::<u128>()) {
            let user_a = Uuid::from_u128(a);
            let user_b = Uuid::from_u128(b);
            let key_a = CounterKey::new(&Category::news(), &user_a);
            let key_b = CounterKey::new(&Category::news(), &user_b);
            prop_assert!(key_a.as_str().ends_with(&user_a.to_string()));
            prop_assert_eq!(key_a == key_b, a == b);
        }
    }
}

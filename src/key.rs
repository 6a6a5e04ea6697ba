//! Cache key layout
//!
//! Keys are `<namespace>:<identifier>`. The namespace is everything before the
//! first separator, so identifiers may themselves contain `:`.

use crate::constants::KEY_SEPARATOR;
use std::fmt;

/// A fully qualified cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(namespace: &str, identifier: &str) -> Self {
        let mut key = String::with_capacity(namespace.len() + identifier.len() + 1);
        key.push_str(namespace);
        key.push(KEY_SEPARATOR);
        key.push_str(identifier);
        Self(key)
    }

    /// Wrap an already-qualified key
    ///
    /// Returns `None` when the string has no separator or an empty namespace.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.split_once(KEY_SEPARATOR) {
            Some((ns, _)) if !ns.is_empty() => Some(Self(raw.to_string())),
            _ => None,
        }
    }

    pub fn namespace(&self) -> &str {
        namespace_of(&self.0).unwrap_or_default()
    }

    pub fn identifier(&self) -> &str {
        self.0
            .split_once(KEY_SEPARATOR)
            .map(|(_, id)| id)
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Namespace prefix of a raw key, if it has one
pub fn namespace_of(raw: &str) -> Option<&str> {
    raw.split_once(KEY_SEPARATOR).map(|(ns, _)| ns)
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

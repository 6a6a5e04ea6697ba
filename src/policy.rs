//! # Namespace Policy Table
//!
//! Per-namespace capacity and TTL rules. The table is built once from
//! configuration rows and is read-only afterwards; lookups for namespaces
//! that were never configured fail instead of falling back to a default.

use crate::config::{ConfigResult, ConfigurationError, NamespacePolicyConfig};
use crate::constants::KEY_SEPARATOR;
use crate::error::{CacheError, CacheResult};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Capacity and TTL rules for one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacePolicy {
    pub namespace: String,
    pub max_local_entries: NonZeroUsize,
    pub local_ttl: Duration,
    pub remote_ttl: Duration,
}

impl NamespacePolicy {
    fn from_row(row: &NamespacePolicyConfig) -> ConfigResult<Self> {
        let context = format!("namespace '{}'", row.name);

        if row.name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "name",
                "namespace policy row",
            ));
        }
        if row.name.contains(KEY_SEPARATOR) {
            return Err(ConfigurationError::invalid_value(
                "name",
                &row.name,
                format!("namespace names must not contain '{KEY_SEPARATOR}'"),
            ));
        }
        let max_local_entries = NonZeroUsize::new(row.max_local_entries).ok_or_else(|| {
            ConfigurationError::invalid_value("max_local_entries", 0, context.clone())
        })?;
        if row.local_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "local_ttl_seconds",
                0,
                context,
            ));
        }
        if row.remote_ttl_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "remote_ttl_seconds",
                0,
                context,
            ));
        }
        if row.local_ttl_seconds > row.remote_ttl_seconds {
            return Err(ConfigurationError::invalid_value(
                "local_ttl_seconds",
                row.local_ttl_seconds,
                format!(
                    "{context}: local TTL must not exceed remote TTL ({}s)",
                    row.remote_ttl_seconds
                ),
            ));
        }

        Ok(Self {
            namespace: row.name.clone(),
            max_local_entries,
            local_ttl: row.local_ttl(),
            remote_ttl: row.remote_ttl(),
        })
    }
}

/// Immutable namespace → policy lookup
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<String, NamespacePolicy>,
}

impl PolicyTable {
    /// Build and validate the table from configuration rows
    pub fn from_config(rows: &[NamespacePolicyConfig]) -> ConfigResult<Self> {
        let mut policies = HashMap::with_capacity(rows.len());
        for row in rows {
            let policy = NamespacePolicy::from_row(row)?;
            if policies.contains_key(&policy.namespace) {
                return Err(ConfigurationError::duplicate_namespace(&policy.namespace));
            }
            policies.insert(policy.namespace.clone(), policy);
        }
        Ok(Self { policies })
    }

    /// Look up the policy for a namespace
    pub fn resolve(&self, namespace: &str) -> CacheResult<&NamespacePolicy> {
        self.policies
            .get(namespace)
            .ok_or_else(|| CacheError::UnknownNamespace(namespace.to_string()))
    }

    /// Fail fast if any of `namespaces` is not configured
    pub fn ensure_known<S: AsRef<str>>(&self, namespaces: &[S]) -> CacheResult<()> {
        for ns in namespaces {
            self.resolve(ns.as_ref())?;
        }
        Ok(())
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.policies.contains_key(namespace)
    }

    /// Configured policies, ordered by namespace name
    pub fn namespaces(&self) -> impl Iterator<Item = &NamespacePolicy> {
        let mut policies: Vec<_> = self.policies.values().collect();
        policies.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        policies.into_iter()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Sum of every namespace's local capacity
    pub fn total_local_capacity(&self) -> usize {
        self.policies
            .values()
            .map(|p| p.max_local_entries.get())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_namespaces;

    fn row(name: &str, cap: usize, local: u64, remote: u64) -> NamespacePolicyConfig {
        NamespacePolicyConfig::new(name, cap, local, remote)
    }

    #[test]
    fn test_resolve_known_and_unknown() {
        let table = PolicyTable::from_config(&default_namespaces()).unwrap();
        let loan = table.resolve("loan").unwrap();
        assert_eq!(loan.local_ttl, Duration::from_secs(30 * 60));
        assert_eq!(loan.remote_ttl, Duration::from_secs(2 * 60 * 60));
        assert_eq!(loan.max_local_entries.get(), 2000);

        assert!(matches!(
            table.resolve("mortgage"),
            Err(CacheError::UnknownNamespace(ns)) if ns == "mortgage"
        ));
    }

    #[test]
    fn test_ensure_known_reports_first_missing() {
        let table = PolicyTable::from_config(&default_namespaces()).unwrap();
        assert!(table.ensure_known(&["loan", "payment"]).is_ok());
        assert!(matches!(
            table.ensure_known(&["loan", "fx"]),
            Err(CacheError::UnknownNamespace(ns)) if ns == "fx"
        ));
    }

    #[test]
    fn test_rejects_invalid_rows() {
        assert!(matches!(
            PolicyTable::from_config(&[row("a", 1, 1, 1), row("a", 2, 1, 1)]),
            Err(ConfigurationError::DuplicateNamespace { .. })
        ));
        assert!(PolicyTable::from_config(&[row("", 1, 1, 1)]).is_err());
        assert!(PolicyTable::from_config(&[row("a:b", 1, 1, 1)]).is_err());
        assert!(PolicyTable::from_config(&[row("a", 0, 1, 1)]).is_err());
        assert!(PolicyTable::from_config(&[row("a", 1, 0, 1)]).is_err());
        assert!(PolicyTable::from_config(&[row("a", 1, 1, 0)]).is_err());
        assert!(PolicyTable::from_config(&[row("a", 1, 10, 5)]).is_err());
    }

    #[test]
    fn test_namespaces_are_sorted() {
        let table = PolicyTable::from_config(&[row("zeta", 1, 1, 1), row("alpha", 1, 1, 1)])
            .unwrap();
        let names: Vec<_> = table.namespaces().map(|p| p.namespace.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(table.total_local_capacity(), 2);
    }
}

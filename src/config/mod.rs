//! # Cache Engine Configuration
//!
//! Static configuration for the engine: the namespace policy table, circuit
//! breaker, remote backend, maintenance cadence, warming and health thresholds.
//! Everything is loaded once at start-up and never mutated afterwards.
//!
//! Durations are configured as integers (`*_seconds`, `*_ms`) so TOML files
//! and environment overrides stay flat.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tiercache_core::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load_file("config/tiercache.toml")?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{backends, defaults, namespaces};
use crate::policy::PolicyTable;
use crate::resilience::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration for a `CacheEngine`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheEngineConfig {
    /// Namespace policy rows; a file that sets this replaces the whole table
    pub namespaces: Vec<NamespacePolicyConfig>,
    pub circuit_breaker: CircuitBreakerSettings,
    pub remote: RemoteConfig,
    pub maintenance: MaintenanceConfig,
    pub warming: WarmingConfig,
    pub health: HealthConfig,
}

/// One row of the namespace policy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePolicyConfig {
    pub name: String,
    pub max_local_entries: usize,
    pub local_ttl_seconds: u64,
    pub remote_ttl_seconds: u64,
}

impl NamespacePolicyConfig {
    pub fn new(
        name: impl Into<String>,
        max_local_entries: usize,
        local_ttl_seconds: u64,
        remote_ttl_seconds: u64,
    ) -> Self {
        Self {
            name: name.into(),
            max_local_entries,
            local_ttl_seconds,
            remote_ttl_seconds,
        }
    }

    pub fn local_ttl(&self) -> Duration {
        Duration::from_secs(self.local_ttl_seconds)
    }

    pub fn remote_ttl(&self) -> Duration {
        Duration::from_secs(self.remote_ttl_seconds)
    }
}

/// Circuit breaker settings as they appear in configuration files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Consecutive remote failures before the breaker opens
    pub failure_threshold: u32,
    /// Seconds the breaker stays open before the next call is attempted
    pub cooldown_seconds: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::CIRCUIT_FAILURE_THRESHOLD,
            cooldown_seconds: defaults::CIRCUIT_COOLDOWN_SECONDS,
        }
    }
}

impl CircuitBreakerSettings {
    /// Convert to the resilience module's breaker configuration
    pub fn to_resilience_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_seconds),
        }
    }
}

/// Remote (L2) backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// One of `memory`, `noop`, `redis`, `dragonfly`
    pub backend: String,
    /// Upper bound on every remote call; elapsed calls count as failures
    pub operation_timeout_ms: u64,
    pub redis: Option<RedisConfig>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: backends::MEMORY.to_string(),
            operation_timeout_ms: defaults::REMOTE_OPERATION_TIMEOUT_MS,
            redis: None,
        }
    }
}

impl RemoteConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Redis/Dragonfly connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Background maintenance cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub interval_seconds: u64,
    /// L1 entries inspected per tick; the sweep resumes where it stopped
    pub sweep_budget: usize,
    /// How often a registered warmer is polled
    pub warming_interval_seconds: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_seconds: defaults::MAINTENANCE_INTERVAL_SECONDS,
            sweep_budget: defaults::SWEEP_BUDGET,
            warming_interval_seconds: defaults::WARMING_INTERVAL_SECONDS,
        }
    }
}

impl MaintenanceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn warming_interval(&self) -> Duration {
        Duration::from_secs(self.warming_interval_seconds)
    }
}

/// Cache warming settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmingConfig {
    /// Minimum remote TTL for warmed entries
    pub remote_ttl_seconds: u64,
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            remote_ttl_seconds: defaults::WARMING_REMOTE_TTL_SECONDS,
        }
    }
}

impl WarmingConfig {
    pub fn remote_ttl(&self) -> Duration {
        Duration::from_secs(self.remote_ttl_seconds)
    }
}

/// Thresholds used by `CacheEngine::health`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Hit rate that must be exceeded once any operations have been recorded
    pub min_hit_rate: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            min_hit_rate: defaults::HEALTH_MIN_HIT_RATE,
        }
    }
}

/// Default banking namespace table
pub fn default_namespaces() -> Vec<NamespacePolicyConfig> {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;

    vec![
        NamespacePolicyConfig::new(namespaces::PROFILE, 1000, 15 * MINUTE, HOUR),
        NamespacePolicyConfig::new(namespaces::LOAN, 2000, 30 * MINUTE, 2 * HOUR),
        NamespacePolicyConfig::new(namespaces::PAYMENT, 500, 5 * MINUTE, 30 * MINUTE),
        NamespacePolicyConfig::new(namespaces::CREDIT_SCORE, 1500, HOUR, 4 * HOUR),
        NamespacePolicyConfig::new(namespaces::CREDIT_ASSESSMENT, 1500, HOUR, 24 * HOUR),
        NamespacePolicyConfig::new(namespaces::TOKEN, 10_000, MINUTE, 5 * MINUTE),
        NamespacePolicyConfig::new(namespaces::PORTFOLIO, 800, 2 * HOUR, 8 * HOUR),
        NamespacePolicyConfig::new(namespaces::ANALYTICS, 200, 6 * HOUR, 24 * HOUR),
    ]
}

impl Default for CacheEngineConfig {
    fn default() -> Self {
        Self {
            namespaces: default_namespaces(),
            circuit_breaker: CircuitBreakerSettings::default(),
            remote: RemoteConfig::default(),
            maintenance: MaintenanceConfig::default(),
            warming: WarmingConfig::default(),
            health: HealthConfig::default(),
        }
    }
}

impl CacheEngineConfig {
    /// Small, fast configuration for tests: in-memory L2, short timeouts
    pub fn for_test() -> Self {
        Self {
            namespaces: default_namespaces(),
            circuit_breaker: CircuitBreakerSettings {
                failure_threshold: 1,
                cooldown_seconds: 30,
            },
            remote: RemoteConfig {
                backend: backends::MEMORY.to_string(),
                operation_timeout_ms: 100,
                redis: None,
            },
            maintenance: MaintenanceConfig {
                interval_seconds: 1,
                sweep_budget: 100,
                warming_interval_seconds: 5,
            },
            warming: WarmingConfig::default(),
            health: HealthConfig::default(),
        }
    }

    /// Replace the namespace table
    pub fn with_namespaces(mut self, namespaces: Vec<NamespacePolicyConfig>) -> Self {
        self.namespaces = namespaces;
        self
    }

    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        PolicyTable::from_config(&self.namespaces)?;

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.failure_threshold",
                0,
                "must be at least 1",
            ));
        }
        if self.circuit_breaker.cooldown_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "circuit_breaker.cooldown_seconds",
                0,
                "must be positive",
            ));
        }

        let backend = self.remote.backend.to_ascii_lowercase();
        if !backends::SUPPORTED.contains(&backend.as_str()) {
            return Err(ConfigurationError::unknown_backend(
                &self.remote.backend,
                backends::SUPPORTED,
            ));
        }
        if self.remote.operation_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "remote.operation_timeout_ms",
                0,
                "must be positive",
            ));
        }

        if self.maintenance.interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "maintenance.interval_seconds",
                0,
                "must be positive",
            ));
        }
        if self.maintenance.sweep_budget == 0 {
            return Err(ConfigurationError::invalid_value(
                "maintenance.sweep_budget",
                0,
                "must be positive",
            ));
        }
        if self.maintenance.warming_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "maintenance.warming_interval_seconds",
                0,
                "must be positive",
            ));
        }

        if !(0.0..=1.0).contains(&self.health.min_hit_rate) {
            return Err(ConfigurationError::invalid_value(
                "health.min_hit_rate",
                self.health.min_hit_rate,
                "must be between 0.0 and 1.0",
            ));
        }

        Ok(())
    }

    /// Log the effective configuration
    pub fn log_configuration(&self) {
        info!(
            namespaces = self.namespaces.len(),
            backend = %self.remote.backend,
            operation_timeout_ms = self.remote.operation_timeout_ms,
            failure_threshold = self.circuit_breaker.failure_threshold,
            cooldown_seconds = self.circuit_breaker.cooldown_seconds,
            maintenance_interval_seconds = self.maintenance.interval_seconds,
            sweep_budget = self.maintenance.sweep_budget,
            "Cache engine configuration"
        );
        for ns in &self.namespaces {
            info!(
                namespace = %ns.name,
                max_local_entries = ns.max_local_entries,
                local_ttl_seconds = ns.local_ttl_seconds,
                remote_ttl_seconds = ns.remote_ttl_seconds,
                "Namespace policy"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CacheEngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.namespaces.len(), namespaces::ALL.len());
        assert_eq!(config.circuit_breaker.failure_threshold, 1);
        assert_eq!(config.circuit_breaker.cooldown_seconds, 300);
    }

    #[test]
    fn test_test_config_is_valid() {
        assert!(CacheEngineConfig::for_test().validate().is_ok());
    }

    #[test]
    fn test_default_table_keeps_local_within_remote() {
        for row in default_namespaces() {
            assert!(
                row.local_ttl_seconds <= row.remote_ttl_seconds,
                "{} violates local <= remote",
                row.name
            );
        }
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let mut config = CacheEngineConfig::for_test();
        config.remote.backend = "memcached".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::UnknownBackend { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_threshold_and_bad_hit_rate() {
        let mut config = CacheEngineConfig::for_test();
        config.circuit_breaker.failure_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = CacheEngineConfig::for_test();
        config.health.min_hit_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_breaker_settings_conversion() {
        let settings = CircuitBreakerSettings {
            failure_threshold: 3,
            cooldown_seconds: 60,
        };
        let cfg = settings.to_resilience_config();
        assert_eq!(cfg.failure_threshold, 3);
        assert_eq!(cfg.cooldown, Duration::from_secs(60));
    }
}

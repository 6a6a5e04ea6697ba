//! # Cache Constants
//!
//! Namespace names, key layout and default operating limits shared by the
//! configuration layer and the engine.

/// Separator between the namespace and the identifier in a cache key
pub const KEY_SEPARATOR: char = ':';

/// Well-known banking namespaces
pub mod namespaces {
    pub const PROFILE: &str = "profile";
    pub const LOAN: &str = "loan";
    pub const PAYMENT: &str = "payment";
    pub const CREDIT_SCORE: &str = "creditScore";
    pub const CREDIT_ASSESSMENT: &str = "creditAssessment";
    pub const TOKEN: &str = "token";
    pub const PORTFOLIO: &str = "portfolio";
    pub const ANALYTICS: &str = "analytics";

    /// All namespaces present in the default policy table
    pub const ALL: &[&str] = &[
        PROFILE,
        LOAN,
        PAYMENT,
        CREDIT_SCORE,
        CREDIT_ASSESSMENT,
        TOKEN,
        PORTFOLIO,
        ANALYTICS,
    ];
}

/// Remote backend identifiers accepted in `remote.backend`
pub mod backends {
    pub const MEMORY: &str = "memory";
    pub const NOOP: &str = "noop";
    pub const REDIS: &str = "redis";
    pub const DRAGONFLY: &str = "dragonfly";

    pub const SUPPORTED: &[&str] = &[MEMORY, NOOP, REDIS, DRAGONFLY];
}

/// Default operating limits
pub mod defaults {
    /// Consecutive remote failures before the breaker opens
    pub const CIRCUIT_FAILURE_THRESHOLD: u32 = 1;
    /// Time the breaker stays open before calls are attempted again
    pub const CIRCUIT_COOLDOWN_SECONDS: u64 = 300;
    /// Upper bound on a single remote call
    pub const REMOTE_OPERATION_TIMEOUT_MS: u64 = 2_000;
    pub const MAINTENANCE_INTERVAL_SECONDS: u64 = 300;
    /// L1 entries inspected per maintenance tick
    pub const SWEEP_BUDGET: usize = 1_000;
    pub const WARMING_INTERVAL_SECONDS: u64 = 3_600;
    /// Remote TTL floor applied to warmed entries
    pub const WARMING_REMOTE_TTL_SECONDS: u64 = 7_200;
    pub const HEALTH_MIN_HIT_RATE: f64 = 0.5;
}

/// Environment variables
pub mod env {
    pub const ENVIRONMENT: &str = "TIERCACHE_ENV";
    pub const FALLBACK_ENVIRONMENT: &str = "APP_ENV";
    pub const LOG_FORMAT: &str = "TIERCACHE_LOG_FORMAT";
    /// Prefix for `TIERCACHE__SECTION__FIELD` overrides
    pub const CONFIG_PREFIX: &str = "TIERCACHE";
    pub const CONFIG_SEPARATOR: &str = "__";
}

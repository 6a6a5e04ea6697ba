#![allow(clippy::doc_markdown)] // Allow technical terms like Redis, Dragonfly in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # TierCache Core
//!
//! Client-side multi-level cache engine for banking services.
//!
//! ## Overview
//!
//! Every read first consults a bounded in-process store (L1), then a
//! distributed cache shared with other service instances (L2), and finally a
//! caller-supplied loader. Loaded values are written back to both tiers with
//! per-namespace capacities and TTLs.
//!
//! ## Architecture
//!
//! - **L1** ([`local`]): namespace-partitioned LRU with lazy and swept expiry
//! - **L2** ([`remote`]): pluggable backend (Redis, in-memory, no-op) behind
//!   a circuit breaker ([`resilience`]) and a per-call timeout
//! - **Policies** ([`policy`]): static namespace table resolved at start-up
//! - **Groups** ([`groups`]): advisory key groups for bulk invalidation
//! - **Statistics** ([`stats`]): hit/miss/eviction counters and health,
//!   mirrored to OpenTelemetry instruments ([`metrics`])
//! - **Engine** ([`engine`]): the façade tying the above together, plus a
//!   cancellable maintenance task
//!
//! An L2 outage never fails a read: the breaker opens, the engine serves from
//! L1 and the loader, and the remote tier is retried after the cooldown.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiercache_core::config::CacheEngineConfig;
//! use tiercache_core::engine::{CacheEngine, MaintenanceTask};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! tiercache_core::logging::init_structured_logging();
//! // once the host application has installed its meter provider
//! tiercache_core::metrics::init();
//!
//! let engine = CacheEngine::from_config(CacheEngineConfig::default()).await?;
//! let maintenance = MaintenanceTask::new(engine.clone()).spawn();
//!
//! engine.put("profile", "customer-42", b"{}".to_vec(), Some("customer:42")).await?;
//! engine.invalidate_group("customer:42").await;
//!
//! maintenance.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                  # Unit tests
//! cargo test                        # All tests
//! cargo test --features cache-redis # Include the Redis provider
//! ```

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod groups;
pub mod key;
pub mod local;
pub mod logging;
pub mod metrics;
pub mod policy;
pub mod remote;
pub mod resilience;
pub mod stats;

pub use config::{CacheEngineConfig, ConfigLoader, NamespacePolicyConfig};
pub use engine::{
    CacheEngine, CacheHealthStatus, CacheWarmer, CountSource, JsonCodec, MaintenanceHandle,
    MaintenanceReport, MaintenanceTask, PatternInvalidation, ReadOptions, ValueCodec,
    WarmingBatch,
};
pub use error::{CacheError, CacheResult, LoadError};
pub use key::CacheKey;
pub use local::CacheValue;
pub use policy::{NamespacePolicy, PolicyTable};
pub use remote::{RemoteCacheProvider, RemoteCacheService};
pub use resilience::{CircuitBreaker, CircuitState};
pub use stats::StatisticsSnapshot;

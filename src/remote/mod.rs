//! # Remote (L2) Cache Tier
//!
//! The distributed cache shared with other processes, reached through
//! [`GuardedRemote`] so that every call is protected by the circuit breaker
//! and bounded by a timeout.
//!
//! ## Backends
//!
//! - **Memory**: in-process shared store for single-node use and tests
//! - **Redis/Dragonfly**: `cache-redis` feature, `ConnectionManager` based
//! - **NoOp**: always-miss fallback when no backend is available
//! - **Custom**: any caller-supplied [`RemoteCacheService`]

pub mod glob;
pub mod guarded;
pub mod provider;
pub mod providers;
pub mod traits;

pub use glob::GlobPattern;
pub use guarded::GuardedRemote;
pub use provider::RemoteCacheProvider;
pub use providers::{MemoryCacheService, NoOpCacheService};
pub use traits::{ttl_seconds, RemoteCacheService};

#[cfg(feature = "cache-redis")]
pub use providers::RedisCacheService;

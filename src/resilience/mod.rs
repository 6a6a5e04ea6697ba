//! # Resilience Module
//!
//! Circuit breaker protecting the distributed cache tier. When the remote
//! backend degrades, the breaker opens and the engine keeps serving from the
//! local tier and the loader until the cooldown elapses.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tiercache_core::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new(
//!     "remote_cache".to_string(),
//!     CircuitBreakerConfig {
//!         failure_threshold: 1,
//!         cooldown: Duration::from_secs(300),
//!     },
//! );
//!
//! let value = breaker
//!     .call(|| async { Ok::<_, std::io::Error>("pong") })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod metrics;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
pub use metrics::CircuitBreakerMetrics;

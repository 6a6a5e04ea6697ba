//! Cache error types
//!
//! `CacheError` covers everything the engine itself can fail with. Remote
//! failures (`ConnectionError`, `Timeout`, `BackendError`) are recovered
//! locally by the engine and only surface from the remote providers; the
//! local-tier and configuration variants are returned to callers.

use crate::config::ConfigurationError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Namespace has no configured policy
    #[error("Unknown cache namespace '{0}': no policy configured")]
    UnknownNamespace(String),

    /// TTL rejected by the local store
    #[error("Invalid TTL for key '{key}': {reason}")]
    InvalidTtl { key: String, reason: String },

    /// Key pattern could not be compiled
    #[error("Invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Failed to connect to cache backend
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize cache value
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// Cache operation timed out
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    BackendError(String),

    /// Configuration could not be loaded or validated
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Internal invariant violation
    #[error("Internal cache error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Whether this error came from the distributed tier
    ///
    /// Remote failures count against the circuit breaker and are never
    /// propagated out of read/write paths.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_) | Self::Timeout(_) | Self::BackendError(_)
        )
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors returned by read-through lookups
///
/// The loader's own error type is preserved untouched so callers can match on
/// it exactly as they would without the cache in front.
#[derive(Debug, Error)]
pub enum LoadError<E> {
    /// The engine rejected the request (unknown namespace, invalid TTL, ...)
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The loader failed
    #[error("Loader failed: {0}")]
    Loader(E),

    /// The caller's deadline elapsed before a value was produced
    #[error("Lookup of '{key}' timed out after {timeout:?}")]
    TimedOut { key: String, timeout: Duration },
}

impl<E> LoadError<E> {
    /// Get the loader error if this is one
    pub fn loader_error(&self) -> Option<&E> {
        match self {
            Self::Loader(e) => Some(e),
            _ => None,
        }
    }

    /// Convert into the loader error if this is one
    pub fn into_loader_error(self) -> Option<E> {
        match self {
            Self::Loader(e) => Some(e),
            _ => None,
        }
    }
}

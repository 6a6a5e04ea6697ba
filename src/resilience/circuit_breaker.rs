//! # Circuit Breaker Implementation
//!
//! Two-state breaker for the remote cache tier:
//!
//! - **Closed**: calls pass through. After `failure_threshold` consecutive
//!   failures the breaker records the failure time and opens.
//! - **Open**: calls are skipped until `cooldown` has elapsed since the last
//!   failure, then the breaker closes and the next call runs normally.
//!
//! There is no half-open probe window. The cooldown is checked lazily on every
//! call and can also be re-evaluated from a timer via [`CircuitBreaker::evaluate_cooldown`].
//!
//! Timestamps use `tokio::time::Instant`, so a paused test clock drives the
//! cooldown deterministically.

use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Lock-free counters updated on every protected call
#[derive(Debug)]
struct AtomicCircuitBreakerMetrics {
    total_calls: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    skipped_calls: AtomicU64,
    consecutive_failures: AtomicU64,
    times_opened: AtomicU64,
    total_duration_nanos: AtomicU64,
}

impl AtomicCircuitBreakerMetrics {
    fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            skipped_calls: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            times_opened: AtomicU64::new(0),
            total_duration_nanos: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_success(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    #[inline]
    fn record_failure(&self, duration: Duration) -> u64 {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[inline]
    fn record_skip(&self) {
        self.skipped_calls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn reset_consecutive_failures(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn snapshot(&self, state: CircuitState) -> CircuitBreakerMetrics {
        let total_calls = self.total_calls.load(Ordering::Relaxed);
        let failure_count = self.failure_count.load(Ordering::Relaxed);
        let total_duration_nanos = self.total_duration_nanos.load(Ordering::Relaxed);

        let (failure_rate, average_duration) = if total_calls > 0 {
            (
                failure_count as f64 / total_calls as f64,
                Duration::from_nanos(total_duration_nanos / total_calls),
            )
        } else {
            (0.0, Duration::ZERO)
        };

        CircuitBreakerMetrics {
            total_calls,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count,
            skipped_calls: self.skipped_calls.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            times_opened: self.times_opened.load(Ordering::Relaxed),
            current_state: state,
            failure_rate,
            average_duration,
        }
    }
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - calls are skipped until the cooldown elapses
    Open = 1,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            _ => CircuitState::Open,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the call was not attempted
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation failed and was recorded
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Circuit breaker with atomic state management
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging
    name: String,

    state: AtomicU8,

    config: CircuitBreakerConfig,

    metrics: AtomicCircuitBreakerMetrics,

    /// Reference point for `last_failure_nanos`
    base: Instant,

    /// Nanos after `base` of the most recent failure, plus one (0 = none)
    last_failure_nanos: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            cooldown_seconds = config.cooldown.as_secs(),
            "Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            metrics: AtomicCircuitBreakerMetrics::new(),
            base: Instant::now(),
            last_failure_nanos: AtomicU64::new(0),
        }
    }

    /// Current state, without re-evaluating the cooldown
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Time of the most recent recorded failure
    pub fn last_failure_at(&self) -> Option<Instant> {
        match self.last_failure_nanos.load(Ordering::Acquire) {
            0 => None,
            n => Some(self.base + Duration::from_nanos(n - 1)),
        }
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.should_allow() {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();

        match &result {
            Ok(_) => self.record_success(duration),
            Err(_) => self.record_failure(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Pre-flight check for callers that record outcomes themselves
    ///
    /// Closes an open circuit whose cooldown has elapsed. A rejected call is
    /// counted as skipped.
    pub fn should_allow(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.evaluate_cooldown() {
                    true
                } else {
                    self.metrics.record_skip();
                    false
                }
            }
        }
    }

    /// Close the circuit if it is open and the cooldown has elapsed
    ///
    /// Returns `true` when the circuit is closed after the check.
    pub fn evaluate_cooldown(&self) -> bool {
        if self.state() == CircuitState::Closed {
            return true;
        }

        let Some(last_failure) = self.last_failure_at() else {
            warn!(component = %self.name, "Circuit open but no failure time recorded");
            self.transition_to_closed();
            return true;
        };

        if last_failure.elapsed() >= self.config.cooldown {
            self.transition_to_closed();
            true
        } else {
            false
        }
    }

    /// Remaining time before an open circuit will allow calls again
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        if self.state() == CircuitState::Closed {
            return None;
        }
        let last_failure = self.last_failure_at()?;
        Some(self.config.cooldown.saturating_sub(last_failure.elapsed()))
    }

    /// Record a successful operation
    pub fn record_success(&self, duration: Duration) {
        self.metrics.record_success(duration);

        debug!(
            component = %self.name,
            duration_ms = duration.as_millis(),
            "Operation succeeded"
        );

        if self.state() == CircuitState::Closed {
            self.metrics.reset_consecutive_failures();
        }
    }

    /// Record a failed operation
    pub fn record_failure(&self, duration: Duration) {
        let failures = self.metrics.record_failure(duration);
        self.mark_failure_time();

        error!(
            component = %self.name,
            duration_ms = duration.as_millis(),
            consecutive_failures = failures,
            "Operation failed"
        );

        if self.state() == CircuitState::Closed && failures >= self.config.failure_threshold as u64
        {
            self.transition_to_open();
        }
    }

    fn mark_failure_time(&self) {
        let offset = self.base.elapsed().as_nanos() as u64;
        self.last_failure_nanos
            .store(offset.saturating_add(1), Ordering::Release);
    }

    fn transition_to_closed(&self) {
        self.metrics.reset_consecutive_failures();
        if self
            .state
            .compare_exchange(
                CircuitState::Open as u8,
                CircuitState::Closed as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            info!(
                component = %self.name,
                total_calls = self.metrics.total_calls.load(Ordering::Relaxed),
                "Circuit breaker closed (cooldown elapsed)"
            );
        }
    }

    fn transition_to_open(&self) {
        if self
            .state
            .compare_exchange(
                CircuitState::Closed as u8,
                CircuitState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.metrics.times_opened.fetch_add(1, Ordering::Relaxed);
            error!(
                component = %self.name,
                consecutive_failures = self.metrics.consecutive_failures.load(Ordering::Relaxed),
                failure_threshold = self.config.failure_threshold,
                cooldown_seconds = self.config.cooldown.as_secs(),
                "Circuit breaker opened (skipping remote calls)"
            );
        }
    }

    /// Force circuit to open state
    pub fn force_open(&self) {
        warn!(component = %self.name, "Circuit breaker forced open");
        self.mark_failure_time();
        self.transition_to_open();
    }

    /// Force circuit to closed state
    pub fn force_closed(&self) {
        warn!(component = %self.name, "Circuit breaker forced closed");
        self.transition_to_closed();
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.metrics.snapshot(self.state())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Closed and not failing on more than 10% of calls
    pub fn is_healthy(&self) -> bool {
        if self.state() != CircuitState::Closed {
            return false;
        }

        let total_calls = self.metrics.total_calls.load(Ordering::Relaxed);
        if total_calls < 10 {
            return true;
        }

        let failure_count = self.metrics.failure_count.load(Ordering::Relaxed);
        (failure_count as f64 / total_calls as f64) < 0.1
    }
}

//! # Circuit Breaker Metrics
//!
//! Point-in-time view of a breaker's counters, suitable for health reports
//! and structured logs.

use crate::resilience::CircuitState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metrics for a single circuit breaker instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Calls that were allowed through and executed
    pub total_calls: u64,

    pub success_count: u64,

    pub failure_count: u64,

    /// Calls rejected because the circuit was open
    pub skipped_calls: u64,

    /// Current consecutive failure count
    pub consecutive_failures: u64,

    /// Number of Closed -> Open transitions
    pub times_opened: u64,

    pub current_state: CircuitState,

    /// Calculated failure rate (0.0 to 1.0)
    pub failure_rate: f64,

    /// Average duration of executed calls
    pub average_duration: Duration,
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            skipped_calls: 0,
            consecutive_failures: 0,
            times_opened: 0,
            current_state: CircuitState::Closed,
            failure_rate: 0.0,
            average_duration: Duration::ZERO,
        }
    }
}

//! # Circuit Breaker Configuration
//!
//! Runtime configuration for a single breaker. File-level settings live in
//! `crate::config::CircuitBreakerSettings` and convert into this type.

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time the circuit stays open after the last failure
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: defaults::CIRCUIT_FAILURE_THRESHOLD,
            cooldown: Duration::from_secs(defaults::CIRCUIT_COOLDOWN_SECONDS),
        }
    }
}

impl CircuitBreakerConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.cooldown.is_zero() {
            return Err("cooldown must be greater than 0".to_string());
        }

        Ok(())
    }
}

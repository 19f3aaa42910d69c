//! Circuit breakers for endpoint-level fast-fail behavior
//!
//! One breaker per endpoint key, created lazily on first reference and
//! shared by every concurrent call to that endpoint.
//!
//! States:
//! - Closed: Normal operation, calls pass through
//! - Open: Endpoint is failing, calls are rejected immediately
//! - Half-Open: A bounded number of probe calls test recovery
//!
//! ```text
//! Closed   → Open:      failures within failure_window_ms reach failure_threshold
//! Open     → HalfOpen:  first admission check after recovery_timeout_ms
//! HalfOpen → Closed:    successes recorded in HalfOpen reach success_threshold
//! HalfOpen → Open:      any single failure, or a probe dropped unsettled
//! ```

mod breaker;
mod permit;


pub use breaker::{Admission, CircuitBreaker};
pub use permit::AttemptPermit;

use bulwark_types::{CircuitBreakerConfig, CircuitBreakerStats, CircuitBreakerSummary, CircuitState};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};

/// Owns one [`CircuitBreaker`] per endpoint key.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    overrides: HashMap<String, CircuitBreakerConfig>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self { default_config: config, overrides: HashMap::new(), breakers: DashMap::new(), clock }
    }

    /// Per-endpoint configs that replace the default for matching keys.
    #[must_use]
    pub fn with_overrides(mut self, overrides: HashMap<String, CircuitBreakerConfig>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn config_for(&self, endpoint: &str) -> CircuitBreakerConfig {
        self.overrides.get(endpoint).copied().unwrap_or(self.default_config)
    }

    /// Breaker for `endpoint`, created on first reference.
    pub fn get(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(endpoint) {
            return Arc::clone(existing.value());
        }
        let entry = self.breakers.entry(endpoint.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(endpoint, self.config_for(endpoint), Arc::clone(&self.clock)))
        });
        Arc::clone(entry.value())
    }

    /// Current state without creating a breaker; unknown endpoints are CLOSED.
    pub fn get_state(&self, endpoint: &str) -> CircuitState {
        self.breakers.get(endpoint).map_or(CircuitState::Closed, |b| b.state())
    }

    pub fn stats(&self) -> HashMap<String, CircuitBreakerStats> {
        self.breakers.iter().map(|entry| (entry.key().clone(), entry.value().stats())).collect()
    }

    pub fn summary(&self) -> CircuitBreakerSummary {
        let mut summary = CircuitBreakerSummary::default();
        for entry in self.breakers.iter() {
            let breaker = entry.value();
            match breaker.state() {
                CircuitState::Closed => summary.closed += 1,
                CircuitState::Open => summary.open += 1,
                CircuitState::HalfOpen => summary.half_open += 1,
            }
            summary.total_trips += breaker.trips();
        }
        summary
    }

    /// Reset one endpoint's breaker. Returns false if it was never created.
    pub fn reset(&self, endpoint: &str) -> bool {
        match self.breakers.get(endpoint) {
            Some(breaker) => {
                breaker.reset();
                true
            },
            None => false,
        }
    }

    /// Reset every breaker in place; in-flight calls holding a breaker see the reset.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

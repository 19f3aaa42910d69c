//! Read-only introspection models for health and ops tooling.

use serde::{Deserialize, Serialize};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed,
    /// Endpoint is failing - calls are rejected immediately
    Open,
    /// Testing recovery - a limited number of probe calls pass
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Snapshot of one endpoint's circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failures_in_window: usize,
    pub successes_in_window: usize,
    pub half_open_attempts_used: u32,
    pub total_requests: u64,
    pub ms_since_state_change: u64,
    /// Remaining OPEN time before a probe is admitted; 0 unless OPEN
    pub retry_in_ms: u64,
}

/// Summary of circuit breaker states across all endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerSummary {
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
    pub total_trips: u64,
}

/// Snapshot of one retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetStats {
    pub used_in_window: usize,
    pub max_retries: u32,
    pub remaining: u32,
    pub window_ms: u64,
    pub exhaustion_count: u64,
    /// Time since the budget last denied a retry, if it ever has
    pub ms_since_exhausted: Option<u64>,
}

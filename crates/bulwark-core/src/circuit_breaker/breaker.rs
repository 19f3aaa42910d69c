//! Single-endpoint circuit breaker state machine.

use bulwark_types::{CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::permit::AttemptPermit;
use crate::clock::Clock;
use crate::telemetry;
use crate::window::EventWindow;

/// Floor for the per-breaker event history so stats stay meaningful when
/// thresholds are small.
const MIN_HISTORY_CAPACITY: usize = 256;

/// How [`CircuitBreaker::admit`] let a call through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed, no slot held
    Normal,
    /// Holds one HALF_OPEN probe slot
    Probe {
        /// HALF_OPEN cycle the probe was admitted in
        cycle: u64,
    },
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: EventWindow,
    successes: EventWindow,
    last_state_change_at: u64,
    half_open_attempts_used: u32,
    total_requests: u64,
    trips: u64,
    /// Entries into HALF_OPEN; survives reset so stale probes never match
    half_open_cycle: u64,
}

impl BreakerInner {
    fn new(config: &CircuitBreakerConfig, now_ms: u64) -> Self {
        let capacity = (config.failure_threshold.max(config.success_threshold) as usize)
            .max(MIN_HISTORY_CAPACITY);
        Self {
            state: CircuitState::Closed,
            failures: EventWindow::new(config.failure_window_ms, capacity),
            successes: EventWindow::new(config.failure_window_ms, capacity),
            last_state_change_at: now_ms,
            half_open_attempts_used: 0,
            total_requests: 0,
            trips: 0,
            half_open_cycle: 0,
        }
    }
}

/// Failure-rate circuit breaker guarding one endpoint.
///
/// All read-modify-write sequences run under one mutex, so concurrent
/// callers cannot both observe a stale count and cross a threshold twice.
#[derive(Debug)]
pub struct CircuitBreaker {
    endpoint: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(endpoint: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_ms();
        Self {
            endpoint: endpoint.into(),
            inner: Mutex::new(BreakerInner::new(&config, now)),
            config,
            clock,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Whether a call may proceed. Consumes a probe slot in HALF_OPEN.
    pub fn can_attempt(&self) -> bool {
        self.admit().is_ok()
    }

    /// Admission check with the reason for a rejection.
    ///
    /// Returns `Err(retry_in_ms)` when blocked: the remaining OPEN time, or 0
    /// when HALF_OPEN has no probe slots left.
    pub fn admit(&self) -> Result<Admission, u64> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = now.saturating_sub(inner.last_state_change_at);
                if elapsed < self.config.recovery_timeout_ms {
                    return Err(self.config.recovery_timeout_ms - elapsed);
                }
                debug!(
                    endpoint = %self.endpoint,
                    elapsed_ms = elapsed,
                    "Circuit breaker recovery timeout elapsed"
                );
                self.transition(&mut inner, CircuitState::HalfOpen, now);
                self.take_probe_slot(&mut inner)
            },
            CircuitState::HalfOpen => self.take_probe_slot(&mut inner),
        }
    }

    /// Like [`admit`](Self::admit), but the admission is held by a permit
    /// that must be settled with the call's outcome.
    pub fn try_acquire(&self) -> Result<AttemptPermit<'_>, u64> {
        self.admit().map(|admission| AttemptPermit::new(self, admission))
    }

    pub fn record_success(&self) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();

        inner.total_requests += 1;
        inner.successes.record(now);

        match inner.state {
            CircuitState::HalfOpen => {
                let successes = inner.successes.count(now);
                if successes >= self.config.success_threshold as usize {
                    info!(
                        endpoint = %self.endpoint,
                        successes,
                        "Circuit breaker closing - endpoint recovered"
                    );
                    self.transition(&mut inner, CircuitState::Closed, now);
                }
            },
            CircuitState::Open => {
                debug!(endpoint = %self.endpoint, "Success recorded while open");
            },
            CircuitState::Closed => {},
        }
    }

    pub fn record_failure(&self) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();

        inner.total_requests += 1;
        inner.failures.record(now);

        match inner.state {
            CircuitState::Closed => {
                let failures = inner.failures.count(now);
                if failures >= self.config.failure_threshold as usize {
                    warn!(
                        endpoint = %self.endpoint,
                        failures,
                        window_ms = self.config.failure_window_ms,
                        "Circuit breaker opening - too many failures"
                    );
                    self.transition(&mut inner, CircuitState::Open, now);
                }
            },
            CircuitState::HalfOpen => {
                warn!(
                    endpoint = %self.endpoint,
                    "Circuit breaker re-opening - failure during half-open"
                );
                self.transition(&mut inner, CircuitState::Open, now);
            },
            CircuitState::Open => {},
        }
    }

    /// An admitted call ended without an outcome, e.g. its future was
    /// dropped by a caller-side timeout.
    ///
    /// A lost probe counts as a failed probe and re-opens the circuit, unless
    /// the breaker already left that HALF_OPEN cycle. Lost CLOSED calls are
    /// ignored.
    pub fn record_abandoned(&self, admission: Admission) {
        let Admission::Probe { cycle } = admission else {
            return;
        };
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::HalfOpen && inner.half_open_cycle == cycle {
            warn!(
                endpoint = %self.endpoint,
                "Circuit breaker re-opening - half-open probe abandoned"
            );
            self.transition(&mut inner, CircuitState::Open, now);
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Number of transitions into OPEN since construction or the last reset.
    pub fn trips(&self) -> u64 {
        self.inner.lock().trips
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let since_change = now.saturating_sub(inner.last_state_change_at);
        let retry_in_ms = if inner.state == CircuitState::Open {
            self.config.recovery_timeout_ms.saturating_sub(since_change)
        } else {
            0
        };

        CircuitBreakerStats {
            state: inner.state,
            failures_in_window: inner.failures.count(now),
            successes_in_window: inner.successes.count(now),
            half_open_attempts_used: inner.half_open_attempts_used,
            total_requests: inner.total_requests,
            ms_since_state_change: since_change,
            retry_in_ms,
        }
    }

    /// Force CLOSED and clear all history and counters.
    pub fn reset(&self) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let previous = inner.state;
        info!(
            endpoint = %self.endpoint,
            previous_state = ?previous,
            "Circuit breaker reset manually"
        );
        if previous != CircuitState::Closed {
            telemetry::record_transition(&self.endpoint, previous, CircuitState::Closed);
        }
        let half_open_cycle = inner.half_open_cycle;
        *inner = BreakerInner::new(&self.config, now);
        inner.half_open_cycle = half_open_cycle;
    }

    fn take_probe_slot(&self, inner: &mut BreakerInner) -> Result<Admission, u64> {
        if inner.half_open_attempts_used < self.config.half_open_max_attempts {
            inner.half_open_attempts_used += 1;
            debug!(
                endpoint = %self.endpoint,
                used = inner.half_open_attempts_used,
                max = self.config.half_open_max_attempts,
                "Half-open probe admitted"
            );
            Ok(Admission::Probe { cycle: inner.half_open_cycle })
        } else {
            Err(0)
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState, now: u64) {
        let from = inner.state;
        inner.state = to;
        inner.last_state_change_at = now;

        match to {
            CircuitState::Open => {
                inner.trips += 1;
                inner.successes.clear();
            },
            CircuitState::HalfOpen => {
                inner.half_open_cycle += 1;
                inner.half_open_attempts_used = 0;
                inner.successes.clear();
            },
            CircuitState::Closed => {
                inner.failures.clear();
                inner.successes.clear();
            },
        }

        info!(
            endpoint = %self.endpoint,
            from = ?from,
            to = ?to,
            "Circuit breaker state change"
        );
        telemetry::record_transition(&self.endpoint, from, to);
    }
}

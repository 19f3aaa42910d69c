//! Delay computation between retry attempts.
//!
//! Exponential growth from the policy's base delay, capped at its maximum,
//! spread by symmetric jitter. A server-supplied `Retry-After` hint takes
//! precedence when the policy respects it, clamped to the same maximum.

mod jitter;
mod retry_after;


pub use jitter::{FixedJitter, JitterSource, ThreadRngJitter};
pub use retry_after::parse_retry_after_at;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::policy::RetryPolicy;

/// Where a retry delay came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelaySource {
    HeaderSeconds,
    HeaderDate,
    Exponential,
}

impl DelaySource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HeaderSeconds => "header-seconds",
            Self::HeaderDate => "header-date",
            Self::Exponential => "exponential",
        }
    }
}

impl fmt::Display for DelaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryDelay {
    pub delay_ms: u64,
    pub source: DelaySource,
}

#[derive(Debug, Clone)]
pub struct BackoffCalculator {
    jitter: Arc<dyn JitterSource>,
    clock: Arc<dyn Clock>,
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffCalculator {
    pub fn new() -> Self {
        Self::with_sources(Arc::new(ThreadRngJitter), Arc::new(SystemClock::new()))
    }

    pub fn with_sources(jitter: Arc<dyn JitterSource>, clock: Arc<dyn Clock>) -> Self {
        Self { jitter, clock }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// The result lies in `[0, max_delay_ms * (1 + jitter_factor)]`.
    pub fn compute_delay(&self, attempt: u32, policy: &RetryPolicy) -> u64 {
        let exponential = policy.base_delay_ms.saturating_mul(2_u64.saturating_pow(attempt));
        let capped = exponential.min(policy.max_delay_ms);

        let spread = capped as f64 * policy.jitter_factor;
        let offset = (self.jitter.next_unit() * 2.0 - 1.0) * spread;
        (capped as f64 + offset).round().max(0.0) as u64
    }

    /// Parse a `Retry-After` value against this calculator's wall clock.
    pub fn parse_retry_after(&self, value: Option<&str>) -> Option<RetryDelay> {
        parse_retry_after_at(value, self.clock.wall_clock())
    }

    /// Server hint when the policy allows it, exponential backoff otherwise.
    pub fn resolve_delay(&self, attempt: u32, policy: &RetryPolicy, retry_after: Option<&str>) -> RetryDelay {
        if policy.respect_retry_after {
            if let Some(hint) = self.parse_retry_after(retry_after) {
                return RetryDelay { delay_ms: hint.delay_ms.min(policy.max_delay_ms), source: hint.source };
            }
        }
        RetryDelay { delay_ms: self.compute_delay(attempt, policy), source: DelaySource::Exponential }
    }
}

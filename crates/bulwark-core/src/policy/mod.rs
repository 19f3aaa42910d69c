//! Retry policies and their routing.
//!
//! A [`RetryPolicy`] is an immutable value shared by every endpoint routed to
//! it. [`RetryPolicyTable`] maps endpoints to named presets and forces
//! non-idempotent operations onto [`PolicyName::None`].

mod classifier;
mod table;


pub use classifier::{classify_operation, derive_endpoint, OperationKind, ANONYMOUS_ENDPOINT};
pub use table::RetryPolicyTable;

use bulwark_types::{ErrorKind, PolicyDefaults, PolicyName};
use serde::Serialize;
use std::collections::HashSet;

/// Attempt count of the AGGRESSIVE preset.
pub const AGGRESSIVE_MAX_ATTEMPTS: u32 = 5;

/// Attempt count of the CAUTIOUS preset.
pub const CAUTIOUS_MAX_ATTEMPTS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetryPolicy {
    pub name: PolicyName,
    /// Total invocations allowed, first attempt included. 0 means the
    /// operation runs once with no breaker or budget involvement.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
    pub retriable_error_kinds: HashSet<ErrorKind>,
    pub respect_retry_after: bool,
}

impl RetryPolicy {
    pub fn aggressive(defaults: &PolicyDefaults) -> Self {
        Self { name: PolicyName::Aggressive, max_attempts: AGGRESSIVE_MAX_ATTEMPTS, ..Self::standard(defaults) }
    }

    pub fn standard(defaults: &PolicyDefaults) -> Self {
        Self {
            name: PolicyName::Standard,
            max_attempts: defaults.standard_max_attempts,
            base_delay_ms: defaults.base_delay_ms,
            max_delay_ms: defaults.max_delay_ms,
            jitter_factor: defaults.jitter_factor,
            retriable_error_kinds: ErrorKind::DEFAULT_RETRIABLE.into_iter().collect(),
            respect_retry_after: defaults.respect_retry_after,
        }
    }

    pub fn cautious(defaults: &PolicyDefaults) -> Self {
        let base_delay_ms = defaults.base_delay_ms.saturating_mul(2);
        Self {
            name: PolicyName::Cautious,
            max_attempts: CAUTIOUS_MAX_ATTEMPTS,
            base_delay_ms,
            max_delay_ms: defaults.max_delay_ms.max(base_delay_ms),
            ..Self::standard(defaults)
        }
    }

    pub fn none() -> Self {
        Self {
            name: PolicyName::None,
            max_attempts: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_factor: 0.0,
            retriable_error_kinds: HashSet::new(),
            respect_retry_after: false,
        }
    }

    pub fn preset(name: PolicyName, defaults: &PolicyDefaults) -> Self {
        match name {
            PolicyName::Aggressive => Self::aggressive(defaults),
            PolicyName::Standard => Self::standard(defaults),
            PolicyName::Cautious => Self::cautious(defaults),
            PolicyName::None => Self::none(),
        }
    }

    #[inline]
    pub fn is_retriable(&self, kind: ErrorKind) -> bool {
        self.retriable_error_kinds.contains(&kind)
    }

    /// True when the fast path applies: one invocation, no breaker or budget.
    pub fn is_single_shot(&self) -> bool {
        self.max_attempts == 0
    }
}

/// Whether `kind` is in the policy's retriable set.
pub fn is_retriable_error(kind: ErrorKind, policy: &RetryPolicy) -> bool {
    policy.is_retriable(kind)
}

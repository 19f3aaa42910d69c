//! Resilience configuration.
//!
//! Every field has a documented default and can be overridden per
//! construction or through a JSON config file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::{Validate, ValidationError};

/// Multiplier applied to the per-endpoint budget capacity to size the
/// shared global budget.
pub const GLOBAL_BUDGET_MULTIPLIER: u32 = 3;

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_probe_capacity"))]
pub struct CircuitBreakerConfig {
    /// Failures within the trailing window that open the circuit
    #[validate(range(min = 1_u32))]
    pub failure_threshold: u32,
    /// Trailing window used to count failures and successes
    #[validate(range(min = 1_u64))]
    pub failure_window_ms: u64,
    /// Time spent OPEN before a probe is admitted
    pub recovery_timeout_ms: u64,
    /// Successes in HALF_OPEN required to close the circuit
    #[validate(range(min = 1_u32))]
    pub success_threshold: u32,
    /// Probe calls admitted while HALF_OPEN
    #[validate(range(min = 1_u32))]
    pub half_open_max_attempts: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window_ms: 60_000,
            recovery_timeout_ms: 30_000,
            success_threshold: 2,
            half_open_max_attempts: 3,
        }
    }
}

/// HALF_OPEN must admit enough probes to reach the success threshold.
fn validate_probe_capacity(config: &CircuitBreakerConfig) -> Result<(), ValidationError> {
    if config.success_threshold > config.half_open_max_attempts {
        let mut err = ValidationError::new("probe_capacity");
        err.message = Some("success_threshold must not exceed half_open_max_attempts".into());
        return Err(err);
    }
    Ok(())
}

/// Retry budget configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct RetryBudgetConfig {
    /// Retries permitted within the trailing window
    pub max_retries: u32,
    /// Trailing window length
    #[validate(range(min = 1_u64))]
    pub window_ms: u64,
}

impl Default for RetryBudgetConfig {
    fn default() -> Self {
        Self { max_retries: 10, window_ms: 60_000 }
    }
}

impl RetryBudgetConfig {
    /// Config for the shared global budget derived from this per-endpoint default.
    pub fn global(&self) -> Self {
        Self {
            max_retries: self.max_retries.saturating_mul(GLOBAL_BUDGET_MULTIPLIER),
            window_ms: self.window_ms,
        }
    }
}

/// Named retry policy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyName {
    /// Five attempts for cheap, highly idempotent reads
    Aggressive,
    /// Configurable default attempt count
    #[default]
    Standard,
    /// Single attempt with a doubled base delay
    Cautious,
    /// No retry at all; used for non-idempotent operations
    None,
}

impl PolicyName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aggressive => "AGGRESSIVE",
            Self::Standard => "STANDARD",
            Self::Cautious => "CAUTIOUS",
            Self::None => "NONE",
        }
    }
}

/// Knobs shared by the policy presets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_delay_bounds"))]
pub struct PolicyDefaults {
    /// Attempt count of the STANDARD preset
    #[validate(range(min = 1_u32, max = 20_u32))]
    pub standard_max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound applied before jitter
    pub max_delay_ms: u64,
    /// Jitter spread as a fraction of the capped delay
    #[validate(range(min = 0.0, max = 1.0))]
    pub jitter_factor: f64,
    /// Honor server-supplied Retry-After hints
    pub respect_retry_after: bool,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            standard_max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_factor: 0.1,
            respect_retry_after: true,
        }
    }
}

fn validate_delay_bounds(defaults: &PolicyDefaults) -> Result<(), ValidationError> {
    if defaults.base_delay_ms > defaults.max_delay_ms {
        let mut err = ValidationError::new("delay_bounds");
        err.message = Some("base_delay_ms must not exceed max_delay_ms".into());
        return Err(err);
    }
    Ok(())
}

/// Per-endpoint overrides of the breaker and budget defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct EndpointOverride {
    #[validate(nested)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
    #[validate(nested)]
    pub retry_budget: Option<RetryBudgetConfig>,
}

/// Full resilience configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct ResilienceConfig {
    #[validate(nested)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[validate(nested)]
    pub retry_budget: RetryBudgetConfig,
    #[validate(nested)]
    pub policy: PolicyDefaults,
    /// Static endpoint → policy routing; unmapped endpoints use STANDARD
    pub endpoint_policies: HashMap<String, PolicyName>,
    #[validate(nested)]
    pub endpoint_overrides: HashMap<String, EndpointOverride>,
}

impl ResilienceConfig {
    pub fn breaker_overrides(&self) -> HashMap<String, CircuitBreakerConfig> {
        self.endpoint_overrides
            .iter()
            .filter_map(|(endpoint, o)| o.circuit_breaker.map(|c| (endpoint.clone(), c)))
            .collect()
    }

    pub fn budget_overrides(&self) -> HashMap<String, RetryBudgetConfig> {
        self.endpoint_overrides
            .iter()
            .filter_map(|(endpoint, o)| o.retry_budget.map(|c| (endpoint.clone(), c)))
            .collect()
    }
}

//! Metric emission through the `metrics` facade.
//!
//! The library never installs a recorder; without one these calls are no-ops.

use bulwark_types::CircuitState;
use metrics::counter;

pub(crate) const CIRCUIT_TRANSITIONS: &str = "bulwark_circuit_transitions_total";
pub(crate) const RETRIES: &str = "bulwark_retries_total";
pub(crate) const BUDGET_EXHAUSTED: &str = "bulwark_budget_exhausted_total";
pub(crate) const CALLS: &str = "bulwark_calls_total";

pub(crate) fn record_transition(endpoint: &str, from: CircuitState, to: CircuitState) {
    counter!(
        CIRCUIT_TRANSITIONS,
        "endpoint" => endpoint.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub(crate) fn record_retry(endpoint: &str, source: &'static str) {
    counter!(RETRIES, "endpoint" => endpoint.to_string(), "source" => source).increment(1);
}

pub(crate) fn record_budget_exhausted(endpoint: &str, scope: &'static str) {
    counter!(BUDGET_EXHAUSTED, "endpoint" => endpoint.to_string(), "scope" => scope).increment(1);
}

pub(crate) fn record_call(endpoint: &str, outcome: &'static str) {
    counter!(CALLS, "endpoint" => endpoint.to_string(), "outcome" => outcome).increment(1);
}

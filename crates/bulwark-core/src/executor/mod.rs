//! Retry orchestration for one logical call.
//!
//! ```text
//! resolve policy ─► breaker admit ─► invoke ─► success ─► record, return
//!                        ▲                  └► failure ─► record, retriable?
//!                        │                                   │ yes, attempts left
//!                        └── sleep ◄── backoff ◄── budget (global, endpoint)
//! ```
//!
//! Breakers and budgets are shared by every call to the same endpoint. The
//! backoff sleep is the only suspension point; all breaker and budget
//! bookkeeping happens synchronously around it.

mod context;
mod outcome;

#[cfg(test)]
mod tests;

pub use context::RetryEvent;
pub use outcome::{Classify, RetryError, RetryOutcome};

use bulwark_types::{
    BudgetStats, CircuitBreakerStats, CircuitBreakerSummary, ConfigError, ResilienceConfig,
};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::backoff::{BackoffCalculator, JitterSource, RetryDelay, ThreadRngJitter};
use crate::budget::RetryBudgetRegistry;
use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::clock::{Clock, SystemClock};
use crate::policy::{classify_operation, derive_endpoint, OperationKind, RetryPolicyTable};
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::telemetry;
use context::RetryContext;

/// Callback invoked before each backoff sleep.
pub type RetryListener = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

pub struct RetryExecutor {
    policies: RetryPolicyTable,
    breakers: Arc<CircuitBreakerRegistry>,
    budgets: Arc<RetryBudgetRegistry>,
    backoff: BackoffCalculator,
    sleeper: Arc<dyn Sleeper>,
    on_retry: Option<RetryListener>,
}

impl fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("policies", &self.policies)
            .field("breakers", &self.breakers.len())
            .field("sleeper", &self.sleeper)
            .field("on_retry", &self.on_retry.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutor {
    /// Executor with default configuration, the system clock and tokio timers.
    pub fn new() -> Self {
        RetryExecutorBuilder::default().assemble()
    }

    pub fn builder() -> RetryExecutorBuilder {
        RetryExecutorBuilder::default()
    }

    /// Run `operation` against `endpoint` as an idempotent query.
    ///
    /// The endpoint key comes first so the closure, usually the longest
    /// argument, trails the call. `operation` is invoked once per attempt.
    /// Dropping the returned future mid-attempt (e.g. under
    /// `tokio::time::timeout`) is safe: a held half-open probe slot is
    /// reported as a failed probe.
    pub async fn execute<T, E, F, Fut>(&self, endpoint: &str, operation: F) -> RetryOutcome<T, E>
    where
        E: Classify,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run(endpoint, OperationKind::Query, operation).await
    }

    /// Classify `operation_text`, derive its endpoint key, then run the loop.
    ///
    /// Mutations and subscriptions run exactly once.
    pub async fn execute_operation<T, E, F, Fut>(&self, operation_text: &str, operation: F) -> RetryOutcome<T, E>
    where
        E: Classify,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let kind = classify_operation(operation_text);
        let endpoint = derive_endpoint(operation_text);
        self.run(&endpoint, kind, operation).await
    }

    async fn run<T, E, F, Fut>(&self, endpoint: &str, kind: OperationKind, mut operation: F) -> RetryOutcome<T, E>
    where
        E: Classify,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let policy = self.policies.resolve(endpoint, kind);

        if policy.is_single_shot() {
            debug!(endpoint, operation = %kind, "Single-shot policy, running without retry");
            let result = operation().await.map_err(RetryError::Upstream);
            telemetry::record_call(endpoint, if result.is_ok() { "success" } else { "failure" });
            return RetryOutcome { result, attempts: 1, total_delay_ms: 0 };
        }

        let breaker = self.breakers.get(endpoint);
        let mut ctx = RetryContext::new(endpoint, kind, policy);

        loop {
            let permit = match breaker.try_acquire() {
                Ok(permit) => permit,
                Err(retry_in_ms) => {
                    warn!(
                        endpoint,
                        attempt = ctx.attempt,
                        retry_in_ms,
                        "Circuit open, rejecting call"
                    );
                    telemetry::record_call(endpoint, "circuit_open");
                    let error = RetryError::CircuitOpen { endpoint: endpoint.to_string(), retry_in_ms };
                    return ctx.finish(Err(error), ctx.attempt);
                },
            };

            // Dropping this future mid-call drops the permit unsettled.
            let error = match operation().await {
                Ok(value) => {
                    permit.success();
                    telemetry::record_call(endpoint, "success");
                    return ctx.finish(Ok(value), ctx.attempt + 1);
                },
                Err(error) => {
                    permit.failure();
                    error
                },
            };

            let delay = match self.plan_retry(&mut ctx, error) {
                Ok(delay) => delay,
                Err(error) => return ctx.finish(Err(error), ctx.attempt + 1),
            };

            self.sleeper.sleep(Duration::from_millis(delay.delay_ms)).await;
            ctx.attempt += 1;
        }
    }

    /// Bookkeeping after a failed attempt, once the breaker has seen it.
    /// Returns the delay before the next attempt, or the error that ends the
    /// loop.
    fn plan_retry<E: Classify>(&self, ctx: &mut RetryContext<'_>, error: E) -> Result<RetryDelay, RetryError<E>> {
        let kind = error.kind();

        if !ctx.policy.is_retriable(kind) || ctx.is_last_attempt() {
            debug!(
                endpoint = ctx.endpoint,
                attempts = ctx.attempt + 1,
                error_kind = %kind,
                retriable = ctx.policy.is_retriable(kind),
                "Giving up"
            );
            telemetry::record_call(ctx.endpoint, "failure");
            return Err(RetryError::Upstream(error));
        }

        if let Err(scope) = self.budgets.try_consume(ctx.endpoint) {
            telemetry::record_call(ctx.endpoint, "budget_exhausted");
            return Err(RetryError::BudgetExhausted {
                endpoint: ctx.endpoint.to_string(),
                scope,
                last_error: error,
            });
        }

        let delay = self.backoff.resolve_delay(ctx.attempt, &ctx.policy, error.retry_after());
        ctx.total_delay_ms = ctx.total_delay_ms.saturating_add(delay.delay_ms);

        info!(
            endpoint = ctx.endpoint,
            attempt = ctx.attempt + 1,
            max_attempts = ctx.policy.max_attempts,
            error_kind = %kind,
            delay_ms = delay.delay_ms,
            source = %delay.source,
            "Retrying after failure"
        );
        telemetry::record_retry(ctx.endpoint, delay.source.as_str());

        if let Some(listener) = &self.on_retry {
            let event = RetryEvent {
                endpoint: ctx.endpoint.to_string(),
                operation: ctx.operation,
                attempt: ctx.attempt + 1,
                error_kind: kind,
                delay_ms: delay.delay_ms,
                delay_source: delay.source,
                total_delay_ms: ctx.total_delay_ms,
            };
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                warn!(endpoint = ctx.endpoint, "Retry listener panicked, continuing");
            }
        }

        Ok(delay)
    }

    pub fn policies(&self) -> &RetryPolicyTable {
        &self.policies
    }

    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn retry_budgets(&self) -> &Arc<RetryBudgetRegistry> {
        &self.budgets
    }

    pub fn get_circuit_breaker_stats(&self) -> HashMap<String, CircuitBreakerStats> {
        self.breakers.stats()
    }

    pub fn get_circuit_breaker_summary(&self) -> CircuitBreakerSummary {
        self.breakers.summary()
    }

    /// Per-endpoint budget stats; the global budget is keyed `"*"`.
    pub fn get_retry_budget_stats(&self) -> HashMap<String, BudgetStats> {
        self.budgets.stats()
    }

    pub fn reset_circuit_breakers(&self) {
        info!("Resetting all circuit breakers");
        self.breakers.reset_all();
    }

    pub fn reset_circuit_breaker(&self, endpoint: &str) -> bool {
        self.breakers.reset(endpoint)
    }

    pub fn reset_retry_budgets(&self) {
        info!("Resetting all retry budgets");
        self.budgets.reset_all();
    }
}

/// Builder for [`RetryExecutor`].
///
/// Registries passed in explicitly are used as-is, so several executors can
/// share breaker and budget state. Otherwise they are built from the config.
#[derive(Default)]
pub struct RetryExecutorBuilder {
    config: ResilienceConfig,
    clock: Option<Arc<dyn Clock>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    jitter: Option<Arc<dyn JitterSource>>,
    policies: Option<RetryPolicyTable>,
    breakers: Option<Arc<CircuitBreakerRegistry>>,
    budgets: Option<Arc<RetryBudgetRegistry>>,
    on_retry: Option<RetryListener>,
}

impl RetryExecutorBuilder {
    #[must_use]
    pub fn config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    #[must_use]
    pub fn jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = Some(jitter);
        self
    }

    #[must_use]
    pub fn policies(mut self, policies: RetryPolicyTable) -> Self {
        self.policies = Some(policies);
        self
    }

    #[must_use]
    pub fn circuit_breakers(mut self, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    #[must_use]
    pub fn retry_budgets(mut self, budgets: Arc<RetryBudgetRegistry>) -> Self {
        self.budgets = Some(budgets);
        self
    }

    /// Listener called before each backoff sleep. Panics inside it are
    /// caught and logged.
    #[must_use]
    pub fn on_retry(mut self, listener: impl Fn(&RetryEvent) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(listener));
        self
    }

    /// Validate the config and build the executor.
    pub fn build(self) -> Result<RetryExecutor, ConfigError> {
        self.config.validate().map_err(|e| ConfigError::from_validation_errors(&e))?;
        Ok(self.assemble())
    }

    fn assemble(self) -> RetryExecutor {
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let jitter: Arc<dyn JitterSource> = self.jitter.unwrap_or_else(|| Arc::new(ThreadRngJitter));
        let config = self.config;

        let breakers = self.breakers.unwrap_or_else(|| {
            Arc::new(
                CircuitBreakerRegistry::with_clock(config.circuit_breaker, Arc::clone(&clock))
                    .with_overrides(config.breaker_overrides()),
            )
        });
        let budgets = self.budgets.unwrap_or_else(|| {
            Arc::new(
                RetryBudgetRegistry::with_clock(config.retry_budget, Arc::clone(&clock))
                    .with_overrides(config.budget_overrides()),
            )
        });

        RetryExecutor {
            policies: self.policies.unwrap_or_else(|| RetryPolicyTable::from_config(&config)),
            breakers,
            budgets,
            backoff: BackoffCalculator::with_sources(jitter, clock),
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
            on_retry: self.on_retry,
        }
    }
}

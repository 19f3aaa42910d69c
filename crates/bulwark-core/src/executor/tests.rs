use super::*;
use crate::backoff::FixedJitter;
use crate::budget::{BudgetScope, GLOBAL_BUDGET_KEY};
use crate::clock::ManualClock;
use crate::sleeper::RecordingSleeper;
use bulwark_types::{CircuitBreakerConfig, CircuitState, ErrorKind, PolicyDefaults, PolicyName, RetryBudgetConfig};
use parking_lot::Mutex;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, PartialEq)]
struct TestError {
    kind: ErrorKind,
    retry_after: Option<String>,
}

impl TestError {
    fn new(kind: ErrorKind) -> Self {
        Self { kind, retry_after: None }
    }

    fn with_retry_after(kind: ErrorKind, value: &str) -> Self {
        Self { kind, retry_after: Some(value.to_string()) }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test failure ({})", self.kind)
    }
}

impl Classify for TestError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn retry_after(&self) -> Option<&str> {
        self.retry_after.as_deref()
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    sleeper: Arc<RecordingSleeper>,
    executor: RetryExecutor,
}

fn harness_with(config: ResilienceConfig, policies: Option<RetryPolicyTable>) -> Harness {
    let clock = Arc::new(ManualClock::new());
    let sleeper = Arc::new(RecordingSleeper::with_clock(clock.clone()));
    let mut builder = RetryExecutor::builder()
        .config(config)
        .clock(clock.clone())
        .sleeper(sleeper.clone())
        .jitter(Arc::new(FixedJitter::none()));
    if let Some(policies) = policies {
        builder = builder.policies(policies);
    }
    let executor = builder.build().expect("valid config");
    Harness { clock, sleeper, executor }
}

fn harness() -> Harness {
    harness_with(ResilienceConfig::default(), None)
}

/// Fails with `error` for the first `failures` calls, then returns the call number.
fn flaky(
    calls: &AtomicU32,
    failures: u32,
    error: TestError,
) -> impl FnMut() -> Ready<Result<u32, TestError>> + '_ {
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        ready(if n < failures { Err(error.clone()) } else { Ok(n + 1) })
    }
}

fn always_failing(calls: &AtomicU32, kind: ErrorKind) -> impl FnMut() -> Ready<Result<u32, TestError>> + '_ {
    flaky(calls, u32::MAX, TestError::new(kind))
}

fn delays_ms(sleeper: &RecordingSleeper) -> Vec<u64> {
    sleeper.delays().iter().map(|d| d.as_millis() as u64).collect()
}

#[tokio::test]
async fn test_network_failures_then_success() {
    let h = harness();
    let calls = AtomicU32::new(0);

    let outcome = h.executor.execute("user", flaky(&calls, 2, TestError::new(ErrorKind::Network))).await;

    assert!(outcome.succeeded());
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.total_delay_ms, 3000);
    assert_eq!(delays_ms(&h.sleeper), vec![1000, 2000]);
    assert_eq!(outcome.into_result().expect("success"), 3);
    assert_eq!(h.executor.circuit_breakers().get_state("user"), CircuitState::Closed);
}

#[tokio::test]
async fn test_total_delay_within_policy_bounds_with_jitter() {
    let clock = Arc::new(ManualClock::new());
    let sleeper = Arc::new(RecordingSleeper::with_clock(clock.clone()));
    let executor = RetryExecutor::builder()
        .clock(clock)
        .sleeper(sleeper.clone())
        .jitter(Arc::new(FixedJitter::new(1.0)))
        .build()
        .expect("valid config");
    let calls = AtomicU32::new(0);

    let outcome = executor.execute("user", flaky(&calls, 2, TestError::new(ErrorKind::Timeout))).await;

    assert_eq!(outcome.attempts, 3);
    assert_eq!(delays_ms(&sleeper), vec![1100, 2200]);
    assert_eq!(outcome.total_delay_ms, 3300);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let h = harness();
    let calls = AtomicU32::new(0);

    let outcome = h.executor.execute("user", always_failing(&calls, ErrorKind::Client)).await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.total_delay_ms, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(h.sleeper.delays().is_empty());

    let error = outcome.error().expect("failure");
    assert_eq!(error.kind(), ErrorKind::Client);
    assert!(!error.is_synthetic());

    let stats = h.executor.get_circuit_breaker_stats();
    assert_eq!(stats["user"].state, CircuitState::Closed);
    assert_eq!(stats["user"].failures_in_window, 1);
}

#[tokio::test]
async fn test_mutation_runs_exactly_once() {
    let h = harness();
    let calls = AtomicU32::new(0);
    let text = "mutation CreateUser($name: String!) { createUser(name: $name) { id } }";

    let outcome = h.executor.execute_operation(text, always_failing(&calls, ErrorKind::Network)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.error().map(RetryError::kind), Some(ErrorKind::Network));
    // The fast path never touches breakers or budgets
    assert!(h.executor.circuit_breakers().is_empty());
    assert_eq!(h.executor.get_retry_budget_stats()[GLOBAL_BUDGET_KEY].used_in_window, 0);
}

#[tokio::test]
async fn test_mutation_ignores_aggressive_route() {
    let policies = RetryPolicyTable::default().route("createUser", PolicyName::Aggressive);
    let h = harness_with(ResilienceConfig::default(), Some(policies));
    let calls = AtomicU32::new(0);

    let outcome = h
        .executor
        .execute_operation("mutation { createUser { id } }", always_failing(&calls, ErrorKind::Server))
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn test_query_operation_derives_endpoint() {
    let h = harness();
    let calls = AtomicU32::new(0);

    let outcome = h
        .executor
        .execute_operation("query GetUser { user { id } }", flaky(&calls, 1, TestError::new(ErrorKind::Server)))
        .await;

    assert!(outcome.succeeded());
    assert_eq!(outcome.attempts, 2);
    assert!(h.executor.get_circuit_breaker_stats().contains_key("GetUser"));
    assert_eq!(h.executor.get_retry_budget_stats()["GetUser"].used_in_window, 1);
}

#[tokio::test]
async fn test_retries_exhausted_returns_original_error() {
    let h = harness();
    let calls = AtomicU32::new(0);

    let outcome = h.executor.execute("user", always_failing(&calls, ErrorKind::Server)).await;

    assert_eq!(outcome.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.total_delay_ms, 3000);
    match outcome.into_result() {
        Err(RetryError::Upstream(error)) => assert_eq!(error, TestError::new(ErrorKind::Server)),
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_retry_after_hint_is_used() {
    let h = harness();
    let calls = AtomicU32::new(0);

    let outcome = h
        .executor
        .execute("user", flaky(&calls, 1, TestError::with_retry_after(ErrorKind::RateLimit, "7")))
        .await;

    assert!(outcome.succeeded());
    assert_eq!(delays_ms(&h.sleeper), vec![7000]);
    assert_eq!(outcome.total_delay_ms, 7000);
}

#[tokio::test]
async fn test_retry_after_hint_is_clamped() {
    let h = harness();
    let calls = AtomicU32::new(0);

    let outcome = h
        .executor
        .execute("user", flaky(&calls, 1, TestError::with_retry_after(ErrorKind::RateLimit, "3600")))
        .await;

    assert_eq!(delays_ms(&h.sleeper), vec![30_000]);
    assert_eq!(outcome.total_delay_ms, 30_000);
}

#[tokio::test]
async fn test_unparseable_retry_after_falls_back() {
    let h = harness();
    let calls = AtomicU32::new(0);

    h.executor
        .execute("user", flaky(&calls, 1, TestError::with_retry_after(ErrorKind::RateLimit, "soon")))
        .await;

    assert_eq!(delays_ms(&h.sleeper), vec![1000]);
}

#[tokio::test]
async fn test_circuit_opens_mid_loop() {
    let config = ResilienceConfig {
        circuit_breaker: CircuitBreakerConfig { failure_threshold: 2, ..CircuitBreakerConfig::default() },
        ..ResilienceConfig::default()
    };
    let policies = RetryPolicyTable::default().route("user", PolicyName::Aggressive);
    let h = harness_with(config, Some(policies));
    let calls = AtomicU32::new(0);

    let outcome = h.executor.execute("user", always_failing(&calls, ErrorKind::Network)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.total_delay_ms, 3000);
    match outcome.into_result() {
        Err(RetryError::CircuitOpen { endpoint, retry_in_ms }) => {
            assert_eq!(endpoint, "user");
            assert_eq!(retry_in_ms, 28_000);
        },
        other => panic!("expected circuit open, got {other:?}"),
    }
}

#[tokio::test]
async fn test_open_circuit_rejects_without_invoking() {
    let h = harness();
    let breaker = h.executor.circuit_breakers().get("user");
    for _ in 0..5 {
        breaker.record_failure();
    }
    let calls = AtomicU32::new(0);

    let outcome = h.executor.execute("user", flaky(&calls, 0, TestError::new(ErrorKind::Network))).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.attempts, 0);
    let error = outcome.error().expect("rejected");
    assert_eq!(error.kind(), ErrorKind::CircuitOpen);
    assert!(error.is_synthetic());

    // A probe is admitted once the recovery timeout passes
    h.clock.advance_ms(30_000);
    let outcome = h.executor.execute("user", flaky(&calls, 0, TestError::new(ErrorKind::Network))).await;
    assert!(outcome.succeeded());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[tokio::test]
async fn test_timed_out_half_open_call_does_not_wedge_breaker() {
    let config = ResilienceConfig {
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout_ms: 1000,
            success_threshold: 1,
            half_open_max_attempts: 1,
            ..CircuitBreakerConfig::default()
        },
        ..ResilienceConfig::default()
    };
    let h = harness_with(config, None);
    let calls = AtomicU32::new(0);
    let breaker = h.executor.circuit_breakers().get("user");

    h.executor.execute("user", always_failing(&calls, ErrorKind::Client)).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    h.clock.advance_ms(1000);
    let hung = h.executor.execute("user", || std::future::pending::<Result<u32, TestError>>());
    assert!(tokio::time::timeout(Duration::from_millis(5), hung).await.is_err());
    assert_eq!(breaker.state(), CircuitState::Open);

    h.clock.advance_ms(1000);
    let outcome = h.executor.execute("user", flaky(&calls, 0, TestError::new(ErrorKind::Network))).await;
    assert!(outcome.succeeded(), "expected recovery, got {:?}", outcome.error());
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_endpoint_budget_exhausted() {
    let config = ResilienceConfig {
        retry_budget: RetryBudgetConfig { max_retries: 1, window_ms: 60_000 },
        ..ResilienceConfig::default()
    };
    let h = harness_with(config, None);
    let calls = AtomicU32::new(0);

    let outcome = h.executor.execute("user", always_failing(&calls, ErrorKind::Server)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.total_delay_ms, 1000);
    match outcome.into_result() {
        Err(RetryError::BudgetExhausted { endpoint, scope, last_error }) => {
            assert_eq!(endpoint, "user");
            assert_eq!(scope, BudgetScope::Endpoint);
            assert_eq!(last_error.kind, ErrorKind::Server);
        },
        other => panic!("expected budget exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_global_budget_caps_all_endpoints() {
    let config = ResilienceConfig {
        retry_budget: RetryBudgetConfig { max_retries: 1, window_ms: 60_000 },
        ..ResilienceConfig::default()
    };
    let h = harness_with(config, None);

    for endpoint in ["a", "b", "c"] {
        let calls = AtomicU32::new(0);
        let outcome = h.executor.execute(endpoint, flaky(&calls, 1, TestError::new(ErrorKind::Network))).await;
        assert!(outcome.succeeded(), "{endpoint} should succeed on retry");
    }

    let calls = AtomicU32::new(0);
    let outcome = h.executor.execute("d", always_failing(&calls, ErrorKind::Network)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    match outcome.into_result() {
        Err(RetryError::BudgetExhausted { scope, .. }) => assert_eq!(scope, BudgetScope::Global),
        other => panic!("expected global budget exhaustion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_retry_listener_sees_each_retry() {
    let clock = Arc::new(ManualClock::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let executor = RetryExecutor::builder()
        .clock(clock.clone())
        .sleeper(Arc::new(RecordingSleeper::with_clock(clock)))
        .jitter(Arc::new(FixedJitter::none()))
        .on_retry(move |event| sink.lock().push(event.clone()))
        .build()
        .expect("valid config");
    let calls = AtomicU32::new(0);

    executor.execute("user", flaky(&calls, 2, TestError::new(ErrorKind::Timeout))).await;

    let events = events.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].attempt, 1);
    assert_eq!(events[0].delay_ms, 1000);
    assert_eq!(events[0].total_delay_ms, 1000);
    assert_eq!(events[1].attempt, 2);
    assert_eq!(events[1].total_delay_ms, 3000);
    assert_eq!(events[1].error_kind, ErrorKind::Timeout);
    assert_eq!(events[1].operation, OperationKind::Query);
}

#[tokio::test]
async fn test_panicking_listener_does_not_stop_retries() {
    let clock = Arc::new(ManualClock::new());
    let executor = RetryExecutor::builder()
        .clock(clock.clone())
        .sleeper(Arc::new(RecordingSleeper::with_clock(clock)))
        .on_retry(|_| panic!("listener failure"))
        .build()
        .expect("valid config");
    let calls = AtomicU32::new(0);

    let outcome = executor.execute("user", flaky(&calls, 2, TestError::new(ErrorKind::Network))).await;

    assert!(outcome.succeeded());
    assert_eq!(outcome.attempts, 3);
}

#[tokio::test]
async fn test_cautious_policy_single_attempt_uses_breaker() {
    let policies = RetryPolicyTable::default().route("billing", PolicyName::Cautious);
    let h = harness_with(ResilienceConfig::default(), Some(policies));
    let calls = AtomicU32::new(0);

    let outcome = h.executor.execute("billing", always_failing(&calls, ErrorKind::Network)).await;

    assert_eq!(outcome.attempts, 1);
    assert!(h.sleeper.delays().is_empty());
    assert_eq!(h.executor.get_circuit_breaker_stats()["billing"].failures_in_window, 1);
}

#[tokio::test]
async fn test_concurrent_calls_share_breaker() {
    let h = harness();
    let calls = AtomicU32::new(0);

    let outcomes = futures::future::join_all(
        (0..10).map(|_| h.executor.execute("user", always_failing(&calls, ErrorKind::Client))),
    )
    .await;

    let rejected = outcomes
        .iter()
        .filter(|o| o.error().is_some_and(|e| e.kind() == ErrorKind::CircuitOpen))
        .count();
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(rejected, 5);
    assert_eq!(h.executor.get_circuit_breaker_summary().total_trips, 1);
}

#[tokio::test]
async fn test_admin_stats_and_resets() {
    let h = harness();
    let calls = AtomicU32::new(0);
    h.executor.execute("user", flaky(&calls, 1, TestError::new(ErrorKind::Network))).await;

    let budgets = h.executor.get_retry_budget_stats();
    assert_eq!(budgets["user"].used_in_window, 1);
    assert_eq!(budgets[GLOBAL_BUDGET_KEY].used_in_window, 1);
    assert_eq!(budgets[GLOBAL_BUDGET_KEY].max_retries, 30);

    let breaker = h.executor.circuit_breakers().get("user");
    for _ in 0..5 {
        breaker.record_failure();
    }
    assert_eq!(h.executor.get_circuit_breaker_summary().open, 1);

    assert!(h.executor.reset_circuit_breaker("user"));
    assert!(!h.executor.reset_circuit_breaker("nobody"));
    assert_eq!(breaker.state(), CircuitState::Closed);

    for _ in 0..5 {
        breaker.record_failure();
    }
    h.executor.reset_circuit_breakers();
    assert_eq!(breaker.state(), CircuitState::Closed);

    h.executor.reset_retry_budgets();
    let budgets = h.executor.get_retry_budget_stats();
    assert_eq!(budgets["user"].used_in_window, 0);
    assert_eq!(budgets[GLOBAL_BUDGET_KEY].used_in_window, 0);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let config = ResilienceConfig {
        policy: PolicyDefaults { jitter_factor: 2.0, ..PolicyDefaults::default() },
        ..ResilienceConfig::default()
    };

    match RetryExecutor::builder().config(config).build() {
        Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "policy"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_retry_error_helpers() {
    let upstream: RetryError<TestError> = RetryError::Upstream(TestError::new(ErrorKind::Auth));
    assert_eq!(upstream.to_string(), "test failure (auth)");
    assert_eq!(upstream.into_upstream().map(|e| e.kind), Some(ErrorKind::Auth));

    let open: RetryError<TestError> = RetryError::CircuitOpen { endpoint: "user".into(), retry_in_ms: 10 };
    assert!(open.is_synthetic());
    assert!(open.upstream().is_none());
    assert_eq!(open.to_string(), "Circuit open for user, retry in 10ms");

    let exhausted = RetryError::BudgetExhausted {
        endpoint: "user".into(),
        scope: BudgetScope::Global,
        last_error: TestError::new(ErrorKind::Server),
    };
    assert_eq!(exhausted.kind(), ErrorKind::BudgetExhausted);
    assert_eq!(exhausted.upstream().map(|e| e.kind), Some(ErrorKind::Server));
}

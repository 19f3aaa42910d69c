use super::*;
use crate::clock::ManualClock;
use std::collections::HashMap;
use std::thread;

fn budget(max_retries: u32, window_ms: u64) -> (Arc<ManualClock>, RetryBudget) {
    let clock = Arc::new(ManualClock::new());
    let budget = RetryBudget::new("user", RetryBudgetConfig { max_retries, window_ms }, clock.clone());
    (clock, budget)
}

#[test]
fn test_consume_up_to_max_then_deny() {
    let (_clock, budget) = budget(3, 1000);

    assert!(budget.consume());
    assert!(budget.consume());
    assert!(budget.can_retry());
    assert!(budget.consume());
    assert!(!budget.can_retry());
    assert!(!budget.consume());

    let stats = budget.stats();
    assert_eq!(stats.used_in_window, 3);
    assert_eq!(stats.remaining, 0);
    assert_eq!(stats.exhaustion_count, 1);
    assert_eq!(stats.ms_since_exhausted, Some(0));
}

#[test]
fn test_slots_free_as_window_slides() {
    let (clock, budget) = budget(2, 1000);

    assert!(budget.consume());
    clock.advance_ms(400);
    assert!(budget.consume());
    assert!(!budget.consume());

    clock.advance_ms(600);
    assert!(budget.consume());
    assert!(!budget.consume());

    clock.advance_ms(400);
    assert!(budget.consume());
}

#[test]
fn test_never_exceeds_max_in_any_window() {
    let (clock, budget) = budget(5, 1000);
    let mut granted: Vec<u64> = Vec::new();

    // Bursty then steady: 0,0,0,... every 37ms for a while
    for step in 0..200_u64 {
        let burst = if step % 25 == 0 { 10 } else { 1 };
        for _ in 0..burst {
            if budget.consume() {
                granted.push(clock.now_ms());
            }
        }
        clock.advance_ms(37);
    }

    for (i, &start) in granted.iter().enumerate() {
        let in_window = granted[i..].iter().take_while(|&&t| t < start + 1000).count();
        assert!(in_window <= 5, "{in_window} grants within window starting at {start}");
    }
    assert!(budget.stats().exhaustion_count > 0);
}

#[test]
fn test_zero_capacity_always_denies() {
    let (_clock, budget) = budget(0, 1000);
    assert!(!budget.can_retry());
    assert!(!budget.consume());
}

#[test]
fn test_reset_clears_usage() {
    let (_clock, budget) = budget(1, 1000);
    assert!(budget.consume());
    assert!(!budget.consume());

    budget.reset();
    let stats = budget.stats();
    assert_eq!(stats.used_in_window, 0);
    assert_eq!(stats.exhaustion_count, 0);
    assert_eq!(stats.ms_since_exhausted, None);
    assert!(budget.consume());
}

#[test]
fn test_concurrent_consumers_respect_cap() {
    let clock = Arc::new(ManualClock::new());
    let budget = Arc::new(RetryBudget::new(
        "user",
        RetryBudgetConfig { max_retries: 40, window_ms: 60_000 },
        clock,
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let budget = Arc::clone(&budget);
            thread::spawn(move || (0..20).filter(|_| budget.consume()).count())
        })
        .collect();
    let granted: usize = handles.into_iter().map(|h| h.join().expect("worker panicked")).sum();

    assert_eq!(granted, 40);
    assert_eq!(budget.stats().exhaustion_count, 120);
}

fn registry(max_retries: u32) -> (Arc<ManualClock>, RetryBudgetRegistry) {
    let clock = Arc::new(ManualClock::new());
    let registry = RetryBudgetRegistry::with_clock(
        RetryBudgetConfig { max_retries, window_ms: 1000 },
        clock.clone(),
    );
    (clock, registry)
}

#[test]
fn test_global_budget_is_three_times_default() {
    let (_clock, registry) = registry(4);
    assert_eq!(registry.global().config().max_retries, 12);
    assert_eq!(registry.global().name(), GLOBAL_BUDGET_KEY);
}

#[test]
fn test_endpoint_denial_still_spends_global_slot() {
    let (_clock, registry) = registry(2);

    assert_eq!(registry.try_consume("user"), Ok(()));
    assert_eq!(registry.try_consume("user"), Ok(()));
    assert_eq!(registry.try_consume("user"), Err(BudgetScope::Endpoint));

    let stats = registry.stats();
    assert_eq!(stats[GLOBAL_BUDGET_KEY].used_in_window, 3);
    assert_eq!(stats["user"].used_in_window, 2);
    assert_eq!(stats["user"].exhaustion_count, 1);
}

#[test]
fn test_global_budget_caps_across_endpoints() {
    let (clock, registry) = registry(2);

    for endpoint in ["a", "b", "c"] {
        assert_eq!(registry.try_consume(endpoint), Ok(()));
        assert_eq!(registry.try_consume(endpoint), Ok(()));
    }
    assert!(!registry.can_retry("d"));
    assert_eq!(registry.try_consume("d"), Err(BudgetScope::Global));
    // The endpoint budget was never touched
    assert_eq!(registry.get("d").stats().used_in_window, 0);

    clock.advance_ms(1000);
    assert!(registry.can_retry("d"));
    assert_eq!(registry.try_consume("d"), Ok(()));
}

#[test]
fn test_overrides_and_reset_all() {
    let (_clock, registry) = registry(5);
    let mut overrides = HashMap::new();
    overrides.insert("search".to_string(), RetryBudgetConfig { max_retries: 1, window_ms: 1000 });
    let registry = registry.with_overrides(overrides);

    assert_eq!(registry.try_consume("search"), Ok(()));
    assert_eq!(registry.try_consume("search"), Err(BudgetScope::Endpoint));
    assert!(Arc::ptr_eq(&registry.get("search"), &registry.get("search")));

    registry.reset_all();
    let stats = registry.stats();
    assert_eq!(stats[GLOBAL_BUDGET_KEY].used_in_window, 0);
    assert_eq!(stats["search"].used_in_window, 0);
    assert_eq!(registry.try_consume("search"), Ok(()));
}

#[test]
fn test_can_retry_does_not_create_budgets() {
    let (_clock, registry) = registry(5);
    let mut overrides = HashMap::new();
    overrides.insert("frozen".to_string(), RetryBudgetConfig { max_retries: 0, window_ms: 1000 });
    let registry = registry.with_overrides(overrides);

    assert!(registry.can_retry("fresh"));
    assert!(!registry.can_retry("frozen"));

    let stats = registry.stats();
    assert!(!stats.contains_key("fresh"));
    assert!(!stats.contains_key("frozen"));
    assert_eq!(stats.len(), 1);
}

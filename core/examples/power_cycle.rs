//! Orchestrating power cycles against a flaky fleet
//!
//! Simulated drivers fail in different ways; a manual clock stands in for
//! the waits so the example finishes instantly.

use power_breaker::{
    CircuitBreaker, Clock, FailureClassifier, ManualClock, PatternClassifier, PowerOperationResult,
    RetryPolicy, UnknownFailures,
};
use std::sync::Arc;
use std::time::Duration;

fn power_cycle(node: &str, attempt: u32) -> Result<(), String> {
    match node {
        "node-ok" => Ok(()),
        "node-flaky" if attempt >= 2 => Ok(()),
        "node-flaky" => Err("Connection reset by peer".to_string()),
        "node-unset" => Err("Power type not set for node-unset".to_string()),
        _ => Err("IPMI session Timeout".to_string()),
    }
}

fn run(
    node: &str,
    breaker: &CircuitBreaker,
    policy: &RetryPolicy,
    classifier: &dyn FailureClassifier,
    clock: &ManualClock,
) -> PowerOperationResult {
    let mut attempts = 0;
    loop {
        if !breaker.should_allow(node) {
            return PowerOperationResult::failed(
                "power operations suspended",
                power_breaker::FailureType::Unknown,
                attempts,
                false,
            );
        }

        attempts += 1;
        match power_cycle(node, attempts) {
            Ok(()) => {
                breaker.record_success(node);
                return PowerOperationResult::succeeded(attempts);
            }
            Err(message) => {
                let failure_type = classifier.classify(&message);
                breaker.record_failure(node, failure_type);

                let should_retry = policy.permits_retry(
                    attempts,
                    failure_type,
                    UnknownFailures::Abandon,
                ) && breaker.should_allow(node);

                if !should_retry {
                    return PowerOperationResult::failed(message, failure_type, attempts, false);
                }

                let wait = policy.delay(attempts);
                println!("  {} failed ({}), retrying in {:?}", node, failure_type, wait);
                clock.advance(wait);
            }
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Power Cycle Example ===\n");

    let clock = Arc::new(ManualClock::new());
    let breaker = CircuitBreaker::builder()
        .failure_threshold(3)
        .recovery_timeout_secs(300.0)
        .clock(clock.clone())
        .on_open(|event| {
            println!(
                "🔴 {} suspended after {} failures",
                event.node_id, event.failure_count
            )
        })
        .on_close(|event| println!("🟢 {} cleared", event.node_id))
        .build();
    let policy = RetryPolicy::default();
    let classifier = PatternClassifier::new();

    for node in ["node-ok", "node-flaky", "node-unset", "node-dead"] {
        let result = run(node, &breaker, &policy, &classifier, &clock);
        println!(
            "{}: success={} attempts={} failure={:?} state={}\n",
            node,
            result.success,
            result.attempts,
            result.failure_type,
            breaker.state(node)
        );
    }

    println!("--- Waiting out the recovery timeout ---");
    clock.advance(Duration::from_secs(301));
    println!("t={}s", clock.monotonic_time());
    for node in ["node-unset", "node-dead"] {
        println!("{}: allowed={}", node, breaker.should_allow(node));
    }
}

// crates/warden-core/tests/circuit.rs
// ============================================================================
// Module: Circuit Breaker Tests
// Description: Tests for breaker transitions and the probe discipline.
// ============================================================================
//! ## Overview
//! Validates the closed → open → half-open → closed lifecycle and the exact
//! threshold behavior the enforcement path depends on.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use warden_core::CircuitBreaker;
use warden_core::CircuitConfig;
use warden_core::CircuitMode;
use warden_core::CircuitRegistry;
use warden_core::Timestamp;
use warden_core::UpstreamName;

/// Test breaker configuration with small bounds.
const CONFIG: CircuitConfig = CircuitConfig {
    failure_threshold: 3,
    window_ms: 60_000,
    cooldown_ms: 5_000,
};

/// Tests that exactly N consecutive failures open the circuit.
#[test]
fn test_opens_after_threshold() {
    let breaker = CircuitBreaker::new(CONFIG);
    let now = Timestamp::from_unix_millis(1_000);
    for _ in 0..2 {
        assert!(breaker.try_acquire(now).is_ok());
        breaker.record_failure(now);
    }
    assert_eq!(breaker.mode(), CircuitMode::Closed);
    assert!(breaker.try_acquire(now).is_ok());
    breaker.record_failure(now);
    assert_eq!(breaker.mode(), CircuitMode::Open);
    // The (N+1)-th call short-circuits without touching the upstream.
    assert!(breaker.try_acquire(now).is_err());
}

/// Tests that a success in closed mode resets the consecutive counter.
#[test]
fn test_success_resets_counter() {
    let breaker = CircuitBreaker::new(CONFIG);
    let now = Timestamp::from_unix_millis(1_000);
    breaker.record_failure(now);
    breaker.record_failure(now);
    breaker.record_success();
    breaker.record_failure(now);
    breaker.record_failure(now);
    assert_eq!(breaker.mode(), CircuitMode::Closed);
}

/// Tests the half-open probe admission and both probe outcomes.
#[test]
fn test_half_open_probe() {
    let breaker = CircuitBreaker::new(CONFIG);
    let opened = Timestamp::from_unix_millis(1_000);
    for _ in 0..3 {
        breaker.record_failure(opened);
    }
    assert_eq!(breaker.mode(), CircuitMode::Open);

    // Before the cooldown the call short-circuits.
    let early = Timestamp::from_unix_millis(3_000);
    assert!(breaker.try_acquire(early).is_err());

    // After the cooldown exactly one probe is admitted.
    let later = Timestamp::from_unix_millis(7_000);
    assert!(breaker.try_acquire(later).is_ok());
    assert_eq!(breaker.mode(), CircuitMode::HalfOpen);
    assert!(breaker.try_acquire(later).is_err());

    // A failed probe reopens; the next cooldown admits another probe.
    breaker.record_failure(later);
    assert_eq!(breaker.mode(), CircuitMode::Open);
    let again = Timestamp::from_unix_millis(13_000);
    assert!(breaker.try_acquire(again).is_ok());
    breaker.record_success();
    assert_eq!(breaker.mode(), CircuitMode::Closed);
}

/// Tests that stale failures outside the window do not accumulate.
#[test]
fn test_window_resets_stale_failures() {
    let breaker = CircuitBreaker::new(CONFIG);
    breaker.record_failure(Timestamp::from_unix_millis(1_000));
    breaker.record_failure(Timestamp::from_unix_millis(2_000));
    // Past the window, the streak restarts.
    breaker.record_failure(Timestamp::from_unix_millis(120_000));
    breaker.record_failure(Timestamp::from_unix_millis(121_000));
    assert_eq!(breaker.mode(), CircuitMode::Closed);
}

/// Tests that forcing an upstream open affects all its method breakers.
#[test]
fn test_registry_force_open_upstream() {
    let registry = CircuitRegistry::new(CONFIG);
    let upstream = UpstreamName::new("filesystem");
    let call = registry.breaker(&upstream, "tools/call");
    let list = registry.breaker(&upstream, "tools/list");
    let other = registry.breaker(&UpstreamName::new("mail"), "tools/call");

    let now = Timestamp::from_unix_millis(1_000);
    registry.force_open_upstream(&upstream, now);
    assert_eq!(call.mode(), CircuitMode::Open);
    assert_eq!(list.mode(), CircuitMode::Open);
    assert_eq!(other.mode(), CircuitMode::Closed);
}

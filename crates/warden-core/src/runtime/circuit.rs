// crates/warden-core/src/runtime/circuit.rs
// ============================================================================
// Module: Warden Circuit Breaker
// Description: Per-key circuit breaker protecting external dependencies.
// Purpose: Short-circuit calls to failing upstream methods during cooldown.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! One breaker guards each `(upstream, method)` pair. N consecutive failures
//! within window W open the circuit; after cooldown T a single probe is
//! admitted. A probe success closes the circuit, a probe failure reopens it.
//! State transitions serialize through one mutex per breaker; the hot path
//! takes that lock for a handful of integer operations only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;

use crate::core::Timestamp;
use crate::core::UpstreamName;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct CircuitConfig {
    /// Consecutive failures (N) required to open the circuit.
    pub failure_threshold: u32,
    /// Failure-counting window (W) in milliseconds.
    pub window_ms: u64,
    /// Cooldown (T) in milliseconds before a probe is admitted.
    pub cooldown_ms: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_ms: 60_000,
            cooldown_ms: 30_000,
        }
    }
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

/// Circuit breaker mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitMode {
    /// All calls pass; failures are counted.
    Closed,
    /// All calls short-circuit until the cooldown elapses.
    Open,
    /// A single probe is in flight.
    HalfOpen,
}

/// Error returned when a circuit rejects a call.
#[derive(Debug, Clone, Copy, Error)]
#[error("circuit open")]
pub struct CircuitOpenError;

/// Mutable breaker state behind the lock.
#[derive(Debug)]
struct BreakerState {
    /// Current mode.
    mode: CircuitMode,
    /// Consecutive failure count within the window.
    consecutive_failures: u32,
    /// Timestamp of the most recent failure.
    last_failure_at: Option<Timestamp>,
    /// Timestamp the circuit last opened.
    opened_at: Option<Timestamp>,
}

/// Circuit breaker for one `(upstream, method)` pair.
pub struct CircuitBreaker {
    /// Breaker configuration.
    config: CircuitConfig,
    /// Serialized mutable state.
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                mode: CircuitMode::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                opened_at: None,
            }),
        }
    }

    /// Admits or rejects a call.
    ///
    /// An open circuit whose cooldown has elapsed transitions to half-open
    /// and admits exactly one probe; concurrent callers during the probe are
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitOpenError`] when the call must short-circuit.
    pub fn try_acquire(&self, now: Timestamp) -> Result<(), CircuitOpenError> {
        let Ok(mut state) = self.state.lock() else {
            return Err(CircuitOpenError);
        };
        match state.mode {
            CircuitMode::Closed => Ok(()),
            CircuitMode::HalfOpen => Err(CircuitOpenError),
            CircuitMode::Open => {
                let elapsed = state.opened_at.map_or(u64::MAX, |opened| {
                    u64::try_from(
                        now.as_unix_millis().saturating_sub(opened.as_unix_millis()),
                    )
                    .unwrap_or(0)
                });
                if elapsed >= self.config.cooldown_ms {
                    state.mode = CircuitMode::HalfOpen;
                    Ok(())
                } else {
                    Err(CircuitOpenError)
                }
            }
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.mode = CircuitMode::Closed;
        state.consecutive_failures = 0;
        state.last_failure_at = None;
        state.opened_at = None;
    }

    /// Records a failed call, opening the circuit at the threshold.
    pub fn record_failure(&self, now: Timestamp) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.mode == CircuitMode::HalfOpen {
            state.mode = CircuitMode::Open;
            state.opened_at = Some(now);
            state.last_failure_at = Some(now);
            return;
        }
        let stale = state.last_failure_at.is_some_and(|last| {
            now.as_unix_millis().saturating_sub(last.as_unix_millis())
                > i64::try_from(self.config.window_ms).unwrap_or(i64::MAX)
        });
        if stale {
            state.consecutive_failures = 0;
        }
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure_at = Some(now);
        if state.consecutive_failures >= self.config.failure_threshold {
            state.mode = CircuitMode::Open;
            state.opened_at = Some(now);
        }
    }

    /// Returns the current mode.
    #[must_use]
    pub fn mode(&self) -> CircuitMode {
        self.state.lock().map_or(CircuitMode::Open, |state| state.mode)
    }

    /// Forces the circuit open, as when an upstream process dies.
    pub fn force_open(&self, now: Timestamp) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.mode = CircuitMode::Open;
        state.opened_at = Some(now);
        state.consecutive_failures = self.config.failure_threshold;
        state.last_failure_at = Some(now);
    }
}

// ============================================================================
// SECTION: Circuit Registry
// ============================================================================

/// Registry of breakers keyed by `(upstream, method)`.
pub struct CircuitRegistry {
    /// Shared breaker configuration.
    config: CircuitConfig,
    /// Breaker map; breakers are created on first use.
    breakers: Mutex<HashMap<(UpstreamName, String), Arc<CircuitBreaker>>>,
}

impl CircuitRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the breaker for the pair, creating it when absent.
    #[must_use]
    pub fn breaker(&self, upstream: &UpstreamName, method: &str) -> Arc<CircuitBreaker> {
        let key = (upstream.clone(), method.to_string());
        let Ok(mut breakers) = self.breakers.lock() else {
            return Arc::new(CircuitBreaker::new(self.config));
        };
        Arc::clone(
            breakers.entry(key).or_insert_with(|| Arc::new(CircuitBreaker::new(self.config))),
        )
    }

    /// Forces open every breaker registered for the upstream.
    pub fn force_open_upstream(&self, upstream: &UpstreamName, now: Timestamp) {
        let Ok(breakers) = self.breakers.lock() else {
            return;
        };
        for ((name, _), breaker) in breakers.iter() {
            if name == upstream {
                breaker.force_open(now);
            }
        }
    }
}

// crates/warden-core/src/runtime/retry.rs
// ============================================================================
// Module: Warden Retry Policy
// Description: Jittered exponential backoff for idempotent operations.
// Purpose: Centralize retry budgets for upstream reads and obligations.
// Dependencies: rand, tokio
// ============================================================================

//! ## Overview
//! Retries apply only to idempotent operations. The policy produces
//! exponentially growing, jittered delays capped at a maximum, and a generic
//! async runner retries an operation while its error classifies as
//! transient. Upstream writes never pass through this module.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use rand::Rng;

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Retry policy with jittered exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts including the first.
    pub max_attempts: u32,
    /// Base delay in milliseconds before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay in milliseconds.
    pub cap_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            cap_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Returns the jittered delay before the given retry attempt (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw = self.base_delay_ms.saturating_mul(1_u64 << exponent);
        let capped = raw.min(self.cap_delay_ms);
        let jitter = if capped == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=capped / 2)
        };
        Duration::from_millis(capped.saturating_add(jitter).min(self.cap_delay_ms))
    }

    /// Runs the operation, retrying while errors classify as transient.
    ///
    /// The operation receives the 1-based attempt number. The final error is
    /// returned when attempts are exhausted or a permanent error occurs.
    ///
    /// # Errors
    ///
    /// Returns the last operation error once the budget is spent.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        is_transient: impl Fn(&E) -> bool,
    ) -> Result<(T, u32), E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok((value, attempt)),
                Err(err) if attempt < attempts && is_transient(&err) => {
                    tokio::time::sleep(self.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

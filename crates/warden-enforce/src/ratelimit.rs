// crates/warden-enforce/src/ratelimit.rs
// ============================================================================
// Module: Warden Rate Limiter
// Description: Sliding-window rate limiting keyed by agent and resource.
// Purpose: Convert over-limit permits into critical constraint failures.
// Dependencies: warden-core
// ============================================================================

//! ## Overview
//! The rate limiter counts admissions per `(agent, resource)` key in a
//! sliding window. A violation is a critical constraint failure, which the
//! enforcement layer translates into a policy-violation denial even though
//! the decision was a permit. Per-key memory is bounded by the admitted
//! count, and idle keys are evicted when the key table grows past its cap.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;
use warden_core::ConstraintDirective;
use warden_core::ConstraintFailure;
use warden_core::ConstraintProcessor;
use warden_core::DecisionContext;

use crate::directive::ParsedConstraint;
use crate::directive::parse_constraint;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Window applied when a directive omits one, in milliseconds.
    pub default_window_ms: u64,
    /// Maximum tracked keys before idle eviction.
    pub max_keys: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            default_window_ms: 60_000,
            max_keys: 65_536,
        }
    }
}

// ============================================================================
// SECTION: Rate Limiter
// ============================================================================

/// Sliding admission log for one key.
struct WindowLog {
    /// Admission timestamps within the window, oldest first.
    admissions: VecDeque<i64>,
    /// Most recent admission, for idle eviction.
    last_seen: i64,
}

/// Constraint processor enforcing rate-limit directives.
pub struct RateLimiter {
    /// Limiter configuration.
    config: RateLimiterConfig,
    /// Per-key sliding logs.
    windows: Mutex<HashMap<String, WindowLog>>,
}

impl RateLimiter {
    /// Creates the processor from configuration.
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admits or rejects one request for the key.
    fn admit(&self, key: &str, count: u32, window_ms: u64, now: i64) -> Result<(), u64> {
        let Ok(mut windows) = self.windows.lock() else {
            // A poisoned limiter cannot count; fail the admission.
            return Err(window_ms);
        };
        if windows.len() >= self.config.max_keys && !windows.contains_key(key) {
            let window = i64::try_from(window_ms.saturating_mul(2)).unwrap_or(i64::MAX);
            windows.retain(|_, log| now.saturating_sub(log.last_seen) <= window);
        }
        let log = windows.entry(key.to_string()).or_insert_with(|| WindowLog {
            admissions: VecDeque::new(),
            last_seen: now,
        });
        log.last_seen = now;
        let horizon = now.saturating_sub(i64::try_from(window_ms).unwrap_or(i64::MAX));
        while log.admissions.front().is_some_and(|stamp| *stamp <= horizon) {
            log.admissions.pop_front();
        }
        if log.admissions.len() >= count as usize {
            let retry_after = log
                .admissions
                .front()
                .map_or(window_ms, |oldest| {
                    u64::try_from(oldest.saturating_sub(horizon)).unwrap_or(window_ms)
                });
            return Err(retry_after);
        }
        log.admissions.push_back(now);
        Ok(())
    }
}

impl ConstraintProcessor for RateLimiter {
    fn name(&self) -> &'static str {
        "rate-limiter"
    }

    fn handles(&self, directive: &ConstraintDirective) -> bool {
        directive.as_str().starts_with("rate-limit:")
    }

    fn apply(
        &self,
        directive: &ConstraintDirective,
        data: Value,
        context: &DecisionContext,
    ) -> Result<Value, ConstraintFailure> {
        let parsed = parse_constraint(directive)
            .map_err(|err| ConstraintFailure::critical(err.to_string()))?;
        let ParsedConstraint::RateLimit {
            count,
            window_ms,
        } = parsed
        else {
            return Err(ConstraintFailure::critical("directive is not a rate-limit form"));
        };
        let window_ms = window_ms.unwrap_or(self.config.default_window_ms);
        let key = format!("{}|{}", context.agent, context.resource);
        match self.admit(&key, count, window_ms, context.time.as_unix_millis()) {
            Ok(()) => Ok(data),
            Err(retry_after_ms) => Err(ConstraintFailure::critical(format!(
                "rate limit of {count} per {window_ms}ms exceeded; retry in {retry_after_ms}ms"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::RateLimiter;
    use super::RateLimiterConfig;

    /// Tests the sliding window admits again once old entries age out.
    #[test]
    fn test_sliding_window() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        assert!(limiter.admit("k", 2, 1_000, 0).is_ok());
        assert!(limiter.admit("k", 2, 1_000, 100).is_ok());
        assert!(limiter.admit("k", 2, 1_000, 200).is_err());
        // The first admission ages out of the window.
        assert!(limiter.admit("k", 2, 1_000, 1_050).is_ok());
    }

    /// Tests keys are independent.
    #[test]
    fn test_keys_independent() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        assert!(limiter.admit("a", 1, 1_000, 0).is_ok());
        assert!(limiter.admit("b", 1, 1_000, 0).is_ok());
        assert!(limiter.admit("a", 1, 1_000, 10).is_err());
    }
}

// crates/warden-enforce/src/obligation.rs
// ============================================================================
// Module: Warden Obligation Dispatcher
// Description: Concurrent, bounded execution of obligation directives.
// Purpose: Run post-decision side effects without blocking each other.
// Dependencies: warden-core, tokio
// ============================================================================

//! ## Overview
//! The dispatcher fans obligations out to their executors concurrently,
//! each under its own timeout and retry budget, and aggregates per-item
//! outcomes in input order. One failing executor never blocks the others,
//! and no obligation failure ever changes the user-visible decision. The
//! `audit` directive is satisfied by the always-on audit logger, so the
//! dispatcher records it as succeeded without re-executing it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use warden_core::DecisionContext;
use warden_core::ObligationDirective;
use warden_core::ObligationError;
use warden_core::ObligationExecutor;
use warden_core::ObligationOutcome;
use warden_core::PolicyDecision;
use warden_core::RetryPolicy;

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Obligation dispatcher configuration.
#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    /// Per-obligation timeout in milliseconds.
    pub obligation_timeout_ms: u64,
    /// Retry policy for transient executor failures.
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            obligation_timeout_ms: 10_000,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 100,
                cap_delay_ms: 2_000,
            },
        }
    }
}

/// Dispatcher over the registered obligation executors.
pub struct ObligationDispatcher {
    /// Executors in registration order.
    executors: Vec<Arc<dyn ObligationExecutor>>,
    /// Dispatcher configuration.
    config: DispatcherConfig,
}

impl ObligationDispatcher {
    /// Creates the dispatcher over the given executors.
    #[must_use]
    pub fn new(executors: Vec<Arc<dyn ObligationExecutor>>, config: DispatcherConfig) -> Self {
        Self {
            executors,
            config,
        }
    }

    /// Executes every obligation concurrently and aggregates outcomes.
    ///
    /// Outcomes come back in the input order regardless of completion
    /// order.
    pub async fn execute(
        &self,
        obligations: &[ObligationDirective],
        context: &Arc<DecisionContext>,
        decision: &PolicyDecision,
    ) -> Vec<ObligationOutcome> {
        let mut outcomes: Vec<Option<ObligationOutcome>> = vec![None; obligations.len()];
        let mut tasks: JoinSet<(usize, ObligationOutcome)> = JoinSet::new();
        let timeout = Duration::from_millis(self.config.obligation_timeout_ms);

        for (index, directive) in obligations.iter().enumerate() {
            if directive.as_str() == "audit" {
                // Auditing is unconditional; the logger runs for every
                // request after dispatch completes.
                outcomes[index] = Some(ObligationOutcome {
                    directive: directive.as_str().to_string(),
                    succeeded: true,
                    attempts: 0,
                    error: None,
                });
                continue;
            }
            let Some(executor) =
                self.executors.iter().find(|executor| executor.handles(directive)).cloned()
            else {
                outcomes[index] = Some(ObligationOutcome {
                    directive: directive.as_str().to_string(),
                    succeeded: false,
                    attempts: 0,
                    error: Some("no executor handles this directive".to_string()),
                });
                continue;
            };
            let directive = directive.clone();
            let context = Arc::clone(context);
            let decision = decision.clone();
            let retry = self.config.retry;
            tasks.spawn(async move {
                let outcome = run_one(&executor, &directive, &context, &decision, retry, timeout)
                    .await;
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, outcome)) = joined {
                outcomes[index] = Some(outcome);
            }
        }

        outcomes
            .into_iter()
            .enumerate()
            .map(|(index, outcome)| {
                outcome.unwrap_or(ObligationOutcome {
                    directive: obligations
                        .get(index)
                        .map(|directive| directive.as_str().to_string())
                        .unwrap_or_default(),
                    succeeded: false,
                    attempts: 0,
                    error: Some("obligation task aborted".to_string()),
                })
            })
            .collect()
    }
}

/// Runs one obligation under its timeout and retry budget.
async fn run_one(
    executor: &Arc<dyn ObligationExecutor>,
    directive: &ObligationDirective,
    context: &Arc<DecisionContext>,
    decision: &PolicyDecision,
    retry: RetryPolicy,
    timeout: Duration,
) -> ObligationOutcome {
    let attempt_result = retry
        .run(
            |_| {
                let executor = Arc::clone(executor);
                let directive = directive.clone();
                let context = Arc::clone(context);
                let decision = decision.clone();
                async move {
                    match tokio::time::timeout(
                        timeout,
                        executor.execute(&directive, &context, &decision),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ObligationError::Transient("obligation timed out".to_string())),
                    }
                }
            },
            |err| matches!(err, ObligationError::Transient(_)),
        )
        .await;
    match attempt_result {
        Ok(((), attempts)) => ObligationOutcome {
            directive: directive.as_str().to_string(),
            succeeded: true,
            attempts,
            error: None,
        },
        Err(err) => ObligationOutcome {
            directive: directive.as_str().to_string(),
            succeeded: false,
            attempts: retry.max_attempts,
            error: Some(err.to_string()),
        },
    }
}

// crates/warden-enforce/src/lifecycle.rs
// ============================================================================
// Module: Warden Data Lifecycle
// Description: Deferred lifecycle actions behind a timer abstraction.
// Purpose: Schedule delete, archive, and anonymize actions after a delay.
// Dependencies: warden-core, tokio
// ============================================================================

//! ## Overview
//! The lifecycle executor turns `lifecycle:<action>:<delay>` obligations
//! into scheduled actions on a timer abstraction. The in-memory scheduler
//! tracks pending actions, fires them after the delay through an injected
//! handler, and applies the audit retry policy when the handler fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use warden_core::Alert;
use warden_core::AlertSeverity;
use warden_core::AlertSink;
use warden_core::DecisionContext;
use warden_core::ObligationDirective;
use warden_core::ObligationError;
use warden_core::ObligationExecutor;
use warden_core::PolicyDecision;
use warden_core::ResourceUri;
use warden_core::RetryPolicy;
use warden_core::Timestamp;

use crate::directive::LifecycleVerb;
use crate::directive::ParsedObligation;
use crate::directive::parse_obligation;

// ============================================================================
// SECTION: Scheduled Actions
// ============================================================================

/// One deferred lifecycle action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledAction {
    /// Deferred action verb.
    pub verb: LifecycleVerb,
    /// Resource the action targets.
    pub resource: ResourceUri,
    /// Execution due time.
    pub due_at: Timestamp,
}

/// Handler invoked when a scheduled action fires.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// Performs the deferred action.
    ///
    /// # Errors
    ///
    /// Returns [`ObligationError`] classified for retry handling.
    async fn perform(&self, action: &ScheduledAction) -> Result<(), ObligationError>;
}

/// Handler that records actions without touching any resource.
pub struct RecordingHandler {
    /// Actions performed so far.
    pub performed: Mutex<Vec<ScheduledAction>>,
}

impl RecordingHandler {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            performed: Mutex::new(Vec::new()),
        }
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleHandler for RecordingHandler {
    async fn perform(&self, action: &ScheduledAction) -> Result<(), ObligationError> {
        let Ok(mut performed) = self.performed.lock() else {
            return Err(ObligationError::Permanent("recorder lock poisoned".to_string()));
        };
        performed.push(action.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// In-memory timer scheduler for lifecycle actions.
pub struct LifecycleScheduler {
    /// Handler performing fired actions.
    handler: Arc<dyn LifecycleHandler>,
    /// Escalation channel for exhausted retries.
    alerts: Arc<dyn AlertSink>,
    /// Retry policy matching the audit executor.
    retry: RetryPolicy,
    /// Pending actions, for inspection and shutdown accounting.
    pending: Arc<Mutex<Vec<ScheduledAction>>>,
}

impl LifecycleScheduler {
    /// Creates the scheduler over a handler and an escalation channel.
    #[must_use]
    pub fn new(handler: Arc<dyn LifecycleHandler>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            handler,
            alerts,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 100,
                cap_delay_ms: 2_000,
            },
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the currently pending actions.
    #[must_use]
    pub fn pending(&self) -> Vec<ScheduledAction> {
        self.pending.lock().map(|pending| pending.clone()).unwrap_or_default()
    }

    /// Schedules an action to fire after its delay.
    pub fn schedule(&self, action: ScheduledAction, delay: Duration) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(action.clone());
        }
        let handler = Arc::clone(&self.handler);
        let alerts = Arc::clone(&self.alerts);
        let retry = self.retry;
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let outcome = retry
                .run(
                    |_| {
                        let handler = Arc::clone(&handler);
                        let action = action.clone();
                        async move { handler.perform(&action).await }
                    },
                    |err| matches!(err, ObligationError::Transient(_)),
                )
                .await;
            if let Err(err) = outcome {
                alerts.raise(&Alert {
                    severity: AlertSeverity::Critical,
                    source: "lifecycle-scheduler".to_string(),
                    message: format!("deferred action failed: {err}"),
                    timestamp: Timestamp::now(),
                });
            }
            if let Ok(mut pending) = pending.lock() {
                if let Some(index) = pending.iter().position(|entry| entry == &action) {
                    pending.remove(index);
                }
            }
        });
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Obligation executor scheduling lifecycle directives.
pub struct DataLifecycle {
    /// Timer scheduler.
    scheduler: Arc<LifecycleScheduler>,
}

impl DataLifecycle {
    /// Creates the executor over a scheduler.
    #[must_use]
    pub fn new(scheduler: Arc<LifecycleScheduler>) -> Self {
        Self {
            scheduler,
        }
    }
}

#[async_trait]
impl ObligationExecutor for DataLifecycle {
    fn name(&self) -> &'static str {
        "data-lifecycle"
    }

    fn handles(&self, directive: &ObligationDirective) -> bool {
        directive.as_str().starts_with("lifecycle:")
    }

    async fn execute(
        &self,
        directive: &ObligationDirective,
        context: &DecisionContext,
        _decision: &PolicyDecision,
    ) -> Result<(), ObligationError> {
        let parsed =
            parse_obligation(directive).map_err(|err| ObligationError::Permanent(err.to_string()))?;
        let ParsedObligation::Lifecycle {
            verb,
            delay_seconds,
        } = parsed
        else {
            return Err(ObligationError::Permanent(
                "directive is not a lifecycle form".to_string(),
            ));
        };
        let due_at = Timestamp::from_unix_millis(
            context
                .time
                .as_unix_millis()
                .saturating_add(i64::try_from(delay_seconds.saturating_mul(1_000)).unwrap_or(0)),
        );
        self.scheduler.schedule(
            ScheduledAction {
                verb,
                resource: context.resource.clone(),
                due_at,
            },
            Duration::from_secs(delay_seconds),
        );
        Ok(())
    }
}

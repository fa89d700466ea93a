// crates/warden-core/src/interfaces/mod.rs
// ============================================================================
// Module: Warden Interfaces
// Description: Backend-agnostic interfaces for judgment, enrichment, and enforcement.
// Purpose: Define the contract surfaces used by the Warden decision pipeline.
// Dependencies: crate::core, async-trait
// ============================================================================

//! ## Overview
//! Interfaces define how Warden integrates with external collaborators
//! without embedding backend-specific details. Implementations must be
//! deterministic where the contract says so and fail closed on missing or
//! invalid data: no interface can turn an error into a permit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::AuditRecord;
use crate::core::ConstraintDirective;
use crate::core::Decision;
use crate::core::DecisionContext;
use crate::core::ObligationDirective;
use crate::core::Policy;
use crate::core::PolicyDecision;
use crate::core::PolicyId;
use crate::core::PolicyStatus;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Judge
// ============================================================================

/// Judgment returned by an AI policy judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// The judged decision.
    pub decision: Decision,
    /// Human-readable reasoning.
    pub reason: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Optional constraint directives proposed by the judge.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintDirective>,
    /// Optional obligation directives proposed by the judge.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<ObligationDirective>,
}

/// Judge errors.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// The judge call exceeded its latency bound.
    #[error("judge timed out")]
    Timeout,
    /// The backend is unreachable or misconfigured.
    #[error("judge unavailable: {0}")]
    Unavailable(String),
    /// The backend answered with an unusable payload.
    #[error("judge backend error: {0}")]
    Backend(String),
}

/// AI judge over natural-language policy text.
///
/// Implementations carry their own latency bound and retry budget. The
/// pipeline treats any error as an inconclusive result, never a permit.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Judges a request context against the policy text.
    ///
    /// # Errors
    ///
    /// Returns [`JudgeError`] when no judgment could be produced.
    async fn judge(
        &self,
        context: &DecisionContext,
        policy_text: &str,
    ) -> Result<Judgment, JudgeError>;
}

/// Judge stub used when no AI backend is configured.
///
/// # Invariants
/// - Always returns `Indeterminate` with confidence 0.
pub struct StubJudge;

#[async_trait]
impl Judge for StubJudge {
    async fn judge(
        &self,
        _context: &DecisionContext,
        _policy_text: &str,
    ) -> Result<Judgment, JudgeError> {
        Ok(Judgment {
            decision: Decision::Indeterminate,
            reason: "no judge backend configured".to_string(),
            confidence: 0.0,
            constraints: Vec::new(),
            obligations: Vec::new(),
        })
    }
}

// ============================================================================
// SECTION: Enricher
// ============================================================================

/// Enricher errors.
#[derive(Debug, Error)]
pub enum EnricherError {
    /// The enricher exceeded its per-enricher deadline.
    #[error("enricher timed out")]
    Timeout,
    /// The enricher failed to produce output.
    #[error("enricher failure: {0}")]
    Failed(String),
}

/// Pure, side-effect-free context enricher.
///
/// Each enricher owns one environment namespace and returns a flat map the
/// collector merges under that namespace. Failures are logged and treated as
/// empty output; no enricher may block past its deadline.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Returns the environment namespace this enricher owns.
    fn namespace(&self) -> &'static str;

    /// Returns true when a failure of this enricher is ignorable.
    fn best_effort(&self) -> bool {
        false
    }

    /// Produces the enrichment map for the context under construction.
    ///
    /// # Errors
    ///
    /// Returns [`EnricherError`] when enrichment fails; the collector treats
    /// the output as empty.
    async fn enrich(
        &self,
        context: &DecisionContext,
    ) -> Result<BTreeMap<String, Value>, EnricherError>;
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

/// Policy store errors.
#[derive(Debug, Error)]
pub enum PolicyStoreError {
    /// No policy exists for the identifier.
    #[error("policy not found: {0}")]
    NotFound(PolicyId),
    /// Policy failed validation.
    #[error("policy invalid: {0}")]
    Invalid(String),
    /// Store I/O failure.
    #[error("policy store io error: {0}")]
    Io(String),
    /// Stored data is corrupted.
    #[error("policy store corruption: {0}")]
    Corrupt(String),
}

/// Filter for policy listing.
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    /// Restrict to the given status when set.
    pub status: Option<PolicyStatus>,
    /// Restrict to names containing this substring when set.
    pub name_contains: Option<String>,
}

/// Administration store for policies.
///
/// Implementations are single-writer, many-reader; readers observe immutable
/// snapshots behind `Arc`.
pub trait PolicyStore: Send + Sync {
    /// Creates a policy from name, text, and metadata; returns the fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError`] when validation or persistence fails.
    fn create(&self, policy: Policy) -> Result<PolicyId, PolicyStoreError>;

    /// Updates the policy text, retaining the prior version in history.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError`] when the policy is missing or invalid.
    fn update(&self, id: &PolicyId, text: String) -> Result<String, PolicyStoreError>;

    /// Soft-deletes the policy by marking it deprecated.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError`] when the policy is missing.
    fn delete(&self, id: &PolicyId) -> Result<(), PolicyStoreError>;

    /// Returns the policy by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError::NotFound`] when absent.
    fn get(&self, id: &PolicyId) -> Result<Arc<Policy>, PolicyStoreError>;

    /// Lists policies matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError`] when the store cannot be read.
    fn list(&self, filter: &PolicyFilter) -> Result<Vec<Arc<Policy>>, PolicyStoreError>;

    /// Returns all active policies ordered by descending priority then id.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError`] when the store cannot be read.
    fn active_policies(&self) -> Result<Vec<Arc<Policy>>, PolicyStoreError>;
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Audit sink errors.
#[derive(Debug, Error)]
pub enum AuditSinkError {
    /// The sink could not persist the record.
    #[error("audit sink failure: {0}")]
    Sink(String),
}

/// Durable, append-only audit sink.
///
/// Sinks must be idempotent on record id so retried appends stay
/// exactly-once-visible to consumers.
pub trait AuditSink: Send + Sync {
    /// Appends one audit record.
    ///
    /// # Errors
    ///
    /// Returns [`AuditSinkError`] when the record could not be persisted.
    fn append(&self, record: &AuditRecord) -> Result<(), AuditSinkError>;
}

// ============================================================================
// SECTION: Alerts
// ============================================================================

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Advisory signal; no action required.
    Advisory,
    /// Degraded operation requiring attention.
    Warning,
    /// Critical failure requiring immediate attention.
    Critical,
}

/// Alert emitted through the escalation channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Alert severity.
    pub severity: AlertSeverity,
    /// Component that raised the alert.
    pub source: String,
    /// Human-readable alert message.
    pub message: String,
    /// Alert timestamp.
    pub timestamp: Timestamp,
}

/// Escalation channel for critical failures and advisories.
///
/// Emission must never block request handling.
pub trait AlertSink: Send + Sync {
    /// Raises an alert.
    fn raise(&self, alert: &Alert);
}

/// Alert sink that discards all alerts.
pub struct NoopAlertSink;

impl AlertSink for NoopAlertSink {
    fn raise(&self, _alert: &Alert) {}
}

// ============================================================================
// SECTION: Constraint Processor
// ============================================================================

/// Failure raised by a constraint processor.
///
/// Criticality is an explicit flag: critical failures convert the permitted
/// response into a policy-violation error, soft failures log and proceed.
#[derive(Debug, Clone, Error)]
#[error("constraint failure: {reason}")]
pub struct ConstraintFailure {
    /// Whether the failure aborts the response.
    pub critical: bool,
    /// Failure reason.
    pub reason: String,
}

impl ConstraintFailure {
    /// Builds a critical failure that aborts the response.
    #[must_use]
    pub fn critical(reason: impl Into<String>) -> Self {
        Self {
            critical: true,
            reason: reason.into(),
        }
    }

    /// Builds a soft failure that logs and proceeds.
    #[must_use]
    pub fn soft(reason: impl Into<String>) -> Self {
        Self {
            critical: false,
            reason: reason.into(),
        }
    }
}

/// Processor applying one family of constraint directives to response data.
pub trait ConstraintProcessor: Send + Sync {
    /// Returns the processor name for logs and audit records.
    fn name(&self) -> &'static str;

    /// Returns true when this processor interprets the directive.
    fn handles(&self, directive: &ConstraintDirective) -> bool;

    /// Applies the directive to the response data.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintFailure`] carrying the explicit criticality flag.
    fn apply(
        &self,
        directive: &ConstraintDirective,
        data: Value,
        context: &DecisionContext,
    ) -> Result<Value, ConstraintFailure>;
}

// ============================================================================
// SECTION: Obligation Executor
// ============================================================================

/// Obligation execution errors.
#[derive(Debug, Error)]
pub enum ObligationError {
    /// Transient failure; the dispatcher may retry.
    #[error("transient obligation failure: {0}")]
    Transient(String),
    /// Permanent failure; retrying cannot succeed.
    #[error("permanent obligation failure: {0}")]
    Permanent(String),
}

/// Executor for one family of obligation directives.
#[async_trait]
pub trait ObligationExecutor: Send + Sync {
    /// Returns the executor name for logs and audit records.
    fn name(&self) -> &'static str;

    /// Returns true when this executor interprets the directive.
    fn handles(&self, directive: &ObligationDirective) -> bool;

    /// Executes the directive for the decided request.
    ///
    /// # Errors
    ///
    /// Returns [`ObligationError`] classified for retry handling.
    async fn execute(
        &self,
        directive: &ObligationDirective,
        context: &DecisionContext,
        decision: &PolicyDecision,
    ) -> Result<(), ObligationError>;
}

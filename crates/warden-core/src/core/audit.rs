// crates/warden-core/src/core/audit.rs
// ============================================================================
// Module: Warden Audit Records
// Description: Append-only audit record for every policy decision.
// Purpose: Provide the durable, ordered trail the audit sink persists.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! One [`AuditRecord`] is written per request outcome. Records are
//! write-once, ordered by `(timestamp, id)`, and idempotent on `id` for
//! exactly-once-visible consumers. The record captures both the decision and
//! what enforcement did to the response afterwards, including the conversion
//! of a permit into a denial on critical constraint failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::context::ActionKind;
use crate::core::context::ResourceUri;
use crate::core::decision::Decision;
use crate::core::decision::DecisionEngine;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::PolicyId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Obligation Outcomes
// ============================================================================

/// Outcome of a single obligation execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationOutcome {
    /// Directive that was executed.
    pub directive: String,
    /// Whether the obligation ultimately succeeded.
    pub succeeded: bool,
    /// Retry attempts consumed.
    pub attempts: u32,
    /// Failure detail when the obligation exhausted its retries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// SECTION: Audit Record
// ============================================================================

/// Append-only record of one policy decision and its enforcement.
///
/// # Invariants
/// - Records are write-once; the sink serializes writes.
/// - `(timestamp, id)` ordering respects enqueue order per sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Monotonic record identifier.
    pub id: u64,
    /// Record timestamp.
    pub timestamp: Timestamp,
    /// Calling agent.
    pub agent: AgentId,
    /// Request action.
    pub action: ActionKind,
    /// Request resource.
    pub resource: ResourceUri,
    /// Final user-visible decision.
    pub decision: Decision,
    /// Decision reason.
    pub reason: String,
    /// Policy the decision was evaluated under, when one was selected.
    pub policy_id: Option<PolicyId>,
    /// Engine that produced the decision.
    pub engine: DecisionEngine,
    /// End-to-end decision latency in milliseconds.
    pub latency_ms: u64,
    /// Constraint directives applied to the response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints_applied: Vec<String>,
    /// Per-obligation execution outcomes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligation_results: Vec<ObligationOutcome>,
    /// Canonical hash of the sealed decision context.
    pub context_hash: HashDigest,
    /// Set when a permit was converted to a denial by enforcement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_from: Option<Decision>,
}

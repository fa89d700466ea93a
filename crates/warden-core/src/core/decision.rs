// crates/warden-core/src/core/decision.rs
// ============================================================================
// Module: Warden Decisions
// Description: Decision outcomes, engines, and symbolic directives.
// Purpose: Represent the result of policy evaluation and its side effects.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`PolicyDecision`] is the single outcome of the decision pipeline. It
//! carries the decision proper, the engine that produced it, a confidence,
//! and the symbolic constraint and obligation directives the enforcement
//! layer interprets. Fail-safe constructors guarantee that error paths can
//! only produce `Deny` or `Indeterminate`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::PolicyId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Tri-valued policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// The request may proceed.
    Permit,
    /// The request is rejected.
    Deny,
    /// No confident decision; the gateway treats this as a denial.
    Indeterminate,
}

impl Decision {
    /// Returns a stable label for the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permit => "PERMIT",
            Self::Deny => "DENY",
            Self::Indeterminate => "INDETERMINATE",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionEngine {
    /// Deterministic structured-rule evaluation.
    Rule,
    /// AI judgment over the natural-language policy text.
    Ai,
    /// Combination of rule and AI outputs.
    Hybrid,
    /// Served from the decision cache.
    Cache,
    /// Fail-secure fallback on internal error.
    FailSafe,
}

impl DecisionEngine {
    /// Returns a stable label for the engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rule => "RULE",
            Self::Ai => "AI",
            Self::Hybrid => "HYBRID",
            Self::Cache => "CACHE",
            Self::FailSafe => "FAIL_SAFE",
        }
    }
}

// ============================================================================
// SECTION: Directives
// ============================================================================

/// Symbolic constraint directive applied to permitted response data.
///
/// Examples: `anonymize:email,phone`, `rate-limit:10/60s`,
/// `geo-restrict:US,CA`. Interpretation belongs to the enforcement layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintDirective(String);

impl ConstraintDirective {
    /// Creates a new constraint directive.
    #[must_use]
    pub fn new(directive: impl Into<String>) -> Self {
        Self(directive.into())
    }

    /// Returns the directive as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConstraintDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ConstraintDirective {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Symbolic obligation directive executed after a decision.
///
/// Examples: `audit`, `notify:security-hook`, `lifecycle:delete:86400`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObligationDirective(String);

impl ObligationDirective {
    /// Creates a new obligation directive.
    #[must_use]
    pub fn new(directive: impl Into<String>) -> Self {
        Self(directive.into())
    }

    /// Returns the directive as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObligationDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ObligationDirective {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Policy Decision
// ============================================================================

/// Result of evaluating a request against policy.
///
/// # Invariants
/// - `confidence` stays within `[0, 1]`.
/// - Error paths construct decisions only through the fail-safe helpers, so
///   `engine == FailSafe` implies `decision != Permit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// The decision proper.
    pub decision: Decision,
    /// Human-readable reason, sanitized for client display.
    pub reason: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Constraint directives to apply to the response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintDirective>,
    /// Obligation directives to execute after the decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligations: Vec<ObligationDirective>,
    /// Engine that produced the decision.
    pub engine: DecisionEngine,
    /// Evaluation timestamp.
    pub evaluated_at: Timestamp,
    /// Policy the decision was evaluated under, when one was selected.
    pub policy_id: Option<PolicyId>,
}

impl PolicyDecision {
    /// Builds a fail-secure denial for internal errors.
    #[must_use]
    pub fn fail_safe_deny(reason: impl Into<String>, evaluated_at: Timestamp) -> Self {
        Self {
            decision: Decision::Deny,
            reason: reason.into(),
            confidence: 1.0,
            constraints: Vec::new(),
            obligations: Vec::new(),
            engine: DecisionEngine::FailSafe,
            evaluated_at,
            policy_id: None,
        }
    }

    /// Builds a fail-secure indeterminate outcome for internal errors.
    #[must_use]
    pub fn fail_safe_indeterminate(reason: impl Into<String>, evaluated_at: Timestamp) -> Self {
        Self {
            decision: Decision::Indeterminate,
            reason: reason.into(),
            confidence: 0.0,
            constraints: Vec::new(),
            obligations: Vec::new(),
            engine: DecisionEngine::FailSafe,
            evaluated_at,
            policy_id: None,
        }
    }

    /// Returns true when the request may proceed.
    #[must_use]
    pub fn is_permit(&self) -> bool {
        self.decision == Decision::Permit
    }
}

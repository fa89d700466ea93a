// crates/warden-core/src/core/policy.rs
// ============================================================================
// Module: Warden Policy Model
// Description: Policies, rules, patterns, and constraint trees.
// Purpose: Define the structured facets evaluated by the rule layer.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A policy is a named natural-language rule set with optional structured
//! permission and prohibition rules. The natural-language text is the source
//! of truth handed to the Judge when the rule layer is inapplicable; the
//! structured rules are what the deterministic evaluator consumes. Active
//! policies must validate: non-empty text and a bounded constraint depth.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::decision::ConstraintDirective;
use crate::core::decision::ObligationDirective;
use crate::core::identifiers::PolicyId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum nesting depth accepted for constraint trees.
pub const MAX_CONSTRAINT_DEPTH: usize = 16;

// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Glob-like pattern over actions and resource URIs.
///
/// `*` matches everything, `prefix*` matches by prefix, `*suffix` matches by
/// suffix, `*infix*` matches by containment, anything else matches exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern(String);

impl Pattern {
    /// Creates a new pattern.
    #[must_use]
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    /// Returns the raw pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the pattern matches the candidate string.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let pattern = self.0.as_str();
        if pattern == "*" {
            return true;
        }
        match (pattern.strip_prefix('*'), pattern.strip_suffix('*')) {
            (Some(stripped), Some(_)) => {
                let infix = stripped.strip_suffix('*').unwrap_or(stripped);
                candidate.contains(infix)
            }
            (Some(suffix), None) => candidate.ends_with(suffix),
            (None, Some(prefix)) => candidate.starts_with(prefix),
            (None, None) => candidate == pattern,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Pattern {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Applicability filter selecting which requests a policy governs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicability {
    /// Action pattern the request action must match.
    pub action: Pattern,
    /// Resource pattern the request resource must match.
    pub resource: Pattern,
}

impl Applicability {
    /// Applicability matching every request.
    #[must_use]
    pub fn any() -> Self {
        Self {
            action: Pattern::new("*"),
            resource: Pattern::new("*"),
        }
    }
}

// ============================================================================
// SECTION: Constraint Tree
// ============================================================================

/// Comparison operators usable in constraint leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintOperator {
    /// Equality.
    Eq,
    /// Inequality.
    Neq,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Lteq,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Gteq,
    /// Set membership.
    In,
    /// Set exclusion.
    NotIn,
}

/// Left-operand keys resolvable from an enriched decision context.
///
/// Unknown keys fall through to [`OperandKey::Environment`], which resolves
/// against the namespaced environment layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperandKey {
    /// Normalized `HH:MM:SS` time of day.
    TimeOfDay,
    /// Lowercase English day of week.
    DayOfWeek,
    /// Calling agent identifier.
    Agent,
    /// Agent type label.
    AgentType,
    /// Trust score in `[0, 1]`.
    TrustScore,
    /// Resource classification label.
    ResourceClassification,
    /// Country resolved from the client IP.
    IpCountry,
    /// Emergency flag from the environment.
    Emergency,
    /// Fully qualified environment key.
    Environment(String),
}

impl From<String> for OperandKey {
    fn from(value: String) -> Self {
        match value.as_str() {
            "timeOfDay" => Self::TimeOfDay,
            "dayOfWeek" => Self::DayOfWeek,
            "agent" => Self::Agent,
            "agentType" => Self::AgentType,
            "trustScore" => Self::TrustScore,
            "resourceClassification" => Self::ResourceClassification,
            "ipCountry" => Self::IpCountry,
            "emergency" => Self::Emergency,
            _ => Self::Environment(value),
        }
    }
}

impl From<OperandKey> for String {
    fn from(value: OperandKey) -> Self {
        match value {
            OperandKey::TimeOfDay => "timeOfDay".to_string(),
            OperandKey::DayOfWeek => "dayOfWeek".to_string(),
            OperandKey::Agent => "agent".to_string(),
            OperandKey::AgentType => "agentType".to_string(),
            OperandKey::TrustScore => "trustScore".to_string(),
            OperandKey::ResourceClassification => "resourceClassification".to_string(),
            OperandKey::IpCountry => "ipCountry".to_string(),
            OperandKey::Emergency => "emergency".to_string(),
            OperandKey::Environment(key) => key,
        }
    }
}

/// Constraint tree node: a comparison leaf or a boolean combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstraintNode {
    /// Conjunction of child constraints.
    All {
        /// Child constraints that must all hold.
        and: Vec<ConstraintNode>,
    },
    /// Disjunction of child constraints.
    Any {
        /// Child constraints of which at least one must hold.
        or: Vec<ConstraintNode>,
    },
    /// Negation of a child constraint.
    Not {
        /// Child constraint that must not hold.
        not: Box<ConstraintNode>,
    },
    /// Comparison leaf.
    #[serde(rename_all = "camelCase")]
    Leaf {
        /// Operand resolved from the decision context.
        left_operand: OperandKey,
        /// Comparison operator.
        operator: ConstraintOperator,
        /// Literal right-hand value.
        right_operand: Value,
    },
}

impl ConstraintNode {
    /// Returns the nesting depth of the tree.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf {
                ..
            } => 1,
            Self::Not {
                not,
            } => 1 + not.depth(),
            Self::All {
                and: children,
            }
            | Self::Any {
                or: children,
            } => 1 + children.iter().map(Self::depth).max().unwrap_or(0),
        }
    }
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// A single structured permission or prohibition rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Action pattern the request action must match.
    pub action: Pattern,
    /// Target pattern the request resource must match.
    pub target: Pattern,
    /// Optional constraint tree gating the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<ConstraintNode>,
    /// Response-transforming directives attached when the rule fires.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintDirective>,
    /// Obligations attached when the rule fires.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duties: Vec<ObligationDirective>,
    /// Rule priority; higher evaluates first.
    #[serde(default)]
    pub priority: i64,
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Lifecycle status of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    /// Draft policies are never selected for evaluation.
    Draft,
    /// Active policies participate in selection.
    Active,
    /// Deprecated policies are retained but never selected.
    Deprecated,
}

/// A named natural-language rule set with structured facets.
///
/// # Invariants
/// - `natural_language_text` is always present and is the canonical source
///   handed to the Judge.
/// - Active policies pass [`Policy::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy identifier.
    pub id: PolicyId,
    /// Human-readable policy name.
    pub name: String,
    /// Selection priority; higher wins.
    pub priority: i64,
    /// Lifecycle status.
    pub status: PolicyStatus,
    /// Canonical natural-language rule text.
    pub natural_language_text: String,
    /// Applicability filter for policy selection.
    pub applicability: Applicability,
    /// Structured permission rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<PolicyRule>,
    /// Structured prohibition rules.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prohibitions: Vec<PolicyRule>,
    /// Semver version of this policy revision.
    pub version: String,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last update timestamp.
    pub updated_at: Timestamp,
}

/// Policy validation errors.
#[derive(Debug, Error)]
pub enum PolicyValidationError {
    /// Natural-language text is empty.
    #[error("policy text is empty")]
    EmptyText,
    /// A constraint tree exceeds the depth bound.
    #[error("constraint depth {depth} exceeds bound {bound}")]
    ConstraintTooDeep {
        /// Observed depth.
        depth: usize,
        /// Configured bound.
        bound: usize,
    },
    /// A rule pattern is empty.
    #[error("rule pattern is empty")]
    EmptyPattern,
}

impl Policy {
    /// Validates structural invariants for this policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyValidationError`] when the text is empty, a pattern is
    /// empty, or a constraint tree exceeds [`MAX_CONSTRAINT_DEPTH`].
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        if self.natural_language_text.trim().is_empty() {
            return Err(PolicyValidationError::EmptyText);
        }
        for rule in self.prohibitions.iter().chain(self.permissions.iter()) {
            if rule.action.as_str().is_empty() || rule.target.as_str().is_empty() {
                return Err(PolicyValidationError::EmptyPattern);
            }
            if let Some(constraint) = &rule.constraint {
                let depth = constraint.depth();
                if depth > MAX_CONSTRAINT_DEPTH {
                    return Err(PolicyValidationError::ConstraintTooDeep {
                        depth,
                        bound: MAX_CONSTRAINT_DEPTH,
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns true when this policy may be selected for the given request.
    #[must_use]
    pub fn applies_to(&self, action: &str, resource: &str) -> bool {
        self.status == PolicyStatus::Active
            && self.applicability.action.matches(action)
            && self.applicability.resource.matches(resource)
    }
}

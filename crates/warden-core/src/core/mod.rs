// crates/warden-core/src/core/mod.rs
// ============================================================================
// Module: Warden Core Types
// Description: Canonical data model for contexts, policies, and decisions.
// Purpose: Group the leaf type modules behind one namespace.
// Dependencies: crate::core submodules
// ============================================================================

//! ## Overview
//! The core namespace holds the data model every other Warden crate builds
//! on: identifiers, timestamps, canonical hashing, the decision context, the
//! policy model, decision outcomes, and audit records.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod context;
pub mod decision;
pub mod hashing;
pub mod identifiers;
pub mod policy;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditRecord;
pub use audit::ObligationOutcome;
pub use context::ActionKind;
pub use context::DecisionContext;
pub use context::EnvironmentLayer;
pub use context::ResourceUri;
pub use context::UNKNOWN_AGENT_TRUST_SCORE;
pub use context::UNKNOWN_AGENT_TYPE;
pub use decision::ConstraintDirective;
pub use decision::Decision;
pub use decision::DecisionEngine;
pub use decision::ObligationDirective;
pub use decision::PolicyDecision;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::AgentId;
pub use identifiers::CorrelationId;
pub use identifiers::PolicyId;
pub use identifiers::SessionId;
pub use identifiers::ToolName;
pub use identifiers::UpstreamName;
pub use policy::Applicability;
pub use policy::ConstraintNode;
pub use policy::ConstraintOperator;
pub use policy::MAX_CONSTRAINT_DEPTH;
pub use policy::OperandKey;
pub use policy::Pattern;
pub use policy::Policy;
pub use policy::PolicyRule;
pub use policy::PolicyStatus;
pub use policy::PolicyValidationError;
pub use time::Timestamp;

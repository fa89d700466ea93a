// crates/warden-core/src/lib.rs
// ============================================================================
// Module: Warden Core Library
// Description: Public API surface for the Warden core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime, wire}
// ============================================================================

//! ## Overview
//! Warden core provides the data model, contract interfaces, and runtime
//! machinery of the policy enforcement path: decision contexts, policies,
//! the hybrid decision pipeline, the decision cache, and the reliability
//! substrate. It is transport-agnostic and integrates through explicit
//! interfaces rather than embedding into any particular backend.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod wire;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::Alert;
pub use interfaces::AlertSeverity;
pub use interfaces::AlertSink;
pub use interfaces::AuditSink;
pub use interfaces::AuditSinkError;
pub use interfaces::ConstraintFailure;
pub use interfaces::ConstraintProcessor;
pub use interfaces::Enricher;
pub use interfaces::EnricherError;
pub use interfaces::Judge;
pub use interfaces::JudgeError;
pub use interfaces::Judgment;
pub use interfaces::NoopAlertSink;
pub use interfaces::ObligationError;
pub use interfaces::ObligationExecutor;
pub use interfaces::PolicyFilter;
pub use interfaces::PolicyStore;
pub use interfaces::PolicyStoreError;
pub use interfaces::StubJudge;
pub use runtime::BatchConfig;
pub use runtime::BatchJudge;
pub use runtime::CacheConfig;
pub use runtime::CacheKey;
pub use runtime::CircuitBreaker;
pub use runtime::CircuitConfig;
pub use runtime::CircuitMode;
pub use runtime::CircuitOpenError;
pub use runtime::CircuitRegistry;
pub use runtime::CollectorConfig;
pub use runtime::ContextCollector;
pub use runtime::ContextVolatility;
pub use runtime::DecisionCache;
pub use runtime::DecisionPipeline;
pub use runtime::PipelineConfig;
pub use runtime::RetryPolicy;
pub use runtime::RuleEvaluation;
pub use runtime::RuleEvaluator;

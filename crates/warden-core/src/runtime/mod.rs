// crates/warden-core/src/runtime/mod.rs
// ============================================================================
// Module: Warden Runtime
// Description: Decision pipeline machinery and reliability primitives.
// Purpose: Group the evaluation, caching, and reliability modules.
// Dependencies: crate::runtime submodules
// ============================================================================

//! ## Overview
//! The runtime namespace holds the moving parts of the enforcement path:
//! context collection, rule evaluation, the decision cache, hybrid
//! combination, the pipeline engine, batch judgment, and the circuit and
//! retry substrate shared by upstream and obligation handling.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod batch;
pub mod cache;
pub mod circuit;
pub mod collector;
pub mod combine;
pub mod pipeline;
pub mod retry;
pub mod rules;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use batch::BatchConfig;
pub use batch::BatchJudge;
pub use cache::CacheConfig;
pub use cache::CacheKey;
pub use cache::ContextVolatility;
pub use cache::DecisionCache;
pub use circuit::CircuitBreaker;
pub use circuit::CircuitConfig;
pub use circuit::CircuitMode;
pub use circuit::CircuitOpenError;
pub use circuit::CircuitRegistry;
pub use collector::CollectorConfig;
pub use collector::ContextCollector;
pub use combine::CombineInputs;
pub use combine::blended_confidence;
pub use combine::combine;
pub use pipeline::DecisionPipeline;
pub use pipeline::PipelineConfig;
pub use retry::RetryPolicy;
pub use rules::RuleEvaluation;
pub use rules::RuleEvaluator;

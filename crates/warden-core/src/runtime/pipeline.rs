// crates/warden-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Warden Decision Pipeline
// Description: Policy selection, caching, hybrid evaluation, and combination.
// Purpose: Produce exactly one fail-secure decision per admitted request.
// Dependencies: crate::core, crate::interfaces, crate::runtime, tokio
// ============================================================================

//! ## Overview
//! The pipeline runs the full decision sequence: select the governing
//! policy, consult the cache, evaluate structured rules, fall back to the
//! AI judge, combine the outputs, and write the result back to the cache.
//! Every internal error resolves to a fail-safe `Deny` or `Indeterminate`;
//! there is no code path that turns an error into a permit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::core::DecisionContext;
use crate::core::Policy;
use crate::core::PolicyDecision;
use crate::core::PolicyId;
use crate::interfaces::Judge;
use crate::interfaces::Judgment;
use crate::interfaces::PolicyStore;
use crate::interfaces::PolicyStoreError;
use crate::runtime::cache::CacheKey;
use crate::runtime::cache::ContextVolatility;
use crate::runtime::cache::DecisionCache;
use crate::runtime::combine::CombineInputs;
use crate::runtime::combine::combine;
use crate::runtime::rules::RuleEvaluation;
use crate::runtime::rules::RuleEvaluator;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Decision pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum AI confidence for a standalone AI verdict (default 0.7).
    pub ai_confidence_threshold: f64,
    /// Judge call timeout in milliseconds.
    pub judge_timeout_ms: u64,
    /// Policy applied when no active policy matches the request.
    pub default_policy_id: PolicyId,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ai_confidence_threshold: 0.7,
            judge_timeout_ms: 10_000,
            default_policy_id: PolicyId::new("default"),
        }
    }
}

// ============================================================================
// SECTION: Pipeline Errors
// ============================================================================

/// Internal pipeline errors; all resolve to fail-safe decisions.
#[derive(Debug, Error)]
enum PipelineError {
    /// The policy store could not be read.
    #[error("policy store unavailable: {0}")]
    Store(#[from] PolicyStoreError),
}

// ============================================================================
// SECTION: Decision Pipeline
// ============================================================================

/// The decision pipeline over store, cache, and judge.
pub struct DecisionPipeline {
    /// Policy administration store.
    store: Arc<dyn PolicyStore>,
    /// Decision cache.
    cache: Arc<DecisionCache>,
    /// AI judge (possibly batched, possibly a stub).
    judge: Arc<dyn Judge>,
    /// Pipeline configuration.
    config: PipelineConfig,
}

impl DecisionPipeline {
    /// Creates a pipeline over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn PolicyStore>,
        cache: Arc<DecisionCache>,
        judge: Arc<dyn Judge>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            judge,
            config,
        }
    }

    /// Returns the decision cache for administration operations.
    #[must_use]
    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }

    /// Decides the request; never errors and never permits on failure.
    pub async fn decide(&self, context: &Arc<DecisionContext>) -> PolicyDecision {
        match self.decide_inner(context).await {
            Ok(decision) => decision,
            Err(err) => PolicyDecision::fail_safe_indeterminate(err.to_string(), context.time),
        }
    }

    /// Runs the decision sequence, surfacing internal errors.
    async fn decide_inner(
        &self,
        context: &Arc<DecisionContext>,
    ) -> Result<PolicyDecision, PipelineError> {
        let policy = self.select_policy(context)?;
        let key = CacheKey::from_context(context, &policy.id);
        let fingerprint = context.fingerprint();
        if let Some(hit) = self.cache.lookup(&key, &fingerprint, context.time) {
            return Ok(hit);
        }

        let rule = RuleEvaluator::evaluate(&policy, context);
        let judgment = if needs_judge(&rule, self.config.ai_confidence_threshold) {
            self.consult_judge(context, &policy).await
        } else {
            None
        };

        let decision = combine(&CombineInputs {
            rule: &rule,
            judgment: judgment.as_ref(),
            ai_confidence_threshold: self.config.ai_confidence_threshold,
            policy_id: &policy.id,
            evaluated_at: context.time,
        });

        self.cache.insert(&key, fingerprint, decision.clone(), context.time, volatility(context));
        Ok(decision)
    }

    /// Selects the highest-priority applicable active policy.
    ///
    /// Active policies come back ordered by descending priority with the
    /// lexicographically smaller id breaking ties; the configured default
    /// policy is the fallback when nothing matches.
    fn select_policy(&self, context: &DecisionContext) -> Result<Arc<Policy>, PipelineError> {
        let active = self.store.active_policies()?;
        for policy in active {
            if policy.applies_to(context.action.as_str(), context.resource.as_str()) {
                return Ok(policy);
            }
        }
        Ok(self.store.get(&self.config.default_policy_id)?)
    }

    /// Consults the judge under the pipeline timeout; errors yield `None`.
    async fn consult_judge(
        &self,
        context: &Arc<DecisionContext>,
        policy: &Policy,
    ) -> Option<Judgment> {
        let deadline = Duration::from_millis(self.config.judge_timeout_ms);
        let call = self.judge.judge(context, &policy.natural_language_text);
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(judgment)) => Some(judgment),
            Ok(Err(_)) | Err(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true when the AI layer must be consulted.
fn needs_judge(rule: &RuleEvaluation, confidence_threshold: f64) -> bool {
    match rule {
        RuleEvaluation::NotApplicable => true,
        RuleEvaluation::Decided {
            confidence, ..
        } => *confidence < confidence_threshold,
    }
}

/// Classifies context volatility for cache TTL derivation.
fn volatility(context: &DecisionContext) -> ContextVolatility {
    let threat = context
        .environment
        .get("security.threatLevel")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("none");
    let emergency = context
        .environment
        .get("security.emergency")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    if emergency || !matches!(threat, "none" | "low") {
        ContextVolatility::Volatile
    } else {
        ContextVolatility::Static
    }
}

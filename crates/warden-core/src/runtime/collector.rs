// crates/warden-core/src/runtime/collector.rs
// ============================================================================
// Module: Warden Context Collector
// Description: Ordered enrichment pipeline producing sealed contexts.
// Purpose: Turn a raw request plus session data into a DecisionContext.
// Dependencies: crate::core, crate::interfaces, tokio
// ============================================================================

//! ## Overview
//! The collector runs a fixed ordered list of enrichers, each pure and
//! side-effect-free, each bounded by a per-enricher deadline. Failures are
//! reported as advisory alerts and treated as empty output; the pipeline is
//! never blocked by a misbehaving enricher. After the last enricher runs,
//! the well-known facets are lifted out of the environment layer and the
//! context is sealed behind `Arc`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::core::DecisionContext;
use crate::core::Timestamp;
use crate::core::UNKNOWN_AGENT_TRUST_SCORE;
use crate::core::UNKNOWN_AGENT_TYPE;
use crate::interfaces::Alert;
use crate::interfaces::AlertSeverity;
use crate::interfaces::AlertSink;
use crate::interfaces::Enricher;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Context collector configuration.
#[derive(Debug, Clone, Copy)]
pub struct CollectorConfig {
    /// Per-enricher deadline in milliseconds.
    pub enricher_timeout_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enricher_timeout_ms: 250,
        }
    }
}

// ============================================================================
// SECTION: Context Collector
// ============================================================================

/// Ordered enrichment pipeline.
pub struct ContextCollector {
    /// Enrichers in execution order.
    enrichers: Vec<Arc<dyn Enricher>>,
    /// Per-enricher deadline.
    deadline: Duration,
    /// Sink for enricher-failure advisories.
    alerts: Arc<dyn AlertSink>,
}

impl ContextCollector {
    /// Creates a collector over the given enrichers.
    #[must_use]
    pub fn new(
        enrichers: Vec<Arc<dyn Enricher>>,
        config: CollectorConfig,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            enrichers,
            deadline: Duration::from_millis(config.enricher_timeout_ms),
            alerts,
        }
    }

    /// Runs the enrichment pipeline and seals the context.
    pub async fn collect(&self, seed: DecisionContext) -> Arc<DecisionContext> {
        let mut context = seed;
        for enricher in &self.enrichers {
            let outcome = tokio::time::timeout(self.deadline, enricher.enrich(&context)).await;
            match outcome {
                Ok(Ok(output)) => context.environment.merge(enricher.namespace(), output),
                Ok(Err(err)) => self.report(enricher.as_ref(), &err.to_string()),
                Err(_) => self.report(enricher.as_ref(), "deadline exceeded"),
            }
        }
        lift_facets(&mut context);
        Arc::new(context)
    }

    /// Reports an enricher failure without failing the pipeline.
    fn report(&self, enricher: &dyn Enricher, detail: &str) {
        if enricher.best_effort() {
            return;
        }
        self.alerts.raise(&Alert {
            severity: AlertSeverity::Advisory,
            source: format!("enricher:{}", enricher.namespace()),
            message: detail.to_string(),
            timestamp: Timestamp::now(),
        });
    }
}

// ============================================================================
// SECTION: Facet Lifting
// ============================================================================

/// Lifts well-known facets out of the environment layer.
fn lift_facets(context: &mut DecisionContext) {
    context.trust_score = context
        .environment
        .get("agent.trustScore")
        .and_then(serde_json::Value::as_f64)
        .map_or(UNKNOWN_AGENT_TRUST_SCORE, |score| score.clamp(0.0, 1.0));
    context.agent_type = context
        .environment
        .get("agent.agentType")
        .and_then(serde_json::Value::as_str)
        .unwrap_or(UNKNOWN_AGENT_TYPE)
        .to_string();
    context.clearance_level = context
        .environment
        .get("agent.clearanceLevel")
        .and_then(serde_json::Value::as_u64)
        .and_then(|level| u8::try_from(level).ok())
        .unwrap_or(0);
    if let Some(sensitivity) =
        context.environment.get("resource.sensitivity").and_then(serde_json::Value::as_str)
    {
        context.resource_classification = sensitivity.to_string();
    }
}

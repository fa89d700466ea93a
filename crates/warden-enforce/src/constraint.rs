// crates/warden-enforce/src/constraint.rs
// ============================================================================
// Module: Warden Constraint Pipeline
// Description: Ordered application of constraint processors to responses.
// Purpose: Transform permitted response data and surface critical failures.
// Dependencies: warden-core, crate processors
// ============================================================================

//! ## Overview
//! After a permit, every constraint directive on the decision runs through
//! the processor list in order. Critical failures abort the response and
//! convert the permit into a policy-violation denial; soft failures raise a
//! warning and leave the data unchanged. A directive no processor claims is
//! a critical failure: what cannot be enforced is not returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use warden_core::Alert;
use warden_core::AlertSeverity;
use warden_core::AlertSink;
use warden_core::ConstraintDirective;
use warden_core::ConstraintFailure;
use warden_core::ConstraintProcessor;
use warden_core::DecisionContext;
use warden_core::Timestamp;

// ============================================================================
// SECTION: Pipeline Output
// ============================================================================

/// Successful pipeline application.
#[derive(Debug)]
pub struct ConstraintApplication {
    /// Transformed response data.
    pub data: Value,
    /// Directives that were applied, in order.
    pub applied: Vec<String>,
}

// ============================================================================
// SECTION: Constraint Pipeline
// ============================================================================

/// Ordered constraint processor pipeline.
pub struct ConstraintPipeline {
    /// Processors in application order.
    processors: Vec<Arc<dyn ConstraintProcessor>>,
    /// Sink for soft-failure warnings.
    alerts: Arc<dyn AlertSink>,
}

impl ConstraintPipeline {
    /// Creates the pipeline over the given processors.
    #[must_use]
    pub fn new(processors: Vec<Arc<dyn ConstraintProcessor>>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            processors,
            alerts,
        }
    }

    /// Applies every directive in order to the response data.
    ///
    /// # Errors
    ///
    /// Returns the first critical [`ConstraintFailure`]; the caller converts
    /// it into a policy-violation denial.
    pub fn apply(
        &self,
        directives: &[ConstraintDirective],
        data: Value,
        context: &DecisionContext,
    ) -> Result<ConstraintApplication, ConstraintFailure> {
        let mut current = data;
        let mut applied = Vec::new();
        for directive in directives {
            let Some(processor) =
                self.processors.iter().find(|processor| processor.handles(directive))
            else {
                return Err(ConstraintFailure::critical(format!(
                    "no processor enforces directive {directive}"
                )));
            };
            let before = current.clone();
            match processor.apply(directive, current, context) {
                Ok(next) => {
                    current = next;
                    applied.push(directive.as_str().to_string());
                }
                Err(failure) if failure.critical => return Err(failure),
                Err(failure) => {
                    self.alerts.raise(&Alert {
                        severity: AlertSeverity::Warning,
                        source: format!("constraint:{}", processor.name()),
                        message: failure.reason,
                        timestamp: Timestamp::now(),
                    });
                    current = before;
                }
            }
        }
        Ok(ConstraintApplication {
            data: current,
            applied,
        })
    }
}

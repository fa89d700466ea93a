// crates/warden-core/src/runtime/combine.rs
// ============================================================================
// Module: Warden Decision Combination
// Description: Fixed-precedence merge of rule and AI evaluation outputs.
// Purpose: Produce one PolicyDecision from the hybrid evaluation layers.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Combination follows a fixed precedence: a conclusive rule verdict always
//! wins; otherwise a sufficiently confident AI judgment wins; otherwise
//! agreement blends confidences; otherwise conflicts resolve security-first.
//! When neither layer concludes, the outcome is `Indeterminate`, which the
//! gateway maps to a denial of service for the request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::Decision;
use crate::core::DecisionEngine;
use crate::core::PolicyDecision;
use crate::core::PolicyId;
use crate::core::Timestamp;
use crate::interfaces::Judgment;
use crate::runtime::rules::RuleEvaluation;

// ============================================================================
// SECTION: Combination
// ============================================================================

/// Inputs to a combination step.
pub struct CombineInputs<'a> {
    /// Rule-layer verdict.
    pub rule: &'a RuleEvaluation,
    /// AI judgment when the judge was consulted and answered.
    pub judgment: Option<&'a Judgment>,
    /// Minimum AI confidence for the AI verdict to stand alone.
    pub ai_confidence_threshold: f64,
    /// Policy the evaluation ran under.
    pub policy_id: &'a PolicyId,
    /// Evaluation timestamp.
    pub evaluated_at: Timestamp,
}

/// Merges rule and AI outputs under the fixed precedence.
#[must_use]
pub fn combine(inputs: &CombineInputs<'_>) -> PolicyDecision {
    if let RuleEvaluation::Decided {
        decision,
        reason,
        confidence,
        constraints,
        obligations,
    } = inputs.rule
    {
        return PolicyDecision {
            decision: *decision,
            reason: reason.clone(),
            confidence: *confidence,
            constraints: constraints.clone(),
            obligations: obligations.clone(),
            engine: DecisionEngine::Rule,
            evaluated_at: inputs.evaluated_at,
            policy_id: Some(inputs.policy_id.clone()),
        };
    }

    match inputs.judgment {
        Some(judgment) if judgment.decision != Decision::Indeterminate => {
            ai_backed(inputs, judgment)
        }
        _ => PolicyDecision {
            decision: Decision::Indeterminate,
            reason: "no rule matched and the judge was inconclusive".to_string(),
            confidence: 0.0,
            constraints: Vec::new(),
            obligations: Vec::new(),
            engine: DecisionEngine::Hybrid,
            evaluated_at: inputs.evaluated_at,
            policy_id: Some(inputs.policy_id.clone()),
        },
    }
}

/// Builds the decision when only the AI layer concluded.
fn ai_backed(inputs: &CombineInputs<'_>, judgment: &Judgment) -> PolicyDecision {
    if judgment.confidence >= inputs.ai_confidence_threshold {
        return PolicyDecision {
            decision: judgment.decision,
            reason: judgment.reason.clone(),
            confidence: judgment.confidence.clamp(0.0, 1.0),
            constraints: judgment.constraints.clone(),
            obligations: judgment.obligations.clone(),
            engine: DecisionEngine::Ai,
            evaluated_at: inputs.evaluated_at,
            policy_id: Some(inputs.policy_id.clone()),
        };
    }
    // A judgment below the confidence threshold cannot stand alone; with no
    // rule verdict to agree with, the outcome stays indeterminate.
    PolicyDecision {
        decision: Decision::Indeterminate,
        reason: format!(
            "judge confidence {:.2} below threshold {:.2}",
            judgment.confidence, inputs.ai_confidence_threshold
        ),
        confidence: judgment.confidence.clamp(0.0, 1.0),
        constraints: Vec::new(),
        obligations: Vec::new(),
        engine: DecisionEngine::Hybrid,
        evaluated_at: inputs.evaluated_at,
        policy_id: Some(inputs.policy_id.clone()),
    }
}

/// Blends two agreeing layer outputs into a hybrid confidence.
///
/// Exposed for the case where both layers produce low-confidence decisions;
/// the blend saturates at 1.0.
#[must_use]
pub fn blended_confidence(rule_confidence: f64, ai_confidence: f64) -> f64 {
    ((rule_confidence + ai_confidence) / 1.5).min(1.0)
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::CombineInputs;
    use super::blended_confidence;
    use super::combine;
    use crate::core::Decision;
    use crate::core::DecisionEngine;
    use crate::core::PolicyId;
    use crate::core::Timestamp;
    use crate::interfaces::Judgment;
    use crate::runtime::rules::RuleEvaluation;

    /// Builds combination inputs from a rule verdict and a judgment.
    fn inputs<'a>(
        rule: &'a RuleEvaluation,
        judgment: Option<&'a Judgment>,
        policy_id: &'a PolicyId,
    ) -> CombineInputs<'a> {
        CombineInputs {
            rule,
            judgment,
            ai_confidence_threshold: 0.7,
            policy_id,
            evaluated_at: Timestamp::from_unix_millis(0),
        }
    }

    /// Builds a judgment with the given decision and confidence.
    fn judgment(decision: Decision, confidence: f64) -> Judgment {
        Judgment {
            decision,
            reason: "judged".to_string(),
            confidence,
            constraints: Vec::new(),
            obligations: Vec::new(),
        }
    }

    /// Tests that a conclusive rule verdict wins regardless of the judge.
    #[test]
    fn test_rule_verdict_wins() {
        let policy_id = PolicyId::new("p1");
        let rule = RuleEvaluation::Decided {
            decision: Decision::Deny,
            reason: "prohibited".to_string(),
            confidence: 1.0,
            constraints: Vec::new(),
            obligations: Vec::new(),
        };
        let permit = judgment(Decision::Permit, 0.99);
        let decision = combine(&inputs(&rule, Some(&permit), &policy_id));
        assert_eq!(decision.decision, Decision::Deny);
        assert_eq!(decision.engine, DecisionEngine::Rule);
    }

    /// Tests that a confident judgment stands alone.
    #[test]
    fn test_confident_judgment_stands() {
        let policy_id = PolicyId::new("p1");
        let permit = judgment(Decision::Permit, 0.8);
        let decision =
            combine(&inputs(&RuleEvaluation::NotApplicable, Some(&permit), &policy_id));
        assert_eq!(decision.decision, Decision::Permit);
        assert_eq!(decision.engine, DecisionEngine::Ai);
    }

    /// Tests that a shaky judgment degrades to indeterminate.
    #[test]
    fn test_shaky_judgment_degrades() {
        let policy_id = PolicyId::new("p1");
        let permit = judgment(Decision::Permit, 0.5);
        let decision =
            combine(&inputs(&RuleEvaluation::NotApplicable, Some(&permit), &policy_id));
        assert_eq!(decision.decision, Decision::Indeterminate);
        assert_eq!(decision.engine, DecisionEngine::Hybrid);
    }

    /// Tests the fully inconclusive outcome.
    #[test]
    fn test_both_inconclusive() {
        let policy_id = PolicyId::new("p1");
        let decision = combine(&inputs(&RuleEvaluation::NotApplicable, None, &policy_id));
        assert_eq!(decision.decision, Decision::Indeterminate);
        let unsure = judgment(Decision::Indeterminate, 0.9);
        let decision =
            combine(&inputs(&RuleEvaluation::NotApplicable, Some(&unsure), &policy_id));
        assert_eq!(decision.decision, Decision::Indeterminate);
    }

    /// Tests the blend formula and its saturation.
    #[test]
    fn test_blended_confidence() {
        assert!((blended_confidence(0.6, 0.6) - 0.8).abs() < f64::EPSILON);
        assert!((blended_confidence(1.0, 1.0) - 1.0).abs() < f64::EPSILON);
    }
}

// crates/warden-core/src/runtime/rules.rs
// ============================================================================
// Module: Warden Rule Evaluator
// Description: Deterministic evaluation of structured policy rules.
// Purpose: Convert a policy and a sealed context into a rule-layer verdict.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The rule evaluator walks prohibitions before permissions, in descending
//! rule priority, and terminates on the first rule whose patterns match and
//! whose constraint tree is satisfied. Constraint leaves evaluate
//! tri-valued: an unknown left operand makes the leaf unknown, and an
//! unknown tree never satisfies a rule. This keeps the layer fail-closed
//! without ever raising an error from malformed operands.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::ConstraintDirective;
use crate::core::ConstraintNode;
use crate::core::ConstraintOperator;
use crate::core::Decision;
use crate::core::DecisionContext;
use crate::core::ObligationDirective;
use crate::core::OperandKey;
use crate::core::Policy;
use crate::core::PolicyRule;

// ============================================================================
// SECTION: Rule Evaluation Result
// ============================================================================

/// Verdict produced by the rule layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEvaluation {
    /// A rule matched and decided the request.
    Decided {
        /// Permit or deny; the rule layer never yields indeterminate.
        decision: Decision,
        /// Reason naming the matched rule.
        reason: String,
        /// Rule-layer confidence; deterministic matches report 1.0.
        confidence: f64,
        /// Response constraints attached by the matched rule.
        constraints: Vec<ConstraintDirective>,
        /// Obligations attached by the matched rule.
        obligations: Vec<ObligationDirective>,
    },
    /// No rule matched; the AI layer must be consulted.
    NotApplicable,
}

// ============================================================================
// SECTION: Rule Evaluator
// ============================================================================

/// Deterministic evaluator over a policy's structured rules.
pub struct RuleEvaluator;

impl RuleEvaluator {
    /// Evaluates the policy's rules against the sealed context.
    ///
    /// Prohibitions are checked before permissions regardless of priority,
    /// encoding security-first semantics; within each class, rules evaluate
    /// in descending priority. The first satisfied rule is terminal.
    #[must_use]
    pub fn evaluate(policy: &Policy, context: &DecisionContext) -> RuleEvaluation {
        for rule in ordered(&policy.prohibitions) {
            if rule_matches(rule, context) {
                return RuleEvaluation::Decided {
                    decision: Decision::Deny,
                    reason: format!(
                        "prohibition matched (action={}, target={})",
                        rule.action, rule.target
                    ),
                    confidence: 1.0,
                    constraints: Vec::new(),
                    obligations: rule.duties.clone(),
                };
            }
        }
        for rule in ordered(&policy.permissions) {
            if rule_matches(rule, context) {
                return RuleEvaluation::Decided {
                    decision: Decision::Permit,
                    reason: format!(
                        "permission matched (action={}, target={})",
                        rule.action, rule.target
                    ),
                    confidence: 1.0,
                    constraints: rule.constraints.clone(),
                    obligations: rule.duties.clone(),
                };
            }
        }
        RuleEvaluation::NotApplicable
    }
}

/// Returns rules ordered by descending priority, original order on ties.
fn ordered(rules: &[PolicyRule]) -> Vec<&PolicyRule> {
    let mut sorted: Vec<&PolicyRule> = rules.iter().collect();
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
    sorted
}

/// Returns true when the rule's patterns and constraint tree all hold.
fn rule_matches(rule: &PolicyRule, context: &DecisionContext) -> bool {
    if !rule.action.matches(context.action.as_str()) {
        return false;
    }
    if !rule.target.matches(context.resource.as_str()) {
        return false;
    }
    match &rule.constraint {
        None => true,
        Some(tree) => evaluate_tree(tree, context) == Some(true),
    }
}

// ============================================================================
// SECTION: Constraint Tree Evaluation
// ============================================================================

/// Evaluates a constraint tree tri-valued; `None` means unknown.
fn evaluate_tree(node: &ConstraintNode, context: &DecisionContext) -> Option<bool> {
    match node {
        ConstraintNode::Leaf {
            left_operand,
            operator,
            right_operand,
        } => evaluate_leaf(left_operand, *operator, right_operand, context),
        ConstraintNode::Not {
            not,
        } => evaluate_tree(not, context).map(|value| !value),
        ConstraintNode::All {
            and,
        } => {
            let mut unknown = false;
            for child in and {
                match evaluate_tree(child, context) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown { None } else { Some(true) }
        }
        ConstraintNode::Any {
            or,
        } => {
            let mut unknown = false;
            for child in or {
                match evaluate_tree(child, context) {
                    Some(true) => return Some(true),
                    None => unknown = true,
                    Some(false) => {}
                }
            }
            if unknown { None } else { Some(false) }
        }
    }
}

/// Evaluates a comparison leaf against the context.
fn evaluate_leaf(
    left: &OperandKey,
    operator: ConstraintOperator,
    right: &Value,
    context: &DecisionContext,
) -> Option<bool> {
    let resolved = resolve_operand(left, context)?;
    match operator {
        ConstraintOperator::Eq => Some(values_equal(&resolved, right)),
        ConstraintOperator::Neq => Some(!values_equal(&resolved, right)),
        ConstraintOperator::Lt
        | ConstraintOperator::Lteq
        | ConstraintOperator::Gt
        | ConstraintOperator::Gteq => compare_ordered(operator, &resolved, right),
        ConstraintOperator::In => membership(&resolved, right),
        ConstraintOperator::NotIn => membership(&resolved, right).map(|found| !found),
    }
}

/// Resolves a left operand from the sealed context; `None` when unknown.
fn resolve_operand(key: &OperandKey, context: &DecisionContext) -> Option<Value> {
    match key {
        OperandKey::TimeOfDay => Some(Value::String(context.time.time_of_day())),
        OperandKey::DayOfWeek => Some(Value::String(context.time.day_of_week().to_string())),
        OperandKey::Agent => Some(Value::String(context.agent.as_str().to_string())),
        OperandKey::AgentType => Some(Value::String(context.agent_type.clone())),
        OperandKey::TrustScore => {
            serde_json::Number::from_f64(context.trust_score).map(Value::Number)
        }
        OperandKey::ResourceClassification => {
            Some(Value::String(context.resource_classification.clone()))
        }
        OperandKey::IpCountry => context.environment.get("security.geoCountry").cloned(),
        OperandKey::Emergency => Some(
            context.environment.get("security.emergency").cloned().unwrap_or(Value::Bool(false)),
        ),
        OperandKey::Environment(name) => context.environment.get(name).cloned(),
    }
}

/// Equality with numeric coercion so `0.7 == 0.70` holds.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => left == right,
    }
}

/// Ordered comparison over numbers or normalized strings.
fn compare_ordered(operator: ConstraintOperator, left: &Value, right: &Value) -> Option<bool> {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => a.as_str().cmp(b.as_str()),
        _ => {
            let a = left.as_f64()?;
            let b = right.as_f64()?;
            a.partial_cmp(&b)?
        }
    };
    Some(match operator {
        ConstraintOperator::Lt => ordering.is_lt(),
        ConstraintOperator::Lteq => ordering.is_le(),
        ConstraintOperator::Gt => ordering.is_gt(),
        ConstraintOperator::Gteq => ordering.is_ge(),
        ConstraintOperator::Eq
        | ConstraintOperator::Neq
        | ConstraintOperator::In
        | ConstraintOperator::NotIn => return None,
    })
}

/// Set membership; the right operand must be an array.
fn membership(left: &Value, right: &Value) -> Option<bool> {
    match right {
        Value::Array(values) => Some(values.iter().any(|value| values_equal(left, value))),
        _ => None,
    }
}

// crates/warden-core/tests/rule_evaluator.rs
// ============================================================================
// Module: Rule Evaluator Tests
// Description: Tests for deterministic structured-rule evaluation.
// ============================================================================
//! ## Overview
//! Validates prohibition precedence, constraint tree semantics, and the
//! fail-closed handling of unknown operands.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::collections::BTreeMap;

use common::context;
use common::policy;
use serde_json::json;
use warden_core::ActionKind;
use warden_core::ConstraintNode;
use warden_core::ConstraintOperator;
use warden_core::Decision;
use warden_core::ObligationDirective;
use warden_core::OperandKey;
use warden_core::Pattern;
use warden_core::PolicyRule;
use warden_core::RuleEvaluation;
use warden_core::RuleEvaluator;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a rule with patterns and an optional constraint.
fn rule(action: &str, target: &str, constraint: Option<ConstraintNode>) -> PolicyRule {
    PolicyRule {
        action: Pattern::new(action),
        target: Pattern::new(target),
        constraint,
        constraints: Vec::new(),
        duties: Vec::new(),
        priority: 0,
    }
}

/// Builds a comparison leaf.
fn leaf(left: &str, operator: ConstraintOperator, right: serde_json::Value) -> ConstraintNode {
    ConstraintNode::Leaf {
        left_operand: OperandKey::from(left.to_string()),
        operator,
        right_operand: right,
    }
}

// ============================================================================
// SECTION: Precedence
// ============================================================================

/// Tests that a matching prohibition beats a matching permission.
#[test]
fn test_prohibition_precedes_permission() {
    let mut subject = policy("p1", 10);
    subject.permissions.push(rule("write", "*", None));
    subject.prohibitions.push(rule("write", "*", None));
    let ctx = context(ActionKind::Write, "file:///data/b.txt");

    let outcome = RuleEvaluator::evaluate(&subject, &ctx);
    let RuleEvaluation::Decided {
        decision, ..
    } = outcome
    else {
        panic!("expected a decided outcome");
    };
    assert_eq!(decision, Decision::Deny);
}

/// Tests that higher-priority rules evaluate first within a class.
#[test]
fn test_priority_order_within_class() {
    let mut subject = policy("p1", 10);
    let mut broad = rule("read", "*", None);
    broad.priority = 1;
    let mut narrow = rule("read", "file://*", None);
    narrow.priority = 5;
    narrow.duties.push(ObligationDirective::new("audit"));
    subject.permissions.push(broad);
    subject.permissions.push(narrow);
    let ctx = context(ActionKind::Read, "file:///data/a.txt");

    let RuleEvaluation::Decided {
        obligations, ..
    } = RuleEvaluator::evaluate(&subject, &ctx)
    else {
        panic!("expected a decided outcome");
    };
    assert_eq!(obligations, vec![ObligationDirective::new("audit")]);
}

/// Tests that no matching rule yields not-applicable.
#[test]
fn test_no_match_is_not_applicable() {
    let mut subject = policy("p1", 10);
    subject.permissions.push(rule("read", "*", None));
    let ctx = context(ActionKind::Delete, "file:///data/a.txt");

    assert_eq!(RuleEvaluator::evaluate(&subject, &ctx), RuleEvaluation::NotApplicable);
}

// ============================================================================
// SECTION: Constraint Trees
// ============================================================================

/// Tests numeric comparison over the trust score facet.
#[test]
fn test_trust_score_constraint() {
    let mut subject = policy("p1", 10);
    subject.permissions.push(rule(
        "read",
        "*",
        Some(leaf("trustScore", ConstraintOperator::Gteq, json!(0.4))),
    ));
    let ctx = context(ActionKind::Read, "file:///data/a.txt");

    // The unenriched fixture context carries the unknown-agent score of 0.5.
    let outcome = RuleEvaluator::evaluate(&subject, &ctx);
    assert!(matches!(outcome, RuleEvaluation::Decided {
        decision: Decision::Permit,
        ..
    }));
}

/// Tests lexicographic time-of-day windows.
#[test]
fn test_time_of_day_window() {
    let mut subject = policy("p1", 10);
    subject.permissions.push(rule(
        "read",
        "*",
        Some(ConstraintNode::All {
            and: vec![
                leaf("timeOfDay", ConstraintOperator::Gteq, json!("08:00:00")),
                leaf("timeOfDay", ConstraintOperator::Lt, json!("18:00:00")),
            ],
        }),
    ));
    // 2023-11-14T22:13:20Z is outside the window.
    let ctx = context(ActionKind::Read, "file:///data/a.txt");

    assert_eq!(RuleEvaluator::evaluate(&subject, &ctx), RuleEvaluation::NotApplicable);
}

/// Tests that an unknown left operand fails the rule without erroring.
#[test]
fn test_unknown_operand_fails_closed() {
    let mut subject = policy("p1", 10);
    subject.permissions.push(rule(
        "read",
        "*",
        Some(leaf("security.geoCountry", ConstraintOperator::Eq, json!("US"))),
    ));
    let ctx = context(ActionKind::Read, "file:///data/a.txt");

    assert_eq!(RuleEvaluator::evaluate(&subject, &ctx), RuleEvaluation::NotApplicable);
}

/// Tests that negation of an unknown leaf stays unknown.
#[test]
fn test_negated_unknown_stays_unknown() {
    let mut subject = policy("p1", 10);
    subject.permissions.push(rule(
        "read",
        "*",
        Some(ConstraintNode::Not {
            not: Box::new(leaf("security.geoCountry", ConstraintOperator::Eq, json!("US"))),
        }),
    ));
    let ctx = context(ActionKind::Read, "file:///data/a.txt");

    assert_eq!(RuleEvaluator::evaluate(&subject, &ctx), RuleEvaluation::NotApplicable);
}

/// Tests set membership over environment keys.
#[test]
fn test_membership_over_environment() {
    let mut subject = policy("p1", 10);
    subject.prohibitions.push(rule(
        "read",
        "*",
        Some(leaf("ipCountry", ConstraintOperator::In, json!(["XX", "YY"]))),
    ));
    let mut ctx = context(ActionKind::Read, "file:///data/a.txt");
    let mut output = BTreeMap::new();
    output.insert("geoCountry".to_string(), json!("XX"));
    ctx.environment.merge("security", output);

    let outcome = RuleEvaluator::evaluate(&subject, &ctx);
    assert!(matches!(outcome, RuleEvaluation::Decided {
        decision: Decision::Deny,
        ..
    }));
}

/// Tests that the emergency flag does not override a prohibition.
#[test]
fn test_emergency_does_not_override_prohibition() {
    let mut subject = policy("p1", 10);
    subject.prohibitions.push(rule("write", "*", None));
    subject.permissions.push(rule(
        "write",
        "*",
        Some(leaf("emergency", ConstraintOperator::Eq, json!(true))),
    ));
    let mut ctx = context(ActionKind::Write, "file:///data/a.txt");
    let mut output = BTreeMap::new();
    output.insert("emergency".to_string(), json!(true));
    ctx.environment.merge("security", output);

    let outcome = RuleEvaluator::evaluate(&subject, &ctx);
    assert!(matches!(outcome, RuleEvaluation::Decided {
        decision: Decision::Deny,
        ..
    }));
}

// crates/warden-enforce/tests/constraints.rs
// ============================================================================
// Module: Constraint Pipeline Tests
// Description: Tests for anonymization, rate limiting, and geo restriction.
// ============================================================================
//! ## Overview
//! Exercises the constraint pipeline end to end, including the explicit
//! critical/soft failure discipline and anonymization idempotence.

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

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use warden_core::ActionKind;
use warden_core::AgentId;
use warden_core::ConstraintDirective;
use warden_core::ConstraintProcessor;
use warden_core::DecisionContext;
use warden_core::NoopAlertSink;
use warden_core::ResourceUri;
use warden_core::SessionId;
use warden_core::Timestamp;
use warden_enforce::Anonymizer;
use warden_enforce::AnonymizerConfig;
use warden_enforce::BufferedAlertSink;
use warden_enforce::ConstraintPipeline;
use warden_enforce::GeoRestrictor;
use warden_enforce::RateLimiter;
use warden_enforce::RateLimiterConfig;

/// Builds a context at the given admission time.
fn context_at(millis: i64) -> DecisionContext {
    DecisionContext::new(
        AgentId::new("agent-1"),
        ActionKind::Read,
        ResourceUri::new("tool:ratey__fetch"),
        None,
        Timestamp::from_unix_millis(millis),
        SessionId::new("session-1"),
    )
}

/// Builds the standard three-processor pipeline.
fn pipeline(alerts: Arc<BufferedAlertSink>) -> ConstraintPipeline {
    ConstraintPipeline::new(
        vec![
            Arc::new(Anonymizer::new(AnonymizerConfig::default())),
            Arc::new(RateLimiter::new(RateLimiterConfig::default())),
            Arc::new(GeoRestrictor),
        ],
        alerts,
    )
}

// ============================================================================
// SECTION: Anonymization
// ============================================================================

/// Tests masking preserves object shape and nested structure.
#[test]
fn test_anonymize_preserves_shape() {
    let subject = Anonymizer::new(AnonymizerConfig::default());
    let data = json!({
        "user": {"email": "jane.doe@example.com", "name": "Jane"},
        "entries": [{"phone": "555-010-4477"}],
        "count": 2
    });
    let out = subject
        .apply(&ConstraintDirective::new("anonymize:email,phone"), data, &context_at(0))
        .unwrap();
    assert_eq!(out["user"]["email"], json!("j***@example.com"));
    assert_eq!(out["user"]["name"], json!("Jane"));
    assert_eq!(out["entries"][0]["phone"], json!("***-***-**77"));
    assert_eq!(out["count"], json!(2));
}

/// Tests that mask and tokenize application is idempotent.
#[test]
fn test_anonymize_idempotent() {
    let subject = Anonymizer::new(AnonymizerConfig::default());
    for directive in ["anonymize:mask:email", "anonymize:tokenize:email", "anonymize:hash:email"] {
        let directive = ConstraintDirective::new(directive);
        let data = json!({"email": "jane.doe@example.com"});
        let once = subject.apply(&directive, data, &context_at(0)).unwrap();
        let twice = subject.apply(&directive, once.clone(), &context_at(0)).unwrap();
        assert_eq!(once, twice, "directive {directive} is not idempotent");
    }
}

/// Tests that tokenization is deterministic under one secret.
#[test]
fn test_tokenize_deterministic() {
    let subject = Anonymizer::new(AnonymizerConfig::default());
    let directive = ConstraintDirective::new("anonymize:tokenize:email");
    let first = subject
        .apply(&directive, json!({"email": "a@b.c"}), &context_at(0))
        .unwrap();
    let second = subject
        .apply(&directive, json!({"email": "a@b.c"}), &context_at(5_000))
        .unwrap();
    assert_eq!(first, second);
    assert!(first["email"].as_str().unwrap().starts_with("tok_"));
}

// ============================================================================
// SECTION: Rate Limiting
// ============================================================================

/// Tests the documented scenario: ten permits, then a critical failure.
#[test]
fn test_rate_limit_trips_on_eleventh() {
    let alerts = Arc::new(BufferedAlertSink::new());
    let subject = pipeline(Arc::clone(&alerts));
    let directives = [ConstraintDirective::new("rate-limit:10/60s")];
    for call in 0..10 {
        let ctx = context_at(i64::from(call) * 1_000);
        let outcome = subject.apply(&directives, json!({"ok": true}), &ctx);
        assert!(outcome.is_ok(), "call {call} should pass");
    }
    let ctx = context_at(10_000);
    let failure = subject.apply(&directives, json!({"ok": true}), &ctx).unwrap_err();
    assert!(failure.critical);
    assert!(failure.reason.contains("rate limit"));
}

// ============================================================================
// SECTION: Geo Restriction
// ============================================================================

/// Tests the critical failure for a disallowed country.
#[test]
fn test_geo_restrict_denies_outside_set() {
    let alerts = Arc::new(BufferedAlertSink::new());
    let subject = pipeline(alerts);
    let mut ctx = context_at(0);
    let mut output = BTreeMap::new();
    output.insert("geoCountry".to_string(), json!("XX"));
    ctx.environment.merge("security", output);

    let failure = subject
        .apply(&[ConstraintDirective::new("geo-restrict:US,CA")], json!({}), &ctx)
        .unwrap_err();
    assert!(failure.critical);
}

/// Tests the soft failure for an unresolved country.
#[test]
fn test_geo_restrict_soft_fails_unresolved() {
    let alerts = Arc::new(BufferedAlertSink::new());
    let subject = pipeline(Arc::clone(&alerts));
    let ctx = context_at(0);

    let outcome = subject
        .apply(&[ConstraintDirective::new("geo-restrict:US")], json!({"kept": 1}), &ctx)
        .unwrap();
    // Soft failure: data unchanged, warning raised, directive not recorded.
    assert_eq!(outcome.data, json!({"kept": 1}));
    assert!(outcome.applied.is_empty());
    assert_eq!(alerts.snapshot().len(), 1);
}

// ============================================================================
// SECTION: Discipline
// ============================================================================

/// Tests that a directive no processor claims is critical.
#[test]
fn test_unknown_directive_is_critical() {
    let subject = pipeline(Arc::new(BufferedAlertSink::new()));
    let failure = subject
        .apply(&[ConstraintDirective::new("sparkle:everything")], json!({}), &context_at(0))
        .unwrap_err();
    assert!(failure.critical);
}

/// Tests that directives apply in order and report what ran.
#[test]
fn test_applied_order_reported() {
    let subject = ConstraintPipeline::new(
        vec![
            Arc::new(Anonymizer::new(AnonymizerConfig::default())),
            Arc::new(RateLimiter::new(RateLimiterConfig::default())),
        ],
        Arc::new(NoopAlertSink),
    );
    let outcome = subject
        .apply(
            &[
                ConstraintDirective::new("anonymize:email"),
                ConstraintDirective::new("rate-limit:5/60s"),
            ],
            json!({"email": "a@b.c"}),
            &context_at(0),
        )
        .unwrap();
    assert_eq!(outcome.applied, vec!["anonymize:email", "rate-limit:5/60s"]);
}

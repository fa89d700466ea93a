// crates/warden-enforce/tests/anomaly.rs
// ============================================================================
// Module: Anomaly Detector Tests
// Description: Tests for denial spikes and novel resource advisories.
// ============================================================================
//! ## Overview
//! Validates the sliding-window denial-rate advisory and the novel-resource
//! flag, and that alerts are advisory only.

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

use std::sync::Arc;

use warden_core::ActionKind;
use warden_core::AgentId;
use warden_core::AlertSink;
use warden_core::AuditRecord;
use warden_core::Decision;
use warden_core::DecisionEngine;
use warden_core::ResourceUri;
use warden_core::Timestamp;
use warden_core::hashing::DEFAULT_HASH_ALGORITHM;
use warden_core::hashing::hash_bytes;
use warden_enforce::AnomalyConfig;
use warden_enforce::AnomalyDetector;
use warden_enforce::BufferedAlertSink;

/// Builds an audit record for the agent, resource, and decision.
fn record(id: u64, agent: &str, resource: &str, decision: Decision) -> AuditRecord {
    AuditRecord {
        id,
        timestamp: Timestamp::from_unix_millis(i64::try_from(id).unwrap_or(0) * 1_000),
        agent: AgentId::new(agent),
        action: ActionKind::Read,
        resource: ResourceUri::new(resource),
        decision,
        reason: "test".to_string(),
        policy_id: None,
        engine: DecisionEngine::Rule,
        latency_ms: 1,
        constraints_applied: Vec::new(),
        obligation_results: Vec::new(),
        context_hash: hash_bytes(DEFAULT_HASH_ALGORITHM, b"ctx"),
        converted_from: None,
    }
}

/// Tests that a denial-rate spike raises exactly one latched advisory.
#[test]
fn test_denial_spike_advisory() {
    let alerts = Arc::new(BufferedAlertSink::new());
    let detector = AnomalyDetector::new(
        AnomalyConfig {
            min_events: 4,
            denial_rate_threshold: 0.5,
            novelty_history: 100,
            ..AnomalyConfig::default()
        },
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
    );

    for id in 0..3 {
        detector.observe(&record(id, "agent-1", "file:///a", Decision::Permit));
    }
    for id in 3..8 {
        detector.observe(&record(id, "agent-1", "file:///a", Decision::Deny));
    }
    let raised = alerts.snapshot();
    assert_eq!(raised.len(), 1);
    assert!(raised[0].message.contains("denial rate spike"));
}

/// Tests that novel resource access is flagged only after history exists.
#[test]
fn test_novel_resource_advisory() {
    let alerts = Arc::new(BufferedAlertSink::new());
    let detector = AnomalyDetector::new(
        AnomalyConfig {
            min_events: 1_000,
            novelty_history: 3,
            ..AnomalyConfig::default()
        },
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
    );

    // Building history raises nothing.
    for (id, resource) in ["file:///a", "file:///b", "file:///c"].iter().enumerate() {
        let id = u64::try_from(id).unwrap();
        detector.observe(&record(id, "agent-1", resource, Decision::Permit));
    }
    assert!(alerts.snapshot().is_empty());

    detector.observe(&record(9, "agent-1", "tool:shell__run", Decision::Permit));
    let raised = alerts.snapshot();
    assert_eq!(raised.len(), 1);
    assert!(raised[0].message.contains("novel resource"));
}

/// Tests that agents are tracked independently.
#[test]
fn test_agents_independent() {
    let alerts = Arc::new(BufferedAlertSink::new());
    let detector = AnomalyDetector::new(
        AnomalyConfig {
            min_events: 2,
            denial_rate_threshold: 0.9,
            novelty_history: 100,
            ..AnomalyConfig::default()
        },
        Arc::clone(&alerts) as Arc<dyn AlertSink>,
    );

    detector.observe(&record(0, "noisy", "file:///a", Decision::Deny));
    detector.observe(&record(1, "noisy", "file:///a", Decision::Deny));
    detector.observe(&record(2, "quiet", "file:///a", Decision::Permit));
    detector.observe(&record(3, "quiet", "file:///a", Decision::Permit));

    let raised = alerts.snapshot();
    assert_eq!(raised.len(), 1);
    assert!(raised[0].message.contains("noisy"));
}

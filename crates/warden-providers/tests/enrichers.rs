// crates/warden-providers/tests/enrichers.rs
// ============================================================================
// Module: Enricher Tests
// Description: Tests for the enricher pipeline through the collector.
// ============================================================================
//! ## Overview
//! Runs the fixed enricher list through the context collector and checks
//! the environment layer and lifted facets.

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
use warden_core::CollectorConfig;
use warden_core::ContextCollector;
use warden_core::DecisionContext;
use warden_core::NoopAlertSink;
use warden_core::ResourceUri;
use warden_core::SessionId;
use warden_core::Timestamp;
use warden_providers::AgentProfile;
use warden_providers::BusinessHours;
use warden_providers::EnricherParams;
use warden_providers::GeoTable;
use warden_providers::build_enrichers;

/// Builds the default enricher parameters for tests.
fn params() -> EnricherParams {
    let mut directory = BTreeMap::new();
    directory.insert("copilot".to_string(), AgentProfile {
        agent_type: "assistant".to_string(),
        clearance_level: 3,
        trust_score: 0.9,
        tags: vec!["internal".to_string()],
    });
    EnricherParams {
        hours: BusinessHours {
            start: "09:00:00".to_string(),
            end: "17:00:00".to_string(),
            timezone: "UTC".to_string(),
        },
        directory,
        geo: GeoTable::new(vec![
            ("10.1.".to_string(), "US".to_string()),
            ("10.2.".to_string(), "XX".to_string()),
        ]),
        flagged_countries: vec!["XX".to_string()],
    }
}

/// Builds a seed context with transport metadata pre-merged.
fn seed(agent: &str, client_ip: &str) -> DecisionContext {
    // 10:00:00 UTC on a Wednesday (2023-11-15).
    let time = Timestamp::from_unix_millis(1_700_042_400_000);
    let mut context = DecisionContext::new(
        AgentId::new(agent),
        ActionKind::Read,
        ResourceUri::new("file:///data/mailbox/a.txt"),
        None,
        time,
        SessionId::new("session-1"),
    );
    let mut transport = BTreeMap::new();
    transport.insert("clientIp".to_string(), json!(client_ip));
    transport.insert("kind".to_string(), json!("http"));
    context.environment.merge("transport", transport);
    context
}

/// Tests the full pipeline output for a known agent.
#[tokio::test]
async fn test_known_agent_enrichment() {
    let collector = ContextCollector::new(
        build_enrichers(params()),
        CollectorConfig::default(),
        Arc::new(NoopAlertSink),
    );
    let sealed = collector.collect(seed("copilot", "10.1.4.7")).await;

    assert_eq!(sealed.environment.get("time.isBusinessHours"), Some(&json!(true)));
    assert_eq!(sealed.environment.get("time.dayOfWeek"), Some(&json!("wednesday")));
    assert_eq!(sealed.environment.get("security.geoCountry"), Some(&json!("US")));
    assert_eq!(sealed.environment.get("security.threatLevel"), Some(&json!("none")));
    assert_eq!(sealed.environment.get("lineage.origin"), Some(&json!("file")));
    // Mailbox path classifies as a sensitive message resource.
    assert_eq!(sealed.environment.get("resource.dataType"), Some(&json!("message")));
    assert!((sealed.trust_score - 0.9).abs() < f64::EPSILON);
    assert_eq!(sealed.agent_type, "assistant");
    assert_eq!(sealed.clearance_level, 3);
    assert_eq!(sealed.resource_classification, "sensitive");
}

/// Tests the unknown-agent defaults and flagged-country threat level.
#[tokio::test]
async fn test_unknown_agent_and_flagged_country() {
    let collector = ContextCollector::new(
        build_enrichers(params()),
        CollectorConfig::default(),
        Arc::new(NoopAlertSink),
    );
    let sealed = collector.collect(seed("stranger", "10.2.0.1")).await;

    assert!((sealed.trust_score - 0.5).abs() < f64::EPSILON);
    assert_eq!(sealed.agent_type, "unknown");
    assert_eq!(sealed.environment.get("security.geoCountry"), Some(&json!("XX")));
    assert_eq!(sealed.environment.get("security.threatLevel"), Some(&json!("elevated")));
}

/// Tests that a missing client address degrades to an unknown country.
#[tokio::test]
async fn test_missing_address_is_unknown_country() {
    let collector = ContextCollector::new(
        build_enrichers(params()),
        CollectorConfig::default(),
        Arc::new(NoopAlertSink),
    );
    let time = Timestamp::from_unix_millis(1_700_042_400_000);
    let context = DecisionContext::new(
        AgentId::new("copilot"),
        ActionKind::Read,
        ResourceUri::new("tool:filesystem__read_file"),
        None,
        time,
        SessionId::new("session-1"),
    );
    let sealed = collector.collect(context).await;

    assert_eq!(sealed.environment.get("security.geoCountry"), Some(&json!("unknown")));
    assert_eq!(sealed.environment.get("resource.dataType"), Some(&json!("tool")));
}

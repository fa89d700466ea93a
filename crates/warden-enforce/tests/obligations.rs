// crates/warden-enforce/tests/obligations.rs
// ============================================================================
// Module: Obligation and Audit Tests
// Description: Tests for the dispatcher, audit logger, and anomaly detector.
// ============================================================================
//! ## Overview
//! Exercises concurrent obligation dispatch, audit persistence with retries
//! and escalation, lifecycle scheduling, and anomaly advisories.

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
use std::sync::Mutex;

use warden_core::ActionKind;
use warden_core::AgentId;
use warden_core::AlertSeverity;
use warden_core::AlertSink;
use warden_core::AuditRecord;
use warden_core::AuditSink;
use warden_core::AuditSinkError;
use warden_core::Decision;
use warden_core::DecisionContext;
use warden_core::DecisionEngine;
use warden_core::ObligationDirective;
use warden_core::PolicyDecision;
use warden_core::ResourceUri;
use warden_core::SessionId;
use warden_core::Timestamp;
use warden_core::hashing::DEFAULT_HASH_ALGORITHM;
use warden_core::hashing::hash_bytes;
use warden_enforce::AuditLogger;
use warden_enforce::AuditRecordParams;
use warden_enforce::BufferedAlertSink;
use warden_enforce::DataLifecycle;
use warden_enforce::DispatcherConfig;
use warden_enforce::FileAuditSink;
use warden_enforce::LifecycleScheduler;
use warden_enforce::ObligationDispatcher;
use warden_enforce::RecordingHandler;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Audit sink that fails a configurable number of times.
struct FlakySink {
    /// Remaining failures before appends succeed.
    failures_left: Mutex<u32>,
    /// Successfully appended records.
    records: Mutex<Vec<AuditRecord>>,
}

impl FlakySink {
    /// Creates a sink failing the first `failures` appends.
    fn failing(failures: u32) -> Self {
        Self {
            failures_left: Mutex::new(failures),
            records: Mutex::new(Vec::new()),
        }
    }
}

impl AuditSink for FlakySink {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        let mut left = self.failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err(AuditSinkError::Sink("disconnected".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Builds a sealed context.
fn context() -> Arc<DecisionContext> {
    Arc::new(DecisionContext::new(
        AgentId::new("agent-1"),
        ActionKind::Read,
        ResourceUri::new("file:///data/a.txt"),
        None,
        Timestamp::from_unix_millis(1_700_000_000_000),
        SessionId::new("session-1"),
    ))
}

/// Builds a permit decision.
fn permit() -> PolicyDecision {
    PolicyDecision {
        decision: Decision::Permit,
        reason: "permitted".to_string(),
        confidence: 1.0,
        constraints: Vec::new(),
        obligations: Vec::new(),
        engine: DecisionEngine::Rule,
        evaluated_at: Timestamp::from_unix_millis(1_700_000_000_000),
        policy_id: None,
    }
}

/// Builds audit record params for the context and decision.
fn params(decision: Decision) -> AuditRecordParams {
    AuditRecordParams {
        agent: AgentId::new("agent-1"),
        action: ActionKind::Read,
        resource: ResourceUri::new("file:///data/a.txt"),
        decision,
        reason: "test".to_string(),
        policy_id: None,
        engine: DecisionEngine::Rule,
        latency_ms: 3,
        constraints_applied: Vec::new(),
        obligation_results: Vec::new(),
        context_hash: hash_bytes(DEFAULT_HASH_ALGORITHM, b"ctx"),
        converted_from: None,
    }
}

// ============================================================================
// SECTION: Audit Logger
// ============================================================================

/// Tests retry-then-success with attempt accounting.
#[tokio::test]
async fn test_audit_retries_transient_failures() {
    let sink = Arc::new(FlakySink::failing(2));
    let alerts = Arc::new(BufferedAlertSink::new());
    let logger = AuditLogger::new(Arc::clone(&sink) as Arc<dyn AuditSink>, Arc::clone(&alerts) as Arc<dyn AlertSink>);

    let (outcome, record) = logger.log(params(Decision::Permit), Timestamp::from_unix_millis(1)).await;
    assert!(outcome.succeeded);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(record.decision, Decision::Permit);
    assert_eq!(sink.records.lock().unwrap().len(), 1);
    assert!(alerts.snapshot().is_empty());
}

/// Tests escalation after the retry budget is exhausted.
#[tokio::test]
async fn test_audit_exhaustion_escalates() {
    let sink = Arc::new(FlakySink::failing(99));
    let alerts = Arc::new(BufferedAlertSink::new());
    let logger = AuditLogger::new(Arc::clone(&sink) as Arc<dyn AuditSink>, Arc::clone(&alerts) as Arc<dyn AlertSink>);

    let (outcome, _) = logger.log(params(Decision::Permit), Timestamp::from_unix_millis(1)).await;
    assert!(!outcome.succeeded);
    let raised = alerts.snapshot();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].severity, AlertSeverity::Critical);
}

/// Tests monotonic ids and the dated file layout with rotation.
#[tokio::test]
async fn test_file_sink_rotation_and_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(FileAuditSink::new(dir.path().to_path_buf()).unwrap());
    let alerts = Arc::new(BufferedAlertSink::new());
    let logger = AuditLogger::new(Arc::clone(&sink) as Arc<dyn AuditSink>, alerts);

    // Two records on day one, one on day two.
    let day_one = Timestamp::from_unix_millis(0);
    let day_two = Timestamp::from_unix_millis(86_400_000);
    logger.log(params(Decision::Permit), day_one).await;
    logger.log(params(Decision::Deny), day_one).await;
    logger.log(params(Decision::Permit), day_two).await;

    let first = std::fs::read_to_string(dir.path().join("audit-1970-01-01.ndjson")).unwrap();
    let lines: Vec<AuditRecord> =
        first.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].id < lines[1].id);
    assert_eq!(lines[1].decision, Decision::Deny);

    let second = std::fs::read_to_string(dir.path().join("audit-1970-01-02.ndjson")).unwrap();
    assert_eq!(second.lines().count(), 1);
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Tests outcome ordering, lifecycle scheduling, and unknown directives.
#[tokio::test]
async fn test_dispatcher_aggregates_in_order() {
    let handler = Arc::new(RecordingHandler::new());
    let scheduler = Arc::new(LifecycleScheduler::new(
        Arc::clone(&handler) as Arc<dyn warden_enforce::LifecycleHandler>,
        Arc::new(BufferedAlertSink::new()),
    ));
    let dispatcher = ObligationDispatcher::new(
        vec![Arc::new(DataLifecycle::new(Arc::clone(&scheduler)))],
        DispatcherConfig::default(),
    );

    let obligations = [
        ObligationDirective::new("audit"),
        ObligationDirective::new("lifecycle:delete:0"),
        ObligationDirective::new("teleport:now"),
    ];
    let outcomes = dispatcher.execute(&obligations, &context(), &permit()).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].directive, "audit");
    assert!(outcomes[0].succeeded);
    assert_eq!(outcomes[1].directive, "lifecycle:delete:0");
    assert!(outcomes[1].succeeded);
    assert_eq!(outcomes[2].directive, "teleport:now");
    assert!(!outcomes[2].succeeded);

    // The zero-delay action fires promptly.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(handler.performed.lock().unwrap().len(), 1);
}

/// Tests that one failing executor does not block the others.
#[tokio::test]
async fn test_failing_obligation_does_not_block_others() {
    let handler = Arc::new(RecordingHandler::new());
    let scheduler = Arc::new(LifecycleScheduler::new(
        Arc::clone(&handler) as Arc<dyn warden_enforce::LifecycleHandler>,
        Arc::new(BufferedAlertSink::new()),
    ));
    let dispatcher = ObligationDispatcher::new(
        vec![Arc::new(DataLifecycle::new(scheduler))],
        DispatcherConfig::default(),
    );

    let obligations = [
        ObligationDirective::new("lifecycle:badverb:1"),
        ObligationDirective::new("lifecycle:archive:0"),
    ];
    let outcomes = dispatcher.execute(&obligations, &context(), &permit()).await;
    assert!(!outcomes[0].succeeded);
    assert!(outcomes[1].succeeded);
}

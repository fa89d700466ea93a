// crates/warden-enforce/src/audit.rs
// ============================================================================
// Module: Warden Audit Logging
// Description: Durable audit sinks and the retrying audit logger.
// Purpose: Persist one ordered audit record per request outcome.
// Dependencies: warden-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Audit records are newline-delimited JSON. The file sink writes dated
//! files with daily rotation; the stdout sink is for HTTP deployments where
//! stdout carries no protocol frames; the null sink discards. The logger
//! allocates monotonic record ids, serializes writes, retries failures with
//! exponential backoff, and escalates through the alert channel once the
//! budget is exhausted. The gateway keeps serving after an audit failure to
//! avoid amplifying an outage into a denial of service.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use warden_core::ActionKind;
use warden_core::AgentId;
use warden_core::Alert;
use warden_core::AlertSeverity;
use warden_core::AlertSink;
use warden_core::AuditRecord;
use warden_core::AuditSink;
use warden_core::AuditSinkError;
use warden_core::Decision;
use warden_core::DecisionEngine;
use warden_core::HashDigest;
use warden_core::ObligationOutcome;
use warden_core::PolicyId;
use warden_core::ResourceUri;
use warden_core::RetryPolicy;
use warden_core::Timestamp;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink discarding every record.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _record: &AuditRecord) -> Result<(), AuditSinkError> {
        Ok(())
    }
}

/// Audit sink writing JSON lines to standard output.
///
/// # Invariants
/// - Only used with the HTTP transport; stdio reserves stdout for frames.
pub struct StdoutAuditSink;

impl AuditSink for StdoutAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        let payload =
            serde_json::to_string(record).map_err(|err| AuditSinkError::Sink(err.to_string()))?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{payload}").map_err(|err| AuditSinkError::Sink(err.to_string()))
    }
}

/// State for the currently open dated audit file.
struct OpenFile {
    /// Open append handle.
    file: File,
    /// Date the handle was opened for.
    date: String,
}

/// Audit sink writing dated newline-delimited JSON files.
///
/// Files are named `audit-YYYY-MM-DD.ndjson` and rotate when the record
/// date changes.
pub struct FileAuditSink {
    /// Directory holding the dated files.
    dir: PathBuf,
    /// Currently open file, if any.
    open: Mutex<Option<OpenFile>>,
}

impl FileAuditSink {
    /// Creates the sink, preparing the directory.
    ///
    /// # Errors
    ///
    /// Returns [`AuditSinkError`] when the directory cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self, AuditSinkError> {
        fs::create_dir_all(&dir).map_err(|err| AuditSinkError::Sink(err.to_string()))?;
        Ok(Self {
            dir,
            open: Mutex::new(None),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditSinkError> {
        let payload =
            serde_json::to_string(record).map_err(|err| AuditSinkError::Sink(err.to_string()))?;
        let date = record.timestamp.date_string();
        let mut open = self
            .open
            .lock()
            .map_err(|_| AuditSinkError::Sink("audit sink lock poisoned".to_string()))?;
        let rotate = open.as_ref().is_none_or(|current| current.date != date);
        if rotate {
            let path = self.dir.join(format!("audit-{date}.ndjson"));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| AuditSinkError::Sink(err.to_string()))?;
            *open = Some(OpenFile {
                file,
                date,
            });
        }
        let Some(current) = open.as_mut() else {
            return Err(AuditSinkError::Sink("audit file unavailable".to_string()));
        };
        writeln!(current.file, "{payload}")
            .and_then(|()| current.file.flush())
            .map_err(|err| AuditSinkError::Sink(err.to_string()))
    }
}

// ============================================================================
// SECTION: Audit Logger
// ============================================================================

/// Inputs for one audit record.
pub struct AuditRecordParams {
    /// Calling agent.
    pub agent: AgentId,
    /// Request action.
    pub action: ActionKind,
    /// Request resource.
    pub resource: ResourceUri,
    /// Final user-visible decision.
    pub decision: Decision,
    /// Decision reason.
    pub reason: String,
    /// Policy the decision was evaluated under.
    pub policy_id: Option<PolicyId>,
    /// Engine that produced the decision.
    pub engine: DecisionEngine,
    /// End-to-end decision latency in milliseconds.
    pub latency_ms: u64,
    /// Constraint directives applied to the response.
    pub constraints_applied: Vec<String>,
    /// Per-obligation execution outcomes.
    pub obligation_results: Vec<ObligationOutcome>,
    /// Canonical hash of the sealed decision context.
    pub context_hash: HashDigest,
    /// Set when enforcement converted a permit into a denial.
    pub converted_from: Option<Decision>,
}

/// Retrying audit logger over a durable sink.
pub struct AuditLogger {
    /// Durable sink.
    sink: Arc<dyn AuditSink>,
    /// Escalation channel for exhausted retries.
    alerts: Arc<dyn AlertSink>,
    /// Retry policy (three attempts with exponential backoff).
    retry: RetryPolicy,
    /// Monotonic record id allocator.
    next_id: AtomicU64,
}

impl AuditLogger {
    /// Creates the logger over a sink and an escalation channel.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            sink,
            alerts,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 100,
                cap_delay_ms: 2_000,
            },
            next_id: AtomicU64::new(1),
        }
    }

    /// Writes one record, retrying and escalating on exhaustion.
    ///
    /// The built record comes back alongside the write outcome so in-process
    /// consumers (the anomaly detector) observe it even when the sink is
    /// down; a failed write never blocks the response path.
    pub async fn log(
        &self,
        params: AuditRecordParams,
        timestamp: Timestamp,
    ) -> (ObligationOutcome, AuditRecord) {
        let record = AuditRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            timestamp,
            agent: params.agent,
            action: params.action,
            resource: params.resource,
            decision: params.decision,
            reason: params.reason,
            policy_id: params.policy_id,
            engine: params.engine,
            latency_ms: params.latency_ms,
            constraints_applied: params.constraints_applied,
            obligation_results: params.obligation_results,
            context_hash: params.context_hash,
            converted_from: params.converted_from,
        };
        let outcome = self
            .retry
            .run(
                |_| {
                    let result = self.sink.append(&record);
                    async move { result }
                },
                |_| true,
            )
            .await;
        let write_outcome = match outcome {
            Ok(((), attempts)) => ObligationOutcome {
                directive: "audit".to_string(),
                succeeded: true,
                attempts,
                error: None,
            },
            Err(err) => {
                self.alerts.raise(&Alert {
                    severity: AlertSeverity::Critical,
                    source: "audit-logger".to_string(),
                    message: format!("audit sink exhausted retries: {err}"),
                    timestamp: Timestamp::now(),
                });
                ObligationOutcome {
                    directive: "audit".to_string(),
                    succeeded: false,
                    attempts: self.retry.max_attempts,
                    error: Some(err.to_string()),
                }
            }
        };
        (write_outcome, record)
    }
}

// crates/warden-gateway/src/telemetry.rs
// ============================================================================
// Module: Gateway Telemetry
// Description: Observability hooks for gateway request handling.
// Purpose: Provide metric events and leveled diagnostics without hard deps.
// Dependencies: warden-config, serde
// ============================================================================

//! ## Overview
//! A thin metrics interface for request counters and latencies, plus a
//! leveled diagnostics facility writing JSON lines to stderr. Both are
//! dependency-light so deployments can plug in their own pipelines without
//! redesign. Diagnostics must never leak response payloads or secrets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::time::Duration;

use serde::Serialize;
use warden_config::LogLevel;
use warden_core::Timestamp;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Gateway request method classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GatewayMethod {
    /// MCP initialize handshake.
    Initialize,
    /// JSON-RPC tools/list.
    ToolsList,
    /// JSON-RPC tools/call.
    ToolsCall,
    /// JSON-RPC resources/list.
    ResourcesList,
    /// JSON-RPC resources/read.
    ResourcesRead,
    /// Inbound notification.
    Notification,
    /// Invalid or malformed JSON-RPC request.
    Invalid,
    /// Any other method.
    Other,
}

/// Gateway request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GatewayOutcome {
    /// Request answered with a result.
    Ok,
    /// Request answered with an error frame.
    Error,
}

/// Gateway request metric event payload.
#[derive(Debug, Clone)]
pub struct GatewayMetricEvent {
    /// Method classification.
    pub method: GatewayMethod,
    /// Request outcome.
    pub outcome: GatewayOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
}

// ============================================================================
// SECTION: Metrics Trait
// ============================================================================

/// Metrics sink for gateway requests and latencies.
pub trait GatewayMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: &GatewayMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: &GatewayMetricEvent, latency: Duration);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl GatewayMetrics for NoopMetrics {
    fn record_request(&self, _event: &GatewayMetricEvent) {}

    fn record_latency(&self, _event: &GatewayMetricEvent, _latency: Duration) {}
}

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// One diagnostic line.
#[derive(Serialize)]
struct DiagnosticLine<'a> {
    /// Timestamp in unix milliseconds.
    timestamp_ms: i64,
    /// Level label.
    level: &'static str,
    /// Emitting component.
    source: &'a str,
    /// Message text.
    message: &'a str,
}

/// Leveled diagnostics writing JSON lines to stderr.
///
/// # Invariants
/// - Stderr carries diagnostics only; protocol frames never pass through
///   here.
pub struct Diagnostics {
    /// Minimum level that is emitted.
    level: LogLevel,
}

impl Diagnostics {
    /// Creates the facility gated at the given level.
    #[must_use]
    pub const fn new(level: LogLevel) -> Self {
        Self {
            level,
        }
    }

    /// Emits a debug line.
    pub fn debug(&self, source: &str, message: &str) {
        self.emit(LogLevel::Debug, "debug", source, message);
    }

    /// Emits an info line.
    pub fn info(&self, source: &str, message: &str) {
        self.emit(LogLevel::Info, "info", source, message);
    }

    /// Emits a warning line.
    pub fn warn(&self, source: &str, message: &str) {
        self.emit(LogLevel::Warn, "warn", source, message);
    }

    /// Emits an error line.
    pub fn error(&self, source: &str, message: &str) {
        self.emit(LogLevel::Error, "error", source, message);
    }

    /// Writes the line when the level clears the gate.
    fn emit(&self, level: LogLevel, label: &'static str, source: &str, message: &str) {
        if level < self.level {
            return;
        }
        let line = DiagnosticLine {
            timestamp_ms: Timestamp::now().as_unix_millis(),
            level: label,
            source,
            message,
        };
        if let Ok(payload) = serde_json::to_string(&line) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{payload}");
        }
    }
}

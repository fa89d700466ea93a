// crates/warden-enforce/src/alerts.rs
// ============================================================================
// Module: Warden Alert Sinks
// Description: Escalation channel implementations.
// Purpose: Surface critical failures and advisories on diagnostics streams.
// Dependencies: warden-core, serde_json
// ============================================================================

//! ## Overview
//! Alerts are JSON lines on stderr, which both transports reserve for
//! diagnostics. A buffering sink retains recent alerts in memory for tests
//! and for surfacing state over the admin surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use warden_core::Alert;
use warden_core::AlertSink;

// ============================================================================
// SECTION: Stderr Sink
// ============================================================================

/// Alert sink writing JSON lines to stderr.
pub struct StderrAlertSink;

impl AlertSink for StderrAlertSink {
    fn raise(&self, alert: &Alert) {
        if let Ok(payload) = serde_json::to_string(alert) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{payload}");
        }
    }
}

// ============================================================================
// SECTION: Buffering Sink
// ============================================================================

/// Number of alerts the buffering sink retains.
const BUFFER_CAPACITY: usize = 256;

/// Alert sink retaining recent alerts in memory.
pub struct BufferedAlertSink {
    /// Retained alerts, oldest first.
    alerts: Mutex<VecDeque<Alert>>,
}

impl BufferedAlertSink {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns a snapshot of retained alerts, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts.lock().map(|alerts| alerts.iter().cloned().collect()).unwrap_or_default()
    }
}

impl Default for BufferedAlertSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for BufferedAlertSink {
    fn raise(&self, alert: &Alert) {
        let Ok(mut alerts) = self.alerts.lock() else {
            return;
        };
        if alerts.len() >= BUFFER_CAPACITY {
            alerts.pop_front();
        }
        alerts.push_back(alert.clone());
    }
}

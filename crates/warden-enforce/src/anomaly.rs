// crates/warden-enforce/src/anomaly.rs
// ============================================================================
// Module: Warden Anomaly Detector
// Description: Sliding-window anomaly detection over audit events.
// Purpose: Flag denial spikes and novel resource access as advisories.
// Dependencies: warden-core
// ============================================================================

//! ## Overview
//! The detector consumes audit records in-process and keeps bounded
//! sliding-window counters per agent. Two patterns raise advisory alerts:
//! a denial-rate spike inside the window and first-time access to a
//! resource by an agent with established history. Alerts never change
//! decisions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use warden_core::Alert;
use warden_core::AlertSeverity;
use warden_core::AlertSink;
use warden_core::AuditRecord;
use warden_core::Decision;
use warden_core::Timestamp;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Anomaly detector configuration.
#[derive(Debug, Clone, Copy)]
pub struct AnomalyConfig {
    /// Sliding window length in milliseconds.
    pub window_ms: u64,
    /// Minimum events in the window before rates are judged.
    pub min_events: usize,
    /// Denial rate in `[0, 1]` that raises a spike advisory.
    pub denial_rate_threshold: f64,
    /// Distinct resources an agent must have touched before novel access
    /// is flagged.
    pub novelty_history: usize,
    /// Maximum events retained per agent.
    pub max_events_per_agent: usize,
    /// Maximum distinct resources remembered per agent.
    pub max_resources_per_agent: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            window_ms: 300_000,
            min_events: 10,
            denial_rate_threshold: 0.5,
            novelty_history: 5,
            max_events_per_agent: 1_024,
            max_resources_per_agent: 4_096,
        }
    }
}

// ============================================================================
// SECTION: Detector
// ============================================================================

/// Per-agent sliding state.
#[derive(Default)]
struct AgentWindow {
    /// Recent events as `(timestamp, denied)` pairs, oldest first.
    events: VecDeque<(i64, bool)>,
    /// Distinct resources the agent has touched.
    resources: BTreeSet<String>,
    /// Whether a spike advisory is currently latched.
    spike_latched: bool,
}

/// In-process anomaly detector over audit events.
pub struct AnomalyDetector {
    /// Detector configuration.
    config: AnomalyConfig,
    /// Per-agent windows.
    agents: Mutex<HashMap<String, AgentWindow>>,
    /// Advisory alert sink.
    alerts: Arc<dyn AlertSink>,
}

impl AnomalyDetector {
    /// Creates the detector over an alert sink.
    #[must_use]
    pub fn new(config: AnomalyConfig, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            config,
            agents: Mutex::new(HashMap::new()),
            alerts,
        }
    }

    /// Consumes one audit record.
    pub fn observe(&self, record: &AuditRecord) {
        let Ok(mut agents) = self.agents.lock() else {
            return;
        };
        let window = agents.entry(record.agent.as_str().to_string()).or_default();
        let now = record.timestamp.as_unix_millis();
        let denied = record.decision != Decision::Permit;

        let novel = window.resources.len() >= self.config.novelty_history
            && !window.resources.contains(record.resource.as_str());
        if window.resources.len() < self.config.max_resources_per_agent {
            window.resources.insert(record.resource.as_str().to_string());
        }

        window.events.push_back((now, denied));
        while window.events.len() > self.config.max_events_per_agent {
            window.events.pop_front();
        }
        let horizon = now.saturating_sub(i64::try_from(self.config.window_ms).unwrap_or(i64::MAX));
        while window.events.front().is_some_and(|(stamp, _)| *stamp < horizon) {
            window.events.pop_front();
        }

        let total = window.events.len();
        let denials = window.events.iter().filter(|(_, denied)| *denied).count();
        #[allow(clippy::cast_precision_loss, reason = "Window counts stay far below 2^52.")]
        let rate = if total == 0 { 0.0 } else { denials as f64 / total as f64 };
        let spiking = total >= self.config.min_events && rate >= self.config.denial_rate_threshold;

        if spiking && !window.spike_latched {
            window.spike_latched = true;
            self.alerts.raise(&Alert {
                severity: AlertSeverity::Advisory,
                source: "anomaly-detector".to_string(),
                message: format!(
                    "denial rate spike for agent {}: {denials}/{total} in window",
                    record.agent
                ),
                timestamp: Timestamp::now(),
            });
        } else if !spiking {
            window.spike_latched = false;
        }

        if novel {
            self.alerts.raise(&Alert {
                severity: AlertSeverity::Advisory,
                source: "anomaly-detector".to_string(),
                message: format!(
                    "agent {} accessed a novel resource: {}",
                    record.agent, record.resource
                ),
                timestamp: Timestamp::now(),
            });
        }
    }
}

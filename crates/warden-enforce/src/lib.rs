// crates/warden-enforce/src/lib.rs
// ============================================================================
// Module: Warden Enforcement Library
// Description: Public API surface for constraints, obligations, and audit.
// Purpose: Expose the enforcement pipeline applied around every decision.
// Dependencies: crate submodules
// ============================================================================

//! ## Overview
//! Enforcement is everything that happens around a decision: constraint
//! processors transforming permitted responses, obligation executors firing
//! after the decision, the retrying audit logger with its durable sinks,
//! the anomaly detector, and the escalation channel.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod alerts;
pub mod anomaly;
pub mod anonymize;
pub mod audit;
pub mod constraint;
pub mod directive;
pub mod geo;
pub mod lifecycle;
pub mod notify;
pub mod obligation;
pub mod ratelimit;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use alerts::BufferedAlertSink;
pub use alerts::StderrAlertSink;
pub use anomaly::AnomalyConfig;
pub use anomaly::AnomalyDetector;
pub use anonymize::Anonymizer;
pub use anonymize::AnonymizerConfig;
pub use audit::AuditLogger;
pub use audit::AuditRecordParams;
pub use audit::FileAuditSink;
pub use audit::NullAuditSink;
pub use audit::StdoutAuditSink;
pub use constraint::ConstraintApplication;
pub use constraint::ConstraintPipeline;
pub use directive::AnonymizeMethod;
pub use directive::DirectiveError;
pub use directive::LifecycleVerb;
pub use directive::ParsedConstraint;
pub use directive::ParsedObligation;
pub use directive::parse_constraint;
pub use directive::parse_obligation;
pub use geo::GeoRestrictor;
pub use lifecycle::DataLifecycle;
pub use lifecycle::LifecycleHandler;
pub use lifecycle::LifecycleScheduler;
pub use lifecycle::RecordingHandler;
pub use lifecycle::ScheduledAction;
pub use notify::Notifier;
pub use notify::NotifyChannels;
pub use obligation::DispatcherConfig;
pub use obligation::ObligationDispatcher;
pub use ratelimit::RateLimiter;
pub use ratelimit::RateLimiterConfig;

// crates/warden-gateway/src/lib.rs
// ============================================================================
// Module: Warden Gateway Library
// Description: Public API surface for the gateway frontend.
// Purpose: Expose the assembled application and its transports.
// Dependencies: crate submodules
// ============================================================================

//! ## Overview
//! The gateway is the transport frontend of the enforcement path: it
//! accepts MCP JSON-RPC frames over stdio or HTTP, runs every request
//! through the interceptor, and answers with exactly one response or error
//! frame. Assembly is data-driven from the validated configuration.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod app;
pub mod http;
pub mod interceptor;
pub mod session;
pub mod stdio;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use app::GatewayApp;
pub use app::GatewayError;
pub use http::serve_http;
pub use interceptor::FrameMeta;
pub use interceptor::Interceptor;
pub use session::SessionConfig;
pub use session::SessionStore;
pub use session::generate_correlation_id;
pub use session::generate_session_id;
pub use stdio::serve_stdio;
pub use telemetry::Diagnostics;
pub use telemetry::GatewayMethod;
pub use telemetry::GatewayMetricEvent;
pub use telemetry::GatewayMetrics;
pub use telemetry::GatewayOutcome;
pub use telemetry::NoopMetrics;

// crates/warden-gateway/src/http.rs
// ============================================================================
// Module: Gateway HTTP Transport
// Description: JSON-RPC over HTTP with SSE notifications.
// Purpose: Serve clients over a single POST endpoint plus a session stream.
// Dependencies: axum, tokio-stream, warden-core
// ============================================================================

//! ## Overview
//! One POST endpoint carries client-to-gateway frames; GET opens a
//! server-sent-event stream of upstream notifications; DELETE terminates
//! the session. The `Mcp-Session-Id` header identifies the session and is
//! generated and echoed back when absent. Oversized bodies and malformed
//! frames answer with the stable JSON-RPC error codes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::routing::post;
use serde_json::Value;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use warden_core::CorrelationId;
use warden_core::SessionId;
use warden_core::Timestamp;
use warden_core::wire;
use warden_core::wire::JsonRpcRequest;
use warden_core::wire::JsonRpcResponse;

use crate::app::GatewayApp;
use crate::app::GatewayError;
use crate::interceptor::FrameMeta;
use crate::interceptor::Interceptor;
use crate::session::generate_correlation_id;
use crate::session::generate_session_id;
use crate::telemetry::GatewayMetricEvent;
use crate::telemetry::GatewayMethod;
use crate::telemetry::GatewayOutcome;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header identifying the session.
const SESSION_HEADER: &str = "mcp-session-id";

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Serves JSON-RPC over HTTP until the process terminates.
///
/// # Errors
///
/// Returns [`GatewayError`] when the listener cannot bind or the server
/// fails.
pub async fn serve_http(app: Arc<GatewayApp>) -> Result<(), GatewayError> {
    let address = format!("{}:{}", app.config.server.host, app.config.server.port);
    let addr: SocketAddr =
        address.parse().map_err(|_| GatewayError::Config("invalid bind address".to_string()))?;
    let router = Router::new()
        .route("/mcp", post(handle_post).get(handle_sse).delete(handle_delete))
        .with_state(app);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| GatewayError::Transport(format!("http bind failed: {err}")))?;
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|err| GatewayError::Transport(format!("http server failed: {err}")))
}

/// Resolves or generates the session id from headers.
fn session_from_headers(headers: &HeaderMap) -> (SessionId, bool) {
    match headers.get(SESSION_HEADER).and_then(|value| value.to_str().ok()) {
        Some(id) if !id.is_empty() => (SessionId::new(id), false),
        _ => (generate_session_id(), true),
    }
}

/// Copies request headers into the session header map.
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| (name.as_str().to_lowercase(), value.to_string()))
        })
        .collect()
}

/// Handles one POSTed JSON-RPC frame.
async fn handle_post(
    State(app): State<Arc<GatewayApp>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let started = Instant::now();
    let (session, _generated) = session_from_headers(&headers);
    let session_header = [(SESSION_HEADER, session.as_str().to_string())];

    if body.len() > app.config.server.max_body_bytes {
        let response =
            JsonRpcResponse::error(Value::Null, wire::INVALID_REQUEST, "request body too large");
        return (StatusCode::PAYLOAD_TOO_LARGE, session_header, axum::Json(response));
    }
    let Ok(frame) = serde_json::from_slice::<JsonRpcRequest>(&body) else {
        let event = GatewayMetricEvent {
            method: GatewayMethod::Invalid,
            outcome: GatewayOutcome::Error,
            error_code: Some(wire::PARSE_ERROR),
        };
        app.metrics.record_request(&event);
        let response = JsonRpcResponse::error(Value::Null, wire::PARSE_ERROR, "parse error");
        return (StatusCode::BAD_REQUEST, session_header, axum::Json(response));
    };

    let method = Interceptor::classify(&frame.method);
    let header_map = collect_headers(&headers);
    let entry = app.sessions.touch(&session, header_map.clone(), Timestamp::now());
    let Some(_permit) = entry.try_admit() else {
        let response = JsonRpcResponse::error(
            frame.id.unwrap_or(Value::Null),
            wire::UPSTREAM_UNAVAILABLE,
            "session backpressure",
        );
        return (StatusCode::TOO_MANY_REQUESTS, session_header, axum::Json(response));
    };

    let meta = FrameMeta {
        session: session.clone(),
        correlation: CorrelationId::new(generate_correlation_id()),
        transport: "http",
        client_ip: Some(peer.ip().to_string()),
        headers: header_map,
    };
    let response = app.interceptor.handle(&meta, frame).await;
    let event = GatewayMetricEvent {
        method,
        outcome: match &response {
            Some(response) if response.error.is_some() => GatewayOutcome::Error,
            _ => GatewayOutcome::Ok,
        },
        error_code: response
            .as_ref()
            .and_then(|response| response.error.as_ref())
            .map(|error| error.code),
    };
    app.metrics.record_request(&event);
    app.metrics.record_latency(&event, started.elapsed());

    let response = response.unwrap_or_else(|| {
        // Notifications acknowledge with an empty result envelope.
        JsonRpcResponse::result(Value::Null, Value::Null)
    });
    (StatusCode::OK, session_header, axum::Json(response))
}

/// Opens the SSE stream of upstream notifications.
async fn handle_sse(State(app): State<Arc<GatewayApp>>) -> impl IntoResponse {
    let stream = BroadcastStream::new(app.router.subscribe()).filter_map(|item| {
        let notification = item.ok()?;
        let frame = JsonRpcRequest::notification(notification.method, notification.params);
        let payload = serde_json::to_string(&frame).ok()?;
        Some(Ok::<Event, Infallible>(Event::default().data(payload)))
    });
    Sse::new(stream)
}

/// Terminates a session.
async fn handle_delete(State(app): State<Arc<GatewayApp>>, headers: HeaderMap) -> StatusCode {
    let (session, generated) = session_from_headers(&headers);
    if generated {
        return StatusCode::BAD_REQUEST;
    }
    app.sessions.remove(&session);
    StatusCode::NO_CONTENT
}

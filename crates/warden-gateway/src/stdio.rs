// crates/warden-gateway/src/stdio.rs
// ============================================================================
// Module: Gateway Stdio Transport
// Description: Newline-delimited JSON-RPC over stdin/stdout.
// Purpose: Serve one client over the process's standard streams.
// Dependencies: warden-core, tokio, serde_json
// ============================================================================

//! ## Overview
//! Stdin is a stream of newline-delimited frames fed to a concurrent
//! dispatcher; stdout writes are serialized through a single writer task so
//! concurrent responses never interleave. Stderr carries diagnostics only.
//! Upstream notifications are forwarded as notification frames on the same
//! stream. The transport runs until stdin reaches EOF.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
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
use crate::telemetry::GatewayMetricEvent;
use crate::telemetry::GatewayMethod;
use crate::telemetry::GatewayOutcome;

// ============================================================================
// SECTION: Stdio Transport
// ============================================================================

/// Serves JSON-RPC frames over stdin/stdout until EOF.
///
/// # Errors
///
/// Returns [`GatewayError`] when the standard streams fail.
pub async fn serve_stdio(app: Arc<GatewayApp>) -> Result<(), GatewayError> {
    let (writer_tx, writer_rx) = mpsc::channel::<String>(256);
    tokio::spawn(write_loop(writer_rx));
    tokio::spawn(forward_notifications(Arc::clone(&app), writer_tx.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let session = SessionId::new("stdio");
    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        if line.len() > app.config.server.max_body_bytes {
            send_response(
                &writer_tx,
                &JsonRpcResponse::error(Value::Null, wire::INVALID_REQUEST, "frame too large"),
            )
            .await;
            continue;
        }
        let app = Arc::clone(&app);
        let writer = writer_tx.clone();
        let session = session.clone();
        tokio::spawn(async move {
            if let Some(response) = dispatch_line(&app, &session, &line).await {
                send_response(&writer, &response).await;
            }
        });
    }
    app.router.shutdown().await;
    Ok(())
}

/// Parses and dispatches one frame line.
async fn dispatch_line(
    app: &Arc<GatewayApp>,
    session: &SessionId,
    line: &str,
) -> Option<JsonRpcResponse> {
    let started = Instant::now();
    let Ok(frame) = serde_json::from_str::<JsonRpcRequest>(line) else {
        let event = GatewayMetricEvent {
            method: GatewayMethod::Invalid,
            outcome: GatewayOutcome::Error,
            error_code: Some(wire::PARSE_ERROR),
        };
        app.metrics.record_request(&event);
        return Some(JsonRpcResponse::error(Value::Null, wire::PARSE_ERROR, "parse error"));
    };
    let method = Interceptor::classify(&frame.method);
    let entry = app.sessions.touch(session, BTreeMap::new(), Timestamp::now());
    let Some(_permit) = entry.try_admit() else {
        let event = GatewayMetricEvent {
            method,
            outcome: GatewayOutcome::Error,
            error_code: Some(wire::UPSTREAM_UNAVAILABLE),
        };
        app.metrics.record_request(&event);
        return Some(JsonRpcResponse::error(
            frame.id.unwrap_or(Value::Null),
            wire::UPSTREAM_UNAVAILABLE,
            "session backpressure",
        ));
    };
    let meta = FrameMeta {
        session: session.clone(),
        correlation: CorrelationId::new(generate_correlation_id()),
        transport: "stdio",
        client_ip: None,
        headers: BTreeMap::new(),
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
    response
}

/// Serializes one response onto the writer channel.
async fn send_response(writer: &mpsc::Sender<String>, response: &JsonRpcResponse) {
    if let Ok(mut payload) = serde_json::to_string(response) {
        payload.push('\n');
        let _ = writer.send(payload).await;
    }
}

/// Writes queued frames to stdout, one frame per line.
async fn write_loop(mut rx: mpsc::Receiver<String>) {
    let mut stdout = tokio::io::stdout();
    while let Some(payload) = rx.recv().await {
        if stdout.write_all(payload.as_bytes()).await.is_err() {
            break;
        }
        if stdout.flush().await.is_err() {
            break;
        }
    }
}

/// Forwards upstream notifications to the client as notification frames.
async fn forward_notifications(app: Arc<GatewayApp>, writer: mpsc::Sender<String>) {
    let mut rx = app.router.subscribe();
    loop {
        match rx.recv().await {
            Ok(notification) => {
                let frame =
                    JsonRpcRequest::notification(notification.method, notification.params);
                if let Ok(mut payload) = serde_json::to_string(&frame) {
                    payload.push('\n');
                    let _ = writer.send(payload).await;
                }
            }
            // A lagged subscriber lost old notifications; keep going.
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

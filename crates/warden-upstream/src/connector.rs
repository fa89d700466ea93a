// crates/warden-upstream/src/connector.rs
// ============================================================================
// Module: Warden Upstream Connectors
// Description: Stdio subprocess and HTTP connectors speaking JSON-RPC.
// Purpose: Multiplex concurrent requests onto one upstream MCP server.
// Dependencies: warden-core, tokio, reqwest, serde_json
// ============================================================================

//! ## Overview
//! A connector owns one upstream MCP server. The stdio connector launches
//! the configured subprocess, serializes frame writes through a single
//! writer task, and runs one reader task that completes pending request
//! waiters and forwards upstream notifications. The HTTP connector posts
//! one frame per request. Either way, `call` assigns a fresh id, registers
//! a waiter, and resolves it on the matching response; shutdown and process
//! death drain every waiter with a closed-connection error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use warden_core::UpstreamName;
use warden_core::wire::JSONRPC_VERSION;
use warden_core::wire::JsonRpcRequest;
use warden_core::wire::JsonRpcResponse;
use warden_core::wire::UPSTREAM_UNAVAILABLE;

// ============================================================================
// SECTION: Errors and Lifecycle
// ============================================================================

/// Upstream call errors.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The call exceeded its timeout.
    #[error("upstream call timed out")]
    Timeout,
    /// The connection or process is gone.
    #[error("upstream connection closed: {0}")]
    Closed(String),
    /// The circuit for this method is open.
    #[error("upstream circuit open")]
    CircuitOpen,
    /// The upstream is at its in-flight bound.
    #[error("upstream backpressure")]
    Backpressure,
    /// The upstream answered with a JSON-RPC error.
    #[error("upstream rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code from the upstream.
        code: i64,
        /// JSON-RPC error message from the upstream.
        message: String,
    },
    /// Transport-level failure.
    #[error("upstream transport failure: {0}")]
    Transport(String),
    /// No upstream is configured under the name.
    #[error("unknown upstream: {0}")]
    UnknownUpstream(UpstreamName),
    /// No upstream advertises the prefixed tool.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Upstream lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Process launched; initialize handshake outstanding.
    Starting,
    /// Handshake complete; serving requests.
    Ready,
    /// Serving with elevated failures.
    Degraded,
    /// Process or connection is gone.
    Failed,
    /// Shut down on purpose.
    Stopped,
}

/// Notification relayed from an upstream.
#[derive(Debug, Clone)]
pub struct UpstreamNotification {
    /// Originating upstream.
    pub upstream: UpstreamName,
    /// Notification method.
    pub method: String,
    /// Notification params.
    pub params: Option<Value>,
}

// ============================================================================
// SECTION: Connector Contract
// ============================================================================

/// One connected upstream MCP server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Sends a request and awaits the matching response.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on timeout, closure, or an RPC error.
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, UpstreamError>;

    /// Returns the current lifecycle state.
    fn state(&self) -> LifecycleState;

    /// Stops the connector, draining pending waiters.
    async fn shutdown(&self);
}

// ============================================================================
// SECTION: Stdio Connector
// ============================================================================

/// Shared mutable connector state.
struct StdioShared {
    /// Pending request waiters keyed by request id.
    pending: Mutex<HashMap<i64, oneshot::Sender<JsonRpcResponse>>>,
    /// Current lifecycle state.
    state: Mutex<LifecycleState>,
}

impl StdioShared {
    /// Updates the lifecycle state.
    fn set_state(&self, next: LifecycleState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Completes every pending waiter with a closed-connection error.
    fn drain(&self, reason: &str) {
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        for (id, waiter) in pending.drain() {
            let _ = waiter.send(JsonRpcResponse::error(
                json!(id),
                UPSTREAM_UNAVAILABLE,
                reason.to_string(),
            ));
        }
    }
}

/// Stdio subprocess connector.
pub struct StdioConnector {
    /// Upstream name, for diagnostics.
    name: UpstreamName,
    /// Writer channel carrying serialized frames.
    writer: mpsc::Sender<String>,
    /// Shared state with the reader task.
    shared: Arc<StdioShared>,
    /// Request id allocator.
    next_id: AtomicI64,
    /// Per-request timeout.
    request_timeout: Duration,
    /// Child process handle, for shutdown.
    child: Mutex<Option<Child>>,
}

/// Launch parameters for a stdio upstream.
pub struct StdioLaunch {
    /// Upstream name.
    pub name: UpstreamName,
    /// Command to execute.
    pub command: String,
    /// Command arguments.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Readiness window for the initialize handshake.
    pub readiness: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl StdioConnector {
    /// Launches the subprocess and completes the initialize handshake.
    ///
    /// The connector is `Ready` on return; the reader task keeps running
    /// until the process exits or `shutdown` is called. Death notifies the
    /// supervisor through `on_exit`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] when the launch or handshake fails inside
    /// the readiness window.
    pub async fn launch(
        launch: StdioLaunch,
        notifications: mpsc::Sender<UpstreamNotification>,
        on_exit: mpsc::Sender<UpstreamName>,
    ) -> Result<Arc<Self>, UpstreamError> {
        let mut command = Command::new(&launch.command);
        command
            .args(&launch.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in &launch.env {
            command.env(key, value);
        }
        let mut child =
            command.spawn().map_err(|err| UpstreamError::Transport(err.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| UpstreamError::Transport("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| UpstreamError::Transport("child stdout unavailable".to_string()))?;

        let shared = Arc::new(StdioShared {
            pending: Mutex::new(HashMap::new()),
            state: Mutex::new(LifecycleState::Starting),
        });
        let (writer_tx, writer_rx) = mpsc::channel::<String>(64);
        tokio::spawn(write_loop(stdin, writer_rx));
        tokio::spawn(read_loop(
            launch.name.clone(),
            stdout,
            Arc::clone(&shared),
            notifications,
            on_exit,
        ));

        let connector = Arc::new(Self {
            name: launch.name,
            writer: writer_tx,
            shared,
            next_id: AtomicI64::new(1),
            request_timeout: launch.request_timeout,
            child: Mutex::new(Some(child)),
        });

        let handshake = connector.initialize_handshake();
        match tokio::time::timeout(launch.readiness, handshake).await {
            Ok(Ok(())) => {
                connector.shared.set_state(LifecycleState::Ready);
                Ok(connector)
            }
            Ok(Err(err)) => {
                connector.shutdown().await;
                Err(err)
            }
            Err(_) => {
                connector.shutdown().await;
                Err(UpstreamError::Timeout)
            }
        }
    }

    /// Runs the MCP initialize exchange.
    async fn initialize_handshake(&self) -> Result<(), UpstreamError> {
        let params = json!({
            "protocolVersion": "2025-03-26",
            "clientInfo": {"name": "warden", "version": env!("CARGO_PKG_VERSION")},
            "capabilities": {}
        });
        self.call("initialize", Some(params)).await?;
        let initialized = JsonRpcRequest::notification("notifications/initialized", None);
        self.send_frame(&initialized).await?;
        Ok(())
    }

    /// Serializes and enqueues one frame for the writer task.
    async fn send_frame(&self, frame: &JsonRpcRequest) -> Result<(), UpstreamError> {
        let mut line = serde_json::to_string(frame)
            .map_err(|err| UpstreamError::Transport(err.to_string()))?;
        line.push('\n');
        self.writer
            .send(line)
            .await
            .map_err(|_| UpstreamError::Closed(format!("{} writer gone", self.name)))
    }
}

#[async_trait]
impl Connector for StdioConnector {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, UpstreamError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        {
            let Ok(mut pending) = self.shared.pending.lock() else {
                return Err(UpstreamError::Closed("pending map poisoned".to_string()));
            };
            pending.insert(id, tx);
        }
        let frame = JsonRpcRequest::new(json!(id), method, params);
        if let Err(err) = self.send_frame(&frame).await {
            if let Ok(mut pending) = self.shared.pending.lock() {
                pending.remove(&id);
            }
            return Err(err);
        }
        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(UpstreamError::Closed("waiter dropped".to_string())),
            Err(_) => {
                if let Ok(mut pending) = self.shared.pending.lock() {
                    pending.remove(&id);
                }
                return Err(UpstreamError::Timeout);
            }
        };
        if let Some(error) = response.error {
            return Err(UpstreamError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    fn state(&self) -> LifecycleState {
        self.shared.state.lock().map_or(LifecycleState::Failed, |state| *state)
    }

    async fn shutdown(&self) {
        self.shared.set_state(LifecycleState::Stopped);
        self.shared.drain("upstream shutting down");
        let child = self.child.lock().ok().and_then(|mut slot| slot.take());
        if let Some(mut child) = child {
            let _ = child.kill().await;
        }
    }
}

// ============================================================================
// SECTION: I/O Tasks
// ============================================================================

/// Writes queued frames to the child's stdin, one per line.
async fn write_loop(mut stdin: tokio::process::ChildStdin, mut rx: mpsc::Receiver<String>) {
    while let Some(line) = rx.recv().await {
        if stdin.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if stdin.flush().await.is_err() {
            break;
        }
    }
}

/// Reads frames from the child's stdout until EOF.
async fn read_loop(
    name: UpstreamName,
    stdout: tokio::process::ChildStdout,
    shared: Arc<StdioShared>,
    notifications: mpsc::Sender<UpstreamNotification>,
    on_exit: mpsc::Sender<UpstreamName>,
) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(frame) = serde_json::from_str::<Value>(&line) {
            dispatch_frame(&name, frame, &shared, &notifications);
        }
    }
    // EOF: the process died or closed stdout. Intentional shutdown keeps
    // its Stopped state and does not wake the supervisor.
    let stopped = shared
        .state
        .lock()
        .map(|state| *state == LifecycleState::Stopped)
        .unwrap_or(false);
    shared.drain("upstream connection closed");
    if !stopped {
        shared.set_state(LifecycleState::Failed);
        let _ = on_exit.send(name).await;
    }
}

/// Routes one inbound frame to a waiter or the notification channel.
fn dispatch_frame(
    name: &UpstreamName,
    frame: Value,
    shared: &Arc<StdioShared>,
    notifications: &mpsc::Sender<UpstreamNotification>,
) {
    let is_response = frame.get("method").is_none();
    if is_response {
        let Ok(response) = serde_json::from_value::<JsonRpcResponse>(frame) else {
            return;
        };
        let Some(id) = response.id.as_i64() else {
            return;
        };
        let waiter = shared.pending.lock().ok().and_then(|mut pending| pending.remove(&id));
        if let Some(waiter) = waiter {
            let _ = waiter.send(response);
        }
        return;
    }
    let method = frame.get("method").and_then(Value::as_str).unwrap_or_default().to_string();
    if frame.get("id").is_none() {
        let params = frame.get("params").cloned();
        let _ = notifications.try_send(UpstreamNotification {
            upstream: name.clone(),
            method,
            params,
        });
    }
}

// ============================================================================
// SECTION: HTTP Connector
// ============================================================================

/// HTTP connector posting one frame per request.
pub struct HttpConnector {
    /// Endpoint URL.
    url: String,
    /// Shared HTTP client.
    client: reqwest::Client,
    /// Request id allocator.
    next_id: AtomicI64,
}

impl HttpConnector {
    /// Creates the connector for the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Transport`] when the client cannot be built.
    pub fn new(url: String, request_timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| UpstreamError::Transport(err.to_string()))?;
        Ok(Self {
            url,
            client,
            next_id: AtomicI64::new(1),
        })
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, UpstreamError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = JsonRpcRequest::new(json!(id), method, params);
        let response = self
            .client
            .post(&self.url)
            .json(&frame)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    UpstreamError::Timeout
                } else {
                    UpstreamError::Transport(err.to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(UpstreamError::Transport(format!(
                "endpoint returned {}",
                response.status()
            )));
        }
        let envelope: JsonRpcResponse = response
            .json()
            .await
            .map_err(|err| UpstreamError::Transport(err.to_string()))?;
        if envelope.jsonrpc != JSONRPC_VERSION {
            return Err(UpstreamError::Transport("invalid json-rpc version".to_string()));
        }
        if let Some(error) = envelope.error {
            return Err(UpstreamError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }

    fn state(&self) -> LifecycleState {
        LifecycleState::Ready
    }

    async fn shutdown(&self) {}
}

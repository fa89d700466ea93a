// crates/warden-upstream/src/router.rs
// ============================================================================
// Module: Warden Upstream Router
// Description: Routing, namespacing, fan-out, and restart supervision.
// Purpose: Own every upstream connector behind one routing surface.
// Dependencies: warden-core, crate::connector, tokio
// ============================================================================

//! ## Overview
//! The router owns all upstream connectors. Tool names cross the gateway
//! with an `<upstream>__<tool>` prefix; the router strips the prefix on
//! `tools/call` and re-attaches it when merging `tools/list` responses.
//! Every call passes a per-method circuit breaker and a per-upstream
//! in-flight bound. Crashed stdio upstreams restart under exponential
//! backoff (base 500 ms, cap 30 s, reset on readiness), with their circuits
//! forced open until the handshake completes again. Upstream notifications
//! fan out through a bounded broadcast ring that drops the oldest events
//! for lagging subscribers, so a slow client never stalls upstream
//! progress.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;
use tokio::sync::RwLock;
use tokio::sync::Semaphore;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use warden_core::CircuitConfig;
use warden_core::CircuitRegistry;
use warden_core::RetryPolicy;
use warden_core::Timestamp;
use warden_core::UpstreamName;

use crate::connector::Connector;
use crate::connector::HttpConnector;
use crate::connector::LifecycleState;
use crate::connector::StdioConnector;
use crate::connector::StdioLaunch;
use crate::connector::UpstreamError;
use crate::connector::UpstreamNotification;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between an upstream name and a tool name.
pub const TOOL_SEPARATOR: &str = "__";

/// Restart backoff base delay.
const RESTART_BASE: Duration = Duration::from_millis(500);

/// Restart backoff cap.
const RESTART_CAP: Duration = Duration::from_secs(30);

/// Capacity of the notification broadcast ring.
const NOTIFICATION_RING: usize = 256;

// ============================================================================
// SECTION: Specifications
// ============================================================================

/// One configured upstream.
pub enum UpstreamSpec {
    /// Subprocess upstream over stdio.
    Stdio {
        /// Upstream name.
        name: UpstreamName,
        /// Command to execute.
        command: String,
        /// Command arguments.
        args: Vec<String>,
        /// Extra environment variables.
        env: Vec<(String, String)>,
        /// Readiness window for the initialize handshake.
        readiness: Duration,
        /// Per-request timeout.
        request_timeout: Duration,
    },
    /// HTTP upstream.
    Http {
        /// Upstream name.
        name: UpstreamName,
        /// Endpoint URL.
        url: String,
        /// Per-request timeout.
        request_timeout: Duration,
    },
}

impl UpstreamSpec {
    /// Returns the upstream name.
    #[must_use]
    pub fn name(&self) -> &UpstreamName {
        match self {
            Self::Stdio {
                name, ..
            }
            | Self::Http {
                name, ..
            } => name,
        }
    }
}

/// Router configuration.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Circuit breaker configuration shared by all breakers.
    pub circuit: CircuitConfig,
    /// Maximum in-flight requests per upstream.
    pub max_inflight_per_upstream: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            circuit: CircuitConfig::default(),
            max_inflight_per_upstream: 64,
        }
    }
}

// ============================================================================
// SECTION: Upstream Handles
// ============================================================================

/// Router-side handle for one upstream.
struct UpstreamHandle {
    /// Live connector; absent while a stdio upstream restarts.
    connector: RwLock<Option<Arc<dyn Connector>>>,
    /// In-flight bound.
    inflight: Arc<Semaphore>,
}

impl UpstreamHandle {
    /// Returns the current lifecycle state.
    async fn state(&self) -> LifecycleState {
        match self.connector.read().await.as_ref() {
            Some(connector) => connector.state(),
            None => LifecycleState::Failed,
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Router over every configured upstream.
pub struct UpstreamRouter {
    /// Handles keyed by upstream name.
    upstreams: BTreeMap<UpstreamName, Arc<UpstreamHandle>>,
    /// Circuit breakers per `(upstream, method)`.
    circuits: CircuitRegistry,
    /// Notification fan-out ring.
    notifications: broadcast::Sender<UpstreamNotification>,
    /// Discovery cache of raw tool entries per upstream.
    discovery: RwLock<BTreeMap<UpstreamName, Vec<Value>>>,
    /// Retry policy for idempotent reads.
    read_retry: RetryPolicy,
}

impl UpstreamRouter {
    /// Starts the router: launches stdio upstreams and their supervisors.
    #[must_use]
    pub fn start(specs: Vec<UpstreamSpec>, config: RouterConfig) -> Arc<Self> {
        let (notify_tx, notify_rx) = mpsc::channel::<UpstreamNotification>(NOTIFICATION_RING);
        let (broadcast_tx, _) = broadcast::channel(NOTIFICATION_RING);

        let mut upstreams = BTreeMap::new();
        for spec in &specs {
            let handle = Arc::new(UpstreamHandle {
                connector: RwLock::new(None),
                inflight: Arc::new(Semaphore::new(config.max_inflight_per_upstream)),
            });
            upstreams.insert(spec.name().clone(), handle);
        }

        let router = Arc::new(Self {
            upstreams,
            circuits: CircuitRegistry::new(config.circuit),
            notifications: broadcast_tx,
            discovery: RwLock::new(BTreeMap::new()),
            read_retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 50,
                cap_delay_ms: 1_000,
            },
        });

        tokio::spawn(relay_notifications(Arc::clone(&router), notify_rx));
        for spec in specs {
            match spec {
                UpstreamSpec::Stdio {
                    name,
                    command,
                    args,
                    env,
                    readiness,
                    request_timeout,
                } => {
                    let launch = StdioLaunch {
                        name: name.clone(),
                        command,
                        args,
                        env,
                        readiness,
                        request_timeout,
                    };
                    tokio::spawn(supervise_stdio(
                        Arc::clone(&router),
                        name,
                        launch,
                        notify_tx.clone(),
                    ));
                }
                UpstreamSpec::Http {
                    name,
                    url,
                    request_timeout,
                } => {
                    let router = Arc::clone(&router);
                    tokio::spawn(async move {
                        if let Ok(connector) = HttpConnector::new(url, request_timeout) {
                            router.install(&name, Arc::new(connector)).await;
                        }
                    });
                }
            }
        }
        router
    }

    /// Installs a live connector for the upstream.
    async fn install(&self, name: &UpstreamName, connector: Arc<dyn Connector>) {
        if let Some(handle) = self.upstreams.get(name) {
            *handle.connector.write().await = Some(connector);
        }
    }

    /// Subscribes to upstream notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<UpstreamNotification> {
        self.notifications.subscribe()
    }

    /// Returns the configured upstream names.
    #[must_use]
    pub fn upstream_names(&self) -> Vec<UpstreamName> {
        self.upstreams.keys().cloned().collect()
    }

    /// Returns the lifecycle state of one upstream.
    pub async fn upstream_state(&self, name: &UpstreamName) -> Option<LifecycleState> {
        match self.upstreams.get(name) {
            Some(handle) => Some(handle.state().await),
            None => None,
        }
    }

    /// Routes one request to the named upstream.
    ///
    /// The call passes the per-method circuit and the per-upstream
    /// in-flight bound; idempotent reads retry transient failures with
    /// jittered backoff, writes never retry.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on rejection or call failure.
    pub async fn route(
        &self,
        name: &UpstreamName,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, UpstreamError> {
        let handle = self
            .upstreams
            .get(name)
            .ok_or_else(|| UpstreamError::UnknownUpstream(name.clone()))?;
        let breaker = self.circuits.breaker(name, method);
        breaker.try_acquire(Timestamp::now()).map_err(|_| UpstreamError::CircuitOpen)?;
        let Ok(_permit) = handle.inflight.clone().try_acquire_owned() else {
            return Err(UpstreamError::Backpressure);
        };

        let attempt = || async {
            let connector = handle.connector.read().await.clone();
            let Some(connector) = connector else {
                return Err(UpstreamError::Closed("upstream not ready".to_string()));
            };
            connector.call(method, params.clone()).await
        };

        let outcome = if is_idempotent(method) {
            self.read_retry
                .run(|_| attempt(), |err| {
                    matches!(
                        err,
                        UpstreamError::Timeout
                            | UpstreamError::Closed(_)
                            | UpstreamError::Transport(_)
                    )
                })
                .await
                .map(|(value, _)| value)
        } else {
            attempt().await
        };

        match &outcome {
            Ok(_) | Err(UpstreamError::Rpc { .. }) => breaker.record_success(),
            Err(_) => breaker.record_failure(Timestamp::now()),
        }
        outcome
    }

    /// Routes a prefixed `tools/call` to its upstream with the name
    /// restored.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::UnknownTool`] when the prefix does not
    /// resolve.
    pub async fn call_tool(
        &self,
        prefixed: &str,
        arguments: Option<Value>,
    ) -> Result<Value, UpstreamError> {
        let Some((upstream, tool)) = prefixed.split_once(TOOL_SEPARATOR) else {
            return Err(UpstreamError::UnknownTool(prefixed.to_string()));
        };
        let name = UpstreamName::new(upstream);
        if !self.upstreams.contains_key(&name) {
            return Err(UpstreamError::UnknownTool(prefixed.to_string()));
        }
        let mut params = serde_json::Map::new();
        params.insert("name".to_string(), json!(tool));
        if let Some(arguments) = arguments {
            params.insert("arguments".to_string(), arguments);
        }
        self.route(&name, "tools/call", Some(Value::Object(params))).await
    }

    /// Aggregates `tools/list` across upstreams with prefixes attached.
    ///
    /// Unreachable upstreams are skipped so one outage cannot empty the
    /// whole catalog.
    pub async fn aggregate_tools(&self) -> Vec<Value> {
        let mut merged = Vec::new();
        for name in self.upstreams.keys() {
            let tools = match self.cached_tools(name).await {
                Some(tools) => tools,
                None => match self.discover_tools(name).await {
                    Some(tools) => tools,
                    None => continue,
                },
            };
            for mut tool in tools {
                if let Some(tool_name) = tool.get("name").and_then(Value::as_str) {
                    let prefixed = format!("{name}{TOOL_SEPARATOR}{tool_name}");
                    if let Some(object) = tool.as_object_mut() {
                        object.insert("name".to_string(), json!(prefixed));
                    }
                    merged.push(tool);
                }
            }
        }
        merged
    }

    /// Aggregates `resources/list` across upstreams.
    pub async fn aggregate_resources(&self) -> Vec<Value> {
        let mut merged = Vec::new();
        for name in self.upstreams.keys() {
            let Ok(result) = self.route(name, "resources/list", None).await else {
                continue;
            };
            if let Some(resources) = result.get("resources").and_then(Value::as_array) {
                merged.extend(resources.iter().cloned());
            }
        }
        merged
    }

    /// Returns cached tool entries for the upstream.
    async fn cached_tools(&self, name: &UpstreamName) -> Option<Vec<Value>> {
        self.discovery.read().await.get(name).cloned()
    }

    /// Discovers and caches tool entries for the upstream.
    async fn discover_tools(&self, name: &UpstreamName) -> Option<Vec<Value>> {
        let result = self.route(name, "tools/list", None).await.ok()?;
        let tools = result.get("tools").and_then(Value::as_array).cloned()?;
        self.discovery.write().await.insert(name.clone(), tools.clone());
        Some(tools)
    }

    /// Drops cached discovery state for the upstream.
    async fn invalidate_discovery(&self, name: &UpstreamName) {
        self.discovery.write().await.remove(name);
    }

    /// Stops every connector and drains their waiters.
    pub async fn shutdown(&self) {
        for handle in self.upstreams.values() {
            if let Some(connector) = handle.connector.read().await.as_ref() {
                connector.shutdown().await;
            }
        }
    }
}

/// Returns true when the MCP method is an idempotent read.
fn is_idempotent(method: &str) -> bool {
    matches!(method, "tools/list" | "resources/list" | "resources/read" | "initialize")
}

// ============================================================================
// SECTION: Background Tasks
// ============================================================================

/// Relays connector notifications into the broadcast ring.
async fn relay_notifications(
    router: Arc<UpstreamRouter>,
    mut rx: mpsc::Receiver<UpstreamNotification>,
) {
    while let Some(notification) = rx.recv().await {
        if notification.method.ends_with("listChanged") {
            router.invalidate_discovery(&notification.upstream).await;
        }
        let _ = router.notifications.send(notification);
    }
}

/// Supervises one stdio upstream: launch, watch, restart with backoff.
async fn supervise_stdio(
    router: Arc<UpstreamRouter>,
    name: UpstreamName,
    launch: StdioLaunch,
    notify_tx: mpsc::Sender<UpstreamNotification>,
) {
    let mut backoff = RESTART_BASE;
    loop {
        let (exit_tx, mut exit_rx) = mpsc::channel::<UpstreamName>(1);
        let attempt = StdioLaunch {
            name: launch.name.clone(),
            command: launch.command.clone(),
            args: launch.args.clone(),
            env: launch.env.clone(),
            readiness: launch.readiness,
            request_timeout: launch.request_timeout,
        };
        match StdioConnector::launch(attempt, notify_tx.clone(), exit_tx).await {
            Ok(connector) => {
                backoff = RESTART_BASE;
                router.install(&name, connector).await;
                // Block until the reader reports process death.
                if exit_rx.recv().await.is_none() {
                    return;
                }
                router.circuits.force_open_upstream(&name, Timestamp::now());
                router.invalidate_discovery(&name).await;
                if let Some(handle) = router.upstreams.get(&name) {
                    *handle.connector.write().await = None;
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(RESTART_CAP);
            }
            Err(_) => {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(RESTART_CAP);
            }
        }
    }
}

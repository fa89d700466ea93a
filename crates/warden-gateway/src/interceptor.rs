// crates/warden-gateway/src/interceptor.rs
// ============================================================================
// Module: Gateway Interceptor
// Description: The policy enforcement path for every inbound frame.
// Purpose: Context, decision, enforcement, routing, and audit per request.
// Dependencies: warden-core, warden-enforce, warden-upstream, tokio
// ============================================================================

//! ## Overview
//! The interceptor is the single canonical execution path: every frame is
//! enriched into a sealed context, decided by the pipeline, enforced by the
//! constraint processors, routed upstream when permitted, and audited. A
//! critical constraint failure converts the permit into a policy-violation
//! error after the fact, and the audit record captures both the original
//! decision and the conversion. No path here can turn an error into a
//! permit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use serde_json::json;
use warden_core::ActionKind;
use warden_core::AgentId;
use warden_core::ContextCollector;
use warden_core::CorrelationId;
use warden_core::Decision;
use warden_core::DecisionContext;
use warden_core::DecisionPipeline;
use warden_core::ObligationOutcome;
use warden_core::PolicyDecision;
use warden_core::ResourceUri;
use warden_core::SessionId;
use warden_core::Timestamp;
use warden_core::wire;
use warden_core::wire::JsonRpcRequest;
use warden_core::wire::JsonRpcResponse;
use warden_enforce::AnomalyDetector;
use warden_enforce::AuditLogger;
use warden_enforce::AuditRecordParams;
use warden_enforce::ConstraintPipeline;
use warden_enforce::ObligationDispatcher;
use warden_upstream::UpstreamError;
use warden_upstream::UpstreamRouter;

use crate::telemetry::Diagnostics;
use crate::telemetry::GatewayMethod;

// ============================================================================
// SECTION: Frame Metadata
// ============================================================================

/// Transport metadata attached to one inbound frame.
#[derive(Debug, Clone)]
pub struct FrameMeta {
    /// Session the frame arrived on.
    pub session: SessionId,
    /// Correlation id attached at admission.
    pub correlation: CorrelationId,
    /// Transport label (`stdio` or `http`).
    pub transport: &'static str,
    /// Client address when the transport knows one.
    pub client_ip: Option<String>,
    /// Headers captured at admission.
    pub headers: BTreeMap<String, String>,
}

/// Header naming the calling agent.
const AGENT_HEADER: &str = "x-warden-agent";

// ============================================================================
// SECTION: Interceptor
// ============================================================================

/// The per-request enforcement path.
pub struct Interceptor {
    /// Context collector over the enricher pipeline.
    pub(crate) collector: ContextCollector,
    /// Decision pipeline.
    pub(crate) pipeline: DecisionPipeline,
    /// Constraint processor pipeline.
    pub(crate) constraints: ConstraintPipeline,
    /// Obligation dispatcher.
    pub(crate) dispatcher: ObligationDispatcher,
    /// Always-on audit logger.
    pub(crate) audit: AuditLogger,
    /// In-process anomaly detector.
    pub(crate) anomaly: AnomalyDetector,
    /// Upstream router.
    pub(crate) router: Arc<UpstreamRouter>,
    /// Diagnostics facility.
    pub(crate) diagnostics: Arc<Diagnostics>,
}

impl Interceptor {
    /// Handles one frame; notifications return no response.
    pub async fn handle(&self, meta: &FrameMeta, frame: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if frame.jsonrpc != wire::JSONRPC_VERSION {
            let id = frame.id.unwrap_or(Value::Null);
            return Some(JsonRpcResponse::error(
                id,
                wire::INVALID_REQUEST,
                "invalid json-rpc version",
            ));
        }
        if frame.is_notification() {
            // Client notifications need no reply and no policy evaluation.
            return None;
        }
        let id = frame.id.clone().unwrap_or(Value::Null);
        let response = match frame.method.as_str() {
            "initialize" => JsonRpcResponse::result(id, initialize_result()),
            "tools/list" => self.guarded_list(meta, id, ListKind::Tools).await,
            "resources/list" => self.guarded_list(meta, id, ListKind::Resources).await,
            "tools/call" => self.tools_call(meta, id, frame.params).await,
            "resources/read" => self.resources_read(meta, id, frame.params).await,
            other => self.forward_other(id, other, frame.params).await,
        };
        Some(response)
    }

    /// Classifies a method for telemetry.
    #[must_use]
    pub fn classify(method: &str) -> GatewayMethod {
        match method {
            "initialize" => GatewayMethod::Initialize,
            "tools/list" => GatewayMethod::ToolsList,
            "tools/call" => GatewayMethod::ToolsCall,
            "resources/list" => GatewayMethod::ResourcesList,
            "resources/read" => GatewayMethod::ResourcesRead,
            method if method.starts_with("notifications/") => GatewayMethod::Notification,
            _ => GatewayMethod::Other,
        }
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// Policy-guards an aggregated listing.
    async fn guarded_list(&self, meta: &FrameMeta, id: Value, kind: ListKind) -> JsonRpcResponse {
        let resource = match kind {
            ListKind::Tools => "tool:*",
            ListKind::Resources => "resource:*",
        };
        let started = Instant::now();
        let context = self.seal_context(meta, ActionKind::List, resource.into(), None).await;
        let decision = self.pipeline.decide(&context).await;
        if !decision.is_permit() {
            return self.deny(id, &context, &decision, started).await;
        }
        let result = match kind {
            ListKind::Tools => json!({"tools": self.router.aggregate_tools().await}),
            ListKind::Resources => {
                json!({"resources": self.router.aggregate_resources().await})
            }
        };
        self.finish_permit(&context, &decision, started, Vec::new()).await;
        JsonRpcResponse::result(id, result)
    }

    // ------------------------------------------------------------------
    // Tool Calls
    // ------------------------------------------------------------------

    /// Handles a policy-guarded `tools/call`.
    async fn tools_call(
        &self,
        meta: &FrameMeta,
        id: Value,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        let started = Instant::now();
        let Some(params) = params else {
            return JsonRpcResponse::error(id, wire::INVALID_PARAMS, "params required");
        };
        let Some(tool) = params.get("name").and_then(Value::as_str).map(String::from) else {
            return JsonRpcResponse::error(id, wire::INVALID_PARAMS, "tool name required");
        };
        let arguments = params.get("arguments").cloned();
        let purpose = params
            .get("_meta")
            .and_then(|meta| meta.get("purpose"))
            .and_then(Value::as_str)
            .map(String::from);

        let action = tool_action(&tool);
        let resource = ResourceUri::new(format!("tool:{tool}"));
        let context = self.seal_context(meta, action, resource, purpose).await;
        let decision = self.pipeline.decide(&context).await;
        if !decision.is_permit() {
            return self.deny(id, &context, &decision, started).await;
        }

        match self.router.call_tool(&tool, arguments).await {
            Ok(result) => {
                self.enforce_and_reply(id, &meta.correlation, &context, decision, started, result)
                    .await
            }
            Err(err) => {
                self.finish_permit(&context, &decision, started, Vec::new()).await;
                upstream_error_response(id, &err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Resource Reads
    // ------------------------------------------------------------------

    /// Handles a policy-guarded `resources/read`.
    async fn resources_read(
        &self,
        meta: &FrameMeta,
        id: Value,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        let started = Instant::now();
        let Some(uri) = params
            .as_ref()
            .and_then(|params| params.get("uri"))
            .and_then(Value::as_str)
            .map(String::from)
        else {
            return JsonRpcResponse::error(id, wire::INVALID_PARAMS, "resource uri required");
        };
        let context =
            self.seal_context(meta, ActionKind::Read, ResourceUri::new(uri.clone()), None).await;
        let decision = self.pipeline.decide(&context).await;
        if !decision.is_permit() {
            return self.deny(id, &context, &decision, started).await;
        }

        // Resource URIs carry no upstream prefix; ask each upstream in
        // order until one serves the read.
        let mut last_error = UpstreamError::UnknownTool(uri.clone());
        for name in self.router.upstream_names() {
            match self.router.route(&name, "resources/read", Some(json!({"uri": uri}))).await {
                Ok(result) => {
                    return self
                        .enforce_and_reply(id, &meta.correlation, &context, decision, started, result)
                        .await;
                }
                Err(err) => last_error = err,
            }
        }
        self.finish_permit(&context, &decision, started, Vec::new()).await;
        upstream_error_response(id, &last_error)
    }

    // ------------------------------------------------------------------
    // Other Methods
    // ------------------------------------------------------------------

    /// Forwards prefixed methods outside the policy surface.
    async fn forward_other(
        &self,
        id: Value,
        method: &str,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        let Some((upstream, bare)) = method.split_once("__") else {
            return JsonRpcResponse::error(id, wire::METHOD_NOT_FOUND, "method not found");
        };
        match self.router.route(&upstream.into(), bare, params).await {
            Ok(result) => JsonRpcResponse::result(id, result),
            Err(UpstreamError::UnknownUpstream(_)) => {
                JsonRpcResponse::error(id, wire::METHOD_NOT_FOUND, "method not found")
            }
            Err(err) => upstream_error_response(id, &err),
        }
    }

    // ------------------------------------------------------------------
    // Shared Steps
    // ------------------------------------------------------------------

    /// Builds and seals the decision context for a frame.
    async fn seal_context(
        &self,
        meta: &FrameMeta,
        action: ActionKind,
        resource: ResourceUri,
        purpose: Option<String>,
    ) -> Arc<DecisionContext> {
        let agent = meta
            .headers
            .get(AGENT_HEADER)
            .cloned()
            .unwrap_or_else(|| "anonymous".to_string());
        let mut seed = DecisionContext::new(
            AgentId::new(agent),
            action,
            resource,
            purpose,
            Timestamp::now(),
            meta.session.clone(),
        );
        // The correlation id stays out of the environment: it changes per
        // request and would defeat the cache fingerprint.
        let mut transport = BTreeMap::new();
        transport.insert("kind".to_string(), json!(meta.transport));
        transport.insert("sessionId".to_string(), json!(meta.session.as_str()));
        if let Some(client_ip) = &meta.client_ip {
            transport.insert("clientIp".to_string(), json!(client_ip));
        }
        seed.environment.merge("transport", transport);
        self.collector.collect(seed).await
    }

    /// Applies constraints to a permitted response and answers the client.
    async fn enforce_and_reply(
        &self,
        id: Value,
        correlation: &CorrelationId,
        context: &Arc<DecisionContext>,
        decision: PolicyDecision,
        started: Instant,
        result: Value,
    ) -> JsonRpcResponse {
        match self.constraints.apply(&decision.constraints, result, context) {
            Ok(application) => {
                self.finish_permit(context, &decision, started, application.applied).await;
                JsonRpcResponse::result(id, application.data)
            }
            Err(failure) => {
                self.diagnostics.warn(
                    "interceptor",
                    &format!("[{correlation}] permit converted to denial: {}", failure.reason),
                );
                self.deny_converted(id, context, &decision, started, failure.reason).await
            }
        }
    }

    /// Finishes a permitted request: obligations, audit, anomaly.
    async fn finish_permit(
        &self,
        context: &Arc<DecisionContext>,
        decision: &PolicyDecision,
        started: Instant,
        constraints_applied: Vec<String>,
    ) {
        let outcomes = self.dispatcher.execute(&decision.obligations, context, decision).await;
        let (_, record) = self
            .audit
            .log(
                audit_params(context, decision, decision.decision, started, constraints_applied, outcomes, None),
                Timestamp::now(),
            )
            .await;
        self.anomaly.observe(&record);
    }

    /// Answers a denied or indeterminate request.
    async fn deny(
        &self,
        id: Value,
        context: &Arc<DecisionContext>,
        decision: &PolicyDecision,
        started: Instant,
    ) -> JsonRpcResponse {
        let outcomes = self.dispatcher.execute(&decision.obligations, context, decision).await;
        let reason = decision.reason.clone();
        let (_, record) = self
            .audit
            .log(
                audit_params(context, decision, Decision::Deny, started, Vec::new(), outcomes, None),
                Timestamp::now(),
            )
            .await;
        self.anomaly.observe(&record);
        JsonRpcResponse::error(id, wire::POLICY_VIOLATION, sanitize_reason(&reason))
    }

    /// Converts a permit into a denial after a critical constraint failure.
    async fn deny_converted(
        &self,
        id: Value,
        context: &Arc<DecisionContext>,
        decision: &PolicyDecision,
        started: Instant,
        reason: String,
    ) -> JsonRpcResponse {
        let outcomes = self.dispatcher.execute(&decision.obligations, context, decision).await;
        let (_, record) = self
            .audit
            .log(
                audit_params(
                    context,
                    decision,
                    Decision::Deny,
                    started,
                    Vec::new(),
                    outcomes,
                    Some(Decision::Permit),
                ),
                Timestamp::now(),
            )
            .await;
        self.anomaly.observe(&record);
        JsonRpcResponse::error(id, wire::POLICY_VIOLATION, sanitize_reason(&reason))
    }
}

/// Listing variants.
enum ListKind {
    /// Aggregated tools listing.
    Tools,
    /// Aggregated resources listing.
    Resources,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the local initialize result.
fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2025-03-26",
        "serverInfo": {"name": "warden", "version": env!("CARGO_PKG_VERSION")},
        "capabilities": {
            "tools": {"listChanged": true},
            "resources": {"listChanged": true}
        }
    })
}

/// Derives the semantic action from a tool name.
fn tool_action(tool: &str) -> ActionKind {
    let bare = tool.rsplit("__").next().unwrap_or(tool);
    if bare.contains("list") {
        ActionKind::List
    } else if bare.contains("read") || bare.contains("get") || bare.contains("search") {
        ActionKind::Read
    } else if bare.contains("delete") || bare.contains("remove") {
        ActionKind::Delete
    } else if bare.contains("write") || bare.contains("create") || bare.contains("update") {
        ActionKind::Write
    } else {
        ActionKind::Execute
    }
}

/// Builds audit parameters for one finished request.
fn audit_params(
    context: &Arc<DecisionContext>,
    decision: &PolicyDecision,
    visible: Decision,
    started: Instant,
    constraints_applied: Vec<String>,
    obligation_results: Vec<ObligationOutcome>,
    converted_from: Option<Decision>,
) -> AuditRecordParams {
    AuditRecordParams {
        agent: context.agent.clone(),
        action: context.action.clone(),
        resource: context.resource.clone(),
        decision: visible,
        reason: decision.reason.clone(),
        policy_id: decision.policy_id.clone(),
        engine: decision.engine,
        latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        constraints_applied,
        obligation_results,
        context_hash: context.fingerprint(),
        converted_from,
    }
}

/// Maps an upstream error onto the stable JSON-RPC code table.
fn upstream_error_response(id: Value, err: &UpstreamError) -> JsonRpcResponse {
    match err {
        UpstreamError::Timeout => JsonRpcResponse::error(id, wire::TIMEOUT, "upstream timed out"),
        UpstreamError::Rpc {
            code,
            message,
        } => JsonRpcResponse::error(id, *code, message.clone()),
        UpstreamError::UnknownTool(tool) => {
            JsonRpcResponse::error(id, wire::METHOD_NOT_FOUND, format!("unknown tool: {tool}"))
        }
        UpstreamError::UnknownUpstream(name) => JsonRpcResponse::error(
            id,
            wire::METHOD_NOT_FOUND,
            format!("unknown upstream: {name}"),
        ),
        UpstreamError::CircuitOpen
        | UpstreamError::Closed(_)
        | UpstreamError::Backpressure
        | UpstreamError::Transport(_) => {
            JsonRpcResponse::error(id, wire::UPSTREAM_UNAVAILABLE, err.to_string())
        }
    }
}

/// Strips anything secret-shaped from a client-visible reason.
fn sanitize_reason(reason: &str) -> String {
    let mut sanitized = reason.replace(|c: char| c.is_control(), " ");
    sanitized.truncate(512);
    sanitized
}

// crates/warden-gateway/tests/enforcement_path.rs
// ============================================================================
// Module: Enforcement Path Tests
// Description: End-to-end scenarios through the assembled gateway.
// ============================================================================
//! ## Overview
//! Drives the interceptor of a fully assembled gateway against a scripted
//! shell MCP upstream: permitted reads, prohibited writes, rate-limit
//! conversion, indeterminate fallbacks, and audit persistence.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;
use warden_config::WardenConfig;
use warden_core::Applicability;
use warden_core::ConstraintDirective;
use warden_core::CorrelationId;
use warden_core::Pattern;
use warden_core::Policy;
use warden_core::PolicyId;
use warden_core::PolicyRule;
use warden_core::PolicyStatus;
use warden_core::SessionId;
use warden_core::Timestamp;
use warden_core::wire::JsonRpcRequest;
use warden_gateway::FrameMeta;
use warden_gateway::GatewayApp;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Scripted MCP server answering initialize, tools/list, and tools/call.
const STUB_SERVER: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"method":"notifications/initialized"'*) : ;;
    *'"method":"initialize"'*)
      id=${line#*\"id\":}; id=${id%%,*}
      printf '{"jsonrpc":"2.0","id":%s,"result":{"capabilities":{}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      id=${line#*\"id\":}; id=${id%%,*}
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"read_file"},{"name":"write_file"}]}}\n' "$id" ;;
    *'"method":"tools/call"'*'"name":"read_file"'*)
      id=${line#*\"id\":}; id=${id%%,*}
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"file body"}],"email":"jane.doe@example.com"}}\n' "$id" ;;
    *)
      id=${line#*\"id\":}; id=${id%%,*}
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"method not found"}}\n' "$id" ;;
  esac
done
"#;

/// Writes the stub server script and returns its path.
fn stub_server(dir: &Path) -> PathBuf {
    let path = dir.join("stub-mcp.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(STUB_SERVER.as_bytes()).unwrap();
    drop(file);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Writes one policy JSON into the policy directory.
fn write_policy(dir: &Path, policy: &Policy) {
    let path = dir.join(format!("{}.json", policy.id));
    std::fs::write(path, serde_json::to_vec_pretty(policy).unwrap()).unwrap();
}

/// Builds a policy skeleton.
fn policy(id: &str, priority: i64) -> Policy {
    Policy {
        id: PolicyId::new(id),
        name: id.to_string(),
        priority,
        status: PolicyStatus::Active,
        natural_language_text: format!("Intent: test {id}. Rules: structured."),
        applicability: Applicability::any(),
        permissions: Vec::new(),
        prohibitions: Vec::new(),
        version: "0.1.0".to_string(),
        created_at: Timestamp::from_unix_millis(0),
        updated_at: Timestamp::from_unix_millis(0),
    }
}

/// Builds an unconstrained rule.
fn rule(action: &str, target: &str) -> PolicyRule {
    PolicyRule {
        action: Pattern::new(action),
        target: Pattern::new(target),
        constraint: None,
        constraints: Vec::new(),
        duties: Vec::new(),
        priority: 0,
    }
}

/// Test harness around one assembled gateway.
struct Harness {
    /// Assembled gateway.
    app: Arc<GatewayApp>,
    /// Audit directory for assertions.
    audit_dir: PathBuf,
    /// Kept alive for the temp directory lifetime.
    _dir: tempfile::TempDir,
}

impl Harness {
    /// Assembles a gateway over the stub upstream and given policies.
    async fn start(policies: Vec<Policy>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = stub_server(dir.path());
        let policy_dir = dir.path().join("policies");
        let audit_dir = dir.path().join("audit");
        std::fs::create_dir_all(&policy_dir).unwrap();
        for policy in &policies {
            write_policy(&policy_dir, policy);
        }

        let toml = format!(
            r#"
            [server]
            transport = "stdio"

            [[upstream]]
            name = "filesystem"
            command = "{}"

            [policies]
            dir = "{}"

            [audit]
            sink = "file"
            dir = "{}"
            "#,
            script.display(),
            policy_dir.display(),
            audit_dir.display(),
        );
        let config: WardenConfig = toml::from_str(&toml).unwrap();
        let app = GatewayApp::from_config(config).unwrap();
        wait_for_upstream(&app).await;
        Self {
            app,
            audit_dir,
            _dir: dir,
        }
    }

    /// Sends one request frame through the interceptor.
    async fn request(&self, id: i64, method: &str, params: Value) -> Value {
        let meta = FrameMeta {
            session: SessionId::new("test-session"),
            correlation: CorrelationId::new(format!("req-{id}")),
            transport: "stdio",
            client_ip: None,
            headers: BTreeMap::new(),
        };
        let frame = JsonRpcRequest::new(json!(id), method, Some(params));
        let response = self.app.interceptor.handle(&meta, frame).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    /// Reads all persisted audit records.
    fn audit_records(&self) -> Vec<Value> {
        let mut records = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.audit_dir) else {
            return records;
        };
        for entry in entries.flatten() {
            let content = std::fs::read_to_string(entry.path()).unwrap_or_default();
            for line in content.lines() {
                if let Ok(record) = serde_json::from_str::<Value>(line) {
                    records.push(record);
                }
            }
        }
        records
    }
}

/// Waits for the stub upstream to report ready.
async fn wait_for_upstream(app: &GatewayApp) {
    let name = warden_core::UpstreamName::new("filesystem");
    for _ in 0..100 {
        if app.router.upstream_state(&name).await
            == Some(warden_upstream::LifecycleState::Ready)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("stub upstream never became ready");
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

/// Initialize is answered locally with change notifications advertised.
#[tokio::test]
async fn test_initialize_answered_locally() {
    let harness = Harness::start(Vec::new()).await;
    let response = harness.request(1, "initialize", json!({})).await;
    assert_eq!(response["result"]["serverInfo"]["name"], json!("warden"));
    assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], json!(true));
}

/// Tools listing aggregates with the upstream prefix attached.
#[tokio::test]
async fn test_tools_list_prefixed() {
    let harness = Harness::start(Vec::new()).await;
    let response = harness.request(1, "tools/list", json!({})).await;
    let names: Vec<&str> = response["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert!(names.contains(&"filesystem__read_file"));
}

/// Scenario: a permitted read is forwarded and audited.
#[tokio::test]
async fn test_read_permitted_and_audited() {
    let harness = Harness::start(Vec::new()).await;
    let response = harness
        .request(1, "tools/call", json!({
            "name": "filesystem__read_file",
            "arguments": {"path": "/data/a.txt"}
        }))
        .await;
    assert_eq!(response["result"]["content"][0]["text"], json!("file body"));

    let records = harness.audit_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["decision"], json!("PERMIT"));
    assert_eq!(records[0]["engine"], json!("RULE"));
}

/// Scenario: a prohibited write answers -32001 without touching upstream.
#[tokio::test]
async fn test_write_denied_by_prohibition() {
    let mut guard = policy("write-guard", 10);
    guard.prohibitions.push(rule("write", "*"));
    let harness = Harness::start(vec![guard]).await;

    let response = harness
        .request(2, "tools/call", json!({
            "name": "filesystem__write_file",
            "arguments": {"path": "/data/b.txt", "content": "x"}
        }))
        .await;
    assert_eq!(response["error"]["code"], json!(-32001));

    let records = harness.audit_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["decision"], json!("DENY"));
}

/// Scenario: the rate limit converts the fourth permitted call.
#[tokio::test]
async fn test_rate_limit_converts_permit() {
    let mut limited = policy("ratey", 10);
    let mut permission = rule("read", "tool:filesystem__read_file");
    permission.constraints.push(ConstraintDirective::new("rate-limit:3/60s"));
    limited.permissions.push(permission);
    let harness = Harness::start(vec![limited]).await;

    for id in 1..=3 {
        let response = harness
            .request(id, "tools/call", json!({
                "name": "filesystem__read_file",
                "arguments": {"path": "/data/a.txt"}
            }))
            .await;
        assert!(response.get("error").is_none(), "call {id} should pass");
    }
    let response = harness
        .request(4, "tools/call", json!({
            "name": "filesystem__read_file",
            "arguments": {"path": "/data/a.txt"}
        }))
        .await;
    assert_eq!(response["error"]["code"], json!(-32001));
    assert!(response["error"]["message"].as_str().unwrap().contains("rate limit"));

    let records = harness.audit_records();
    let permits = records.iter().filter(|r| r["decision"] == json!("PERMIT")).count();
    let conversions =
        records.iter().filter(|r| r["converted_from"] == json!("PERMIT")).count();
    assert_eq!(permits, 3);
    assert_eq!(conversions, 1);
}

/// Scenario: anonymization transforms the permitted response in place.
#[tokio::test]
async fn test_anonymize_applied_to_response() {
    let mut masked = policy("mask-mail", 10);
    let mut permission = rule("read", "tool:filesystem__read_file");
    permission.constraints.push(ConstraintDirective::new("anonymize:email"));
    masked.permissions.push(permission);
    let harness = Harness::start(vec![masked]).await;

    let response = harness
        .request(1, "tools/call", json!({
            "name": "filesystem__read_file",
            "arguments": {"path": "/data/a.txt"}
        }))
        .await;
    assert_eq!(response["result"]["email"], json!("j***@example.com"));
    assert_eq!(response["result"]["content"][0]["text"], json!("file body"));
}

/// Without rules or a judge backend, execution is indeterminate and denied.
#[tokio::test]
async fn test_unmatched_execute_is_denied() {
    let harness = Harness::start(Vec::new()).await;
    let response = harness
        .request(1, "tools/call", json!({
            "name": "filesystem__run_thing",
            "arguments": {}
        }))
        .await;
    assert_eq!(response["error"]["code"], json!(-32001));

    let records = harness.audit_records();
    assert_eq!(records[0]["decision"], json!("DENY"));
}

/// Unknown methods answer method-not-found.
#[tokio::test]
async fn test_unknown_method() {
    let harness = Harness::start(Vec::new()).await;
    let response = harness.request(1, "prompts/list", json!({})).await;
    assert_eq!(response["error"]["code"], json!(-32601));
}

/// Unknown tool prefixes answer method-not-found, not policy denials.
#[tokio::test]
async fn test_unknown_tool_prefix() {
    let harness = Harness::start(Vec::new()).await;
    let response = harness
        .request(1, "tools/call", json!({"name": "mail__read_message", "arguments": {}}))
        .await;
    assert_eq!(response["error"]["code"], json!(-32601));
}

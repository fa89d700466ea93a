// crates/warden-upstream/tests/router.rs
// ============================================================================
// Module: Upstream Router Tests
// Description: Tests for namespacing, routing, circuits, and supervision.
// ============================================================================
//! ## Overview
//! Drives the router against a scripted shell MCP server for the tool-name
//! round trip, and against a missing upstream for circuit behavior.

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

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use warden_core::CircuitConfig;
use warden_core::UpstreamName;
use warden_upstream::RouterConfig;
use warden_upstream::UpstreamError;
use warden_upstream::UpstreamRouter;
use warden_upstream::UpstreamSpec;

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
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"ok"}]}}\n' "$id" ;;
    *)
      id=${line#*\"id\":}; id=${id%%,*}
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"method not found"}}\n' "$id" ;;
  esac
done
"#;

/// Writes the stub server script and returns its path.
fn stub_server(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("stub-mcp.sh");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(STUB_SERVER.as_bytes()).unwrap();
    drop(file);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Builds a router over the stub server.
fn stub_router(script: &std::path::Path) -> std::sync::Arc<UpstreamRouter> {
    UpstreamRouter::start(
        vec![UpstreamSpec::Stdio {
            name: UpstreamName::new("filesystem"),
            command: script.display().to_string(),
            args: Vec::new(),
            env: Vec::new(),
            readiness: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }],
        RouterConfig::default(),
    )
}

/// Waits until the upstream reports ready.
async fn wait_ready(router: &UpstreamRouter, name: &UpstreamName) {
    for _ in 0..100 {
        if router.upstream_state(name).await
            == Some(warden_upstream::LifecycleState::Ready)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("upstream never became ready");
}

/// Tests aggregation prefixes and the tools/call round trip.
#[tokio::test]
async fn test_tool_name_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let router = stub_router(&stub_server(&dir));
    wait_ready(&router, &UpstreamName::new("filesystem")).await;

    let tools = router.aggregate_tools().await;
    let names: Vec<&str> =
        tools.iter().filter_map(|tool| tool["name"].as_str()).collect();
    assert!(names.contains(&"filesystem__read_file"));
    assert!(names.contains(&"filesystem__write_file"));

    // The stub only answers when the prefix was stripped back off.
    let result = router
        .call_tool("filesystem__read_file", Some(json!({"path": "/data/a.txt"})))
        .await
        .unwrap();
    assert_eq!(result["content"][0]["text"], json!("ok"));

    router.shutdown().await;
}

/// Tests that an unknown prefix resolves to an unknown-tool error.
#[tokio::test]
async fn test_unknown_prefix_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let router = stub_router(&stub_server(&dir));
    wait_ready(&router, &UpstreamName::new("filesystem")).await;

    let unprefixed = router.call_tool("read_file", None).await;
    assert!(matches!(unprefixed, Err(UpstreamError::UnknownTool(_))));
    let unknown = router.call_tool("mail__send", None).await;
    assert!(matches!(unknown, Err(UpstreamError::UnknownTool(_))));

    router.shutdown().await;
}

/// Tests that repeated failures open the circuit for the method.
#[tokio::test]
async fn test_circuit_opens_for_missing_upstream() {
    let router = UpstreamRouter::start(
        vec![UpstreamSpec::Stdio {
            name: UpstreamName::new("ghost"),
            command: "/nonexistent/mcp-server".to_string(),
            args: Vec::new(),
            env: Vec::new(),
            readiness: Duration::from_millis(200),
            request_timeout: Duration::from_millis(200),
        }],
        RouterConfig {
            circuit: CircuitConfig {
                failure_threshold: 2,
                window_ms: 60_000,
                cooldown_ms: 30_000,
            },
            max_inflight_per_upstream: 4,
        },
    );
    let name = UpstreamName::new("ghost");

    // tools/call never retries, so each call counts one failure.
    for _ in 0..2 {
        let outcome = router.route(&name, "tools/call", None).await;
        assert!(matches!(outcome, Err(UpstreamError::Closed(_))));
    }
    let outcome = router.route(&name, "tools/call", None).await;
    assert!(matches!(outcome, Err(UpstreamError::CircuitOpen)));

    router.shutdown().await;
}

/// Tests that routing to an unconfigured upstream fails cleanly.
#[tokio::test]
async fn test_unknown_upstream() {
    let router = UpstreamRouter::start(Vec::new(), RouterConfig::default());
    let outcome = router.route(&UpstreamName::new("nope"), "tools/list", None).await;
    assert!(matches!(outcome, Err(UpstreamError::UnknownUpstream(_))));
}

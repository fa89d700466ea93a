// crates/warden-core/src/wire/mod.rs
// ============================================================================
// Module: Warden Wire Types
// Description: JSON-RPC 2.0 envelopes and the stable gateway error codes.
// Purpose: Share one frame vocabulary between gateway and upstream crates.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Warden speaks JSON-RPC 2.0 on both sides of the proxy. This module owns
//! the envelope types and the stable error code table. Framing discipline
//! (newline-delimited stdio, HTTP bodies) lives with the transports; the
//! types here are transport-agnostic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// JSON-RPC parse error.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC invalid request.
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC method not found.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC invalid params.
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC internal error.
pub const INTERNAL_ERROR: i64 = -32603;
/// Request denied by policy, or a permit converted by enforcement.
pub const POLICY_VIOLATION: i64 = -32001;
/// Request or downstream call timed out.
pub const TIMEOUT: i64 = -32002;
/// Upstream unavailable or circuit open.
pub const UPSTREAM_UNAVAILABLE: i64 = -32003;

/// JSON-RPC protocol version literal.
pub const JSONRPC_VERSION: &str = "2.0";

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Incoming JSON-RPC request or notification payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Optional parameters payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Builds a request with the given id, method, and params.
    #[must_use]
    pub fn new(id: Value, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Builds a notification (no id) with the given method and params.
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }

    /// Returns true when this frame is a notification.
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    pub jsonrpc: String,
    /// Request identifier the response answers.
    pub id: Value,
    /// Successful result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a successful response.
    #[must_use]
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Stable error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Structured error metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::JsonRpcRequest;
    use super::JsonRpcResponse;

    /// Tests notification detection on frames without an id.
    #[test]
    fn test_notification_has_no_id() {
        let frame: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/tools/listChanged"
        }))
        .unwrap();
        assert!(frame.is_notification());
    }

    /// Tests error envelope shape.
    #[test]
    fn test_error_envelope() {
        let response = JsonRpcResponse::error(json!(7), super::POLICY_VIOLATION, "denied");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"]["code"], json!(-32001));
        assert_eq!(value["id"], json!(7));
        assert!(value.get("result").is_none());
    }
}

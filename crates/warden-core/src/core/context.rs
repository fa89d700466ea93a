// crates/warden-core/src/core/context.rs
// ============================================================================
// Module: Warden Decision Context
// Description: Immutable per-request context with layered enrichment.
// Purpose: Carry the facts a policy decision is made from.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`DecisionContext`] is assembled once per request by the context
//! collector and then sealed. Enricher outputs live in a namespaced
//! environment layer; the well-known facets (trust score, agent type,
//! clearance, resource classification) are lifted out of that layer when the
//! context is sealed. No component mutates a sealed context.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::hashing::hash_fingerprint;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::SessionId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Action Kind
// ============================================================================

/// Semantic verb describing what the request does to its resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Read a resource or tool output.
    Read,
    /// Write or mutate a resource.
    Write,
    /// Execute a tool or command.
    Execute,
    /// Delete a resource.
    Delete,
    /// List resources or tools.
    List,
    /// Any other verb, carried verbatim.
    Other(String),
}

impl ActionKind {
    /// Returns a stable label for the action.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Execute => "execute",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Other(verb) => verb.as_str(),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(value: &str) -> Self {
        match value {
            "read" => Self::Read,
            "write" => Self::Write,
            "execute" => Self::Execute,
            "delete" => Self::Delete,
            "list" => Self::List,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Resource URI
// ============================================================================

/// Opaque resource URI, e.g. `tool:filesystem__read_file` or `file:///data/a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUri(String);

impl ResourceUri {
    /// Creates a new resource URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Returns the URI as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the URI scheme when one is present.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.0.split_once(':').map(|(scheme, _)| scheme)
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ResourceUri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ResourceUri {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Environment Layer
// ============================================================================

/// Namespaced key-value layer holding enricher outputs.
///
/// # Invariants
/// - Keys are `"<namespace>.<field>"` with the namespace owned by exactly one
///   enricher.
/// - The layer is write-once per namespace during collection; sealed contexts
///   never change it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentLayer(BTreeMap<String, Value>);

impl EnvironmentLayer {
    /// Creates an empty environment layer.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Merges an enricher output map under the given namespace.
    pub fn merge(&mut self, namespace: &str, output: BTreeMap<String, Value>) {
        for (key, value) in output {
            self.0.insert(format!("{namespace}.{key}"), value);
        }
    }

    /// Looks up a fully qualified `namespace.field` key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the layer holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all stored entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

// ============================================================================
// SECTION: Decision Context
// ============================================================================

/// Trust score assigned to agents the directory does not know.
pub const UNKNOWN_AGENT_TRUST_SCORE: f64 = 0.5;

/// Agent type label for agents the directory does not know.
pub const UNKNOWN_AGENT_TYPE: &str = "unknown";

/// Immutable record passed through the decision pipeline.
///
/// # Invariants
/// - Sealed contexts are shared behind `Arc` and never mutated.
/// - `trust_score` stays within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionContext {
    /// Identifier of the calling agent.
    pub agent: AgentId,
    /// Semantic verb for the request.
    pub action: ActionKind,
    /// Opaque resource URI the request targets.
    pub resource: ResourceUri,
    /// Optional free-text intent supplied by the caller.
    pub purpose: Option<String>,
    /// Wall clock at request admission.
    pub time: Timestamp,
    /// Session the request arrived on.
    pub session: SessionId,
    /// Namespaced enricher outputs.
    pub environment: EnvironmentLayer,
    /// Trust score in `[0, 1]` lifted from the agent-info enricher.
    pub trust_score: f64,
    /// Agent type label lifted from the agent-info enricher.
    pub agent_type: String,
    /// Clearance level lifted from the agent-info enricher.
    pub clearance_level: u8,
    /// Resource classification lifted from the resource-classifier enricher.
    pub resource_classification: String,
}

impl DecisionContext {
    /// Creates an unenriched context for a freshly admitted request.
    #[must_use]
    pub fn new(
        agent: AgentId,
        action: ActionKind,
        resource: ResourceUri,
        purpose: Option<String>,
        time: Timestamp,
        session: SessionId,
    ) -> Self {
        Self {
            agent,
            action,
            resource,
            purpose,
            time,
            session,
            environment: EnvironmentLayer::new(),
            trust_score: UNKNOWN_AGENT_TRUST_SCORE,
            agent_type: UNKNOWN_AGENT_TYPE.to_string(),
            clearance_level: 0,
            resource_classification: "unclassified".to_string(),
        }
    }

    /// Returns the trust score bucketed into tenths for cache keying.
    ///
    /// A score of exactly 1.0 lands in the top bucket rather than an
    /// eleventh one.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Score is clamped to [0, 1] and scaled into [0, 9] before the cast."
    )]
    pub fn trust_score_bucket(&self) -> u8 {
        let clamped = self.trust_score.clamp(0.0, 1.0);
        (clamped * 10.0).floor().min(9.0) as u8
    }

    /// Computes the fingerprint over fields outside the cache key.
    ///
    /// The fingerprint covers `purpose` and the full environment layer, so a
    /// cache hit whose context materially differs is rejected even when the
    /// key fields line up.
    #[must_use]
    pub fn fingerprint(&self) -> HashDigest {
        hash_fingerprint(&ContextFingerprintPayload {
            purpose: self.purpose.as_deref(),
            environment: &self.environment,
        })
    }
}

/// Serialization payload for context fingerprints.
#[derive(Serialize)]
struct ContextFingerprintPayload<'a> {
    /// Free-text intent when present.
    purpose: Option<&'a str>,
    /// Full enricher environment.
    environment: &'a EnvironmentLayer,
}

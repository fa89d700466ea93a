// crates/warden-config/src/config.rs
// ============================================================================
// Module: Warden Configuration
// Description: Configuration loading and validation for the Warden gateway.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: warden-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits and an
//! environment-variable path override. Missing or invalid configuration
//! fails closed: the gateway refuses to start rather than serving under
//! defaults it cannot trust. Every recognized key is validated against
//! documented bounds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use warden_core::BatchConfig;
use warden_core::CacheConfig;
use warden_core::CircuitConfig;
use warden_core::PolicyId;
use warden_core::UpstreamName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "warden.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "WARDEN_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum number of configured upstream servers.
pub(crate) const MAX_UPSTREAMS: usize = 64;
/// Maximum number of agent directory entries.
pub(crate) const MAX_AGENT_ENTRIES: usize = 4_096;
/// Maximum number of geo table entries.
pub(crate) const MAX_GEO_ENTRIES: usize = 4_096;
/// Minimum allowed cache capacity.
pub(crate) const MIN_CACHE_ENTRIES: usize = 16;
/// Maximum allowed cache capacity.
pub(crate) const MAX_CACHE_ENTRIES: usize = 1_000_000;
/// Minimum allowed circuit cooldown in milliseconds.
pub(crate) const MIN_COOLDOWN_MS: u64 = 100;
/// Maximum allowed circuit cooldown in milliseconds.
pub(crate) const MAX_COOLDOWN_MS: u64 = 600_000;
/// Minimum allowed rate-limit window in milliseconds.
pub(crate) const MIN_RATE_WINDOW_MS: u64 = 100;
/// Maximum allowed rate-limit window in milliseconds.
pub(crate) const MAX_RATE_WINDOW_MS: u64 = 3_600_000;
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
/// Default maximum in-flight requests per session.
pub(crate) const DEFAULT_SESSION_INFLIGHT: usize = 32;
/// Default maximum in-flight requests per upstream.
pub(crate) const DEFAULT_UPSTREAM_INFLIGHT: usize = 64;
/// Default idle window before a session is discarded, in milliseconds.
pub(crate) const DEFAULT_SESSION_IDLE_MS: u64 = 1_800_000;
/// Default ceiling on policy text size in bytes.
pub(crate) const DEFAULT_POLICY_TEXT_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Enumerations
// ============================================================================

/// Gateway transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayTransport {
    /// Newline-delimited JSON-RPC over stdin/stdout.
    Stdio,
    /// JSON-RPC over HTTP with SSE notifications.
    Http,
}

/// Judge backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeBackend {
    /// No backend; the stub judge answers indeterminate.
    None,
    /// HTTP JSON adapter.
    Http,
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// Dated newline-delimited JSON files with daily rotation.
    File,
    /// JSON lines to standard output (HTTP transport only).
    Stdout,
    /// Discard records.
    Null,
}

/// Diagnostic log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal operation.
    Info,
    /// Degraded operation.
    Warn,
    /// Failures only.
    Error,
}

// ============================================================================
// SECTION: Section Types
// ============================================================================

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Transport selection.
    #[serde(default = "default_transport")]
    pub transport: GatewayTransport,
    /// HTTP bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTTP bind host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum in-flight requests per session.
    #[serde(default = "default_session_inflight")]
    pub max_inflight_per_session: usize,
    /// Maximum in-flight requests per upstream.
    #[serde(default = "default_upstream_inflight")]
    pub max_inflight_per_upstream: usize,
    /// Idle window before a session is discarded, in milliseconds.
    #[serde(default = "default_session_idle_ms")]
    pub session_idle_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
            max_inflight_per_session: default_session_inflight(),
            max_inflight_per_upstream: default_upstream_inflight(),
            session_idle_ms: default_session_idle_ms(),
        }
    }
}

/// One upstream MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Upstream name used for tool prefixes and routing.
    pub name: UpstreamName,
    /// Launch command for stdio upstreams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Launch arguments for stdio upstreams.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment for stdio upstreams.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Endpoint URL for HTTP upstreams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Readiness window for the initialize handshake, in milliseconds.
    #[serde(default = "default_readiness_ms")]
    pub readiness_ms: u64,
    /// Per-request timeout toward this upstream, in milliseconds.
    #[serde(default = "default_upstream_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Judge adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Backend selection.
    #[serde(default = "default_judge_backend")]
    pub backend: JudgeBackend,
    /// Endpoint URL for the HTTP backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Judge call timeout in milliseconds.
    #[serde(default = "default_judge_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry attempts for transient judge failures.
    #[serde(default = "default_judge_attempts")]
    pub max_attempts: u32,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            backend: default_judge_backend(),
            url: None,
            timeout_ms: default_judge_timeout_ms(),
            max_attempts: default_judge_attempts(),
        }
    }
}

/// Decision cache configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Maximum cached entries.
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    /// Base TTL in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub default_ttl_ms: u64,
    /// Upper bound on any derived TTL in milliseconds.
    #[serde(default = "default_cache_max_ttl_ms")]
    pub max_ttl_ms: u64,
    /// Minimum confidence for cache reuse.
    #[serde(default = "default_cache_confidence")]
    pub confidence_threshold: f64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            default_ttl_ms: default_cache_ttl_ms(),
            max_ttl_ms: default_cache_max_ttl_ms(),
            confidence_threshold: default_cache_confidence(),
        }
    }
}

impl CacheSection {
    /// Converts the section into the runtime cache configuration.
    #[must_use]
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.max_entries,
            default_ttl_ms: self.default_ttl_ms,
            max_ttl_ms: self.max_ttl_ms,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

/// AI combination configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSection {
    /// Minimum AI confidence for a standalone AI verdict.
    #[serde(default = "default_ai_confidence")]
    pub confidence_threshold: f64,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            confidence_threshold: default_ai_confidence(),
        }
    }
}

/// Circuit breaker configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitSection {
    /// Consecutive failures required to open a circuit.
    #[serde(default = "default_circuit_failures")]
    pub failure_threshold: u32,
    /// Failure-counting window in milliseconds.
    #[serde(default = "default_circuit_window_ms")]
    pub window_ms: u64,
    /// Cooldown before a probe is admitted, in milliseconds.
    #[serde(default = "default_circuit_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for CircuitSection {
    fn default() -> Self {
        Self {
            failure_threshold: default_circuit_failures(),
            window_ms: default_circuit_window_ms(),
            cooldown_ms: default_circuit_cooldown_ms(),
        }
    }
}

impl CircuitSection {
    /// Converts the section into the runtime circuit configuration.
    #[must_use]
    pub const fn to_circuit_config(&self) -> CircuitConfig {
        CircuitConfig {
            failure_threshold: self.failure_threshold,
            window_ms: self.window_ms,
            cooldown_ms: self.cooldown_ms,
        }
    }
}

/// Batch judgment configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSection {
    /// Whether AI calls are batched.
    #[serde(default)]
    pub enabled: bool,
    /// Maximum queued items before a flush.
    #[serde(default = "default_batch_size")]
    pub max_size: usize,
    /// Maximum wait before a flush in milliseconds.
    #[serde(default = "default_batch_wait_ms")]
    pub max_wait_ms: u64,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: default_batch_size(),
            max_wait_ms: default_batch_wait_ms(),
        }
    }
}

impl BatchSection {
    /// Converts the section into the runtime batch configuration.
    #[must_use]
    pub fn to_batch_config(&self, item_timeout_ms: u64) -> BatchConfig {
        BatchConfig {
            max_size: self.max_size,
            max_wait_ms: self.max_wait_ms,
            item_timeout_ms,
        }
    }
}

/// Rate limiter configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSection {
    /// Default sliding window when a directive omits one, in milliseconds.
    #[serde(default = "default_rate_window_ms")]
    pub default_window_ms: u64,
    /// Maximum tracked `(agent, resource)` keys.
    #[serde(default = "default_rate_keys")]
    pub max_keys: usize,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            default_window_ms: default_rate_window_ms(),
            max_keys: default_rate_keys(),
        }
    }
}

/// Policy store configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesSection {
    /// Directory holding one JSON file per policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Identifier of the default policy.
    #[serde(default = "default_policy_id")]
    pub default_policy: PolicyId,
    /// Ceiling on policy text size in bytes.
    #[serde(default = "default_policy_text_bytes")]
    pub max_text_bytes: usize,
}

impl Default for PoliciesSection {
    fn default() -> Self {
        Self {
            dir: None,
            default_policy: default_policy_id(),
            max_text_bytes: default_policy_text_bytes(),
        }
    }
}

/// Audit sink configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSection {
    /// Sink selection.
    #[serde(default = "default_audit_sink")]
    pub sink: AuditSinkKind,
    /// Directory for dated audit files when the sink is `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            sink: default_audit_sink(),
            dir: None,
        }
    }
}

/// Diagnostic logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    /// Diagnostic verbosity gate.
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One agent directory entry feeding the agent-info enricher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEntry {
    /// Agent type label.
    pub agent_type: String,
    /// Clearance level.
    #[serde(default)]
    pub clearance_level: u8,
    /// Trust score in `[0, 1]`.
    pub trust_score: f64,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// One geo table entry mapping an address prefix to a country.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoEntry {
    /// Client address prefix, e.g. `10.1.`.
    pub prefix: String,
    /// ISO country code.
    pub country: String,
}

/// Security posture configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecuritySection {
    /// Countries that elevate the enriched threat level.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged_countries: Vec<String>,
    /// Process-level anonymization secret; a random per-process secret is
    /// generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymization_secret: Option<String>,
}

/// Notification channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifySection {
    /// Webhook URLs keyed by channel name.
    #[serde(default)]
    pub channels: BTreeMap<String, String>,
    /// Per-delivery timeout in milliseconds.
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            channels: BTreeMap::new(),
            timeout_ms: default_notify_timeout_ms(),
        }
    }
}

/// Business-hours window for the time-based enricher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursSection {
    /// Window start as normalized `HH:MM:SS`.
    #[serde(default = "default_hours_start")]
    pub start: String,
    /// Window end as normalized `HH:MM:SS`.
    #[serde(default = "default_hours_end")]
    pub end: String,
    /// Timezone label recorded into the environment.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for HoursSection {
    fn default() -> Self {
        Self {
            start: default_hours_start(),
            end: default_hours_end(),
            timezone: default_timezone(),
        }
    }
}

// ============================================================================
// SECTION: Root Configuration
// ============================================================================

/// Warden gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream server entries.
    #[serde(default, rename = "upstream")]
    pub upstreams: Vec<UpstreamConfig>,
    /// Judge adapter configuration.
    #[serde(default)]
    pub judge: JudgeConfig,
    /// Decision cache configuration.
    #[serde(default)]
    pub cache: CacheSection,
    /// AI combination configuration.
    #[serde(default)]
    pub ai: AiSection,
    /// Circuit breaker configuration.
    #[serde(default)]
    pub circuit_breaker: CircuitSection,
    /// Batch judgment configuration.
    #[serde(default)]
    pub batch: BatchSection,
    /// Rate limiter configuration.
    #[serde(default)]
    pub rate_limit: RateLimitSection,
    /// Policy store configuration.
    #[serde(default)]
    pub policies: PoliciesSection,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditSection,
    /// Diagnostic logging configuration.
    #[serde(default)]
    pub log: LogSection,
    /// Agent directory keyed by agent id.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentEntry>,
    /// Static geo table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geo: Vec<GeoEntry>,
    /// Business-hours window.
    #[serde(default)]
    pub hours: HoursSection,
    /// Security posture configuration.
    #[serde(default)]
    pub security: SecuritySection,
    /// Notification channels.
    #[serde(default)]
    pub notify: NotifySection,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file failed to parse.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config contents violate a documented bound.
    #[error("config invalid: {0}")]
    Invalid(String),
}

impl WardenConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, then `WARDEN_CONFIG`, then
    /// `warden.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path);
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Parse("config file is not utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section against documented bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstreams.len() > MAX_UPSTREAMS {
            return Err(ConfigError::Invalid("too many upstream servers".to_string()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for upstream in &self.upstreams {
            if upstream.name.as_str().is_empty() {
                return Err(ConfigError::Invalid("upstream name is empty".to_string()));
            }
            if upstream.name.as_str().contains("__") {
                return Err(ConfigError::Invalid(format!(
                    "upstream name {} contains the reserved separator",
                    upstream.name
                )));
            }
            if !seen.insert(upstream.name.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate upstream name: {}",
                    upstream.name
                )));
            }
            match (&upstream.command, &upstream.url) {
                (None, None) => {
                    return Err(ConfigError::Invalid(format!(
                        "upstream {} needs a command or a url",
                        upstream.name
                    )));
                }
                (Some(_), Some(_)) => {
                    return Err(ConfigError::Invalid(format!(
                        "upstream {} cannot have both a command and a url",
                        upstream.name
                    )));
                }
                _ => {}
            }
        }
        if self.judge.backend == JudgeBackend::Http && self.judge.url.is_none() {
            return Err(ConfigError::Invalid("http judge requires a url".to_string()));
        }
        if self.cache.max_entries < MIN_CACHE_ENTRIES || self.cache.max_entries > MAX_CACHE_ENTRIES
        {
            return Err(ConfigError::Invalid("cache max_entries out of bounds".to_string()));
        }
        if !(0.0..=1.0).contains(&self.cache.confidence_threshold) {
            return Err(ConfigError::Invalid(
                "cache confidence_threshold outside [0, 1]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ai.confidence_threshold) {
            return Err(ConfigError::Invalid("ai confidence_threshold outside [0, 1]".to_string()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit failure_threshold must be positive".to_string(),
            ));
        }
        if self.circuit_breaker.cooldown_ms < MIN_COOLDOWN_MS
            || self.circuit_breaker.cooldown_ms > MAX_COOLDOWN_MS
        {
            return Err(ConfigError::Invalid("circuit cooldown_ms out of bounds".to_string()));
        }
        if self.rate_limit.default_window_ms < MIN_RATE_WINDOW_MS
            || self.rate_limit.default_window_ms > MAX_RATE_WINDOW_MS
        {
            return Err(ConfigError::Invalid("rate default_window_ms out of bounds".to_string()));
        }
        if self.batch.enabled && self.batch.max_size == 0 {
            return Err(ConfigError::Invalid("batch max_size must be positive".to_string()));
        }
        if self.audit.sink == AuditSinkKind::File && self.audit.dir.is_none() {
            return Err(ConfigError::Invalid("file audit sink requires a dir".to_string()));
        }
        if self.agents.len() > MAX_AGENT_ENTRIES {
            return Err(ConfigError::Invalid("too many agent entries".to_string()));
        }
        for (id, entry) in &self.agents {
            if !(0.0..=1.0).contains(&entry.trust_score) {
                return Err(ConfigError::Invalid(format!(
                    "agent {id} trust_score outside [0, 1]"
                )));
            }
        }
        if self.geo.len() > MAX_GEO_ENTRIES {
            return Err(ConfigError::Invalid("too many geo entries".to_string()));
        }
        validate_hhmmss("hours.start", &self.hours.start)?;
        validate_hhmmss("hours.end", &self.hours.end)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the effective configuration path.
fn resolve_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    if let Ok(from_env) = env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(from_env);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

/// Validates a normalized `HH:MM:SS` string.
fn validate_hhmmss(key: &str, value: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = value.split(':').collect();
    let valid = parts.len() == 3
        && parts.iter().all(|part| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit()))
        && parts[0].parse::<u8>().is_ok_and(|h| h < 24)
        && parts[1].parse::<u8>().is_ok_and(|m| m < 60)
        && parts[2].parse::<u8>().is_ok_and(|s| s < 60);
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{key} is not a normalized HH:MM:SS time")))
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default transport.
const fn default_transport() -> GatewayTransport {
    GatewayTransport::Stdio
}

/// Default HTTP port.
const fn default_port() -> u16 {
    8787
}

/// Default HTTP host.
fn default_host() -> String {
    "127.0.0.1".to_string()
}

/// Default request body ceiling.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default per-session in-flight bound.
const fn default_session_inflight() -> usize {
    DEFAULT_SESSION_INFLIGHT
}

/// Default per-upstream in-flight bound.
const fn default_upstream_inflight() -> usize {
    DEFAULT_UPSTREAM_INFLIGHT
}

/// Default session idle window.
const fn default_session_idle_ms() -> u64 {
    DEFAULT_SESSION_IDLE_MS
}

/// Default readiness window for the initialize handshake.
const fn default_readiness_ms() -> u64 {
    10_000
}

/// Default per-request upstream timeout.
const fn default_upstream_timeout_ms() -> u64 {
    30_000
}

/// Default judge backend.
const fn default_judge_backend() -> JudgeBackend {
    JudgeBackend::None
}

/// Default judge timeout.
const fn default_judge_timeout_ms() -> u64 {
    10_000
}

/// Default judge retry attempts.
const fn default_judge_attempts() -> u32 {
    2
}

/// Default cache capacity.
const fn default_cache_entries() -> usize {
    10_000
}

/// Default cache base TTL.
const fn default_cache_ttl_ms() -> u64 {
    60_000
}

/// Default cache TTL ceiling.
const fn default_cache_max_ttl_ms() -> u64 {
    300_000
}

/// Default cache reuse confidence.
const fn default_cache_confidence() -> f64 {
    0.8
}

/// Default AI confidence threshold.
const fn default_ai_confidence() -> f64 {
    0.7
}

/// Default circuit failure threshold.
const fn default_circuit_failures() -> u32 {
    5
}

/// Default circuit window.
const fn default_circuit_window_ms() -> u64 {
    60_000
}

/// Default circuit cooldown.
const fn default_circuit_cooldown_ms() -> u64 {
    30_000
}

/// Default batch size.
const fn default_batch_size() -> usize {
    8
}

/// Default batch wait.
const fn default_batch_wait_ms() -> u64 {
    50
}

/// Default rate-limit window.
const fn default_rate_window_ms() -> u64 {
    60_000
}

/// Default tracked rate-limit keys.
const fn default_rate_keys() -> usize {
    65_536
}

/// Default policy identifier.
fn default_policy_id() -> PolicyId {
    PolicyId::new("default")
}

/// Default policy text ceiling.
const fn default_policy_text_bytes() -> usize {
    DEFAULT_POLICY_TEXT_BYTES
}

/// Default audit sink.
const fn default_audit_sink() -> AuditSinkKind {
    AuditSinkKind::Null
}

/// Default log level.
const fn default_log_level() -> LogLevel {
    LogLevel::Info
}

/// Default notification delivery timeout.
const fn default_notify_timeout_ms() -> u64 {
    5_000
}

/// Default business-hours start.
fn default_hours_start() -> String {
    "09:00:00".to_string()
}

/// Default business-hours end.
fn default_hours_end() -> String {
    "17:00:00".to_string()
}

/// Default timezone label.
fn default_timezone() -> String {
    "UTC".to_string()
}

// crates/warden-core/src/runtime/cache.rs
// ============================================================================
// Module: Warden Decision Cache
// Description: Sharded, bounded decision cache with TTL and LRU eviction.
// Purpose: Short-circuit repeated evaluations of equivalent requests.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The decision cache is keyed by a deterministic hash over the fields that
//! actually influence a decision: agent, action, resource, agent type, the
//! trust-score bucket, the minute-truncated admission time, and the policy
//! id. Context fields outside the key are folded into a fingerprint; a hit
//! whose fingerprint differs is invalidated rather than served. Shards
//! serialize writes independently, and capacity pressure evicts the
//! least-recently-used fifth of a shard in a single sweep.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;

use crate::core::AgentId;
use crate::core::DecisionContext;
use crate::core::DecisionEngine;
use crate::core::HashDigest;
use crate::core::Pattern;
use crate::core::PolicyDecision;
use crate::core::PolicyId;
use crate::core::ResourceUri;
use crate::core::Timestamp;
use crate::core::hashing::hash_cache_key;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Number of independent cache shards.
const SHARD_COUNT: usize = 16;

/// Fraction denominator evicted per sweep (one fifth).
const EVICTION_DIVISOR: usize = 5;

/// Decision cache configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum entries across all shards.
    pub max_entries: usize,
    /// Base TTL in milliseconds before confidence scaling.
    pub default_ttl_ms: u64,
    /// Upper bound on any derived TTL in milliseconds.
    pub max_ttl_ms: u64,
    /// Minimum confidence a cached decision needs to be reused.
    pub confidence_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            default_ttl_ms: 60_000,
            max_ttl_ms: 300_000,
            confidence_threshold: 0.8,
        }
    }
}

/// Volatility classification of the context behind a cached decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextVolatility {
    /// Context facets are stable; the TTL may stretch.
    Static,
    /// Context carries volatile signals; the TTL stays short.
    Volatile,
}

// ============================================================================
// SECTION: Cache Key
// ============================================================================

/// Deterministic cache key over the decision-relevant context fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheKey {
    /// Calling agent.
    pub agent: AgentId,
    /// Request action label.
    pub action: String,
    /// Request resource URI.
    pub resource: ResourceUri,
    /// Agent type label.
    pub agent_type: String,
    /// Trust score bucketed into tenths.
    pub trust_bucket: u8,
    /// Minute-truncated admission time.
    pub minute_bucket: i64,
    /// Selected policy identifier.
    pub policy_id: PolicyId,
}

impl CacheKey {
    /// Builds the key for a sealed context under the selected policy.
    #[must_use]
    pub fn from_context(context: &DecisionContext, policy_id: &PolicyId) -> Self {
        Self {
            agent: context.agent.clone(),
            action: context.action.as_str().to_string(),
            resource: context.resource.clone(),
            agent_type: context.agent_type.clone(),
            trust_bucket: context.trust_score_bucket(),
            minute_bucket: context.time.minute_bucket(),
            policy_id: policy_id.clone(),
        }
    }

    /// Returns the hashed map key for this cache key.
    #[must_use]
    fn hashed(&self) -> String {
        hash_cache_key(self)
    }

    /// Returns the readable descriptor used for pattern invalidation.
    #[must_use]
    fn descriptor(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.agent,
            self.action,
            self.resource,
            self.agent_type,
            self.trust_bucket,
            self.minute_bucket,
            self.policy_id
        )
    }
}

/// One cached decision with its bookkeeping.
struct CacheEntry {
    /// The cached decision as originally produced.
    decision: PolicyDecision,
    /// Insertion timestamp.
    inserted_at: Timestamp,
    /// Entry TTL in milliseconds.
    ttl_ms: u64,
    /// Hit counter.
    hits: u64,
    /// Fingerprint over context fields outside the key.
    fingerprint: HashDigest,
    /// Logical clock stamp for LRU ordering.
    last_used: u64,
    /// Readable descriptor for pattern invalidation.
    descriptor: String,
}

// ============================================================================
// SECTION: Decision Cache
// ============================================================================

/// Sharded decision cache.
pub struct DecisionCache {
    /// Cache configuration.
    config: CacheConfig,
    /// Independent shards keyed by hashed cache key.
    shards: Vec<Mutex<HashMap<String, CacheEntry>>>,
    /// Logical clock driving LRU ordering.
    clock: AtomicU64,
}

impl DecisionCache {
    /// Creates a cache with the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect();
        Self {
            config,
            shards,
            clock: AtomicU64::new(0),
        }
    }

    /// Looks up a decision; expired or mismatched entries are removed.
    ///
    /// A hit is only served when the stored confidence meets the reuse
    /// threshold. Served decisions report `engine = Cache`.
    #[must_use]
    pub fn lookup(
        &self,
        key: &CacheKey,
        fingerprint: &HashDigest,
        now: Timestamp,
    ) -> Option<PolicyDecision> {
        let hashed = key.hashed();
        let shard = self.shard_for(&hashed);
        let Ok(mut entries) = shard.lock() else {
            return None;
        };
        let entry = entries.get_mut(&hashed)?;
        let age = now.as_unix_millis().saturating_sub(entry.inserted_at.as_unix_millis());
        let expired = u64::try_from(age).map_or(true, |age| age > entry.ttl_ms);
        if expired || entry.fingerprint != *fingerprint {
            entries.remove(&hashed);
            return None;
        }
        if entry.decision.confidence < self.config.confidence_threshold {
            return None;
        }
        entry.hits = entry.hits.saturating_add(1);
        entry.last_used = self.tick();
        let mut decision = entry.decision.clone();
        decision.engine = DecisionEngine::Cache;
        Some(decision)
    }

    /// Inserts a decision, deriving the TTL from confidence and volatility.
    ///
    /// When the shard exceeds its capacity share, the least-recently-used
    /// fifth of the shard is evicted in one sweep.
    pub fn insert(
        &self,
        key: &CacheKey,
        fingerprint: HashDigest,
        decision: PolicyDecision,
        now: Timestamp,
        volatility: ContextVolatility,
    ) {
        let hashed = key.hashed();
        let descriptor = key.descriptor();
        let ttl_ms = self.derive_ttl(decision.confidence, volatility);
        let shard = self.shard_for(&hashed);
        let Ok(mut entries) = shard.lock() else {
            return;
        };
        entries.insert(hashed, CacheEntry {
            decision,
            inserted_at: now,
            ttl_ms,
            hits: 0,
            fingerprint,
            last_used: self.tick(),
            descriptor,
        });
        let shard_capacity = (self.config.max_entries / SHARD_COUNT).max(1);
        if entries.len() > shard_capacity {
            evict_lru(&mut entries);
        }
    }

    /// Removes entries whose readable descriptor matches the pattern.
    ///
    /// This scans every shard and is intended for administration, not the
    /// request path.
    pub fn invalidate_by_pattern(&self, pattern: &Pattern) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let Ok(mut entries) = shard.lock() else {
                continue;
            };
            let before = entries.len();
            entries.retain(|_, entry| !pattern.matches(&entry.descriptor));
            removed += before - entries.len();
        }
        removed
    }

    /// Returns the total number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().filter_map(|shard| shard.lock().ok().map(|s| s.len())).sum()
    }

    /// Returns true when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Derives an entry TTL from confidence and context volatility.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "TTL values are small positive milliseconds and convert exactly."
    )]
    fn derive_ttl(&self, confidence: f64, volatility: ContextVolatility) -> u64 {
        let base = self.config.default_ttl_ms;
        let scaled = (base as f64) * confidence.clamp(0.0, 1.0);
        let stretched = match volatility {
            ContextVolatility::Static => scaled * 2.0,
            ContextVolatility::Volatile => scaled,
        };
        let ttl = stretched.max(0.0) as u64;
        ttl.min(self.config.max_ttl_ms)
    }

    /// Advances the logical clock used for LRU ordering.
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the shard owning the hashed key.
    fn shard_for(&self, hashed: &str) -> &Mutex<HashMap<String, CacheEntry>> {
        let index = hashed.bytes().next().map_or(0, |byte| (byte as usize) % SHARD_COUNT);
        &self.shards[index]
    }
}

/// Evicts the least-recently-used fifth of a shard in one sweep.
fn evict_lru(entries: &mut HashMap<String, CacheEntry>) {
    let victims = (entries.len() / EVICTION_DIVISOR).max(1);
    let mut stamps: Vec<(u64, String)> =
        entries.iter().map(|(key, entry)| (entry.last_used, key.clone())).collect();
    stamps.sort_unstable();
    for (_, key) in stamps.into_iter().take(victims) {
        entries.remove(&key);
    }
}

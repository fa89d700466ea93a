// crates/warden-core/tests/decision_cache.rs
// ============================================================================
// Module: Decision Cache Tests
// Description: Tests for TTL expiry, fingerprints, eviction, and invalidation.
// ============================================================================
//! ## Overview
//! Validates cache hit semantics, fingerprint-based invalidation, bounded
//! capacity with LRU sweeps, and pattern invalidation.

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

mod common;

use common::context;
use warden_core::ActionKind;
use warden_core::CacheConfig;
use warden_core::CacheKey;
use warden_core::ContextVolatility;
use warden_core::Decision;
use warden_core::DecisionCache;
use warden_core::DecisionEngine;
use warden_core::Pattern;
use warden_core::PolicyDecision;
use warden_core::PolicyId;
use warden_core::Timestamp;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a permit decision with the given confidence.
fn permit(confidence: f64, at: Timestamp) -> PolicyDecision {
    PolicyDecision {
        decision: Decision::Permit,
        reason: "permitted".to_string(),
        confidence,
        constraints: Vec::new(),
        obligations: Vec::new(),
        engine: DecisionEngine::Rule,
        evaluated_at: at,
        policy_id: Some(PolicyId::new("p1")),
    }
}

/// Builds a small-capacity cache for eviction tests.
fn small_cache() -> DecisionCache {
    DecisionCache::new(CacheConfig {
        max_entries: 16,
        default_ttl_ms: 60_000,
        max_ttl_ms: 300_000,
        confidence_threshold: 0.8,
    })
}

// ============================================================================
// SECTION: Hits and Expiry
// ============================================================================

/// Tests that a fresh entry is served with the cache engine label.
#[test]
fn test_hit_reports_cache_engine() {
    let cache = small_cache();
    let ctx = context(ActionKind::Read, "file:///data/a.txt");
    let key = CacheKey::from_context(&ctx, &PolicyId::new("p1"));
    let fingerprint = ctx.fingerprint();
    cache.insert(&key, fingerprint.clone(), permit(0.9, ctx.time), ctx.time, ContextVolatility::Static);

    let hit = cache.lookup(&key, &fingerprint, ctx.time).unwrap();
    assert_eq!(hit.engine, DecisionEngine::Cache);
    assert_eq!(hit.decision, Decision::Permit);
    assert!((hit.confidence - 0.9).abs() < f64::EPSILON);
}

/// Tests TTL expiry.
#[test]
fn test_expired_entry_misses() {
    let cache = small_cache();
    let ctx = context(ActionKind::Read, "file:///data/a.txt");
    let key = CacheKey::from_context(&ctx, &PolicyId::new("p1"));
    let fingerprint = ctx.fingerprint();
    cache.insert(&key, fingerprint.clone(), permit(0.9, ctx.time), ctx.time, ContextVolatility::Volatile);

    // Volatile TTL is 60s * 0.9 = 54s; probe well past it.
    let later = Timestamp::from_unix_millis(ctx.time.as_unix_millis() + 120_000);
    assert!(cache.lookup(&key, &fingerprint, later).is_none());
}

/// Tests that a low-confidence entry is not reused.
#[test]
fn test_low_confidence_not_reused() {
    let cache = small_cache();
    let ctx = context(ActionKind::Read, "file:///data/a.txt");
    let key = CacheKey::from_context(&ctx, &PolicyId::new("p1"));
    let fingerprint = ctx.fingerprint();
    cache.insert(&key, fingerprint.clone(), permit(0.5, ctx.time), ctx.time, ContextVolatility::Static);

    assert!(cache.lookup(&key, &fingerprint, ctx.time).is_none());
}

/// Tests that a fingerprint mismatch invalidates the entry.
#[test]
fn test_fingerprint_mismatch_invalidates() {
    let cache = small_cache();
    let ctx = context(ActionKind::Read, "file:///data/a.txt");
    let key = CacheKey::from_context(&ctx, &PolicyId::new("p1"));
    cache.insert(&key, ctx.fingerprint(), permit(0.9, ctx.time), ctx.time, ContextVolatility::Static);

    let mut changed = ctx.clone();
    changed.purpose = Some("different intent".to_string());
    assert!(cache.lookup(&key, &changed.fingerprint(), ctx.time).is_none());
    // The mismatch also removed the stale entry.
    assert!(cache.lookup(&key, &ctx.fingerprint(), ctx.time).is_none());
}

// ============================================================================
// SECTION: Eviction and Invalidation
// ============================================================================

/// Tests that capacity pressure evicts rather than growing unbounded.
#[test]
fn test_capacity_bounded() {
    let cache = small_cache();
    let base = context(ActionKind::Read, "file:///data/a.txt");
    for index in 0..2_000 {
        let mut ctx = base.clone();
        ctx.resource = format!("file:///data/{index}.txt").into();
        let key = CacheKey::from_context(&ctx, &PolicyId::new("p1"));
        cache.insert(&key, ctx.fingerprint(), permit(0.9, ctx.time), ctx.time, ContextVolatility::Static);
    }
    // 16 shards with a per-shard share of one entry; eviction keeps each
    // shard near its share rather than at 2 000 entries.
    assert!(cache.len() < 64);
}

/// Tests pattern invalidation over readable descriptors.
#[test]
fn test_invalidate_by_pattern() {
    let cache = small_cache();
    let ctx = context(ActionKind::Read, "file:///data/a.txt");
    let key = CacheKey::from_context(&ctx, &PolicyId::new("p1"));
    cache.insert(&key, ctx.fingerprint(), permit(0.9, ctx.time), ctx.time, ContextVolatility::Static);
    assert_eq!(cache.len(), 1);

    let removed = cache.invalidate_by_pattern(&Pattern::new("*file:///data/*"));
    assert_eq!(removed, 1);
    assert!(cache.is_empty());
}

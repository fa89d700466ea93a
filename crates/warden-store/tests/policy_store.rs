// crates/warden-store/tests/policy_store.rs
// ============================================================================
// Module: Policy Store Tests
// Description: Tests for validation, versioning, soft delete, and persistence.
// ============================================================================
//! ## Overview
//! Validates store CRUD semantics, the required-section validation, semver
//! bumping with retained history, and the file-backed layout.

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

use warden_core::Applicability;
use warden_core::Policy;
use warden_core::PolicyFilter;
use warden_core::PolicyId;
use warden_core::PolicyStatus;
use warden_core::PolicyStore;
use warden_core::Timestamp;
use warden_store::FilePolicyStore;
use warden_store::InMemoryPolicyStore;
use warden_store::StoreLimits;
use warden_store::ensure_default_policy;
use warden_store::fresh_policy_id;

/// Builds a valid policy with the given id.
fn policy(id: &str) -> Policy {
    Policy {
        id: PolicyId::new(id),
        name: id.to_string(),
        priority: 1,
        status: PolicyStatus::Active,
        natural_language_text: format!("Intent: govern {id}. Rules: reads are permitted."),
        applicability: Applicability::any(),
        permissions: Vec::new(),
        prohibitions: Vec::new(),
        version: "0.1.0".to_string(),
        created_at: Timestamp::from_unix_millis(0),
        updated_at: Timestamp::from_unix_millis(0),
    }
}

/// Tests create, get, and duplicate rejection.
#[test]
fn test_create_and_get() {
    let store = InMemoryPolicyStore::new(StoreLimits::default());
    let id = store.create(policy("alpha")).unwrap();
    assert_eq!(store.get(&id).unwrap().name, "alpha");
    assert!(store.create(policy("alpha")).is_err());
}

/// Tests that text without the required sections is rejected.
#[test]
fn test_required_sections_enforced() {
    let store = InMemoryPolicyStore::new(StoreLimits::default());
    let mut bad = policy("bad");
    bad.natural_language_text = "free-form prose with no schema markers".to_string();
    assert!(store.create(bad).is_err());
}

/// Tests that the text ceiling is enforced.
#[test]
fn test_text_ceiling_enforced() {
    let store = InMemoryPolicyStore::new(StoreLimits {
        max_text_bytes: 64,
    });
    let mut long = policy("long");
    long.natural_language_text = format!("Intent: x. Rules: {}", "y".repeat(128));
    assert!(store.create(long).is_err());
}

/// Tests update versioning and immutable history.
#[test]
fn test_update_bumps_patch_and_retains_history() {
    let store = InMemoryPolicyStore::new(StoreLimits::default());
    let id = store.create(policy("alpha")).unwrap();
    let version = store
        .update(&id, "Intent: updated intent. Rules: writes are prohibited.".to_string())
        .unwrap();
    assert_eq!(version, "0.1.1");

    let history = store.history(&id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, "0.1.0");
    assert!(history[0].natural_language_text.contains("govern alpha"));

    let live = store.get(&id).unwrap();
    assert_eq!(live.version, "0.1.1");
    assert!(live.natural_language_text.contains("updated intent"));
}

/// Tests soft delete via deprecation.
#[test]
fn test_delete_is_soft() {
    let store = InMemoryPolicyStore::new(StoreLimits::default());
    let id = store.create(policy("alpha")).unwrap();
    store.delete(&id).unwrap();
    let live = store.get(&id).unwrap();
    assert_eq!(live.status, PolicyStatus::Deprecated);
    assert!(store.active_policies().unwrap().is_empty());
}

/// Tests list filtering and active ordering.
#[test]
fn test_list_and_active_ordering() {
    let store = InMemoryPolicyStore::new(StoreLimits::default());
    let mut high = policy("zeta");
    high.priority = 9;
    let mut tied = policy("alpha");
    tied.priority = 9;
    store.create(policy("low")).unwrap();
    store.create(high).unwrap();
    store.create(tied).unwrap();

    let active = store.active_policies().unwrap();
    assert_eq!(active[0].id.as_str(), "alpha");
    assert_eq!(active[1].id.as_str(), "zeta");
    assert_eq!(active[2].id.as_str(), "low");

    let filtered = store
        .list(&PolicyFilter {
            status: Some(PolicyStatus::Active),
            name_contains: Some("ze".to_string()),
        })
        .unwrap();
    assert_eq!(filtered.len(), 1);
}

/// Tests the file-backed layout and reload.
#[test]
fn test_file_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FilePolicyStore::open(dir.path(), StoreLimits::default()).unwrap();
        let id = store.create(policy("alpha")).unwrap();
        store
            .update(&id, "Intent: updated. Rules: still readable.".to_string())
            .unwrap();
    }
    assert!(dir.path().join("alpha.json").is_file());
    assert!(dir.path().join("history").join("alpha").join("0.1.0.json").is_file());

    let reopened = FilePolicyStore::open(dir.path(), StoreLimits::default()).unwrap();
    let live = reopened.get(&PolicyId::new("alpha")).unwrap();
    assert_eq!(live.version, "0.1.1");
}

/// Tests default-policy bootstrap and id slug generation.
#[test]
fn test_bootstrap_and_fresh_ids() {
    let store = InMemoryPolicyStore::new(StoreLimits::default());
    let id = PolicyId::new("default");
    ensure_default_policy(&store, &id).unwrap();
    ensure_default_policy(&store, &id).unwrap();
    let default = store.get(&id).unwrap();
    assert_eq!(default.status, PolicyStatus::Active);
    assert!(!default.permissions.is_empty());

    let first = fresh_policy_id(&store, "Data Guard");
    assert_eq!(first.as_str(), "data-guard");
    store.create(policy(first.as_str())).unwrap();
    let second = fresh_policy_id(&store, "Data Guard");
    assert_eq!(second.as_str(), "data-guard-2");
}

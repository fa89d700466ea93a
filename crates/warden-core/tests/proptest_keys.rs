// crates/warden-core/tests/proptest_keys.rs
// ============================================================================
// Module: Cache Key Property Tests
// Description: Property tests for key determinism and fingerprint coverage.
// ============================================================================
//! ## Overview
//! Properties: identical contexts hash to identical cache keys, and any
//! change to a purpose or environment entry changes the fingerprint.

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

use std::collections::BTreeMap;

use common::context;
use proptest::prelude::*;
use warden_core::ActionKind;
use warden_core::CacheKey;
use warden_core::PolicyId;

proptest! {
    /// Identical contexts always produce identical key serializations.
    #[test]
    fn prop_key_deterministic(agent in "[a-z]{1,12}", resource in "[a-z/:._-]{1,40}") {
        let mut first = context(ActionKind::Read, &resource);
        first.agent = agent.as_str().into();
        let second = first.clone();
        let policy = PolicyId::new("p1");
        prop_assert_eq!(
            CacheKey::from_context(&first, &policy),
            CacheKey::from_context(&second, &policy)
        );
        prop_assert_eq!(first.fingerprint(), second.fingerprint());
    }

    /// Changing the purpose always changes the fingerprint.
    #[test]
    fn prop_purpose_changes_fingerprint(purpose in "[a-z ]{1,32}") {
        let bare = context(ActionKind::Read, "file:///data/a.txt");
        let mut with_purpose = bare.clone();
        with_purpose.purpose = Some(purpose);
        prop_assert_ne!(bare.fingerprint(), with_purpose.fingerprint());
    }

    /// Changing an environment entry always changes the fingerprint.
    #[test]
    fn prop_environment_changes_fingerprint(value in "[a-z]{1,16}") {
        let bare = context(ActionKind::Read, "file:///data/a.txt");
        let mut enriched = bare.clone();
        let mut output = BTreeMap::new();
        output.insert("geoCountry".to_string(), serde_json::Value::String(value));
        enriched.environment.merge("security", output);
        prop_assert_ne!(bare.fingerprint(), enriched.fingerprint());
    }
}

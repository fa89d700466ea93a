// crates/warden-core/src/core/hashing.rs
// ============================================================================
// Module: Warden Digests
// Description: The canonical digests Warden derives from request state.
// Purpose: Produce cache keys, context fingerprints, and keyed anonymization tokens.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Every digest Warden computes is defined here: the cache-key hash that
//! addresses decisions, the context fingerprint that invalidates stale
//! cache hits, content hashes for audit integrity, and the keyed digest
//! behind deterministic anonymization. Structured inputs are canonicalized
//! with RFC 8785 (JCS) before hashing so equal values always produce equal
//! digests. Canonicalization failure never raises: a cache key degrades to
//! an unaddressable empty key and a fingerprint to the empty digest, both
//! of which fail closed at their use sites.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for Warden digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing (FIPS-friendly default).
    Sha256,
}

/// Default hash algorithm for Warden.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Deterministic content hash representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a new digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }

    /// Creates the empty digest used when canonicalization fails.
    ///
    /// The empty value never equals a real digest, so comparisons against
    /// it fail closed.
    #[must_use]
    pub const fn empty(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            value: String::new(),
        }
    }
}

// ============================================================================
// SECTION: Decision Digests
// ============================================================================

/// Hashes a cache key payload into its map-addressable string form.
///
/// The payload is the exact field set that influences a decision: agent,
/// action, resource, agent type, trust bucket, minute bucket, and policy
/// id. A payload that cannot canonicalize yields an empty string, which
/// the cache treats as a miss on lookup and an overwritable slot on
/// insert.
#[must_use]
pub fn hash_cache_key<T: Serialize + ?Sized>(key: &T) -> String {
    match canonical_bytes(key) {
        Some(bytes) => hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes).value,
        None => String::new(),
    }
}

/// Hashes the context fields outside the cache key into the fingerprint.
///
/// The fingerprint covers the caller's purpose and the full enricher
/// environment; a cached decision whose fingerprint differs from the live
/// context is invalidated rather than served. Canonicalization failure
/// yields the empty digest, which matches nothing.
#[must_use]
pub fn hash_fingerprint<T: Serialize + ?Sized>(payload: &T) -> HashDigest {
    match canonical_bytes(payload) {
        Some(bytes) => hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes),
        None => HashDigest::empty(DEFAULT_HASH_ALGORITHM),
    }
}

/// Hashes raw bytes, as for audit record integrity.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            HashDigest::new(HashAlgorithm::Sha256, &digest)
        }
    }
}

/// Hashes bytes under a process-level secret with domain separation.
///
/// This keys the anonymizer's deterministic hash and token transforms: the
/// same value under the same secret always produces the same token, while
/// the length prefixes keep distinct `(key, payload)` pairs from colliding
/// by concatenation.
#[must_use]
pub fn keyed_digest(algorithm: HashAlgorithm, key: &[u8], payload: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(u64::try_from(key.len()).unwrap_or(u64::MAX).to_be_bytes());
            hasher.update(key);
            hasher.update(u64::try_from(payload.len()).unwrap_or(u64::MAX).to_be_bytes());
            hasher.update(payload);
            let digest = hasher.finalize();
            HashDigest::new(HashAlgorithm::Sha256, &digest)
        }
    }
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Returns RFC 8785 canonical JSON bytes, or `None` when the value cannot
/// be canonicalized.
fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Option<Vec<u8>> {
    serde_jcs::to_vec(value).ok()
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
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

    use super::DEFAULT_HASH_ALGORITHM;
    use super::HashDigest;
    use super::hash_cache_key;
    use super::hash_fingerprint;
    use super::keyed_digest;

    /// Tests that key order does not change a cache key hash.
    #[test]
    fn test_cache_key_canonical() {
        let one = json!({"agent": "a", "action": "read", "minute": 42});
        let two = json!({"minute": 42, "action": "read", "agent": "a"});
        assert_eq!(hash_cache_key(&one), hash_cache_key(&two));
        assert!(!hash_cache_key(&one).is_empty());
    }

    /// Tests that fingerprints separate differing environments.
    #[test]
    fn test_fingerprint_separates_payloads() {
        let bare = hash_fingerprint(&json!({"purpose": null, "environment": {}}));
        let enriched =
            hash_fingerprint(&json!({"purpose": null, "environment": {"security.geoCountry": "US"}}));
        assert_ne!(bare, enriched);
        assert_ne!(bare, HashDigest::empty(DEFAULT_HASH_ALGORITHM));
    }

    /// Tests keyed-digest determinism and key separation.
    #[test]
    fn test_keyed_digest_separates_keys() {
        let first = keyed_digest(DEFAULT_HASH_ALGORITHM, b"secret-a", b"value");
        let again = keyed_digest(DEFAULT_HASH_ALGORITHM, b"secret-a", b"value");
        let other = keyed_digest(DEFAULT_HASH_ALGORITHM, b"secret-b", b"value");
        assert_eq!(first, again);
        assert_ne!(first, other);
    }
}

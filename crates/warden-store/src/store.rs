// crates/warden-store/src/store.rs
// ============================================================================
// Module: Warden Policy Store
// Description: In-memory and file-backed policy administration stores.
// Purpose: Persist policies with validation, versioning, and soft delete.
// Dependencies: warden-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The policy store is single-writer, many-reader: every mutation publishes
//! a fresh immutable `Arc<Policy>` snapshot, and superseded versions are
//! retained in history. The file-backed store keeps one JSON file per policy
//! with a sibling `history/` subdirectory and rebuilds its memory image at
//! open. Validation enforces non-empty text, a configured length ceiling,
//! and the sections the natural-language schema requires.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;

use warden_core::Applicability;
use warden_core::Pattern;
use warden_core::Policy;
use warden_core::PolicyFilter;
use warden_core::PolicyId;
use warden_core::PolicyRule;
use warden_core::PolicyStatus;
use warden_core::PolicyStore;
use warden_core::PolicyStoreError;
use warden_core::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Sections the natural-language policy schema requires, matched
/// case-insensitively as `<name>:` markers.
const REQUIRED_TEXT_SECTIONS: [&str; 2] = ["intent:", "rules:"];

/// Default ceiling on policy text size in bytes.
pub const DEFAULT_MAX_TEXT_BYTES: usize = 64 * 1024;

/// History subdirectory name for the file-backed store.
const HISTORY_DIR: &str = "history";

// ============================================================================
// SECTION: Limits and Validation
// ============================================================================

/// Store validation limits.
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    /// Ceiling on policy text size in bytes.
    pub max_text_bytes: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_text_bytes: DEFAULT_MAX_TEXT_BYTES,
        }
    }
}

/// Validates a policy against structural rules and store limits.
fn validate_policy(policy: &Policy, limits: StoreLimits) -> Result<(), PolicyStoreError> {
    policy.validate().map_err(|err| PolicyStoreError::Invalid(err.to_string()))?;
    if policy.natural_language_text.len() > limits.max_text_bytes {
        return Err(PolicyStoreError::Invalid("policy text exceeds size ceiling".to_string()));
    }
    let lowered = policy.natural_language_text.to_lowercase();
    for section in REQUIRED_TEXT_SECTIONS {
        if !lowered.contains(section) {
            return Err(PolicyStoreError::Invalid(format!(
                "policy text is missing the {section} section"
            )));
        }
    }
    Ok(())
}

/// Bumps the semver patch component of a version string.
fn bump_patch(version: &str) -> Result<String, PolicyStoreError> {
    let mut parts = version.splitn(3, '.');
    let major = parts.next().unwrap_or_default();
    let minor = parts.next().unwrap_or_default();
    let patch = parts.next().unwrap_or_default();
    let patch: u64 = patch
        .parse()
        .map_err(|_| PolicyStoreError::Invalid(format!("version {version} is not semver")))?;
    if major.parse::<u64>().is_err() || minor.parse::<u64>().is_err() {
        return Err(PolicyStoreError::Invalid(format!("version {version} is not semver")));
    }
    Ok(format!("{major}.{minor}.{}", patch + 1))
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory policy store publishing immutable snapshots.
pub struct InMemoryPolicyStore {
    /// Validation limits.
    limits: StoreLimits,
    /// Live policies keyed by id.
    policies: RwLock<BTreeMap<PolicyId, Arc<Policy>>>,
    /// Superseded versions keyed by id, oldest first.
    history: RwLock<BTreeMap<PolicyId, Vec<Arc<Policy>>>>,
}

impl InMemoryPolicyStore {
    /// Creates an empty store with the given limits.
    #[must_use]
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            limits,
            policies: RwLock::new(BTreeMap::new()),
            history: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the retained history for a policy, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError`] when the lock is poisoned.
    pub fn history(&self, id: &PolicyId) -> Result<Vec<Arc<Policy>>, PolicyStoreError> {
        let history = self
            .history
            .read()
            .map_err(|_| PolicyStoreError::Io("store lock poisoned".to_string()))?;
        Ok(history.get(id).cloned().unwrap_or_default())
    }

    /// Replaces a policy snapshot, recording the prior version in history.
    fn publish(
        &self,
        prior: Option<Arc<Policy>>,
        next: Policy,
    ) -> Result<Arc<Policy>, PolicyStoreError> {
        let snapshot = Arc::new(next);
        let mut policies = self
            .policies
            .write()
            .map_err(|_| PolicyStoreError::Io("store lock poisoned".to_string()))?;
        if let Some(prior) = prior {
            let mut history = self
                .history
                .write()
                .map_err(|_| PolicyStoreError::Io("store lock poisoned".to_string()))?;
            history.entry(prior.id.clone()).or_default().push(prior);
        }
        policies.insert(snapshot.id.clone(), Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn create(&self, policy: Policy) -> Result<PolicyId, PolicyStoreError> {
        validate_policy(&policy, self.limits)?;
        let id = policy.id.clone();
        {
            let policies = self
                .policies
                .read()
                .map_err(|_| PolicyStoreError::Io("store lock poisoned".to_string()))?;
            if policies.contains_key(&id) {
                return Err(PolicyStoreError::Invalid(format!("policy {id} already exists")));
            }
        }
        self.publish(None, policy)?;
        Ok(id)
    }

    fn update(&self, id: &PolicyId, text: String) -> Result<String, PolicyStoreError> {
        let prior = self.get(id)?;
        let mut next = (*prior).clone();
        next.natural_language_text = text;
        next.version = bump_patch(&prior.version)?;
        next.updated_at = Timestamp::now();
        validate_policy(&next, self.limits)?;
        let version = next.version.clone();
        self.publish(Some(prior), next)?;
        Ok(version)
    }

    fn delete(&self, id: &PolicyId) -> Result<(), PolicyStoreError> {
        let prior = self.get(id)?;
        let mut next = (*prior).clone();
        next.status = PolicyStatus::Deprecated;
        next.updated_at = Timestamp::now();
        self.publish(Some(prior), next)?;
        Ok(())
    }

    fn get(&self, id: &PolicyId) -> Result<Arc<Policy>, PolicyStoreError> {
        let policies = self
            .policies
            .read()
            .map_err(|_| PolicyStoreError::Io("store lock poisoned".to_string()))?;
        policies.get(id).cloned().ok_or_else(|| PolicyStoreError::NotFound(id.clone()))
    }

    fn list(&self, filter: &PolicyFilter) -> Result<Vec<Arc<Policy>>, PolicyStoreError> {
        let policies = self
            .policies
            .read()
            .map_err(|_| PolicyStoreError::Io("store lock poisoned".to_string()))?;
        let matches = policies
            .values()
            .filter(|policy| filter.status.is_none_or(|status| policy.status == status))
            .filter(|policy| {
                filter
                    .name_contains
                    .as_deref()
                    .is_none_or(|needle| policy.name.contains(needle))
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    fn active_policies(&self) -> Result<Vec<Arc<Policy>>, PolicyStoreError> {
        let mut active = self.list(&PolicyFilter {
            status: Some(PolicyStatus::Active),
            name_contains: None,
        })?;
        active.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(active)
    }
}

// ============================================================================
// SECTION: File-Backed Store
// ============================================================================

/// File-backed policy store: one JSON per policy plus a history directory.
pub struct FilePolicyStore {
    /// Store directory.
    dir: PathBuf,
    /// Memory image serving all reads.
    inner: InMemoryPolicyStore,
    /// Serializes filesystem mutations.
    write_lock: Mutex<()>,
}

impl FilePolicyStore {
    /// Opens the store, creating the layout and loading existing policies.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError`] when the directory cannot be prepared or
    /// an existing policy file is unreadable.
    pub fn open(dir: &Path, limits: StoreLimits) -> Result<Self, PolicyStoreError> {
        fs::create_dir_all(dir.join(HISTORY_DIR))
            .map_err(|err| PolicyStoreError::Io(err.to_string()))?;
        let inner = InMemoryPolicyStore::new(limits);
        let entries = fs::read_dir(dir).map_err(|err| PolicyStoreError::Io(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| PolicyStoreError::Io(err.to_string()))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let bytes =
                    fs::read(&path).map_err(|err| PolicyStoreError::Io(err.to_string()))?;
                let policy: Policy = serde_json::from_slice(&bytes).map_err(|err| {
                    PolicyStoreError::Corrupt(format!("{}: {err}", path.display()))
                })?;
                inner.create(policy)?;
            }
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            inner,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the retained history for a policy, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyStoreError`] when the memory image cannot be read.
    pub fn history(&self, id: &PolicyId) -> Result<Vec<Arc<Policy>>, PolicyStoreError> {
        self.inner.history(id)
    }

    /// Persists the live snapshot of a policy.
    fn persist(&self, policy: &Policy) -> Result<(), PolicyStoreError> {
        let path = self.dir.join(format!("{}.json", policy.id));
        let bytes = serde_json::to_vec_pretty(policy)
            .map_err(|err| PolicyStoreError::Io(err.to_string()))?;
        fs::write(path, bytes).map_err(|err| PolicyStoreError::Io(err.to_string()))
    }

    /// Archives a superseded version into the history directory.
    fn archive(&self, policy: &Policy) -> Result<(), PolicyStoreError> {
        let dir = self.dir.join(HISTORY_DIR).join(policy.id.as_str());
        fs::create_dir_all(&dir).map_err(|err| PolicyStoreError::Io(err.to_string()))?;
        let path = dir.join(format!("{}.json", policy.version));
        let bytes = serde_json::to_vec_pretty(policy)
            .map_err(|err| PolicyStoreError::Io(err.to_string()))?;
        fs::write(path, bytes).map_err(|err| PolicyStoreError::Io(err.to_string()))
    }
}

impl PolicyStore for FilePolicyStore {
    fn create(&self, policy: Policy) -> Result<PolicyId, PolicyStoreError> {
        let _guard =
            self.write_lock.lock().map_err(|_| PolicyStoreError::Io("writer lock".to_string()))?;
        let id = self.inner.create(policy)?;
        let snapshot = self.inner.get(&id)?;
        self.persist(&snapshot)?;
        Ok(id)
    }

    fn update(&self, id: &PolicyId, text: String) -> Result<String, PolicyStoreError> {
        let _guard =
            self.write_lock.lock().map_err(|_| PolicyStoreError::Io("writer lock".to_string()))?;
        let prior = self.inner.get(id)?;
        let version = self.inner.update(id, text)?;
        self.archive(&prior)?;
        let snapshot = self.inner.get(id)?;
        self.persist(&snapshot)?;
        Ok(version)
    }

    fn delete(&self, id: &PolicyId) -> Result<(), PolicyStoreError> {
        let _guard =
            self.write_lock.lock().map_err(|_| PolicyStoreError::Io("writer lock".to_string()))?;
        let prior = self.inner.get(id)?;
        self.inner.delete(id)?;
        self.archive(&prior)?;
        let snapshot = self.inner.get(id)?;
        self.persist(&snapshot)?;
        Ok(())
    }

    fn get(&self, id: &PolicyId) -> Result<Arc<Policy>, PolicyStoreError> {
        self.inner.get(id)
    }

    fn list(&self, filter: &PolicyFilter) -> Result<Vec<Arc<Policy>>, PolicyStoreError> {
        self.inner.list(filter)
    }

    fn active_policies(&self) -> Result<Vec<Arc<Policy>>, PolicyStoreError> {
        self.inner.active_policies()
    }
}

// ============================================================================
// SECTION: Bootstrap
// ============================================================================

/// Seeds the configured default policy when the store lacks one.
///
/// The bootstrap policy permits reads and listings and leaves everything
/// else to the AI layer, which denies without a configured backend.
///
/// # Errors
///
/// Returns [`PolicyStoreError`] when seeding fails.
pub fn ensure_default_policy(
    store: &dyn PolicyStore,
    id: &PolicyId,
) -> Result<(), PolicyStoreError> {
    match store.get(id) {
        Ok(_) => Ok(()),
        Err(PolicyStoreError::NotFound(_)) => {
            let now = Timestamp::now();
            store.create(Policy {
                id: id.clone(),
                name: "default".to_string(),
                priority: 0,
                status: PolicyStatus::Active,
                natural_language_text: "Intent: baseline gateway posture. Rules: read and list \
                                        operations are permitted; all other operations require \
                                        explicit policy."
                    .to_string(),
                applicability: Applicability::any(),
                permissions: vec![
                    PolicyRule {
                        action: Pattern::new("read"),
                        target: Pattern::new("*"),
                        constraint: None,
                        constraints: Vec::new(),
                        duties: Vec::new(),
                        priority: 0,
                    },
                    PolicyRule {
                        action: Pattern::new("list"),
                        target: Pattern::new("*"),
                        constraint: None,
                        constraints: Vec::new(),
                        duties: Vec::new(),
                        priority: 0,
                    },
                ],
                prohibitions: Vec::new(),
                version: "0.1.0".to_string(),
                created_at: now,
                updated_at: now,
            })?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Derives a fresh policy id from a display name.
///
/// The id is a lowercase slug of the name; a numeric suffix resolves
/// collisions against the store.
#[must_use]
pub fn fresh_policy_id(store: &dyn PolicyStore, name: &str) -> PolicyId {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    let base = if slug.is_empty() { "policy".to_string() } else { slug };
    let candidate = PolicyId::new(base.clone());
    if store.get(&candidate).is_err() {
        return candidate;
    }
    let mut counter = 2;
    loop {
        let candidate = PolicyId::new(format!("{base}-{counter}"));
        if store.get(&candidate).is_err() {
            return candidate;
        }
        counter += 1;
    }
}

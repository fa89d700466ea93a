// crates/warden-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Fixtures
// Description: In-memory store, scripted judge, and context builders.
// Purpose: Share fixtures across core integration tests.
// Dependencies: warden-core
// ============================================================================

//! ## Overview
//! Fixtures for exercising the decision pipeline without the real store or
//! judge crates: an in-memory policy store, a judge that replays a scripted
//! judgment, and builders for contexts and policies.

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
    dead_code,
    reason = "Test-only fixtures; not every test uses every helper."
)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use warden_core::ActionKind;
use warden_core::AgentId;
use warden_core::Applicability;
use warden_core::DecisionContext;
use warden_core::Judge;
use warden_core::JudgeError;
use warden_core::Judgment;
use warden_core::Policy;
use warden_core::PolicyFilter;
use warden_core::PolicyId;
use warden_core::PolicyStatus;
use warden_core::PolicyStore;
use warden_core::PolicyStoreError;
use warden_core::ResourceUri;
use warden_core::SessionId;
use warden_core::Timestamp;

/// In-memory policy store fixture.
pub struct FixtureStore {
    /// Stored policies.
    policies: Mutex<Vec<Arc<Policy>>>,
    /// When set, every read fails to exercise fail-safe paths.
    pub fail_reads: Mutex<bool>,
}

impl FixtureStore {
    /// Creates a store seeded with the given policies.
    pub fn with_policies(policies: Vec<Policy>) -> Self {
        Self {
            policies: Mutex::new(policies.into_iter().map(Arc::new).collect()),
            fail_reads: Mutex::new(false),
        }
    }

    /// Makes every subsequent read fail.
    pub fn break_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    /// Returns an error when reads are broken.
    fn check(&self) -> Result<(), PolicyStoreError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(PolicyStoreError::Io("injected fault".to_string()));
        }
        Ok(())
    }
}

impl PolicyStore for FixtureStore {
    fn create(&self, policy: Policy) -> Result<PolicyId, PolicyStoreError> {
        let id = policy.id.clone();
        self.policies.lock().unwrap().push(Arc::new(policy));
        Ok(id)
    }

    fn update(&self, _id: &PolicyId, _text: String) -> Result<String, PolicyStoreError> {
        Err(PolicyStoreError::Invalid("fixture store does not update".to_string()))
    }

    fn delete(&self, _id: &PolicyId) -> Result<(), PolicyStoreError> {
        Ok(())
    }

    fn get(&self, id: &PolicyId) -> Result<Arc<Policy>, PolicyStoreError> {
        self.check()?;
        self.policies
            .lock()
            .unwrap()
            .iter()
            .find(|policy| policy.id == *id)
            .cloned()
            .ok_or_else(|| PolicyStoreError::NotFound(id.clone()))
    }

    fn list(&self, _filter: &PolicyFilter) -> Result<Vec<Arc<Policy>>, PolicyStoreError> {
        self.check()?;
        Ok(self.policies.lock().unwrap().clone())
    }

    fn active_policies(&self) -> Result<Vec<Arc<Policy>>, PolicyStoreError> {
        self.check()?;
        let mut active: Vec<Arc<Policy>> = self
            .policies
            .lock()
            .unwrap()
            .iter()
            .filter(|policy| policy.status == PolicyStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(active)
    }
}

/// Judge fixture replaying a scripted result and counting calls.
pub struct ScriptedJudge {
    /// Scripted judgment or error produced on every call.
    script: Mutex<Result<Judgment, String>>,
    /// Number of calls observed.
    pub calls: Mutex<u32>,
}

impl ScriptedJudge {
    /// Creates a judge that always answers with the judgment.
    pub fn answering(judgment: Judgment) -> Self {
        Self {
            script: Mutex::new(Ok(judgment)),
            calls: Mutex::new(0),
        }
    }

    /// Creates a judge that always fails.
    pub fn failing(message: &str) -> Self {
        Self {
            script: Mutex::new(Err(message.to_string())),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn judge(
        &self,
        _context: &DecisionContext,
        _policy_text: &str,
    ) -> Result<Judgment, JudgeError> {
        *self.calls.lock().unwrap() += 1;
        match &*self.script.lock().unwrap() {
            Ok(judgment) => Ok(judgment.clone()),
            Err(message) => Err(JudgeError::Backend(message.clone())),
        }
    }
}

/// Builds a minimal active policy with the given id and priority.
pub fn policy(id: &str, priority: i64) -> Policy {
    Policy {
        id: PolicyId::new(id),
        name: id.to_string(),
        priority,
        status: PolicyStatus::Active,
        natural_language_text: format!("Intent: test policy {id}. Rules: none."),
        applicability: Applicability::any(),
        permissions: Vec::new(),
        prohibitions: Vec::new(),
        version: "0.1.0".to_string(),
        created_at: Timestamp::from_unix_millis(0),
        updated_at: Timestamp::from_unix_millis(0),
    }
}

/// Builds a sealed-looking context for the given action and resource.
pub fn context(action: ActionKind, resource: &str) -> DecisionContext {
    DecisionContext::new(
        AgentId::new("agent-1"),
        action,
        ResourceUri::new(resource),
        None,
        Timestamp::from_unix_millis(1_700_000_000_000),
        SessionId::new("session-1"),
    )
}

// crates/warden-gateway/src/session.rs
// ============================================================================
// Module: Gateway Sessions
// Description: Session tracking with idle eviction and in-flight bounds.
// Purpose: Identify callers across frames and bound their concurrency.
// Dependencies: warden-core, tokio
// ============================================================================

//! ## Overview
//! Each session tracks its headers, open and last-seen times, and an
//! in-flight semaphore. Entries idle past the configured window are
//! discarded on every admission, so the map stays bounded without a
//! background sweeper. Exceeding the in-flight bound is a backpressure
//! rejection, never an unbounded queue.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use rand::Rng;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use warden_core::SessionId;
use warden_core::Timestamp;

// ============================================================================
// SECTION: Session State
// ============================================================================

/// State for one live session.
pub struct SessionEntry {
    /// Headers captured at the last admission.
    pub headers: BTreeMap<String, String>,
    /// Session open time.
    pub opened_at: Timestamp,
    /// Most recent admission time.
    pub last_seen_at: Timestamp,
    /// In-flight bound for the session.
    inflight: Arc<Semaphore>,
}

impl SessionEntry {
    /// Tries to admit one request within the in-flight bound.
    pub fn try_admit(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.inflight).try_acquire_owned().ok()
    }
}

/// Session store configuration.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Idle window before a session is discarded, in milliseconds.
    pub idle_ms: u64,
    /// Maximum in-flight requests per session.
    pub max_inflight: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ms: 1_800_000,
            max_inflight: 32,
        }
    }
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// Store of live sessions.
pub struct SessionStore {
    /// Store configuration.
    config: SessionConfig,
    /// Live sessions keyed by id.
    sessions: Mutex<HashMap<SessionId, Arc<SessionEntry>>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Admits a frame for the session, creating or refreshing its entry.
    ///
    /// Idle entries are evicted on every admission.
    pub fn touch(
        &self,
        id: &SessionId,
        headers: BTreeMap<String, String>,
        now: Timestamp,
    ) -> Arc<SessionEntry> {
        let Ok(mut sessions) = self.sessions.lock() else {
            // Serve the request with a detached entry rather than refusing.
            return Arc::new(SessionEntry {
                headers,
                opened_at: now,
                last_seen_at: now,
                inflight: Arc::new(Semaphore::new(self.config.max_inflight)),
            });
        };
        let idle = i64::try_from(self.config.idle_ms).unwrap_or(i64::MAX);
        sessions.retain(|_, entry| {
            now.as_unix_millis().saturating_sub(entry.last_seen_at.as_unix_millis()) <= idle
        });
        let entry = sessions.entry(id.clone()).or_insert_with(|| {
            Arc::new(SessionEntry {
                headers: headers.clone(),
                opened_at: now,
                last_seen_at: now,
                inflight: Arc::new(Semaphore::new(self.config.max_inflight)),
            })
        });
        let refreshed = Arc::new(SessionEntry {
            headers,
            opened_at: entry.opened_at,
            last_seen_at: now,
            inflight: Arc::clone(&entry.inflight),
        });
        *entry = Arc::clone(&refreshed);
        refreshed
    }

    /// Removes a session, as on an explicit DELETE.
    pub fn remove(&self, id: &SessionId) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.remove(id);
        }
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }

    /// Returns true when no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generates a fresh random session id.
#[must_use]
pub fn generate_session_id() -> SessionId {
    SessionId::new(random_hex("sess"))
}

/// Generates a fresh random correlation id.
#[must_use]
pub fn generate_correlation_id() -> String {
    random_hex("req")
}

/// Renders a prefixed random 64-bit hex token.
fn random_hex(prefix: &str) -> String {
    let token: u64 = rand::thread_rng().r#gen();
    format!("{prefix}-{token:016x}")
}

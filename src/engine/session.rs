// ==========================================
// Composite MES - Optimization session store
// ==========================================
// Holds unconfirmed optimizer output between proposal and confirmation.
// An explicit handle with a bounded TTL and eviction, passed by Arc to
// whoever needs it: proposal lifetime is not tied to process uptime and
// the store is testable without shared global state.
// ==========================================

use crate::engine::optimizer::BatchProposal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

// ==========================================
// OptimizationSession
// ==========================================
// One optimizer run: one or more proposed loads the operator can confirm
// or reject individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationSession {
    pub session_id: String,
    pub proposals: Vec<BatchProposal>,
    pub created_at: DateTime<Utc>,
}

impl OptimizationSession {
    pub fn proposal(&self, proposal_id: &str) -> Option<&BatchProposal> {
        self.proposals.iter().find(|p| p.proposal_id == proposal_id)
    }
}

struct StoredSession {
    session: OptimizationSession,
    stored_at: Instant,
}

// ==========================================
// ProposalStore
// ==========================================

pub struct ProposalStore {
    ttl: Duration,
    inner: Mutex<HashMap<String, StoredSession>>,
}

impl ProposalStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredSession>> {
        // A poisoned store only means a panic mid-insert; the map itself
        // stays usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store one optimizer run and hand back its session token.
    pub fn insert(&self, proposals: Vec<BatchProposal>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = OptimizationSession {
            session_id: session_id.clone(),
            proposals,
            created_at: Utc::now(),
        };
        let mut map = self.lock();
        // Opportunistic sweep so abandoned sessions do not accumulate.
        map.retain(|_, s| s.stored_at.elapsed() < self.ttl);
        map.insert(
            session_id.clone(),
            StoredSession {
                session,
                stored_at: Instant::now(),
            },
        );
        session_id
    }

    pub fn get(&self, session_id: &str) -> Option<OptimizationSession> {
        let map = self.lock();
        map.get(session_id)
            .filter(|s| s.stored_at.elapsed() < self.ttl)
            .map(|s| s.session.clone())
    }

    /// Remove and return: confirmation consumes the session so a second
    /// confirm of the same token cannot double-create loads.
    pub fn take(&self, session_id: &str) -> Option<OptimizationSession> {
        let mut map = self.lock();
        let stored = map.remove(session_id)?;
        if stored.stored_at.elapsed() < self.ttl {
            Some(stored.session)
        } else {
            None
        }
    }

    pub fn evict_expired(&self) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, s| s.stored_at.elapsed() < self.ttl);
        before - map.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal_stub() -> BatchProposal {
        BatchProposal {
            proposal_id: Uuid::new_v4().to_string(),
            autoclave_code: "AC1".to_string(),
            curing_cycle_code: "C180".to_string(),
            placements: Vec::new(),
            unplaced: Vec::new(),
            utilization_pct: 0.0,
            utilization_target_pct: 85.0,
            total_area_mm2: 0.0,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_get_take() {
        let store = ProposalStore::new(Duration::from_secs(60));
        let id = store.insert(vec![proposal_stub()]);
        assert!(store.get(&id).is_some());
        assert!(store.take(&id).is_some());
        // Consumed: a second take finds nothing.
        assert!(store.take(&id).is_none());
    }

    #[test]
    fn test_ttl_eviction() {
        let store = ProposalStore::new(Duration::from_millis(10));
        let id = store.insert(vec![proposal_stub()]);
        std::thread::sleep(Duration::from_millis(25));
        assert!(store.get(&id).is_none());
        assert_eq!(store.evict_expired(), 1);
        assert!(store.is_empty());
    }
}

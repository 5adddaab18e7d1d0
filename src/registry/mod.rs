//! In-memory session registry.
//!
//! The only mutable shared state in the system. Holds short-lived
//! [`DocumentationSession`] records keyed by id, enforces one active session
//! per (caller, repository) pair, and rejects a second concurrent operation
//! on the same session. Intentionally non-durable: a process restart just
//! forces callers to start a new session.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::DocumentationSession;

struct Inner {
    sessions: HashMap<Uuid, DocumentationSession>,
    /// Sessions with an operation in flight.
    busy: HashSet<Uuid>,
}

pub struct SessionRegistry {
    inner: Arc<Mutex<Inner>>,
    idle: Duration,
}

impl SessionRegistry {
    pub fn new(idle: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sessions: HashMap::new(),
                busy: HashSet::new(),
            })),
            idle,
        }
    }

    /// Register a new session. Fails with `SessionConflict` while an
    /// unexpired session exists for the same (caller, repository) pair.
    pub fn start(&self, session: DocumentationSession) -> Result<()> {
        let mut inner = self.lock();
        Self::sweep_expired(&mut inner, self.idle);

        if inner.sessions.values().any(|s| {
            s.caller_id == session.caller_id && s.context.root_path == session.context.root_path
        }) {
            return Err(EngineError::SessionConflict {
                caller: session.caller_id,
                repo: session.context.root_path,
            });
        }
        inner.sessions.insert(session.id, session);
        Ok(())
    }

    /// Fetch a session, expiring it lazily when idle too long.
    pub fn get(&self, id: Uuid) -> Result<DocumentationSession> {
        let mut inner = self.lock();
        let expired = match inner.sessions.get(&id) {
            Some(s) => Utc::now() - s.last_touched_at > chrono::Duration::from_std(self.idle).expect("idle fits chrono"),
            None => return Err(EngineError::SessionNotFound(id)),
        };
        if expired {
            inner.sessions.remove(&id);
            inner.busy.remove(&id);
            return Err(EngineError::SessionNotFound(id));
        }
        Ok(inner.sessions.get(&id).expect("checked above").clone())
    }

    /// Apply a mutation to a session and stamp `last_touched_at`.
    pub fn update(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut DocumentationSession),
    ) -> Result<DocumentationSession> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or(EngineError::SessionNotFound(id))?;
        apply(session);
        session.last_touched_at = Utc::now();
        Ok(session.clone())
    }

    pub fn touch(&self, id: Uuid) -> Result<()> {
        self.update(id, |_| {}).map(|_| ())
    }

    /// Tear a session down, releasing the (caller, repository) lock.
    pub fn end(&self, id: Uuid) -> Result<()> {
        let mut inner = self.lock();
        if inner.busy.contains(&id) {
            return Err(EngineError::SessionBusy(id));
        }
        inner
            .sessions
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::SessionNotFound(id))
    }

    /// Mark a session busy for the duration of one operation. The returned
    /// guard clears the flag on drop, success or failure alike.
    pub fn begin_op(&self, id: Uuid) -> Result<OpGuard> {
        let mut inner = self.lock();
        if !inner.sessions.contains_key(&id) {
            return Err(EngineError::SessionNotFound(id));
        }
        if !inner.busy.insert(id) {
            return Err(EngineError::SessionBusy(id));
        }
        Ok(OpGuard {
            inner: Arc::clone(&self.inner),
            id,
        })
    }

    /// Whether an unexpired session exists for the pair. Test observer.
    pub fn has_active(&self, caller_id: &str, root: &Path) -> bool {
        let mut inner = self.lock();
        Self::sweep_expired(&mut inner, self.idle);
        inner
            .sessions
            .values()
            .any(|s| s.caller_id == caller_id && s.context.root_path == root)
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired session. Correctness only needs the lazy check in
    /// `get`; this keeps the map from accumulating abandoned entries.
    fn sweep_expired(inner: &mut Inner, idle: Duration) {
        let cutoff = Utc::now() - chrono::Duration::from_std(idle).expect("idle fits chrono");
        let expired: Vec<Uuid> = inner
            .sessions
            .iter()
            .filter(|(id, s)| s.last_touched_at < cutoff && !inner.busy.contains(id))
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            inner.sessions.remove(&id);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("registry lock poisoned")
    }
}

impl Clone for SessionRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            idle: self.idle,
        }
    }
}

/// RAII marker for an operation in flight on one session.
pub struct OpGuard {
    inner: Arc<Mutex<Inner>>,
    id: Uuid,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.busy.remove(&self.id);
        }
    }
}

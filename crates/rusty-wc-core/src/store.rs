//! Authoritative collection of settled sessions, keyed by topic.
//!
//! The store is the only owner of session records. Readers get clones and
//! every mutation goes through `upsert` / `update_*` / `remove`, each of
//! which writes through to persistence before touching memory. A failed
//! write leaves the in-memory view unchanged.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{Session, SessionNamespaces, TimestampMs};
use crate::ports::{PortError, SessionPersistencePort};

#[derive(Debug)]
pub struct SessionStore<S>
where
    S: SessionPersistencePort,
{
    persistence: S,
    sessions: BTreeMap<String, Session>,
}

/// What happened while rehydrating the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub unparseable: usize,
    pub expired: usize,
}

impl<S> SessionStore<S>
where
    S: SessionPersistencePort,
{
    /// Loads persisted sessions. Entries that fail to parse and sessions
    /// already expired at `now` are treated as absent.
    pub fn open(persistence: S, now: TimestampMs) -> Result<(Self, LoadReport), PortError> {
        let raw = persistence.load_sessions()?;
        let mut report = LoadReport::default();
        let mut sessions = BTreeMap::new();
        for (idx, entry) in raw.into_iter().enumerate() {
            match serde_json::from_value::<Session>(entry) {
                Ok(session) if session.is_expired(now) => {
                    debug!(topic = %session.topic, "dropping expired session at load");
                    report.expired += 1;
                }
                Ok(session) => {
                    sessions.insert(session.topic.clone(), session);
                }
                Err(e) => {
                    warn!(index = idx, error = %e, "dropping unparseable persisted session");
                    report.unparseable += 1;
                }
            }
        }
        report.loaded = sessions.len();

        let store = Self {
            persistence,
            sessions,
        };
        if report.unparseable > 0 || report.expired > 0 {
            if let Err(e) = store.persist() {
                warn!(error = %e, "failed to rewrite session store after cleanup");
            }
        }
        Ok((store, report))
    }

    pub fn get(&self, topic: &str) -> Option<Session> {
        self.sessions.get(topic).cloned()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.sessions.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.values().cloned().collect()
    }

    pub fn persistence(&self) -> &S {
        &self.persistence
    }

    pub fn upsert(&mut self, session: Session) -> Result<(), PortError> {
        let mut next = self.sessions.clone();
        next.insert(session.topic.clone(), session);
        self.commit(next)
    }

    /// Returns `false` when the topic is unknown; nothing is written then.
    pub fn update_namespaces(
        &mut self,
        topic: &str,
        namespaces: SessionNamespaces,
    ) -> Result<bool, PortError> {
        let mut next = self.sessions.clone();
        let Some(session) = next.get_mut(topic) else {
            return Ok(false);
        };
        session.namespaces = namespaces;
        self.commit(next)?;
        Ok(true)
    }

    pub fn update_expiry(&mut self, topic: &str, expires_at_ms: TimestampMs) -> Result<bool, PortError> {
        let mut next = self.sessions.clone();
        let Some(session) = next.get_mut(topic) else {
            return Ok(false);
        };
        session.expires_at_ms = expires_at_ms;
        self.commit(next)?;
        Ok(true)
    }

    /// Idempotent: removing an unknown topic is `Ok(None)`.
    pub fn remove(&mut self, topic: &str) -> Result<Option<Session>, PortError> {
        let mut next = self.sessions.clone();
        let removed = next.remove(topic);
        if removed.is_some() {
            self.commit(next)?;
        }
        Ok(removed)
    }

    pub fn prune_expired(&mut self, now: TimestampMs) -> Result<Vec<String>, PortError> {
        let mut next = self.sessions.clone();
        let mut expired = Vec::new();
        next.retain(|topic, s| {
            let keep = !s.is_expired(now);
            if !keep {
                expired.push(topic.clone());
            }
            keep
        });
        if !expired.is_empty() {
            self.commit(next)?;
        }
        Ok(expired)
    }

    /// Memory only changes once the new snapshot is on disk.
    fn commit(&mut self, next: BTreeMap<String, Session>) -> Result<(), PortError> {
        let snapshot: Vec<Session> = next.values().cloned().collect();
        self.persistence.save_sessions(&snapshot)?;
        self.sessions = next;
        Ok(())
    }

    fn persist(&self) -> Result<(), PortError> {
        let snapshot: Vec<Session> = self.sessions.values().cloned().collect();
        self.persistence.save_sessions(&snapshot)
    }
}

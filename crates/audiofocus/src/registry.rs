//! Session Registry
//!
//! Trait and in-memory implementation for the table of live sessions.
//!
//! The registry is not synchronized itself: the arbitrator owns it behind the
//! focus lock, so every method takes `&self`/`&mut self` directly.

use std::collections::BTreeMap;

use crate::error::{FocusError, Result};
use crate::session::{SessionId, StreamSession};
use crate::state::SessionState;

/// Statistics about registered sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total number of sessions.
    pub total: usize,
    /// Sessions currently producing or consuming audio.
    pub running: usize,
    /// Sessions paused by their client or by the arbitrator.
    pub paused: usize,
    /// Running sessions at a reduced volume.
    pub ducked: usize,
}

/// Registry trait for pluggable session storage.
pub trait SessionRegistry: Send {
    /// Allocate the next id. Ids are never handed out twice.
    fn allocate_id(&mut self) -> SessionId;

    /// Register a session under its id.
    fn insert(&mut self, session: StreamSession) -> Result<()>;

    fn get(&self, id: SessionId) -> Option<&StreamSession>;

    fn get_mut(&mut self, id: SessionId) -> Option<&mut StreamSession>;

    /// Deregister a session, returning it if it was present.
    fn remove(&mut self, id: SessionId) -> Option<StreamSession>;

    /// All sessions in creation order.
    fn iter(&self) -> Box<dyn Iterator<Item = &StreamSession> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: SessionId) -> bool {
        self.get(id).is_some()
    }

    fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for session in self.iter() {
            stats.total += 1;
            match session.state() {
                SessionState::Running => {
                    stats.running += 1;
                    if session.is_ducked() {
                        stats.ducked += 1;
                    }
                }
                SessionState::Paused => stats.paused += 1,
                _ => {}
            }
        }
        stats
    }
}

/// In-memory registry keyed by id, so iteration follows creation order.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    sessions: BTreeMap<SessionId, StreamSession>,
    next_id: u64,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry boxed for handing to the arbitrator.
    pub fn boxed() -> Box<dyn SessionRegistry> {
        Box::new(Self::new())
    }
}

impl SessionRegistry for InMemoryRegistry {
    fn allocate_id(&mut self) -> SessionId {
        self.next_id += 1;
        SessionId(self.next_id)
    }

    fn insert(&mut self, session: StreamSession) -> Result<()> {
        if self.sessions.contains_key(&session.id) {
            return Err(FocusError::IllegalArgument(format!(
                "session {} is already registered",
                session.id
            )));
        }
        self.sessions.insert(session.id, session);
        Ok(())
    }

    fn get(&self, id: SessionId) -> Option<&StreamSession> {
        self.sessions.get(&id)
    }

    fn get_mut(&mut self, id: SessionId) -> Option<&mut StreamSession> {
        self.sessions.get_mut(&id)
    }

    fn remove(&mut self, id: SessionId) -> Option<StreamSession> {
        self.sessions.remove(&id)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &StreamSession> + '_> {
        Box::new(self.sessions.values())
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionSpec;
    use crate::state::ClientOp;
    use crate::types::{ContentType, InterruptMode, SessionIntent, StreamUsage};

    fn new_session(registry: &mut InMemoryRegistry) -> SessionId {
        let id = registry.allocate_id();
        let spec =
            SessionSpec::renderer(SessionIntent::new(ContentType::Music, StreamUsage::Media));
        registry
            .insert(StreamSession::new(id, spec, InterruptMode::Share))
            .unwrap();
        id
    }

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut registry = InMemoryRegistry::new();
        let a = new_session(&mut registry);
        let b = new_session(&mut registry);
        assert!(b > a);

        registry.remove(b);
        let c = new_session(&mut registry);
        assert!(c > b);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut registry = InMemoryRegistry::new();
        let id = new_session(&mut registry);
        let spec =
            SessionSpec::renderer(SessionIntent::new(ContentType::Speech, StreamUsage::Media));
        let err = registry
            .insert(StreamSession::new(id, spec, InterruptMode::Share))
            .unwrap_err();
        assert!(matches!(err, FocusError::IllegalArgument(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_iter_in_creation_order() {
        let mut registry = InMemoryRegistry::new();
        let ids: Vec<_> = (0..4).map(|_| new_session(&mut registry)).collect();
        let seen: Vec<_> = registry.iter().map(|s| s.id).collect();
        assert_eq!(seen, ids);
    }

    #[test]
    fn test_stats() {
        let mut registry = InMemoryRegistry::new();
        let a = new_session(&mut registry);
        let b = new_session(&mut registry);
        new_session(&mut registry);

        registry.get_mut(a).unwrap().apply_client(ClientOp::Start).unwrap();
        let running_b = registry.get_mut(b).unwrap();
        running_b.apply_client(ClientOp::Start).unwrap();
        running_b.apply_client(ClientOp::Pause).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.running, 1);
        assert_eq!(stats.paused, 1);
        assert_eq!(stats.ducked, 0);
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut registry = InMemoryRegistry::new();
        assert!(registry.remove(SessionId(42)).is_none());
        assert!(registry.is_empty());
    }
}

//! Session table
//!
//! Maps camera identity to its live session. At most one session exists per
//! camera; inserting for an id that is already present keeps the existing
//! session.

use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::SourceId;
use crate::session::{PeerSession, SessionTasks};
use crate::transport::MediaSession;

/// A session plus the resources it holds
pub struct ActiveSession {
    /// Handshake state
    pub session: PeerSession,

    /// Negotiation primitive
    pub media: Arc<dyn MediaSession>,

    /// Background tasks
    pub tasks: SessionTasks,
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Live sessions keyed by camera identity
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SourceId, ActiveSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session unless one already exists for its peer
    ///
    /// Returns the rejected session when the id was already present so the
    /// caller can release it.
    pub fn upsert(&mut self, active: ActiveSession) -> Result<(), ActiveSession> {
        let peer = active.session.peer_id.clone();
        if self.sessions.contains_key(&peer) {
            return Err(active);
        }
        self.sessions.insert(peer, active);
        Ok(())
    }

    pub fn contains(&self, peer: &SourceId) -> bool {
        self.sessions.contains_key(peer)
    }

    pub fn get(&self, peer: &SourceId) -> Option<&ActiveSession> {
        self.sessions.get(peer)
    }

    pub fn get_mut(&mut self, peer: &SourceId) -> Option<&mut ActiveSession> {
        self.sessions.get_mut(peer)
    }

    /// Look up a session only if it belongs to generation `session_id`
    pub fn current_mut(&mut self, peer: &SourceId, session_id: u64) -> Option<&mut ActiveSession> {
        self.sessions
            .get_mut(peer)
            .filter(|active| active.session.session_id == session_id)
    }

    pub fn remove(&mut self, peer: &SourceId) -> Option<ActiveSession> {
        self.sessions.remove(peer)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveSession> {
        self.sessions.values()
    }

    /// Remove every session
    pub fn drain(&mut self) -> Vec<ActiveSession> {
        self.sessions.drain().map(|(_, active)| active).collect()
    }
}

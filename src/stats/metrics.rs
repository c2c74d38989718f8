//! Counters for coordinator activity

/// Coordinator-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Sessions ever created
    pub sessions_created: u64,
    /// Offers delivered to the bus
    pub offers_sent: u64,
    /// Answers applied as remote descriptions
    pub answers_applied: u64,
    /// Answers ignored because the session was already answered
    pub duplicate_answers: u64,
    /// Answers for cameras without a live session
    pub orphan_answers: u64,
    /// Sessions that failed negotiation (timeouts included)
    pub sessions_failed: u64,
    /// Sessions failed by a deadline
    pub timeouts: u64,
    /// Sessions closed because their camera left or the coordinator reset
    pub sessions_closed: u64,
    /// Video tracks handed to the observer
    pub tracks_received: u64,
    /// Reports from sessions that no longer exist
    pub stale_events: u64,
    /// Inbound messages that could not be decoded
    pub malformed_messages: u64,
    /// Live sessions
    pub active_sessions: u64,
    /// Cameras in the directory
    pub directory_size: u64,
}

impl CoordinatorStats {
    pub fn new() -> Self {
        Self::default()
    }
}

//! Handshake state machine
//!
//! Tracks one camera session from creation to teardown:
//!
//! ```text
//! Created -> LocalDescribing -> GatheringCandidates -> OfferSent -> Answered
//!    |              |                    |                  |           |
//!    +--------------+---------+----------+------------------+           |
//!                             v                                         |
//!                          Failed            Closed <-------------------+
//!                                            (from any state)
//! ```
//!
//! The state machine is pure bookkeeping; the negotiation task and the
//! coordinator drive it.

use std::collections::HashSet;

use tokio::time::Instant;

use super::track::TrackRef;
use crate::error::HandshakeError;
use crate::protocol::{SessionDescription, SourceId};

/// Handshake lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    /// Session allocated, nothing negotiated yet
    Created,
    /// Building the receive-only local description
    LocalDescribing,
    /// Local description applied, waiting for candidate gathering
    GatheringCandidates,
    /// Offer delivered to the camera, waiting for its answer
    OfferSent,
    /// Answer applied as remote description
    Answered,
    /// Negotiation failed
    Failed,
    /// Session torn down
    Closed,
}

impl HandshakeState {
    /// Check if no further transitions (other than close) are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Failed | HandshakeState::Closed)
    }

    /// Check if the session is still working towards an offer
    pub fn is_pre_offer(&self) -> bool {
        matches!(
            self,
            HandshakeState::Created
                | HandshakeState::LocalDescribing
                | HandshakeState::GatheringCandidates
        )
    }
}

/// Result of delivering an answer to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Answer applied, session is now `Answered`
    Applied,
    /// Session already answered; the repeat was ignored
    Duplicate,
}

/// Per-camera negotiation state
#[derive(Debug)]
pub struct PeerSession {
    /// Camera identity
    pub peer_id: SourceId,

    /// Generation number distinguishing this session from earlier ones
    /// for the same camera
    pub session_id: u64,

    state: HandshakeState,

    /// Local description (the offer, once finalized)
    pub local_description: Option<SessionDescription>,

    /// Remote description (the camera's answer)
    pub remote_description: Option<SessionDescription>,

    /// Inbound video tracks
    pub media_tracks: HashSet<TrackRef>,

    /// When the session was created
    pub created_at: Instant,

    /// When the offer was sent
    pub offer_sent_at: Option<Instant>,

    /// When the answer was applied
    pub answered_at: Option<Instant>,
}

impl PeerSession {
    /// Create a session in the `Created` state
    pub fn new(peer_id: SourceId, session_id: u64) -> Self {
        Self {
            peer_id,
            session_id,
            state: HandshakeState::Created,
            local_description: None,
            remote_description: None,
            media_tracks: HashSet::new(),
            created_at: Instant::now(),
            offer_sent_at: None,
            answered_at: None,
        }
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    fn require(&self, expected: HandshakeState, action: &'static str) -> Result<(), HandshakeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HandshakeError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    fn transition(&mut self, next: HandshakeState) {
        tracing::trace!(
            peer = %self.peer_id,
            session_id = self.session_id,
            from = ?self.state,
            to = ?next,
            "Handshake transition"
        );
        self.state = next;
    }

    /// `Created -> LocalDescribing`
    pub fn begin_local_description(&mut self) -> Result<(), HandshakeError> {
        self.require(HandshakeState::Created, "begin local description")?;
        self.transition(HandshakeState::LocalDescribing);
        Ok(())
    }

    /// `LocalDescribing -> GatheringCandidates`
    pub fn local_description_applied(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), HandshakeError> {
        self.require(HandshakeState::LocalDescribing, "apply local description")?;
        self.local_description = Some(description);
        self.transition(HandshakeState::GatheringCandidates);
        Ok(())
    }

    /// `GatheringCandidates -> OfferSent`
    ///
    /// `offer` is the finalized local description carrying every gathered
    /// candidate.
    pub fn offer_sent(&mut self, offer: SessionDescription) -> Result<(), HandshakeError> {
        self.require(HandshakeState::GatheringCandidates, "send offer")?;
        self.local_description = Some(offer);
        self.offer_sent_at = Some(Instant::now());
        self.transition(HandshakeState::OfferSent);
        Ok(())
    }

    /// Check whether an answer would be accepted
    ///
    /// Returns `Ok(None)` when the answer should be applied,
    /// `Ok(Some(Duplicate))` when it repeats an applied answer.
    pub fn check_answer(&self) -> Result<Option<AnswerOutcome>, HandshakeError> {
        match self.state {
            HandshakeState::OfferSent => Ok(None),
            HandshakeState::Answered => Ok(Some(AnswerOutcome::Duplicate)),
            state => Err(HandshakeError::InvalidTransition {
                state,
                action: "apply answer",
            }),
        }
    }

    /// `OfferSent -> Answered`
    ///
    /// A second answer after the first was applied is reported as a
    /// duplicate and does not replace the remote description.
    pub fn answer_applied(
        &mut self,
        answer: SessionDescription,
    ) -> Result<AnswerOutcome, HandshakeError> {
        if let Some(outcome) = self.check_answer()? {
            return Ok(outcome);
        }
        self.remote_description = Some(answer);
        self.answered_at = Some(Instant::now());
        self.transition(HandshakeState::Answered);
        Ok(AnswerOutcome::Applied)
    }

    /// Any non-terminal state `-> Failed`
    ///
    /// Returns `false` if the session was already terminal.
    pub fn fail(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.transition(HandshakeState::Failed);
        true
    }

    /// Any state `-> Closed`
    ///
    /// Returns the tracks that were attached to the session.
    pub fn close(&mut self) -> Vec<TrackRef> {
        self.transition(HandshakeState::Closed);
        self.media_tracks.drain().collect()
    }

    /// Record an inbound video track
    ///
    /// Returns `true` if the track was new. Tracks are ignored once the
    /// session is terminal.
    pub fn add_track(&mut self, track: TrackRef) -> bool {
        if self.state.is_terminal() || !track.is_video() {
            return false;
        }
        self.media_tracks.insert(track)
    }

    /// Check if the session is past its deadline at `now`
    ///
    /// Pre-offer states are measured from creation against
    /// `gathering_timeout`; `OfferSent` is measured from the offer against
    /// `answer_timeout`.
    pub fn is_expired(
        &self,
        now: Instant,
        gathering_timeout: std::time::Duration,
        answer_timeout: std::time::Duration,
    ) -> bool {
        match self.state {
            s if s.is_pre_offer() => now.saturating_duration_since(self.created_at) > gathering_timeout,
            HandshakeState::OfferSent => self
                .offer_sent_at
                .map(|sent| now.saturating_duration_since(sent) > answer_timeout)
                .unwrap_or(false),
            _ => false,
        }
    }
}

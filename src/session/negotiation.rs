//! Negotiation task
//!
//! Each camera session runs one task that walks the media layer through
//! local description, gathering and finalization, plus one task that
//! forwards inbound tracks. Neither touches coordinator state: they only
//! report [`SessionEvent`]s tagged with the session generation, and the
//! coordinator drops reports whose generation is no longer current.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::track::TrackRef;
use crate::error::NegotiationError;
use crate::protocol::{SessionDescription, SourceId};
use crate::transport::{GatheringSignal, MediaSession, NegotiatedSession, OfferOptions};

/// Progress reports from a session's background tasks
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Local description created and applied; gathering has started
    LocalDescriptionApplied {
        peer: SourceId,
        session_id: u64,
        description: SessionDescription,
    },
    /// Gathering finished; the finalized offer is ready to send
    OfferReady {
        peer: SourceId,
        session_id: u64,
        description: SessionDescription,
    },
    /// The media layer delivered a track
    TrackAdded {
        peer: SourceId,
        session_id: u64,
        track: TrackRef,
    },
    /// Negotiation failed
    Failed {
        peer: SourceId,
        session_id: u64,
        error: NegotiationError,
    },
}

impl SessionEvent {
    /// Camera the event belongs to
    pub fn peer(&self) -> &SourceId {
        match self {
            SessionEvent::LocalDescriptionApplied { peer, .. }
            | SessionEvent::OfferReady { peer, .. }
            | SessionEvent::TrackAdded { peer, .. }
            | SessionEvent::Failed { peer, .. } => peer,
        }
    }

    /// Generation of the session that produced the event
    pub fn session_id(&self) -> u64 {
        match self {
            SessionEvent::LocalDescriptionApplied { session_id, .. }
            | SessionEvent::OfferReady { session_id, .. }
            | SessionEvent::TrackAdded { session_id, .. }
            | SessionEvent::Failed { session_id, .. } => *session_id,
        }
    }
}

/// Background tasks owned by one session
#[derive(Debug)]
pub struct SessionTasks {
    negotiation: JoinHandle<()>,
    tracks: JoinHandle<()>,
}

impl SessionTasks {
    /// Spawn the negotiation and track-forwarding tasks
    pub fn spawn(
        peer: SourceId,
        session_id: u64,
        negotiated: NegotiatedSession,
        options: OfferOptions,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let NegotiatedSession {
            handle,
            gathering,
            tracks,
        } = negotiated;

        let negotiation = tokio::spawn(negotiate(
            peer.clone(),
            session_id,
            handle,
            gathering,
            options,
            events.clone(),
        ));
        let tracks = tokio::spawn(forward_tracks(peer, session_id, tracks, events));

        Self {
            negotiation,
            tracks,
        }
    }

    /// Stop both tasks
    ///
    /// Anything they were waiting on (gathering, tracks) is dropped with
    /// them.
    pub fn abort(&self) {
        self.negotiation.abort();
        self.tracks.abort();
    }

    /// Stop both tasks and wait until they are gone
    pub async fn shutdown(self) {
        self.abort();
        let _ = self.negotiation.await;
        let _ = self.tracks.await;
    }
}

async fn negotiate(
    peer: SourceId,
    session_id: u64,
    handle: Arc<dyn MediaSession>,
    gathering: GatheringSignal,
    options: OfferOptions,
    events: mpsc::Sender<SessionEvent>,
) {
    let result = async {
        let offer = handle.create_offer(options).await?;
        handle.set_local_description(offer.clone()).await?;

        // Ignore send failures: the coordinator is gone and so is the session
        let _ = events
            .send(SessionEvent::LocalDescriptionApplied {
                peer: peer.clone(),
                session_id,
                description: offer,
            })
            .await;

        gathering.wait().await?;

        handle
            .local_description()
            .await
            .ok_or(NegotiationError::MissingLocalDescription)
    }
    .await;

    let event = match result {
        Ok(description) => SessionEvent::OfferReady {
            peer,
            session_id,
            description,
        },
        Err(error) => SessionEvent::Failed {
            peer,
            session_id,
            error,
        },
    };

    let _ = events.send(event).await;
}

async fn forward_tracks(
    peer: SourceId,
    session_id: u64,
    mut tracks: mpsc::UnboundedReceiver<TrackRef>,
    events: mpsc::Sender<SessionEvent>,
) {
    while let Some(track) = tracks.recv().await {
        let event = SessionEvent::TrackAdded {
            peer: peer.clone(),
            session_id,
            track,
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}

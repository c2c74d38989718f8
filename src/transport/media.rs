//! Media-negotiation capability
//!
//! The coordinator does not implement WebRTC. It drives an externally
//! supplied negotiation primitive through [`MediaEngine`] and
//! [`MediaSession`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::config::{NegotiationConfig, OfferOptions};
use crate::error::NegotiationError;
use crate::protocol::{SessionDescription, SourceId};
use crate::session::TrackRef;

/// One negotiation primitive instance (a peer connection)
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Build a local description
    async fn create_offer(
        &self,
        options: OfferOptions,
    ) -> Result<SessionDescription, NegotiationError>;

    /// Apply a local description; candidate gathering starts afterwards
    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError>;

    /// Apply the remote peer's description
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError>;

    /// Current local description, including gathered candidates
    async fn local_description(&self) -> Option<SessionDescription>;

    /// Release the primitive
    async fn close(&self);
}

/// Everything the media layer hands back for a new session
pub struct NegotiatedSession {
    /// Handle used for description exchange and teardown
    pub handle: Arc<dyn MediaSession>,

    /// Resolves once candidate gathering completes
    pub gathering: GatheringSignal,

    /// Inbound tracks, in arrival order
    pub tracks: mpsc::UnboundedReceiver<TrackRef>,
}

/// Factory for negotiation sessions
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn create_session(
        &self,
        peer: &SourceId,
        config: Arc<NegotiationConfig>,
    ) -> Result<NegotiatedSession, NegotiationError>;
}

/// Resolving half of a gathering completion signal
///
/// Consumed on use, so completion is reported at most once.
#[derive(Debug)]
pub struct GatheringNotifier {
    tx: oneshot::Sender<Result<(), NegotiationError>>,
}

impl GatheringNotifier {
    /// Report that gathering finished
    ///
    /// Returns `false` if nobody is waiting any more (the session was
    /// cancelled).
    pub fn complete(self) -> bool {
        self.tx.send(Ok(())).is_ok()
    }

    /// Report that gathering failed
    pub fn fail(self, error: NegotiationError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

/// Waiting half of a gathering completion signal
///
/// Owned by exactly one negotiation task; awaiting consumes it.
#[derive(Debug)]
pub struct GatheringSignal {
    rx: oneshot::Receiver<Result<(), NegotiationError>>,
}

impl GatheringSignal {
    /// Create a linked notifier/signal pair
    pub fn channel() -> (GatheringNotifier, GatheringSignal) {
        let (tx, rx) = oneshot::channel();
        (GatheringNotifier { tx }, GatheringSignal { rx })
    }

    /// Wait for gathering to finish
    pub async fn wait(self) -> Result<(), NegotiationError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(NegotiationError::GatheringAbandoned),
        }
    }
}

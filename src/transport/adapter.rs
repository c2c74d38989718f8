//! Transport adapter
//!
//! Bundles the message channel, the media engine and the negotiation
//! configuration behind one handle so the coordinator speaks in protocol
//! messages rather than raw events.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::channel::{SignalingChannel, TransportEvent};
use super::config::NegotiationConfig;
use super::media::{MediaEngine, NegotiatedSession};
use crate::error::{NegotiationError, Result, TransportError};
use crate::protocol::{OutboundMessage, SourceId};

/// Façade over the signaling channel and media engine
pub struct TransportAdapter {
    channel: Arc<dyn SignalingChannel>,
    engine: Arc<dyn MediaEngine>,
    config: Arc<NegotiationConfig>,
}

impl TransportAdapter {
    /// Create a new adapter
    pub fn new(
        channel: Arc<dyn SignalingChannel>,
        engine: Arc<dyn MediaEngine>,
        config: NegotiationConfig,
    ) -> Self {
        Self {
            channel,
            engine,
            config: config.shared(),
        }
    }

    /// Negotiation configuration shared with every session
    pub fn config(&self) -> &Arc<NegotiationConfig> {
        &self.config
    }

    /// Connect to the bus and return the inbound event stream
    pub async fn connect(&self) -> std::result::Result<mpsc::Receiver<TransportEvent>, TransportError> {
        self.channel.connect().await
    }

    /// Encode and send a protocol message
    pub async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let (event, payload) = message.encode()?;

        tracing::trace!(event = event, "Sending signaling message");

        self.channel.send(event, payload).await?;
        Ok(())
    }

    /// Create a negotiation session for a camera
    pub async fn open_session(
        &self,
        peer: &SourceId,
    ) -> std::result::Result<NegotiatedSession, NegotiationError> {
        self.engine
            .create_session(peer, Arc::clone(&self.config))
            .await
    }
}

impl std::fmt::Debug for TransportAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

//! Error types
//!
//! Errors are grouped by where they originate: decoding protocol messages,
//! driving the media negotiation, handshake bookkeeping and the signaling
//! transport itself.

use thiserror::Error;

use crate::session::HandshakeState;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("negotiation error: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Malformed or unexpected signaling messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Inbound event name is not part of the protocol
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Payload did not match the expected shape for its event
    #[error("malformed {event} payload: {source}")]
    MalformedPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Session description was missing, empty or of the wrong type
    #[error("invalid session description: {0}")]
    InvalidDescription(String),

    /// Outbound message could not be serialized
    #[error("failed to encode {event}: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures reported by the media-negotiation layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("failed to create session: {0}")]
    CreateSession(String),

    #[error("failed to create local description: {0}")]
    CreateDescription(String),

    #[error("failed to apply local description: {0}")]
    SetLocalDescription(String),

    #[error("failed to apply remote description: {0}")]
    SetRemoteDescription(String),

    #[error("candidate gathering failed: {0}")]
    Gathering(String),

    /// The gathering notifier was dropped without ever resolving
    #[error("candidate gathering abandoned")]
    GatheringAbandoned,

    /// Finalized local description was not available after gathering
    #[error("no local description after gathering")]
    MissingLocalDescription,

    #[error("timed out in {0:?}")]
    Timeout(HandshakeState),

    #[error("malformed answer: {0}")]
    MalformedAnswer(String),
}

/// Handshake state machine misuse
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("cannot {action} in state {state:?}")]
    InvalidTransition {
        state: HandshakeState,
        action: &'static str,
    },
}

/// Signaling transport failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Message channel reported a disconnect
    #[error("signaling channel disconnected")]
    Disconnected,

    /// Inbound event stream ended
    #[error("signaling event stream closed")]
    Closed,

    #[error("send failed: {0}")]
    SendFailed(String),
}

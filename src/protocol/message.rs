//! Signaling messages
//!
//! Every message on the bus is a named event with a JSON payload. This
//! module maps between `(event, payload)` pairs and typed messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::directory::DirectoryEntry;
use crate::error::ProtocolError;

use super::constants::*;
use super::description::SessionDescription;
use super::identity::SourceId;

/// Messages received from the bus
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Full roster of known cameras
    Snapshot(Vec<DirectoryEntry>),
    /// A camera came online
    SourceJoined(DirectoryEntry),
    /// A camera went away
    SourceLeft { id: SourceId },
    /// A camera answered our offer
    ///
    /// The description is kept raw so that a malformed one can fail the
    /// owning session instead of being lost at decode time.
    Answer { id: SourceId, payload: Value },
}

#[derive(Deserialize)]
struct SourceLeftPayload {
    id: SourceId,
}

#[derive(Deserialize)]
struct AnswerPayload {
    id: SourceId,
    #[serde(default)]
    payload: Value,
}

impl InboundMessage {
    /// Decode an inbound event
    pub fn decode(event: &str, payload: Value) -> Result<Self, ProtocolError> {
        match event {
            EVENT_SNAPSHOT => serde_json::from_value(payload)
                .map(InboundMessage::Snapshot)
                .map_err(|source| ProtocolError::MalformedPayload {
                    event: EVENT_SNAPSHOT,
                    source,
                }),
            EVENT_SOURCE_JOINED => serde_json::from_value(payload)
                .map(InboundMessage::SourceJoined)
                .map_err(|source| ProtocolError::MalformedPayload {
                    event: EVENT_SOURCE_JOINED,
                    source,
                }),
            EVENT_SOURCE_LEFT => serde_json::from_value::<SourceLeftPayload>(payload)
                .map(|p| InboundMessage::SourceLeft { id: p.id })
                .map_err(|source| ProtocolError::MalformedPayload {
                    event: EVENT_SOURCE_LEFT,
                    source,
                }),
            EVENT_ANSWER => serde_json::from_value::<AnswerPayload>(payload)
                .map(|p| InboundMessage::Answer {
                    id: p.id,
                    payload: p.payload,
                })
                .map_err(|source| ProtocolError::MalformedPayload {
                    event: EVENT_ANSWER,
                    source,
                }),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    /// Event name this message arrived under
    pub fn event(&self) -> &'static str {
        match self {
            InboundMessage::Snapshot(_) => EVENT_SNAPSHOT,
            InboundMessage::SourceJoined(_) => EVENT_SOURCE_JOINED,
            InboundMessage::SourceLeft { .. } => EVENT_SOURCE_LEFT,
            InboundMessage::Answer { .. } => EVENT_ANSWER,
        }
    }
}

/// Messages sent to the bus
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Register this endpoint as a viewing client
    Join { id: SourceId },
    /// Send our local description to a camera
    Offer {
        target: SourceId,
        description: SessionDescription,
    },
}

#[derive(Serialize)]
struct JoinPayload<'a> {
    #[serde(rename = "type")]
    role: &'static str,
    id: &'a SourceId,
}

#[derive(Serialize)]
struct OfferPayload<'a> {
    target: &'a SourceId,
    payload: &'a SessionDescription,
}

impl OutboundMessage {
    /// Event name for this message
    pub fn event(&self) -> &'static str {
        match self {
            OutboundMessage::Join { .. } => EVENT_JOIN,
            OutboundMessage::Offer { .. } => EVENT_OFFER,
        }
    }

    /// Encode into an `(event, payload)` pair
    pub fn encode(&self) -> Result<(&'static str, Value), ProtocolError> {
        let event = self.event();
        let payload = match self {
            OutboundMessage::Join { id } => serde_json::to_value(JoinPayload {
                role: CLIENT_ROLE,
                id,
            }),
            OutboundMessage::Offer {
                target,
                description,
            } => serde_json::to_value(OfferPayload {
                target,
                payload: description,
            }),
        }
        .map_err(|source| ProtocolError::Encode { event, source })?;

        Ok((event, payload))
    }
}

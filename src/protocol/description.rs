//! Session descriptions
//!
//! Offers and answers travel as `{ "type": "offer", "sdp": "v=0..." }`.
//! Some peers stringify the object before sending it, so answer payloads
//! are accepted either as an object or as a JSON string holding one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// SDP message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// A session description as exchanged with a camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer description
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    /// Create an answer description
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }

    /// Validate the payload of an inbound `answer` message
    ///
    /// Accepts a final answer or a provisional answer; anything else, or an
    /// empty SDP body, is rejected.
    pub fn from_answer_payload(payload: &Value) -> Result<Self, ProtocolError> {
        let desc: SessionDescription = match payload {
            Value::Null => {
                return Err(ProtocolError::InvalidDescription(
                    "missing description".into(),
                ))
            }
            Value::String(raw) => serde_json::from_str(raw)
                .map_err(|e| ProtocolError::InvalidDescription(e.to_string()))?,
            other => serde_json::from_value(other.clone())
                .map_err(|e| ProtocolError::InvalidDescription(e.to_string()))?,
        };

        match desc.sdp_type {
            SdpType::Answer | SdpType::Pranswer => {}
            other => {
                return Err(ProtocolError::InvalidDescription(format!(
                    "expected answer, got {:?}",
                    other
                )))
            }
        }

        if desc.sdp.trim().is_empty() {
            return Err(ProtocolError::InvalidDescription("empty sdp".into()));
        }

        Ok(desc)
    }
}

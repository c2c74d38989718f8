//! Camera signaling protocol
//!
//! The viewer and the cameras talk through a message bus using six named
//! events:
//!
//! ```text
//! Viewer                                  Camera
//!   |                                        |
//!   |------- new { type: client, id } ----->|  (to the bus)
//!   |<------ list-camera [{id, name}] ------|
//!   |<------ camera-connected {id, name} ---|
//!   |                                        |
//!   |         [gather all candidates]        |
//!   |                                        |
//!   |------- offer { target, payload } ---->|
//!   |<------ answer { id, payload } --------|
//!   |                                        |
//!   |<------ camera-disconnected {id} ------|
//! ```
//!
//! Candidates are never trickled: the offer carries every gathered
//! candidate, so the bus needs no candidate event.

pub mod constants;
pub mod description;
pub mod identity;
pub mod message;

pub use description::{SdpType, SessionDescription};
pub use identity::SourceId;
pub use message::{InboundMessage, OutboundMessage};

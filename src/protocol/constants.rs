//! Signaling protocol constants

/// Outbound: register this endpoint with the message bus
pub const EVENT_JOIN: &str = "new";

/// Inbound: full roster of known cameras
pub const EVENT_SNAPSHOT: &str = "list-camera";

/// Inbound: a camera joined
pub const EVENT_SOURCE_JOINED: &str = "camera-connected";

/// Inbound: a camera left
pub const EVENT_SOURCE_LEFT: &str = "camera-disconnected";

/// Outbound: local description for a camera
pub const EVENT_OFFER: &str = "offer";

/// Inbound: a camera's reply to our offer
pub const EVENT_ANSWER: &str = "answer";

/// Role announced in the join message
pub const CLIENT_ROLE: &str = "client";

/// Default STUN server used when no ICE servers are configured
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Media kind for video tracks
pub const TRACK_KIND_VIDEO: &str = "video";

/// Media kind for audio tracks
pub const TRACK_KIND_AUDIO: &str = "audio";

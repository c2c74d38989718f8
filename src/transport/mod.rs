//! Transport adapter
//!
//! The coordinator consumes two external capabilities: a message bus
//! ([`SignalingChannel`]) and a media-negotiation primitive
//! ([`MediaEngine`]/[`MediaSession`]). [`TransportAdapter`] wraps both.
//! The `loopback` module provides in-process implementations.

pub mod adapter;
pub mod channel;
pub mod config;
pub mod loopback;
pub mod media;

pub use adapter::TransportAdapter;
pub use channel::{SignalingChannel, TransportEvent};
pub use config::{BundlePolicy, IceServer, NegotiationConfig, OfferOptions};
pub use loopback::{GatheringMode, LoopbackEngine, MemoryChannel, MemoryRemote, SentMessage};
pub use media::{GatheringNotifier, GatheringSignal, MediaEngine, MediaSession, NegotiatedSession};

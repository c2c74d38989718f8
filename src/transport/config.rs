//! Negotiation configuration
//!
//! One immutable value shared (via `Arc`) by the transport adapter and every
//! camera session.

use std::sync::Arc;

use crate::protocol::constants::DEFAULT_STUN_SERVER;

/// ICE server entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServer {
    /// STUN server without credentials
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// TURN server with credentials
    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            urls: vec![url.into()],
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }
}

/// Media bundling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundlePolicy {
    Balanced,
    MaxCompat,
    MaxBundle,
}

/// Which media the local description asks to receive
///
/// The viewer never sends media, so every requested transceiver is
/// receive-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferOptions {
    pub receive_video: bool,
    pub receive_audio: bool,
}

/// Negotiation settings handed to the media layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationConfig {
    /// ICE servers used for candidate gathering
    pub ice_servers: Vec<IceServer>,

    /// Bundle policy
    pub bundle_policy: BundlePolicy,

    /// Request a receive-only video transceiver
    pub receive_video: bool,

    /// Request a receive-only audio transceiver
    pub receive_audio: bool,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServer::stun(DEFAULT_STUN_SERVER)],
            bundle_policy: BundlePolicy::MaxBundle,
            receive_video: true,
            receive_audio: false,
        }
    }
}

impl NegotiationConfig {
    /// Replace the ICE server list
    pub fn ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice_servers = servers;
        self
    }

    /// Add an ICE server
    pub fn add_ice_server(mut self, server: IceServer) -> Self {
        self.ice_servers.push(server);
        self
    }

    /// Set bundle policy
    pub fn bundle_policy(mut self, policy: BundlePolicy) -> Self {
        self.bundle_policy = policy;
        self
    }

    /// Also receive audio from cameras
    pub fn receive_audio(mut self, enabled: bool) -> Self {
        self.receive_audio = enabled;
        self
    }

    /// Offer options derived from this configuration
    pub fn offer_options(&self) -> OfferOptions {
        OfferOptions {
            receive_video: self.receive_video,
            receive_audio: self.receive_audio,
        }
    }

    /// Freeze into a shareable value
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

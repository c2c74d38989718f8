//! # camsignal
//!
//! Signaling coordinator for a viewer that receives live video from many
//! cameras over WebRTC.
//!
//! The viewer joins a message bus, learns which cameras are online, and runs
//! one offer/answer handshake per camera. Offers are sent only after ICE
//! gathering has completed, so they carry every local candidate.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use camsignal::transport::{LoopbackEngine, MemoryChannel};
//! use camsignal::{CoordinatorConfig, SessionCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (channel, _remote) = MemoryChannel::new(64);
//!     let coordinator = SessionCoordinator::new(
//!         CoordinatorConfig::default(),
//!         Arc::new(channel),
//!         Arc::new(LoopbackEngine::immediate()),
//!     );
//!
//!     coordinator.run().await?;
//!     Ok(())
//! }
//! ```

pub mod coordinator;
pub mod directory;
pub mod error;
pub mod protocol;
pub mod session;
pub mod stats;
pub mod transport;

pub use coordinator::{CoordinatorConfig, SessionCoordinator};
pub use directory::{DirectoryEntry, DirectoryRegistry};
pub use error::{Error, Result};
pub use protocol::{SessionDescription, SourceId};
pub use session::{HandshakeState, MediaObserver, PeerSession, TrackRef};
pub use stats::CoordinatorStats;

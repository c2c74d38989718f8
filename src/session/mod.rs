//! Camera sessions
//!
//! A session is one attempt to receive media from one camera. It owns a
//! handshake state machine ([`PeerSession`]) and the background tasks that
//! drive the media layer ([`SessionTasks`]).

pub mod negotiation;
pub mod state;
pub mod track;

pub use negotiation::{SessionEvent, SessionTasks};
pub use state::{AnswerOutcome, HandshakeState, PeerSession};
pub use track::{MediaObserver, NoopObserver, TrackKind, TrackRef};

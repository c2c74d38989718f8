//! Inbound media track references
//!
//! The coordinator never touches media data. It only records which tracks a
//! camera session produced and hands references to an observer (usually
//! whatever renders the video).

use crate::protocol::constants::{TRACK_KIND_AUDIO, TRACK_KIND_VIDEO};
use crate::protocol::SourceId;

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => TRACK_KIND_AUDIO,
            TrackKind::Video => TRACK_KIND_VIDEO,
        }
    }
}

/// Reference to a track delivered by the negotiation layer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackRef {
    /// Track identifier assigned by the negotiation layer
    pub id: String,
    /// Media kind
    pub kind: TrackKind,
    /// Media stream the track belongs to
    pub stream_id: Option<String>,
}

impl TrackRef {
    /// Create a video track reference
    pub fn video(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TrackKind::Video,
            stream_id: None,
        }
    }

    /// Create an audio track reference
    pub fn audio(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: TrackKind::Audio,
            stream_id: None,
        }
    }

    /// Attach a stream id
    pub fn with_stream(mut self, stream_id: impl Into<String>) -> Self {
        self.stream_id = Some(stream_id.into());
        self
    }

    pub fn is_video(&self) -> bool {
        self.kind == TrackKind::Video
    }
}

/// Receives media intake notifications from the coordinator
///
/// Callbacks run on the coordinator's event loop and must not block.
pub trait MediaObserver: Send + Sync {
    /// A camera session delivered a video track
    fn on_track(&self, peer: &SourceId, track: &TrackRef);

    /// A camera session ended; its tracks are no longer valid
    fn on_session_ended(&self, peer: &SourceId, tracks: &[TrackRef]) {
        let _ = (peer, tracks);
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl MediaObserver for NoopObserver {
    fn on_track(&self, _peer: &SourceId, _track: &TrackRef) {}
}

//! In-process transport
//!
//! [`MemoryChannel`] and [`LoopbackEngine`] stand in for a real message bus
//! and WebRTC stack. They record everything the coordinator does and let the
//! caller play the part of the cameras: inject events, complete gathering,
//! deliver tracks and inject failures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::channel::{SignalingChannel, TransportEvent};
use super::config::{NegotiationConfig, OfferOptions};
use super::media::{GatheringNotifier, GatheringSignal, MediaEngine, MediaSession, NegotiatedSession};
use crate::error::{NegotiationError, TransportError};
use crate::protocol::{SessionDescription, SourceId};
use crate::session::TrackRef;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A message the coordinator sent
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub event: String,
    pub payload: Value,
}

struct ChannelShared {
    capacity: usize,
    sent: Mutex<Vec<SentMessage>>,
    fail_sends: AtomicBool,
    inbound: Mutex<Inbound>,
}

enum Inbound {
    /// Not connected yet; deliveries wait here
    Pending(Vec<TransportEvent>),
    Open(mpsc::Sender<TransportEvent>),
    Closed,
}

/// In-memory signaling channel
pub struct MemoryChannel {
    shared: Arc<ChannelShared>,
}

/// The far side of a [`MemoryChannel`]
#[derive(Clone)]
pub struct MemoryRemote {
    shared: Arc<ChannelShared>,
}

impl MemoryChannel {
    /// Create a channel and its remote end
    ///
    /// Events delivered before the channel is connected are held and
    /// replayed right after [`TransportEvent::Connected`].
    pub fn new(capacity: usize) -> (Self, MemoryRemote) {
        let shared = Arc::new(ChannelShared {
            capacity: capacity.max(1),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            inbound: Mutex::new(Inbound::Pending(Vec::new())),
        });

        let channel = Self {
            shared: Arc::clone(&shared),
        };
        (channel, MemoryRemote { shared })
    }
}

#[async_trait]
impl SignalingChannel for MemoryChannel {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError> {
        let mut inbound = lock(&self.shared.inbound);
        let backlog = match std::mem::replace(&mut *inbound, Inbound::Closed) {
            Inbound::Pending(backlog) => backlog,
            other => {
                *inbound = other;
                return Err(TransportError::Closed);
            }
        };

        // Sized so the backlog never has to wait for room
        let (tx, rx) = mpsc::channel(self.shared.capacity.max(backlog.len() + 1));
        for event in std::iter::once(TransportEvent::Connected).chain(backlog) {
            tx.try_send(event).map_err(|_| TransportError::Closed)?;
        }
        *inbound = Inbound::Open(tx);

        Ok(rx)
    }

    async fn send(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        if self.shared.fail_sends.load(Ordering::Relaxed) {
            return Err(TransportError::SendFailed(format!("{} rejected", event)));
        }

        lock(&self.shared.sent).push(SentMessage {
            event: event.to_string(),
            payload,
        });
        Ok(())
    }
}

impl MemoryRemote {
    async fn push(&self, event: TransportEvent) -> Result<(), TransportError> {
        let tx = match &mut *lock(&self.shared.inbound) {
            Inbound::Pending(backlog) => {
                backlog.push(event);
                return Ok(());
            }
            Inbound::Open(tx) => tx.clone(),
            Inbound::Closed => return Err(TransportError::Closed),
        };

        tx.send(event).await.map_err(|_| TransportError::Closed)
    }

    /// Deliver an inbound event
    pub async fn deliver(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.push(TransportEvent::message(event, payload)).await
    }

    /// Simulate losing the bus
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.push(TransportEvent::Disconnected).await
    }

    /// End the inbound stream without a disconnect notice
    pub fn close(&self) {
        *lock(&self.shared.inbound) = Inbound::Closed;
    }

    /// Everything sent so far
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.shared.sent).clone()
    }

    /// Payloads sent under one event name
    pub fn sent_events(&self, event: &str) -> Vec<Value> {
        lock(&self.shared.sent)
            .iter()
            .filter(|m| m.event == event)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Make every subsequent send fail
    pub fn fail_sends(&self, enabled: bool) {
        self.shared.fail_sends.store(enabled, Ordering::Relaxed);
    }
}

/// When loopback sessions finish gathering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringMode {
    /// As soon as the local description is applied
    Immediate,
    /// Only when [`LoopbackEngine::complete_gathering`] is called
    Manual,
}

struct PeerRecord {
    generation: u64,
    notifier: Option<GatheringNotifier>,
    tracks: Option<mpsc::UnboundedSender<TrackRef>>,
    gathered: bool,
    remote_descriptions: Vec<SessionDescription>,
    closed: bool,
    sessions_created: usize,
}

struct EngineState {
    mode: GatheringMode,
    next_generation: u64,
    peers: HashMap<SourceId, PeerRecord>,
    fail_offers: HashSet<SourceId>,
    fail_remote: HashSet<SourceId>,
}

impl EngineState {
    fn current(&mut self, peer: &SourceId, generation: u64) -> Option<&mut PeerRecord> {
        self.peers
            .get_mut(peer)
            .filter(|record| record.generation == generation)
    }
}

/// Scripted media engine
#[derive(Clone)]
pub struct LoopbackEngine {
    state: Arc<Mutex<EngineState>>,
}

impl LoopbackEngine {
    /// Create an engine with the given gathering mode
    pub fn new(mode: GatheringMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                mode,
                next_generation: 1,
                peers: HashMap::new(),
                fail_offers: HashSet::new(),
                fail_remote: HashSet::new(),
            })),
        }
    }

    /// Engine that gathers instantly
    pub fn immediate() -> Self {
        Self::new(GatheringMode::Immediate)
    }

    /// Engine whose gathering is completed by hand
    pub fn manual() -> Self {
        Self::new(GatheringMode::Manual)
    }

    /// Complete gathering for the current session of `peer`
    ///
    /// Returns `true` if a session was waiting for it.
    pub fn complete_gathering(&self, peer: &SourceId) -> bool {
        let mut state = lock(&self.state);
        let Some(record) = state.peers.get_mut(peer) else {
            return false;
        };
        record.gathered = true;
        record
            .notifier
            .take()
            .map(|n| n.complete())
            .unwrap_or(false)
    }

    /// Fail gathering for the current session of `peer`
    pub fn fail_gathering(&self, peer: &SourceId, reason: &str) -> bool {
        let mut state = lock(&self.state);
        state
            .peers
            .get_mut(peer)
            .and_then(|record| record.notifier.take())
            .map(|n| n.fail(NegotiationError::Gathering(reason.to_string())))
            .unwrap_or(false)
    }

    /// Deliver an inbound track on the current session of `peer`
    pub fn push_track(&self, peer: &SourceId, track: TrackRef) -> bool {
        let state = lock(&self.state);
        state
            .peers
            .get(peer)
            .and_then(|record| record.tracks.as_ref())
            .map(|tx| tx.send(track).is_ok())
            .unwrap_or(false)
    }

    /// Remote descriptions applied to the current session of `peer`
    pub fn remote_descriptions(&self, peer: &SourceId) -> Vec<SessionDescription> {
        lock(&self.state)
            .peers
            .get(peer)
            .map(|record| record.remote_descriptions.clone())
            .unwrap_or_default()
    }

    /// Check if the current session of `peer` was closed
    pub fn is_closed(&self, peer: &SourceId) -> bool {
        lock(&self.state)
            .peers
            .get(peer)
            .map(|record| record.closed)
            .unwrap_or(false)
    }

    /// Number of sessions ever created for `peer`
    pub fn sessions_created(&self, peer: &SourceId) -> usize {
        lock(&self.state)
            .peers
            .get(peer)
            .map(|record| record.sessions_created)
            .unwrap_or(0)
    }

    /// Make local description creation fail for `peer`
    pub fn fail_offers_for(&self, peer: impl Into<SourceId>) {
        lock(&self.state).fail_offers.insert(peer.into());
    }

    /// Make remote description application fail for `peer`
    pub fn fail_remote_for(&self, peer: impl Into<SourceId>) {
        lock(&self.state).fail_remote.insert(peer.into());
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::immediate()
    }
}

#[async_trait]
impl MediaEngine for LoopbackEngine {
    async fn create_session(
        &self,
        peer: &SourceId,
        _config: Arc<NegotiationConfig>,
    ) -> Result<NegotiatedSession, NegotiationError> {
        let (notifier, gathering) = GatheringSignal::channel();
        let (track_tx, track_rx) = mpsc::unbounded_channel();

        let generation = {
            let mut state = lock(&self.state);
            let generation = state.next_generation;
            state.next_generation += 1;

            let sessions_created = state
                .peers
                .get(peer)
                .map(|record| record.sessions_created)
                .unwrap_or(0)
                + 1;

            state.peers.insert(
                peer.clone(),
                PeerRecord {
                    generation,
                    notifier: Some(notifier),
                    tracks: Some(track_tx),
                    gathered: false,
                    remote_descriptions: Vec::new(),
                    closed: false,
                    sessions_created,
                },
            );
            generation
        };

        let session = LoopbackSession {
            peer: peer.clone(),
            generation,
            state: Arc::clone(&self.state),
            local: Mutex::new(None),
        };

        Ok(NegotiatedSession {
            handle: Arc::new(session),
            gathering,
            tracks: track_rx,
        })
    }
}

struct LoopbackSession {
    peer: SourceId,
    generation: u64,
    state: Arc<Mutex<EngineState>>,
    local: Mutex<Option<SessionDescription>>,
}

fn offer_sdp(generation: u64, options: OfferOptions) -> String {
    let mut sdp = format!(
        "v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n",
        generation
    );
    if options.receive_video {
        sdp.push_str("m=video 9 UDP/TLS/RTP/SAVPF 96\r\na=recvonly\r\na=rtpmap:96 VP8/90000\r\n");
    }
    if options.receive_audio {
        sdp.push_str(
            "m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=recvonly\r\na=rtpmap:111 opus/48000/2\r\n",
        );
    }
    sdp
}

#[async_trait]
impl MediaSession for LoopbackSession {
    async fn create_offer(
        &self,
        options: OfferOptions,
    ) -> Result<SessionDescription, NegotiationError> {
        if lock(&self.state).fail_offers.contains(&self.peer) {
            return Err(NegotiationError::CreateDescription(format!(
                "scripted failure for {}",
                self.peer
            )));
        }
        Ok(SessionDescription::offer(offer_sdp(self.generation, options)))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        *lock(&self.local) = Some(description);

        let mut state = lock(&self.state);
        let immediate = state.mode == GatheringMode::Immediate;
        if let Some(record) = state.current(&self.peer, self.generation) {
            if immediate {
                record.gathered = true;
                if let Some(notifier) = record.notifier.take() {
                    notifier.complete();
                }
            }
        }
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let mut state = lock(&self.state);
        if state.fail_remote.contains(&self.peer) {
            return Err(NegotiationError::SetRemoteDescription(format!(
                "scripted failure for {}",
                self.peer
            )));
        }
        if let Some(record) = state.current(&self.peer, self.generation) {
            record.remote_descriptions.push(description);
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let mut local = lock(&self.local).clone()?;

        let gathered = lock(&self.state)
            .current(&self.peer, self.generation)
            .map(|record| record.gathered)
            .unwrap_or(false);
        if gathered {
            local.sdp.push_str(&format!(
                "a=candidate:1 1 udp 2122260223 127.0.0.1 {} typ host\r\na=end-of-candidates\r\n",
                50000 + self.generation
            ));
        }
        Some(local)
    }

    async fn close(&self) {
        let mut state = lock(&self.state);
        if let Some(record) = state.current(&self.peer, self.generation) {
            record.closed = true;
            record.tracks = None;
            record.notifier = None;
        }
    }
}

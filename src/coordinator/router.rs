//! Session coordinator
//!
//! Owns the directory and the session table, reacts to inbound protocol
//! messages and to reports from session tasks. Every mutation happens on
//! the coordinator's own `&mut self`, from a single event loop, so neither
//! structure needs locking.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::config::CoordinatorConfig;
use super::table::{ActiveSession, SessionTable};
use crate::directory::{DirectoryEntry, DirectoryRegistry};
use crate::error::{Error, NegotiationError, ProtocolError, Result, TransportError};
use crate::protocol::{InboundMessage, OutboundMessage, SessionDescription, SourceId};
use crate::session::{
    AnswerOutcome, HandshakeState, MediaObserver, NoopObserver, PeerSession, SessionEvent,
    SessionTasks,
};
use crate::stats::CoordinatorStats;
use crate::transport::{MediaEngine, SignalingChannel, TransportAdapter, TransportEvent};

/// Coordinates camera sessions for one viewer
pub struct SessionCoordinator {
    config: CoordinatorConfig,
    identity: SourceId,
    transport: TransportAdapter,
    directory: DirectoryRegistry,
    sessions: SessionTable,
    observer: Arc<dyn MediaObserver>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    next_session_id: u64,
    connected: bool,
    stats: CoordinatorStats,
}

impl SessionCoordinator {
    /// Create a coordinator over the given channel and media engine
    pub fn new(
        config: CoordinatorConfig,
        channel: Arc<dyn SignalingChannel>,
        engine: Arc<dyn MediaEngine>,
    ) -> Self {
        let identity = config.identity.clone().unwrap_or_else(SourceId::generate);
        let transport = TransportAdapter::new(channel, engine, config.negotiation.clone());
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));

        tracing::debug!(identity = %identity, "Coordinator created");

        Self {
            config,
            identity,
            transport,
            directory: DirectoryRegistry::new(),
            sessions: SessionTable::new(),
            observer: Arc::new(NoopObserver),
            events_tx,
            events_rx,
            next_session_id: 1,
            connected: false,
            stats: CoordinatorStats::new(),
        }
    }

    /// Register the media observer
    pub fn with_observer(mut self, observer: Arc<dyn MediaObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Identity announced to the bus
    pub fn identity(&self) -> &SourceId {
        &self.identity
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Camera roster
    pub fn directory(&self) -> &DirectoryRegistry {
        &self.directory
    }

    /// Live sessions
    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Handshake state of a camera's live session
    pub fn session_state(&self, peer: &SourceId) -> Option<HandshakeState> {
        self.sessions.get(peer).map(|active| active.session.state())
    }

    /// A camera's live session
    pub fn session(&self, peer: &SourceId) -> Option<&PeerSession> {
        self.sessions.get(peer).map(|active| &active.session)
    }

    /// Whether the bus has accepted our join
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Snapshot of coordinator counters
    pub fn stats(&self) -> CoordinatorStats {
        let mut stats = self.stats.clone();
        stats.active_sessions = self.sessions.len() as u64;
        stats.directory_size = self.directory.len() as u64;
        stats
    }

    /// Announce ourselves to the bus as a viewing client
    pub async fn on_transport_connected(&mut self) -> Result<()> {
        self.transport
            .send(&OutboundMessage::Join {
                id: self.identity.clone(),
            })
            .await?;
        self.connected = true;

        tracing::info!(identity = %self.identity, "Joined signaling bus");
        Ok(())
    }

    /// A camera came online
    ///
    /// Lists the camera and starts a session for it. Returns `false` if a
    /// session already existed (duplicate notification) or could not be
    /// created.
    pub async fn on_source_joined(&mut self, id: SourceId, display_name: impl Into<String>) -> bool {
        if self.sessions.contains(&id) {
            tracing::debug!(peer = %id, "Duplicate source-joined ignored");
            return false;
        }

        self.directory.add_entry(DirectoryEntry::new(id.clone(), display_name));
        self.start_session(&id).await
    }

    /// A camera went away
    pub async fn on_source_left(&mut self, id: &SourceId) {
        let listed = self.directory.remove_entry(id).is_some();

        match self.sessions.remove(id) {
            Some(active) => {
                self.close_session(active).await;
                self.stats.sessions_closed += 1;
            }
            None => {
                tracing::debug!(peer = %id, listed = listed, "Source left without a session");
            }
        }
    }

    /// Merge a roster snapshot
    ///
    /// Informational unless `connect_on_snapshot` is set, in which case a
    /// session is started for every listed camera that has none.
    pub async fn on_snapshot(&mut self, entries: Vec<DirectoryEntry>) {
        let ids: Vec<SourceId> = if self.config.connect_on_snapshot {
            entries.iter().map(|e| e.id.clone()).collect()
        } else {
            Vec::new()
        };

        let received = entries.len();
        let inserted = self.directory.apply_snapshot(entries);

        tracing::info!(
            received = received,
            inserted = inserted,
            total = self.directory.len(),
            "Roster snapshot received"
        );

        for id in ids {
            if !self.sessions.contains(&id) {
                self.start_session(&id).await;
            }
        }
    }

    /// A camera answered our offer
    pub async fn on_answer(&mut self, id: &SourceId, payload: Value) {
        let Some(active) = self.sessions.get_mut(id) else {
            self.stats.orphan_answers += 1;
            tracing::debug!(peer = %id, "Answer for unknown source discarded");
            return;
        };

        match active.session.check_answer() {
            Ok(None) => {}
            Ok(Some(_)) => {
                self.stats.duplicate_answers += 1;
                tracing::debug!(peer = %id, "Duplicate answer ignored");
                return;
            }
            Err(e) => {
                tracing::debug!(peer = %id, error = %e, "Unexpected answer discarded");
                return;
            }
        }

        let description = match SessionDescription::from_answer_payload(&payload) {
            Ok(description) => description,
            Err(e) => {
                let error = NegotiationError::MalformedAnswer(e.to_string());
                self.fail_session(id, error.into()).await;
                return;
            }
        };

        let media = Arc::clone(&active.media);
        if let Err(error) = media.set_remote_description(description.clone()).await {
            self.fail_session(id, error.into()).await;
            return;
        }

        if let Some(active) = self.sessions.get_mut(id) {
            match active.session.answer_applied(description) {
                Ok(AnswerOutcome::Applied) => {
                    self.stats.answers_applied += 1;
                    tracing::info!(
                        peer = %id,
                        session_id = active.session.session_id,
                        "Answer applied"
                    );
                }
                Ok(AnswerOutcome::Duplicate) => {
                    self.stats.duplicate_answers += 1;
                }
                Err(e) => {
                    tracing::warn!(peer = %id, error = %e, "Answer applied out of order");
                }
            }
        }
    }

    /// Dispatch a decoded inbound message
    pub async fn handle_message(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::Snapshot(entries) => self.on_snapshot(entries).await,
            InboundMessage::SourceJoined(entry) => {
                self.on_source_joined(entry.id, entry.display_name).await;
            }
            InboundMessage::SourceLeft { id } => self.on_source_left(&id).await,
            InboundMessage::Answer { id, payload } => self.on_answer(&id, payload).await,
        }
    }

    /// Handle one event from the bus
    ///
    /// Only a lost connection is an error; it resets the coordinator first.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Connected => self.on_transport_connected().await,
            TransportEvent::Message { event, payload } => {
                match InboundMessage::decode(&event, payload) {
                    Ok(message) => self.handle_message(message).await,
                    Err(ProtocolError::UnknownEvent(name)) => {
                        tracing::debug!(event = %name, "Ignoring unknown event");
                    }
                    Err(e) => {
                        self.stats.malformed_messages += 1;
                        tracing::warn!(event = %event, error = %e, "Dropping malformed message");
                    }
                }
                Ok(())
            }
            TransportEvent::Disconnected => {
                tracing::error!("Signaling bus disconnected");
                self.reset().await;
                Err(TransportError::Disconnected.into())
            }
        }
    }

    /// Handle one report from a session task
    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        let peer = event.peer().clone();
        let session_id = event.session_id();

        let Some(active) = self.sessions.current_mut(&peer, session_id) else {
            self.stats.stale_events += 1;
            tracing::debug!(
                peer = %peer,
                session_id = session_id,
                "Stale session event discarded"
            );
            return;
        };

        match event {
            SessionEvent::LocalDescriptionApplied { description, .. } => {
                if let Err(e) = active.session.local_description_applied(description) {
                    tracing::warn!(peer = %peer, error = %e, "Local description out of order");
                    return;
                }
                tracing::debug!(
                    peer = %peer,
                    session_id = session_id,
                    "Gathering candidates"
                );
            }
            SessionEvent::OfferReady { description, .. } => {
                self.send_offer(&peer, session_id, description).await;
            }
            SessionEvent::TrackAdded { track, .. } => {
                if !track.is_video() {
                    tracing::debug!(
                        peer = %peer,
                        track = %track.id,
                        kind = track.kind.as_str(),
                        "Ignoring non-video track"
                    );
                    return;
                }
                if active.session.add_track(track.clone()) {
                    self.stats.tracks_received += 1;
                    self.observer.on_track(&peer, &track);
                    tracing::info!(peer = %peer, track = %track.id, "Video track received");
                }
            }
            SessionEvent::Failed { error, .. } => {
                self.fail_session(&peer, error.into()).await;
            }
        }
    }

    /// Wait for the next session report and handle it
    pub async fn process_next_session_event(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.handle_session_event(event).await;
        }
    }

    /// Handle every session report that is already queued
    ///
    /// Returns the number of reports handled.
    pub async fn process_pending_session_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_session_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Fail sessions that are past their deadline
    pub async fn sweep_timeouts(&mut self) {
        self.sweep_timeouts_at(Instant::now()).await;
    }

    /// Fail sessions that are past their deadline at `now`
    pub async fn sweep_timeouts_at(&mut self, now: Instant) {
        let gathering = self.config.gathering_timeout;
        let answer = self.config.answer_timeout;

        let expired: Vec<(SourceId, HandshakeState)> = self
            .sessions
            .iter()
            .filter(|active| active.session.is_expired(now, gathering, answer))
            .map(|active| (active.session.peer_id.clone(), active.session.state()))
            .collect();

        for (peer, state) in expired {
            self.stats.timeouts += 1;
            self.fail_session(&peer, NegotiationError::Timeout(state).into())
                .await;
        }
    }

    /// Close every session and forget the roster
    pub async fn reset(&mut self) {
        let sessions = self.sessions.drain();
        let count = sessions.len();

        for active in sessions {
            self.close_session(active).await;
        }
        self.stats.sessions_closed += count as u64;
        self.directory.clear();
        self.connected = false;

        tracing::info!(sessions = count, "Coordinator reset");
    }

    /// Connect and run until the bus goes away
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Connect and run until `shutdown` resolves or the bus goes away
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut inbound = self.transport.connect().await?;
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        tokio::pin!(shutdown);

        tracing::info!(identity = %self.identity, "Coordinator running");

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break Ok(());
                }
                event = inbound.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_transport_event(event).await {
                            break Err(e);
                        }
                    }
                    None => {
                        tracing::error!("Signaling event stream closed");
                        break Err(Error::from(TransportError::Closed));
                    }
                },
                Some(event) = self.events_rx.recv() => {
                    self.handle_session_event(event).await;
                }
                _ = ticker.tick() => {
                    self.sweep_timeouts().await;
                }
            }
        };

        self.reset().await;
        result
    }

    async fn start_session(&mut self, peer: &SourceId) -> bool {
        if self.sessions.contains(peer) {
            return false;
        }

        let negotiated = match self.transport.open_session(peer).await {
            Ok(negotiated) => negotiated,
            Err(e) => {
                self.stats.sessions_failed += 1;
                tracing::warn!(peer = %peer, error = %e, "Failed to create session");
                return false;
            }
        };

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        let mut session = PeerSession::new(peer.clone(), session_id);
        if let Err(e) = session.begin_local_description() {
            tracing::warn!(peer = %peer, error = %e, "Session did not start");
            negotiated.handle.close().await;
            return false;
        }

        let media = Arc::clone(&negotiated.handle);
        let tasks = SessionTasks::spawn(
            peer.clone(),
            session_id,
            negotiated,
            self.transport.config().offer_options(),
            self.events_tx.clone(),
        );

        if let Err(rejected) = self.sessions.upsert(ActiveSession {
            session,
            media,
            tasks,
        }) {
            rejected.tasks.abort();
            rejected.media.close().await;
            return false;
        }

        self.stats.sessions_created += 1;
        tracing::info!(
            peer = %peer,
            session_id = session_id,
            name = self.directory.name_of(peer).unwrap_or_default(),
            "Session created"
        );
        true
    }

    async fn send_offer(&mut self, peer: &SourceId, session_id: u64, offer: SessionDescription) {
        match self.sessions.current_mut(peer, session_id) {
            Some(active) if active.session.state() == HandshakeState::GatheringCandidates => {}
            Some(active) => {
                tracing::warn!(
                    peer = %peer,
                    state = ?active.session.state(),
                    "Offer ready in unexpected state"
                );
                return;
            }
            None => return,
        }

        let message = OutboundMessage::Offer {
            target: peer.clone(),
            description: offer.clone(),
        };
        if let Err(e) = self.transport.send(&message).await {
            self.fail_session(peer, e).await;
            return;
        }

        if let Some(active) = self.sessions.current_mut(peer, session_id) {
            if let Err(e) = active.session.offer_sent(offer) {
                tracing::warn!(peer = %peer, error = %e, "Offer sent out of order");
                return;
            }
            self.stats.offers_sent += 1;
            tracing::info!(peer = %peer, session_id = session_id, "Offer sent");
        }
    }

    async fn fail_session(&mut self, peer: &SourceId, error: Error) {
        let Some(mut active) = self.sessions.remove(peer) else {
            return;
        };

        let state = active.session.state();
        active.session.fail();
        active.tasks.abort();
        active.media.close().await;

        let tracks: Vec<_> = active.session.media_tracks.drain().collect();
        self.observer.on_session_ended(peer, &tracks);
        self.stats.sessions_failed += 1;

        tracing::warn!(
            peer = %peer,
            session_id = active.session.session_id,
            state = ?state,
            error = %error,
            "Session failed"
        );
    }

    async fn close_session(&mut self, mut active: ActiveSession) {
        active.tasks.abort();
        let tracks = active.session.close();
        active.media.close().await;
        self.observer.on_session_ended(&active.session.peer_id, &tracks);

        tracing::info!(
            peer = %active.session.peer_id,
            session_id = active.session.session_id,
            "Session closed"
        );
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("identity", &self.identity)
            .field("sessions", &self.sessions.len())
            .field("directory", &self.directory.len())
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

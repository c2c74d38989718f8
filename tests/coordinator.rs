//! End-to-end coordinator behaviour over the loopback transport

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::oneshot;

use camsignal::error::TransportError;
use camsignal::protocol::constants::{
    EVENT_ANSWER, EVENT_JOIN, EVENT_OFFER, EVENT_SNAPSHOT, EVENT_SOURCE_JOINED, EVENT_SOURCE_LEFT,
};
use camsignal::transport::{LoopbackEngine, MemoryChannel, MemoryRemote, TransportEvent};
use camsignal::{
    CoordinatorConfig, Error, HandshakeState, MediaObserver, SessionCoordinator, SourceId,
    TrackRef,
};

const ANSWER_SDP: &str = "v=0\r\no=- 1 2 IN IP4 10.0.0.2\r\ns=-\r\nt=0 0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=sendonly\r\n";

struct Harness {
    coordinator: SessionCoordinator,
    remote: MemoryRemote,
    engine: LoopbackEngine,
}

impl Harness {
    fn new(engine: LoopbackEngine) -> Self {
        Self::with_config(engine, CoordinatorConfig::default().identity("viewer-1"))
    }

    fn with_config(engine: LoopbackEngine, config: CoordinatorConfig) -> Self {
        let (channel, remote) = MemoryChannel::new(64);
        let coordinator =
            SessionCoordinator::new(config, Arc::new(channel), Arc::new(engine.clone()));
        Self {
            coordinator,
            remote,
            engine,
        }
    }

    async fn inbound(&mut self, event: &str, payload: Value) {
        self.coordinator
            .handle_transport_event(TransportEvent::message(event, payload))
            .await
            .expect("inbound message");
    }

    async fn join(&mut self, id: &str, name: &str) {
        self.inbound(EVENT_SOURCE_JOINED, json!({ "id": id, "name": name }))
            .await;
    }

    async fn answer(&mut self, id: &str, payload: Value) {
        self.inbound(EVENT_ANSWER, json!({ "id": id, "payload": payload }))
            .await;
    }

    /// Handle `count` session task reports
    async fn settle(&mut self, count: usize) {
        for _ in 0..count {
            tokio::time::timeout(
                Duration::from_secs(1),
                self.coordinator.process_next_session_event(),
            )
            .await
            .expect("session event");
        }
    }

    fn state(&self, id: &str) -> Option<HandshakeState> {
        self.coordinator.session_state(&SourceId::from(id))
    }

    fn offers(&self) -> Vec<Value> {
        self.remote.sent_events(EVENT_OFFER)
    }
}

fn answer_payload() -> Value {
    json!({ "type": "answer", "sdp": ANSWER_SDP })
}

async fn wait_for<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[derive(Default)]
struct RecordingObserver {
    tracks: Mutex<Vec<(SourceId, TrackRef)>>,
    ended: Mutex<Vec<(SourceId, usize)>>,
}

impl MediaObserver for RecordingObserver {
    fn on_track(&self, peer: &SourceId, track: &TrackRef) {
        self.tracks.lock().unwrap().push((peer.clone(), track.clone()));
    }

    fn on_session_ended(&self, peer: &SourceId, tracks: &[TrackRef]) {
        self.ended.lock().unwrap().push((peer.clone(), tracks.len()));
    }
}

#[tokio::test]
async fn test_distinct_sources_each_get_one_offer() {
    let mut h = Harness::new(LoopbackEngine::immediate());

    h.join("cam-1", "Front door").await;
    h.join("cam-2", "Garage").await;
    h.settle(4).await;

    assert_eq!(h.state("cam-1"), Some(HandshakeState::OfferSent));
    assert_eq!(h.state("cam-2"), Some(HandshakeState::OfferSent));

    let mut targets: Vec<String> = h
        .offers()
        .iter()
        .map(|offer| offer["target"].as_str().unwrap().to_string())
        .collect();
    targets.sort();
    assert_eq!(targets, vec!["cam-1", "cam-2"]);

    for offer in h.offers() {
        assert_eq!(offer["payload"]["type"], "offer");
        assert!(offer["payload"]["sdp"]
            .as_str()
            .unwrap()
            .contains("a=end-of-candidates"));
    }

    let stats = h.coordinator.stats();
    assert_eq!(stats.sessions_created, 2);
    assert_eq!(stats.offers_sent, 2);
    assert_eq!(stats.active_sessions, 2);
    assert_eq!(stats.directory_size, 2);
}

#[tokio::test]
async fn test_duplicate_join_is_idempotent() {
    let mut h = Harness::new(LoopbackEngine::immediate());
    let cam = SourceId::from("cam-1");

    h.join("cam-1", "Front door").await;
    h.join("cam-1", "Renamed").await;
    h.settle(2).await;

    assert_eq!(h.engine.sessions_created(&cam), 1);
    assert_eq!(h.coordinator.directory().len(), 1);
    assert_eq!(h.coordinator.directory().name_of(&cam), Some("Front door"));
    assert_eq!(h.offers().len(), 1);
    assert_eq!(h.coordinator.stats().sessions_created, 1);
}

#[tokio::test]
async fn test_orphan_answer_is_ignored() {
    let mut h = Harness::new(LoopbackEngine::immediate());

    h.answer("cam-9", answer_payload()).await;

    assert!(h.coordinator.sessions().is_empty());
    assert!(h.coordinator.directory().is_empty());
    assert!(h.remote.sent().is_empty());
    assert_eq!(h.coordinator.stats().orphan_answers, 1);
}

#[tokio::test]
async fn test_source_left_removes_session_and_entry() {
    let mut h = Harness::new(LoopbackEngine::immediate());
    let cam = SourceId::from("cam-1");

    h.join("cam-1", "Front door").await;
    h.settle(2).await;
    h.inbound(EVENT_SOURCE_LEFT, json!({ "id": "cam-1" })).await;

    assert!(h.state("cam-1").is_none());
    assert!(!h.coordinator.directory().contains(&cam));
    assert!(h.engine.is_closed(&cam));
    assert_eq!(h.coordinator.stats().sessions_closed, 1);

    // Leaving twice is harmless
    h.inbound(EVENT_SOURCE_LEFT, json!({ "id": "cam-1" })).await;
    assert_eq!(h.coordinator.stats().sessions_closed, 1);
}

#[tokio::test]
async fn test_snapshot_populates_directory_only() {
    let mut h = Harness::new(LoopbackEngine::immediate());

    h.inbound(
        EVENT_SNAPSHOT,
        json!([
            { "id": "cam-1", "name": "Front door" },
            { "id": "cam-2", "name": "Garage" },
        ]),
    )
    .await;

    let directory = h.coordinator.directory();
    assert_eq!(directory.len(), 2);
    assert_eq!(directory.name_of(&"cam-2".into()), Some("Garage"));
    assert!(h.coordinator.sessions().is_empty());

    // Snapshots add, they never remove
    h.inbound(EVENT_SNAPSHOT, json!([{ "id": "cam-3", "name": "Yard" }]))
        .await;
    assert_eq!(h.coordinator.directory().len(), 3);
    assert!(h.offers().is_empty());
}

#[tokio::test]
async fn test_snapshot_connects_when_enabled() {
    let config = CoordinatorConfig::default()
        .identity("viewer-1")
        .connect_on_snapshot(true);
    let mut h = Harness::with_config(LoopbackEngine::immediate(), config);

    h.inbound(
        EVENT_SNAPSHOT,
        json!([
            { "id": "cam-1", "name": "Front door" },
            { "id": "cam-2", "name": "Garage" },
        ]),
    )
    .await;
    h.settle(4).await;

    assert_eq!(h.state("cam-1"), Some(HandshakeState::OfferSent));
    assert_eq!(h.state("cam-2"), Some(HandshakeState::OfferSent));
    assert_eq!(h.offers().len(), 2);
}

#[tokio::test]
async fn test_answer_applied_exactly_once() {
    let mut h = Harness::new(LoopbackEngine::immediate());
    let cam = SourceId::from("cam-1");

    h.join("cam-1", "Front door").await;
    h.settle(2).await;

    h.answer("cam-1", answer_payload()).await;
    h.answer("cam-1", answer_payload()).await;

    assert_eq!(h.state("cam-1"), Some(HandshakeState::Answered));
    assert_eq!(h.engine.remote_descriptions(&cam).len(), 1);

    let session = h.coordinator.session(&cam).unwrap();
    assert_eq!(session.remote_description.as_ref().unwrap().sdp, ANSWER_SDP);
    assert!(session.answered_at.is_some());

    let stats = h.coordinator.stats();
    assert_eq!(stats.answers_applied, 1);
    assert_eq!(stats.duplicate_answers, 1);
}

#[tokio::test]
async fn test_stringified_answer_accepted() {
    let mut h = Harness::new(LoopbackEngine::immediate());

    h.join("cam-1", "Front door").await;
    h.settle(2).await;
    h.answer("cam-1", Value::String(answer_payload().to_string()))
        .await;

    assert_eq!(h.state("cam-1"), Some(HandshakeState::Answered));
}

#[tokio::test]
async fn test_answer_before_offer_is_discarded() {
    let mut h = Harness::new(LoopbackEngine::manual());
    let cam = SourceId::from("cam-1");

    h.join("cam-1", "Front door").await;
    h.settle(1).await;
    assert_eq!(h.state("cam-1"), Some(HandshakeState::GatheringCandidates));

    h.answer("cam-1", answer_payload()).await;

    assert_eq!(h.state("cam-1"), Some(HandshakeState::GatheringCandidates));
    assert!(h.engine.remote_descriptions(&cam).is_empty());

    // The handshake still completes normally afterwards
    assert!(h.engine.complete_gathering(&cam));
    h.settle(1).await;
    h.answer("cam-1", answer_payload()).await;
    assert_eq!(h.state("cam-1"), Some(HandshakeState::Answered));
}

#[tokio::test]
async fn test_leave_during_gathering_sends_no_offer() {
    let mut h = Harness::new(LoopbackEngine::manual());
    let cam = SourceId::from("cam-2");

    h.join("cam-2", "Back door").await;
    h.settle(1).await;
    assert_eq!(h.state("cam-2"), Some(HandshakeState::GatheringCandidates));

    h.inbound(EVENT_SOURCE_LEFT, json!({ "id": "cam-2" })).await;

    // Gathering finishing late reaches nobody
    assert!(!h.engine.complete_gathering(&cam));
    let late = tokio::time::timeout(
        Duration::from_millis(50),
        h.coordinator.process_next_session_event(),
    )
    .await;
    assert!(late.is_err());

    assert!(h.offers().is_empty());
    assert!(h.state("cam-2").is_none());
    assert!(!h.coordinator.directory().contains(&cam));
}

#[tokio::test]
async fn test_rejoin_starts_fresh_session() {
    let mut h = Harness::new(LoopbackEngine::manual());
    let cam = SourceId::from("cam-1");

    h.join("cam-1", "Front door").await;
    let first = h.coordinator.session(&cam).unwrap().session_id;
    h.inbound(EVENT_SOURCE_LEFT, json!({ "id": "cam-1" })).await;

    h.join("cam-1", "Front door").await;
    let second = h.coordinator.session(&cam).unwrap().session_id;
    assert_ne!(first, second);
    assert_eq!(h.engine.sessions_created(&cam), 2);

    // Whatever the first session reported before it was aborted is dropped
    h.coordinator.process_pending_session_events().await;
    assert!(matches!(
        h.state("cam-1"),
        Some(HandshakeState::LocalDescribing) | Some(HandshakeState::GatheringCandidates)
    ));

    assert!(h.engine.complete_gathering(&cam));
    while h.state("cam-1") != Some(HandshakeState::OfferSent) {
        h.settle(1).await;
    }
    assert_eq!(h.offers().len(), 1);
}

#[tokio::test]
async fn test_failure_is_isolated() {
    let engine = LoopbackEngine::immediate();
    engine.fail_offers_for("cam-bad");
    let mut h = Harness::new(engine);

    h.join("cam-bad", "Broken").await;
    h.join("cam-good", "Working").await;
    h.settle(3).await;

    assert!(h.state("cam-bad").is_none());
    assert_eq!(h.state("cam-good"), Some(HandshakeState::OfferSent));

    // A failed camera stays listed
    assert!(h.coordinator.directory().contains(&"cam-bad".into()));
    assert_eq!(h.coordinator.stats().sessions_failed, 1);
    assert_eq!(h.offers().len(), 1);
}

#[tokio::test]
async fn test_malformed_answer_fails_session() {
    let mut h = Harness::new(LoopbackEngine::immediate());
    let cam = SourceId::from("cam-1");

    h.join("cam-1", "Front door").await;
    h.settle(2).await;
    h.answer("cam-1", json!({ "type": "answer" })).await;

    assert!(h.state("cam-1").is_none());
    assert!(h.coordinator.directory().contains(&cam));
    assert!(h.engine.is_closed(&cam));
    assert!(h.engine.remote_descriptions(&cam).is_empty());
    assert_eq!(h.coordinator.stats().sessions_failed, 1);
}

#[tokio::test]
async fn test_rejected_answer_fails_session() {
    let engine = LoopbackEngine::immediate();
    engine.fail_remote_for("cam-1");
    let mut h = Harness::new(engine);

    h.join("cam-1", "Front door").await;
    h.settle(2).await;
    h.answer("cam-1", answer_payload()).await;

    assert!(h.state("cam-1").is_none());
    assert_eq!(h.coordinator.stats().answers_applied, 0);
    assert_eq!(h.coordinator.stats().sessions_failed, 1);
}

#[tokio::test]
async fn test_gathering_failure_fails_session() {
    let mut h = Harness::new(LoopbackEngine::manual());
    let cam = SourceId::from("cam-1");

    h.join("cam-1", "Front door").await;
    h.settle(1).await;
    assert!(h.engine.fail_gathering(&cam, "no interfaces"));
    h.settle(1).await;

    assert!(h.state("cam-1").is_none());
    assert!(h.offers().is_empty());
    assert!(h.coordinator.directory().contains(&cam));
}

#[tokio::test]
async fn test_unanswered_offer_times_out() {
    let config = CoordinatorConfig::default()
        .identity("viewer-1")
        .answer_timeout(Duration::from_secs(5));
    let mut h = Harness::with_config(LoopbackEngine::immediate(), config);

    h.join("cam-1", "Front door").await;
    h.settle(2).await;
    assert_eq!(h.state("cam-1"), Some(HandshakeState::OfferSent));

    let later = tokio::time::Instant::now() + Duration::from_secs(6);
    h.coordinator.sweep_timeouts_at(later).await;

    assert!(h.state("cam-1").is_none());
    assert_eq!(h.coordinator.stats().timeouts, 1);
}

#[tokio::test]
async fn test_answered_session_never_times_out() {
    let mut h = Harness::new(LoopbackEngine::immediate());

    h.join("cam-1", "Front door").await;
    h.settle(2).await;
    h.answer("cam-1", answer_payload()).await;

    let much_later = tokio::time::Instant::now() + Duration::from_secs(3600);
    h.coordinator.sweep_timeouts_at(much_later).await;

    assert_eq!(h.state("cam-1"), Some(HandshakeState::Answered));
}

#[tokio::test]
async fn test_tracks_reach_observer() {
    let engine = LoopbackEngine::immediate();
    let observer = Arc::new(RecordingObserver::default());
    let (channel, _remote) = MemoryChannel::new(16);
    let mut coordinator = SessionCoordinator::new(
        CoordinatorConfig::default(),
        Arc::new(channel),
        Arc::new(engine.clone()),
    )
    .with_observer(observer.clone());
    let cam = SourceId::from("cam-1");

    coordinator.on_source_joined(cam.clone(), "Front door").await;
    for _ in 0..2 {
        coordinator.process_next_session_event().await;
    }

    assert!(engine.push_track(&cam, TrackRef::video("v0").with_stream("s0")));
    coordinator.process_next_session_event().await;

    {
        let tracks = observer.tracks.lock().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].0, cam);
        assert_eq!(tracks[0].1.stream_id.as_deref(), Some("s0"));
    }

    coordinator.on_source_left(&cam).await;
    assert_eq!(*observer.ended.lock().unwrap(), vec![(cam, 1)]);
}

#[tokio::test]
async fn test_bad_messages_are_dropped() {
    let mut h = Harness::new(LoopbackEngine::immediate());

    h.inbound(EVENT_SOURCE_JOINED, json!({ "name": "No id" })).await;
    h.inbound("camera-rebooted", json!({ "id": "cam-1" })).await;

    assert!(h.coordinator.directory().is_empty());
    assert_eq!(h.coordinator.stats().malformed_messages, 1);
}

#[tokio::test]
async fn test_run_full_handshake() {
    let engine = LoopbackEngine::immediate();
    let (channel, remote) = MemoryChannel::new(64);
    let coordinator = SessionCoordinator::new(
        CoordinatorConfig::default().identity("viewer-1"),
        Arc::new(channel),
        Arc::new(engine.clone()),
    );
    let cam = SourceId::from("cam-1");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(coordinator.run_until(async {
        let _ = stop_rx.await;
    }));

    wait_for(|| !remote.sent_events(EVENT_JOIN).is_empty()).await;
    assert_eq!(
        remote.sent_events(EVENT_JOIN),
        vec![json!({ "type": "client", "id": "viewer-1" })]
    );

    tokio_test::assert_ok!(
        remote
            .deliver(EVENT_SOURCE_JOINED, json!({ "id": "cam-1", "name": "Front door" }))
            .await
    );
    wait_for(|| remote.sent_events(EVENT_OFFER).len() == 1).await;

    for _ in 0..2 {
        tokio_test::assert_ok!(
            remote
                .deliver(EVENT_ANSWER, json!({ "id": "cam-1", "payload": answer_payload() }))
                .await
        );
    }
    wait_for(|| engine.remote_descriptions(&cam).len() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(engine.remote_descriptions(&cam).len(), 1);
    assert_eq!(remote.sent_events(EVENT_OFFER).len(), 1);

    stop_tx.send(()).unwrap();
    let result = task.await.unwrap();
    tokio_test::assert_ok!(result);

    // Shutdown releases every session
    assert!(engine.is_closed(&cam));
}

#[tokio::test]
async fn test_run_resets_on_disconnect() {
    let engine = LoopbackEngine::immediate();
    let (channel, remote) = MemoryChannel::new(64);
    let coordinator = SessionCoordinator::new(
        CoordinatorConfig::default(),
        Arc::new(channel),
        Arc::new(engine.clone()),
    );
    let cam = SourceId::from("cam-1");

    let task = tokio::spawn(coordinator.run());

    remote
        .deliver(EVENT_SOURCE_JOINED, json!({ "id": "cam-1", "name": "Front door" }))
        .await
        .unwrap();
    wait_for(|| remote.sent_events(EVENT_OFFER).len() == 1).await;

    remote.disconnect().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("coordinator stops")
        .unwrap();

    assert!(matches!(
        result,
        Err(Error::Transport(TransportError::Disconnected))
    ));
    assert!(engine.is_closed(&cam));
}

#[tokio::test]
async fn test_run_stops_when_stream_ends() {
    let engine = LoopbackEngine::immediate();
    let (channel, remote) = MemoryChannel::new(64);
    let coordinator = SessionCoordinator::new(
        CoordinatorConfig::default(),
        Arc::new(channel),
        Arc::new(engine.clone()),
    );
    let cam = SourceId::from("cam-1");

    let task = tokio::spawn(coordinator.run());

    remote
        .deliver(EVENT_SOURCE_JOINED, json!({ "id": "cam-1", "name": "Front door" }))
        .await
        .unwrap();
    wait_for(|| remote.sent_events(EVENT_OFFER).len() == 1).await;

    remote.close();
    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("coordinator stops")
        .unwrap();

    assert!(matches!(result, Err(Error::Transport(TransportError::Closed))));
    assert!(engine.is_closed(&cam));
}

#[tokio::test]
async fn test_join_sent_before_early_events() {
    let engine = LoopbackEngine::immediate();
    let (channel, remote) = MemoryChannel::new(1);
    let coordinator = SessionCoordinator::new(
        CoordinatorConfig::default().identity("viewer-1"),
        Arc::new(channel),
        Arc::new(engine.clone()),
    );

    // The bus is already talking before the viewer connects
    remote
        .deliver(EVENT_SNAPSHOT, json!([{ "id": "cam-9", "name": "Attic" }]))
        .await
        .unwrap();
    remote
        .deliver(EVENT_SOURCE_JOINED, json!({ "id": "cam-1", "name": "Front door" }))
        .await
        .unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(coordinator.run_until(async {
        let _ = stop_rx.await;
    }));

    wait_for(|| remote.sent_events(EVENT_OFFER).len() == 1).await;

    let sent = remote.sent();
    assert_eq!(sent[0].event, EVENT_JOIN);
    assert_eq!(sent[0].payload, json!({ "type": "client", "id": "viewer-1" }));
    assert_eq!(sent[1].event, EVENT_OFFER);

    stop_tx.send(()).unwrap();
    tokio_test::assert_ok!(task.await.unwrap());
}

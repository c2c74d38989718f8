//! Loopback viewer
//!
//! Runs the coordinator against an in-process bus with a handful of
//! simulated cameras. Each camera answers the offer it receives and then
//! starts sending a video track.
//!
//! Run with: cargo run --example loopback_viewer [CAMERAS]
//!
//! Examples:
//!   cargo run --example loopback_viewer        # three cameras
//!   cargo run --example loopback_viewer 8      # eight cameras
//!
//! Set `RUST_LOG=camsignal=trace` to follow every handshake transition.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use camsignal::protocol::constants::{
    EVENT_ANSWER, EVENT_OFFER, EVENT_SNAPSHOT, EVENT_SOURCE_JOINED, EVENT_SOURCE_LEFT,
};
use camsignal::transport::{LoopbackEngine, MemoryChannel, MemoryRemote};
use camsignal::{CoordinatorConfig, MediaObserver, SessionCoordinator, SourceId, TrackRef};

/// Prints tracks as they arrive
struct PrintObserver;

impl MediaObserver for PrintObserver {
    fn on_track(&self, peer: &SourceId, track: &TrackRef) {
        println!("[{}] video track {} is live", peer, track.id);
    }

    fn on_session_ended(&self, peer: &SourceId, tracks: &[TrackRef]) {
        println!("[{}] session ended ({} tracks released)", peer, tracks.len());
    }
}

/// Answer every offer the viewer sends and start a track for it
async fn simulate_cameras(remote: MemoryRemote, engine: LoopbackEngine) {
    let mut answered = HashSet::new();

    loop {
        for offer in remote.sent_events(EVENT_OFFER) {
            let Some(target) = offer["target"].as_str() else {
                continue;
            };
            if !answered.insert(target.to_string()) {
                continue;
            }

            let sdp = format!(
                "v=0\r\no=- {} 2 IN IP4 10.0.0.2\r\ns=-\r\nt=0 0\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=sendonly\r\n",
                answered.len()
            );
            let answer = json!({
                "id": target,
                "payload": { "type": "answer", "sdp": sdp },
            });
            if remote.deliver(EVENT_ANSWER, answer).await.is_err() {
                return;
            }

            let track = TrackRef::video(format!("{}-video", target)).with_stream(target);
            engine.push_track(&SourceId::from(target), track);
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cameras: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 3,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camsignal=info".parse()?),
        )
        .init();

    let (channel, remote) = MemoryChannel::new(64);
    let engine = LoopbackEngine::immediate();

    let config = CoordinatorConfig::default()
        .identity("loopback-viewer")
        .answer_timeout(Duration::from_secs(5));
    let coordinator = SessionCoordinator::new(config, Arc::new(channel), Arc::new(engine.clone()))
        .with_observer(Arc::new(PrintObserver));

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let viewer = tokio::spawn(coordinator.run_until(async {
        let _ = stop_rx.await;
    }));
    let simulator = tokio::spawn(simulate_cameras(remote.clone(), engine));

    let roster: Vec<_> = (1..=cameras)
        .map(|n| json!({ "id": format!("cam-{}", n), "name": format!("Camera {}", n) }))
        .collect();
    remote.deliver(EVENT_SNAPSHOT, json!(roster)).await?;

    for entry in &roster {
        remote.deliver(EVENT_SOURCE_JOINED, entry.clone()).await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    remote
        .deliver(EVENT_SOURCE_LEFT, json!({ "id": "cam-1" }))
        .await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!(
        "{} offers sent, {} messages total",
        remote.sent_events(EVENT_OFFER).len(),
        remote.sent().len()
    );

    let _ = stop_tx.send(());
    viewer.await??;
    simulator.abort();

    Ok(())
}

//! Message-bus capability

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Events delivered by the message bus
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Connection to the bus is established
    Connected,
    /// A named event arrived
    Message { event: String, payload: Value },
    /// Connection to the bus was lost
    Disconnected,
}

impl TransportEvent {
    /// Convenience constructor for inbound messages
    pub fn message(event: impl Into<String>, payload: Value) -> Self {
        TransportEvent::Message {
            event: event.into(),
            payload,
        }
    }
}

/// Real-time message channel
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Open the channel
    ///
    /// The returned stream yields [`TransportEvent::Connected`] once the bus
    /// accepts us, followed by inbound events in arrival order.
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, TransportError>;

    /// Send a named event
    async fn send(&self, event: &str, payload: Value) -> Result<(), TransportError>;
}

//! Coordinator configuration

use std::time::Duration;

use crate::protocol::SourceId;
use crate::transport::NegotiationConfig;

/// Coordinator configuration options
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Identity announced to the bus (generated when `None`)
    pub identity: Option<SourceId>,

    /// Negotiation settings shared with every session
    pub negotiation: NegotiationConfig,

    /// Sessions still working towards an offer after this long are failed
    pub gathering_timeout: Duration,

    /// Sessions with an unanswered offer after this long are failed
    pub answer_timeout: Duration,

    /// How often deadlines are checked
    pub sweep_interval: Duration,

    /// Open sessions for every camera listed in a roster snapshot
    pub connect_on_snapshot: bool,

    /// Capacity of the session event channel
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            identity: None,
            negotiation: NegotiationConfig::default(),
            gathering_timeout: Duration::from_secs(10),
            answer_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(1),
            connect_on_snapshot: false,
            event_capacity: 256,
        }
    }
}

impl CoordinatorConfig {
    /// Use a fixed identity
    pub fn identity(mut self, id: impl Into<SourceId>) -> Self {
        self.identity = Some(id.into());
        self
    }

    /// Set negotiation settings
    pub fn negotiation(mut self, negotiation: NegotiationConfig) -> Self {
        self.negotiation = negotiation;
        self
    }

    /// Set gathering timeout
    pub fn gathering_timeout(mut self, timeout: Duration) -> Self {
        self.gathering_timeout = timeout;
        self
    }

    /// Set answer timeout
    pub fn answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout = timeout;
        self
    }

    /// Set sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Open sessions eagerly for snapshot entries
    pub fn connect_on_snapshot(mut self, enabled: bool) -> Self {
        self.connect_on_snapshot = enabled;
        self
    }

    /// Set session event channel capacity (minimum 1)
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

//! Session coordinator
//!
//! The coordinator is the single owner of the camera directory and the
//! session table. It consumes two streams of events and a timer:
//!
//! ```text
//!   SignalingChannel                       session tasks (one pair per camera)
//!   ┌──────────────┐                       ┌──────────────────────────────┐
//!   │ TransportEvt │                       │ negotiate()   forward_tracks()│
//!   └──────┬───────┘                       └──────┬───────────────┬───────┘
//!          │ inbound                              │ SessionEvent  │
//!          ▼                                      ▼               ▼
//!   ┌─────────────────────────────────────────────────────────────────────┐
//!   │                     SessionCoordinator::run_until                     │
//!   │   select! { inbound, session events, sweep ticker, shutdown }        │
//!   │                                                                     │
//!   │   directory: DirectoryRegistry      sessions: SessionTable          │
//!   └──────────────────────────────┬──────────────────────────────────────┘
//!                                  │ offer / new
//!                                  ▼
//!                           SignalingChannel
//! ```
//!
//! Session tasks never mutate shared state. They report back tagged with
//! the session generation, and the coordinator discards reports from a
//! session that has since been closed or replaced.

pub mod config;
pub mod router;
pub mod table;

pub use config::CoordinatorConfig;
pub use router::SessionCoordinator;
pub use table::{ActiveSession, SessionTable};

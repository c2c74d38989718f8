//! Camera directory
//!
//! The directory is the roster of cameras currently known to the bus. It is
//! kept apart from the negotiation sessions: a camera can be listed without
//! any media session (before it announces itself, or after its handshake
//! failed), and the coordinator is the only place where the two meet.

pub mod entry;
pub mod store;

pub use entry::DirectoryEntry;
pub use store::DirectoryRegistry;

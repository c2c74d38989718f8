//! Coordinator statistics

pub mod metrics;

pub use metrics::CoordinatorStats;

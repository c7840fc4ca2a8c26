//! Statistics and metrics

pub mod metrics;

pub use metrics::{BroadcastSnapshot, BroadcastStats, WriterSnapshot, WriterStats};

//! Statistics for the broadcast pipeline and the file writer
//!
//! Counters are atomics so the producer thread, the writer task and any
//! observer can share them through an `Arc` without locking. `snapshot()`
//! returns a plain copy for reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for `FrameBuffer::push`
#[derive(Debug)]
pub struct BroadcastStats {
    started_at: Instant,
    chunks_pushed: AtomicU64,
    bytes_pushed: AtomicU64,
    deliveries: AtomicU64,
    drops: AtomicU64,
    removals: AtomicU64,
}

impl BroadcastStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            chunks_pushed: AtomicU64::new(0),
            bytes_pushed: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            drops: AtomicU64::new(0),
            removals: AtomicU64::new(0),
        }
    }

    /// Record one pushed chunk and what happened to it
    pub fn record_push(&self, bytes: usize, delivered: usize, dropped: usize, removed: usize) {
        self.chunks_pushed.fetch_add(1, Ordering::Relaxed);
        self.bytes_pushed.fetch_add(bytes as u64, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.drops.fetch_add(dropped as u64, Ordering::Relaxed);
        self.removals.fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> BroadcastSnapshot {
        BroadcastSnapshot {
            chunks_pushed: self.chunks_pushed.load(Ordering::Relaxed),
            bytes_pushed: self.bytes_pushed.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for BroadcastStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`BroadcastStats`]
#[derive(Debug, Clone, Default)]
pub struct BroadcastSnapshot {
    /// Chunks handed to `push`
    pub chunks_pushed: u64,
    /// Bytes handed to `push`
    pub bytes_pushed: u64,
    /// Per-subscriber enqueues
    pub deliveries: u64,
    /// Per-subscriber drops on a full queue
    pub drops: u64,
    /// Subscribers removed because their receiver closed
    pub removals: u64,
    /// Time since the stats were created
    pub uptime: Duration,
}

impl BroadcastSnapshot {
    /// Producer bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_pushed * 8) / secs
        } else {
            0
        }
    }
}

/// Live counters for the rotating file writer
#[derive(Debug, Default)]
pub struct WriterStats {
    chunks_written: AtomicU64,
    bytes_written: AtomicU64,
    segments_opened: AtomicU64,
    folders_created: AtomicU64,
    sessions: AtomicU64,
    failed_connects: AtomicU64,
}

impl WriterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_chunk(&self, bytes: usize) {
        self.chunks_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_segment(&self) {
        self.segments_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_folder(&self) {
        self.folders_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_session(&self) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed_connect(&self) {
        self.failed_connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> WriterSnapshot {
        WriterSnapshot {
            chunks_written: self.chunks_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            segments_opened: self.segments_opened.load(Ordering::Relaxed),
            folders_created: self.folders_created.load(Ordering::Relaxed),
            sessions: self.sessions.load(Ordering::Relaxed),
            failed_connects: self.failed_connects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WriterStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterSnapshot {
    /// Chunks appended to segments
    pub chunks_written: u64,
    /// Bytes appended to segments
    pub bytes_written: u64,
    /// Segment files opened
    pub segments_opened: u64,
    /// Day folders entered (created or already present)
    pub folders_created: u64,
    /// Source sessions started
    pub sessions: u64,
    /// Connection attempts that failed
    pub failed_connects: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_stats_new() {
        let stats = BroadcastStats::new().snapshot();
        assert_eq!(stats.chunks_pushed, 0);
        assert_eq!(stats.bytes_pushed, 0);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.drops, 0);
        assert_eq!(stats.removals, 0);
    }

    #[test]
    fn test_broadcast_record_push() {
        let stats = BroadcastStats::new();
        stats.record_push(100, 3, 1, 0);
        stats.record_push(50, 2, 0, 1);

        let snap = stats.snapshot();
        assert_eq!(snap.chunks_pushed, 2);
        assert_eq!(snap.bytes_pushed, 150);
        assert_eq!(snap.deliveries, 5);
        assert_eq!(snap.drops, 1);
        assert_eq!(snap.removals, 1);
    }

    #[test]
    fn test_bitrate_zero_duration() {
        let snap = BroadcastSnapshot {
            bytes_pushed: 1_000_000,
            ..Default::default()
        };
        assert_eq!(snap.bitrate(), 0);
    }

    #[test]
    fn test_bitrate() {
        let snap = BroadcastSnapshot {
            bytes_pushed: 1_000_000,
            uptime: Duration::from_secs(10),
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(snap.bitrate(), 800_000);
    }

    #[test]
    fn test_writer_stats() {
        let stats = WriterStats::new();
        stats.record_session();
        stats.record_folder();
        stats.record_segment();
        stats.record_chunk(3);
        stats.record_chunk(3);
        stats.record_failed_connect();

        assert_eq!(
            stats.snapshot(),
            WriterSnapshot {
                chunks_written: 2,
                bytes_written: 6,
                segments_opened: 1,
                folders_created: 1,
                sessions: 1,
                failed_connects: 1,
            }
        );
    }
}

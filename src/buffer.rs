//! Frame buffer: the producer side of the pipeline
//!
//! The camera's encoder callback hands every output chunk to
//! [`FrameBuffer::push`], which queues it for each registered subscriber and
//! returns. It never waits on a consumer and never returns an error, so the
//! encoder thread cannot be stalled by a slow browser or a busy disk.

use std::sync::Arc;

use crate::camera::FrameSink;
use crate::registry::{BroadcastOutcome, Chunk, SubscriberRegistry};
use crate::stats::{BroadcastSnapshot, BroadcastStats};

/// Fan-out entry point for encoder output
pub struct FrameBuffer {
    registry: Arc<SubscriberRegistry>,
    stats: BroadcastStats,
}

impl FrameBuffer {
    /// Create a frame buffer broadcasting to `registry`
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            registry,
            stats: BroadcastStats::new(),
        }
    }

    /// The registry chunks are broadcast to
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Push one chunk to every current subscriber
    ///
    /// Safe to call from any thread, including non-runtime threads.
    /// Empty chunks are ignored.
    pub fn push(&self, chunk: impl Into<Chunk>) -> BroadcastOutcome {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return BroadcastOutcome::default();
        }

        let outcome = self.registry.broadcast(&chunk);
        self.stats.record_push(
            chunk.len(),
            outcome.delivered,
            outcome.dropped,
            outcome.removed,
        );

        tracing::trace!(
            bytes = chunk.len(),
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "Chunk pushed"
        );

        outcome
    }

    /// Current broadcast counters
    pub fn stats(&self) -> BroadcastSnapshot {
        self.stats.snapshot()
    }
}

impl FrameSink for FrameBuffer {
    fn write_chunk(&self, data: &[u8]) {
        self.push(Chunk::copy_from_slice(data));
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use bytes::Bytes;

    use super::*;
    use crate::registry::{RegistryConfig, SubscriberKind};

    #[test]
    fn test_push_without_subscribers() {
        let buffer = FrameBuffer::new(Arc::new(SubscriberRegistry::new()));

        let outcome = buffer.push(Bytes::from_static(b"AAA"));

        assert_eq!(outcome, BroadcastOutcome::default());
        assert_eq!(buffer.stats().chunks_pushed, 1);
    }

    #[test]
    fn test_empty_chunk_ignored() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut handle = registry.register(SubscriberKind::Recorder);
        let buffer = FrameBuffer::new(Arc::clone(&registry));

        buffer.push(Bytes::new());

        assert!(handle.try_recv().is_none());
        assert_eq!(buffer.stats().chunks_pushed, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_all_chunks_in_order() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut handle = registry.register(SubscriberKind::Recorder);
        let buffer = FrameBuffer::new(Arc::clone(&registry));

        for i in 0u8..100 {
            buffer.push(vec![i]);
        }

        for i in 0u8..100 {
            let chunk = handle.recv().await.unwrap();
            assert_eq!(chunk.data().as_ref(), &[i]);
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_contiguous_suffix() {
        let registry = Arc::new(SubscriberRegistry::new());
        let buffer = FrameBuffer::new(Arc::clone(&registry));

        buffer.push(vec![0u8]);
        buffer.push(vec![1u8]);
        let mut handle = registry.register(SubscriberKind::Recorder);
        buffer.push(vec![2u8]);
        buffer.push(vec![3u8]);
        registry.unregister(handle.id());
        buffer.push(vec![4u8]);

        let mut received = Vec::new();
        while let Some(chunk) = handle.recv().await {
            received.push(chunk.data()[0]);
        }
        assert_eq!(received, vec![2, 3]);
    }

    #[test]
    fn test_stalled_subscriber_does_not_block_push() {
        let registry = Arc::new(SubscriberRegistry::with_config(
            RegistryConfig::default().queue_capacity(4),
        ));
        let _stalled = registry.register(SubscriberKind::Other("stalled".into()));
        let buffer = FrameBuffer::new(Arc::clone(&registry));

        let start = Instant::now();
        for _ in 0..10_000 {
            buffer.push(Bytes::from_static(b"frame"));
        }

        assert!(start.elapsed() < Duration::from_secs(5));
        let stats = buffer.stats();
        assert_eq!(stats.deliveries, 4);
        assert_eq!(stats.drops, 9_996);
    }

    #[test]
    fn test_sink_from_foreign_thread() {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut handle = registry.register(SubscriberKind::Recorder);
        let buffer = Arc::new(FrameBuffer::new(Arc::clone(&registry)));

        let sink: Arc<dyn FrameSink> = buffer.clone();
        std::thread::spawn(move || sink.write_chunk(b"from-camera"))
            .join()
            .unwrap();

        assert_eq!(handle.try_recv().unwrap().data().as_ref(), b"from-camera");
    }
}

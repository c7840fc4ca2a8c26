//! Subscriber entry and handle types
//!
//! A [`SubscriberEntry`] is the registry's half of a subscription (the
//! sending side of a bounded queue plus counters). A [`SubscriberHandle`] is
//! the consumer's half.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::frame::{Chunk, SubscriberId, SubscriberKind};

/// Result of offering a chunk to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Chunk was queued for delivery
    Queued,
    /// Queue was full; chunk dropped. Carries the subscriber's total drops.
    Dropped(u64),
    /// Receiver is gone; the subscriber should be removed
    Closed,
}

/// Registry-side state for a single subscriber
pub struct SubscriberEntry {
    /// Subscriber identity
    pub id: SubscriberId,

    /// Kind of consumer
    pub kind: SubscriberKind,

    /// Bounded queue feeding the consumer task
    tx: mpsc::Sender<Chunk>,

    /// Chunks successfully queued
    queued: AtomicU64,

    /// Chunks dropped because the queue was full
    dropped: AtomicU64,

    /// When the subscriber registered
    pub registered_at: Instant,
}

impl SubscriberEntry {
    /// Create an entry and its matching handle
    pub(super) fn new(
        id: SubscriberId,
        kind: SubscriberKind,
        capacity: usize,
    ) -> (Self, SubscriberHandle) {
        let (tx, rx) = mpsc::channel(capacity);

        let entry = Self {
            id,
            kind: kind.clone(),
            tx,
            queued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            registered_at: Instant::now(),
        };

        let handle = SubscriberHandle { id, kind, rx };

        (entry, handle)
    }

    /// Try to queue a chunk without blocking
    pub(super) fn offer(&self, chunk: Chunk) -> Offer {
        match self.tx.try_send(chunk) {
            Ok(()) => {
                self.queued.fetch_add(1, Ordering::Relaxed);
                Offer::Queued
            }
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                Offer::Dropped(total)
            }
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    /// Whether the consumer has dropped its handle
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Snapshot of this subscriber's counters
    pub fn stats(&self) -> SubscriberStats {
        SubscriberStats {
            id: self.id,
            kind: self.kind.clone(),
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            pending: self.tx.max_capacity() - self.tx.capacity(),
            age: self.registered_at.elapsed(),
        }
    }
}

/// Consumer-side handle returned by `SubscriberRegistry::register`
///
/// Dropping the handle is equivalent to disconnecting: the next push notices
/// the closed queue and removes the subscriber.
#[derive(Debug)]
pub struct SubscriberHandle {
    id: SubscriberId,
    kind: SubscriberKind,
    rx: mpsc::Receiver<Chunk>,
}

impl SubscriberHandle {
    /// Identity of this subscription
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Kind this subscription was registered with
    pub fn kind(&self) -> &SubscriberKind {
        &self.kind
    }

    /// Wait for the next chunk
    ///
    /// Returns `None` once the subscriber has been unregistered (or closed)
    /// and every already-queued chunk has been drained.
    pub async fn recv(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }

    /// Take a queued chunk if one is ready
    pub fn try_recv(&mut self) -> Option<Chunk> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting new chunks
    ///
    /// Chunks already queued can still be drained with `recv`.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Counters for one subscriber
#[derive(Debug, Clone)]
pub struct SubscriberStats {
    /// Subscriber identity
    pub id: SubscriberId,
    /// Kind of consumer
    pub kind: SubscriberKind,
    /// Chunks queued for delivery
    pub queued: u64,
    /// Chunks dropped on a full queue
    pub dropped: u64,
    /// Chunks currently waiting in the queue
    pub pending: usize,
    /// Time since registration
    pub age: Duration,
}

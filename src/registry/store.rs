//! Subscriber registry implementation
//!
//! The set of live consumers and the fan-out over it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::config::RegistryConfig;
use super::entry::{Offer, SubscriberEntry, SubscriberHandle, SubscriberStats};
use super::frame::{Chunk, SubscriberId, SubscriberKind};

/// Outcome of broadcasting one chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Subscribers the chunk was queued for
    pub delivered: usize,
    /// Subscribers whose queue was full
    pub dropped: usize,
    /// Subscribers removed because their receiver was gone
    pub removed: usize,
}

/// Registry of live subscribers
///
/// Uses a std `RwLock` rather than an async one: the producer calls into
/// this from a non-async camera thread and the critical sections never
/// await. Broadcasting holds the read lock for the whole iteration, so
/// `register`/`unregister` cannot interleave with a fan-out.
pub struct SubscriberRegistry {
    /// Live subscribers keyed by id
    subscribers: RwLock<HashMap<SubscriberId, SubscriberEntry>>,

    /// Next id to hand out
    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl SubscriberRegistry {
    /// Create a registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    ///
    /// Zero capacity or drop-log interval set through the public fields is
    /// raised to 1.
    pub fn with_config(mut config: RegistryConfig) -> Self {
        config.queue_capacity = config.queue_capacity.max(1);
        config.drop_log_interval = config.drop_log_interval.max(1);

        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // A panic while holding the lock cannot leave the map half-updated, so
    // poisoning is ignored rather than propagated to the producer.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SubscriberId, SubscriberEntry>> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SubscriberId, SubscriberEntry>> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new subscriber
    ///
    /// The returned handle receives every chunk broadcast after this call
    /// returns.
    pub fn register(&self, kind: SubscriberKind) -> SubscriberHandle {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (entry, handle) = SubscriberEntry::new(id, kind, self.config.queue_capacity);

        let mut subscribers = self.write();
        subscribers.insert(id, entry);

        tracing::info!(
            subscriber_id = %id,
            kind = %handle.kind(),
            subscribers = subscribers.len(),
            "Subscriber registered"
        );

        handle
    }

    /// Unregister a subscriber
    ///
    /// Returns `true` if the subscriber was present. Calling this again for
    /// the same id is a no-op that returns `false`.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.write();

        match subscribers.remove(&id) {
            Some(entry) => {
                let stats = entry.stats();
                tracing::info!(
                    subscriber_id = %id,
                    kind = %entry.kind,
                    queued = stats.queued,
                    dropped = stats.dropped,
                    subscribers = subscribers.len(),
                    "Subscriber unregistered"
                );
                true
            }
            None => {
                tracing::debug!(subscriber_id = %id, "Unregister of unknown subscriber ignored");
                false
            }
        }
    }

    /// Queue a chunk for every registered subscriber
    ///
    /// Never blocks on a consumer. Full queues drop the chunk for that
    /// subscriber only; closed queues are removed after the iteration.
    pub fn broadcast(&self, chunk: &Chunk) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        let mut closed = Vec::new();

        {
            let subscribers = self.read();

            for entry in subscribers.values() {
                match entry.offer(chunk.clone()) {
                    Offer::Queued => outcome.delivered += 1,
                    Offer::Dropped(total) => {
                        outcome.dropped += 1;
                        if total == 1 || total % self.config.drop_log_interval == 0 {
                            tracing::warn!(
                                subscriber_id = %entry.id,
                                kind = %entry.kind,
                                dropped = total,
                                "Subscriber queue full, dropping chunk"
                            );
                        }
                    }
                    Offer::Closed => closed.push(entry.id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.write();
            for id in closed {
                if let Some(entry) = subscribers.remove(&id) {
                    outcome.removed += 1;
                    tracing::info!(
                        subscriber_id = %id,
                        kind = %entry.kind,
                        "Subscriber removed (receiver closed)"
                    );
                }
            }
        }

        outcome
    }

    /// Remove every subscriber whose handle has been dropped
    pub fn prune_closed(&self) -> usize {
        let mut subscribers = self.write();
        let before = subscribers.len();
        subscribers.retain(|_, entry| !entry.is_closed());
        before - subscribers.len()
    }

    /// Whether a subscriber is currently registered
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.read().contains_key(&id)
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.read().len()
    }

    /// Counters for one subscriber
    pub fn subscriber_stats(&self, id: SubscriberId) -> Option<SubscriberStats> {
        self.read().get(&id).map(SubscriberEntry::stats)
    }

    /// Counters for every subscriber, ordered by id
    pub fn subscribers(&self) -> Vec<SubscriberStats> {
        let mut stats: Vec<_> = self.read().values().map(SubscriberEntry::stats).collect();
        stats.sort_by_key(|s| s.id);
        stats
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

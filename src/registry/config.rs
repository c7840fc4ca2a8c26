//! Registry configuration

/// Default number of chunks a subscriber may have queued before drops start
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Configuration for the subscriber registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Per-subscriber queue capacity in chunks
    ///
    /// When a subscriber's queue is full, new chunks are dropped for that
    /// subscriber only.
    pub queue_capacity: usize,

    /// Log a drop warning on the first drop and then every N drops
    pub drop_log_interval: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drop_log_interval: 100,
        }
    }
}

impl RegistryConfig {
    /// Set the per-subscriber queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the drop warning interval (at least 1)
    pub fn drop_log_interval(mut self, interval: u64) -> Self {
        self.drop_log_interval = interval.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.drop_log_interval, 100);
    }

    #[test]
    fn test_queue_capacity_floor() {
        let config = RegistryConfig::default().queue_capacity(0);
        assert_eq!(config.queue_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .queue_capacity(8)
            .drop_log_interval(10);

        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.drop_log_interval, 10);
    }
}

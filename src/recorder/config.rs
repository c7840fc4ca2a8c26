//! Recorder configuration

use std::path::PathBuf;

use super::retry::RetryPolicy;

/// Configuration for the rotating file writer
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Root directory holding one folder per day
    pub root_dir: PathBuf,

    /// Segment file extension (without the dot)
    pub extension: String,

    /// Reconnect policy for the writer's chunk source
    pub retry: RetryPolicy,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("h264videos"),
            extension: "h264".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RecorderConfig {
    /// Create a config recording under `root_dir`
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Set the root directory
    pub fn root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    /// Set the segment file extension
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Set the reconnect policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecorderConfig::default();
        assert_eq!(config.root_dir, PathBuf::from("h264videos"));
        assert_eq!(config.extension, "h264");
        assert!(config.retry.max_attempts.is_none());
    }

    #[test]
    fn test_extension_strips_dot() {
        let config = RecorderConfig::with_root("/tmp/rec").extension(".264");
        assert_eq!(config.extension, "264");
        assert_eq!(config.root_dir, PathBuf::from("/tmp/rec"));
    }
}

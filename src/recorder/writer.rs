//! Rotating file writer
//!
//! Persists the chunk stream into day folders and per-session segment files.
//!
//! # Rotation
//!
//! ```text
//!  chunk ──► clock.now() ──► date changed? ──yes──► mkdir -p {root}/{date}
//!                                 │                 close open segment
//!                                 ▼
//!                          segment open? ──no──► open {date}/{HH-MM-SS}.h264
//!                                 │
//!                                 ▼
//!                            append + flush
//! ```
//!
//! Every session (each connect of the chunk source) starts a new segment, so
//! the layout holds exactly one file per session per day. A closed segment is
//! never written again by this writer unless a later segment is opened in the
//! same second, in which case the names collide and the later one appends.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::registry::Chunk;
use crate::stats::{WriterSnapshot, WriterStats};

use super::clock::{Clock, SystemClock};
use super::config::RecorderConfig;
use super::segment::{day_folder_name, segment_file_name, Segment, SegmentSummary};
use super::source::ChunkSource;

/// Persists chunks to `{root}/{YYYY-MM-DD}/{HH-MM-SS}.{ext}`
pub struct RotatingFileWriter {
    config: RecorderConfig,
    clock: Arc<dyn Clock>,
    stats: Arc<WriterStats>,
    current_date: Option<NaiveDate>,
    current_folder: Option<PathBuf>,
    segment: Option<Segment>,
}

impl RotatingFileWriter {
    /// Create a writer using the system clock
    pub fn new(config: RecorderConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a writer reading time from `clock`
    pub fn with_clock(config: RecorderConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            stats: Arc::new(WriterStats::new()),
            current_date: None,
            current_folder: None,
            segment: None,
        }
    }

    /// Shared handle to the writer's counters
    pub fn stats_handle(&self) -> Arc<WriterStats> {
        Arc::clone(&self.stats)
    }

    /// Current counter values
    pub fn stats(&self) -> WriterSnapshot {
        self.stats.snapshot()
    }

    /// Day folder chunks currently go to
    pub fn current_folder(&self) -> Option<&Path> {
        self.current_folder.as_deref()
    }

    /// Path of the open segment
    pub fn current_segment(&self) -> Option<&Path> {
        self.segment.as_ref().map(Segment::path)
    }

    /// Append one chunk, rotating folder and segment as needed
    pub async fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let now = self.clock.now();
        let date = now.date();

        if self.current_date != Some(date) {
            let folder = self.config.root_dir.join(day_folder_name(date));
            tokio::fs::create_dir_all(&folder)
                .await
                .map_err(|e| Error::filesystem(&folder, e))?;

            tracing::info!(folder = %folder.display(), "Recording into day folder");
            self.stats.record_folder();
            self.current_date = Some(date);
            self.current_folder = Some(folder);

            if self.segment.is_some() {
                self.rotate().await?;
            }
        }

        let segment = match &mut self.segment {
            Some(segment) => segment,
            slot @ None => {
                let folder = self
                    .current_folder
                    .as_ref()
                    .ok_or_else(|| Error::Config("no day folder".into()))?;
                // the folder may have been moved away since the date check
                tokio::fs::create_dir_all(folder)
                    .await
                    .map_err(|e| Error::filesystem(folder, e))?;
                let path = folder.join(segment_file_name(now, &self.config.extension));
                let segment = Segment::open(path, now).await?;

                tracing::info!(path = %segment.path().display(), "Segment opened");
                self.stats.record_segment();
                slot.insert(segment)
            }
        };

        if let Err(e) = segment.append(chunk.data()).await {
            // a half-written segment is abandoned; the next chunk opens a new one
            self.segment = None;
            return Err(e);
        }

        self.stats.record_chunk(chunk.len());
        Ok(())
    }

    /// Close the open segment, if any
    ///
    /// The next chunk opens a fresh segment.
    pub async fn rotate(&mut self) -> Result<Option<SegmentSummary>> {
        let Some(segment) = self.segment.take() else {
            return Ok(None);
        };

        let summary = segment.close().await?;
        tracing::info!(
            path = %summary.path.display(),
            bytes = summary.bytes,
            chunks = summary.chunks,
            "Segment closed"
        );
        Ok(Some(summary))
    }

    /// Close any open segment, logging instead of failing
    async fn finish_segment(&mut self) {
        if let Err(e) = self.rotate().await {
            tracing::error!(error = %e, "Failed to close segment");
        }
    }

    /// Record from `source` until `shutdown` resolves
    ///
    /// Each connect of the source is a session with its own segment. When a
    /// session ends (source closed, connection lost, or a filesystem error)
    /// the writer waits according to its retry policy and reconnects. The
    /// backoff resets after any session that wrote at least one chunk.
    ///
    /// Shutdown only interrupts the wait for the next chunk. The source is
    /// then closed and every chunk it already holds is written before the
    /// segment is closed.
    ///
    /// Returns `Ok(())` on shutdown, or the last error once the policy's
    /// attempt limit is exhausted.
    pub async fn run_until<S, F>(&mut self, source: &mut S, shutdown: F) -> Result<()>
    where
        S: ChunkSource + ?Sized,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut backoff = self.config.retry.backoff();

        loop {
            let (written, end) = self.run_session(source, &mut shutdown).await;

            if written > 0 {
                backoff.reset();
            }

            let result = match end {
                SessionEnd::Shutdown => {
                    self.drain(source).await;
                    self.finish_segment().await;
                    tracing::info!("Recorder stopped");
                    return Ok(());
                }
                SessionEnd::Ended(result) => result,
            };

            let error = match result {
                Ok(()) => {
                    tracing::info!(source = %source.describe(), "Source ended, reconnecting");
                    Error::ConnectionLost(format!("{} ended", source.describe()))
                }
                Err(e @ Error::Filesystem { .. }) => {
                    tracing::error!(error = %e, "Recorder session failed");
                    e
                }
                Err(e) => {
                    tracing::warn!(source = %source.describe(), error = %e, "Recorder session lost");
                    e
                }
            };

            let Some(delay) = backoff.next_delay() else {
                tracing::error!(
                    attempts = backoff.attempts(),
                    error = %error,
                    "Recorder giving up"
                );
                return Err(error);
            };

            tracing::debug!(delay_ms = delay.as_millis() as u64, "Recorder retry scheduled");

            tokio::select! {
                _ = &mut shutdown => {
                    self.drain(source).await;
                    self.finish_segment().await;
                    tracing::info!("Recorder stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connect-and-drain cycle; returns chunks written and how it ended
    async fn run_session<S, F>(
        &mut self,
        source: &mut S,
        shutdown: &mut Pin<&mut F>,
    ) -> (u64, SessionEnd)
    where
        S: ChunkSource + ?Sized,
        F: Future<Output = ()>,
    {
        let connected = tokio::select! {
            _ = shutdown.as_mut() => return (0, SessionEnd::Shutdown),
            connected = source.connect() => connected,
        };

        if let Err(e) = connected {
            self.stats.record_failed_connect();
            return (0, SessionEnd::Ended(Err(e)));
        }

        self.stats.record_session();
        self.finish_segment().await;
        tracing::info!(source = %source.describe(), "Recorder session started");

        let mut written = 0;
        let result = loop {
            let next = tokio::select! {
                _ = shutdown.as_mut() => return (written, SessionEnd::Shutdown),
                next = source.next_chunk() => next,
            };

            match next {
                Ok(Some(chunk)) => match self.write_chunk(&chunk).await {
                    Ok(()) => written += 1,
                    Err(e) => break Err(e),
                },
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.finish_segment().await;
        (written, SessionEnd::Ended(result))
    }

    /// Write whatever the source still holds after shutdown
    async fn drain<S>(&mut self, source: &mut S)
    where
        S: ChunkSource + ?Sized,
    {
        source.close();

        let mut drained: u64 = 0;
        while let Some(chunk) = source.try_next_chunk() {
            if let Err(e) = self.write_chunk(&chunk).await {
                tracing::error!(error = %e, "Failed to write queued chunk on shutdown");
                break;
            }
            drained += 1;
        }

        if drained > 0 {
            tracing::debug!(chunks = drained, "Queued chunks written on shutdown");
        }
    }
}

/// How a session ended
enum SessionEnd {
    /// Shutdown fired while the session was waiting
    Shutdown,
    /// The source ended or failed
    Ended(Result<()>),
}

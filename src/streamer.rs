//! Streamer: wires the camera, relay and recorder together
//!
//! ```text
//!   Camera ──write_chunk──► FrameBuffer ──► SubscriberRegistry
//!                                              │
//!                      ┌───────────────────────┼──────────────────┐
//!                      ▼                       ▼                  ▼
//!               RelayServer /ws/         RelayServer /ws/   RotatingFileWriter
//!               (browser)                (browser)          (registry or relay)
//! ```
//!
//! Every collaborator is passed in explicitly; nothing is reachable through
//! globals.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::buffer::FrameBuffer;
use crate::camera::{Camera, EncoderOptions, FrameSink, Resolution};
use crate::error::Result;
use crate::recorder::{
    ChunkSource, RecorderConfig, RegistrySource, RetryPolicy, RotatingFileWriter, WebSocketSource,
};
use crate::registry::{RegistryConfig, SubscriberRegistry};
use crate::server::{RelayServer, ServerConfig};

/// How the recorder receives chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderSource {
    /// Subscribe to the registry directly
    #[default]
    Registry,
    /// Connect to the relay's own websocket, like any other client
    Relay,
}

/// Streamer configuration
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// Encoder parameters passed through to the camera
    pub h264_args: BTreeMap<String, String>,

    /// Resolution the camera encodes at
    pub streaming_resolution: Resolution,

    /// Target frame rate
    pub fps: u32,

    /// Relay port
    pub port: u16,

    /// Relay bind address
    pub bind_ip: IpAddr,

    /// Address advertised to browsers (None = discover)
    pub advertised_ip: Option<IpAddr>,

    /// Maximum concurrent websocket clients (0 = unlimited)
    pub max_connections: usize,

    /// Directory holding `index.js` and `static/`
    pub web_root: PathBuf,

    /// Recorder settings
    pub recorder: RecorderConfig,

    /// Where the recorder takes its chunks from
    pub recorder_source: RecorderSource,

    /// Subscriber queue settings
    pub registry: RegistryConfig,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            h264_args: BTreeMap::new(),
            streaming_resolution: Resolution::default(),
            fps: 30,
            port: 8000,
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            advertised_ip: None,
            max_connections: 0,
            web_root: PathBuf::from("web"),
            recorder: RecorderConfig::default(),
            recorder_source: RecorderSource::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl StreamerConfig {
    /// Add one encoder argument
    pub fn h264_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.h264_args.insert(key.into(), value.into());
        self
    }

    /// Set the streaming resolution
    pub fn streaming_resolution(mut self, resolution: Resolution) -> Self {
        self.streaming_resolution = resolution;
        self
    }

    /// Set the frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the relay port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the relay bind address
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the advertised address
    pub fn advertised_ip(mut self, ip: IpAddr) -> Self {
        self.advertised_ip = Some(ip);
        self
    }

    /// Set the maximum number of browser clients (0 = unlimited)
    ///
    /// The relay-mode recorder uses its own loopback endpoint and is not
    /// counted.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the web asset directory
    pub fn web_root(mut self, web_root: impl Into<PathBuf>) -> Self {
        self.web_root = web_root.into();
        self
    }

    /// Set the recordings root directory
    pub fn recordings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recorder.root_dir = dir.into();
        self
    }

    /// Set the recorder's chunk source
    pub fn recorder_source(mut self, source: RecorderSource) -> Self {
        self.recorder_source = source;
        self
    }

    /// Set the recorder's reconnect policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.recorder.retry = retry;
        self
    }

    /// Set the per-subscriber queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.registry = self.registry.queue_capacity(capacity);
        self
    }

    /// Relay server settings derived from this config
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::with_addr(SocketAddr::new(self.bind_ip, self.port))
            .max_connections(self.max_connections)
            .fps(self.fps)
            .web_root(self.web_root.clone());
        config.advertised_ip = self.advertised_ip;
        config
    }

    /// Encoder settings handed to the camera
    pub fn encoder_options(&self) -> EncoderOptions {
        EncoderOptions {
            h264_args: self.h264_args.clone(),
            resolution: self.streaming_resolution,
            fps: self.fps,
        }
    }
}

/// Streams a camera to browsers and to disk
pub struct Streamer<C: Camera> {
    camera: C,
    config: StreamerConfig,
    registry: Arc<SubscriberRegistry>,
    buffer: Arc<FrameBuffer>,
}

impl<C: Camera> Streamer<C> {
    /// Create a streamer for `camera`
    pub fn new(camera: C, config: StreamerConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::with_config(config.registry.clone()));
        let buffer = Arc::new(FrameBuffer::new(Arc::clone(&registry)));

        Self {
            camera,
            config,
            registry,
            buffer,
        }
    }

    /// Get a reference to the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// The buffer the camera writes into
    pub fn frame_buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    /// Run until `shutdown` resolves
    ///
    /// Fails only if the relay cannot bind or the camera cannot start. On
    /// shutdown the camera is stopped first, then the relay and recorder.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let server = RelayServer::bind(self.config.server_config(), Arc::clone(&self.registry)).await?;
        tracing::info!(
            url = %server.public_url(),
            resolution = %self.config.streaming_resolution,
            fps = self.config.fps,
            "Streamer started"
        );

        let writer = RotatingFileWriter::new(self.config.recorder.clone());
        let (writer_stop, writer_stop_rx) = oneshot::channel();
        let writer_task = match self.config.recorder_source {
            RecorderSource::Registry => spawn_writer(
                writer,
                RegistrySource::new(Arc::clone(&self.registry)),
                writer_stop_rx,
            ),
            RecorderSource::Relay => spawn_writer(
                writer,
                WebSocketSource::new(server.local_recorder_url()),
                writer_stop_rx,
            ),
        };

        let sink: Arc<dyn FrameSink> = self.buffer.clone();
        if let Err(e) = self
            .camera
            .start_recording(sink, &self.config.encoder_options())
        {
            tracing::error!(error = %e, "Camera failed to start");
            stop_writer(writer_stop, writer_task).await;
            return Err(e);
        }

        let result = server.serve_until(shutdown).await;

        if let Err(e) = self.camera.stop_recording() {
            tracing::warn!(error = %e, "Camera failed to stop cleanly");
        }
        self.camera.close();
        stop_writer(writer_stop, writer_task).await;

        let stats = self.buffer.stats();
        tracing::info!(
            chunks = stats.chunks_pushed,
            bytes = stats.bytes_pushed,
            drops = stats.drops,
            bitrate = stats.bitrate(),
            "Streamer stopped"
        );

        result
    }
}

fn spawn_writer<S>(
    mut writer: RotatingFileWriter,
    mut source: S,
    stop: oneshot::Receiver<()>,
) -> JoinHandle<Result<()>>
where
    S: ChunkSource + 'static,
{
    tokio::spawn(async move {
        writer
            .run_until(&mut source, async move {
                let _ = stop.await;
            })
            .await
    })
}

async fn stop_writer(stop: oneshot::Sender<()>, task: JoinHandle<Result<()>>) {
    let _ = stop.send(());
    match task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Recorder ended with error"),
        Err(e) => tracing::error!(error = %e, "Recorder task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct MockCamera {
        sink: Option<Arc<dyn FrameSink>>,
        stopped: Arc<AtomicBool>,
        fail_start: bool,
    }

    impl Camera for MockCamera {
        fn start_recording(
            &mut self,
            sink: Arc<dyn FrameSink>,
            options: &EncoderOptions,
        ) -> Result<()> {
            if self.fail_start {
                return Err(Error::Camera("no device".into()));
            }
            assert_eq!(options.resolution, Resolution::new(320, 240));
            self.sink = Some(sink);
            Ok(())
        }

        fn stop_recording(&mut self) -> Result<()> {
            self.stopped.store(true, Ordering::SeqCst);
            self.sink = None;
            Ok(())
        }
    }

    fn config(dir: &std::path::Path) -> StreamerConfig {
        StreamerConfig::default()
            .bind_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(0)
            .streaming_resolution(Resolution::new(320, 240))
            .recordings_dir(dir)
    }

    #[test]
    fn test_default_config() {
        let config = StreamerConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.fps, 30);
        assert_eq!(config.streaming_resolution, Resolution::new(640, 480));
        assert_eq!(config.recorder_source, RecorderSource::Registry);
        assert_eq!(config.recorder.root_dir, PathBuf::from("h264videos"));
    }

    #[test]
    fn test_derived_configs() {
        let config = StreamerConfig::default()
            .port(9000)
            .fps(15)
            .h264_arg("profile", "baseline")
            .advertised_ip("10.0.0.5".parse().unwrap());

        let server = config.server_config();
        assert_eq!(server.bind_addr.port(), 9000);
        assert_eq!(server.fps, 15);
        assert_eq!(server.advertised_ip, Some("10.0.0.5".parse().unwrap()));

        let encoder = config.encoder_options();
        assert_eq!(encoder.fps, 15);
        assert_eq!(encoder.h264_args.get("profile").map(String::as_str), Some("baseline"));
    }

    #[tokio::test]
    async fn test_camera_start_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let camera = MockCamera {
            fail_start: true,
            ..Default::default()
        };

        let err = Streamer::new(camera, config(dir.path()))
            .run_until(std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Camera(_)));
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let err = Streamer::new(MockCamera::default(), config(dir.path()).port(port))
            .run_until(std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Bind { .. }));
    }

    #[tokio::test]
    async fn test_run_records_and_stops_camera() {
        let dir = tempfile::tempdir().unwrap();
        let stopped = Arc::new(AtomicBool::new(false));
        let camera = MockCamera {
            stopped: Arc::clone(&stopped),
            ..Default::default()
        };

        let streamer = Streamer::new(camera, config(dir.path()));
        let buffer = Arc::clone(streamer.frame_buffer());
        let registry = Arc::clone(streamer.registry());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let running = tokio::spawn(streamer.run_until(async move {
            let _ = stop_rx.await;
        }));

        // the recorder is the only subscriber
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.subscriber_count() != 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        buffer.push(&b"AAA"[..]);
        buffer.push(&b"BBB"[..]);

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let total: u64 = walk(dir.path()).iter().map(|p| std::fs::metadata(p).unwrap().len()).sum();
                if total == 6 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();

        assert!(stopped.load(Ordering::SeqCst));
        let files = walk(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"AAABBB");
    }

    #[tokio::test]
    async fn test_stop_keeps_chunks_queued_for_recorder() {
        const CHUNKS: usize = 200;
        const CHUNK_SIZE: usize = 64 * 1024;

        let dir = tempfile::tempdir().unwrap();
        let streamer = Streamer::new(
            MockCamera::default(),
            config(dir.path()).queue_capacity(CHUNKS),
        );
        let buffer = Arc::clone(streamer.frame_buffer());
        let registry = Arc::clone(streamer.registry());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let running = tokio::spawn(streamer.run_until(async move {
            let _ = stop_rx.await;
        }));

        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.subscriber_count() != 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        for _ in 0..CHUNKS {
            let outcome = buffer.push(vec![7u8; CHUNK_SIZE]);
            assert_eq!(outcome.delivered, 1);
        }

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();

        let on_disk: u64 = walk(dir.path())
            .iter()
            .map(|p| std::fs::metadata(p).unwrap().len())
            .sum();
        assert_eq!(on_disk, (CHUNKS * CHUNK_SIZE) as u64);
    }

    #[tokio::test]
    async fn test_relay_recorder_does_not_take_client_slot() {
        let dir = tempfile::tempdir().unwrap();
        let port = {
            let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            reserved.local_addr().unwrap().port()
        };
        let streamer = Streamer::new(
            MockCamera::default(),
            config(dir.path())
                .port(port)
                .recorder_source(RecorderSource::Relay)
                .max_connections(1),
        );
        let buffer = Arc::clone(streamer.frame_buffer());
        let registry = Arc::clone(streamer.registry());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let running = tokio::spawn(streamer.run_until(async move {
            let _ = stop_rx.await;
        }));

        wait_for_subscribers(&registry, 1).await;
        assert_eq!(
            registry.subscribers()[0].kind,
            crate::registry::SubscriberKind::Recorder
        );

        let (_browser, _) =
            tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{}/ws/", port))
                .await
                .unwrap();
        wait_for_subscribers(&registry, 2).await;

        buffer.push(&b"shared"[..]);
        tokio::time::timeout(Duration::from_secs(5), async {
            while disk_bytes(dir.path()) != 6 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
    }

    async fn wait_for_subscribers(registry: &SubscriberRegistry, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.subscriber_count() != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn disk_bytes(dir: &std::path::Path) -> u64 {
        walk(dir).iter().map(|p| std::fs::metadata(p).unwrap().len()).sum()
    }

    fn walk(dir: &std::path::Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                files.extend(walk(&path));
            } else {
                files.push(path);
            }
        }
        files
    }
}

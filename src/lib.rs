//! # h264-relay
//!
//! Live H.264 camera relay with rotating on-disk recording.
//!
//! A camera encoder pushes raw H.264 chunks into a [`FrameBuffer`], which
//! fans them out to every registered subscriber without ever blocking the
//! encoder. Browsers subscribe through the [`RelayServer`] websocket; the
//! [`RotatingFileWriter`] subscribes too and stores the stream as
//! `h264videos/{YYYY-MM-DD}/{HH-MM-SS}.h264`.
//!
//! ## Quick start
//!
//! ```no_run
//! use h264_relay::{Camera, Streamer, StreamerConfig};
//!
//! # async fn run(camera: impl Camera + 'static) -> h264_relay::Result<()> {
//! let config = StreamerConfig::default().port(8000).fps(30);
//! Streamer::new(camera, config)
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod buffer;
pub mod camera;
pub mod error;
pub mod net;
pub mod recorder;
pub mod registry;
pub mod server;
pub mod stats;
pub mod streamer;

pub use buffer::FrameBuffer;
pub use camera::{Camera, EncoderOptions, FrameSink, Resolution};
pub use error::{Error, Result};
pub use recorder::{RecorderConfig, RetryPolicy, RotatingFileWriter};
pub use registry::{Chunk, RegistryConfig, SubscriberHandle, SubscriberKind, SubscriberRegistry};
pub use server::{RelayServer, ServerConfig};
pub use streamer::{RecorderSource, Streamer, StreamerConfig};

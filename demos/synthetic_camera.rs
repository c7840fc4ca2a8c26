//! Synthetic Camera - Streams generated H.264-shaped chunks through the relay
//!
//! Run with: cargo run --example synthetic_camera -- [port] [recordings_dir]
//!
//! Then open http://<ip>:<port>/index.html
//!
//! This example demonstrates:
//! - Implementing `Camera` with an encoder thread that calls `FrameSink`
//! - Running the relay and the rotating recorder through `Streamer`
//! - Graceful shutdown on Ctrl+C
//!
//! The chunks are Annex B framed (start code + NAL header + random payload)
//! so the recordings have the right shape, but they do not decode to a
//! picture. Plug in a real encoder to see video.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rand::RngCore;

use h264_relay::{Camera, EncoderOptions, Error, FrameSink, Result, Streamer, StreamerConfig};

/// Annex B start code
const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// NAL header bytes: IDR slice and non-IDR slice
const NAL_IDR: u8 = 0x65;
const NAL_SLICE: u8 = 0x41;

/// One keyframe every this many frames
const GOP: u64 = 30;

/// A camera that produces random slices at the configured frame rate
#[derive(Default)]
struct SyntheticCamera {
    running: Arc<AtomicBool>,
    encoder: Option<JoinHandle<()>>,
}

impl Camera for SyntheticCamera {
    fn start_recording(&mut self, sink: Arc<dyn FrameSink>, options: &EncoderOptions) -> Result<()> {
        if self.encoder.is_some() {
            return Err(Error::Camera("already recording".into()));
        }

        let fps = options.fps.max(1);
        let frame_interval = Duration::from_secs(1) / fps;
        // roughly 0.1 bits per pixel per frame
        let frame_size = (options.resolution.width * options.resolution.height / 80) as usize;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);

        let handle = std::thread::Builder::new()
            .name("synthetic-encoder".into())
            .spawn(move || {
                let mut rng = rand::thread_rng();
                let mut frame_number: u64 = 0;

                while running.load(Ordering::SeqCst) {
                    let keyframe = frame_number % GOP == 0;
                    let size = if keyframe { frame_size * 4 } else { frame_size };

                    let mut chunk = Vec::with_capacity(START_CODE.len() + 1 + size);
                    chunk.extend_from_slice(&START_CODE);
                    chunk.push(if keyframe { NAL_IDR } else { NAL_SLICE });
                    let payload_start = chunk.len();
                    chunk.resize(payload_start + size, 0);
                    rng.fill_bytes(&mut chunk[payload_start..]);

                    sink.write_chunk(&chunk);

                    frame_number += 1;
                    std::thread::sleep(frame_interval);
                }
            })
            .map_err(|e| Error::Camera(format!("failed to spawn encoder thread: {}", e)))?;

        self.encoder = Some(handle);
        tracing::info!(
            resolution = %options.resolution,
            fps = fps,
            "Synthetic camera recording"
        );
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.encoder.take() {
            handle
                .join()
                .map_err(|_| Error::Camera("encoder thread panicked".into()))?;
        }
        tracing::info!("Synthetic camera stopped");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("h264_relay=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port: u16 = match args.next() {
        Some(port) => port.parse()?,
        None => 8000,
    };
    let recordings_dir = args.next().unwrap_or_else(|| "h264videos".to_string());

    let config = StreamerConfig::default()
        .port(port)
        .fps(30)
        .streaming_resolution("640x480".parse()?)
        .h264_arg("profile", "baseline")
        .recordings_dir(recordings_dir);

    println!("Synthetic camera relay");
    println!("======================");
    println!("Press Ctrl+C to stop");
    println!();

    Streamer::new(SyntheticCamera::default(), config)
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Ctrl+C received, shutting down");
        })
        .await?;

    Ok(())
}

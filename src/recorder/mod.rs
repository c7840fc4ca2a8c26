//! Rolling on-disk recording of the chunk stream
//!
//! The recorder is a permanent subscriber that writes raw H.264 into
//! `{root}/{YYYY-MM-DD}/{HH-MM-SS}.h264`. Its state (current day, open
//! segment) belongs to the writer task alone.
//!
//! - [`clock`]: wall-clock seam for folder and segment names
//! - [`segment`]: naming and the open segment file
//! - [`source`]: registry or websocket chunk sources
//! - [`retry`]: reconnect backoff
//! - [`writer`]: the rotation state machine and run loop

pub mod clock;
pub mod config;
pub mod retry;
pub mod segment;
pub mod source;
pub mod writer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RecorderConfig;
pub use retry::{Backoff, RetryPolicy};
pub use segment::{day_folder_name, segment_file_name, SegmentSummary};
pub use source::{ChunkSource, RegistrySource, WebSocketSource};
pub use writer::RotatingFileWriter;

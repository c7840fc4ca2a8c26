//! Camera seam
//!
//! Camera hardware and the H.264 encoder live outside this crate. A camera
//! implementation receives a [`FrameSink`] and writes each encoder output
//! chunk into it from whatever thread its encoder callback runs on.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Destination for raw encoder output
///
/// Implementations must return quickly: this is called on the encoder's
/// timing-sensitive thread.
pub trait FrameSink: Send + Sync {
    /// Accept one chunk of encoder output
    fn write_chunk(&self, data: &[u8]);
}

/// A capture source that can record H.264 into a [`FrameSink`]
pub trait Camera: Send {
    /// Start encoding and delivering chunks to `sink`
    fn start_recording(&mut self, sink: Arc<dyn FrameSink>, options: &EncoderOptions)
        -> Result<()>;

    /// Stop encoding; no further chunks are delivered after this returns
    fn stop_recording(&mut self) -> Result<()>;

    /// Release the capture device
    fn close(&mut self) {}
}

/// Output resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    /// Parse `"WxH"`, e.g. `"640x480"`
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::Config(format!("resolution must be WxH, got '{}'", s)))?;

        let parse = |part: &str| -> Result<u32> {
            match part.trim().parse::<u32>() {
                Ok(0) | Err(_) => Err(Error::Config(format!("invalid resolution '{}'", s))),
                Ok(v) => Ok(v),
            }
        };

        Ok(Self::new(parse(w)?, parse(h)?))
    }
}

/// Encoder parameters handed to the camera
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// Free-form H.264 encoder arguments (profile, bitrate, ...)
    pub h264_args: BTreeMap<String, String>,

    /// Resolution the encoder scales to
    pub resolution: Resolution,

    /// Target frame rate
    pub fps: u32,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            h264_args: BTreeMap::new(),
            resolution: Resolution::default(),
            fps: 30,
        }
    }
}

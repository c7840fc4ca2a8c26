//! Chunk and subscriber identity types
//!
//! This module defines the unit of delivery (a [`Chunk`]) and the types used
//! to identify who receives it.

use std::net::SocketAddr;

use bytes::Bytes;

/// One opaque unit of encoder output
///
/// Cheap to clone: every subscriber shares the same reference-counted
/// allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    data: Bytes,
}

impl Chunk {
    /// Create a chunk from anything convertible to `Bytes`
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Copy a borrowed slice into a new chunk
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Raw bytes of the chunk
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume the chunk, returning its bytes
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for Chunk {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl From<&'static [u8]> for Chunk {
    fn from(data: &'static [u8]) -> Self {
        Self {
            data: Bytes::from_static(data),
        }
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Unique identifier for a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl SubscriberId {
    /// Numeric value of the id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What kind of consumer sits behind a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberKind {
    /// A browser connected to the relay websocket
    WebSocket {
        /// Remote peer address
        peer: SocketAddr,
    },
    /// The rotating file writer
    Recorder,
    /// Anything else (tests, custom sinks)
    Other(String),
}

impl std::fmt::Display for SubscriberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriberKind::WebSocket { peer } => write!(f, "websocket({})", peer),
            SubscriberKind::Recorder => write!(f, "recorder"),
            SubscriberKind::Other(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_clone_shares_bytes() {
        let chunk = Chunk::new(vec![1u8, 2, 3]);
        let copy = chunk.clone();

        assert_eq!(chunk.data().as_ptr(), copy.data().as_ptr());
        assert_eq!(copy.len(), 3);
    }

    #[test]
    fn test_empty_chunk() {
        let chunk = Chunk::from(&b""[..]);
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_kind_display() {
        let peer: SocketAddr = "10.0.0.2:5555".parse().unwrap();
        assert_eq!(
            SubscriberKind::WebSocket { peer }.to_string(),
            "websocket(10.0.0.2:5555)"
        );
        assert_eq!(SubscriberKind::Recorder.to_string(), "recorder");
        assert_eq!(SubscriberId(7).to_string(), "sub-7");
    }
}

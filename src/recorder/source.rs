//! Where the writer gets its chunks from
//!
//! A [`ChunkSource`] is connected once per writer session and then drained
//! until it ends. Two sources exist:
//!
//! - [`RegistrySource`]: subscribes directly to the in-process registry.
//! - [`WebSocketSource`]: connects to a relay's `/ws/` endpoint, which also
//!   works for recording a relay running in another process.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{FutureExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{Error, Result};
use crate::registry::{Chunk, SubscriberHandle, SubscriberKind, SubscriberRegistry};

/// A reconnectable stream of chunks
#[async_trait]
pub trait ChunkSource: Send {
    /// Establish (or re-establish) the connection
    async fn connect(&mut self) -> Result<()>;

    /// Next chunk, `Ok(None)` when the source ended cleanly
    ///
    /// Must be cancel safe: the writer drops this future on shutdown.
    async fn next_chunk(&mut self) -> Result<Option<Chunk>>;

    /// Stop accepting new chunks; already-received ones stay readable
    fn close(&mut self) {}

    /// A chunk that is already available, without waiting
    ///
    /// Used to drain the source after `close`.
    fn try_next_chunk(&mut self) -> Option<Chunk> {
        None
    }

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Subscribes the writer to a [`SubscriberRegistry`] as a first-class subscriber
pub struct RegistrySource {
    registry: Arc<SubscriberRegistry>,
    handle: Option<SubscriberHandle>,
}

impl RegistrySource {
    /// Register immediately so no chunk pushed after this call is missed
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        let handle = registry.register(SubscriberKind::Recorder);
        Self {
            registry,
            handle: Some(handle),
        }
    }

    /// Current subscription, if registered
    pub fn subscriber_id(&self) -> Option<crate::registry::SubscriberId> {
        self.handle.as_ref().map(SubscriberHandle::id)
    }
}

#[async_trait]
impl ChunkSource for RegistrySource {
    async fn connect(&mut self) -> Result<()> {
        let still_registered = self
            .handle
            .as_ref()
            .map(|h| self.registry.contains(h.id()))
            .unwrap_or(false);

        if !still_registered {
            self.handle = Some(self.registry.register(SubscriberKind::Recorder));
        }
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| Error::ConnectionLost("recorder not registered".into()))?;

        match handle.recv().await {
            Some(chunk) => Ok(Some(chunk)),
            None => {
                self.handle = None;
                Err(Error::ConnectionLost("recorder unregistered".into()))
            }
        }
    }

    fn close(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.close();
        }
    }

    fn try_next_chunk(&mut self) -> Option<Chunk> {
        self.handle.as_mut()?.try_recv()
    }

    fn describe(&self) -> String {
        match self.subscriber_id() {
            Some(id) => format!("registry({})", id),
            None => "registry(unregistered)".to_string(),
        }
    }
}

impl Drop for RegistrySource {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.registry.unregister(handle.id());
        }
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reads chunks from a relay websocket, one binary message per chunk
pub struct WebSocketSource {
    url: String,
    stream: Option<WsStream>,
}

impl WebSocketSource {
    /// Create a source for `url` (e.g. `ws://127.0.0.1:8000/ws/`)
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
        }
    }

    /// Whether a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[async_trait]
impl ChunkSource for WebSocketSource {
    async fn connect(&mut self) -> Result<()> {
        self.stream = None;
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        tracing::debug!(url = %self.url, "Recorder websocket connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::ConnectionLost(format!("not connected to {}", self.url)))?;

        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(Chunk::from(data))),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(url = %self.url, ?frame, "Relay closed websocket");
                    self.stream = None;
                    return Ok(None);
                }
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(url = %self.url, len = text.len(), "Ignoring text message");
                }
                // ping/pong/raw frames
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(e.into());
                }
                None => {
                    self.stream = None;
                    return Ok(None);
                }
            }
        }
    }

    fn try_next_chunk(&mut self) -> Option<Chunk> {
        let stream = self.stream.as_mut()?;
        loop {
            // only frames already read off the socket
            match stream.next().now_or_never()? {
                Some(Ok(Message::Binary(data))) => return Some(Chunk::from(data)),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    self.stream = None;
                    return None;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    fn describe(&self) -> String {
        format!("websocket({})", self.url)
    }
}

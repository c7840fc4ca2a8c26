//! Per-client websocket relay
//!
//! One task per accepted websocket. It registers a subscriber, forwards
//! every chunk as one binary message in arrival order, and unregisters on
//! close, error or server shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::{watch, OwnedSemaphorePermit};

use crate::registry::{SubscriberKind, SubscriberRegistry};

/// Why a relay connection ended
#[derive(Debug)]
pub enum CloseReason {
    /// Client sent a close frame or the stream ended
    ClientClosed,
    /// Reading from the client failed
    ReadFailed(axum::Error),
    /// Sending a chunk failed
    SendFailed(axum::Error),
    /// Subscriber was removed from the registry
    Unregistered,
    /// Server is shutting down
    Shutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::ClientClosed => write!(f, "client closed"),
            CloseReason::ReadFailed(e) => write!(f, "read failed: {}", e),
            CloseReason::SendFailed(e) => write!(f, "send failed: {}", e),
            CloseReason::Unregistered => write!(f, "unregistered"),
            CloseReason::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// Relay chunks to one websocket client until it goes away
pub(crate) async fn relay_chunks(
    mut socket: WebSocket,
    peer: SocketAddr,
    kind: SubscriberKind,
    registry: Arc<SubscriberRegistry>,
    mut shutdown: watch::Receiver<bool>,
    _permit: Option<OwnedSemaphorePermit>,
) -> CloseReason {
    let mut handle = registry.register(kind);
    let id = handle.id();
    let mut sent: u64 = 0;

    let shutting_down = *shutdown.borrow();

    let reason = if shutting_down {
        CloseReason::Shutdown
    } else {
        loop {
            tokio::select! {
                chunk = handle.recv() => match chunk {
                    Some(chunk) => {
                        if let Err(e) = socket.send(Message::Binary(chunk.data().to_vec())).await {
                            break CloseReason::SendFailed(e);
                        }
                        sent += 1;
                    }
                    None => break CloseReason::Unregistered,
                },
                msg = socket.recv() => match msg {
                    Some(Ok(Message::Close(_))) | None => break CloseReason::ClientClosed,
                    Some(Err(e)) => break CloseReason::ReadFailed(e),
                    // no client->server payload semantics
                    Some(Ok(_)) => {}
                },
                _ = shutdown.changed() => break CloseReason::Shutdown,
            }
        }
    };

    // anything still queued is discarded
    registry.unregister(id);
    handle.close();

    match &reason {
        CloseReason::SendFailed(_) | CloseReason::ReadFailed(_) => {
            tracing::warn!(subscriber_id = %id, peer = %peer, sent, reason = %reason, "Relay connection failed");
        }
        _ => {
            tracing::debug!(subscriber_id = %id, peer = %peer, sent, reason = %reason, "Relay connection closed");
        }
    }

    if !matches!(reason, CloseReason::ClientClosed | CloseReason::SendFailed(_)) {
        let _ = socket.send(Message::Close(None)).await;
    }

    reason
}

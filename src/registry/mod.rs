//! Subscriber registry for chunk fan-out
//!
//! The registry tracks every live consumer of the camera stream and queues
//! each pushed chunk for all of them. Each subscriber owns a bounded
//! `tokio::sync::mpsc` queue drained by its own task, so a stalled consumer
//! only ever loses its own chunks.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SubscriberRegistry>
//!                   ┌─────────────────────────────┐
//!                   │ subscribers: RwLock<HashMap< │
//!                   │   SubscriberId,              │
//!                   │   SubscriberEntry { tx }     │
//!                   │ >>                           │
//!                   └──────────────┬──────────────┘
//!                                  │ try_send (never blocks)
//!        ┌─────────────────────────┼─────────────────────────┐
//!        ▼                         ▼                         ▼
//!  [websocket task]          [websocket task]          [file writer]
//!  handle.recv()             handle.recv()             handle.recv()
//! ```
//!
//! # Zero-Copy Design
//!
//! `Chunk` wraps `bytes::Bytes`, so queuing a chunk for N subscribers only
//! bumps a reference count.

pub mod config;
pub mod entry;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{SubscriberHandle, SubscriberStats};
pub use frame::{Chunk, SubscriberId, SubscriberKind};
pub use store::{BroadcastOutcome, SubscriberRegistry};

//! Live relay server
//!
//! HTTP surface of the streamer:
//!
//! | Path | Description |
//! |------|-------------|
//! | `/ws/` | Websocket; one binary message per chunk, server to client only |
//! | `/ws/recorder` | Same stream for a local recorder; loopback only, not limited |
//! | `/index.js` | Client script rendered with `$ip`, `$port`, `$fps` |
//! | `/*` | Static files from `{web_root}/static` |

pub mod config;
pub mod connection;
pub mod listener;
pub mod template;

pub use config::ServerConfig;
pub use connection::CloseReason;
pub use listener::{RelayServer, RECORDER_WS_PATH, WS_PATH};
pub use template::{ScriptParams, TemplateError};

//! Relay server listener
//!
//! Binds the HTTP listener and serves the websocket endpoint, the client
//! script and static assets with axum.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::net;
use crate::registry::{SubscriberKind, SubscriberRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::relay_chunks;
use crate::server::template::ScriptParams;

/// Websocket endpoint path
pub const WS_PATH: &str = "/ws/";

/// Websocket endpoint for a same-host recorder
///
/// Only accepts loopback peers and is not counted against
/// `max_connections`, so browsers cannot starve the recorder.
pub const RECORDER_WS_PATH: &str = "/ws/recorder";

/// Shared state passed to all request handlers
#[derive(Clone)]
struct RelayState {
    registry: Arc<SubscriberRegistry>,
    script: ScriptParams,
    script_path: PathBuf,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: watch::Receiver<bool>,
}

/// Websocket relay server
///
/// Created by [`RelayServer::bind`]; binding is the only step whose failure
/// is fatal. Once bound, per-client failures never stop the server.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<SubscriberRegistry>,
    listener: TcpListener,
    local_addr: SocketAddr,
    advertised_ip: IpAddr,
}

impl RelayServer {
    /// Bind the listening socket
    pub async fn bind(config: ServerConfig, registry: Arc<SubscriberRegistry>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let advertised_ip = match config.advertised_ip {
            Some(ip) => ip,
            None if local_addr.ip().is_unspecified() => net::local_ip().await,
            None => local_addr.ip(),
        };

        tracing::info!(addr = %local_addr, "Relay server listening");

        Ok(Self {
            config,
            registry,
            listener,
            local_addr,
            advertised_ip,
        })
    }

    /// Get a reference to the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address advertised to browsers
    pub fn advertised_ip(&self) -> IpAddr {
        self.advertised_ip
    }

    /// Page URL to print for users
    pub fn public_url(&self) -> String {
        format!(
            "http://{}/index.html",
            SocketAddr::new(self.advertised_ip, self.local_addr.port())
        )
    }

    /// Websocket URL as seen from the LAN
    pub fn ws_url(&self) -> String {
        format!(
            "ws://{}{}",
            SocketAddr::new(self.advertised_ip, self.local_addr.port()),
            WS_PATH
        )
    }

    /// Websocket URL reachable from this host
    pub fn local_ws_url(&self) -> String {
        let ip = if self.local_addr.ip().is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.local_addr.ip()
        };
        format!("ws://{}{}", SocketAddr::new(ip, self.local_addr.port()), WS_PATH)
    }

    /// Recorder websocket URL reachable from this host
    pub fn local_recorder_url(&self) -> String {
        let ip = if self.local_addr.ip().is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.local_addr.ip()
        };
        format!(
            "ws://{}{}",
            SocketAddr::new(ip, self.local_addr.port()),
            RECORDER_WS_PATH
        )
    }

    /// Values rendered into the client script
    pub fn script_params(&self) -> ScriptParams {
        ScriptParams {
            ip: self.advertised_ip,
            port: self.local_addr.port(),
            fps: self.config.fps,
        }
    }

    fn router(&self, shutdown: watch::Receiver<bool>) -> Router {
        let connection_semaphore = if self.config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(self.config.max_connections)))
        } else {
            None
        };

        let state = RelayState {
            registry: Arc::clone(&self.registry),
            script: self.script_params(),
            script_path: self.config.script_path(),
            connection_semaphore,
            shutdown,
        };

        Router::new()
            .route(WS_PATH, get(handle_websocket))
            .route(RECORDER_WS_PATH, get(handle_recorder_websocket))
            .route("/index.js", get(handle_script))
            .fallback_service(ServeDir::new(self.config.static_dir()))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Serve until the process ends
    pub async fn serve(self) -> Result<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves
    ///
    /// Open websocket connections are told to close when shutdown begins.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = self.router(shutdown_rx);

        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        };

        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await?;

        Ok(())
    }
}

/// Handles websocket upgrade requests to `/ws/`
async fn handle_websocket(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<RelayState>,
) -> Response {
    // Check connection limit
    let permit = if let Some(ref sem) = state.connection_semaphore {
        match sem.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(peer = %peer, "Connection rejected: limit reached");
                return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
            }
        }
    } else {
        None
    };

    tracing::debug!(peer = %peer, "New relay connection");

    ws.on_upgrade(move |socket| async move {
        let kind = SubscriberKind::WebSocket { peer };
        relay_chunks(socket, peer, kind, state.registry, state.shutdown, permit).await;
    })
}

/// Handles recorder upgrades to `/ws/recorder`, bypassing the connection limit
async fn handle_recorder_websocket(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<RelayState>,
) -> Response {
    if !peer.ip().is_loopback() {
        tracing::warn!(peer = %peer, "Recorder connection rejected: not loopback");
        return (StatusCode::FORBIDDEN, "recorder endpoint is local only").into_response();
    }

    tracing::debug!(peer = %peer, "New recorder connection");

    ws.on_upgrade(move |socket| async move {
        relay_chunks(socket, peer, SubscriberKind::Recorder, state.registry, state.shutdown, None)
            .await;
    })
}

/// Handles `/index.js`, rendering the script template on every request
async fn handle_script(State(state): State<RelayState>) -> Response {
    let template = match tokio::fs::read_to_string(&state.script_path).await {
        Ok(template) => template,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (StatusCode::NOT_FOUND, "index.js not found").into_response();
        }
        Err(e) => {
            tracing::error!(path = %state.script_path.display(), error = %e, "Failed to read script template");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state.script.render(&template) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/javascript")], body).into_response(),
        Err(e) => {
            tracing::error!(path = %state.script_path.display(), error = %e, "Failed to render script template");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

//! TCP and HTTP listener.
//!
//! TCP clients speak newline-delimited JSON frames carrying a `route` field;
//! frames from one connection are handled one after another, so a
//! connection's replies go out in request order. HTTP requests are routed by
//! path. Both kinds are handed to an [`ActivationHandler`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use bytes::Bytes;
use serde_json::json;
use tether_protocol::{ConnectionId, InboundFrame, Route, UserId};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ClientConnection;
use crate::http::{HttpRequest, HttpResponder};
use crate::runtime::{LocalRuntime, Outbound};

/// Implemented by the dispatcher: turns inbound traffic into activations.
pub trait ActivationHandler: Send + Sync + 'static {
    /// Handle one decoded TCP frame. `user_id` is the user currently bound
    /// to the connection, if any.
    fn on_tcp(
        &self,
        connection_id: ConnectionId,
        user_id: Option<UserId>,
        frame: InboundFrame,
    ) -> impl Future<Output = ()> + Send;

    /// Handle one HTTP request. The response is delivered through `responder`.
    fn on_http(
        &self,
        operation: String,
        request: HttpRequest,
        responder: HttpResponder,
    ) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Hostname to bind both listeners to
    pub hostname: String,
    /// TCP port (0 for OS-assigned)
    pub tcp_port: u16,
    /// HTTP port (0 for OS-assigned)
    pub http_port: u16,
    /// Maximum concurrent TCP connections
    pub max_connections: Option<usize>,
    /// Longest accepted TCP frame, delimiter included
    pub max_frame_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".into(),
            tcp_port: 9501,
            http_port: 8081,
            max_connections: Some(1024),
            max_frame_len: 1024 * 1024,
        }
    }
}

struct AppState<H: ActivationHandler> {
    handler: Arc<H>,
    runtime: Arc<LocalRuntime>,
    config: TransportConfig,
}

/// Running listeners. Dropping without [`TransportServer::stop`] leaves the
/// tasks running.
pub struct TransportServer {
    runtime: Arc<LocalRuntime>,
    shutdown_tx: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
    tcp_port: u16,
    http_port: u16,
}

impl TransportServer {
    pub async fn start<H: ActivationHandler>(
        config: TransportConfig,
        runtime: Arc<LocalRuntime>,
        handler: Arc<H>,
    ) -> Result<Self, TransportError> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tcp_addr: SocketAddr = format!("{}:{}", config.hostname, config.tcp_port).parse()?;
        let http_addr: SocketAddr = format!("{}:{}", config.hostname, config.http_port).parse()?;
        let tcp_listener = TcpListener::bind(tcp_addr).await?;
        let http_listener = TcpListener::bind(http_addr).await?;
        let tcp_port = tcp_listener.local_addr()?.port();
        let http_port = http_listener.local_addr()?.port();

        let state = Arc::new(AppState {
            handler,
            runtime: runtime.clone(),
            config: config.clone(),
        });

        let app = Router::new()
            .route("/health", get(health_handler::<H>))
            .fallback(http_handler::<H>)
            .with_state(state.clone());

        info!("TCP transport listening on {}:{tcp_port}", config.hostname);
        info!("HTTP transport listening on http://{}:{http_port}", config.hostname);

        let tcp_handle = tokio::spawn(accept_loop(tcp_listener, state, shutdown_rx.clone()));
        let mut http_shutdown = shutdown_rx;
        let http_handle = tokio::spawn(async move {
            axum::serve(http_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown.changed().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            runtime,
            shutdown_tx: Some(shutdown_tx),
            handles: vec![tcp_handle, http_handle],
            tcp_port,
            http_port,
        })
    }

    pub fn tcp_port(&self) -> u16 {
        self.tcp_port
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn runtime(&self) -> &Arc<LocalRuntime> {
        &self.runtime
    }

    /// Stop accepting, close every TCP connection and wait for the listeners.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        self.runtime.close_all();
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!("Transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TCP
// ─────────────────────────────────────────────────────────────────────────────

async fn accept_loop<H: ActivationHandler>(
    listener: TcpListener,
    state: Arc<AppState<H>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        if let Some(max) = state.config.max_connections {
                            if state.runtime.connection_count() >= max {
                                warn!("Connection from {peer} rejected: max connections reached ({max})");
                                continue;
                            }
                        }
                        tokio::spawn(handle_tcp_connection(stream, peer, state.clone()));
                    }
                    Err(e) => warn!("Accept failed: {e}"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("TCP accept loop finished");
}

async fn handle_tcp_connection<H: ActivationHandler>(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AppState<H>>,
) {
    let (id, mut outbound_rx) = state.runtime.register();
    let mut client = ClientConnection::new(id, peer);
    info!(connection_id = id, %peer, "Client connected");

    let (read_half, mut write_half) = stream.into_split();
    let mut writer = tokio::spawn(async move {
        while let Some(item) = outbound_rx.recv().await {
            match item {
                Outbound::Frame(frame) => {
                    if let Err(e) = write_half.write_all(&frame).await {
                        warn!(connection_id = id, "Write failed: {e}");
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }
        let _ = write_half.shutdown().await;
    });
    let mut writer_done = false;

    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();
    // One byte past the limit is enough to tell an oversized frame apart.
    let read_limit = state.config.max_frame_len as u64 + 1;
    loop {
        line.clear();
        let mut limited = (&mut reader).take(read_limit);
        tokio::select! {
            read = limited.read_until(b'\n', &mut line) => {
                match read {
                    Ok(0) => {
                        debug!(connection_id = id, "Client closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(connection_id = id, "Read failed: {e}");
                        break;
                    }
                }
            }
            _ = &mut writer => {
                writer_done = true;
                debug!(connection_id = id, "Connection closed by server");
                break;
            }
        }

        if line.len() > state.config.max_frame_len {
            warn!(connection_id = id, len = line.len(), "Frame too large, closing");
            break;
        }
        let body = line.trim_ascii_end();
        if body.is_empty() {
            continue;
        }
        client.touch();

        match InboundFrame::from_slice(body) {
            Ok(frame) => {
                let user_id = state.runtime.user_of(id);
                state.handler.on_tcp(id, user_id, frame).await;
            }
            Err(e) => warn!(connection_id = id, "Dropping malformed frame: {e}"),
        }
    }

    // Dropping the queue lets the writer flush what is left and exit.
    state.runtime.deregister(id);
    if !writer_done {
        let _ = writer.await;
    }
    info!(
        connection_id = id,
        frames = client.frames,
        uptime_ms = client.uptime().as_millis() as u64,
        "Client disconnected (total: {})",
        state.runtime.connection_count()
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

async fn http_handler<H: ActivationHandler>(
    State(state): State<Arc<AppState<H>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let operation = Route::operation_from_path(uri.path()).to_string();
    let request = HttpRequest {
        method,
        uri,
        headers,
        body,
    };
    let (responder, rx) = HttpResponder::channel();
    state.handler.on_http(operation, request, responder).await;

    match rx.await {
        Ok(reply) => reply.into_response(),
        Err(_) => {
            warn!("Activation finished without an HTTP response");
            (StatusCode::INTERNAL_SERVER_ERROR, "no response").into_response()
        }
    }
}

async fn health_handler<H: ActivationHandler>(
    State(state): State<Arc<AppState<H>>>,
) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "connections": state.runtime.connection_count(),
    }))
}

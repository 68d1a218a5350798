//! `LinkraceServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → room.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use linkrace_protocol::JsonCodec;
use linkrace_room::{ChatLogic, HistoryStore, RaceLogic, RoomConfig, RoomManager};
use linkrace_transport::{PendingConnection, PendingWebSocket, Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::LinkraceError;
use crate::handler::handle_connection;

/// Default limit for a peer to complete the WebSocket upgrade.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared server state passed to each connection handler task.
///
/// The managers are only locked to look up or activate a room; handlers
/// talk to room actors through their cached handles.
pub(crate) struct ServerState<S> {
    pub(crate) races: Mutex<RoomManager<RaceLogic, S>>,
    pub(crate) chats: Mutex<RoomManager<ChatLogic, S>>,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a linkrace server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use linkrace::prelude::*;
///
/// # async fn run() -> Result<(), LinkraceError> {
/// let server = LinkraceServer::builder()
///     .bind("0.0.0.0:8787")
///     .build(Arc::new(MemoryStore::new()))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LinkraceServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    handshake_timeout: Duration,
}

impl LinkraceServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".to_string(),
            room_config: RoomConfig::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every room is spawned with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets how long an accepted peer may take to complete the upgrade
    /// before it is dropped.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener. Race and chat rooms share `store`; their keys
    /// are namespaced.
    pub async fn build<S: HistoryStore>(
        self,
        store: Arc<S>,
    ) -> Result<LinkraceServer<S>, LinkraceError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            races: Mutex::new(RoomManager::new(Arc::clone(&store), self.room_config.clone())),
            chats: Mutex::new(RoomManager::new(store, self.room_config)),
            codec: JsonCodec,
        });

        Ok(LinkraceServer {
            transport,
            state,
            handshake_timeout: self.handshake_timeout,
        })
    }
}

impl Default for LinkraceServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound linkrace server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LinkraceServer<S> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S>>,
    handshake_timeout: Duration,
}

impl LinkraceServer<()> {
    /// Creates a new builder.
    pub fn builder() -> LinkraceServerBuilder {
        LinkraceServerBuilder::new()
    }
}

impl<S: HistoryStore> LinkraceServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), LinkraceError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then stops every
    /// room actor. Persisted histories are kept.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), LinkraceError> {
        let addr = self.local_addr().ok();
        tracing::info!(addr = ?addr, "linkrace server running");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(upgrade_and_handle(pending, state, self.handshake_timeout));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => break,
            }
        }

        tracing::info!("shutting down rooms");
        self.state.races.lock().await.shutdown_all().await;
        self.state.chats.lock().await.shutdown_all().await;
        Ok(())
    }
}

/// Completes the upgrade off the accept loop, then hands the connection to
/// the handler.
async fn upgrade_and_handle<S: HistoryStore>(
    pending: PendingWebSocket,
    state: Arc<ServerState<S>>,
    limit: Duration,
) {
    let conn_id = pending.id();
    let conn = match tokio::time::timeout(limit, pending.upgrade()).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            tracing::debug!(%conn_id, error = %e, "WebSocket upgrade failed");
            return;
        }
        Err(_) => {
            tracing::debug!(%conn_id, timeout = ?limit, "WebSocket upgrade timed out");
            return;
        }
    };

    if let Err(e) = handle_connection(conn, state).await {
        tracing::debug!(%conn_id, error = %e, "connection ended with error");
    }
}

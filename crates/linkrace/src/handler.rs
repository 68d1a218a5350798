//! Per-connection handler: route, attach, then pump frames both ways.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Parse the request path into a [`Route`]; close anything else
//!   2. Attach a session to the room (history is replayed on attach)
//!   3. Loop: decode inbound frames into events for the room, and write
//!      the room's outbound frames to the socket

use std::sync::Arc;

use linkrace_protocol::{Codec, JsonCodec, RoomId};
use linkrace_room::{HistoryStore, RoomHandle, RoomLogic, RoomManager};
use linkrace_session::session_channel;
use linkrace_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::Mutex;

use crate::LinkraceError;
use crate::route::Route;
use crate::server::ServerState;

/// Drop guard that detaches a session when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async send.
struct SessionGuard<L: RoomLogic> {
    conn_id: ConnectionId,
    handle: RoomHandle<L>,
}

impl<L: RoomLogic> Drop for SessionGuard<L> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let _ = handle.disconnect(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S: HistoryStore>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S>>,
) -> Result<(), LinkraceError> {
    let conn_id = conn.id();

    let Some(route) = Route::parse(conn.path()) else {
        tracing::debug!(%conn_id, path = conn.path(), "unknown path, closing");
        conn.close().await?;
        return Ok(());
    };
    tracing::debug!(%conn_id, room_id = %route.room_id(), path = conn.path(), "handling new connection");

    match route {
        Route::Race(room_id) => serve(&conn, &state.races, room_id, &state.codec).await,
        Route::Chat(room_id) => serve(&conn, &state.chats, room_id, &state.codec).await,
    }
}

/// Attaches `conn` to a room and relays frames until either side closes.
async fn serve<L: RoomLogic, S: HistoryStore>(
    conn: &WebSocketConnection,
    rooms: &Mutex<RoomManager<L, S>>,
    room_id: RoomId,
    codec: &JsonCodec,
) -> Result<(), LinkraceError> {
    let conn_id = conn.id();
    let (tx, mut outbound) = session_channel();

    let handle = match RoomManager::connect(rooms, &room_id, conn_id, tx).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(%conn_id, %room_id, error = %e, "could not attach to room");
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    let _guard = SessionGuard {
        conn_id,
        handle: handle.clone(),
    };

    loop {
        tokio::select! {
            inbound = conn.recv() => match inbound {
                Ok(Some(data)) => {
                    let event: L::Event = match codec.decode(&data) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!(%conn_id, %room_id, error = %e, "dropping malformed frame");
                            continue;
                        }
                    };
                    handle.submit(conn_id, event).await?;
                }
                Ok(None) => {
                    tracing::info!(%conn_id, %room_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, %room_id, error = %e, "recv error");
                    break;
                }
            },
            frame = outbound.recv() => match frame {
                Some(frame) => conn.send(&frame).await?,
                None => {
                    // The room actor dropped this session's sender.
                    tracing::debug!(%conn_id, %room_id, "room stopped, closing connection");
                    let _ = conn.close().await;
                    break;
                }
            },
        }
    }

    // _guard drops here → session detach fires.
    Ok(())
}

//! Room manager: activates room actors on demand and routes connections to
//! them.

use std::collections::HashMap;
use std::sync::Arc;

use linkrace_protocol::RoomId;
use linkrace_session::SessionSender;
use linkrace_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::room::spawn_room;
use crate::{HistoryStore, RoomConfig, RoomError, RoomHandle, RoomInfo, RoomLogic};

/// Tracks the live actor of every active room of one kind.
///
/// Rooms are never created explicitly: the first connection to a room id
/// activates an actor, which loads whatever history the store holds for
/// it. Handles of actors that stopped after idle cleanup are dropped
/// whenever a new actor is activated, so the map never holds more than one
/// stopped handle per activation.
pub struct RoomManager<L: RoomLogic, S> {
    rooms: HashMap<RoomId, RoomHandle<L>>,
    store: Arc<S>,
    config: RoomConfig,
}

impl<L: RoomLogic, S: HistoryStore> RoomManager<L, S> {
    pub fn new(store: Arc<S>, config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            store,
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Returns the live actor for `room_id`, activating one if the room has
    /// none or its actor has stopped.
    pub fn room(&mut self, room_id: &RoomId) -> RoomHandle<L> {
        if let Some(handle) = self.rooms.get(room_id) {
            if !handle.is_closed() {
                return handle.clone();
            }
            tracing::debug!(%room_id, "replacing stopped room actor");
        }

        let pruned = self.prune_closed();
        if pruned > 0 {
            tracing::debug!(pruned, "dropped stopped room actors");
        }

        let handle = spawn_room::<L, S>(room_id.clone(), self.config.clone(), Arc::clone(&self.store));
        self.rooms.insert(room_id.clone(), handle.clone());
        tracing::info!(%room_id, namespace = L::NAMESPACE, "room activated");
        handle
    }

    /// Attaches a session to a room and returns the room's handle.
    ///
    /// The manager lock is only held to look up the handle, not while the
    /// actor replays history. If the actor stopped between lookup and
    /// connect (idle cleanup fired), the connect is retried once on a
    /// fresh actor.
    ///
    /// # Errors
    /// Returns [`RoomError::Unavailable`] if the fresh actor also fails,
    /// e.g. because its history can't be loaded.
    pub async fn connect(
        manager: &Mutex<Self>,
        room_id: &RoomId,
        conn_id: ConnectionId,
        sender: SessionSender,
    ) -> Result<RoomHandle<L>, RoomError> {
        let handle = manager.lock().await.room(room_id);
        match handle.connect(conn_id, sender.clone()).await {
            Ok(()) => Ok(handle),
            Err(RoomError::Unavailable(_)) => {
                tracing::debug!(%room_id, %conn_id, "room stopped during connect, retrying");
                let handle = manager.lock().await.room(room_id);
                handle.connect(conn_id, sender).await?;
                Ok(handle)
            }
            Err(e) => Err(e),
        }
    }

    /// Queries a room's actor, if it is running.
    pub async fn room_info(&self, room_id: &RoomId) -> Option<RoomInfo> {
        let handle = self.rooms.get(room_id)?;
        handle.get_info().await.ok()
    }

    /// Drops handles of actors that have stopped. Returns how many.
    pub fn prune_closed(&mut self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, handle| !handle.is_closed());
        before - self.rooms.len()
    }

    /// Returns the number of handles held, including stopped actors not
    /// yet pruned.
    pub fn tracked_count(&self) -> usize {
        self.rooms.len()
    }

    /// Returns the number of rooms with a running actor.
    pub fn room_count(&self) -> usize {
        self.rooms.values().filter(|h| !h.is_closed()).count()
    }

    /// Lists the ids of rooms with a running actor.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, h)| !h.is_closed())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Stops every actor. Persisted histories are kept.
    pub async fn shutdown_all(&mut self) {
        for (room_id, handle) in self.rooms.drain() {
            if handle.shutdown().await.is_err() {
                tracing::debug!(%room_id, "room already stopped");
            }
        }
    }
}

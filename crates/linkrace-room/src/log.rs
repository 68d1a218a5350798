//! A room's ordered, persisted event history.
//!
//! [`EventLog::append`] is the only way to obtain a [`Committed`], and it
//! only returns one after the store accepted the new history. The actor
//! broadcasts `Committed::frame`, so nothing reaches a client before it is
//! durable.

use std::sync::Arc;

use linkrace_protocol::{Codec, JsonCodec, RoomId};
use linkrace_session::{Frame, SessionRegistry};
use linkrace_transport::ConnectionId;
use serde::{Serialize, de::DeserializeOwned};

use crate::{HistoryStore, RoomError};

/// Store key for one room's history, e.g. `game/abc123`.
pub fn history_key(namespace: &str, room_id: &RoomId) -> String {
    format!("{namespace}/{room_id}")
}

/// Proof that an event is part of the persisted history.
#[derive(Debug, Clone)]
pub struct Committed {
    seq: u64,
    frame: Frame,
}

impl Committed {
    /// 1-based position in the history.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The event encoded once, ready to broadcast.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

/// Ordered history of one room, mirrored to a [`HistoryStore`].
///
/// Each event is encoded once when it enters the log; replays send the
/// cached frames.
pub struct EventLog<E, S> {
    key: String,
    frames: Vec<Frame>,
    events: Vec<E>,
    store: Arc<S>,
    codec: JsonCodec,
}

impl<E, S> EventLog<E, S>
where
    E: Serialize + DeserializeOwned,
    S: HistoryStore,
{
    /// Loads the history under `key`, or starts empty if none is stored.
    ///
    /// # Errors
    /// - [`RoomError::Persist`] if the store can't be read
    /// - [`RoomError::Protocol`] if the stored blob doesn't decode
    pub async fn load_or_init(key: String, store: Arc<S>) -> Result<Self, RoomError> {
        let codec = JsonCodec;
        let events: Vec<E> = match store.get(&key).await? {
            Some(blob) => codec.decode(&blob)?,
            None => Vec::new(),
        };
        let frames = events
            .iter()
            .map(|event| codec.encode(event).map(Frame::from))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(key = %key, events = events.len(), "history loaded");
        Ok(Self {
            key,
            frames,
            events,
            store,
            codec,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Appends `event` and persists the full history.
    ///
    /// On failure the in-memory history is left exactly as it was.
    ///
    /// # Errors
    /// - [`RoomError::Protocol`] if the event or history can't be encoded
    /// - [`RoomError::Persist`] if the store rejects the write
    pub async fn append(&mut self, event: E) -> Result<Committed, RoomError> {
        let frame = Frame::from(self.codec.encode(&event)?);

        self.events.push(event);
        let blob = match self.codec.encode(&self.events) {
            Ok(blob) => blob,
            Err(e) => {
                self.events.pop();
                return Err(e.into());
            }
        };
        if let Err(e) = self.store.put(&self.key, blob).await {
            self.events.pop();
            return Err(e.into());
        }

        self.frames.push(Arc::clone(&frame));
        Ok(Committed {
            seq: self.events.len() as u64,
            frame,
        })
    }

    /// Sends every committed event, in order, to one session.
    ///
    /// Returns the number of frames delivered.
    ///
    /// # Errors
    /// Returns [`RoomError::Session`] if the session is gone; the replay
    /// stops there.
    pub fn replay_to(
        &self,
        sessions: &SessionRegistry,
        conn_id: ConnectionId,
    ) -> Result<usize, RoomError> {
        for frame in &self.frames {
            sessions.send_to(conn_id, Arc::clone(frame))?;
        }
        Ok(self.frames.len())
    }

    /// Deletes the persisted history and empties the log.
    ///
    /// # Errors
    /// Returns [`RoomError::Persist`] if the store can't delete the key.
    /// The in-memory history is kept in that case.
    pub async fn clear(&mut self) -> Result<(), RoomError> {
        self.store.delete(&self.key).await?;
        self.events.clear();
        self.frames.clear();
        Ok(())
    }
}

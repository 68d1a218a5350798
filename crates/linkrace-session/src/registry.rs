//! The session registry: every live connection of one room.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is a plain `HashMap`, not a concurrent one. It is
//! owned by exactly one room actor and only touched from that actor's task,
//! which is what gives a room its single-writer delivery order.

use std::collections::HashMap;
use std::sync::Arc;

use linkrace_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::SessionError;

/// One encoded message, shared by every session it is delivered to.
///
/// Broadcasting clones the `Arc`, never the bytes.
pub type Frame = Arc<[u8]>;

/// Channel sender for delivering frames to one connection handler.
pub type SessionSender = mpsc::UnboundedSender<Frame>;

/// Receiving half, drained by the connection handler into its socket.
pub type SessionReceiver = mpsc::UnboundedReceiver<Frame>;

/// Creates the outbound channel for a new session.
pub fn session_channel() -> (SessionSender, SessionReceiver) {
    mpsc::unbounded_channel()
}

/// Tracks the live sessions of one room and delivers frames to them.
///
/// ## Lifecycle
///
/// ```text
/// connect ──→ add() ──→ send_to() (replay) ──→ broadcast() ... ──→ remove()
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, SessionSender>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyRegistered`] if `id` is taken. The
    /// transport never reuses ids, so this indicates a routing bug.
    pub fn add(
        &mut self,
        id: ConnectionId,
        sender: SessionSender,
    ) -> Result<(), SessionError> {
        if self.sessions.contains_key(&id) {
            return Err(SessionError::AlreadyRegistered(id));
        }
        self.sessions.insert(id, sender);
        tracing::debug!(conn_id = %id, sessions = self.sessions.len(), "session registered");
        Ok(())
    }

    /// Removes a session.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if `id` was never registered or
    /// was already removed.
    pub fn remove(&mut self, id: ConnectionId) -> Result<(), SessionError> {
        self.sessions
            .remove(&id)
            .map(|_| ())
            .ok_or(SessionError::NotFound(id))?;
        tracing::debug!(conn_id = %id, sessions = self.sessions.len(), "session removed");
        Ok(())
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Returns the number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Iterates over the registered connection ids.
    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.sessions.keys().copied()
    }

    /// Delivers a frame to one session.
    ///
    /// # Errors
    /// - [`SessionError::NotFound`] if there is no such session
    /// - [`SessionError::Closed`] if the handler dropped its receiver
    pub fn send_to(&self, id: ConnectionId, frame: Frame) -> Result<(), SessionError> {
        let sender = self.sessions.get(&id).ok_or(SessionError::NotFound(id))?;
        sender.send(frame).map_err(|_| SessionError::Closed(id))
    }

    /// Delivers a frame to every session and returns how many accepted it.
    ///
    /// A failed delivery is logged and skipped; the remaining sessions
    /// still receive the frame. Dead sessions stay registered until their
    /// handler reports the disconnect.
    pub fn broadcast(&self, frame: &Frame) -> usize {
        let mut delivered = 0;
        for id in self.ids() {
            match self.send_to(id, Arc::clone(frame)) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(conn_id = %id, error = %e, "delivery failed, skipping session");
                }
            }
        }
        delivered
    }
}

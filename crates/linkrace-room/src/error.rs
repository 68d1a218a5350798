//! Error types for the room layer.

use linkrace_protocol::{ProtocolError, RoomId};
use linkrace_session::SessionError;

/// Errors from a [`HistoryStore`](crate::HistoryStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading, writing or deleting the persisted blob failed.
    #[error("history store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's actor is gone (stopped after idle cleanup, failed to
    /// activate, or shut down). The manager replaces it on next connect.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// Persisting history failed. The event was not committed and was
    /// not broadcast.
    #[error("persisting history failed: {0}")]
    Persist(#[from] StoreError),

    /// Encoding or decoding an event or history blob failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Registering or delivering to a session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

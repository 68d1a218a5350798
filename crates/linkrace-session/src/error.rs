//! Error types for the session layer.

use linkrace_transport::ConnectionId;

/// Errors that can occur while tracking or delivering to sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A session with this id is already registered.
    #[error("session {0} already registered")]
    AlreadyRegistered(ConnectionId),

    /// No session is registered under this id.
    #[error("session {0} not found")]
    NotFound(ConnectionId),

    /// The session's outbound channel is closed; its connection
    /// handler is gone.
    #[error("session {0} is closed")]
    Closed(ConnectionId),
}

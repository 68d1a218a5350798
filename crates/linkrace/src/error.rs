//! Unified error type for linkrace.

use linkrace_protocol::ProtocolError;
use linkrace_room::{RoomError, StoreError};
use linkrace_session::SessionError;
use linkrace_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum LinkraceError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (duplicate id, closed channel).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (unavailable, persist failure).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Opening or using the history store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

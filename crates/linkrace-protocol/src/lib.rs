//! Wire protocol for linkrace.
//!
//! - **Types** ([`Event`], [`EventBody`], [`PlayerId`], [`RoomId`],
//!   [`ChatMessage`]): what travels between clients and rooms.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   become bytes, both on the socket and in persisted history.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Event) → Room (state machine, history)
//! ```

mod chat;
mod codec;
mod error;
mod event;
mod types;

pub use chat::ChatMessage;
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{
    Event, EventBody, EventKind, PlayMode, RETIRE_GAME, ROOM_IS_READY, START_GAME,
};
pub use types::{PlayerId, RoomId};

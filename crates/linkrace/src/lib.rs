//! # linkrace
//!
//! Real-time room coordinator for two-player wiki races.
//!
//! Clients connect over WebSocket to `/api/ws/<roomId>` (race) or
//! `/api/chat/<roomId>` (chat). Each room is an actor that keeps an
//! ordered, persisted history of events, replays it to every new
//! connection and broadcasts new events to everyone attached. Race rooms
//! also run the race protocol: roster, start sequence and winner
//! detection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use linkrace::prelude::*;
//!
//! # async fn run() -> Result<(), LinkraceError> {
//! let store = Arc::new(FileStore::open("./data").await?);
//! let server = LinkraceServer::builder()
//!     .bind("0.0.0.0:8787")
//!     .build(store)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod route;
mod server;

pub use error::LinkraceError;
pub use route::{CHAT_PREFIX, RACE_PREFIX, Route};
pub use server::{DEFAULT_HANDSHAKE_TIMEOUT, LinkraceServer, LinkraceServerBuilder};

/// Everything needed to embed a server.
pub mod prelude {
    pub use crate::{LinkraceError, LinkraceServer, LinkraceServerBuilder};
    pub use linkrace_protocol::{ChatMessage, Event, EventBody, PlayerId, RoomId};
    pub use linkrace_room::{FileStore, HistoryStore, MemoryStore, RoomConfig};
}

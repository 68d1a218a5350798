//! Room actors for linkrace.
//!
//! Each room is a Tokio task that owns its sessions, its persisted event
//! history and a [`RoomLogic`] state machine. Two kinds of room exist:
//!
//! - **race** rooms run [`RaceLogic`] over [`Event`](linkrace_protocol::Event)s
//! - **chat** rooms run [`ChatLogic`] over
//!   [`ChatMessage`](linkrace_protocol::ChatMessage)s
//!
//! A [`RoomManager`] activates rooms on first connect and replaces actors
//! that stopped after idle cleanup. Histories go through a
//! [`HistoryStore`]: [`MemoryStore`] or [`FileStore`].

mod chat;
mod config;
mod error;
mod log;
mod logic;
mod manager;
mod race;
mod room;
mod store;

pub use chat::ChatLogic;
pub use config::{RoomConfig, RoomPhase};
pub use error::{RoomError, StoreError};
pub use log::{Committed, EventLog, history_key};
pub use logic::{Outcome, RoomLogic};
pub use manager::RoomManager;
pub use race::{RaceLogic, ROSTER_SIZE, current_goal};
pub use room::{RoomHandle, RoomInfo, now_ms};
pub use store::{FileStore, HistoryStore, MemoryStore};

//! The `RoomLogic` trait: the protocol a room actor runs.
//!
//! The actor owns sessions, history and timing; a `RoomLogic` only decides,
//! for each inbound event, what should be committed to history and what
//! should merely be relayed. [`RaceLogic`](crate::RaceLogic) and
//! [`ChatLogic`](crate::ChatLogic) are the two implementations.

use std::fmt::Debug;

use linkrace_protocol::PlayerId;
use serde::{Serialize, de::DeserializeOwned};

use crate::RoomPhase;

/// What the actor should do with one event a `RoomLogic` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<E> {
    /// Append to history, persist, then broadcast.
    Commit(E),
    /// Broadcast only; never stored.
    Relay(E),
}

/// Per-room protocol state machine.
///
/// `handle` must be deterministic given its inputs: the event, the history
/// committed so far and the timestamp the actor chose for this step. The
/// actor executes the returned outcomes in order, and stops at the first
/// commit that fails to persist.
pub trait RoomLogic: Send + 'static {
    /// The message type clients send and the room stores.
    type Event: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Prefix separating this kind of room's history in the store.
    const NAMESPACE: &'static str;

    /// Fresh state for a newly activated actor.
    fn new() -> Self;

    /// Interprets one inbound event.
    fn handle(
        &mut self,
        event: Self::Event,
        history: &[Self::Event],
        now: u64,
    ) -> Vec<Outcome<Self::Event>>;

    /// Short label for logs.
    fn label(_event: &Self::Event) -> &'static str {
        "event"
    }

    /// Current phase, for rooms that have one.
    fn phase(&self) -> Option<RoomPhase> {
        None
    }

    /// Admitted players, for rooms that track a roster.
    fn roster(&self) -> Vec<PlayerId> {
        Vec::new()
    }
}

//! Race protocol events.
//!
//! Every message between a client and its room is one [`Event`]. On the
//! wire it is a flat JSON object:
//!
//! ```text
//! { "type": "traversed", "player": "p1", "data": "https://...", "date": 1718000000000 }
//! ```
//!
//! In Rust the payload is the sum type [`EventBody`], one variant per kind,
//! so the room's state machine can match exhaustively. The flat shape is
//! produced by a private wire struct that serde converts through
//! (`#[serde(try_from, into)]`); a `data` value that doesn't fit its
//! `type` fails decoding like any other malformed input.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{PlayerId, ProtocolError};

/// `status` payload announcing that the roster is full.
pub const ROOM_IS_READY: &str = "roomIsReady";

/// `command` payload telling clients the race has started.
pub const START_GAME: &str = "startGame";

/// `action` payload a player sends to give up.
pub const RETIRE_GAME: &str = "retireGame";

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// The `type` tag of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Hello,
    /// Older clients send this as `wantToStartGame`.
    #[serde(alias = "wantToStartGame")]
    StartRequest,
    StartUrl,
    GoalUrl,
    Traversed,
    Scrolled,
    Action,
    Command,
    Status,
    Winner,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::StartRequest => "startRequest",
            Self::StartUrl => "startUrl",
            Self::GoalUrl => "goalUrl",
            Self::Traversed => "traversed",
            Self::Scrolled => "scrolled",
            Self::Action => "action",
            Self::Command => "command",
            Self::Status => "status",
            Self::Winner => "winner",
        }
    }

    /// Whether events of this kind go into the room's persisted history.
    ///
    /// `scrolled` is high-frequency mirroring; `hello` and `startRequest`
    /// only drive the roster and the derived start sequence.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Hello | Self::StartRequest | Self::Scrolled)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PlayMode
// ---------------------------------------------------------------------------

/// How the sender of a `hello` wants to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Against another human who joins the same room.
    #[default]
    Vs,
    /// Against the `cpu` placeholder; the roster fills immediately.
    Solo,
    /// Matched with a stranger. The coordinator treats it like `vs`.
    Random,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Kind-specific payload of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    /// A participant announces itself.
    Hello { play_mode: PlayMode },
    /// A client asks the room to start a race between two pages.
    StartRequest { start_page: String, goal_page: String },
    /// The race's start page.
    StartUrl(String),
    /// The race's goal page.
    GoalUrl(String),
    /// The actor is now on this page.
    Traversed(String),
    /// The actor's scroll position, as a ratio string (`"0.42"`).
    Scrolled(String),
    /// Free-form player action, e.g. [`RETIRE_GAME`].
    Action(String),
    /// Instruction to clients, e.g. [`START_GAME`].
    Command(String),
    /// Room status notice, e.g. [`ROOM_IS_READY`].
    Status(String),
    /// The actor won the race.
    Winner,
}

/// One protocol message: who, when, and what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEvent", into = "WireEvent")]
pub struct Event {
    /// The player this event is about, or `system`.
    pub player: PlayerId,
    /// Milliseconds since the Unix epoch.
    pub date: u64,
    pub body: EventBody,
}

impl Event {
    pub fn new(player: PlayerId, date: u64, body: EventBody) -> Self {
        Self { player, date, body }
    }

    /// An event whose actor is the `system` sentinel.
    pub fn system(date: u64, body: EventBody) -> Self {
        Self::new(PlayerId::system(), date, body)
    }

    pub fn kind(&self) -> EventKind {
        match &self.body {
            EventBody::Hello { .. } => EventKind::Hello,
            EventBody::StartRequest { .. } => EventKind::StartRequest,
            EventBody::StartUrl(_) => EventKind::StartUrl,
            EventBody::GoalUrl(_) => EventKind::GoalUrl,
            EventBody::Traversed(_) => EventKind::Traversed,
            EventBody::Scrolled(_) => EventKind::Scrolled,
            EventBody::Action(_) => EventKind::Action,
            EventBody::Command(_) => EventKind::Command,
            EventBody::Status(_) => EventKind::Status,
            EventBody::Winner => EventKind::Winner,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.kind().is_durable()
    }
}

// ---------------------------------------------------------------------------
// Wire representation
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    player: PlayerId,
    data: WireData,
    #[serde(default)]
    date: u64,
}

/// `data` is a string for most kinds and an object for `hello` and
/// `startRequest`. `untagged` tries the variants in order.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireData {
    Text(String),
    Hello {
        #[serde(rename = "playMode")]
        play_mode: PlayMode,
    },
    Start {
        #[serde(rename = "startPage")]
        start_page: String,
        #[serde(rename = "goalPage")]
        goal_page: String,
    },
}

impl TryFrom<WireEvent> for Event {
    type Error = ProtocolError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let body = match (wire.kind, wire.data) {
            (EventKind::Hello, WireData::Hello { play_mode }) => {
                EventBody::Hello { play_mode }
            }
            (
                EventKind::StartRequest,
                WireData::Start {
                    start_page,
                    goal_page,
                },
            ) => EventBody::StartRequest {
                start_page,
                goal_page,
            },
            (EventKind::StartUrl, WireData::Text(s)) => EventBody::StartUrl(s),
            (EventKind::GoalUrl, WireData::Text(s)) => EventBody::GoalUrl(s),
            (EventKind::Traversed, WireData::Text(s)) => EventBody::Traversed(s),
            (EventKind::Scrolled, WireData::Text(s)) => EventBody::Scrolled(s),
            (EventKind::Action, WireData::Text(s)) => EventBody::Action(s),
            (EventKind::Command, WireData::Text(s)) => EventBody::Command(s),
            (EventKind::Status, WireData::Text(s)) => EventBody::Status(s),
            (EventKind::Winner, WireData::Text(_)) => EventBody::Winner,
            (kind, _) => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "unexpected data shape for {kind}"
                )));
            }
        };
        Ok(Event::new(wire.player, wire.date, body))
    }
}

impl From<Event> for WireEvent {
    fn from(event: Event) -> Self {
        let kind = event.kind();
        let data = match event.body {
            EventBody::Hello { play_mode } => WireData::Hello { play_mode },
            EventBody::StartRequest {
                start_page,
                goal_page,
            } => WireData::Start {
                start_page,
                goal_page,
            },
            EventBody::StartUrl(s)
            | EventBody::GoalUrl(s)
            | EventBody::Traversed(s)
            | EventBody::Scrolled(s)
            | EventBody::Action(s)
            | EventBody::Command(s)
            | EventBody::Status(s) => WireData::Text(s),
            EventBody::Winner => WireData::Text(String::new()),
        };
        WireEvent {
            kind,
            player: event.player,
            data,
            date: event.date,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

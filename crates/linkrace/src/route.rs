//! Maps a connection's request path to the room it addresses.

use linkrace_protocol::RoomId;

/// Path prefix of race rooms.
pub const RACE_PREFIX: &str = "/api/ws/";

/// Path prefix of chat rooms.
pub const CHAT_PREFIX: &str = "/api/chat/";

/// The room a connection asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/api/ws/<roomId>`
    Race(RoomId),
    /// `/api/chat/<roomId>`
    Chat(RoomId),
}

impl Route {
    /// Parses a request path. A query string is ignored.
    ///
    /// Returns `None` for any other path, including an empty room id or
    /// one with further segments.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split_once('?').map_or(path, |(p, _)| p);

        if let Some(raw) = path.strip_prefix(RACE_PREFIX) {
            return RoomId::parse(raw).ok().map(Self::Race);
        }
        if let Some(raw) = path.strip_prefix(CHAT_PREFIX) {
            return RoomId::parse(raw).ok().map(Self::Chat);
        }
        None
    }

    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::Race(id) | Self::Chat(id) => id,
        }
    }
}

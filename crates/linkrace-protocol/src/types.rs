//! Identity types shared by every layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// Identifier of a race participant, or the `system` sentinel.
///
/// Player ids are issued outside the coordinator (a session cookie in the
/// web app) and are opaque here. `#[serde(transparent)]` keeps them plain
/// strings on the wire: `"player": "4f1c..."`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Actor used for events the coordinator synthesizes itself.
    pub const SYSTEM: &'static str = "system";

    /// Placeholder opponent added to the roster in solo mode.
    pub const CPU: &'static str = "cpu";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn system() -> Self {
        Self::new(Self::SYSTEM)
    }

    pub fn cpu() -> Self {
        Self::new(Self::CPU)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// RoomId
// ---------------------------------------------------------------------------

/// Identifier of a room, taken from the connection URL.
///
/// Opaque to the coordinator. The only rules are the ones that keep it a
/// single path segment: non-empty and free of `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Validates and wraps a room identifier.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] for an empty id or one
    /// containing `/`.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        if raw.is_empty() {
            return Err(ProtocolError::InvalidMessage("empty room id".into()));
        }
        if raw.contains('/') {
            return Err(ProtocolError::InvalidMessage(format!(
                "room id {raw:?} contains '/'"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::new("p1")).unwrap();
        assert_eq!(json, "\"p1\"");
    }

    #[test]
    fn test_player_id_sentinels() {
        assert_eq!(PlayerId::system().as_str(), "system");
        assert_eq!(PlayerId::cpu().as_str(), "cpu");
    }

    #[test]
    fn test_room_id_parse_accepts_opaque_segment() {
        let id = RoomId::parse("7f3e-abc_DEF").unwrap();
        assert_eq!(id.as_str(), "7f3e-abc_DEF");
        assert_eq!(id.to_string(), "7f3e-abc_DEF");
    }

    #[test]
    fn test_room_id_parse_rejects_empty_and_slash() {
        assert!(matches!(
            RoomId::parse(""),
            Err(ProtocolError::InvalidMessage(_))
        ));
        assert!(matches!(
            RoomId::parse("a/b"),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }
}

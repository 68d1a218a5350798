//! Room configuration and race phases.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every room a [`RoomManager`](crate::RoomManager)
/// spawns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long a room with no sessions keeps its history. A connection
    /// inside this window cancels the deletion.
    pub cleanup_grace: Duration,

    /// Capacity of each room actor's command channel. When it is full,
    /// connection handlers wait (backpressure).
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            cleanup_grace: Duration::from_secs(5),
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a race room is in its protocol.
///
/// ```text
/// Empty → WaitingForPlayers → Ready → Playing → Resolved
///                                        ↑          │
///                                        └──────────┘  (new startRequest)
/// ```
///
/// - **Empty**: no `hello` seen by this actor incarnation.
/// - **WaitingForPlayers**: one roster slot filled.
/// - **Ready**: both slots filled, `roomIsReady` announced.
/// - **Playing**: start sequence emitted.
/// - **Resolved**: a `winner` was emitted.
///
/// The phase is derived from live traffic and is not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoomPhase {
    #[default]
    Empty,
    WaitingForPlayers,
    Ready,
    Playing,
    Resolved,
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::WaitingForPlayers => write!(f, "WaitingForPlayers"),
            Self::Ready => write!(f, "Ready"),
            Self::Playing => write!(f, "Playing"),
            Self::Resolved => write!(f, "Resolved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.cleanup_grace, Duration::from_secs(5));
        assert_eq!(config.channel_size, 64);
    }

    #[test]
    fn test_room_phase_display() {
        assert_eq!(RoomPhase::WaitingForPlayers.to_string(), "WaitingForPlayers");
        assert_eq!(RoomPhase::Resolved.to_string(), "Resolved");
    }
}

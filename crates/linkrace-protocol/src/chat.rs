//! Chat room messages.

use serde::{Deserialize, Serialize};

/// One chat line: `{ "user": "...", "message": "..." }`.
///
/// Chat rooms keep every message, so this is both the inbound
/// and the persisted/broadcast shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user: String,
    pub message: String,
}

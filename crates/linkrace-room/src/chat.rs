//! Chat rooms: every message is kept and broadcast.

use linkrace_protocol::ChatMessage;

use crate::{Outcome, RoomLogic};

/// Chat room protocol. Stateless; the history is the whole room.
#[derive(Debug, Default)]
pub struct ChatLogic;

impl RoomLogic for ChatLogic {
    type Event = ChatMessage;

    const NAMESPACE: &'static str = "chat";

    fn new() -> Self {
        Self
    }

    fn handle(
        &mut self,
        message: ChatMessage,
        _history: &[ChatMessage],
        _now: u64,
    ) -> Vec<Outcome<ChatMessage>> {
        vec![Outcome::Commit(message)]
    }

    fn label(_message: &ChatMessage) -> &'static str {
        "chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_message_is_committed() {
        let mut logic = ChatLogic::new();
        let msg = ChatMessage {
            user: "ann".into(),
            message: "gl hf".into(),
        };

        let out = logic.handle(msg.clone(), &[], 0);

        assert_eq!(out, vec![Outcome::Commit(msg)]);
        assert_eq!(logic.phase(), None);
        assert!(logic.roster().is_empty());
    }
}

//! Append-only message history sent to the model each round.

use crate::llm::{Message, Role};
use serde::Serialize;

/// Canonical conversation for one analysis run.
///
/// Messages are never removed or reordered once appended.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    /// Start a conversation with exactly a system and a user message.
    pub fn seed(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(user_prompt)],
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Full ordered history, ready to transmit.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Number of tool-result messages, i.e. acknowledged tool calls.
    pub fn tool_results(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::Tool).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_has_system_then_user() {
        let conversation = ConversationState::seed("sys", "go");
        let messages = conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content.as_deref(), Some("sys"));
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn test_snapshot_reflects_appends_in_order() {
        let mut conversation = ConversationState::seed("sys", "go");
        let before = conversation.snapshot();

        conversation.append(Message::assistant(Some("thinking".into()), vec![]));
        conversation.append(Message::tool("call_1", "result"));

        let after = conversation.snapshot();
        assert_eq!(after.len(), 4);
        assert_eq!(&after[..2], &before[..]);
        assert_eq!(after[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(conversation.tool_results(), 1);
    }
}

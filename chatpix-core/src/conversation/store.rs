//! Conversation data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,
    /// Message content
    pub content: String,
    /// Message timestamp (local bookkeeping only)
    #[serde(skip_serializing, default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// An ordered, append-only conversation log
///
/// The first message is always the system instruction the conversation was
/// created with. Further system messages are rejected so the instruction is
/// never duplicated, and nothing is ever removed.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a new conversation seeded with the system instruction
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Append a message at the tail
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> crate::Result<()> {
        if role == Role::System {
            return Err(crate::Error::Validation(
                "conversation already has its system message".to_string(),
            ));
        }
        self.messages.push(Message::new(role, content));
        Ok(())
    }

    /// Append a user message
    pub fn append_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Append an assistant message
    pub fn append_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Full ordered message log, system message first
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// The system instruction this conversation was seeded with
    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    /// Number of messages, including the system message
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when nothing beyond the system message has been appended
    pub fn is_empty(&self) -> bool {
        self.messages.len() <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_starts_with_system_message() {
        let conversation = Conversation::new("be helpful");
        assert_eq!(conversation.len(), 1);
        assert!(conversation.is_empty());
        assert_eq!(conversation.snapshot()[0].role, Role::System);
        assert_eq!(conversation.system_prompt(), "be helpful");
    }

    #[test]
    fn test_append_keeps_insertion_order() {
        let mut conversation = Conversation::new("sys");
        conversation.append(Role::User, "Hello").unwrap();
        conversation.append(Role::Assistant, "Hi there!").unwrap();
        conversation.append_user("How are you?");
        conversation.append_assistant("Fine.");

        let roles: Vec<Role> = conversation.snapshot().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
        assert_eq!(conversation.snapshot()[3].content, "How are you?");
        assert!(!conversation.is_empty());
    }

    #[test]
    fn test_append_rejects_second_system_message() {
        let mut conversation = Conversation::new("sys");
        let err = conversation.append(Role::System, "again").unwrap_err();
        assert!(err.to_string().contains("system message"));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_append_does_not_validate_content() {
        let mut conversation = Conversation::new("sys");
        conversation.append(Role::User, "").unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.snapshot()[1].content, "");
    }

    #[test]
    fn test_message_wire_format_omits_timestamp() {
        let value = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_message_deserializes_without_timestamp() {
        let msg: Message =
            serde_json::from_str(r#"{"role":"assistant","content":"ok"}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "ok");
    }
}

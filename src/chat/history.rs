//! Conversation messages and the append-only session history.

use crate::defaults;
use serde::{Deserialize, Serialize};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message as sent to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only conversation history for one session.
///
/// The full message list is sent on every backend call (no server-side
/// session state). Growth is bounded: beyond `max_turns` user/assistant
/// pairs, the oldest pair is dropped while any leading system message stays.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
    max_turns: usize,
}

impl ConversationHistory {
    /// Empty history with the default turn cap.
    pub fn new() -> Self {
        Self::with_max_turns(defaults::MAX_HISTORY_TURNS)
    }

    /// Empty history with a custom turn cap (0 = unbounded).
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    /// Seed the conversation with a system persona message.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        if !prompt.trim().is_empty() {
            self.messages.insert(0, ChatMessage::system(prompt));
        }
        self
    }

    /// Appends a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
        self.trim();
    }

    /// Appends an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
        self.trim();
    }

    /// The full message list, in order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn trim(&mut self) {
        if self.max_turns == 0 {
            return;
        }
        let system_count = self
            .messages
            .iter()
            .take_while(|m| m.role == Role::System)
            .count();
        while self.messages.len() - system_count > self.max_turns * 2 {
            self.messages.remove(system_count);
        }
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

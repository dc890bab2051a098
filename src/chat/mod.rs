//! Streaming chat completion: message types, the SSE wire parser, and the
//! backend seam with its HTTP implementation.

pub mod client;
pub mod history;
pub mod sse;

pub use client::{ChatBackend, HttpChatClient, MockChatBackend};
pub use history::{ChatMessage, ConversationHistory, Role};
pub use sse::{SseItem, SseParser};

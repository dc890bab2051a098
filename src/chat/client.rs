//! The chat backend seam and its streaming HTTP implementation.

use crate::chat::history::ChatMessage;
use crate::chat::sse::{SseItem, SseParser};
use crate::error::{Result, VoxError};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Trait for streaming chat completion backends.
///
/// At most one call is in flight at a time (the session's processing status
/// is the mutex). Cancellation is cooperative: when `cancel` flips true the
/// implementation stops consuming and returns what it has.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends the full message history and streams the reply.
    ///
    /// `on_delta` receives each content delta as it arrives; the return value
    /// is the concatenated reply text.
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_delta: &(dyn for<'r> Fn(&'r str) + Send + Sync),
        cancel: &AtomicBool,
    ) -> Result<String>;
}

/// Streaming client for an OpenAI-style chat completion endpoint.
pub struct HttpChatClient {
    url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl HttpChatClient {
    /// Creates the client. The connect timeout is bounded; the response body
    /// itself streams for as long as the backend keeps sending.
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| VoxError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// The configured endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatBackend for HttpChatClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_delta: &(dyn for<'r> Fn(&'r str) + Send + Sync),
        cancel: &AtomicBool,
    ) -> Result<String> {
        if cancel.load(Ordering::SeqCst) {
            return Ok(String::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoxError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VoxError::ChatApi {
                status: status.as_u16(),
                message,
            });
        }

        let mut stream = response.bytes_stream();
        let mut parser = SseParser::new();
        let mut reply = String::new();

        while let Some(chunk) = stream.next().await {
            if cancel.load(Ordering::SeqCst) {
                // Session ended mid-stream: stop consuming.
                return Ok(reply);
            }
            let chunk = chunk.map_err(|e| VoxError::Network {
                message: e.to_string(),
            })?;
            for item in parser.push(&chunk) {
                match item {
                    SseItem::Delta(delta) => {
                        reply.push_str(&delta);
                        on_delta(&delta);
                    }
                    SseItem::Done => return Ok(reply),
                }
            }
        }

        Ok(reply)
    }
}

/// Scriptable chat backend for tests: streams a fixed reply word by word,
/// optionally failing or taking time, and records every request.
pub struct MockChatBackend {
    reply: String,
    failure: Option<(u16, String)>,
    delay: Duration,
    calls: std::sync::Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockChatBackend {
    pub fn new() -> Self {
        Self {
            reply: "mock reply".to_string(),
            failure: None,
            delay: Duration::ZERO,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Stream this reply instead of the default.
    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = reply.to_string();
        self
    }

    /// Fail every call with this API status.
    pub fn with_failure(mut self, status: u16, message: &str) -> Self {
        self.failure = Some((status, message.to_string()));
        self
    }

    /// Delay before the reply streams (exercises cancellation windows).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Message lists of every call made so far.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        on_delta: &(dyn for<'r> Fn(&'r str) + Send + Sync),
        cancel: &AtomicBool,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        // Cooperative delay: return early the moment cancel flips.
        let step = Duration::from_millis(5);
        let mut remaining = self.delay;
        while remaining > Duration::ZERO {
            if cancel.load(Ordering::SeqCst) {
                return Ok(String::new());
            }
            let slice = remaining.min(step);
            tokio::time::sleep(slice).await;
            remaining -= slice;
        }

        if let Some((status, message)) = &self.failure {
            return Err(VoxError::ChatApi {
                status: *status,
                message: message.clone(),
            });
        }

        let mut reply = String::new();
        for (i, word) in self.reply.split_inclusive(' ').enumerate() {
            if cancel.load(Ordering::SeqCst) {
                return Ok(reply);
            }
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            reply.push_str(word);
            on_delta(word);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::history::ConversationHistory;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_http_client_construction() {
        let client =
            HttpChatClient::new("https://api.example.com/v1/chat/completions", "sk-test", "gpt-4o-mini")
                .unwrap();
        assert_eq!(client.url(), "https://api.example.com/v1/chat/completions");
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_mock_streams_reply_in_pieces() {
        let backend = MockChatBackend::new().with_reply("Let me search for jobs");
        let deltas = std::sync::Mutex::new(Vec::new());
        let cancel = AtomicBool::new(false);

        let mut history = ConversationHistory::new();
        history.push_user("find me a driving job in Pune");

        let reply = block_on(backend.stream_chat(
            history.messages(),
            &|delta| deltas.lock().unwrap().push(delta.to_string()),
            &cancel,
        ))
        .unwrap();

        assert_eq!(reply, "Let me search for jobs");
        assert!(deltas.lock().unwrap().len() > 1, "reply must stream in pieces");
        assert_eq!(deltas.lock().unwrap().concat(), reply);
        assert_eq!(backend.calls().len(), 1);
        assert_eq!(backend.calls()[0].len(), 1);
    }

    #[test]
    fn test_mock_failure() {
        let backend = MockChatBackend::new().with_failure(503, "overloaded");
        let cancel = AtomicBool::new(false);

        let result = block_on(backend.stream_chat(&[], &|_| {}, &cancel));
        assert!(matches!(result, Err(VoxError::ChatApi { status: 503, .. })));
    }

    #[test]
    fn test_mock_cancel_stops_streaming() {
        let backend = MockChatBackend::new().with_delay(Duration::from_secs(5));
        let cancel = AtomicBool::new(true);

        let reply = block_on(backend.stream_chat(&[], &|_| {}, &cancel)).unwrap();
        assert!(reply.is_empty(), "cancelled call must not stream a reply");
    }
}

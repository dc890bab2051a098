//! voxloop - Hands-free voice conversation loop
//!
//! Continuous speech capture, end-of-utterance detection, a streaming chat
//! backend call, and queued speech playback, arbitrated by a single session
//! status state machine.

// Error handling discipline: library code propagates, never panics.
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod chat;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod session;
pub mod silence;
pub mod stt;
pub mod tts;

// Capture and detection seams
pub use audio::level::{AudioLevelAnalyzer, calculate_rms};
pub use audio::recorder::{AudioSource, MockAudioSource};
pub use silence::timer::SilenceTimer;
pub use silence::window::{Clock, MockClock, SilenceWindow, SystemClock};

// Recognition
pub use stt::engine::{MockRecognitionEngine, RecognitionEngine};
pub use stt::recognizer::SpeechRecognizer;

// Synthesis
pub use tts::chunker::chunk_text;
pub use tts::engine::{MockSynthesisEngine, PlaceholderSynthesis, SynthesisEngine};
pub use tts::player::TextToSpeechPlayer;

// Chat backend
pub use chat::client::{ChatBackend, HttpChatClient, MockChatBackend};
pub use chat::history::{ChatMessage, ConversationHistory, Role};

// Session
pub use session::orchestrator::{SessionCallbacks, SessionConfig, VoiceSession};
pub use session::status::SessionStatus;

// Error handling
pub use error::{Result, VoxError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.2.0+abc1234"` when git hash is available, `"0.2.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

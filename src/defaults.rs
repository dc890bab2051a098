//! Default configuration constants for voxloop.
//!
//! The tuning values here (thresholds, windows, chunk sizes) are defaults for
//! the corresponding config fields, never hard-coded behavior.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech processing and keeps per-frame RMS
/// computation cheap enough for a 60Hz polling loop.
pub const SAMPLE_RATE: u32 = 16000;

/// Default RMS threshold above which a frame counts as speech (0.0 to 1.0).
///
/// Tuned for typical microphone input levels; low enough to catch quiet
/// speakers while rejecting room tone.
pub const SILENCE_THRESHOLD: f32 = 0.015;

/// Default minimum duration of continuous speech, in milliseconds, before
/// silence counting is allowed to begin.
///
/// Prevents a short noise burst (door slam, cough) from arming the silence
/// window and firing an end-of-utterance on the quiet that follows it.
pub const MIN_SPEECH_MS: u32 = 300;

/// Default silence duration in milliseconds before an utterance is considered
/// finished.
///
/// 1500ms allows natural mid-sentence pauses without cutting the speaker off.
pub const SILENCE_DURATION_MS: u32 = 1500;

/// Default audio polling interval in milliseconds (~60Hz).
pub const POLL_INTERVAL_MS: u64 = 16;

/// Default maximum length of a single speech chunk, in characters.
///
/// Synthesis engines degrade (and become hard to interrupt) on long inputs;
/// the chunker prefers sentence and clause boundaries below this limit.
pub const MAX_CHUNK_CHARS: usize = 180;

/// Default per-chunk synthesis timeout in seconds.
///
/// A stalled synthesis engine must not hang the session; after this long the
/// chunk is cancelled and the queue moves on.
pub const CHUNK_TIMEOUT_SECS: u64 = 30;

/// Default speech language tag sent to the synthesis engine.
pub const SPEECH_LANGUAGE: &str = "en-US";

/// Default speaking rate multiplier (1.0 = engine native rate).
pub const SPEECH_RATE: f32 = 1.0;

/// Default voice pitch multiplier.
pub const SPEECH_PITCH: f32 = 1.0;

/// Default playback volume (0.0 to 1.0).
pub const SPEECH_VOLUME: f32 = 1.0;

/// Default chat completion endpoint.
pub const CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default chat model identifier sent in the request body.
pub const CHAT_MODEL: &str = "gpt-4o-mini";

/// Default cap on retained conversation turns (user/assistant pairs).
///
/// The full history is sent on every request; an unbounded session would grow
/// the payload without limit.
pub const MAX_HISTORY_TURNS: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_window_is_longer_than_min_speech() {
        // The detector arms on min speech and fires on the silence window;
        // inverted values would make every utterance end immediately.
        assert!(SILENCE_DURATION_MS > MIN_SPEECH_MS);
    }

    #[test]
    fn threshold_is_normalized() {
        assert!(SILENCE_THRESHOLD > 0.0 && SILENCE_THRESHOLD < 1.0);
    }

    #[test]
    fn chunk_limit_is_usable() {
        // A limit below a typical sentence would force mid-sentence splits.
        assert!(MAX_CHUNK_CHARS >= 80);
    }
}

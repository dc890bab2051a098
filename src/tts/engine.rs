//! The speech synthesis engine seam.
//!
//! An engine plays one utterance at a time and reports its lifecycle through
//! per-utterance events. The player owns ordering, timeouts, and retries; the
//! engine only synthesizes and cancels.

use crate::defaults;
use crossbeam_channel::{unbounded, Receiver};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Per-utterance synthesis settings.
#[derive(Debug, Clone)]
pub struct UtteranceConfig {
    /// BCP-47 language tag.
    pub language: String,
    /// Speaking rate multiplier.
    pub rate: f32,
    /// Pitch multiplier.
    pub pitch: f32,
    /// Volume, 0.0 to 1.0.
    pub volume: f32,
}

impl Default for UtteranceConfig {
    fn default() -> Self {
        Self {
            language: defaults::SPEECH_LANGUAGE.to_string(),
            rate: defaults::SPEECH_RATE,
            pitch: defaults::SPEECH_PITCH,
            volume: defaults::SPEECH_VOLUME,
        }
    }
}

/// Why an utterance did not finish normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisFault {
    /// The utterance was cancelled or interrupted; benign.
    Canceled,
    /// The engine failed to synthesize or play.
    Failed(String),
}

/// Lifecycle events of a single utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    /// Playback began.
    Started,
    /// Playback completed normally.
    Finished,
    /// Playback ended abnormally; see the fault for whether it was benign.
    Error(SynthesisFault),
}

/// Trait for speech synthesis engines.
pub trait SynthesisEngine: Send + Sync {
    /// Whether synthesis is usable on this platform.
    fn is_available(&self) -> bool;

    /// Begin one utterance; its events arrive on the returned receiver.
    fn begin(&self, text: &str, config: &UtteranceConfig) -> Receiver<UtteranceEvent>;

    /// Cancel the in-flight utterance, if any. It reports
    /// `Error(Canceled)` rather than finishing. Idempotent.
    fn cancel(&self);
}

/// Console synthesis: no audio hardware, just echoes utterances and simulates
/// their duration so the session timing behaves like real playback.
pub struct PlaceholderSynthesis {
    echo: bool,
    per_word: Duration,
    current_cancel: Mutex<Option<Arc<AtomicBool>>>,
}

impl PlaceholderSynthesis {
    /// Silent placeholder with a small simulated duration per word.
    pub fn new() -> Self {
        Self {
            echo: false,
            per_word: Duration::from_millis(50),
            current_cancel: Mutex::new(None),
        }
    }

    /// Print each utterance to stdout as it is "spoken".
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Override the simulated duration per word (tests use zero).
    pub fn with_word_duration(mut self, per_word: Duration) -> Self {
        self.per_word = per_word;
        self
    }
}

impl Default for PlaceholderSynthesis {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisEngine for PlaceholderSynthesis {
    fn is_available(&self) -> bool {
        true
    }

    fn begin(&self, text: &str, config: &UtteranceConfig) -> Receiver<UtteranceEvent> {
        let (tx, rx) = unbounded();
        let canceled = Arc::new(AtomicBool::new(false));
        if let Ok(mut slot) = self.current_cancel.lock() {
            *slot = Some(canceled.clone());
        }

        if self.echo {
            println!("[{}] {}", config.language, text);
        }

        let words = text.split_whitespace().count().max(1) as u32;
        let duration = self.per_word * words;
        thread::spawn(move || {
            let _ = tx.send(UtteranceEvent::Started);
            let step = Duration::from_millis(10);
            let mut remaining = duration;
            while remaining > Duration::ZERO {
                if canceled.load(Ordering::SeqCst) {
                    let _ = tx.send(UtteranceEvent::Error(SynthesisFault::Canceled));
                    return;
                }
                let slice = remaining.min(step);
                thread::sleep(slice);
                remaining -= slice;
            }
            let _ = tx.send(UtteranceEvent::Finished);
        });

        rx
    }

    fn cancel(&self) {
        if let Ok(slot) = self.current_cancel.lock()
            && let Some(flag) = slot.as_ref()
        {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

struct MockSynthState {
    spoken: Mutex<Vec<String>>,
    fail_remaining: AtomicU32,
    stall: AtomicBool,
    duration: Mutex<Duration>,
    current_cancel: Mutex<Option<Arc<AtomicBool>>>,
    cancel_count: AtomicU32,
}

/// Scriptable synthesis engine for tests: records utterances and can be told
/// to fail, stall, or take time.
#[derive(Clone)]
pub struct MockSynthesisEngine {
    state: Arc<MockSynthState>,
}

impl MockSynthesisEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockSynthState {
                spoken: Mutex::new(Vec::new()),
                fail_remaining: AtomicU32::new(0),
                stall: AtomicBool::new(false),
                duration: Mutex::new(Duration::ZERO),
                current_cancel: Mutex::new(None),
                cancel_count: AtomicU32::new(0),
            }),
        }
    }

    /// Fail the next `count` utterances with a genuine synthesis error.
    pub fn with_failures(self, count: u32) -> Self {
        self.state.fail_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Never deliver a terminal event (exercises the player timeout).
    pub fn with_stall(self) -> Self {
        self.state.stall.store(true, Ordering::SeqCst);
        self
    }

    /// Simulate playback taking this long per utterance.
    pub fn with_duration(self, duration: Duration) -> Self {
        if let Ok(mut slot) = self.state.duration.lock() {
            *slot = duration;
        }
        self
    }

    /// Every utterance text handed to `begin`, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.state
            .spoken
            .lock()
            .map(|texts| texts.clone())
            .unwrap_or_default()
    }

    /// How many times `cancel` has been called.
    pub fn cancel_count(&self) -> u32 {
        self.state.cancel_count.load(Ordering::SeqCst)
    }
}

impl Default for MockSynthesisEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SynthesisEngine for MockSynthesisEngine {
    fn is_available(&self) -> bool {
        true
    }

    fn begin(&self, text: &str, _config: &UtteranceConfig) -> Receiver<UtteranceEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut spoken) = self.state.spoken.lock() {
            spoken.push(text.to_string());
        }

        let canceled = Arc::new(AtomicBool::new(false));
        if let Ok(mut slot) = self.state.current_cancel.lock() {
            *slot = Some(canceled.clone());
        }

        let _ = tx.send(UtteranceEvent::Started);

        if self.state.stall.load(Ordering::SeqCst) {
            // Keep the sender alive so the receiver blocks instead of
            // observing a disconnect; report Canceled when asked to stop.
            thread::spawn(move || {
                loop {
                    if canceled.load(Ordering::SeqCst) {
                        let _ = tx.send(UtteranceEvent::Error(SynthesisFault::Canceled));
                        return;
                    }
                    thread::sleep(Duration::from_millis(10));
                }
            });
            return rx;
        }

        let failures = self.state.fail_remaining.load(Ordering::SeqCst);
        if failures > 0 {
            self.state.fail_remaining.store(failures - 1, Ordering::SeqCst);
            let _ = tx.send(UtteranceEvent::Error(SynthesisFault::Failed(
                "mock synthesis failure".to_string(),
            )));
            return rx;
        }

        let duration = self
            .state
            .duration
            .lock()
            .map(|d| *d)
            .unwrap_or(Duration::ZERO);
        if duration.is_zero() {
            let _ = tx.send(UtteranceEvent::Finished);
        } else {
            thread::spawn(move || {
                let step = Duration::from_millis(5);
                let mut remaining = duration;
                while remaining > Duration::ZERO {
                    if canceled.load(Ordering::SeqCst) {
                        let _ = tx.send(UtteranceEvent::Error(SynthesisFault::Canceled));
                        return;
                    }
                    let slice = remaining.min(step);
                    thread::sleep(slice);
                    remaining -= slice;
                }
                let _ = tx.send(UtteranceEvent::Finished);
            });
        }

        rx
    }

    fn cancel(&self) {
        self.state.cancel_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(slot) = self.state.current_cancel.lock()
            && let Some(flag) = slot.as_ref()
        {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

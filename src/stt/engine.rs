//! The continuous recognition engine seam.
//!
//! Platform speech-to-text engines deliver a stream of interim and final
//! results plus a small fixed error vocabulary. This trait abstracts one so
//! the recognizer can be driven by a real engine or a scripted mock.

use crate::error::Result;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Error vocabulary of a recognition engine.
///
/// Mirrors the codes continuous-recognition platforms report; the recognizer
/// decides which of these are recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFault {
    /// No speech was detected in the capture window.
    NoSpeech,
    /// The engine was aborted mid-utterance.
    Aborted,
    /// Audio capture failed (no usable microphone).
    AudioCapture,
    /// Microphone or recognition permission was denied.
    NotAllowed,
    /// The engine lost its network connection.
    Network,
    /// The recognition service refused the request.
    ServiceNotAllowed,
}

/// Events delivered by a running engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A recognition result. Final results are stable; interim results may
    /// still change.
    Result { text: String, is_final: bool },
    /// An engine error; the engine may keep running or follow up with
    /// [`EngineEvent::Ended`].
    Error(EngineFault),
    /// The engine terminated, intentionally or not.
    Ended,
}

/// Trait for continuous speech recognition engines.
///
/// At most one session is active at a time; `start` on a running engine is a
/// caller error. Events are delivered on the channel handed to `start`.
pub trait RecognitionEngine: Send {
    /// Whether recognition is usable on this platform; callers fail fast on
    /// false before starting a session.
    fn is_available(&self) -> bool;

    /// Begin continuous recognition, delivering events to `events`.
    fn start(&mut self, events: Sender<EngineEvent>) -> Result<()>;

    /// End recognition. The engine emits [`EngineEvent::Ended`] if a session
    /// was active. Idempotent.
    fn stop(&mut self) -> Result<()>;
}

struct MockEngineState {
    events: Mutex<Option<Sender<EngineEvent>>>,
    start_count: AtomicU32,
    running: AtomicBool,
}

/// Scriptable recognition engine for tests.
///
/// Events are pushed through the paired [`MockEngineHandle`], so tests control
/// exactly when results, faults, and terminations arrive.
pub struct MockRecognitionEngine {
    state: Arc<MockEngineState>,
    available: bool,
}

/// Test-side handle emitting events into a [`MockRecognitionEngine`].
#[derive(Clone)]
pub struct MockEngineHandle {
    state: Arc<MockEngineState>,
}

impl MockRecognitionEngine {
    /// Creates an available engine and its event handle.
    pub fn new() -> (Self, MockEngineHandle) {
        let state = Arc::new(MockEngineState {
            events: Mutex::new(None),
            start_count: AtomicU32::new(0),
            running: AtomicBool::new(false),
        });
        (
            Self {
                state: state.clone(),
                available: true,
            },
            MockEngineHandle { state },
        )
    }

    /// Configure the engine to report itself unavailable.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

impl RecognitionEngine for MockRecognitionEngine {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self, events: Sender<EngineEvent>) -> Result<()> {
        if self.state.running.load(Ordering::SeqCst) {
            return Err(crate::error::VoxError::AlreadyRunning);
        }
        if let Ok(mut slot) = self.state.events.lock() {
            *slot = Some(events);
        }
        self.state.start_count.fetch_add(1, Ordering::SeqCst);
        self.state.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let was_running = self.state.running.swap(false, Ordering::SeqCst);
        let events = self.state.events.lock().ok().and_then(|mut slot| slot.take());
        if was_running
            && let Some(events) = events
        {
            let _ = events.send(EngineEvent::Ended);
        }
        Ok(())
    }
}

impl MockEngineHandle {
    fn emit(&self, event: EngineEvent) {
        let events = self.state.events.lock().ok().and_then(|slot| slot.clone());
        if let Some(events) = events {
            let _ = events.send(event);
        }
    }

    /// Emit a final recognition result.
    pub fn emit_final(&self, text: &str) {
        self.emit(EngineEvent::Result {
            text: text.to_string(),
            is_final: true,
        });
    }

    /// Emit an interim recognition result.
    pub fn emit_interim(&self, text: &str) {
        self.emit(EngineEvent::Result {
            text: text.to_string(),
            is_final: false,
        });
    }

    /// Emit an engine fault.
    pub fn emit_fault(&self, fault: EngineFault) {
        self.emit(EngineEvent::Error(fault));
    }

    /// Emit an unexpected termination (engine died on its own).
    pub fn emit_ended(&self) {
        self.state.running.store(false, Ordering::SeqCst);
        self.emit(EngineEvent::Ended);
    }

    /// How many times `start` has been called (observes auto-restart).
    pub fn start_count(&self) -> u32 {
        self.state.start_count.load(Ordering::SeqCst)
    }

    /// Whether the engine currently has an active session.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_mock_engine_delivers_events_after_start() {
        let (mut engine, handle) = MockRecognitionEngine::new();
        let (tx, rx) = unbounded();

        engine.start(tx).unwrap();
        handle.emit_final("hello");

        assert_eq!(
            rx.recv().unwrap(),
            EngineEvent::Result {
                text: "hello".to_string(),
                is_final: true
            }
        );
        assert_eq!(handle.start_count(), 1);
    }

    #[test]
    fn test_mock_engine_stop_emits_ended() {
        let (mut engine, handle) = MockRecognitionEngine::new();
        let (tx, rx) = unbounded();

        engine.start(tx).unwrap();
        assert!(handle.is_running());

        engine.stop().unwrap();
        assert!(!handle.is_running());
        assert_eq!(rx.recv().unwrap(), EngineEvent::Ended);

        // Idempotent: a second stop emits nothing further.
        engine.stop().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_mock_engine_emit_before_start_is_dropped() {
        let (_engine, handle) = MockRecognitionEngine::new();
        // No session yet: emitting must not panic, event goes nowhere.
        handle.emit_final("lost");
    }

    #[test]
    fn test_mock_engine_rejects_double_start() {
        let (mut engine, _handle) = MockRecognitionEngine::new();
        let (tx, _rx) = unbounded();
        engine.start(tx.clone()).unwrap();
        assert!(engine.start(tx).is_err());
    }

    #[test]
    fn test_unavailable_engine() {
        let (engine, _handle) = MockRecognitionEngine::new();
        assert!(engine.is_available());

        let (engine, _handle) = MockRecognitionEngine::new();
        let engine = engine.unavailable();
        assert!(!engine.is_available());
    }
}

//! Speech recognizer: transcript accumulation over a continuous engine.
//!
//! Silence is judged against the live transcript stream, not wall-clock time:
//! every event that produces text re-arms the embedded silence timer.

use crate::error::{Result, VoxError};
use crate::silence::timer::{SilenceTimer, SilenceTimerConfig};
use crate::stt::engine::{EngineEvent, EngineFault, RecognitionEngine};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Configuration for the recognizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecognizerConfig {
    /// Silence timer settings; the countdown restarts on every transcript
    /// update.
    pub silence: SilenceTimerConfig,
}

/// Callbacks invoked from the recognizer's event thread.
pub struct RecognizerCallbacks {
    /// Live transcript (finalized text plus interim tail, trimmed), pushed on
    /// every event that changes it to something non-empty.
    pub on_transcript: Box<dyn Fn(&str) + Send + Sync>,
    /// End of utterance: the silence countdown expired.
    pub on_silence: Box<dyn Fn() + Send + Sync>,
    /// A non-recoverable engine condition, already mapped to a user-facing
    /// category.
    pub on_error: Box<dyn Fn(VoxError) + Send + Sync>,
    /// Intentional termination only; unexpected engine exits restart
    /// transparently and never reach this.
    pub on_end: Box<dyn Fn() + Send + Sync>,
}

/// Finalized plus interim transcript text.
///
/// The displayed/sent transcript is always the trimmed concatenation of both
/// parts. Mutated only under its mutex: the engine event thread writes, the
/// orchestrator reads-and-clears through `finalize_transcript`.
#[derive(Debug, Default)]
struct TranscriptState {
    accumulated_final: String,
    interim_tail: String,
}

impl TranscriptState {
    fn apply(&mut self, text: &str, is_final: bool) {
        let piece = text.trim();
        if is_final {
            if !piece.is_empty() {
                if !self.accumulated_final.is_empty() {
                    self.accumulated_final.push(' ');
                }
                self.accumulated_final.push_str(piece);
            }
            self.interim_tail.clear();
        } else {
            self.interim_tail = piece.to_string();
        }
    }

    fn combined(&self) -> String {
        let mut text = self.accumulated_final.clone();
        if !self.interim_tail.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&self.interim_tail);
        }
        text.trim().to_string()
    }

    fn clear(&mut self) {
        self.accumulated_final.clear();
        self.interim_tail.clear();
    }
}

enum PumpCmd {
    Stop,
}

/// Continuous speech recognizer.
///
/// Wraps a [`RecognitionEngine`], accumulates its results, restarts it on
/// unexpected termination while listening is still wanted, and drives the
/// silence timer from transcript activity.
pub struct SpeechRecognizer {
    transcript: Arc<Mutex<TranscriptState>>,
    wants_listening: Arc<AtomicBool>,
    timer: Arc<SilenceTimer>,
    ctrl_tx: Sender<PumpCmd>,
    pump: Option<JoinHandle<()>>,
}

impl SpeechRecognizer {
    /// Starts recognition.
    ///
    /// Fails fast with [`VoxError::Unsupported`] when the engine is not
    /// available on this platform, and propagates engine start errors
    /// (permission denial, missing microphone) synchronously.
    pub fn start(
        config: RecognizerConfig,
        mut engine: Box<dyn RecognitionEngine>,
        callbacks: RecognizerCallbacks,
    ) -> Result<Self> {
        if !engine.is_available() {
            return Err(VoxError::Unsupported {
                what: "Speech recognition".to_string(),
            });
        }

        let callbacks = Arc::new(callbacks);
        let on_silence = callbacks.clone();
        let timer = Arc::new(SilenceTimer::new(config.silence, move || {
            (on_silence.on_silence)()
        }));

        let transcript = Arc::new(Mutex::new(TranscriptState::default()));
        let wants_listening = Arc::new(AtomicBool::new(true));

        let (event_tx, event_rx) = unbounded();
        let (ctrl_tx, ctrl_rx) = unbounded();

        engine.start(event_tx.clone())?;
        timer.start();

        let pump = {
            let transcript = transcript.clone();
            let wants_listening = wants_listening.clone();
            let timer = timer.clone();
            thread::spawn(move || {
                pump_loop(
                    engine,
                    event_tx,
                    event_rx,
                    ctrl_rx,
                    transcript,
                    wants_listening,
                    timer,
                    callbacks,
                );
            })
        };

        Ok(Self {
            transcript,
            wants_listening,
            timer,
            ctrl_tx,
            pump: Some(pump),
        })
    }

    /// Returns the combined transcript and atomically clears both buffers.
    ///
    /// This is the single hand-off point to the orchestrator: a second call
    /// without new speech returns an empty string.
    pub fn finalize_transcript(&self) -> String {
        match self.transcript.lock() {
            Ok(mut state) => {
                let combined = state.combined();
                state.clear();
                combined
            }
            Err(_) => String::new(),
        }
    }

    /// Clears transcript state and re-arms silence detection for the next
    /// utterance.
    pub fn resume(&self) {
        if let Ok(mut state) = self.transcript.lock() {
            state.clear();
        }
        self.timer.resume();
    }

    /// Suspends silence detection (used while a reply is being processed or
    /// spoken) without touching the engine.
    pub fn pause_detection(&self) {
        self.timer.pause();
    }

    /// Ends recognition intentionally: the engine is stopped, `on_end` fires
    /// once, and the event thread is reclaimed. Idempotent.
    pub fn stop(&mut self) {
        self.wants_listening.store(false, Ordering::SeqCst);
        let _ = self.ctrl_tx.send(PumpCmd::Stop);
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
        self.timer.stop();
    }
}

impl Drop for SpeechRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
fn pump_loop(
    mut engine: Box<dyn RecognitionEngine>,
    event_tx: Sender<EngineEvent>,
    event_rx: Receiver<EngineEvent>,
    ctrl_rx: Receiver<PumpCmd>,
    transcript: Arc<Mutex<TranscriptState>>,
    wants_listening: Arc<AtomicBool>,
    timer: Arc<SilenceTimer>,
    callbacks: Arc<RecognizerCallbacks>,
) {
    loop {
        crossbeam_channel::select! {
            recv(event_rx) -> event => match event {
                Ok(EngineEvent::Result { text, is_final }) => {
                    let combined = match transcript.lock() {
                        Ok(mut state) => {
                            state.apply(&text, is_final);
                            state.combined()
                        }
                        Err(_) => continue,
                    };
                    if !combined.is_empty() {
                        (callbacks.on_transcript)(&combined);
                        timer.activity();
                    }
                }
                Ok(EngineEvent::Error(fault)) => match fault {
                    // Recoverable: the engine keeps going or restarts below.
                    EngineFault::NoSpeech | EngineFault::Aborted => {}
                    other => (callbacks.on_error)(map_fault(other)),
                },
                Ok(EngineEvent::Ended) => {
                    if wants_listening.load(Ordering::SeqCst) {
                        // Unexpected termination: restart transparently.
                        if let Err(e) = engine.start(event_tx.clone()) {
                            (callbacks.on_error)(e);
                            (callbacks.on_end)();
                            break;
                        }
                    } else {
                        (callbacks.on_end)();
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(ctrl_rx) -> cmd => match cmd {
                Ok(PumpCmd::Stop) | Err(_) => {
                    let _ = engine.stop();
                    (callbacks.on_end)();
                    break;
                }
            },
        }
    }
}

fn map_fault(fault: EngineFault) -> VoxError {
    match fault {
        EngineFault::Network => VoxError::Network {
            message: "speech engine lost its connection".to_string(),
        },
        EngineFault::NotAllowed => VoxError::PermissionDenied {
            message: "speech recognition was not allowed".to_string(),
        },
        EngineFault::AudioCapture => VoxError::NoMicrophone {
            message: "speech engine could not capture audio".to_string(),
        },
        EngineFault::ServiceNotAllowed => VoxError::ServiceUnavailable {
            message: "speech recognition service refused the request".to_string(),
        },
        // Handled before mapping; kept for exhaustiveness.
        EngineFault::NoSpeech | EngineFault::Aborted => VoxError::Recognition {
            message: "transient engine condition".to_string(),
        },
    }
}

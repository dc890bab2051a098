//! The voice session orchestrator.
//!
//! Binds the recognizer, the chat backend, and the player into the status
//! cycle. Component events arrive on one channel tagged with the session
//! epoch; the loop re-checks epoch and status before every action, so a
//! delayed callback from a previous life of the session is a no-op.

use crate::chat::client::ChatBackend;
use crate::chat::history::ConversationHistory;
use crate::error::{Result, VoxError};
use crate::session::status::{SessionStatus, StatusCell};
use crate::stt::engine::RecognitionEngine;
use crate::stt::recognizer::{RecognizerCallbacks, RecognizerConfig, SpeechRecognizer};
use crate::tts::engine::SynthesisEngine;
use crate::tts::player::{PlayerConfig, TextToSpeechPlayer};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Configuration for a voice session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub recognizer: RecognizerConfig,
    pub player: PlayerConfig,
    /// Optional persona message seeding the conversation.
    pub system_prompt: Option<String>,
    /// Cap on retained user/assistant turns (0 = unbounded).
    pub max_history_turns: usize,
}

/// Callbacks surfacing session activity to the application.
pub struct SessionCallbacks {
    /// Every status change, in order.
    pub on_status: Box<dyn Fn(SessionStatus) + Send + Sync>,
    /// Live transcript updates while listening.
    pub on_transcript: Box<dyn Fn(&str) + Send + Sync>,
    /// Each complete assistant reply, before it is spoken.
    pub on_reply: Box<dyn Fn(&str) + Send + Sync>,
    /// User-visible, non-fatal notices (failed backend call, engine faults).
    pub on_error: Box<dyn Fn(VoxError) + Send + Sync>,
}

enum SessionEvent {
    SilenceDetected { epoch: u64 },
    SpeakingChanged { epoch: u64, speaking: bool },
    End,
}

/// A running voice session.
///
/// Created by [`VoiceSession::start`]; ended by [`VoiceSession::end`] (or
/// drop), which forces idle from any state.
pub struct VoiceSession {
    status: Arc<StatusCell>,
    epoch: Arc<AtomicU64>,
    cancel_chat: Arc<AtomicBool>,
    event_tx: Sender<SessionEvent>,
    recognizer: Arc<Mutex<Option<SpeechRecognizer>>>,
    player: Arc<TextToSpeechPlayer>,
    callbacks: Arc<SessionCallbacks>,
    event_loop: Option<JoinHandle<()>>,
}

impl VoiceSession {
    /// Starts a session: capability checks, recognizer startup, and the event
    /// loop. On failure the status is back at idle and the error describes
    /// what the user should do (unsupported platform, denied microphone).
    pub fn start(
        config: SessionConfig,
        engine: Box<dyn RecognitionEngine>,
        backend: Arc<dyn ChatBackend>,
        synthesis: Arc<dyn SynthesisEngine>,
        callbacks: SessionCallbacks,
    ) -> Result<VoiceSession> {
        let status = Arc::new(StatusCell::new());
        let epoch = Arc::new(AtomicU64::new(1));
        let cancel_chat = Arc::new(AtomicBool::new(false));
        let callbacks = Arc::new(callbacks);

        status.transition(SessionStatus::Connecting)?;
        (callbacks.on_status)(SessionStatus::Connecting);

        // Fail fast before touching any device.
        if !synthesis.is_available() {
            status.force_idle();
            (callbacks.on_status)(SessionStatus::Idle);
            return Err(VoxError::Unsupported {
                what: "Speech synthesis".to_string(),
            });
        }

        let (event_tx, event_rx) = unbounded();

        let player = {
            let event_tx = event_tx.clone();
            let epoch = epoch.clone();
            Arc::new(TextToSpeechPlayer::new(
                config.player.clone(),
                synthesis,
                move |speaking| {
                    let _ = event_tx.send(SessionEvent::SpeakingChanged {
                        epoch: epoch.load(Ordering::SeqCst),
                        speaking,
                    });
                },
            ))
        };

        let recognizer = {
            let event_tx = event_tx.clone();
            let epoch = epoch.clone();
            let transcript_cb = callbacks.clone();
            let error_cb = callbacks.clone();
            SpeechRecognizer::start(
                config.recognizer,
                engine,
                RecognizerCallbacks {
                    on_transcript: Box::new(move |text| (transcript_cb.on_transcript)(text)),
                    on_silence: Box::new(move || {
                        let _ = event_tx.send(SessionEvent::SilenceDetected {
                            epoch: epoch.load(Ordering::SeqCst),
                        });
                    }),
                    on_error: Box::new(move |err| (error_cb.on_error)(err)),
                    on_end: Box::new(|| {}),
                },
            )
        };

        let recognizer = match recognizer {
            Ok(recognizer) => Arc::new(Mutex::new(Some(recognizer))),
            Err(e) => {
                // Permission denial or unsupported platform: back to idle.
                status.force_idle();
                (callbacks.on_status)(SessionStatus::Idle);
                return Err(e);
            }
        };

        status.transition(SessionStatus::Listening)?;
        (callbacks.on_status)(SessionStatus::Listening);

        let event_loop = {
            let status = status.clone();
            let epoch = epoch.clone();
            let cancel_chat = cancel_chat.clone();
            let recognizer = recognizer.clone();
            let player = player.clone();
            let callbacks = callbacks.clone();
            let mut history = ConversationHistory::with_max_turns(config.max_history_turns);
            if let Some(prompt) = &config.system_prompt {
                history = history.with_system_prompt(prompt.clone());
            }

            thread::spawn(move || {
                run_event_loop(
                    event_rx,
                    status,
                    epoch,
                    cancel_chat,
                    recognizer,
                    player,
                    backend,
                    history,
                    callbacks,
                );
            })
        };

        Ok(VoiceSession {
            status,
            epoch,
            cancel_chat,
            event_tx,
            recognizer,
            player,
            callbacks,
            event_loop: Some(event_loop),
        })
    }

    /// The current session status.
    pub fn status(&self) -> SessionStatus {
        self.status.get()
    }

    /// Ends the session from any state: cancels the in-flight backend call,
    /// stops playback and recognition, and forces idle. Idempotent.
    pub fn end(&mut self) {
        // Invalidate every pending and future event from this life, and
        // settle the status before components emit their shutdown events so
        // none of them can re-enter the cycle.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel_chat.store(true, Ordering::SeqCst);
        let was_idle = self.status.get() == SessionStatus::Idle;
        self.status.force_idle();

        if let Ok(mut slot) = self.recognizer.lock()
            && let Some(mut recognizer) = slot.take()
        {
            recognizer.stop();
        }
        self.player.stop();

        if !was_idle {
            (self.callbacks.on_status)(SessionStatus::Idle);
        }

        let _ = self.event_tx.send(SessionEvent::End);
        if let Some(event_loop) = self.event_loop.take() {
            let _ = event_loop.join();
        }
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        self.end();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_event_loop(
    event_rx: Receiver<SessionEvent>,
    status: Arc<StatusCell>,
    epoch: Arc<AtomicU64>,
    cancel_chat: Arc<AtomicBool>,
    recognizer: Arc<Mutex<Option<SpeechRecognizer>>>,
    player: Arc<TextToSpeechPlayer>,
    backend: Arc<dyn ChatBackend>,
    mut history: ConversationHistory,
    callbacks: Arc<SessionCallbacks>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("voxloop: failed to build session runtime: {e}");
            status.force_idle();
            return;
        }
    };

    let with_recognizer = |f: &dyn Fn(&SpeechRecognizer)| {
        if let Ok(slot) = recognizer.lock()
            && let Some(recognizer) = slot.as_ref()
        {
            f(recognizer);
        }
    };

    while let Ok(event) = event_rx.recv() {
        match event {
            SessionEvent::End => break,

            SessionEvent::SilenceDetected { epoch: ev_epoch } => {
                if ev_epoch != epoch.load(Ordering::SeqCst) {
                    continue;
                }

                let utterance = match recognizer.lock() {
                    Ok(slot) => match slot.as_ref() {
                        Some(recognizer) => recognizer.finalize_transcript(),
                        None => continue,
                    },
                    Err(_) => continue,
                };

                if utterance.is_empty() {
                    // Nothing was said; stay listening with a fresh detector.
                    with_recognizer(&|r| r.resume());
                    continue;
                }

                if !status.transition_from(SessionStatus::Listening, SessionStatus::Processing) {
                    continue;
                }
                (callbacks.on_status)(SessionStatus::Processing);

                history.push_user(&utterance);
                let result = runtime.block_on(backend.stream_chat(
                    history.messages(),
                    &|_delta| {},
                    &cancel_chat,
                ));

                // State may have changed while suspended on the stream.
                if ev_epoch != epoch.load(Ordering::SeqCst)
                    || status.get() != SessionStatus::Processing
                {
                    continue;
                }

                match result {
                    Ok(reply) => {
                        let reply = reply.trim().to_string();
                        if reply.is_empty() {
                            if status
                                .transition_from(SessionStatus::Processing, SessionStatus::Listening)
                            {
                                (callbacks.on_status)(SessionStatus::Listening);
                                with_recognizer(&|r| r.resume());
                            }
                        } else {
                            history.push_assistant(&reply);
                            (callbacks.on_reply)(&reply);
                            if status
                                .transition_from(SessionStatus::Processing, SessionStatus::Speaking)
                            {
                                (callbacks.on_status)(SessionStatus::Speaking);
                                player.speak(&reply);
                            }
                        }
                    }
                    Err(e) => {
                        // Visible but non-fatal: the session stays alive.
                        (callbacks.on_error)(e);
                        if status
                            .transition_from(SessionStatus::Processing, SessionStatus::Listening)
                        {
                            (callbacks.on_status)(SessionStatus::Listening);
                            with_recognizer(&|r| r.resume());
                        }
                    }
                }
            }

            SessionEvent::SpeakingChanged {
                epoch: ev_epoch,
                speaking,
            } => {
                if ev_epoch != epoch.load(Ordering::SeqCst) || speaking {
                    continue;
                }
                // Playback finished: clear stale transcript and listen again.
                if status.transition_from(SessionStatus::Speaking, SessionStatus::Listening) {
                    (callbacks.on_status)(SessionStatus::Listening);
                    with_recognizer(&|r| r.resume());
                }
            }
        }
    }
}

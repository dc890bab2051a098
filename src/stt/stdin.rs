//! Typed-input recognition engine.
//!
//! Reads lines from standard input and delivers each one as a final result,
//! driving the full session pipeline without a platform speech engine. The
//! silence timer then ends the utterance the usual way, so multi-line input
//! inside the threshold accumulates into one utterance.

use crate::error::Result;
use crate::stt::engine::{EngineEvent, RecognitionEngine};
use crossbeam_channel::Sender;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Recognition engine backed by stdin lines.
pub struct StdinRecognitionEngine {
    running: Arc<AtomicBool>,
    exhausted: Arc<AtomicBool>,
}

impl StdinRecognitionEngine {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            exhausted: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for StdinRecognitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognitionEngine for StdinRecognitionEngine {
    fn is_available(&self) -> bool {
        // Terminal or pipe, stdin is always readable.
        true
    }

    fn start(&mut self, events: Sender<EngineEvent>) -> Result<()> {
        if self.exhausted.load(Ordering::SeqCst) {
            // Input hit EOF; restarting would spin on an empty stream.
            return Err(crate::error::VoxError::Recognition {
                message: "input stream exhausted".to_string(),
            });
        }

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let exhausted = self.exhausted.clone();

        // The reader blocks on stdin and cannot be interrupted; it detaches
        // on stop and dies with the process.
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                match line {
                    Ok(line) => {
                        let text = line.trim();
                        if text.is_empty() {
                            continue;
                        }
                        let event = EngineEvent::Result {
                            text: text.to_string(),
                            is_final: true,
                        };
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                    Err(_) => break,
                }
            }
            exhausted.store(true, Ordering::SeqCst);
            if running.load(Ordering::SeqCst) {
                let _ = events.send(EngineEvent::Ended);
            }
        });

        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdin_engine_is_available() {
        assert!(StdinRecognitionEngine::new().is_available());
    }

    #[test]
    fn test_start_after_exhaustion_fails() {
        let mut engine = StdinRecognitionEngine::new();
        engine.exhausted.store(true, Ordering::SeqCst);

        let (tx, _rx) = crossbeam_channel::unbounded();
        assert!(engine.start(tx).is_err());
    }
}

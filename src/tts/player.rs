//! FIFO speech player.
//!
//! One consumer thread drains a queue of text chunks through the synthesis
//! engine; a generation counter is the single cancellation mechanism — a new
//! `speak()` or a `stop()` bumps it, and the consumer skips every job tagged
//! with an older generation.

use crate::defaults;
use crate::tts::chunker::chunk_text;
use crate::tts::engine::{SynthesisEngine, SynthesisFault, UtteranceConfig, UtteranceEvent};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Configuration for the player.
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Maximum characters per chunk handed to the engine.
    pub max_chunk_chars: usize,
    /// Independent timeout per chunk; a stalled engine is cancelled and the
    /// queue moves on.
    pub chunk_timeout: Duration,
    /// Utterance settings passed to the engine for every chunk.
    pub utterance: UtteranceConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: defaults::MAX_CHUNK_CHARS,
            chunk_timeout: Duration::from_secs(defaults::CHUNK_TIMEOUT_SECS),
            utterance: UtteranceConfig::default(),
        }
    }
}

enum Job {
    Chunk { stamp: u64, text: String },
    /// Marks the end of one `speak()` batch; flips speaking off when it is
    /// still the current generation.
    End { stamp: u64 },
}

#[derive(Debug, PartialEq, Eq)]
enum ChunkOutcome {
    Done,
    Failed,
    TimedOut,
}

/// Queued text-to-speech playback with exactly-once speaking transitions.
pub struct TextToSpeechPlayer {
    engine: Arc<dyn SynthesisEngine>,
    config: PlayerConfig,
    job_tx: Option<Sender<Job>>,
    generation: Arc<AtomicU64>,
    speaking: Arc<AtomicBool>,
    on_speaking: Arc<dyn Fn(bool) + Send + Sync>,
    worker: Option<JoinHandle<()>>,
}

impl TextToSpeechPlayer {
    /// Creates the player and its consumer thread.
    ///
    /// `on_speaking` fires exactly once on each false→true and true→false
    /// transition of the speaking state.
    pub fn new<F>(config: PlayerConfig, engine: Arc<dyn SynthesisEngine>, on_speaking: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let (job_tx, job_rx) = unbounded();
        let generation = Arc::new(AtomicU64::new(0));
        let speaking = Arc::new(AtomicBool::new(false));
        let on_speaking: Arc<dyn Fn(bool) + Send + Sync> = Arc::new(on_speaking);

        let worker = {
            let engine = engine.clone();
            let config = config.clone();
            let generation = generation.clone();
            let speaking = speaking.clone();
            let on_speaking = on_speaking.clone();
            thread::spawn(move || {
                consume_queue(engine, config, job_rx, generation, speaking, on_speaking);
            })
        };

        Self {
            engine,
            config,
            job_tx: Some(job_tx),
            generation,
            speaking,
            on_speaking,
            worker: Some(worker),
        }
    }

    /// Speaks `text`, superseding any in-progress speech.
    ///
    /// The previous queue becomes stale (generation bump) and the in-flight
    /// utterance is cancelled; the new chunks then play strictly in order.
    pub fn speak(&self, text: &str) {
        let chunks = chunk_text(text, self.config.max_chunk_chars);

        let stamp = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.engine.cancel();

        // The End marker goes out even with no chunks, so superseding live
        // speech with empty text still flips speaking off.
        if let Some(tx) = &self.job_tx {
            for text in chunks {
                let _ = tx.send(Job::Chunk { stamp, text });
            }
            let _ = tx.send(Job::End { stamp });
        }
    }

    /// Clears the queue, cancels the in-flight utterance, and synchronously
    /// flips speaking to false if it was true. Idempotent.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.engine.cancel();
        if self
            .speaking
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            (self.on_speaking)(false);
        }
    }

    /// Returns true while the consumer is draining chunks.
    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn shutdown(&mut self) {
        self.stop();
        // Disconnecting the channel ends the consumer loop.
        self.job_tx = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for TextToSpeechPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn consume_queue(
    engine: Arc<dyn SynthesisEngine>,
    config: PlayerConfig,
    job_rx: Receiver<Job>,
    generation: Arc<AtomicU64>,
    speaking: Arc<AtomicBool>,
    on_speaking: Arc<dyn Fn(bool) + Send + Sync>,
) {
    while let Ok(job) = job_rx.recv() {
        match job {
            Job::Chunk { stamp, text } => {
                if stamp != generation.load(Ordering::SeqCst) {
                    continue;
                }
                if speaking
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    on_speaking(true);
                }

                let outcome = play_chunk(&*engine, &text, &config);
                if outcome == ChunkOutcome::Failed
                    && stamp == generation.load(Ordering::SeqCst)
                {
                    // One bounded retry with a truncated chunk, then skip.
                    let truncated: String = text.chars().take(text.chars().count() / 2).collect();
                    let truncated = truncated.trim();
                    if !truncated.is_empty() {
                        let _ = play_chunk(&*engine, truncated, &config);
                    }
                }
            }
            Job::End { stamp } => {
                if stamp != generation.load(Ordering::SeqCst) {
                    continue;
                }
                if speaking
                    .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    on_speaking(false);
                }
            }
        }
    }
}

/// Plays one chunk to a terminal event, bounded by the chunk timeout.
fn play_chunk(engine: &dyn SynthesisEngine, text: &str, config: &PlayerConfig) -> ChunkOutcome {
    let events = engine.begin(text, &config.utterance);
    let deadline = Instant::now() + config.chunk_timeout;

    loop {
        let now = Instant::now();
        if now >= deadline {
            engine.cancel();
            return ChunkOutcome::TimedOut;
        }
        match events.recv_timeout(deadline - now) {
            Ok(UtteranceEvent::Started) => continue,
            Ok(UtteranceEvent::Finished) => return ChunkOutcome::Done,
            // Interrupted/cancelled is benign: resolve as success.
            Ok(UtteranceEvent::Error(SynthesisFault::Canceled)) => return ChunkOutcome::Done,
            Ok(UtteranceEvent::Error(SynthesisFault::Failed(_))) => return ChunkOutcome::Failed,
            Err(RecvTimeoutError::Timeout) => {
                engine.cancel();
                return ChunkOutcome::TimedOut;
            }
            Err(RecvTimeoutError::Disconnected) => return ChunkOutcome::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::engine::MockSynthesisEngine;
    use std::sync::Mutex;

    fn recording_player(
        engine: &MockSynthesisEngine,
        config: PlayerConfig,
    ) -> (TextToSpeechPlayer, Arc<Mutex<Vec<bool>>>) {
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let transitions_cb = transitions.clone();
        let player = TextToSpeechPlayer::new(config, Arc::new(engine.clone()), move |speaking| {
            transitions_cb.lock().unwrap().push(speaking);
        });
        (player, transitions)
    }

    fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    fn assert_balanced_alternating(transitions: &[bool]) {
        let mut expected = true;
        for &t in transitions {
            assert_eq!(t, expected, "transitions must alternate: {:?}", transitions);
            expected = !expected;
        }
        assert!(
            transitions.len() % 2 == 0,
            "equal true and false transitions required: {:?}",
            transitions
        );
    }

    #[test]
    fn test_chunks_play_in_order_with_one_transition_pair() {
        let engine = MockSynthesisEngine::new();
        let (player, transitions) = recording_player(
            &engine,
            PlayerConfig {
                max_chunk_chars: 12,
                ..Default::default()
            },
        );

        player.speak("First one. Second one.");

        assert!(wait_until(
            || transitions.lock().unwrap().as_slice() == [true, false],
            Duration::from_secs(2)
        ));
        assert_eq!(engine.spoken(), vec!["First one.", "Second one."]);
        assert!(!player.is_speaking());
    }

    #[test]
    fn test_superseding_speak_drops_stale_queue() {
        let engine = MockSynthesisEngine::new().with_duration(Duration::from_millis(60));
        let (player, transitions) = recording_player(
            &engine,
            PlayerConfig {
                max_chunk_chars: 10,
                ..Default::default()
            },
        );

        player.speak("One. Two. Three.");
        thread::sleep(Duration::from_millis(20));
        player.speak("Different.");

        assert!(wait_until(
            || engine.spoken().last().map(String::as_str) == Some("Different.")
                && !player.is_speaking(),
            Duration::from_secs(2)
        ));

        let spoken = engine.spoken();
        assert!(
            !spoken.contains(&"Two.".to_string()) && !spoken.contains(&"Three.".to_string()),
            "superseded chunks must not play: {:?}",
            spoken
        );
        assert_balanced_alternating(&transitions.lock().unwrap());
    }

    #[test]
    fn test_stop_flips_speaking_synchronously_and_clears_queue() {
        let engine = MockSynthesisEngine::new().with_duration(Duration::from_millis(100));
        let (player, transitions) = recording_player(
            &engine,
            PlayerConfig {
                max_chunk_chars: 10,
                ..Default::default()
            },
        );

        player.speak("One. Two.");
        assert!(wait_until(|| player.is_speaking(), Duration::from_secs(1)));

        player.stop();
        assert!(!player.is_speaking(), "stop must flip speaking synchronously");

        thread::sleep(Duration::from_millis(200));
        assert_eq!(engine.spoken().len(), 1, "queued chunk must not play after stop");

        // Idempotent: a second stop adds no transition.
        player.stop();
        let recorded = transitions.lock().unwrap().clone();
        assert_eq!(recorded, vec![true, false]);
    }

    #[test]
    fn test_failed_chunk_retries_truncated_then_continues() {
        // Two failures: the original attempt and its truncated retry.
        let engine = MockSynthesisEngine::new().with_failures(2);
        let (player, transitions) = recording_player(
            &engine,
            PlayerConfig {
                max_chunk_chars: 16,
                ..Default::default()
            },
        );

        player.speak("HelloHelloHello. Next.");

        assert!(wait_until(
            || engine.spoken().len() == 3 && !player.is_speaking(),
            Duration::from_secs(2)
        ));

        let spoken = engine.spoken();
        assert_eq!(spoken[0], "HelloHelloHello.");
        assert!(
            spoken[0].starts_with(&spoken[1]) && spoken[1].len() < spoken[0].len(),
            "retry must be a truncated version: {:?}",
            spoken
        );
        assert_eq!(spoken[2], "Next.");
        assert_balanced_alternating(&transitions.lock().unwrap());
    }

    #[test]
    fn test_stalled_chunk_times_out_and_queue_moves_on() {
        let engine = MockSynthesisEngine::new().with_stall();
        let (player, transitions) = recording_player(
            &engine,
            PlayerConfig {
                max_chunk_chars: 10,
                chunk_timeout: Duration::from_millis(40),
                ..Default::default()
            },
        );

        player.speak("Stuck. Next.");

        assert!(wait_until(
            || engine.spoken().len() == 2 && !player.is_speaking(),
            Duration::from_secs(2)
        ));
        assert!(engine.cancel_count() >= 2, "timed-out chunks must be cancelled");
        assert_balanced_alternating(&transitions.lock().unwrap());
    }

    #[test]
    fn test_empty_text_causes_no_transitions() {
        let engine = MockSynthesisEngine::new();
        let (player, transitions) = recording_player(&engine, PlayerConfig::default());

        player.speak("   ");
        thread::sleep(Duration::from_millis(50));

        assert!(engine.spoken().is_empty());
        assert!(transitions.lock().unwrap().is_empty());
        assert!(!player.is_speaking());
    }

    #[test]
    fn test_transitions_balanced_across_many_speaks() {
        let engine = MockSynthesisEngine::new();
        let (player, transitions) = recording_player(&engine, PlayerConfig::default());

        for i in 0..5 {
            player.speak(&format!("Utterance number {}.", i));
            thread::sleep(Duration::from_millis(20));
        }

        assert!(wait_until(|| !player.is_speaking(), Duration::from_secs(2)));
        thread::sleep(Duration::from_millis(50));

        let recorded = transitions.lock().unwrap().clone();
        assert_balanced_alternating(&recorded);
        assert!(!recorded.is_empty());
    }
}

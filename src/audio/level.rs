//! RMS energy metering and the energy-based silence detector.
//!
//! The analyzer polls an [`AudioSource`] at roughly frame rate, reports the
//! normalized level of every frame for visualization, and runs a
//! [`SilenceWindow`] over the thresholded levels to detect end of utterance.

use crate::audio::recorder::AudioSource;
use crate::defaults;
use crate::error::Result;
use crate::silence::window::{Clock, SilenceWindow, SilenceWindowConfig, SystemClock, WindowEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where 0.0 is silence and ~0.707 is a
/// full-scale sine wave.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

/// Configuration for the level analyzer.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzerConfig {
    /// RMS at or above this counts as speech.
    pub silence_threshold: f32,
    /// Continuous speech required before silence counting arms.
    pub min_activity: Duration,
    /// Sustained quiet required to fire silence detection.
    pub silence_duration: Duration,
    /// Polling interval for the frame loop.
    pub poll_interval: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            silence_threshold: defaults::SILENCE_THRESHOLD,
            min_activity: Duration::from_millis(defaults::MIN_SPEECH_MS as u64),
            silence_duration: Duration::from_millis(defaults::SILENCE_DURATION_MS as u64),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
        }
    }
}

/// Callbacks invoked from the analyzer's polling thread.
pub struct AnalyzerCallbacks {
    /// Raw normalized level of every frame, reported regardless of pause
    /// state (drives level meters).
    pub on_level: Box<dyn Fn(f32) + Send>,
    /// Fires once per detected end of utterance; the analyzer auto-pauses
    /// before invoking it.
    pub on_silence: Box<dyn Fn() + Send>,
}

/// Energy-based silence detector over a live audio source.
///
/// Owns the audio source for its lifetime; `stop()` releases it.
pub struct AudioLevelAnalyzer {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    window: Arc<Mutex<SilenceWindow>>,
    worker: Option<JoinHandle<()>>,
}

impl AudioLevelAnalyzer {
    /// Starts the analyzer with the system clock.
    pub fn start(
        config: AnalyzerConfig,
        source: Box<dyn AudioSource>,
        callbacks: AnalyzerCallbacks,
    ) -> Result<Self> {
        Self::start_with_clock(config, source, callbacks, Arc::new(SystemClock))
    }

    /// Starts the analyzer with a custom clock (for deterministic testing).
    ///
    /// The source is started before the polling thread spawns, so capture
    /// failures (missing device, denied access) surface here synchronously.
    pub fn start_with_clock(
        config: AnalyzerConfig,
        mut source: Box<dyn AudioSource>,
        callbacks: AnalyzerCallbacks,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        source.start()?;

        let running = Arc::new(AtomicBool::new(true));
        let paused = Arc::new(AtomicBool::new(false));
        let window = Arc::new(Mutex::new(SilenceWindow::new(SilenceWindowConfig {
            min_activity: config.min_activity,
            silence_duration: config.silence_duration,
        })));

        let worker = {
            let running = running.clone();
            let paused = paused.clone();
            let window = window.clone();

            thread::spawn(move || {
                let mut consecutive_errors: u32 = 0;
                const MAX_CONSECUTIVE_ERRORS: u32 = 10;

                while running.load(Ordering::SeqCst) {
                    let samples = match source.read_samples() {
                        Ok(s) => {
                            consecutive_errors = 0;
                            s
                        }
                        Err(e) => {
                            consecutive_errors += 1;
                            if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                                eprintln!(
                                    "voxloop: audio capture failed {consecutive_errors} times in a row: {e}"
                                );
                                break;
                            }
                            thread::sleep(config.poll_interval);
                            continue;
                        }
                    };

                    if !samples.is_empty() {
                        let rms = calculate_rms(&samples);
                        (callbacks.on_level)(rms);

                        // Frames while paused are dropped; the loop itself
                        // keeps running so resume is immediate.
                        if !paused.load(Ordering::SeqCst) {
                            let active = rms >= config.silence_threshold;
                            let event = match window.lock() {
                                Ok(mut window) => window.observe(active, clock.now()),
                                Err(_) => WindowEvent::None,
                            };
                            if event == WindowEvent::SilenceDetected {
                                paused.store(true, Ordering::SeqCst);
                                (callbacks.on_silence)();
                            }
                        }
                    }

                    thread::sleep(config.poll_interval);
                }

                if let Err(e) = source.stop() {
                    eprintln!("voxloop: failed to stop audio capture: {e}");
                }
            })
        };

        Ok(Self {
            running,
            paused,
            window,
            worker: Some(worker),
        })
    }

    /// Suspends detection without tearing down the capture loop.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Re-arms detection with fresh window state.
    pub fn resume(&self) {
        if let Ok(mut window) = self.window.lock() {
            window.reset();
        }
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Returns true while detection is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Ends the polling loop and releases the audio source. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for AudioLevelAnalyzer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::recorder::{FramePhase, MockAudioSource};
    use crate::error::VoxError;
    use std::sync::atomic::AtomicU32;

    fn fast_config() -> AnalyzerConfig {
        AnalyzerConfig {
            silence_threshold: 0.02,
            min_activity: Duration::from_millis(60),
            silence_duration: Duration::from_millis(120),
            poll_interval: Duration::from_millis(4),
        }
    }

    struct Counters {
        levels: Arc<AtomicU32>,
        silences: Arc<AtomicU32>,
    }

    fn counting_callbacks() -> (AnalyzerCallbacks, Counters) {
        let levels = Arc::new(AtomicU32::new(0));
        let silences = Arc::new(AtomicU32::new(0));
        let levels_cb = levels.clone();
        let silences_cb = silences.clone();
        (
            AnalyzerCallbacks {
                on_level: Box::new(move |_| {
                    levels_cb.fetch_add(1, Ordering::SeqCst);
                }),
                on_silence: Box::new(move || {
                    silences_cb.fetch_add(1, Ordering::SeqCst);
                }),
            },
            Counters { levels, silences },
        )
    }

    fn loud(count: u32) -> FramePhase {
        FramePhase {
            samples: vec![5000i16; 160],
            count,
        }
    }

    fn quiet(count: u32) -> FramePhase {
        FramePhase {
            samples: vec![0i16; 160],
            count,
        }
    }

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(calculate_rms(&vec![0i16; 1000]), 0.0);
    }

    #[test]
    fn test_rms_max_amplitude() {
        let rms = calculate_rms(&vec![i16::MAX; 1000]);
        assert!((rms - 1.0).abs() < 0.001, "RMS should be ~1.0, got {}", rms);
    }

    #[test]
    fn test_rms_negative_samples() {
        let rms = calculate_rms(&vec![i16::MIN; 1000]);
        assert!(rms > 0.99, "RMS should be ~1.0 for i16::MIN, got {}", rms);
    }

    #[test]
    fn test_rms_empty_samples() {
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_start_failure_surfaces_synchronously() {
        let (callbacks, _) = counting_callbacks();
        let source = Box::new(MockAudioSource::new().with_start_failure());

        let result = AudioLevelAnalyzer::start(fast_config(), source, callbacks);
        assert!(matches!(result, Err(VoxError::AudioCapture { .. })));
    }

    #[test]
    fn test_levels_reported_every_frame() {
        let (callbacks, counters) = counting_callbacks();
        let source = Box::new(MockAudioSource::new());

        let mut analyzer = AudioLevelAnalyzer::start(fast_config(), source, callbacks).unwrap();
        thread::sleep(Duration::from_millis(100));
        analyzer.stop();

        assert!(counters.levels.load(Ordering::SeqCst) > 5);
        assert_eq!(counters.silences.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_speech_then_quiet_fires_once_and_pauses() {
        let (callbacks, counters) = counting_callbacks();
        // ~30 loud frames at 4ms/frame = ~120ms of speech, then quiet.
        let source = Box::new(
            MockAudioSource::new().with_frame_sequence(vec![loud(30), quiet(u32::MAX)]),
        );

        let mut analyzer = AudioLevelAnalyzer::start(fast_config(), source, callbacks).unwrap();
        thread::sleep(Duration::from_millis(600));

        assert_eq!(counters.silences.load(Ordering::SeqCst), 1);
        assert!(analyzer.is_paused(), "Analyzer should auto-pause after firing");

        // Still paused: further quiet never fires again.
        thread::sleep(Duration::from_millis(300));
        assert_eq!(counters.silences.load(Ordering::SeqCst), 1);
        analyzer.stop();
    }

    #[test]
    fn test_short_burst_never_fires() {
        let (callbacks, counters) = counting_callbacks();
        // ~3 loud frames = ~12ms of speech, below the 60ms minimum.
        let source = Box::new(
            MockAudioSource::new().with_frame_sequence(vec![loud(3), quiet(u32::MAX)]),
        );

        let mut analyzer = AudioLevelAnalyzer::start(fast_config(), source, callbacks).unwrap();
        thread::sleep(Duration::from_millis(500));
        analyzer.stop();

        assert_eq!(counters.silences.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_paused_frames_still_report_levels() {
        let (callbacks, counters) = counting_callbacks();
        let source = Box::new(
            MockAudioSource::new().with_frame_sequence(vec![loud(u32::MAX)]),
        );

        let mut analyzer = AudioLevelAnalyzer::start(fast_config(), source, callbacks).unwrap();
        analyzer.pause();
        thread::sleep(Duration::from_millis(150));

        assert!(counters.levels.load(Ordering::SeqCst) > 5);
        assert_eq!(counters.silences.load(Ordering::SeqCst), 0);
        analyzer.stop();
    }

    #[test]
    fn test_resume_after_fire_allows_second_detection() {
        let (callbacks, counters) = counting_callbacks();
        let source = Box::new(MockAudioSource::new().with_frame_sequence(vec![
            loud(30),
            quiet(60),
            loud(30),
            quiet(u32::MAX),
        ]));

        let mut analyzer = AudioLevelAnalyzer::start(fast_config(), source, callbacks).unwrap();

        // Wait for the first detection, then resume for the second utterance.
        for _ in 0..100 {
            if counters.silences.load(Ordering::SeqCst) == 1 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(counters.silences.load(Ordering::SeqCst), 1);
        analyzer.resume();

        thread::sleep(Duration::from_millis(600));
        assert_eq!(counters.silences.load(Ordering::SeqCst), 2);
        analyzer.stop();
    }

    #[test]
    fn test_stop_is_idempotent_and_releases_source() {
        struct TrackedSource {
            inner: MockAudioSource,
            stopped: Arc<Mutex<bool>>,
        }

        impl AudioSource for TrackedSource {
            fn start(&mut self) -> Result<()> {
                self.inner.start()
            }
            fn stop(&mut self) -> Result<()> {
                *self.stopped.lock().unwrap() = true;
                self.inner.stop()
            }
            fn read_samples(&mut self) -> Result<Vec<i16>> {
                self.inner.read_samples()
            }
        }

        let stopped = Arc::new(Mutex::new(false));
        let source = Box::new(TrackedSource {
            inner: MockAudioSource::new(),
            stopped: stopped.clone(),
        });

        let (callbacks, _) = counting_callbacks();
        let mut analyzer = AudioLevelAnalyzer::start(fast_config(), source, callbacks).unwrap();
        analyzer.stop();
        analyzer.stop();

        assert!(*stopped.lock().unwrap(), "stop() must release the source");
    }
}

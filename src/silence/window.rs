//! Silence window state machine.
//!
//! Pure, clock-driven core shared by the energy-based detector: activity must
//! persist for a minimum duration before silence counting is allowed to begin,
//! so a noise burst followed by quiet never ends an utterance.

use crate::defaults;
use std::time::{Duration, Instant};

/// Trait for time operations, allowing mock time in tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Real system clock using `std::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Mock clock for deterministic tests; advance time manually.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: std::sync::Arc<std::sync::Mutex<Instant>>,
}

impl MockClock {
    /// Creates a new mock clock starting at the current instant.
    pub fn new() -> Self {
        Self {
            current: std::sync::Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    /// Advances the mock clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        #[allow(clippy::unwrap_used)]
        let mut current = self.current.lock().unwrap();
        *current += duration;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        #[allow(clippy::unwrap_used)]
        *self.current.lock().unwrap()
    }
}

/// Configuration for the silence window.
#[derive(Debug, Clone, Copy)]
pub struct SilenceWindowConfig {
    /// Continuous activity required before silence counting arms.
    pub min_activity: Duration,
    /// Sustained silence required before the window fires.
    pub silence_duration: Duration,
}

impl Default for SilenceWindowConfig {
    fn default() -> Self {
        Self {
            min_activity: Duration::from_millis(defaults::MIN_SPEECH_MS as u64),
            silence_duration: Duration::from_millis(defaults::SILENCE_DURATION_MS as u64),
        }
    }
}

/// Which of the three mutually exclusive phases the window is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    /// No activity observed since the last reset.
    Idle,
    /// Activity in progress; counting up toward `min_activity`.
    CountingActivity,
    /// Activity confirmed, now counting down `silence_duration` of quiet.
    CountingSilence,
}

/// Result of observing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// Nothing to report.
    None,
    /// Sustained silence after confirmed activity; fires once, then the
    /// window resets to idle.
    SilenceDetected,
}

/// Silence window state machine.
///
/// Feed it one observation per frame (`active` = frame level above threshold)
/// together with the current time. Exactly one of idle / counting-activity /
/// counting-silence holds at any time.
pub struct SilenceWindow {
    config: SilenceWindowConfig,
    phase: WindowPhase,
    active_since: Option<Instant>,
    silence_since: Option<Instant>,
    activity_confirmed: bool,
}

impl SilenceWindow {
    /// Creates a window with the given configuration.
    pub fn new(config: SilenceWindowConfig) -> Self {
        Self {
            config,
            phase: WindowPhase::Idle,
            active_since: None,
            silence_since: None,
            activity_confirmed: false,
        }
    }

    /// Observes one frame and returns the resulting event.
    pub fn observe(&mut self, active: bool, now: Instant) -> WindowEvent {
        match (self.phase, active) {
            (WindowPhase::Idle, true) => {
                self.phase = WindowPhase::CountingActivity;
                self.active_since = Some(now);
                WindowEvent::None
            }
            (WindowPhase::Idle, false) => WindowEvent::None,
            (WindowPhase::CountingActivity, true) => {
                let held = self
                    .active_since
                    .map(|since| now.duration_since(since))
                    .unwrap_or(Duration::ZERO);
                if held >= self.config.min_activity {
                    self.activity_confirmed = true;
                }
                WindowEvent::None
            }
            (WindowPhase::CountingActivity, false) => {
                if self.activity_confirmed {
                    self.phase = WindowPhase::CountingSilence;
                    self.silence_since = Some(now);
                } else {
                    // Noise burst shorter than min_activity: forget it.
                    self.phase = WindowPhase::Idle;
                    self.active_since = None;
                }
                WindowEvent::None
            }
            (WindowPhase::CountingSilence, true) => {
                // Speech resumed before the window elapsed.
                self.phase = WindowPhase::CountingActivity;
                self.active_since = Some(now);
                self.silence_since = None;
                WindowEvent::None
            }
            (WindowPhase::CountingSilence, false) => {
                let quiet = self
                    .silence_since
                    .map(|since| now.duration_since(since))
                    .unwrap_or(Duration::ZERO);
                if quiet >= self.config.silence_duration {
                    self.reset();
                    WindowEvent::SilenceDetected
                } else {
                    WindowEvent::None
                }
            }
        }
    }

    /// Returns the current phase.
    pub fn phase(&self) -> WindowPhase {
        self.phase
    }

    /// Returns true once the minimum activity requirement has been met.
    pub fn activity_confirmed(&self) -> bool {
        self.activity_confirmed
    }

    /// Resets the window to idle, forgetting confirmed activity.
    pub fn reset(&mut self) {
        self.phase = WindowPhase::Idle;
        self.active_since = None;
        self.silence_since = None;
        self.activity_confirmed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SilenceWindowConfig {
        SilenceWindowConfig {
            min_activity: Duration::from_millis(300),
            silence_duration: Duration::from_millis(1500),
        }
    }

    /// Drive the window with `active` frames over `total`, stepping `step`.
    fn feed(window: &mut SilenceWindow, clock: &MockClock, active: bool, total: Duration) -> WindowEvent {
        let step = Duration::from_millis(16);
        let mut elapsed = Duration::ZERO;
        let mut last = WindowEvent::None;
        while elapsed < total {
            clock.advance(step);
            elapsed += step;
            last = window.observe(active, clock.now());
            if last == WindowEvent::SilenceDetected {
                return last;
            }
        }
        last
    }

    #[test]
    fn test_window_starts_idle() {
        let window = SilenceWindow::new(test_config());
        assert_eq!(window.phase(), WindowPhase::Idle);
    }

    #[test]
    fn test_silence_alone_never_fires() {
        let clock = MockClock::new();
        let mut window = SilenceWindow::new(test_config());

        let event = feed(&mut window, &clock, false, Duration::from_secs(10));
        assert_eq!(event, WindowEvent::None);
        assert_eq!(window.phase(), WindowPhase::Idle);
    }

    #[test]
    fn test_short_burst_does_not_arm_silence_counting() {
        let clock = MockClock::new();
        let mut window = SilenceWindow::new(test_config());

        // 100ms of activity: below the 300ms minimum.
        feed(&mut window, &clock, true, Duration::from_millis(100));
        assert!(!window.activity_confirmed());

        // Silence far beyond the window must not fire.
        let event = feed(&mut window, &clock, false, Duration::from_secs(10));
        assert_eq!(event, WindowEvent::None);
    }

    #[test]
    fn test_confirmed_activity_then_silence_fires_once() {
        let clock = MockClock::new();
        let mut window = SilenceWindow::new(test_config());

        feed(&mut window, &clock, true, Duration::from_millis(400));
        assert!(window.activity_confirmed());

        let event = feed(&mut window, &clock, false, Duration::from_millis(1600));
        assert_eq!(event, WindowEvent::SilenceDetected);

        // The window resets after firing; more silence stays quiet.
        let event = feed(&mut window, &clock, false, Duration::from_secs(5));
        assert_eq!(event, WindowEvent::None);
    }

    #[test]
    fn test_speech_resume_cancels_silence_countdown() {
        let clock = MockClock::new();
        let mut window = SilenceWindow::new(test_config());

        feed(&mut window, &clock, true, Duration::from_millis(400));

        // Pause shorter than the silence window.
        feed(&mut window, &clock, false, Duration::from_millis(800));
        assert_eq!(window.phase(), WindowPhase::CountingSilence);

        // Resume speaking: back to counting activity.
        feed(&mut window, &clock, true, Duration::from_millis(100));
        assert_eq!(window.phase(), WindowPhase::CountingActivity);

        // The silence countdown restarted; 800ms more quiet is not enough.
        let event = feed(&mut window, &clock, false, Duration::from_millis(800));
        assert_eq!(event, WindowEvent::None);
    }

    #[test]
    fn test_reset_forgets_confirmed_activity() {
        let clock = MockClock::new();
        let mut window = SilenceWindow::new(test_config());

        feed(&mut window, &clock, true, Duration::from_millis(400));
        assert!(window.activity_confirmed());

        window.reset();
        assert_eq!(window.phase(), WindowPhase::Idle);
        assert!(!window.activity_confirmed());

        // After a reset, silence must not fire without fresh confirmed speech.
        let event = feed(&mut window, &clock, false, Duration::from_secs(5));
        assert_eq!(event, WindowEvent::None);
    }

    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let before = clock.now();
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now().duration_since(before), Duration::from_millis(250));
    }
}

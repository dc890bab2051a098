//! End-of-utterance detection.
//!
//! Two detectors share the same contract (fire once, suspend until resumed):
//! [`SilenceTimer`] counts down from the last activity signal, and
//! [`SilenceWindow`] is the pure state machine behind energy-based detection.

pub mod timer;
pub mod window;

pub use timer::{SilenceTimer, SilenceTimerConfig};
pub use window::{Clock, MockClock, SilenceWindow, SilenceWindowConfig, SystemClock, WindowEvent, WindowPhase};

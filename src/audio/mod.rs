//! Audio input: the capture seam and the energy-based silence detector.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod level;
pub mod recorder;

pub use level::{calculate_rms, AnalyzerCallbacks, AnalyzerConfig, AudioLevelAnalyzer};
pub use recorder::{AudioSource, FramePhase, MockAudioSource};

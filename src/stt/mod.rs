//! Continuous speech recognition: the engine seam and the recognizer that
//! accumulates transcripts and drives silence detection from them.

pub mod engine;
pub mod recognizer;
pub mod stdin;

pub use engine::{EngineEvent, EngineFault, MockEngineHandle, MockRecognitionEngine, RecognitionEngine};
pub use recognizer::{RecognizerCallbacks, RecognizerConfig, SpeechRecognizer};
pub use stdin::StdinRecognitionEngine;

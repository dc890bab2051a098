//! Speech synthesis: text chunking, the engine seam, and the FIFO player.

pub mod chunker;
pub mod engine;
pub mod player;

pub use chunker::chunk_text;
pub use engine::{
    MockSynthesisEngine, PlaceholderSynthesis, SynthesisEngine, SynthesisFault, UtteranceConfig,
    UtteranceEvent,
};
pub use player::{PlayerConfig, TextToSpeechPlayer};

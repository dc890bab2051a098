use crate::audio::level::AnalyzerConfig;
use crate::defaults;
use crate::error::{Result, VoxError};
use crate::session::orchestrator::SessionConfig;
use crate::silence::timer::SilenceTimerConfig;
use crate::stt::recognizer::RecognizerConfig;
use crate::tts::engine::UtteranceConfig;
use crate::tts::player::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub silence: SilenceConfig,
    pub chat: ChatConfig,
    pub speech: SpeechConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
}

/// Silence detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SilenceConfig {
    /// RMS level at or above this counts as speech (0.0 to 1.0).
    pub threshold: f32,
    /// Continuous speech required before silence counting arms.
    pub min_speech_ms: u32,
    /// Sustained quiet that ends an utterance.
    pub silence_duration_ms: u32,
}

/// Chat completion backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    pub url: String,
    pub model: String,
    /// Bearer token; usually supplied via VOXLOOP_API_KEY instead.
    pub api_key: Option<String>,
    /// Optional persona message seeding every conversation.
    pub system_prompt: Option<String>,
    /// Retained user/assistant turns (0 = unbounded).
    pub max_history_turns: usize,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub max_chunk_chars: usize,
    pub chunk_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::SILENCE_THRESHOLD,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            silence_duration_ms: defaults::SILENCE_DURATION_MS,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: defaults::CHAT_URL.to_string(),
            model: defaults::CHAT_MODEL.to_string(),
            api_key: None,
            system_prompt: None,
            max_history_turns: defaults::MAX_HISTORY_TURNS,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: defaults::SPEECH_LANGUAGE.to_string(),
            rate: defaults::SPEECH_RATE,
            pitch: defaults::SPEECH_PITCH,
            volume: defaults::SPEECH_VOLUME,
            max_chunk_chars: defaults::MAX_CHUNK_CHARS,
            chunk_timeout_secs: defaults::CHUNK_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields use default values; invalid TOML is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults only when the file is
    /// missing. Invalid TOML stays an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                let missing = e
                    .downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound);
                if missing { Ok(Self::default()) } else { Err(e) }
            }
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported variables:
    /// - VOXLOOP_CHAT_URL → chat.url
    /// - VOXLOOP_CHAT_MODEL → chat.model
    /// - VOXLOOP_API_KEY → chat.api_key
    /// - VOXLOOP_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("VOXLOOP_CHAT_URL")
            && !url.is_empty()
        {
            self.chat.url = url;
        }

        if let Ok(model) = std::env::var("VOXLOOP_CHAT_MODEL")
            && !model.is_empty()
        {
            self.chat.model = model;
        }

        if let Ok(key) = std::env::var("VOXLOOP_API_KEY")
            && !key.is_empty()
        {
            self.chat.api_key = Some(key);
        }

        if let Ok(device) = std::env::var("VOXLOOP_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Check value ranges that would misbehave silently at runtime.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.silence.threshold) {
            return Err(VoxError::ConfigInvalidValue {
                key: "silence.threshold".to_string(),
                message: "must be between 0.0 and 1.0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.speech.volume) {
            return Err(VoxError::ConfigInvalidValue {
                key: "speech.volume".to_string(),
                message: "must be between 0.0 and 1.0".to_string(),
            });
        }
        if self.speech.max_chunk_chars == 0 {
            return Err(VoxError::ConfigInvalidValue {
                key: "speech.max_chunk_chars".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.silence.silence_duration_ms == 0 {
            return Err(VoxError::ConfigInvalidValue {
                key: "silence.silence_duration_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Level analyzer settings derived from this config.
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            silence_threshold: self.silence.threshold,
            min_activity: Duration::from_millis(self.silence.min_speech_ms as u64),
            silence_duration: Duration::from_millis(self.silence.silence_duration_ms as u64),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
        }
    }

    /// Session settings derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            recognizer: RecognizerConfig {
                silence: SilenceTimerConfig {
                    threshold: Duration::from_millis(self.silence.silence_duration_ms as u64),
                },
            },
            player: PlayerConfig {
                max_chunk_chars: self.speech.max_chunk_chars,
                chunk_timeout: Duration::from_secs(self.speech.chunk_timeout_secs),
                utterance: UtteranceConfig {
                    language: self.speech.language.clone(),
                    rate: self.speech.rate,
                    pitch: self.speech.pitch,
                    volume: self.speech.volume,
                },
            },
            system_prompt: self.chat.system_prompt.clone(),
            max_history_turns: self.chat.max_history_turns,
        }
    }

    /// Get the default configuration file path
    /// (~/.config/voxloop/config.toml on Linux).
    #[cfg(feature = "cli")]
    pub fn default_path() -> std::path::PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("voxloop")
            .join("config.toml")
    }
}

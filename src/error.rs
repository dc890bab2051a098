//! Error types for voxloop.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Microphone access denied: {message}")]
    PermissionDenied { message: String },

    #[error("No microphone available: {message}")]
    NoMicrophone { message: String },

    // Capability errors
    #[error("{what} is not available on this platform")]
    Unsupported { what: String },

    // Recognition errors
    #[error("Speech recognition failed: {message}")]
    Recognition { message: String },

    #[error("Speech service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Chat backend errors
    #[error("Chat request failed: {message}")]
    Network { message: String },

    #[error("Chat API error {status}: {message}")]
    ChatApi { status: u16, message: String },

    // Speech synthesis errors
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Session state errors
    #[error("Illegal session transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Session is already running")]
    AlreadyRunning,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxError>;

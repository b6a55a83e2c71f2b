//! Error types for the tutor

use thiserror::Error;

/// Result type alias for tutor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tutor
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Vision API error
    #[error("vision error: {0}")]
    Vision(String),

    /// Chat completion error
    #[error("chat error: {0}")]
    Chat(String),

    /// Conversation session error
    #[error("session error: {0}")]
    Session(String),

    /// Action not offered in the current controller state
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Uploaded media type is not accepted
    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

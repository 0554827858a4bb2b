//! Error types for Beacon Desk

use thiserror::Error;

/// Result type alias for Beacon Desk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Beacon Desk
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or codec error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Reply generation error, carries the provider status when there is one
    #[error("{0}")]
    Llm(String),

    /// Weather provider error
    #[error("weather error: {0}")]
    Weather(String),

    /// Display panel error
    #[error("display error: {0}")]
    Display(String),

    /// Staged blob storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// Network unreachable at startup
    #[error("connectivity error: {0}")]
    Connectivity(String),

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

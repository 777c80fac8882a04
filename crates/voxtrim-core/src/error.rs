//! Error types for the voxtrim audio pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Format {0} not supported")]
    UnsupportedFormat(String),

    #[error("No encoder available for {0}")]
    EncoderUnavailable(String),

    #[error("Failed to convert audio stream to {format}: {source}")]
    ConversionFailed {
        format: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Session already active for writer key {0}")]
    SessionConflict(String),

    #[error("No active session {id} for writer key {key}")]
    UnknownSession { key: String, id: String },

    #[error("Audio encoding error: {0}")]
    AudioError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl Error {
    /// Wrap any pipeline failure for `format` into a single conversion error.
    pub fn conversion_failed(format: impl Into<String>, source: Error) -> Self {
        Error::ConversionFailed {
            format: format.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        Error::AudioError(e.to_string())
    }
}

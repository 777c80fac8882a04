//! Output formats and writer keys

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Supported audio output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
    Opus,
    Flac,
    Aac,
    /// Raw PCM samples (i16, little endian)
    Pcm,
    Ogg,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 7] = [
        AudioFormat::Wav,
        AudioFormat::Mp3,
        AudioFormat::Opus,
        AudioFormat::Flac,
        AudioFormat::Aac,
        AudioFormat::Pcm,
        AudioFormat::Ogg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Opus => "opus",
            AudioFormat::Flac => "flac",
            AudioFormat::Aac => "aac",
            AudioFormat::Pcm => "pcm",
            AudioFormat::Ogg => "ogg",
        }
    }

    /// Get content type for format
    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Opus => "audio/opus",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Aac => "audio/aac",
            AudioFormat::Pcm => "audio/pcm",
            AudioFormat::Ogg => "audio/ogg",
        }
    }

    /// File extension used when the output is saved
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Pcm => "pcm",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        AudioFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == lowered)
            .ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}

/// Identifies one active encoding session: output format plus sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriterKey {
    pub format: AudioFormat,
    pub sample_rate: u32,
}

impl WriterKey {
    pub fn new(format: AudioFormat, sample_rate: u32) -> Self {
        Self {
            format,
            sample_rate,
        }
    }
}

impl fmt::Display for WriterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.format, self.sample_rate)
    }
}

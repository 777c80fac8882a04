//! Configuration types for the voxtrim pipeline

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// Silence trimming and padding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Fixed trim removed from both ends of every chunk (milliseconds)
    #[serde(default = "default_gap_trim_ms")]
    pub gap_trim_ms: u32,

    /// Trailing context kept after speech in non-final chunks (milliseconds)
    #[serde(default = "default_dynamic_gap_trim_padding_ms")]
    pub dynamic_gap_trim_padding_ms: u32,

    /// Trailing pad multiplier keyed by the chunk's final punctuation
    #[serde(default = "default_char_multiplier")]
    pub dynamic_gap_trim_padding_char_multiplier: HashMap<char, f32>,

    /// Leading context kept before speech (milliseconds)
    #[serde(default = "default_leading_pad_ms")]
    pub leading_pad_ms: u32,

    /// Level below which samples count as silence (dBFS)
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: f32,

    /// Sample rate of engine output
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            gap_trim_ms: default_gap_trim_ms(),
            dynamic_gap_trim_padding_ms: default_dynamic_gap_trim_padding_ms(),
            dynamic_gap_trim_padding_char_multiplier: default_char_multiplier(),
            leading_pad_ms: default_leading_pad_ms(),
            silence_threshold_db: default_silence_threshold_db(),
            sample_rate: default_sample_rate(),
        }
    }
}

impl NormalizerConfig {
    /// Parse a configuration from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::ConfigError("sample_rate must be non-zero".into()));
        }
        if !self.silence_threshold_db.is_finite() || self.silence_threshold_db > 0.0 {
            return Err(Error::ConfigError(format!(
                "silence_threshold_db must be a finite value <= 0, got {}",
                self.silence_threshold_db
            )));
        }
        if let Some((c, m)) = self
            .dynamic_gap_trim_padding_char_multiplier
            .iter()
            .find(|(_, m)| !m.is_finite() || **m < 0.0)
        {
            return Err(Error::ConfigError(format!(
                "pad multiplier for {:?} must be finite and non-negative, got {}",
                c, m
            )));
        }
        Ok(())
    }
}

fn default_gap_trim_ms() -> u32 {
    1
}

fn default_dynamic_gap_trim_padding_ms() -> u32 {
    410
}

fn default_char_multiplier() -> HashMap<char, f32> {
    HashMap::from([('.', 1.0), ('!', 0.9), ('?', 1.0), (',', 0.8)])
}

fn default_leading_pad_ms() -> u32 {
    50
}

fn default_silence_threshold_db() -> f32 {
    -45.0
}

fn default_sample_rate() -> u32 {
    24000
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Output format used when a request does not name one
    #[serde(default = "default_format")]
    pub default_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_cors_enabled(),
            cors_origins: vec!["*".to_string()],
            default_format: default_format(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8880
}

fn default_cors_enabled() -> bool {
    true
}

fn default_format() -> String {
    "wav".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NormalizerConfig::default();
        assert_eq!(config.sample_rate, 24000);
        assert_eq!(config.gap_trim_ms, 1);
        assert_eq!(config.dynamic_gap_trim_padding_char_multiplier.get(&','), Some(&0.8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = NormalizerConfig::from_toml_str(
            r#"
            dynamic_gap_trim_padding_ms = 500

            [dynamic_gap_trim_padding_char_multiplier]
            ";" = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.dynamic_gap_trim_padding_ms, 500);
        assert_eq!(config.silence_threshold_db, -45.0);
        assert_eq!(config.dynamic_gap_trim_padding_char_multiplier.get(&';'), Some(&1.5));
        assert_eq!(config.dynamic_gap_trim_padding_char_multiplier.len(), 1);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            NormalizerConfig::from_toml_str("sample_rate = 0"),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            NormalizerConfig::from_toml_str("silence_threshold_db = 3.0"),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            NormalizerConfig::from_toml_str("gap_trim_ms = \"x\""),
            Err(Error::TomlError(_))
        ));
    }
}

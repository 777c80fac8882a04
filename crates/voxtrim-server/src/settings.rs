//! Layered server settings: optional TOML file, then `VOXTRIM__*` env vars

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use voxtrim_core::{NormalizerConfig, ServerConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub audio: NormalizerConfig,
}

impl Settings {
    /// Load from `VOXTRIM_CONFIG`, or the user config dir when unset
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os("VOXTRIM_CONFIG")
            .map(PathBuf::from)
            .or_else(default_config_path);
        Self::load_from(path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!("Reading configuration from {:?}", path);
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix("VOXTRIM")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.audio.validate()?;
        Ok(settings)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("voxtrim").join("config.toml"))
}

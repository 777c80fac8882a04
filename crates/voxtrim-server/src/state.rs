//! Application state management

use std::sync::Arc;
use voxtrim_core::AudioService;

use crate::engine::SyntheticVoice;
use crate::settings::Settings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AudioService>,
    pub voice: SyntheticVoice,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let service = AudioService::new(settings.audio.clone());
        let voice = SyntheticVoice::new(settings.audio.sample_rate);
        Self {
            service: Arc::new(service),
            voice,
            settings: Arc::new(settings),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.settings.audio.sample_rate
    }
}

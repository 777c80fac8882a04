//! Speech with word-level timestamps

use axum::{extract::State, Json};
use base64::Engine;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;
use voxtrim_core::{encode_stream, AudioFormat, EncodedSegment, SessionRegistry, StreamRequest, WordTimestamp};

use super::{default_speed, validate_text};
use crate::error::ApiError;
use crate::state::AppState;

/// Captioned speech request
#[derive(Debug, Deserialize)]
pub struct CaptionedSpeechRequest {
    pub input: String,
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub response_format: Option<String>,
    #[serde(default = "default_return_timestamps")]
    pub return_timestamps: bool,
}

fn default_return_timestamps() -> bool {
    true
}

/// Captioned speech response
#[derive(Debug, Serialize)]
pub struct CaptionedSpeechResponse {
    pub id: String,
    pub audio: String,
    pub format: String,
    pub sample_rate: u32,
    pub timestamps: Vec<WordTimestamp>,
}

/// Generate speech and return it with stream-absolute word timings
pub async fn captioned_speech(
    State(state): State<AppState>,
    Json(req): Json<CaptionedSpeechRequest>,
) -> Result<Json<CaptionedSpeechResponse>, ApiError> {
    validate_text(&req.input, req.speed)?;
    if req.voice.trim().is_empty() {
        return Err(ApiError::bad_request("Input and voice fields are required."));
    }

    let format: AudioFormat = req
        .response_format
        .as_deref()
        .unwrap_or(&state.settings.server.default_format)
        .parse()?;
    state.service.ensure_encoder(format)?;

    let id = uuid::Uuid::new_v4().to_string();
    info!(
        "Captioned speech request {}: {} chars, voice: {}, format: {}",
        id,
        req.input.len(),
        req.voice,
        format
    );

    let request = StreamRequest {
        format: format.as_str().to_string(),
        sample_rate: state.sample_rate(),
        speed: req.speed,
        return_timestamps: req.return_timestamps,
    };
    let chunks = state.voice.generate(req.input, req.voice, req.speed);
    let segments: Vec<EncodedSegment> =
        encode_stream(state.service.clone(), SessionRegistry::new(), request, chunks)
            .try_collect()
            .await?;

    let mut audio = Vec::new();
    let mut timestamps = Vec::new();
    for segment in segments {
        audio.extend_from_slice(&segment.data);
        timestamps.extend(segment.word_timestamps);
    }

    Ok(Json(CaptionedSpeechResponse {
        id,
        audio: base64::engine::general_purpose::STANDARD.encode(&audio),
        format: format.as_str().to_string(),
        sample_rate: state.sample_rate(),
        timestamps,
    }))
}

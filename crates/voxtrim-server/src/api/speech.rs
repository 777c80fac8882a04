//! OpenAI-style speech endpoint

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use serde::Deserialize;
use tracing::info;
use voxtrim_core::{encode_stream, AudioFormat, EncodedSegment, SessionRegistry, StreamRequest};

use super::{default_speed, default_voice, validate_text};
use crate::error::ApiError;
use crate::state::AppState;

/// Speech request
#[derive(Debug, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub input: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub response_format: Option<String>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

/// Generate speech, streamed chunk by chunk or returned whole
pub async fn create_speech(
    State(state): State<AppState>,
    Json(req): Json<SpeechRequest>,
) -> Result<Response, ApiError> {
    validate_text(&req.input, req.speed)?;

    let format: AudioFormat = req
        .response_format
        .as_deref()
        .unwrap_or(&state.settings.server.default_format)
        .parse()?;
    // The status line goes out before the first streamed byte
    state.service.ensure_encoder(format)?;

    info!(
        "Speech request: model: {}, {} chars, voice: {}, format: {}, speed: {}, stream: {}",
        req.model.as_deref().unwrap_or("synthetic"),
        req.input.len(),
        req.voice,
        format,
        req.speed,
        req.stream
    );

    let request = StreamRequest {
        format: format.as_str().to_string(),
        sample_rate: state.sample_rate(),
        speed: req.speed,
        return_timestamps: false,
    };
    let chunks = state.voice.generate(req.input, req.voice, req.speed);
    let segments = encode_stream(state.service.clone(), SessionRegistry::new(), request, chunks);

    if req.stream {
        let body = Body::from_stream(segments.map_ok(|segment| segment.data));
        return Ok(([(header::CONTENT_TYPE, format.content_type())], body).into_response());
    }

    let segments: Vec<EncodedSegment> = segments.try_collect().await?;
    let audio: Vec<u8> = segments
        .iter()
        .flat_map(|segment| segment.data.iter().copied())
        .collect();

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"speech.{}\"", format.extension()),
            ),
        ],
        audio,
    )
        .into_response())
}

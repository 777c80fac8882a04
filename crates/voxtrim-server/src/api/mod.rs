//! HTTP routes

mod captions;
mod speech;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

const MIN_SPEED: f32 = 0.25;
const MAX_SPEED: f32 = 4.0;

pub fn create_router(state: AppState) -> Router {
    let server = &state.settings.server;
    let cors = server.cors_enabled.then(|| cors_layer(&server.cors_origins));

    let router = Router::new()
        .route("/health", get(health))
        .route("/v1/audio/speech", post(speech::create_speech))
        .route("/dev/captioned_speech", post(captions::captioned_speech))
        .layer(TraceLayer::new_for_http());

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse::<HeaderValue>().ok()))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) fn default_voice() -> String {
    "af_heart".to_string()
}

pub(crate) fn default_speed() -> f32 {
    1.0
}

pub(crate) fn validate_text(input: &str, speed: f32) -> Result<(), ApiError> {
    if input.trim().is_empty() {
        return Err(ApiError::bad_request("Input text is required."));
    }
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(ApiError::bad_request(format!(
            "Speed must be between {} and {}, got {}",
            MIN_SPEED, MAX_SPEED, speed
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use base64::Engine;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(AppState::new(Settings::default()))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_streamed_pcm_speech() {
        let response = app()
            .oneshot(post_json(
                "/v1/audio/speech",
                json!({ "input": "Hello, world. Nice day!", "response_format": "pcm" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/pcm");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!body.is_empty());
        assert_eq!(body.len() % 2, 0);
    }

    #[tokio::test]
    async fn test_whole_wav_speech() {
        let response = app()
            .oneshot(post_json(
                "/v1/audio/speech",
                json!({ "input": "One, two.", "stream": false }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[0..4], b"RIFF");
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let cases = [
            json!({ "input": "Hi.", "response_format": "midi" }),
            json!({ "input": "   " }),
            json!({ "input": "Hi.", "speed": 9.0 }),
        ];
        for case in cases {
            let response = app().oneshot(post_json("/v1/audio/speech", case)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_unbundled_codec_is_not_implemented() {
        for stream in [true, false] {
            let response = app()
                .oneshot(post_json(
                    "/v1/audio/speech",
                    json!({ "input": "Hi there.", "response_format": "mp3", "stream": stream }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
            assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json: Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["error"]["code"], 501);
        }

        let response = app()
            .oneshot(post_json(
                "/dev/captioned_speech",
                json!({ "input": "Hi.", "voice": "af_heart", "response_format": "opus" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_captioned_speech() {
        let response = app()
            .oneshot(post_json(
                "/dev/captioned_speech",
                json!({
                    "input": "Good morning, how are you?",
                    "voice": "af_heart",
                    "response_format": "pcm"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();

        let words: Vec<&str> = json["timestamps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["word"].as_str().unwrap())
            .collect();
        assert_eq!(words, vec!["Good", "morning", "how", "are", "you"]);

        let starts: Vec<f64> = json["timestamps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["start_time"].as_f64().unwrap())
            .collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));

        let audio = base64::engine::general_purpose::STANDARD
            .decode(json["audio"].as_str().unwrap())
            .unwrap();
        assert!(!audio.is_empty());
        assert_eq!(json["sample_rate"], 24000);
    }

    #[tokio::test]
    async fn test_captioned_speech_requires_voice() {
        let response = app()
            .oneshot(post_json(
                "/dev/captioned_speech",
                json!({ "input": "Hi.", "voice": "" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

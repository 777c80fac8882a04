//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

/// API error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_IMPLEMENTED,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!("Request failed: {}", self.message);
        }
        let body = Json(json!({
            "error": {
                "message": self.message,
                "code": self.status.as_u16()
            }
        }));
        (self.status, body).into_response()
    }
}

impl From<voxtrim_core::Error> for ApiError {
    fn from(err: voxtrim_core::Error) -> Self {
        match &err {
            voxtrim_core::Error::InvalidInput(_) | voxtrim_core::Error::UnsupportedFormat(_) => {
                ApiError::bad_request(err.to_string())
            }
            voxtrim_core::Error::SessionConflict(_) => ApiError::conflict(err.to_string()),
            voxtrim_core::Error::EncoderUnavailable(_) => ApiError::not_implemented(err.to_string()),
            _ => ApiError::internal(err.to_string()),
        }
    }
}

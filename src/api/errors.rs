//! JSON error responses for the media endpoint

use crate::media::MediaError;
use axum::http::header::ALLOW;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

/// Error body shape: `{"message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        if let MediaError::Internal(detail) = &self {
            error!("Media proxy internal error: {}", detail);
        }

        let status = self.status_code();
        let body = Json(ErrorBody {
            message: self.public_message(),
        });
        let mut response = (status, body).into_response();

        if matches!(self, MediaError::MethodNotAllowed) {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET"));
        }
        response
    }
}

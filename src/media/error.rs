//! Media proxy error taxonomy.
//!
//! Every input-driven failure maps to a fixed status and a short message.
//! The HTTP rendering lives in `api::errors`.

use super::params::ParamError;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid query keys")]
    InvalidQueryKeys,

    #[error("query is invalid")]
    InvalidQuery,

    #[error("u is required")]
    MissingSource,

    #[error("u is invalid")]
    InvalidSource,

    #[error("u host is not allowed")]
    HostNotAllowed,

    #[error("sig is invalid")]
    InvalidSignatureFormat,

    #[error("{0}")]
    InvalidParam(#[from] ParamError),

    #[error("invalid signature")]
    SignatureMismatch,

    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("failed to fetch image")]
    UpstreamNotFound,

    #[error("failed to fetch image")]
    UpstreamFailed,

    /// Broken invariant or crypto misconfiguration. Detail is logged, not sent.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MediaError::InvalidQueryKeys
            | MediaError::InvalidQuery
            | MediaError::MissingSource
            | MediaError::InvalidSource
            | MediaError::InvalidSignatureFormat
            | MediaError::InvalidParam(_) => StatusCode::BAD_REQUEST,
            MediaError::HostNotAllowed | MediaError::SignatureMismatch => StatusCode::FORBIDDEN,
            MediaError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            MediaError::UpstreamNotFound => StatusCode::NOT_FOUND,
            MediaError::UpstreamFailed => StatusCode::BAD_GATEWAY,
            MediaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Bounded label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            MediaError::InvalidQueryKeys => "invalid_query_keys",
            MediaError::InvalidQuery => "invalid_query",
            MediaError::MissingSource => "missing_source",
            MediaError::InvalidSource => "invalid_source",
            MediaError::HostNotAllowed => "host_not_allowed",
            MediaError::InvalidSignatureFormat => "invalid_signature_format",
            MediaError::InvalidParam(_) => "invalid_param",
            MediaError::SignatureMismatch => "signature_mismatch",
            MediaError::MethodNotAllowed => "method_not_allowed",
            MediaError::UpstreamNotFound => "upstream_not_found",
            MediaError::UpstreamFailed => "upstream_failed",
            MediaError::Internal(_) => "internal",
        }
    }

    /// Message safe to show a client.
    pub fn public_message(&self) -> String {
        match self {
            MediaError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

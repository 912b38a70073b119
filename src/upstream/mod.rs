//! Upstream image fetching.
//!
//! The fetch handler talks to upstream hosts through [`UpstreamClient`], so the
//! HTTP implementation can be swapped out in tests.

mod http;

pub use http::{HttpUpstream, MAX_REDIRECTS};

use async_trait::async_trait;
use axum::http::{HeaderValue, StatusCode};
use bytes::Bytes;
use reqwest::Url;
use thiserror::Error;

/// Default bound on a single upstream fetch, connect through last body byte.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Transport-level failures. HTTP error statuses are not errors here.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream request failed: {0}")]
    Request(String),
}

/// What came back from the upstream host.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub content_length: Option<HeaderValue>,
    /// Raw body bytes. Empty for non-success statuses.
    pub body: Bytes,
}

/// Fetches an already-resolved upstream URL.
///
/// This trait is object-safe and can be used with `Arc<dyn UpstreamClient>`.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<UpstreamResponse, UpstreamError>;
}

//! `reqwest`-backed upstream client.

use super::{UpstreamClient, UpstreamError, UpstreamResponse};
use crate::media::is_allowed_media_url;
use async_trait::async_trait;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use bytes::Bytes;
use reqwest::redirect::Policy;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 5;

/// HTTP client for allow-listed image hosts.
///
/// Redirects are followed up to [`MAX_REDIRECTS`] hops, and only while every
/// hop stays on an allowed host. A redirect off the allow-list is not
/// followed; its 3xx response is returned as-is.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        Self::with_redirect_filter(timeout, |url: &Url| is_allowed_media_url(url.as_str()))
    }

    /// Build a client whose redirects are followed only to URLs `allow` accepts.
    pub fn with_redirect_filter<F>(timeout: Duration, allow: F) -> Result<Self, UpstreamError>
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                attempt.error("too many redirects")
            } else if allow(attempt.url()) {
                attempt.follow()
            } else {
                warn!("Refusing upstream redirect to a disallowed host");
                attempt.stop()
            }
        });

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(policy)
            .user_agent(concat!("media_proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Request(err.to_string())
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    #[instrument(skip(self, url), fields(host = url.host_str().unwrap_or("")))]
    async fn fetch(&self, url: &Url) -> Result<UpstreamResponse, UpstreamError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let content_length = response.headers().get(CONTENT_LENGTH).cloned();
        debug!("Upstream responded {}", status);

        let body = if status.is_success() {
            response.bytes().await.map_err(classify)?
        } else {
            Bytes::new()
        };

        Ok(UpstreamResponse {
            status,
            content_type,
            content_length,
            body,
        })
    }
}

//! GET /api/media: verify a signed proxy URL and relay the upstream image.
//!
//! Single pass, no retries: method check, parse, verify, resolve, fetch.
//! Every rejection is answered with `{"message": ...}` JSON.

use super::AppState;
use crate::media::{build_upstream_url, parse_proxy_query, verify_signature, MediaError};
use crate::upstream::{UpstreamError, UpstreamResponse};
use axum::extract::{RawQuery, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Cache policy for successfully proxied images (30 days at the edge).
pub const CACHE_CONTROL_VALUE: &str = "public, s-maxage=2592000, stale-while-revalidate=86400";

/// Media proxy handler
/// GET /api/media?u=&w=&h=&q=&fit=&sig=
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn media_proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    RawQuery(query): RawQuery,
) -> Response {
    match serve_media(&state, &method, query.as_deref().unwrap_or("")).await {
        Ok(response) => response,
        Err(err) => {
            debug!("Rejected media request: {}", err.reason());
            if let Some(metrics) = &state.metrics {
                metrics
                    .media_rejections_total
                    .with_label_values(&[err.reason()])
                    .inc();
            }
            err.into_response()
        }
    }
}

async fn serve_media(
    state: &AppState,
    method: &Method,
    query: &str,
) -> Result<Response, MediaError> {
    if *method != Method::GET {
        return Err(MediaError::MethodNotAllowed);
    }

    let request = parse_proxy_query(&state.keys, query)?;
    if !verify_signature(&state.keys, &request) {
        warn!("Media request signature mismatch");
        return Err(MediaError::SignatureMismatch);
    }

    let upstream_url = build_upstream_url(&state.keys, &request.unsigned)?;

    let start = Instant::now();
    let fetched = state.upstream.fetch(&upstream_url).await;
    record_upstream(state, &fetched, start);

    let upstream = fetched.map_err(|e| {
        warn!("Upstream fetch failed: {}", e);
        MediaError::UpstreamFailed
    })?;

    if upstream.status == StatusCode::NOT_FOUND {
        return Err(MediaError::UpstreamNotFound);
    }
    if !upstream.status.is_success() {
        warn!("Upstream returned {}", upstream.status);
        return Err(MediaError::UpstreamFailed);
    }

    info!("Serving media ({} bytes)", upstream.body.len());
    Ok(image_response(upstream))
}

fn image_response(upstream: UpstreamResponse) -> Response {
    let content_type = upstream
        .content_type
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, content_type);
    if let Some(length) = upstream.content_length {
        headers.insert(CONTENT_LENGTH, length);
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    (StatusCode::OK, headers, upstream.body).into_response()
}

fn record_upstream(
    state: &AppState,
    fetched: &Result<UpstreamResponse, UpstreamError>,
    start: Instant,
) {
    let Some(metrics) = &state.metrics else {
        return;
    };
    metrics
        .upstream_fetch_duration_seconds
        .observe(start.elapsed().as_secs_f64());

    let outcome = match fetched {
        Ok(r) if r.status.is_success() => "ok",
        Ok(r) if r.status == StatusCode::NOT_FOUND => "not_found",
        Ok(_) => "error_status",
        Err(UpstreamError::Timeout) => "timeout",
        Err(UpstreamError::Request(_)) => "error",
    };
    metrics
        .upstream_responses_total
        .with_label_values(&[outcome])
        .inc();
}

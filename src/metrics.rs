//! Prometheus metrics for the media proxy.
//!
//! All metric types use atomics internally (no locks on the hot path).
//! The `Metrics` struct is `Clone`-cheap (Arc-based registry + Arc-based collectors).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::core::Collector;
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts,
    Registry, TextEncoder, TEXT_FORMAT,
};
use std::sync::Arc;
use std::time::Instant;

use crate::api::handlers::AppState;

/// All Prometheus metrics for the media proxy.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // -- Build --
    pub build_info: GaugeVec,

    // -- HTTP Requests --
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_response_size_bytes: HistogramVec,

    // -- Media proxy --
    pub media_rejections_total: IntCounterVec,
    pub upstream_fetch_duration_seconds: Histogram,
    pub upstream_responses_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Register a collector built from static names; failure is a programming error.
fn register<C: Collector + Clone + 'static>(registry: &Registry, collector: C) -> C {
    registry
        .register(Box::new(collector.clone()))
        .expect("metric registered twice");
    collector
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        // -- Build --
        let build_info = register(
            &registry,
            GaugeVec::new(
                Opts::new("media_proxy_build_info", "Build information"),
                &["version"],
            )
            .unwrap(),
        );
        build_info
            .with_label_values(&[env!("CARGO_PKG_VERSION")])
            .set(1.0);

        // Standard process metrics (start time, RSS, CPU, open FDs) on Linux
        #[cfg(target_os = "linux")]
        {
            let pc = prometheus::process_collector::ProcessCollector::for_self();
            registry
                .register(Box::new(pc))
                .expect("process collector registered twice");
        }

        // -- HTTP Requests --
        let http_requests_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "media_proxy_http_requests_total",
                    "Total HTTP requests by method, status, and operation",
                ),
                &["method", "status", "operation"],
            )
            .unwrap(),
        );

        let http_request_duration_seconds = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "media_proxy_http_request_duration_seconds",
                    "HTTP request duration in seconds",
                ),
                &["method", "operation"],
            )
            .unwrap(),
        );

        // [1KB, 10KB, 100KB, 1MB, 10MB, 100MB]
        let body_size_buckets = prometheus::exponential_buckets(1024.0, 10.0, 6).unwrap();
        let http_response_size_bytes = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "media_proxy_http_response_size_bytes",
                    "HTTP response body size in bytes",
                )
                .buckets(body_size_buckets),
                &["operation"],
            )
            .unwrap(),
        );

        // -- Media proxy --
        let media_rejections_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "media_proxy_rejections_total",
                    "Media requests answered with an error, by reason",
                ),
                &["reason"],
            )
            .unwrap(),
        );

        let upstream_fetch_duration_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "media_proxy_upstream_fetch_duration_seconds",
                    "Upstream image fetch duration in seconds",
                )
                .buckets(vec![
                    0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
            )
            .unwrap(),
        );

        let upstream_responses_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "media_proxy_upstream_responses_total",
                    "Upstream fetch outcomes",
                ),
                &["outcome"],
            )
            .unwrap(),
        );

        Metrics {
            registry,
            build_info,
            http_requests_total,
            http_request_duration_seconds,
            http_response_size_bytes,
            media_rejections_total,
            upstream_fetch_duration_seconds,
            upstream_responses_total,
        }
    }
}

/// Classify a request path into a bounded operation label.
pub fn classify_operation(path: &str) -> &'static str {
    match path {
        "/api/media" => "media",
        "/health" => "health",
        "/metrics" => "metrics",
        _ => "unknown",
    }
}

/// Bounded `method` label. Extension methods collapse to "other".
pub fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::OPTIONS => "OPTIONS",
        Method::PATCH => "PATCH",
        _ => "other",
    }
}

/// Axum middleware that records HTTP request metrics.
pub async fn http_metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let metrics = match &state.metrics {
        Some(m) => m,
        None => return next.run(request).await,
    };

    let method = method_label(request.method());
    let operation = classify_operation(request.uri().path());

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed().as_secs_f64();

    let status = response.status().as_u16().to_string();

    metrics
        .http_requests_total
        .with_label_values(&[method, status.as_str(), operation])
        .inc();
    metrics
        .http_request_duration_seconds
        .with_label_values(&[method, operation])
        .observe(duration);

    // Record response size from Content-Length if available
    if let Some(cl) = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
    {
        metrics
            .http_response_size_bytes
            .with_label_values(&[operation])
            .observe(cl);
    }

    response
}

/// Handler for GET /metrics. Returns Prometheus text format.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = match &state.metrics {
        Some(m) => m,
        None => {
            return (StatusCode::NOT_FOUND, "Metrics not enabled").into_response();
        }
    };

    let encoder = TextEncoder::new();
    let metric_families = metrics.registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (StatusCode::OK, [("content-type", TEXT_FORMAT)], buffer).into_response()
}

//! HTTP surface: the media proxy endpoint plus health and metrics

mod errors;
pub mod handlers;

pub use errors::ErrorBody;

use crate::media::MEDIA_PROXY_PATH;
use crate::metrics::{http_metrics_middleware, metrics_handler};
use axum::routing::{any, get};
use axum::{middleware, Router};
use handlers::{health_check, media_proxy, AppState};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// Routes:
///   ANY /api/media - signed media proxy (anything but GET is 405)
///   GET /health    - liveness and build info
///   GET /metrics   - Prometheus text format
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(MEDIA_PROXY_PATH, any(media_proxy))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            http_metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Request handlers
//!
//! - `media`: the signed media proxy endpoint
//! - `status`: health check

mod media;
mod status;

pub use media::{media_proxy, CACHE_CONTROL_VALUE};
pub use status::{health_check, HealthResponse};

use crate::media::MediaKeys;
use crate::metrics::Metrics;
use crate::upstream::UpstreamClient;
use std::sync::Arc;

/// Application state shared across handlers. Immutable after startup.
pub struct AppState {
    pub keys: Arc<MediaKeys>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub metrics: Option<Metrics>,
}

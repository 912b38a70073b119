//! Media Proxy - signed, encrypted first-party URLs for third-party images
//!
//! This library provides the URL signer used when rendering pages and the
//! verifying proxy server that resolves those URLs.

pub mod api;
pub mod config;
pub mod media;
pub mod metrics;
pub mod upstream;

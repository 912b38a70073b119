//! HttpUpstream against a local axum server standing in for the image host

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use media_proxy::upstream::{HttpUpstream, UpstreamClient, UpstreamError};
use reqwest::Url;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

async fn image() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/webp")], b"RIFF....WEBP".to_vec())
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(3)).await;
    "too late"
}

async fn moved() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/image")])
}

async fn offsite() -> impl IntoResponse {
    (
        StatusCode::FOUND,
        [(header::LOCATION, "https://evil.example.com/a.png")],
    )
}

async fn redirect_loop() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/loop")])
}

async fn start_image_host() -> SocketAddr {
    let app = Router::new()
        .route("/image", get(image))
        .route("/slow", get(slow))
        .route("/moved", get(moved))
        .route("/offsite", get(offsite))
        .route("/loop", get(redirect_loop));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Client that treats the local test host as allow-listed.
fn local_upstream(addr: SocketAddr) -> HttpUpstream {
    HttpUpstream::with_redirect_filter(Duration::from_secs(5), move |url: &Url| {
        url.host_str() == Some("127.0.0.1") && url.port() == Some(addr.port())
    })
    .unwrap()
}

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{}{}", addr, path)).unwrap()
}

#[tokio::test]
async fn test_fetch_passes_through_body_and_headers() {
    let addr = start_image_host().await;
    let upstream = HttpUpstream::new(Duration::from_secs(5)).unwrap();

    let response = upstream.fetch(&url(addr, "/image")).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type.unwrap(), "image/webp");
    assert_eq!(response.content_length.unwrap(), "12");
    assert_eq!(response.body.as_ref(), b"RIFF....WEBP");
}

#[tokio::test]
async fn test_not_found_is_data_not_error() {
    let addr = start_image_host().await;
    let upstream = HttpUpstream::new(Duration::from_secs(5)).unwrap();

    let response = upstream.fetch(&url(addr, "/missing")).await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_redirect_to_allowed_host_is_followed() {
    let addr = start_image_host().await;
    let upstream = local_upstream(addr);

    let response = upstream.fetch(&url(addr, "/moved")).await.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type.unwrap(), "image/webp");
    assert_eq!(response.body.as_ref(), b"RIFF....WEBP");
}

#[tokio::test]
async fn test_redirect_to_disallowed_host_is_refused() {
    let addr = start_image_host().await;
    let upstream = local_upstream(addr);

    let response = upstream.fetch(&url(addr, "/offsite")).await.unwrap();
    assert_eq!(response.status, StatusCode::FOUND);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_redirect_loop_is_an_error() {
    let addr = start_image_host().await;
    let upstream = local_upstream(addr);

    let err = upstream.fetch(&url(addr, "/loop")).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Request(_)), "got {:?}", err);
}

/// The default client only follows https hops onto the image hosts, so a
/// plain-http local redirect is refused.
#[tokio::test]
async fn test_default_policy_refuses_non_allowlisted_redirect() {
    let addr = start_image_host().await;
    let upstream = HttpUpstream::new(Duration::from_secs(5)).unwrap();

    let response = upstream.fetch(&url(addr, "/moved")).await.unwrap();
    assert_eq!(response.status, StatusCode::FOUND);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let addr = start_image_host().await;
    let upstream = HttpUpstream::new(Duration::from_millis(200)).unwrap();

    let err = upstream.fetch(&url(addr, "/slow")).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Timeout), "got {:?}", err);
}

#[tokio::test]
async fn test_connection_refused_is_request_error() {
    // Bind then drop to get a port nobody is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let upstream = HttpUpstream::new(Duration::from_secs(5)).unwrap();
    let err = upstream.fetch(&url(addr, "/image")).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Request(_)), "got {:?}", err);
}

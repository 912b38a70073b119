//! Shared test infrastructure for integration tests
//!
//! Provides an in-process TestServer backed by a scripted MockUpstream, and
//! a BinaryServer that spawns the real media_proxy binary.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::{HeaderValue, StatusCode};
use bytes::Bytes;
use media_proxy::api::build_router;
use media_proxy::api::handlers::AppState;
use media_proxy::media::{MediaKeys, MediaSecret, MediaSigner, TransformParams};
use media_proxy::metrics::Metrics;
use media_proxy::upstream::{UpstreamClient, UpstreamError, UpstreamResponse};
use reqwest::Url;
use std::net::SocketAddr;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Port counter for spawned binaries, to avoid conflicts between tests.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19400);

pub const TEST_SECRET: &str = "integration-test-secret-0123456789";
pub const SOURCE: &str = "https://images.microcms-assets.io/assets/a.png";

/// What the mock upstream answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    Image {
        content_type: Option<&'static str>,
        body: &'static [u8],
    },
    Status(u16),
    Timeout,
    ConnectionError,
}

/// Scripted upstream that records every URL it is asked for.
pub struct MockUpstream {
    reply: MockReply,
    requested: Mutex<Vec<String>>,
}

impl MockUpstream {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn fetch(&self, url: &Url) -> Result<UpstreamResponse, UpstreamError> {
        self.requested.lock().unwrap().push(url.to_string());
        match &self.reply {
            MockReply::Image { content_type, body } => Ok(UpstreamResponse {
                status: StatusCode::OK,
                content_type: content_type.map(HeaderValue::from_static),
                content_length: Some(HeaderValue::from(body.len())),
                body: Bytes::from_static(body),
            }),
            MockReply::Status(code) => Ok(UpstreamResponse {
                status: StatusCode::from_u16(*code).unwrap(),
                content_type: None,
                content_length: None,
                body: Bytes::new(),
            }),
            MockReply::Timeout => Err(UpstreamError::Timeout),
            MockReply::ConnectionError => {
                Err(UpstreamError::Request("connection refused".to_string()))
            }
        }
    }
}

pub fn test_keys() -> Arc<MediaKeys> {
    Arc::new(MediaKeys::derive(&MediaSecret::new(TEST_SECRET).unwrap()))
}

/// In-process server on an ephemeral port.
pub struct TestServer {
    addr: SocketAddr,
    pub keys: Arc<MediaKeys>,
    pub upstream: Arc<MockUpstream>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(reply: MockReply) -> Self {
        let keys = test_keys();
        let upstream = Arc::new(MockUpstream::new(reply));
        let state = Arc::new(AppState {
            keys: keys.clone(),
            upstream: upstream.clone(),
            metrics: Some(Metrics::new()),
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        let app = build_router(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            keys,
            upstream,
            handle,
        }
    }

    /// Serve a PNG-looking body for every fetch.
    pub async fn with_image() -> Self {
        Self::start(MockReply::Image {
            content_type: Some("image/png"),
            body: b"\x89PNG fake image bytes",
        })
        .await
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn signer(&self) -> MediaSigner {
        MediaSigner::new(self.keys.clone(), self.endpoint())
    }

    /// Sign `source` and return the absolute URL on this server.
    pub fn signed_url(&self, source: &str, params: &TransformParams) -> String {
        self.signer()
            .build_signed_proxy_url(source, params, true)
            .expect("signing failed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawned `media_proxy` binary.
pub struct BinaryServer {
    process: Child,
    port: u16,
}

impl BinaryServer {
    pub async fn spawn() -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let process = Command::new(env!("CARGO_BIN_EXE_media_proxy"))
            .env("MEDIA_PROXY_SECRET", TEST_SECRET)
            .env("MP_LISTEN_ADDR", format!("127.0.0.1:{}", port))
            .env_remove("MP_CONFIG")
            .env("RUST_LOG", "media_proxy=warn")
            .spawn()
            .expect("Failed to start server");

        let mut server = Self { process, port };
        server.wait_ready().await;
        server
    }

    async fn wait_ready(&mut self) {
        let addr = format!("127.0.0.1:{}", self.port);
        for _ in 0..150 {
            if std::net::TcpStream::connect(&addr).is_ok() {
                return;
            }

            if let Ok(Some(status)) = self.process.try_wait() {
                panic!("Server exited before becoming ready: {}", status);
            }

            sleep(Duration::from_millis(100)).await;
        }

        let _ = self.process.kill();
        panic!("Timed out waiting for server on {}", addr);
    }

    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for BinaryServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}

/// Run the binary to completion with the given args and environment.
pub fn run_binary(args: &[&str], secret: Option<&str>) -> std::process::Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_media_proxy"));
    command
        .args(args)
        .env_remove("MEDIA_PROXY_SECRET")
        .env_remove("RUST_LOG")
        .env_remove("MP_CONFIG")
        .env("MP_LISTEN_ADDR", "127.0.0.1:0");
    if let Some(secret) = secret {
        command.env("MEDIA_PROXY_SECRET", secret);
    }
    command.output().expect("Failed to run binary")
}

/// Split a proxy URL's query into ordered pairs.
pub fn query_pairs(url: &str) -> Vec<(String, String)> {
    let query = url.split_once('?').map(|(_, q)| q).unwrap_or("");
    serde_urlencoded::from_str(query).unwrap()
}

/// Rebuild a proxy URL from pairs.
pub fn with_query(url: &str, pairs: &[(String, String)]) -> String {
    let base = url.split_once('?').map(|(b, _)| b).unwrap_or(url);
    format!("{}?{}", base, serde_urlencoded::to_string(pairs).unwrap())
}

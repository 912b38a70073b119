//! Configuration for the media proxy server

use crate::media::MediaSecret;
use crate::upstream::DEFAULT_UPSTREAM_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Environment variable holding the proxy secret.
pub const SECRET_ENV: &str = "MEDIA_PROXY_SECRET";

/// Server configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address to listen on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Public site origin used when signing absolute proxy URLs
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Bound on each upstream image fetch
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    /// Serve Prometheus metrics on GET /metrics
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    /// Log level filter string. Overridden by RUST_LOG.
    /// Default: "media_proxy=debug,tower_http=debug"
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Signing/encryption secret. `MEDIA_PROXY_SECRET` takes precedence.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_upstream_timeout_secs() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_SECS
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_log_level() -> String {
    "media_proxy=debug,tower_http=debug".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_url: default_public_url(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            metrics_enabled: default_metrics_enabled(),
            log_level: default_log_level(),
            secret: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("public_url", &self.public_url)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("metrics_enabled", &self.metrics_enabled)
            .field("log_level", &self.log_level)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Load configuration from a TOML file. The secret env var still wins.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let mut config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_secret_env();
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("MP_LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse() {
                config.listen_addr = parsed;
            }
        }

        if let Ok(url) = std::env::var("MP_PUBLIC_URL") {
            config.public_url = url;
        }

        if let Ok(timeout) = std::env::var("MP_UPSTREAM_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse() {
                config.upstream_timeout_secs = parsed;
            }
        }

        if let Ok(metrics) = std::env::var("MP_METRICS") {
            config.metrics_enabled = metrics == "true" || metrics == "1";
        }

        if let Ok(level) = std::env::var("MP_LOG_LEVEL") {
            config.log_level = level;
        }

        config.apply_secret_env();
        config
    }

    /// Load configuration from `MP_CONFIG`, then the default file locations,
    /// otherwise from environment.
    ///
    /// A file that is named or present but unreadable or malformed is an
    /// error; only absent default files fall through to the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("MP_CONFIG") {
            return Self::from_file(&path);
        }

        for path in &["media_proxy.toml", "/etc/media_proxy/config.toml"] {
            if std::path::Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::from_env())
    }

    fn apply_secret_env(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_ENV) {
            self.secret = Some(secret);
        }
    }

    /// The proxy secret. Absent or empty is a startup error, never a default.
    pub fn media_secret(&self) -> Result<MediaSecret, ConfigError> {
        match &self.secret {
            Some(secret) => MediaSecret::new(secret.as_str()),
            None => Err(ConfigError::MissingSecret),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{} is required", SECRET_ENV)]
    MissingSecret,
}

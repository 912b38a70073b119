//! Media Proxy - signed, encrypted first-party URLs for third-party images

use clap::{Parser, Subcommand};
use media_proxy::api::build_router;
use media_proxy::api::handlers::AppState;
use media_proxy::config::Config;
use media_proxy::media::{MediaKeys, MediaSigner, TransformParams};
use media_proxy::metrics::Metrics;
use media_proxy::upstream::HttpUpstream;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Media Proxy - serve allow-listed upstream images through signed URLs
#[derive(Parser, Debug)]
#[command(name = "media_proxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a signed proxy URL for an upstream image URL
    Sign {
        /// Upstream image URL
        url: String,

        /// Width, 1-2000
        #[arg(long)]
        w: Option<String>,

        /// Height, 1-2000
        #[arg(long)]
        h: Option<String>,

        /// Quality, 40-85
        #[arg(long)]
        q: Option<String>,

        /// Fit mode: clip, clamp, crop or max
        #[arg(long)]
        fit: Option<String>,

        /// Prefix the configured public URL
        #[arg(long)]
        absolute: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from file if specified, otherwise use default loading
    let mut config = if let Some(ref path) = cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Initialize tracing. Logs go to stderr so `sign` output stays clean.
    let log_level = if cli.verbose {
        "media_proxy=trace,tower_http=trace".to_string()
    } else {
        config.log_level.clone()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let secret = config.media_secret().map_err(|e| {
        error!("Refusing to start: {}", e);
        e
    })?;
    let keys = Arc::new(MediaKeys::derive(&secret));
    drop(secret);

    if let Some(Command::Sign {
        url,
        w,
        h,
        q,
        fit,
        absolute,
    }) = cli.command
    {
        let params =
            TransformParams::from_raw(w.as_deref(), h.as_deref(), q.as_deref(), fit.as_deref())?;
        let signer = MediaSigner::new(keys, config.public_url.clone());
        println!("{}", signer.build_signed_proxy_url(&url, &params, absolute)?);
        return Ok(());
    }

    // CLI overrides
    if let Some(ref addr) = cli.listen {
        config.listen_addr = addr.parse()?;
    }

    info!("Starting media proxy");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Public URL: {}", config.public_url);
    info!("  Upstream timeout: {}s", config.upstream_timeout_secs);
    if !config.metrics_enabled {
        warn!("  Metrics are DISABLED, GET /metrics will return 404");
    }

    let metrics = config.metrics_enabled.then(Metrics::new);

    let state = Arc::new(AppState {
        keys,
        upstream: Arc::new(HttpUpstream::new(config.upstream_timeout())?),
        metrics,
    });
    let app = build_router(state);

    // Start server with graceful shutdown
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Media proxy listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Handle shutdown signals (SIGINT, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

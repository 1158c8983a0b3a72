//! Bybit Archiver Binary
//!
//! Starts the feed client and the flush scheduler, then runs until
//! terminated.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin bybit-archiver
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `ARCHIVER_FEED_URL`: WebSocket endpoint, e.g. `wss://stream.bybit.com/v5/public/linear`
//! - `ARCHIVER_INSTRUMENTS_FILE`: Path to the instruments JSON file
//! - `ARCHIVER_STORAGE_ROOT`: Output directory for Parquet files
//!
//! ## Optional
//! - `ARCHIVER_TIMEZONE`: IANA timezone for flush time and file dates (default: UTC)
//! - `ARCHIVER_FLUSH_TIME`: Daily flush time HH:MM (default: 00:00)
//! - `ARCHIVER_STORAGE_QUOTA_BYTES`: Retention ceiling (default: 15 GiB)
//! - `ARCHIVER_PING_INTERVAL_SECS`: Heartbeat interval (default: 20)
//! - `ARCHIVER_RECONNECT_DELAY_INITIAL_SECS`: First retry delay (default: 5)
//! - `ARCHIVER_RECONNECT_DELAY_MAX_SECS`: Backoff cap (default: 60)
//! - `ARCHIVER_RECONNECT_DELAY_MULTIPLIER`: Backoff multiplier (default: 2.0)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bybit_archiver::infrastructure::telemetry;
use bybit_archiver::{
    ArchiverConfig, BatchWriter, FeedClient, FeedClientConfig, FlushScheduler, InstrumentCatalog,
    RecordBuffer, RetentionEnforcer,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Grace period for the feed client task after cancellation.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    telemetry::init();

    tracing::info!("starting Bybit archiver");

    let config = ArchiverConfig::from_env().context("failed to load configuration")?;
    log_config(&config);

    let catalog = InstrumentCatalog::load(&config.instruments_file).with_context(|| {
        format!(
            "failed to load instruments from {}",
            config.instruments_file.display()
        )
    })?;
    tracing::info!(
        instruments = catalog.instrument_count(),
        topics = catalog.subscription_args().len(),
        "instrument catalog loaded"
    );

    let catalog = Arc::new(catalog);
    let buffer = Arc::new(RecordBuffer::new(&catalog));
    let shutdown_token = CancellationToken::new();

    // Feed client task: receive loop, appends into the buffer.
    let feed_config = FeedClientConfig {
        url: config.feed_url.clone(),
        ping_interval: config.websocket.ping_interval,
        reconnect: config.websocket.reconnect_config(),
    };
    let feed_client = Arc::new(FeedClient::new(
        feed_config,
        Arc::clone(&catalog),
        Arc::clone(&buffer),
        shutdown_token.clone(),
    ));
    let feed_handle = tokio::spawn(async move {
        if let Err(e) = feed_client.run().await {
            tracing::error!(error = %e, "feed client error");
        }
    });

    // Flush scheduler task: drains the buffer, writes, evicts.
    let scheduler = FlushScheduler::new(
        config.flush,
        Arc::clone(&buffer),
        BatchWriter::new(config.storage.root.clone()),
        RetentionEnforcer::new(config.storage.root.clone(), config.storage.quota_bytes),
        shutdown_token.clone(),
    );
    let scheduler_handle = tokio::spawn(scheduler.run());

    tracing::info!("archiver ready");

    await_shutdown(shutdown_token).await;

    // Let an in-flight flush finish; the feed client gets a bounded grace
    // period. No final flush: unflushed records are dropped by design.
    let _ = scheduler_handle.await;
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, feed_handle).await.is_err() {
        tracing::warn!("feed client did not stop within the shutdown timeout");
    }

    tracing::info!("archiver stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ArchiverConfig) {
    tracing::info!(
        feed_url = %config.feed_url,
        instruments_file = %config.instruments_file.display(),
        storage_root = %config.storage.root.display(),
        quota_bytes = config.storage.quota_bytes,
        flush_time = %config.flush.flush_time,
        timezone = %config.flush.timezone,
        "configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel the token.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}

use anyhow::{Context, Result};
use chrono::TimeDelta;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use shorturl::clock::{Clock, SystemClock};
use shorturl::config::Config;
use shorturl::shortcode::RandomGenerator;
use shorturl::storage::{MemoryStore, Sweeper, UrlStore};
use shorturl::{create_app, logging, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    let _remote_log_task = logging::init(&config.logging)?;
    info!("Loaded configuration");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn UrlStore> = Arc::new(MemoryStore::with_clock(Arc::clone(&clock)));

    let sweeper = match config.sweeper.interval_secs {
        Some(secs) if secs > 0 => {
            let retention = TimeDelta::try_seconds(config.sweeper.retention_secs as i64)
                .context("SWEEP_RETENTION_SECS out of range")?;
            info!(
                interval_secs = secs,
                retention_secs = config.sweeper.retention_secs,
                "🧹 Expired-record sweeper enabled"
            );
            Some(Sweeper::spawn(
                Arc::clone(&store),
                Arc::clone(&clock),
                Duration::from_secs(secs),
                retention,
            ))
        }
        _ => None,
    };

    let generator = Arc::new(RandomGenerator::new(config.shortcode.length));
    let addr = config.bind_addr();
    info!(static_dir = %config.frontend.static_dir, "Serving static frontend");

    let state = Arc::new(AppState::new(store, generator, clock, Arc::new(config)));
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("🚀 Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

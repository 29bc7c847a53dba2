//! Tracing setup: env-filtered console output plus an optional remote sink.

pub mod remote;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

pub const DEFAULT_FILTER: &str = "shorturl=info,tower_http=info";

/// Install the global subscriber.
///
/// Must run inside a tokio runtime when a remote sink is configured, since the
/// sink's delivery task is spawned here. The returned handle belongs to that
/// task.
pub fn init(config: &LoggingConfig) -> Result<Option<JoinHandle<()>>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (remote_layer, remote_task) = match &config.remote {
        Some(remote) => {
            let (layer, task) = remote::RemoteLayer::spawn(remote)?;
            (Some(layer), Some(task))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(remote_layer);

    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Text => registry.with(fmt::layer()).try_init()?,
    }

    Ok(remote_task)
}

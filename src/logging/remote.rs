//! Ships log events to a remote evaluation endpoint.
//!
//! Events are mapped to `{stack, level, package, message}` entries and handed
//! to a bounded channel. A background task drains it and POSTs each entry,
//! retrying with exponential backoff. When the channel is full the entry is
//! dropped so request handling never blocks on the sink.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::config::RemoteLogConfig;

pub const CHANNEL_CAPACITY: usize = 1024;
const BASE_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const SUCCESS_MESSAGE: &str = "log created successfully";

/// Targets whose events never reach the sink, to keep delivery failures and
/// HTTP client chatter from feeding back into it.
const SKIPPED_TARGETS: &[&str] = &["shorturl::logging", "reqwest", "hyper", "h2", "rustls"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub stack: String,
    pub level: String,
    pub package: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct LogResponse {
    #[serde(rename = "logID")]
    log_id: String,
    message: String,
}

#[derive(Debug, Error)]
pub enum RemoteLogError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("log rejected: {0}")]
    Rejected(String),
}

pub fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG | Level::TRACE => "debug",
    }
}

/// Parse a configured level; unknown names yield `None`.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_ascii_lowercase().as_str() {
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" | "fatal" => Some(Level::ERROR),
        _ => None,
    }
}

/// Map a tracing target onto the sink's package vocabulary.
pub fn package_for_target(target: &str) -> &'static str {
    let module = target.strip_prefix("shorturl::").unwrap_or(target);
    let head = module.split("::").next().unwrap_or_default();

    match head {
        "api" | "redirect" | "middleware" | "app" => "handler",
        "storage" => "repository",
        "shortcode" | "models" => "domain",
        "config" => "config",
        _ => "service",
    }
}

/// Delay before retry `attempt` (zero based): 100ms * 2^attempt, capped.
pub fn backoff(attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| BASE_BACKOFF.checked_mul(factor))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

/// Delivers entries to the remote endpoint.
#[derive(Clone)]
pub struct RemoteSink {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl RemoteSink {
    pub fn new(url: impl Into<String>, max_retries: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            max_retries,
        }
    }

    pub async fn send(&self, entry: &LogEntry) -> Result<String, RemoteLogError> {
        let response = self.client.post(&self.url).json(entry).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(RemoteLogError::Status(status.as_u16()));
        }

        let body: LogResponse = response.json().await?;
        if body.message != SUCCESS_MESSAGE {
            return Err(RemoteLogError::Rejected(body.message));
        }

        Ok(body.log_id)
    }

    /// Send with `max_retries` attempts, sleeping 100ms * 2^n between them.
    pub async fn send_with_retry(&self, entry: &LogEntry) -> Result<String, RemoteLogError> {
        let attempts = self.max_retries.max(1);
        let mut attempt = 0;

        loop {
            match self.send(entry).await {
                Ok(log_id) => return Ok(log_id),
                Err(err) if attempt + 1 >= attempts => return Err(err),
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "remote log delivery failed, retrying");
                    tokio::time::sleep(backoff(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// A [`Layer`] that forwards events at or above `min_level` to the sink.
pub struct RemoteLayer {
    tx: mpsc::Sender<LogEntry>,
    stack: String,
    min_level: Level,
}

impl RemoteLayer {
    pub fn new(tx: mpsc::Sender<LogEntry>, stack: impl Into<String>, min_level: Level) -> Self {
        Self {
            tx,
            stack: stack.into(),
            min_level,
        }
    }

    /// Build the layer and spawn the task that drains it.
    pub fn spawn(config: &RemoteLogConfig) -> anyhow::Result<(Self, JoinHandle<()>)> {
        let min_level = parse_level(&config.level)
            .ok_or_else(|| anyhow::anyhow!("invalid REMOTE_LOG_LEVEL: {}", config.level))?;

        let (tx, mut rx) = mpsc::channel::<LogEntry>(CHANNEL_CAPACITY);
        let sink = RemoteSink::new(config.url.clone(), config.max_retries);

        let handle = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(err) = sink.send_with_retry(&entry).await {
                    tracing::warn!(error = %err, "dropping remote log entry");
                }
            }
        });

        Ok((Self::new(tx, config.stack.clone(), min_level), handle))
    }
}

impl<S: Subscriber> Layer<S> for RemoteLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.min_level {
            return;
        }

        let target = metadata.target();
        if SKIPPED_TARGETS.iter().any(|skipped| target.starts_with(skipped)) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let entry = LogEntry {
            stack: self.stack.clone(),
            level: level_name(metadata.level()).to_string(),
            package: package_for_target(target).to_string(),
            message: visitor.finish(),
        };

        let _ = self.tx.try_send(entry);
    }
}

/// Renders an event as its message followed by `key=value` fields.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields
        } else {
            format!("{} {}", self.message, self.fields)
        }
    }

    fn push_field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), &format_args!("{value:?}"));
        }
    }
}

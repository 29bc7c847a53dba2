use crate::models::{Click, ShortUrl};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("shortcode already exists: {0}")]
    AlreadyExists(String),
    #[error("shortcode not found: {0}")]
    NotFound(String),
    #[error("shortcode has expired: {0}")]
    Expired(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Shared table of short URLs.
///
/// Every method may be called from many threads at once. Readers never see a
/// record mid-mutation: a click's event and its count increment land together.
pub trait UrlStore: Send + Sync {
    /// Insert a new record keyed by its shortcode. Never overwrites.
    fn create(&self, url: ShortUrl) -> StorageResult<()>;

    /// Fetch a live record. Expiry is checked against the current time on
    /// every call; expired records yield `Expired`, not `NotFound`.
    fn get(&self, short_code: &str) -> StorageResult<ShortUrl>;

    /// Fetch a record regardless of expiry (administrative reads only).
    fn peek(&self, short_code: &str) -> StorageResult<ShortUrl>;

    /// Replace the target URL and expiry of an existing record.
    ///
    /// Identity, creation time and click history stay as stored, so clicks
    /// recorded after the caller read the record are never rolled back.
    fn update(&self, url: ShortUrl) -> StorageResult<()>;

    fn delete(&self, short_code: &str) -> StorageResult<()>;

    /// Append a click and bump the counter as one unit.
    fn record_click(&self, short_code: &str, click: Click) -> StorageResult<()>;

    /// True while any record holds the key, expired or not. Used for collision
    /// checks so an expired code is never handed to a new target.
    fn exists(&self, short_code: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop records whose expiry is at or before `cutoff`. Returns how many
    /// were removed.
    fn purge_expired(&self, cutoff: DateTime<Utc>) -> usize;
}

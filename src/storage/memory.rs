use crate::clock::{Clock, SystemClock};
use crate::models::{Click, ShortUrl};
use crate::storage::{StorageError, StorageResult, UrlStore};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// In-memory [`UrlStore`] on top of a sharded map.
///
/// Each shard is a reader/writer lock: lookups share it, while create, update,
/// delete and click recording hold it exclusively for the one record they
/// touch. Reads hand out clones so no guard outlives a call.
pub struct MemoryStore {
    urls: DashMap<String, ShortUrl>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            urls: DashMap::new(),
            clock,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlStore for MemoryStore {
    fn create(&self, url: ShortUrl) -> StorageResult<()> {
        match self.urls.entry(url.id.clone()) {
            Entry::Occupied(entry) => Err(StorageError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                trace!(short_code = %url.id, "inserting short url");
                entry.insert(url);
                Ok(())
            }
        }
    }

    fn get(&self, short_code: &str) -> StorageResult<ShortUrl> {
        let url = self
            .urls
            .get(short_code)
            .ok_or_else(|| StorageError::NotFound(short_code.to_string()))?;

        if url.is_expired_at(self.clock.now()) {
            debug!(short_code, "lookup hit an expired record");
            return Err(StorageError::Expired(short_code.to_string()));
        }

        Ok(url.clone())
    }

    fn peek(&self, short_code: &str) -> StorageResult<ShortUrl> {
        self.urls
            .get(short_code)
            .map(|url| url.clone())
            .ok_or_else(|| StorageError::NotFound(short_code.to_string()))
    }

    fn update(&self, url: ShortUrl) -> StorageResult<()> {
        match self.urls.get_mut(&url.id) {
            Some(mut existing) => {
                existing.original_url = url.original_url;
                existing.expires_at = url.expires_at;
                Ok(())
            }
            None => Err(StorageError::NotFound(url.id)),
        }
    }

    fn delete(&self, short_code: &str) -> StorageResult<()> {
        self.urls
            .remove(short_code)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(short_code.to_string()))
    }

    fn record_click(&self, short_code: &str, click: Click) -> StorageResult<()> {
        let mut url = self
            .urls
            .get_mut(short_code)
            .ok_or_else(|| StorageError::NotFound(short_code.to_string()))?;

        if url.is_expired_at(self.clock.now()) {
            return Err(StorageError::Expired(short_code.to_string()));
        }

        url.push_click(click);
        Ok(())
    }

    fn exists(&self, short_code: &str) -> bool {
        self.urls.contains_key(short_code)
    }

    fn len(&self) -> usize {
        self.urls.len()
    }

    fn purge_expired(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.urls.retain(|_, url| {
            let keep = url.expires_at > cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

//! Optional background eviction of long-expired records.
//!
//! Reads already reject expired entries lazily; the sweeper only reclaims
//! memory. Records are kept for a retention period past their expiry so a code
//! cannot be reissued the moment it lapses.

use crate::clock::Clock;
use crate::storage::UrlStore;
use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Start sweeping every `interval`, evicting records that expired more
    /// than `retention` ago.
    pub fn spawn(
        store: Arc<dyn UrlStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        retention: TimeDelta,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            // First tick fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep_once(store.as_ref(), clock.as_ref(), retention);
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Shutdown signal received, stopping sweeper");
                            break;
                        }
                    }
                }
            }
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop the sweeper and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!("Sweeper task ended abnormally: {}", e);
        }
    }
}

/// Run a single eviction pass and return how many records were dropped.
pub fn sweep_once(store: &dyn UrlStore, clock: &dyn Clock, retention: TimeDelta) -> usize {
    let now = clock.now();
    let Some(cutoff) = now.checked_sub_signed(retention) else {
        tracing::warn!(
            retention_secs = retention.num_seconds(),
            "retention reaches past the earliest representable time, skipping sweep"
        );
        return 0;
    };
    let removed = store.purge_expired(cutoff);
    if removed > 0 {
        tracing::info!(removed, remaining = store.len(), "evicted expired short urls");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::models::ShortUrl;
    use crate::storage::MemoryStore;
    use chrono::Utc;

    #[test]
    fn oversized_retention_skips_the_sweep() {
        let clock = ManualClock::new(Utc::now());
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));
        let url = ShortUrl::new("kept", "https://example.com", clock.now(), TimeDelta::minutes(1))
            .unwrap();
        store.create(url).unwrap();
        clock.advance(TimeDelta::days(1));

        let retention = TimeDelta::try_seconds(9_000_000_000_000).unwrap();
        assert_eq!(sweep_once(&store, &clock, retention), 0);
        assert!(store.exists("kept"));
    }

    #[test]
    fn sweep_once_respects_retention() {
        let clock = ManualClock::new(Utc::now());
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));
        let url = ShortUrl::new("gone", "https://example.com", clock.now(), TimeDelta::minutes(1))
            .unwrap();
        store.create(url).unwrap();

        clock.advance(TimeDelta::minutes(30));
        assert_eq!(sweep_once(&store, &clock, TimeDelta::hours(1)), 0);
        assert!(store.exists("gone"));

        clock.advance(TimeDelta::hours(1));
        assert_eq!(sweep_once(&store, &clock, TimeDelta::hours(1)), 1);
        assert!(!store.exists("gone"));
    }

    #[tokio::test]
    async fn spawned_sweeper_evicts_and_stops() {
        let store = Arc::new(MemoryStore::new());
        let past = Utc::now() - TimeDelta::hours(2);
        let url = ShortUrl::new("stale", "https://example.com", past, TimeDelta::minutes(1)).unwrap();
        store.create(url).unwrap();

        let sweeper = Sweeper::spawn(
            store.clone(),
            Arc::new(SystemClock),
            Duration::from_millis(10),
            TimeDelta::zero(),
        );

        time::sleep(Duration::from_millis(100)).await;
        sweeper.shutdown().await;

        assert!(!store.exists("stale"));
    }
}

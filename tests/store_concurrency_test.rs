//! Store concurrency tests
//!
//! Hammer a shared `MemoryStore` from many tokio tasks and check that
//! creation stays exclusive and no click is lost.

use chrono::{TimeDelta, Utc};
use shorturl::models::{Click, ShortUrl};
use shorturl::storage::{MemoryStore, StorageError, UrlStore};
use std::sync::Arc;

fn click(n: usize) -> Click {
    Click {
        timestamp: Utc::now(),
        referrer: format!("ref-{n}"),
        location: "Location from 127.0.0.1".to_string(),
        user_agent: "stress".to_string(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_same_code() {
    let store: Arc<dyn UrlStore> = Arc::new(MemoryStore::new());

    let mut handles = vec![];
    for i in 0..64 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let url = ShortUrl::new(
                "same",
                format!("https://example.com/{i}"),
                Utc::now(),
                TimeDelta::minutes(30),
            )
            .unwrap();
            store.create(url)
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => successes += 1,
            Err(StorageError::AlreadyExists(code)) => assert_eq!(code, "same"),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clicks_are_all_counted() {
    let store: Arc<dyn UrlStore> = Arc::new(MemoryStore::new());
    let url = ShortUrl::new("hot", "https://example.com", Utc::now(), TimeDelta::minutes(30))
        .unwrap();
    store.create(url).unwrap();

    let mut handles = vec![];
    for task in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for n in 0..50 {
                store.record_click("hot", click(task * 50 + n)).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let url = store.get("hot").unwrap();
    assert_eq!(url.clicks, 1000);
    assert_eq!(url.click_data.len(), 1000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_during_clicks_see_consistent_records() {
    let store: Arc<dyn UrlStore> = Arc::new(MemoryStore::new());
    let url = ShortUrl::new("mixed", "https://example.com", Utc::now(), TimeDelta::minutes(30))
        .unwrap();
    store.create(url).unwrap();

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for n in 0..500 {
                store.record_click("mixed", click(n)).unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let reader = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for _ in 0..500 {
                let snapshot = store.get("mixed").unwrap();
                assert_eq!(snapshot.clicks as usize, snapshot.click_data.len());
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    assert_eq!(store.get("mixed").unwrap().clicks, 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_updates_never_roll_back_clicks() {
    let store: Arc<dyn UrlStore> = Arc::new(MemoryStore::new());
    let url = ShortUrl::new("edited", "https://example.com", Utc::now(), TimeDelta::minutes(30))
        .unwrap();
    store.create(url).unwrap();

    let clicker = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for n in 0..300 {
                store.record_click("edited", click(n)).unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    let editor = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for n in 0..300 {
                let mut snapshot = store.peek("edited").unwrap();
                tokio::task::yield_now().await;
                snapshot.original_url = format!("https://example.com/{n}");
                store.update(snapshot).unwrap();
            }
        })
    };

    clicker.await.unwrap();
    editor.await.unwrap();

    let url = store.get("edited").unwrap();
    assert_eq!(url.clicks, 300);
    assert_eq!(url.click_data.len(), 300);
    assert_eq!(url.original_url, "https://example.com/299");
}

//! Remote log sink integration tests
//!
//! Run a throwaway axum server standing in for the log collector and check
//! the payload, success handling and retry behaviour of `RemoteSink`.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use shorturl::logging::remote::{LogEntry, RemoteLogError, RemoteSink};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Collector {
    received: Mutex<Vec<Value>>,
    calls: AtomicUsize,
    fail_first: usize,
}

async fn collect(
    State(collector): State<Arc<Collector>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let call = collector.calls.fetch_add(1, Ordering::SeqCst);
    if call < collector.fail_first {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "try again" })),
        );
    }

    collector.received.lock().unwrap().push(body);
    (
        StatusCode::OK,
        Json(json!({ "logID": format!("log-{call}"), "message": "log created successfully" })),
    )
}

async fn spawn_collector(fail_first: usize) -> (String, Arc<Collector>) {
    let collector = Arc::new(Collector {
        fail_first,
        ..Collector::default()
    });
    let app = Router::new()
        .route("/logs", post(collect))
        .with_state(Arc::clone(&collector));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/logs"), collector)
}

fn entry() -> LogEntry {
    LogEntry {
        stack: "backend".to_string(),
        level: "info".to_string(),
        package: "handler".to_string(),
        message: "Created short URL short_code=abc123".to_string(),
    }
}

#[tokio::test]
async fn test_delivers_entry_payload() {
    let (url, collector) = spawn_collector(0).await;
    let sink = RemoteSink::new(url, 3);

    let log_id = sink.send_with_retry(&entry()).await.unwrap();
    assert_eq!(log_id, "log-0");

    let received = collector.received.lock().unwrap();
    assert_eq!(
        received.as_slice(),
        &[json!({
            "stack": "backend",
            "level": "info",
            "package": "handler",
            "message": "Created short URL short_code=abc123",
        })]
    );
}

#[tokio::test]
async fn test_retries_until_success() {
    let (url, collector) = spawn_collector(2).await;
    let sink = RemoteSink::new(url, 3);

    let log_id = sink.send_with_retry(&entry()).await.unwrap();
    assert_eq!(log_id, "log-2");
    assert_eq!(collector.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_gives_up_after_max_retries() {
    let (url, collector) = spawn_collector(usize::MAX).await;
    let sink = RemoteSink::new(url, 2);

    let err = sink.send_with_retry(&entry()).await.unwrap_err();
    assert!(matches!(err, RemoteLogError::Status(503)));
    assert_eq!(collector.calls.load(Ordering::SeqCst), 2);
    assert!(collector.received.lock().unwrap().is_empty());
}

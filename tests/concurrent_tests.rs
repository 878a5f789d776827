//! Concurrent access tests for the session pool and dispatch.

use sheetcast::engine::mock::MockEngine;
use sheetcast::prelude::*;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

fn doc(raw: &str) -> DocumentRef {
    DocumentRef::parse(raw).unwrap()
}

fn shared_pool(engine: MockEngine) -> SharedSessionPool {
    SessionPool::builder()
        .config(
            SessionPoolConfigBuilder::new()
                .retry_base_delay(Duration::from_millis(10))
                .build()
                .unwrap(),
        )
        .engine(Box::new(engine))
        .enable_reaper(false)
        .build()
        .unwrap()
        .into_shared()
}

/// Test concurrent access to pool stats.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stats_access() {
    let pool = shared_pool(MockEngine::new());
    drop(
        pool.acquire_session(&doc("https://sheets.example.com/d/a"), Viewport::default())
            .await
            .unwrap(),
    );

    let mut tasks = JoinSet::new();

    // Spawn multiple tasks reading stats concurrently
    for _ in 0..10 {
        let pool = Arc::clone(&pool);
        tasks.spawn(async move {
            for _ in 0..100 {
                assert_eq!(pool.stats().live_sessions, 1);
            }
        });
    }

    // Wait for all tasks to complete
    while let Some(result) = tasks.join_next().await {
        assert!(result.is_ok(), "Task should complete without panic");
    }

    pool.close_all().await;
}

/// Simultaneous acquisitions of one document open a single session.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_key_acquisitions_are_serialized() {
    let engine = MockEngine::new().with_load_delay(Duration::from_millis(50));
    let probe = engine.probe();
    let pool = shared_pool(engine);

    let mut tasks = JoinSet::new();
    for view in 0..5 {
        let pool = Arc::clone(&pool);
        tasks.spawn(async move {
            let sheet = doc("https://sheets.example.com/d/shared/edit").with_view(&view.to_string());
            let handle = pool.acquire_session(&sheet, Viewport::default()).await?;
            handle.capture(&CaptureTarget::FullViewport).await
        });
    }

    while let Some(result) = tasks.join_next().await {
        let image = result.expect("task panicked").expect("capture failed");
        assert!(!image.is_empty());
    }

    assert_eq!(probe.opened(), 1);
    assert_eq!(pool.stats().live_sessions, 1);
    pool.close_all().await;
}

/// Batches never run more than `max_parallel` captures at once.
#[tokio::test]
async fn test_concurrency_ceiling() {
    let engine = MockEngine::new().with_load_delay(Duration::from_millis(200));
    let probe = engine.probe();
    let pool = shared_pool(engine);
    let orchestrator = CaptureOrchestrator::new(Arc::clone(&pool));

    let requests: Vec<_> = (0..5)
        .map(|i| {
            CaptureRequest::new(
                format!("req-{}", i),
                doc(&format!("https://sheets.example.com/d/doc{}", i)),
            )
        })
        .collect();

    let start = Instant::now();
    let results = orchestrator.capture_all(requests, 2).await;
    let elapsed = start.elapsed();

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(CaptureResult::is_success));
    assert!(probe.peak_in_flight() <= 2);
    // Chunks of 2, 2, 1 at ~200ms each
    assert!(
        elapsed >= Duration::from_millis(550) && elapsed < Duration::from_millis(1000),
        "unexpected batch duration: {:?}",
        elapsed
    );

    pool.close_all().await;
}

// ============================================================================
// Dispatch
// ============================================================================

/// Messaging client that records deliveries and rejects one recipient.
#[derive(Default)]
struct RecordingClient {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingClient {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl MessagingClient for RecordingClient {
    async fn send_image(
        &self,
        recipient: &str,
        image: &[u8],
        caption: &str,
    ) -> std::result::Result<String, DeliveryError> {
        if recipient == "blocked" {
            return Err(DeliveryError::new(recipient, "bot was blocked by the user"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((recipient.to_string(), caption.to_string()));
        Ok(format!("msg-{}-{}", sent.len(), image.len()))
    }
}

#[tokio::test]
async fn test_dispatch_pooled_reports_every_recipient() {
    let engine = MockEngine::new();
    let probe = engine.probe();
    let pool = shared_pool(engine);
    let orchestrator = CaptureOrchestrator::new(Arc::clone(&pool));
    let client = RecordingClient::default();

    let job = ScheduleJob::new("daily", doc("https://sheets.example.com/d/abc/edit#gid=0"))
        .with_caption("Daily sales")
        .with_recipient(Recipient::new("100"))
        .with_recipient(Recipient::new("200").with_view("7"))
        .with_recipient(Recipient::new("blocked"));

    let report = dispatch_pooled(&orchestrator, &job, &client, Some(2)).await;

    assert_eq!(report.captured, 3);
    assert_eq!(report.capture_failed, 0);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.delivery_failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].0, "blocked");
    assert!(!report.is_clean());

    let sent = client.sent();
    assert!(sent.iter().all(|(_, caption)| caption == "Daily sales"));
    // All views of the document share one session
    assert_eq!(probe.opened(), 1);

    pool.close_all().await;
}

#[tokio::test]
async fn test_dispatch_single_skips_delivery_on_failure() {
    let engine = MockEngine::new().failing_loads(100);
    let probe = engine.probe();
    let pool = shared_pool(engine);
    let orchestrator = CaptureOrchestrator::new(Arc::clone(&pool));
    let client = RecordingClient::default();

    let job = ScheduleJob::new("hourly", doc("https://sheets.example.com/d/abc/edit"))
        .with_recipient(Recipient::new("100"))
        .with_recipient(Recipient::new("200"));

    let report = dispatch_single(&orchestrator, &job, &client, Some(2)).await;

    assert_eq!(report.captured, 0);
    assert_eq!(report.capture_failed, 1);
    assert_eq!(report.delivered, 0);
    assert!(client.sent().is_empty());
    assert_eq!(probe.loads_attempted(), 2);
}

#[tokio::test]
async fn test_dispatch_single_defaults_to_configured_retries() {
    let engine = MockEngine::new().failing_loads(100);
    let probe = engine.probe();
    let pool = SessionPool::builder()
        .config(
            SessionPoolConfigBuilder::new()
                .max_retries(2)
                .retry_base_delay(Duration::from_millis(10))
                .build()
                .unwrap(),
        )
        .engine(Box::new(engine))
        .enable_reaper(false)
        .build()
        .unwrap()
        .into_shared();
    let orchestrator = CaptureOrchestrator::new(Arc::clone(&pool));
    let client = RecordingClient::default();

    let job = ScheduleJob::new("hourly", doc("https://sheets.example.com/d/abc/edit"))
        .with_recipient(Recipient::new("100"));

    let report = dispatch_single(&orchestrator, &job, &client, None).await;

    assert_eq!(report.capture_failed, 1);
    assert!(client.sent().is_empty());
    assert_eq!(probe.loads_attempted(), 2);
}

#[tokio::test]
async fn test_dispatch_single_sends_one_image_to_all() {
    let engine = MockEngine::new();
    let probe = engine.probe();
    let pool = shared_pool(engine);
    let orchestrator = CaptureOrchestrator::new(Arc::clone(&pool));
    let client = RecordingClient::default();

    let job = ScheduleJob::new("hourly", doc("https://sheets.example.com/d/abc/edit"))
        .with_recipient(Recipient::new("100"))
        .with_recipient(Recipient::new("200").with_view("3"));

    let report = dispatch_single(&orchestrator, &job, &client, None).await;

    assert_eq!(report.captured, 1);
    assert_eq!(report.delivered, 2);
    assert!(report.is_clean());
    assert_eq!(probe.opened(), 1);
    assert_eq!(probe.live(), 0);
}

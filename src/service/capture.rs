//! Capture orchestration.
//!
//! [`CaptureOrchestrator`] turns [`CaptureRequest`]s into [`CaptureResult`]s
//! in two modes:
//!
//! | Mode | Sessions | Concurrency | Failure handling |
//! |------|----------|-------------|------------------|
//! | [`capture_all`](CaptureOrchestrator::capture_all) | pooled, reused | chunks of `max_parallel` | one failure never affects the rest |
//! | [`capture_with_retry`](CaptureOrchestrator::capture_with_retry) | fresh per attempt | one | linear backoff between attempts |
//!
//! [`capture_batch`](CaptureOrchestrator::capture_batch) and
//! [`capture_one`](CaptureOrchestrator::capture_one) run the same modes with
//! `max_parallel` and `max_retries` taken from the pool's configuration.
//!
//! Neither mode returns an error: every failure is reported inside its
//! [`CaptureResult`].

use std::sync::Arc;
use std::time::Instant;

use crate::error::CaptureError;
use crate::pool::SessionPool;
use crate::service::types::{CaptureRequest, CaptureResult, CaptureStage};

/// Runs capture requests against a [`SessionPool`].
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct CaptureOrchestrator {
    pool: Arc<SessionPool>,
}

impl CaptureOrchestrator {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// [`capture_all`](Self::capture_all) with the pool's `max_parallel`.
    pub async fn capture_batch(&self, requests: Vec<CaptureRequest>) -> Vec<CaptureResult> {
        let max_parallel = self.pool.config().max_parallel;
        self.capture_all(requests, max_parallel).await
    }

    /// [`capture_with_retry`](Self::capture_with_retry) with the pool's
    /// `max_retries`.
    pub async fn capture_one(&self, request: CaptureRequest) -> CaptureResult {
        let max_retries = self.pool.config().max_retries;
        self.capture_with_retry(request, max_retries).await
    }

    /// Capture every request, at most `max_parallel` at a time.
    ///
    /// Requests are split into consecutive chunks of `max_parallel` (a value
    /// of 0 is treated as 1). Each chunk runs concurrently and the next chunk
    /// starts only once the whole chunk has finished.
    ///
    /// Returns exactly one result per request, in input order.
    pub async fn capture_all(
        &self,
        requests: Vec<CaptureRequest>,
        max_parallel: usize,
    ) -> Vec<CaptureResult> {
        let total = requests.len();
        let chunk_size = max_parallel.max(1);
        let mut results = Vec::with_capacity(total);

        if total == 0 {
            log::debug!("No capture requests, nothing to do");
            return results;
        }

        log::info!(
            "📸 Capturing {} request(s), {} at a time",
            total,
            chunk_size
        );
        let batch_start = Instant::now();

        for (index, chunk) in requests.chunks(chunk_size).enumerate() {
            log::debug!("Starting chunk {} ({} request(s))", index + 1, chunk.len());

            let tasks: Vec<_> = chunk
                .iter()
                .cloned()
                .map(|request| {
                    let correlation_id = request.correlation_id.clone();
                    let pool = Arc::clone(&self.pool);
                    let task = tokio::spawn(async move { capture_pooled(&pool, request).await });
                    (correlation_id, Instant::now(), task)
                })
                .collect();

            for (correlation_id, started, task) in tasks {
                let result = match task.await {
                    Ok(result) => result,
                    Err(join_error) => {
                        log::error!("❌ Capture task for {} panicked: {}", correlation_id, join_error);
                        CaptureResult::failed(
                            correlation_id,
                            CaptureStage::Pending,
                            CaptureError::CaptureFailed(format!(
                                "capture task panicked: {}",
                                join_error
                            )),
                            started.elapsed(),
                        )
                    }
                };
                results.push(result);
            }
        }

        let failed = results.iter().filter(|r| !r.is_success()).count();
        log::info!(
            "✅ Batch finished in {:?}: {} succeeded, {} failed",
            batch_start.elapsed(),
            total - failed,
            failed
        );

        results
    }

    /// Capture one request on a fresh session, retrying with linear backoff.
    ///
    /// Makes up to `max_retries` attempts (at least one). Each attempt opens
    /// a detached session that is discarded afterwards, whatever the outcome.
    /// Attempt `n` is followed by a pause of `retry_base_delay * n`.
    ///
    /// Exactly `max_retries` attempts are made only while every failure is
    /// [retryable](CaptureError::is_retryable). The first non-retryable error
    /// (`SelectorNotFound`, `InvalidRequest`, `SessionUnavailable`,
    /// `Configuration`) ends the loop after that attempt.
    ///
    /// The returned result carries the last error and the total elapsed time
    /// across all attempts.
    pub async fn capture_with_retry(
        &self,
        request: CaptureRequest,
        max_retries: u32,
    ) -> CaptureResult {
        let start = Instant::now();
        let attempts = max_retries.max(1);
        let base_delay = self.pool.config().retry_base_delay;

        if let Err(e) = request.validate() {
            log::warn!("Rejecting capture {}: {}", request.correlation_id, e);
            return CaptureResult::failed(
                request.correlation_id,
                CaptureStage::Pending,
                e,
                start.elapsed(),
            );
        }

        let mut last_failure = None;

        for attempt in 1..=attempts {
            log::debug!(
                "Capture {} attempt {}/{}",
                request.correlation_id,
                attempt,
                attempts
            );

            match self.capture_detached(&request).await {
                Ok(image) => {
                    log::info!(
                        "✅ Captured {} on attempt {} ({} bytes)",
                        request.correlation_id,
                        attempt,
                        image.len()
                    );
                    return CaptureResult::succeeded(request.correlation_id, image, start.elapsed());
                }
                Err((stage, e)) => {
                    log::warn!(
                        "⚠️ Capture {} attempt {}/{} failed while {}: {}",
                        request.correlation_id,
                        attempt,
                        attempts,
                        stage,
                        e
                    );
                    let retryable = e.is_retryable();
                    last_failure = Some((stage, e));

                    if !retryable {
                        log::debug!("Error is not retryable, giving up");
                        break;
                    }
                    if attempt < attempts {
                        tokio::time::sleep(base_delay * attempt).await;
                    }
                }
            }
        }

        let (stage, error) = last_failure.unwrap_or_else(|| {
            (
                CaptureStage::Pending,
                CaptureError::CaptureFailed("no capture attempt was made".to_string()),
            )
        });
        log::error!("❌ Capture {} failed: {}", request.correlation_id, error);
        CaptureResult::failed(request.correlation_id, stage, error, start.elapsed())
    }

    /// One attempt on a detached session; the session is always discarded.
    async fn capture_detached(
        &self,
        request: &CaptureRequest,
    ) -> Result<Vec<u8>, (CaptureStage, CaptureError)> {
        let session = self
            .pool
            .open_detached(&request.document, request.viewport)
            .await
            .map_err(|e| (CaptureStage::Loading, e))?;

        if !request.settle_delay.is_zero() {
            tokio::time::sleep(request.settle_delay).await;
        }

        let outcome = session
            .capture(&request.target)
            .await
            .map_err(|e| (CaptureStage::Capturing, e));
        self.pool.discard(session).await;
        outcome
    }
}

impl std::fmt::Debug for CaptureOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureOrchestrator")
            .field("pool", &self.pool.stats())
            .finish()
    }
}

/// Load, settle, and capture one request on its pooled session.
async fn capture_pooled(pool: &SessionPool, request: CaptureRequest) -> CaptureResult {
    let start = Instant::now();
    let CaptureRequest {
        document,
        correlation_id,
        viewport,
        target,
        settle_delay,
    } = request;

    if let Err(e) = viewport.validate().and_then(|()| target.validate()) {
        return CaptureResult::failed(correlation_id, CaptureStage::Pending, e, start.elapsed());
    }

    let handle = match pool.acquire_session(&document, viewport).await {
        Ok(handle) => handle,
        Err(e) => {
            log::warn!("❌ {}: loading {} failed: {}", correlation_id, document, e);
            return CaptureResult::failed(correlation_id, CaptureStage::Loading, e, start.elapsed());
        }
    };

    if !settle_delay.is_zero() {
        log::trace!("{}: settling for {:?}", correlation_id, settle_delay);
        tokio::time::sleep(settle_delay).await;
    }

    match handle.capture(&target).await {
        Ok(image) => {
            log::debug!(
                "📸 {}: captured {} bytes from session {}",
                correlation_id,
                image.len(),
                handle.id()
            );
            CaptureResult::succeeded(correlation_id, image, start.elapsed())
        }
        Err(e) => {
            log::warn!("❌ {}: capture failed: {}", correlation_id, e);
            CaptureResult::failed(correlation_id, CaptureStage::Capturing, e, start.elapsed())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::SessionPoolConfigBuilder;
    use crate::document::{DocumentRef, Viewport};
    use crate::engine::mock::{MockEngine, MockProbe};
    use crate::service::types::CaptureTarget;

    fn orchestrator(engine: MockEngine) -> (CaptureOrchestrator, MockProbe) {
        let probe = engine.probe();
        let config = SessionPoolConfigBuilder::new()
            .retry_base_delay(Duration::from_millis(5))
            .build()
            .unwrap();
        let pool = SessionPool::builder()
            .config(config)
            .engine(Box::new(engine))
            .enable_reaper(false)
            .build()
            .unwrap();
        (CaptureOrchestrator::new(pool.into_shared()), probe)
    }

    fn request(id: &str, doc: &str) -> CaptureRequest {
        CaptureRequest::new(id, DocumentRef::parse(doc).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_viewport_fails_before_loading() {
        let (orchestrator, probe) = orchestrator(MockEngine::new());
        let bad = CaptureRequest {
            viewport: Viewport {
                width: 0,
                height: 900,
            },
            ..request("bad", "https://sheets.example.com/d/a")
        };

        let results = orchestrator.capture_all(vec![bad], 2).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].stage, CaptureStage::Pending);
        assert!(matches!(
            results[0].error(),
            Some(CaptureError::InvalidRequest(_))
        ));
        assert_eq!(probe.opened(), 0);
    }

    #[tokio::test]
    async fn test_zero_parallelism_is_treated_as_one() {
        let (orchestrator, probe) = orchestrator(MockEngine::new());
        let results = orchestrator
            .capture_all(
                vec![
                    request("a", "https://sheets.example.com/d/a"),
                    request("b", "https://sheets.example.com/d/b"),
                ],
                0,
            )
            .await;

        assert!(results.iter().all(CaptureResult::is_success));
        assert_eq!(probe.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_retry_stops_on_missing_selector() {
        let (orchestrator, probe) = orchestrator(MockEngine::new().missing_selector("#gone"));
        let req = request("sel", "https://sheets.example.com/d/a")
            .with_target(CaptureTarget::Selector("#gone".to_string()));

        let result = orchestrator.capture_with_retry(req, 3).await;
        assert_eq!(result.stage, CaptureStage::Capturing);
        assert!(matches!(
            result.error(),
            Some(CaptureError::SelectorNotFound(_))
        ));
        // One attempt, session discarded
        assert_eq!(probe.opened(), 1);
        assert_eq!(probe.closed(), 1);
    }

    #[tokio::test]
    async fn test_capture_one_uses_configured_retries() {
        let engine = MockEngine::new().failing_loads(100);
        let probe = engine.probe();
        let config = SessionPoolConfigBuilder::new()
            .max_retries(2)
            .retry_base_delay(Duration::from_millis(5))
            .build()
            .unwrap();
        let pool = SessionPool::builder()
            .config(config)
            .engine(Box::new(engine))
            .enable_reaper(false)
            .build()
            .unwrap();
        let orchestrator = CaptureOrchestrator::new(pool.into_shared());

        let result = orchestrator
            .capture_one(request("flaky", "https://sheets.example.com/d/a"))
            .await;
        assert!(matches!(
            result.error(),
            Some(CaptureError::TransientNetwork(_))
        ));
        assert_eq!(probe.loads_attempted(), 2);
    }

    #[tokio::test]
    async fn test_capture_batch_uses_configured_parallelism() {
        let engine = MockEngine::new().with_load_delay(Duration::from_millis(20));
        let probe = engine.probe();
        let config = SessionPoolConfigBuilder::new().max_parallel(1).build().unwrap();
        let pool = SessionPool::builder()
            .config(config)
            .engine(Box::new(engine))
            .enable_reaper(false)
            .build()
            .unwrap();
        let orchestrator = CaptureOrchestrator::new(pool.into_shared());

        let results = orchestrator
            .capture_batch(vec![
                request("a", "https://sheets.example.com/d/a"),
                request("b", "https://sheets.example.com/d/b"),
                request("c", "https://sheets.example.com/d/c"),
            ])
            .await;
        assert!(results.iter().all(CaptureResult::is_success));
        assert_eq!(probe.peak_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_retry_discards_every_session() {
        let (orchestrator, probe) = orchestrator(MockEngine::new());
        let result = orchestrator
            .capture_with_retry(request("ok", "https://sheets.example.com/d/a"), 3)
            .await;

        assert!(result.is_success());
        assert_eq!(probe.live(), 0);
        assert!(orchestrator.pool().stats().is_empty());
    }
}

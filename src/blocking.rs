//! Bounded execution of blocking engine calls.
//!
//! Engine methods block the calling thread, so every call goes through
//! `spawn_blocking` and is raced against a deadline. On timeout the blocking
//! thread keeps running to completion; only the caller stops waiting.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{CaptureError, Result};
use crate::traits::RenderSession;

/// Run `f` on the blocking pool, giving up after `limit`.
///
/// `on_timeout` builds the error returned when the deadline passes. A panic
/// inside `f` is reported as [`CaptureError::CaptureFailed`].
pub(crate) async fn run_bounded<T, F, E>(limit: Duration, on_timeout: E, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
    E: FnOnce() -> CaptureError,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            log::error!("❌ Engine task panicked: {}", join_error);
            Err(CaptureError::CaptureFailed(format!(
                "engine task panicked: {}",
                join_error
            )))
        }
        Err(_) => Err(on_timeout()),
    }
}

/// Close `session`, waiting at most `limit`.
pub(crate) async fn close_bounded(session: Arc<dyn RenderSession>, limit: Duration) -> Result<()> {
    let id = session.id();
    run_bounded(
        limit,
        || CaptureError::CaptureFailed(format!("closing session {} timed out after {:?}", id, limit)),
        move || session.close(),
    )
    .await
}

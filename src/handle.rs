//! RAII handles for render sessions.
//!
//! [`SessionHandle`] is a borrowed pooled session. It holds the per-document
//! lock for as long as it lives, so no other caller can drive the same tab,
//! and it refreshes the session's last-used time when dropped.
//!
//! [`DetachedSession`] is a one-off session that never enters the pool. It is
//! closed when handed to [`SessionPool::discard`](crate::SessionPool::discard)
//! or, failing that, in the background when dropped.
//!
//! # Usage Pattern
//!
//! ```rust,ignore
//! let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit#gid=0")?;
//!
//! {
//!     let session = pool.acquire_session(&doc, Viewport::default()).await?;
//!     let png = session.capture(&CaptureTarget::FullViewport).await?;
//! } // lock released, last-used refreshed
//! ```

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;

use crate::error::Result;
use crate::pool::{SessionPoolInner, SessionSlot};
use crate::service::CaptureTarget;
use crate::tracked::TrackedSession;
use crate::traits::RenderSession;

/// Exclusive borrow of a pooled session.
///
/// # Thread Safety
///
/// `SessionHandle` is `Send`, so it can be moved into a spawned task. It is
/// not `Clone`; exactly one caller drives the session at a time.
///
/// # Drop Behavior
///
/// ```text
/// drop(handle)
///   ├─ last_used = now
///   ├─ release per-document lock (next waiter proceeds)
///   └─ pool closed meanwhile? ──► close the session in the background
/// ```
pub struct SessionHandle {
    guard: OwnedMutexGuard<Option<TrackedSession>>,
    slot: Arc<SessionSlot>,
    pool: Arc<SessionPoolInner>,
    session: Arc<dyn RenderSession>,
}

impl SessionHandle {
    /// Wrap a locked, populated slot.
    ///
    /// Called internally by the pool after a successful acquire.
    pub(crate) fn new(
        guard: OwnedMutexGuard<Option<TrackedSession>>,
        slot: Arc<SessionSlot>,
        pool: Arc<SessionPoolInner>,
        session: Arc<dyn RenderSession>,
    ) -> Self {
        Self {
            guard,
            slot,
            pool,
            session,
        }
    }

    /// Engine id of the underlying session.
    pub fn id(&self) -> u64 {
        self.session.id()
    }

    /// Base key the session is pooled under.
    pub fn key(&self) -> &str {
        self.slot.key()
    }

    /// Full reference currently displayed.
    pub fn loaded_view(&self) -> &str {
        self.guard.as_ref().map_or("", |t| t.loaded_view())
    }

    /// Borrow the raw session.
    ///
    /// Calls made through it are blocking and unbounded; prefer
    /// [`capture`](Self::capture).
    pub fn session(&self) -> &Arc<dyn RenderSession> {
        &self.session
    }

    /// Snapshot the document, bounded by the pool's `capture_timeout`.
    pub async fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>> {
        self.pool
            .capture_on(Arc::clone(&self.session), target.clone())
            .await
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(tracked) = self.guard.as_mut() {
            tracked.touch();
        }

        // close_all() could not take this session while it was borrowed
        if self.pool.is_shutting_down() && !self.pool.is_registered(&self.slot) {
            if let Some(tracked) = self.guard.take() {
                log::debug!(
                    "♻️ Session {} released after pool shutdown, closing",
                    tracked.id()
                );
                self.slot.set_live(false);
                self.pool.destroy_in_background(tracked.into_session());
            }
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("key", &self.key())
            .field("loaded_view", &self.loaded_view())
            .finish()
    }
}

/// A session outside the pool, used for one-off captures.
pub struct DetachedSession {
    session: Option<Arc<dyn RenderSession>>,
    pool: Arc<SessionPoolInner>,
}

impl DetachedSession {
    pub(crate) fn new(session: Arc<dyn RenderSession>, pool: Arc<SessionPoolInner>) -> Self {
        Self {
            session: Some(session),
            pool,
        }
    }

    /// Engine id of the underlying session.
    pub fn id(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.id())
    }

    /// Snapshot the document, bounded by the pool's `capture_timeout`.
    pub async fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>> {
        match &self.session {
            Some(session) => {
                self.pool
                    .capture_on(Arc::clone(session), target.clone())
                    .await
            }
            None => Err(crate::CaptureError::SessionUnavailable(
                "detached session already discarded".to_string(),
            )),
        }
    }

    pub(crate) fn take(&mut self) -> Option<Arc<dyn RenderSession>> {
        self.session.take()
    }
}

impl Drop for DetachedSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!(
                "♻️ Detached session {} dropped without discard, closing in background",
                session.id()
            );
            self.pool.destroy_in_background(session);
        }
    }
}

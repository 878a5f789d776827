//! Tracked session with metadata for pool management.
//!
//! Each pooled session is wrapped in a [`TrackedSession`] that records:
//! - **Base key**: the document it belongs to
//! - **Loaded view**: the full reference currently displayed
//! - **Creation time** and **last use**: for idle eviction and logging
//!
//! ```text
//! TrackedSession
//! ├── session: Arc<dyn RenderSession>
//! ├── key: String          (document base key)
//! ├── loaded_view: String  (full reference on screen)
//! ├── created_at: Instant
//! └── last_used: Instant   (refreshed on acquire and release)
//! ```
//!
//! Users interact with sessions through [`SessionHandle`](crate::SessionHandle).

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::traits::RenderSession;

/// A render session with metadata for pool management.
///
/// Owned by the pool slot for its key; only the holder of that slot's lock
/// can read or modify it.
pub(crate) struct TrackedSession {
    session: Arc<dyn RenderSession>,
    key: String,
    loaded_view: String,
    created_at: Instant,
    last_used: Instant,
}

impl TrackedSession {
    /// Wrap a freshly loaded session.
    pub(crate) fn new(session: Arc<dyn RenderSession>, key: String, loaded_view: String) -> Self {
        let now = Instant::now();
        Self {
            session,
            key,
            loaded_view,
            created_at: now,
            last_used: now,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.session.id()
    }

    pub(crate) fn session(&self) -> &Arc<dyn RenderSession> {
        &self.session
    }

    pub(crate) fn into_session(self) -> Arc<dyn RenderSession> {
        self.session
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn loaded_view(&self) -> &str {
        &self.loaded_view
    }

    pub(crate) fn set_loaded_view(&mut self, view: String) {
        self.loaded_view = view;
    }

    /// Mark the session as used now.
    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// Time since the session was last acquired or released.
    pub(crate) fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl std::fmt::Debug for TrackedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedSession")
            .field("id", &self.id())
            .field("key", &self.key)
            .field("loaded_view", &self.loaded_view)
            .field("age", &self.age())
            .field("idle_for", &self.idle_for())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Viewport;
    use crate::engine::RenderEngine;
    use crate::engine::mock::MockEngine;

    #[test]
    fn test_touch_resets_idle_time() {
        let engine = MockEngine::new();
        let session = engine.open(Viewport::default()).unwrap();
        let mut tracked = TrackedSession::new(
            session,
            "https://sheets.example.com/d/a".to_string(),
            "https://sheets.example.com/d/a#gid=0".to_string(),
        );

        std::thread::sleep(Duration::from_millis(20));
        assert!(tracked.idle_for() >= Duration::from_millis(20));

        tracked.touch();
        assert!(tracked.idle_for() < Duration::from_millis(20));
        assert!(tracked.age() >= Duration::from_millis(20));
        assert_eq!(tracked.key(), "https://sheets.example.com/d/a");

        tracked.set_loaded_view("https://sheets.example.com/d/a#gid=5".to_string());
        assert_eq!(tracked.loaded_view(), "https://sheets.example.com/d/a#gid=5");
    }
}

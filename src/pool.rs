//! Session pool with idle eviction.
//!
//! This module provides [`SessionPool`], which keeps one long-lived render
//! session per document and hands it out to captures of any view of that
//! document.
//!
//! # Overview
//!
//! - **Per-document reuse**: sessions are keyed by the document base key
//! - **Cheap view switches**: a different sub-view of a pooled document is a
//!   fragment navigation, not a fresh load
//! - **Idle eviction**: a background reaper closes sessions nobody used for
//!   `idle_timeout`
//! - **Bounded engine calls**: every open, load, capture, and close has a
//!   deadline
//! - **RAII borrowing**: [`SessionHandle`] releases the session on drop
//!
//! # Architecture
//!
//! ```text
//! SessionPool
//!   ├─ SessionPoolInner (shared state)
//!   │   ├─ slots: HashMap<base key, Arc<SessionSlot>>
//!   │   │            └─ state: tokio Mutex<Option<TrackedSession>>
//!   │   ├─ engine: Arc<dyn RenderEngine>
//!   │   └─ shutting_down: AtomicBool
//!   └─ reaper: JoinHandle  (idle eviction task)
//! ```
//!
//! # Critical Invariants
//!
//! 1. **At most one live session per base key**: a slot is registered before
//!    its session is opened, and openers for the same key queue on its lock
//! 2. **Lock Order**: slot lock first, then (briefly) the `slots` map lock;
//!    the map lock is never held across an `.await`
//! 3. **Failed acquire leaves no trace**: a slot whose open failed is
//!    unregistered before its lock is released
//!
//! # Example
//!
//! ```rust,no_run
//! use sheetcast::{ChromeEngine, DocumentRef, SessionPool, SessionPoolConfigBuilder, Viewport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ChromeEngine::with_defaults();
//!     engine.start()?;
//!
//!     let pool = SessionPool::builder()
//!         .config(SessionPoolConfigBuilder::new().max_parallel(3).build()?)
//!         .engine(Box::new(engine))
//!         .build()?;
//!
//!     let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit#gid=0")?;
//!     {
//!         let session = pool.acquire_session(&doc, Viewport::default()).await?;
//!         let _png = session.capture(&Default::default()).await?;
//!     } // session returned to pool automatically
//!
//!     pool.close_all().await;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::blocking::{close_bounded, run_bounded};
use crate::config::SessionPoolConfig;
use crate::document::{DocumentRef, Viewport};
use crate::engine::RenderEngine;
use crate::error::{CaptureError, Result};
use crate::handle::{DetachedSession, SessionHandle};
use crate::service::CaptureTarget;
use crate::stats::PoolStats;
use crate::tracked::TrackedSession;
use crate::traits::RenderSession;

/// Time allowed for the reaper task to exit during shutdown.
const REAPER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SessionSlot
// ============================================================================

/// Registration of one base key in the pool.
///
/// The slot exists from the moment someone starts opening a session for its
/// key. `state` is `None` while the first session is being opened and after
/// the session has been taken out for destruction.
pub(crate) struct SessionSlot {
    key: String,
    state: Arc<AsyncMutex<Option<TrackedSession>>>,
    /// Set once a session is loaded; read by `stats()` without locking `state`.
    live: AtomicBool,
}

impl SessionSlot {
    fn new(key: String) -> Self {
        Self {
            key,
            state: Arc::new(AsyncMutex::new(None)),
            live: AtomicBool::new(false),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn set_live(&self, value: bool) {
        self.live.store(value, Ordering::SeqCst);
    }
}

// ============================================================================
// SessionPoolInner
// ============================================================================

/// Internal shared state for the session pool.
///
/// Wrapped in `Arc` and shared between the pool, every [`SessionHandle`],
/// and the reaper task.
pub(crate) struct SessionPoolInner {
    /// Configuration (immutable after creation).
    config: SessionPoolConfig,

    /// Engine that opens new sessions.
    engine: Arc<dyn RenderEngine>,

    /// Registered slots by base key.
    slots: Mutex<HashMap<String, Arc<SessionSlot>>>,

    /// Once set, acquisitions fail and released sessions are closed.
    shutting_down: AtomicBool,

    /// Handle to tokio runtime for spawning background closes.
    runtime_handle: tokio::runtime::Handle,
}

impl SessionPoolInner {
    fn new(
        config: SessionPoolConfig,
        engine: Arc<dyn RenderEngine>,
        runtime_handle: tokio::runtime::Handle,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            engine,
            slots: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            runtime_handle,
        })
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Arc<SessionSlot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn config(&self) -> &SessionPoolConfig {
        &self.config
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Whether `slot` is still the registered slot for its key.
    pub(crate) fn is_registered(&self, slot: &Arc<SessionSlot>) -> bool {
        self.slots()
            .get(slot.key())
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    fn unregister(&self, slot: &Arc<SessionSlot>) {
        let mut slots = self.slots();
        if slots
            .get(slot.key())
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            slots.remove(slot.key());
        }
    }

    /// Existing slot for `key`, or a freshly registered empty one.
    fn claim_slot(&self, key: &str) -> Arc<SessionSlot> {
        let mut slots = self.slots();
        Arc::clone(
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(SessionSlot::new(key.to_string()))),
        )
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_shutting_down() {
            return Err(CaptureError::SessionUnavailable(
                "session pool is closed".to_string(),
            ));
        }
        if !self.engine.is_ready() {
            return Err(CaptureError::SessionUnavailable(
                "rendering engine is not ready".to_string(),
            ));
        }
        Ok(())
    }

    /// Acquire the pooled session for `document`'s base key.
    ///
    /// `force_refresh` reloads even after a sub-view switch.
    pub(crate) async fn acquire(
        self: &Arc<Self>,
        document: &DocumentRef,
        viewport: Viewport,
        force_refresh: bool,
    ) -> Result<SessionHandle> {
        viewport.validate()?;
        self.ensure_available()?;

        let key = document.base_key();
        let target = document.as_str();

        loop {
            let slot = self.claim_slot(&key);
            let mut guard = Arc::clone(&slot.state).lock_owned().await;

            // Evicted or failed while we were queued: start over with a new slot
            if !self.is_registered(&slot) {
                log::trace!("Slot for {} was replaced while waiting, retrying", key);
                continue;
            }

            if self.is_shutting_down() {
                if guard.is_none() {
                    self.unregister(&slot);
                }
                return Err(CaptureError::SessionUnavailable(
                    "session pool is closed".to_string(),
                ));
            }

            let outcome = if let Some(tracked) = guard.as_mut() {
                self.refresh_existing(tracked, target, force_refresh).await
            } else {
                let session = match self.open_loaded(viewport, target).await {
                    Ok(session) => session,
                    Err(e) => {
                        log::warn!("❌ Failed to open session for {}: {}", key, e);
                        self.unregister(&slot);
                        return Err(e);
                    }
                };
                log::info!(
                    "✅ Session {} opened for {} ({})",
                    session.id(),
                    key,
                    viewport
                );
                *guard = Some(TrackedSession::new(session, key.clone(), target.to_string()));
                slot.set_live(true);
                Ok(())
            };

            if let Err(e) = outcome {
                // State of a session that failed mid-navigation is unknown
                if let Some(tracked) = guard.take() {
                    log::warn!(
                        "⚠️ Session {} for {} failed to refresh ({}), discarding",
                        tracked.id(),
                        key,
                        e
                    );
                    slot.set_live(false);
                    self.unregister(&slot);
                    self.destroy_in_background(tracked.into_session());
                }
                return Err(e);
            }

            let session = match guard.as_ref() {
                Some(tracked) => Arc::clone(tracked.session()),
                None => continue,
            };

            return Ok(SessionHandle::new(guard, slot, Arc::clone(self), session));
        }
    }

    /// Bring a pooled session to `target`.
    ///
    /// Same view: reload for fresh content. Other view: switch, and reload
    /// only when forced or configured.
    async fn refresh_existing(
        &self,
        tracked: &mut TrackedSession,
        target: &str,
        force_refresh: bool,
    ) -> Result<()> {
        tracked.touch();

        let switching = tracked.loaded_view() != target;
        let reload = !switching || force_refresh || self.config.refresh_on_view_switch;
        let session = Arc::clone(tracked.session());
        let id = session.id();
        let url = target.to_string();
        let limit = self.config.load_timeout;

        log::debug!(
            "♻️ Reusing session {} for {} (switch: {}, reload: {})",
            id,
            tracked.key(),
            switching,
            reload
        );

        run_bounded(
            limit,
            || CaptureError::LoadTimeout(format!("session {} did not settle within {:?}", id, limit)),
            move || {
                if switching {
                    session.switch_view(&url)?;
                }
                if reload {
                    session.reload()?;
                }
                Ok(())
            },
        )
        .await?;

        tracked.set_loaded_view(target.to_string());
        Ok(())
    }

    /// Open a session and load `url`, bounded by `load_timeout`.
    ///
    /// A session that finishes opening after the deadline is closed in the
    /// background, so a timeout never leaks a tab.
    async fn open_loaded(&self, viewport: Viewport, url: &str) -> Result<Arc<dyn RenderSession>> {
        let engine = Arc::clone(&self.engine);
        let owned_url = url.to_string();
        let mut task = tokio::task::spawn_blocking(move || -> Result<Arc<dyn RenderSession>> {
            let session = engine.open(viewport)?;
            if let Err(e) = session.load(&owned_url) {
                if let Err(close_err) = session.close() {
                    log::warn!(
                        "⚠️ Failed to close session {} after load error: {}",
                        session.id(),
                        close_err
                    );
                }
                return Err(e);
            }
            Ok(session)
        });

        let limit = self.config.load_timeout;
        let waited = tokio::time::timeout(limit, &mut task).await;
        match waited {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                log::error!("❌ Session open task panicked: {}", join_error);
                Err(CaptureError::CaptureFailed(format!(
                    "session open panicked: {}",
                    join_error
                )))
            }
            Err(_) => {
                log::warn!("⏰ Loading {} exceeded {:?}", url, limit);
                let destroy_timeout = self.config.destroy_timeout;
                self.runtime_handle.spawn(async move {
                    if let Ok(Ok(late)) = task.await {
                        log::debug!("♻️ Closing session {} that loaded too late", late.id());
                        if let Err(e) = close_bounded(late, destroy_timeout).await {
                            log::warn!("⚠️ {}", e);
                        }
                    }
                });
                Err(CaptureError::LoadTimeout(format!(
                    "{} did not load within {:?}",
                    url, limit
                )))
            }
        }
    }

    /// Run a capture on `session`, bounded by `capture_timeout`.
    pub(crate) async fn capture_on(
        &self,
        session: Arc<dyn RenderSession>,
        target: CaptureTarget,
    ) -> Result<Vec<u8>> {
        target.validate()?;
        let id = session.id();
        let limit = self.config.capture_timeout;
        run_bounded(
            limit,
            || CaptureError::CaptureFailed(format!("session {} capture timed out after {:?}", id, limit)),
            move || session.capture(&target),
        )
        .await
    }

    /// Close `session` on the runtime without waiting for it.
    pub(crate) fn destroy_in_background(&self, session: Arc<dyn RenderSession>) {
        let limit = self.config.destroy_timeout;
        self.runtime_handle.spawn(async move {
            let id = session.id();
            if let Err(e) = close_bounded(session, limit).await {
                log::warn!("⚠️ Background close of session {} failed: {}", id, e);
            }
        });
    }

    /// Remove and close every session idle for longer than `threshold`.
    ///
    /// Borrowed sessions are skipped. Returns the number of sessions removed.
    pub(crate) async fn evict_idle(&self, threshold: Duration) -> usize {
        let victims: Vec<TrackedSession> = {
            let mut slots = self.slots();
            let mut victims = Vec::new();

            slots.retain(|_, slot| {
                // Locked means borrowed or being opened
                let Ok(mut state) = slot.state.try_lock() else {
                    return true;
                };
                let expired = state
                    .as_ref()
                    .is_some_and(|tracked| tracked.idle_for() > threshold);
                if !expired {
                    return true;
                }
                if let Some(tracked) = state.take() {
                    victims.push(tracked);
                }
                slot.set_live(false);
                false
            });

            victims
        };

        let evicted = victims.len();
        for tracked in victims {
            let id = tracked.id();
            log::info!(
                "⏰ Evicting session {} for {} (idle {:?})",
                id,
                tracked.key(),
                tracked.idle_for()
            );
            if let Err(e) = close_bounded(tracked.into_session(), self.config.destroy_timeout).await
            {
                log::warn!("⚠️ Failed to close evicted session {}: {}", id, e);
            }
        }

        evicted
    }

    fn stats(&self) -> PoolStats {
        let mut keys: Vec<String> = self
            .slots()
            .values()
            .filter(|slot| slot.is_live())
            .map(|slot| slot.key().to_string())
            .collect();
        keys.sort();

        PoolStats {
            live_sessions: keys.len(),
            keys,
        }
    }

    fn drain(&self) -> Vec<Arc<SessionSlot>> {
        self.slots().drain().map(|(_, slot)| slot).collect()
    }
}

// ============================================================================
// SessionPool
// ============================================================================

/// Pool of render sessions keyed by document.
///
/// Create with [`SessionPool::builder()`]. Share across tasks as
/// [`SharedSessionPool`] (`Arc<SessionPool>`); every operation takes `&self`.
pub struct SessionPool {
    inner: Arc<SessionPoolInner>,

    /// Tells the reaper to stop.
    shutdown_tx: watch::Sender<bool>,

    /// Reaper task, taken on shutdown.
    reaper_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Shared, thread-safe session pool.
pub type SharedSessionPool = Arc<SessionPool>;

impl SessionPool {
    /// Create a new builder for constructing a `SessionPool`.
    pub fn builder() -> SessionPoolBuilder {
        SessionPoolBuilder::new()
    }

    /// Convert pool into shared `Arc<SessionPool>` for use across tasks.
    pub fn into_shared(self) -> SharedSessionPool {
        log::debug!("🔄 Converting SessionPool into shared Arc");
        Arc::new(self)
    }

    /// The configuration this pool was built with.
    pub fn config(&self) -> &SessionPoolConfig {
        self.inner.config()
    }

    /// Borrow the session for `document`'s base key, opening one if needed.
    ///
    /// # Behavior
    ///
    /// | Pool state | Requested view | Action |
    /// |------------|----------------|--------|
    /// | no session | any | open, load, register |
    /// | session | same as loaded | reload |
    /// | session | different | switch view (reload if `refresh_on_view_switch`) |
    ///
    /// Concurrent calls for the same base key are served one at a time;
    /// different keys proceed in parallel.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidRequest`] for a zero-sized viewport
    /// - [`CaptureError::SessionUnavailable`] if the pool is closed or the
    ///   engine is not ready
    /// - [`CaptureError::LoadTimeout`] if loading exceeds `load_timeout`
    ///   (the pool is left unchanged)
    /// - Any engine error from open, load, switch, or reload
    pub async fn acquire_session(
        &self,
        document: &DocumentRef,
        viewport: Viewport,
    ) -> Result<SessionHandle> {
        self.inner.acquire(document, viewport, false).await
    }

    /// Acquire `document` with a forced reload, then release it.
    ///
    /// Unlike [`acquire_session`](Self::acquire_session), this reloads even
    /// when it had to switch sub-views.
    pub async fn refresh_session(&self, document: &DocumentRef, viewport: Viewport) -> Result<()> {
        let handle = self.inner.acquire(document, viewport, true).await?;
        log::info!("🔄 Refreshed session {} for {}", handle.id(), handle.key());
        Ok(())
    }

    /// Remove and close every session idle for longer than `threshold`.
    ///
    /// Sessions currently borrowed are skipped. Close failures are logged and
    /// do not stop the scan. Returns the number of sessions removed.
    pub async fn evict_idle(&self, threshold: Duration) -> usize {
        self.inner.evict_idle(threshold).await
    }

    /// Open a session outside the pool and load `document` into it.
    ///
    /// Bounded by `load_timeout`. Hand the result to
    /// [`discard`](Self::discard) when done.
    pub async fn open_detached(
        &self,
        document: &DocumentRef,
        viewport: Viewport,
    ) -> Result<DetachedSession> {
        viewport.validate()?;
        self.inner.ensure_available()?;

        let session = self.inner.open_loaded(viewport, document.as_str()).await?;
        log::debug!("🆕 Detached session {} opened for {}", session.id(), document);
        Ok(DetachedSession::new(session, Arc::clone(&self.inner)))
    }

    /// Close a detached session, waiting at most `destroy_timeout`.
    pub async fn discard(&self, mut detached: DetachedSession) {
        if let Some(session) = detached.take() {
            let id = session.id();
            match close_bounded(session, self.inner.config().destroy_timeout).await {
                Ok(()) => log::debug!("Detached session {} closed", id),
                Err(e) => log::warn!("⚠️ Failed to close detached session {}: {}", id, e),
            }
        }
    }

    /// Get current pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    /// Whether [`close_all`](Self::close_all) has started.
    pub fn is_closed(&self) -> bool {
        self.inner.is_shutting_down()
    }

    /// Start the idle reaper task.
    ///
    /// The reaper scans every `reap_interval` and evicts sessions idle
    /// longer than `idle_timeout`. Scans never overlap: the loop awaits each
    /// one before waiting for the next tick or the shutdown signal.
    fn start_reaper(
        inner: Arc<SessionPoolInner>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let reap_interval = inner.config().reap_interval;
        let idle_timeout = inner.config().idle_timeout;

        log::info!(
            "⏰ Starting idle reaper (interval: {}s, idle timeout: {}s)",
            reap_interval.as_secs(),
            idle_timeout.as_secs()
        );

        let runtime = inner.runtime_handle.clone();
        runtime.spawn(async move {
            let mut ticker = tokio::time::interval(reap_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if inner.is_shutting_down() {
                            break;
                        }
                        let evicted = inner.evict_idle(idle_timeout).await;
                        if evicted > 0 {
                            log::info!("⏰ Reaper evicted {} idle session(s)", evicted);
                        } else {
                            log::trace!("Reaper scan: nothing idle");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        log::debug!("Reaper received shutdown signal");
                        break;
                    }
                }
            }

            log::info!("Idle reaper stopped");
        })
    }

    /// Close every session and stop the reaper.
    ///
    /// # Shutdown Process
    ///
    /// 1. Set shutdown flag (new acquisitions fail with `SessionUnavailable`)
    /// 2. Signal the reaper and wait for it (bounded), including any scan in flight
    /// 3. Unregister every slot
    /// 4. Close each session with a `destroy_timeout` bound; sessions still
    ///    borrowed are closed when their handle drops
    ///
    /// Idempotent: later calls return immediately.
    pub async fn close_all(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            log::debug!("Session pool already closed");
            return;
        }
        log::info!("🛑 Closing session pool...");

        let _ = self.shutdown_tx.send(true);
        let reaper = self
            .reaper_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = reaper {
            match tokio::time::timeout(REAPER_SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => log::debug!("Reaper stopped cleanly"),
                Ok(Err(e)) => log::error!("❌ Reaper task failed: {}", e),
                Err(_) => log::error!(
                    "❌ Reaper didn't exit within {}s",
                    REAPER_SHUTDOWN_TIMEOUT.as_secs()
                ),
            }
        }

        let destroy_timeout = self.inner.config().destroy_timeout;
        let mut closed = 0usize;
        for slot in self.inner.drain() {
            let state = Arc::clone(&slot.state);
            match tokio::time::timeout(destroy_timeout, state.lock_owned()).await {
                Ok(mut guard) => {
                    slot.set_live(false);
                    if let Some(tracked) = guard.take() {
                        let id = tracked.id();
                        match close_bounded(tracked.into_session(), destroy_timeout).await {
                            Ok(()) => closed += 1,
                            Err(e) => log::warn!("⚠️ Failed to close session {}: {}", id, e),
                        }
                    }
                }
                Err(_) => log::warn!(
                    "⚠️ Session for {} still borrowed, it will close on release",
                    slot.key()
                ),
            }
        }

        log::info!("✅ Session pool closed ({} session(s) closed)", closed);
    }

    /// Best-effort synchronous cleanup for `Drop`.
    fn close_sync(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self
            .reaper_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        for slot in self.inner.drain() {
            // Borrowed sessions are closed by their handle
            if let Ok(mut state) = slot.state.try_lock() {
                slot.set_live(false);
                if let Some(tracked) = state.take() {
                    self.inner.destroy_in_background(tracked.into_session());
                }
            }
        }
    }
}

impl Drop for SessionPool {
    fn drop(&mut self) {
        if !self.inner.is_shutting_down() {
            log::warn!("⚠️ SessionPool dropped without close_all() - cleaning up");
            self.close_sync();
        }
    }
}

// ============================================================================
// SessionPoolBuilder
// ============================================================================

/// Builder for constructing a [`SessionPool`].
///
/// # Example
///
/// ```rust,ignore
/// let pool = SessionPool::builder()
///     .config(SessionPoolConfigBuilder::new().max_parallel(3).build()?)
///     .engine(Box::new(ChromeEngine::with_defaults()))
///     .enable_reaper(true)
///     .build()?;
/// ```
pub struct SessionPoolBuilder {
    /// Optional configuration (uses default if not provided).
    config: Option<SessionPoolConfig>,

    /// Rendering engine (required).
    engine: Option<Box<dyn RenderEngine>>,

    /// Whether to start the idle reaper (default: true).
    enable_reaper: bool,
}

impl SessionPoolBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            engine: None,
            enable_reaper: true,
        }
    }

    /// Set custom configuration.
    ///
    /// If not called, uses [`SessionPoolConfig::default()`].
    pub fn config(mut self, config: SessionPoolConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the rendering engine (required).
    pub fn engine(mut self, engine: Box<dyn RenderEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Enable or disable the idle reaper.
    ///
    /// Disable only in tests that drive [`SessionPool::evict_idle`] directly.
    pub fn enable_reaper(mut self, enable: bool) -> Self {
        self.enable_reaper = enable;
        self
    }

    /// Build the session pool.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Configuration`] if no engine is provided or
    /// if called outside a tokio runtime.
    pub fn build(self) -> Result<SessionPool> {
        let config = self.config.unwrap_or_default();
        let engine: Arc<dyn RenderEngine> = self
            .engine
            .ok_or_else(|| CaptureError::Configuration("No rendering engine provided".to_string()))?
            .into();
        let runtime_handle = tokio::runtime::Handle::try_current().map_err(|e| {
            CaptureError::Configuration(format!(
                "SessionPool must be built inside a tokio runtime: {}",
                e
            ))
        })?;

        log::info!("🏗️ Building session pool with config: {:?}", config);

        let inner = SessionPoolInner::new(config, engine, runtime_handle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reaper_handle = if self.enable_reaper {
            Some(SessionPool::start_reaper(Arc::clone(&inner), shutdown_rx))
        } else {
            log::warn!("⚠️ Idle reaper disabled (should only be used for testing)");
            None
        };

        log::info!("✅ Session pool built successfully");

        Ok(SessionPool {
            inner,
            shutdown_tx,
            reaper_handle: Mutex::new(reaper_handle),
        })
    }
}

impl Default for SessionPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Initialization (feature-gated)
// ============================================================================

/// Initialize a Chrome-backed session pool from environment variables.
///
/// Reads configuration via [`config::env::from_env`](crate::config::env::from_env),
/// launches Chrome (honoring `CHROME_PATH`), and starts the idle reaper.
///
/// # Errors
///
/// - Returns error if configuration is invalid.
/// - Returns error if Chrome fails to launch.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     env_logger::init();
///     let pool = init_session_pool().await?;
///     // hand `pool` to the orchestrator / web handlers...
///     Ok(())
/// }
/// ```
#[cfg(feature = "env-config")]
pub async fn init_session_pool() -> Result<SharedSessionPool> {
    use crate::config::env::{chrome_path_from_env, from_env};
    use crate::engine::ChromeEngine;

    log::info!("Initializing session pool from environment...");

    let config = from_env()?;
    let chrome_path = chrome_path_from_env();

    let engine = match chrome_path {
        Some(path) => {
            log::info!("Using custom Chrome path: {}", path);
            ChromeEngine::with_path(path)
        }
        None => {
            log::info!("Using auto-detected Chrome browser");
            ChromeEngine::with_defaults()
        }
    }
    .with_page_timeout(config.load_timeout);

    let engine = tokio::task::spawn_blocking(move || engine.start().map(|()| engine))
        .await
        .map_err(|e| CaptureError::SessionUnavailable(format!("Chrome launch panicked: {}", e)))??;

    let pool = SessionPool::builder()
        .config(config)
        .engine(Box::new(engine))
        .enable_reaper(true)
        .build()
        .map_err(|e| {
            log::error!("❌ Failed to create session pool: {}", e);
            e
        })?;

    log::info!("✅ Session pool ready");
    Ok(pool.into_shared())
}

// ============================================================================
// Unit Tests
// ============================================================================

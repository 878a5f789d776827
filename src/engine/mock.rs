//! Mock rendering engine for testing.
//!
//! [`MockEngine`] opens in-memory sessions that record every call, so pool
//! and orchestrator behavior can be verified without Chrome installed.
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use sheetcast::engine::mock::MockEngine;
//!
//! let engine = MockEngine::new()
//!     .with_load_delay(Duration::from_millis(200))
//!     .missing_selector("#absent");
//!
//! // Keep a probe before moving the engine into a pool
//! let probe = engine.probe();
//! assert_eq!(probe.opened(), 0);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::RenderEngine;
use crate::document::Viewport;
use crate::error::{CaptureError, Result};
use crate::service::CaptureTarget;
use crate::traits::RenderSession;

/// PNG file signature; every mock image starts with it.
pub const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// One recorded call on a mock session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Open { id: u64, viewport: Viewport },
    Load { id: u64, url: String },
    SwitchView { id: u64, url: String },
    Reload { id: u64 },
    Capture { id: u64, target: CaptureTarget },
    Close { id: u64 },
}

#[derive(Default)]
struct MockBehavior {
    load_delay: Duration,
    capture_delay: Duration,
    close_delay: Duration,
    failing_loads: usize,
    missing_selectors: Vec<String>,
    failing_close: bool,
    not_ready: bool,
}

#[derive(Default)]
struct MockState {
    behavior: MockBehavior,
    next_id: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    loads_attempted: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    events: Mutex<Vec<MockEvent>>,
}

impl MockState {
    fn record(&self, event: MockEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Track one unit of engine work for the duration of `f`.
    fn busy<T>(&self, delay: Duration, f: impl FnOnce() -> T) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let out = f();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

/// Mock engine for testing without Chrome.
///
/// Configurable to:
/// - Delay loads and captures (to exercise timeouts and concurrency)
/// - Fail the first N loads with [`CaptureError::TransientNetwork`]
/// - Report selected CSS selectors as missing
/// - Fail on close
/// - Report itself as not ready
///
/// # Thread Safety
///
/// All state is atomic or mutex-protected and shared with [`MockProbe`].
pub struct MockEngine {
    state: Arc<MockState>,
}

impl MockEngine {
    /// Create an engine whose sessions succeed immediately.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                next_id: AtomicU64::new(1),
                ..MockState::default()
            }),
        }
    }

    /// Builder methods must run before [`probe`](Self::probe) shares the state.
    fn behavior(mut self, f: impl FnOnce(&mut MockBehavior)) -> Self {
        if let Some(state) = Arc::get_mut(&mut self.state) {
            f(&mut state.behavior);
        }
        self
    }

    /// Block every load for `delay`.
    pub fn with_load_delay(self, delay: Duration) -> Self {
        self.behavior(|b| b.load_delay = delay)
    }

    /// Block every capture for `delay`.
    pub fn with_capture_delay(self, delay: Duration) -> Self {
        self.behavior(|b| b.capture_delay = delay)
    }

    /// Block every close for `delay`.
    pub fn with_close_delay(self, delay: Duration) -> Self {
        self.behavior(|b| b.close_delay = delay)
    }

    /// Fail the first `n` loads across all sessions.
    pub fn failing_loads(self, n: usize) -> Self {
        self.behavior(|b| b.failing_loads = n)
    }

    /// Report `selector` as absent from every document.
    pub fn missing_selector(self, selector: impl Into<String>) -> Self {
        let selector = selector.into();
        self.behavior(move |b| b.missing_selectors.push(selector))
    }

    /// Make every close call fail (the session still counts as closed).
    pub fn failing_close(self) -> Self {
        self.behavior(|b| b.failing_close = true)
    }

    /// Report the engine as not started.
    pub fn not_ready(self) -> Self {
        self.behavior(|b| b.not_ready = true)
    }

    /// Get a probe onto this engine's counters.
    ///
    /// The probe stays valid after the engine is moved into a pool.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for MockEngine {
    fn open(&self, viewport: Viewport) -> Result<Arc<dyn RenderSession>> {
        if self.state.behavior.not_ready {
            return Err(CaptureError::SessionUnavailable(
                "Mock engine not started".to_string(),
            ));
        }
        viewport.validate()?;

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        self.state.record(MockEvent::Open { id, viewport });
        log::trace!("Mock session {} opened", id);

        Ok(Arc::new(MockSession {
            id,
            state: Arc::clone(&self.state),
            url: Mutex::new(String::new()),
            closed: AtomicBool::new(false),
        }))
    }

    fn is_ready(&self) -> bool {
        !self.state.behavior.not_ready
    }
}

/// Read-only view of a [`MockEngine`]'s counters and event log.
#[derive(Clone)]
pub struct MockProbe {
    state: Arc<MockState>,
}

impl MockProbe {
    /// Sessions opened so far.
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Sessions opened and not yet closed.
    pub fn live(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }

    /// Load attempts, including failed ones.
    pub fn loads_attempted(&self) -> usize {
        self.state.loads_attempted.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous loads/captures observed.
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of every recorded call, in order.
    pub fn events(&self) -> Vec<MockEvent> {
        self.state
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Count recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&MockEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

/// In-memory session produced by [`MockEngine`].
///
/// Captures return [`PNG_MAGIC`] followed by `"{id}:{url}"`, so tests can tell
/// which session rendered which document.
pub struct MockSession {
    id: u64,
    state: Arc<MockState>,
    url: Mutex<String>,
    closed: AtomicBool,
}

impl MockSession {
    fn set_url(&self, url: &str) {
        *self.url.lock().unwrap_or_else(PoisonError::into_inner) = url.to_string();
    }

    fn url(&self) -> String {
        self.url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CaptureError::SessionUnavailable(format!(
                "Mock session {} already closed",
                self.id
            )));
        }
        Ok(())
    }
}

impl RenderSession for MockSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn load(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        let state = &self.state;
        state.busy(state.behavior.load_delay, || {
            let attempt = state.loads_attempted.fetch_add(1, Ordering::SeqCst);
            state.record(MockEvent::Load {
                id: self.id,
                url: url.to_string(),
            });

            if attempt < state.behavior.failing_loads {
                return Err(CaptureError::TransientNetwork(format!(
                    "mock load {} failed",
                    attempt + 1
                )));
            }

            self.set_url(url);
            Ok(())
        })
    }

    fn switch_view(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.state.record(MockEvent::SwitchView {
            id: self.id,
            url: url.to_string(),
        });
        self.set_url(url);
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        self.ensure_open()?;
        self.state.record(MockEvent::Reload { id: self.id });
        Ok(())
    }

    fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let state = &self.state;
        state.busy(state.behavior.capture_delay, || {
            state.record(MockEvent::Capture {
                id: self.id,
                target: target.clone(),
            });

            if let CaptureTarget::Selector(selector) = target {
                if state.behavior.missing_selectors.contains(selector) {
                    return Err(CaptureError::SelectorNotFound(selector.clone()));
                }
            }

            let mut image = PNG_MAGIC.to_vec();
            image.extend_from_slice(format!("{}:{}", self.id, self.url()).as_bytes());
            Ok(image)
        })
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let delay = self.state.behavior.close_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        self.state.record(MockEvent::Close { id: self.id });

        if self.state.behavior.failing_close {
            return Err(CaptureError::CaptureFailed(format!(
                "mock close of session {} failed",
                self.id
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_session_records_calls() {
        let engine = MockEngine::new();
        let probe = engine.probe();

        let session = engine.open(Viewport::default()).unwrap();
        session.load("https://sheets.example.com/d/a#gid=0").unwrap();
        session.switch_view("https://sheets.example.com/d/a#gid=1").unwrap();
        let image = session.capture(&CaptureTarget::FullViewport).unwrap();
        session.close().unwrap();

        assert!(image.starts_with(&PNG_MAGIC));
        assert!(image.ends_with(b"https://sheets.example.com/d/a#gid=1"));
        assert_eq!(probe.opened(), 1);
        assert_eq!(probe.closed(), 1);
        assert_eq!(probe.live(), 0);
        assert_eq!(probe.count(|e| matches!(e, MockEvent::SwitchView { .. })), 1);
    }

    #[test]
    fn test_mock_failing_loads_then_succeeds() {
        let engine = MockEngine::new().failing_loads(1);
        let session = engine.open(Viewport::default()).unwrap();

        assert!(matches!(
            session.load("https://example.com/"),
            Err(CaptureError::TransientNetwork(_))
        ));
        assert!(session.load("https://example.com/").is_ok());
        assert_eq!(engine.probe().loads_attempted(), 2);
    }

    #[test]
    fn test_mock_missing_selector_and_closed_session() {
        let engine = MockEngine::new().missing_selector("#gone").failing_close();
        let session = engine.open(Viewport::default()).unwrap();

        let result = session.capture(&CaptureTarget::Selector("#gone".to_string()));
        assert_eq!(result, Err(CaptureError::SelectorNotFound("#gone".to_string())));
        assert!(session.capture(&CaptureTarget::Selector("#here".to_string())).is_ok());

        assert!(session.close().is_err());
        // Second close is a no-op
        assert!(session.close().is_ok());
        assert_eq!(engine.probe().closed(), 1);
        assert!(matches!(
            session.reload(),
            Err(CaptureError::SessionUnavailable(_))
        ));
    }

    #[test]
    fn test_mock_not_ready() {
        let engine = MockEngine::new().not_ready();
        assert!(!engine.is_ready());
        assert!(matches!(
            engine.open(Viewport::default()),
            Err(CaptureError::SessionUnavailable(_))
        ));
        assert_eq!(engine.probe().opened(), 0);
    }
}

//! Render session trait.
//!
//! This module provides the [`RenderSession`] trait, the seam between the
//! [`SessionPool`](crate::SessionPool) and whatever actually renders a
//! document (a headless Chrome tab in production, an in-memory fake in
//! tests).
//!
//! # Blocking Contract
//!
//! Every method is synchronous and may block for as long as the underlying
//! engine needs. The pool never calls these methods on an async worker
//! thread directly; it runs them inside `tokio::task::spawn_blocking`
//! wrapped in a `tokio::time::timeout`.

use crate::error::Result;
use crate::service::CaptureTarget;

/// One addressable handle to a loaded document.
///
/// # Thread Safety
///
/// Requires `Send + Sync` because a session is created on a blocking
/// thread, stored in the pool, and later driven from other blocking threads.
/// The pool guarantees that at most one caller drives a pooled session at a
/// time, so implementations do not need internal serialization.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use sheetcast::{CaptureTarget, RenderSession, Result};
///
/// struct Recorder { id: u64 }
///
/// impl RenderSession for Recorder {
///     fn id(&self) -> u64 { self.id }
///     fn load(&self, url: &str) -> Result<()> { Ok(()) }
///     fn switch_view(&self, url: &str) -> Result<()> { Ok(()) }
///     fn reload(&self) -> Result<()> { Ok(()) }
///     fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>> { Ok(Vec::new()) }
///     fn close(&self) -> Result<()> { Ok(()) }
/// }
/// ```
pub trait RenderSession: Send + Sync {
    /// Engine-unique identifier, used for logging.
    fn id(&self) -> u64;

    /// Fully load `url`, waiting until navigation completes.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::TransientNetwork`](crate::CaptureError::TransientNetwork)
    ///   if the navigation could not be started
    /// - [`CaptureError::LoadTimeout`](crate::CaptureError::LoadTimeout)
    ///   if the document never finished loading
    fn load(&self, url: &str) -> Result<()>;

    /// Point an already loaded document at another sub-view of itself.
    ///
    /// Cheaper than [`load`](Self::load) when only the fragment changes.
    fn switch_view(&self, url: &str) -> Result<()>;

    /// Reload the current document so its content is fresh.
    fn reload(&self) -> Result<()>;

    /// Snapshot the current document as PNG bytes.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::SelectorNotFound`](crate::CaptureError::SelectorNotFound)
    ///   if `target` is a selector that matches nothing
    /// - [`CaptureError::CaptureFailed`](crate::CaptureError::CaptureFailed)
    ///   if the engine could not produce an image
    fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>>;

    /// Release the session's engine resources.
    ///
    /// Called exactly once by the pool when the session is evicted,
    /// discarded, or the pool shuts down.
    fn close(&self) -> Result<()>;
}

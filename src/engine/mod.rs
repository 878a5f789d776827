//! Rendering engines.
//!
//! This module provides the [`RenderEngine`] trait and its implementations.
//! An engine owns whatever long-lived process backs rendering and opens new
//! [`RenderSession`]s on demand.
//!
//! # Available Engines
//!
//! | Engine | Description |
//! |--------|-------------|
//! | [`ChromeEngine`] | One headless Chrome process, one tab per session |
//! | [`mock::MockEngine`] | In-memory fake for tests (feature-gated) |
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetcast::{ChromeEngine, RenderEngine, Viewport};
//!
//! let engine = ChromeEngine::with_defaults();
//! engine.start()?;
//!
//! let session = engine.open(Viewport::default())?;
//! session.load("https://sheets.example.com/d/abc/edit#gid=0")?;
//! ```

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::{ChromeEngine, ChromeSession, create_chrome_options};

use std::sync::Arc;

use crate::document::Viewport;
use crate::error::Result;
use crate::traits::RenderSession;

/// Trait for the engine that opens render sessions.
///
/// # Thread Safety
///
/// Requires `Send + Sync` because the engine is shared by the pool, the
/// reaper, and every blocking task that opens a session.
///
/// # Implementors
///
/// - [`ChromeEngine`] - headless Chrome via `headless_chrome`
/// - [`mock::MockEngine`] - for testing (when `test-utils` feature enabled)
pub trait RenderEngine: Send + Sync {
    /// Open a new, empty session sized to `viewport`.
    ///
    /// Blocking; the pool calls it from `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::SessionUnavailable`](crate::CaptureError::SessionUnavailable)
    ///   if the engine is not running
    /// - [`CaptureError::TransientNetwork`](crate::CaptureError::TransientNetwork)
    ///   if the engine failed to open a new page
    fn open(&self, viewport: Viewport) -> Result<Arc<dyn RenderSession>>;

    /// Whether the engine can currently open sessions.
    fn is_ready(&self) -> bool;
}

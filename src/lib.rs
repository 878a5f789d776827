//! # sheetcast
//!
//! Scheduled spreadsheet snapshots delivered to chat, backed by a pool of
//! long-lived headless Chrome sessions.
//!
//! Loading a large spreadsheet in a fresh browser page takes seconds. This
//! crate keeps one rendering session per document alive between captures,
//! switches between the document's sub-views (tabs) with a cheap fragment
//! navigation, and closes sessions that nobody used for a while.
//!
//! ## Features
//!
//! - **Per-Document Session Pool**: one live session per document, reused
//!   across captures of any of its views
//! - **Idle Eviction**: a background reaper closes unused sessions
//! - **Bounded Engine Calls**: load, capture, and close all have deadlines
//! - **Batch Captures**: chunked concurrency with per-request failure isolation
//! - **Retry Mode**: one-off captures on fresh sessions with linear backoff
//! - **Dispatch**: capture-and-send jobs against any [`MessagingClient`]
//! - **Admin Routes**: optional Axum endpoints for stats and refresh
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │       Scheduler  /  Admin HTTP (Axum)       │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │   dispatch_pooled / dispatch_single         │
//! │   CaptureOrchestrator                       │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │              SessionPool                    │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   base key → session (one per document) │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   Idle Reaper task                      │ │
//! │ └─────────────────────────────────────────┘ │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │   RenderEngine (headless Chrome, one tab    │
//! │   per session)                              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheetcast::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ChromeEngine::with_defaults();
//!     engine.start()?;
//!
//!     let pool = SessionPool::builder()
//!         .config(
//!             SessionPoolConfigBuilder::new()
//!                 .max_parallel(3)
//!                 .idle_timeout(Duration::from_secs(600))
//!                 .build()?
//!         )
//!         .engine(Box::new(engine))
//!         .build()?
//!         .into_shared();
//!
//!     let orchestrator = CaptureOrchestrator::new(Arc::clone(&pool));
//!     let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit#gid=0")?;
//!
//!     let requests = vec![
//!         CaptureRequest::new("summary", doc.clone()),
//!         CaptureRequest::new("details", doc.with_view("42")),
//!     ];
//!     let results = orchestrator.capture_all(requests, 3).await;
//!     println!("{:?}", BatchSummary::from_results(&results));
//!
//!     pool.close_all().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Configuration
//!
//! When the `env-config` feature is enabled, [`init_session_pool`] builds a
//! Chrome-backed pool from environment variables (loaded from an `app.env`
//! file or the process environment):
//!
//! ```rust,no_run
//! use sheetcast::init_session_pool;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = init_session_pool().await?;
//!     // pool is Arc<SessionPool>, ready for the orchestrator
//!     pool.close_all().await;
//!     Ok(())
//! }
//! ```
//!
//! ### Environment Variables
//!
//! | Variable | Type | Default | Description |
//! |----------|------|---------|-------------|
//! | `CAPTURE_MAX_PARALLEL` | usize | 5 | Concurrency ceiling |
//! | `SESSION_IDLE_TIMEOUT_SECONDS` | u64 | 300 | Idle threshold |
//! | `SESSION_REAP_INTERVAL_SECONDS` | u64 | 60 | Reaper period |
//! | `PAGE_LOAD_TIMEOUT_SECONDS` | u64 | 30 | Load bound |
//! | `CAPTURE_TIMEOUT_SECONDS` | u64 | 30 | Snapshot bound |
//! | `SESSION_DESTROY_TIMEOUT_SECONDS` | u64 | 5 | Close bound |
//! | `CAPTURE_MAX_RETRIES` | u32 | 3 | Attempts in retry mode |
//! | `CAPTURE_RETRY_DELAY_MS` | u64 | 2000 | Backoff base |
//! | `SESSION_REFRESH_ON_VIEW_SWITCH` | bool | false | Reload after a view switch |
//! | `CHROME_PATH` | String | auto | Custom Chrome binary path |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Environment-based configuration (default) |
//! | `axum-integration` | Axum admin routes |
//! | `test-utils` | Mock engine for testing |
//!
//! ## Error Handling
//!
//! Pool operations return [`Result<T, CaptureError>`](Result). Batch and
//! retry captures never fail as a whole; each [`CaptureResult`] carries its
//! own outcome:
//!
//! ```rust,ignore
//! for result in orchestrator.capture_all(requests, 5).await {
//!     match result.outcome {
//!         Ok(png) => send(png).await,
//!         Err(e) if e.is_retryable() => log::warn!("{}: {}", result.correlation_id, e),
//!         Err(e) => log::error!("{}: {}", result.correlation_id, e),
//!     }
//! }
//! ```
//!
//! ## Testing
//!
//! For testing without Chrome, enable the `test-utils` feature and use
//! [`MockEngine`](engine::mock::MockEngine):
//!
//! ```rust,ignore
//! use sheetcast::engine::mock::MockEngine;
//!
//! let engine = MockEngine::new().failing_loads(1);
//! let probe = engine.probe();
//! let pool = SessionPool::builder()
//!     .engine(Box::new(engine))
//!     .enable_reaper(false)
//!     .build()?;
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod handle;
pub mod pool;
pub mod prelude;
pub mod service;
pub mod stats;
pub mod traits;

// Internal modules (not publicly exposed)
pub(crate) mod blocking;
pub(crate) mod tracked;

// ============================================================================
// Feature-gated modules
// ============================================================================

/// Web framework integrations.
///
/// Enable `axum-integration` to use them.
#[cfg(feature = "axum-integration")]
pub mod integrations;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

pub use config::{SessionPoolConfig, SessionPoolConfigBuilder};
pub use document::{DocumentRef, Viewport};
pub use engine::{ChromeEngine, ChromeSession, RenderEngine, create_chrome_options};
pub use error::{CaptureError, DeliveryError, Result};
pub use handle::{DetachedSession, SessionHandle};
pub use pool::{SessionPool, SessionPoolBuilder, SharedSessionPool};
pub use service::{
    BatchSummary, CaptureOrchestrator, CaptureRequest, CaptureResult, CaptureStage,
    CaptureTarget, DispatchReport, MessagingClient, Recipient, ScheduleJob, dispatch_pooled,
    dispatch_single,
};
pub use stats::PoolStats;
pub use traits::RenderSession;

// Feature-gated re-exports
#[cfg(feature = "env-config")]
pub use config::env::{chrome_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use pool::init_session_pool;

//! Convenient imports for common usage patterns.
//!
//! This module re-exports the most commonly used types from `sheetcast`,
//! allowing you to get started with a single import.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sheetcast::prelude::*;
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetcast::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = ChromeEngine::with_defaults();
//!     engine.start()?;
//!
//!     let pool = SessionPool::builder()
//!         .config(SessionPoolConfigBuilder::new().max_parallel(3).build()?)
//!         .engine(Box::new(engine))
//!         .build()?
//!         .into_shared();
//!
//!     let orchestrator = CaptureOrchestrator::new(Arc::clone(&pool));
//!     let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit#gid=0")?;
//!     let results = orchestrator
//!         .capture_all(vec![CaptureRequest::new("daily", doc)], 3)
//!         .await;
//!
//!     pool.close_all().await;
//!     Ok(())
//! }
//! ```

// Core types
pub use crate::config::{SessionPoolConfig, SessionPoolConfigBuilder};
pub use crate::document::{DocumentRef, Viewport};
pub use crate::engine::{ChromeEngine, RenderEngine};
pub use crate::error::{CaptureError, DeliveryError, Result};
pub use crate::handle::{DetachedSession, SessionHandle};
pub use crate::pool::{SessionPool, SessionPoolBuilder, SharedSessionPool};
pub use crate::service::{
    BatchSummary, CaptureOrchestrator, CaptureRequest, CaptureResult, CaptureStage,
    CaptureTarget, DispatchReport, MessagingClient, Recipient, ScheduleJob, dispatch_pooled,
    dispatch_single,
};
pub use crate::stats::PoolStats;
pub use crate::traits::RenderSession;

// Feature-gated exports
#[cfg(feature = "env-config")]
pub use crate::config::env::{chrome_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use crate::pool::init_session_pool;

// Commonly needed with SharedSessionPool
pub use std::sync::Arc;

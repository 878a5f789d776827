//! Capture service.
//!
//! This module holds the **framework-agnostic core** that sits on top of the
//! session pool: request and result types, the capture orchestrator, and
//! the scheduled dispatch entry points.
//!
//! # Module Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                      service module                           │
//! │                                                               │
//! │  ┌──────────────────┐ ┌─────────────────────┐ ┌─────────────┐ │
//! │  │    types.rs      │ │    capture.rs       │ │ dispatch.rs │ │
//! │  │ CaptureRequest   │ │ CaptureOrchestrator │ │ ScheduleJob │ │
//! │  │ CaptureResult    │ │  capture_all()      │ │ dispatch_*  │ │
//! │  │ CaptureTarget    │ │  capture_with_retry │ │ Messaging-  │ │
//! │  │ BatchSummary     │ │                     │ │   Client    │ │
//! │  └──────────────────┘ └─────────────────────┘ └─────────────┘ │
//! └───────────────────────────────┬───────────────────────────────┘
//!                                 │ uses
//!                                 ▼
//!                            SessionPool
//! ```
//!
//! # Design Philosophy
//!
//! | Layer | Responsibility | This Module? |
//! |-------|----------------|--------------|
//! | **Service** | Scheduling captures, retries, delivery | ✅ Yes |
//! | **Pool** | Session lifetime, reuse, eviction | ❌ No (`pool`) |
//! | **Handler** | HTTP request/response mapping | ❌ No (`integrations`) |

mod capture;
mod dispatch;
mod types;

pub use capture::CaptureOrchestrator;
pub use dispatch::{
    DispatchReport, MessagingClient, Recipient, ScheduleJob, dispatch_pooled, dispatch_single,
};
pub use types::{BatchSummary, CaptureRequest, CaptureResult, CaptureStage, CaptureTarget};

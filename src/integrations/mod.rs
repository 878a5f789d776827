//! Web framework integrations.
//!
//! This module provides optional admin endpoints for a running
//! [`SessionPool`](crate::SessionPool).
//!
//! # Available Integrations
//!
//! | Framework | Feature Flag | Module |
//! |-----------|--------------|--------|
//! | Axum | `axum-integration` | `axum` |
//!
//! # Enabling Integrations
//!
//! Add the feature to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sheetcast = { version = "0.1", features = ["axum-integration"] }
//! ```
//!
//! # Common Pattern
//!
//! 1. Create a `SessionPool` during application startup
//! 2. Convert to shared state using `into_shared()`
//! 3. Mount the integration's router with that state
//! 4. Call `close_all()` once the server has stopped

#[cfg(feature = "axum-integration")]
pub mod axum;

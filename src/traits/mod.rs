//! Traits for abstraction and extensibility.
//!
//! - **Rendering**: [`RenderSession`] for driving one loaded document
//!
//! Sessions are produced by a [`RenderEngine`](crate::RenderEngine); see the
//! [`engine`](crate::engine) module for the available engines.

mod session;

pub use session::RenderSession;

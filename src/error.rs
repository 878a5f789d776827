//! Error types for the capture subsystem.
//!
//! This module provides [`CaptureError`], the error taxonomy shared by the
//! session pool and the capture orchestrator, [`DeliveryError`] for the
//! messaging side, and a convenient [`Result`] type alias.
//!
//! # Example
//!
//! ```rust
//! use sheetcast::{CaptureError, Result};
//!
//! fn snapshot() -> Result<Vec<u8>> {
//!     Err(CaptureError::LoadTimeout("30s elapsed".to_string()))
//! }
//!
//! match snapshot() {
//!     Ok(png) => println!("Captured {} bytes", png.len()),
//!     Err(e) if e.is_retryable() => println!("Worth another try: {}", e),
//!     Err(e) => eprintln!("Giving up: {}", e),
//! }
//! ```

/// Errors that can occur while acquiring sessions or capturing snapshots.
///
/// Every variant carries a human-readable description. The type is `Clone`
/// so a failure can be stored in a [`CaptureResult`](crate::service::CaptureResult)
/// and still be reported to the scheduler afterwards.
///
/// # Retry Classification
///
/// | Variant | Retryable | Typical cause |
/// |---------|-----------|---------------|
/// | `LoadTimeout` | yes | Document slow to load |
/// | `SelectorNotFound` | no | Selector absent after load |
/// | `SessionUnavailable` | no | Pool closed or engine not started |
/// | `TransientNetwork` | yes | Fetch or navigation failed |
/// | `CaptureFailed` | yes | Snapshot command failed |
/// | `InvalidRequest` | no | Bad URL or viewport |
/// | `Configuration` | no | Invalid pool settings |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The document did not finish loading within the configured bound.
    ///
    /// # Example
    ///
    /// ```rust
    /// use sheetcast::CaptureError;
    ///
    /// let error = CaptureError::LoadTimeout("no load event after 30s".to_string());
    /// assert_eq!(error.to_string(), "Document load timed out: no load event after 30s");
    /// ```
    #[error("Document load timed out: {0}")]
    LoadTimeout(String),

    /// The requested CSS selector did not match anything after load.
    ///
    /// Retrying with the same selector will not help; the caller must
    /// decide on a different target.
    #[error("Selector not found: {0}")]
    SelectorNotFound(String),

    /// The pool is closed or the rendering engine has not been started.
    ///
    /// Fatal for the request, never for the process.
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    /// The underlying fetch or navigation failed.
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// The rendering engine failed to produce an image.
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// The request itself is malformed (empty URL, zero-sized viewport, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration provided.
    ///
    /// # Common Causes
    ///
    /// - `max_parallel` is set to 0
    /// - `idle_timeout` does not exceed `reap_interval`
    /// - No rendering engine given to the pool builder
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CaptureError {
    /// Whether a fresh attempt could plausibly succeed.
    ///
    /// Used by [`capture_with_retry`](crate::service::CaptureOrchestrator::capture_with_retry)
    /// to stop early on errors that will repeat identically.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::LoadTimeout(_) | Self::TransientNetwork(_) | Self::CaptureFailed(_) => true,
            Self::SelectorNotFound(_)
            | Self::SessionUnavailable(_)
            | Self::InvalidRequest(_)
            | Self::Configuration(_) => false,
        }
    }

    /// Machine-readable error code for API clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::LoadTimeout(_) => "LOAD_TIMEOUT",
            Self::SelectorNotFound(_) => "SELECTOR_NOT_FOUND",
            Self::SessionUnavailable(_) => "SESSION_UNAVAILABLE",
            Self::TransientNetwork(_) => "TRANSIENT_NETWORK",
            Self::CaptureFailed(_) => "CAPTURE_FAILED",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Configuration(_) => "CONFIGURATION",
        }
    }

    /// HTTP status code appropriate for this error.
    ///
    /// | Status | Variants |
    /// |--------|----------|
    /// | 400 | `InvalidRequest` |
    /// | 422 | `SelectorNotFound` |
    /// | 500 | `Configuration` |
    /// | 502 | `TransientNetwork`, `CaptureFailed` |
    /// | 503 | `SessionUnavailable` |
    /// | 504 | `LoadTimeout` |
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::SelectorNotFound(_) => 422,
            Self::Configuration(_) => 500,
            Self::TransientNetwork(_) | Self::CaptureFailed(_) => 502,
            Self::SessionUnavailable(_) => 503,
            Self::LoadTimeout(_) => 504,
        }
    }
}

/// Convenience conversion from [`String`] to [`CaptureError::Configuration`].
///
/// Lets config builder errors flow through `?`.
///
/// ```rust
/// use sheetcast::CaptureError;
///
/// let error: CaptureError = "max_parallel must be greater than 0".to_string().into();
/// assert!(matches!(error, CaptureError::Configuration(_)));
/// ```
impl From<String> for CaptureError {
    fn from(msg: String) -> Self {
        CaptureError::Configuration(msg)
    }
}

/// Convenience conversion from `&str` to [`CaptureError::Configuration`].
impl From<&str> for CaptureError {
    fn from(msg: &str) -> Self {
        CaptureError::Configuration(msg.to_string())
    }
}

/// Failure reported by a [`MessagingClient`](crate::service::MessagingClient).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Delivery to {recipient} failed: {message}")]
pub struct DeliveryError {
    /// Recipient the image was addressed to.
    pub recipient: String,
    /// Description from the remote API or transport.
    pub message: String,
}

impl DeliveryError {
    /// Create a delivery error for `recipient`.
    pub fn new(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using [`CaptureError`].
pub type Result<T> = std::result::Result<T, CaptureError>;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies error type conversions from String and &str.
    #[test]
    fn test_error_conversion() {
        let error: CaptureError = "test error".into();
        match error {
            CaptureError::Configuration(msg) => {
                assert_eq!(msg, "test error", "Error message should be preserved");
            }
            _ => panic!("Expected Configuration error variant"),
        }

        let error: CaptureError = "another error".to_string().into();
        assert_eq!(
            error,
            CaptureError::Configuration("another error".to_string())
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            CaptureError::SelectorNotFound("#chart".to_string()).to_string(),
            "Selector not found: #chart"
        );
        assert_eq!(
            CaptureError::SessionUnavailable("pool is closed".to_string()).to_string(),
            "Session unavailable: pool is closed"
        );
        assert_eq!(
            CaptureError::TransientNetwork("connection reset".to_string()).to_string(),
            "Network error: connection reset"
        );
    }

    /// Timeouts and network failures are worth retrying; bad selectors are not.
    #[test]
    fn test_retry_classification() {
        assert!(CaptureError::LoadTimeout(String::new()).is_retryable());
        assert!(CaptureError::TransientNetwork(String::new()).is_retryable());
        assert!(CaptureError::CaptureFailed(String::new()).is_retryable());

        assert!(!CaptureError::SelectorNotFound(String::new()).is_retryable());
        assert!(!CaptureError::SessionUnavailable(String::new()).is_retryable());
        assert!(!CaptureError::InvalidRequest(String::new()).is_retryable());
        assert!(!CaptureError::Configuration(String::new()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CaptureError::InvalidRequest(String::new()).status_code(), 400);
        assert_eq!(CaptureError::SessionUnavailable(String::new()).status_code(), 503);
        assert_eq!(CaptureError::LoadTimeout(String::new()).status_code(), 504);
        assert_eq!(
            CaptureError::SelectorNotFound(String::new()).error_code(),
            "SELECTOR_NOT_FOUND"
        );
    }

    #[test]
    fn test_delivery_error_display() {
        let error = DeliveryError::new("chat-42", "429 Too Many Requests");
        assert_eq!(
            error.to_string(),
            "Delivery to chat-42 failed: 429 Too Many Requests"
        );
    }

    /// Errors travel across spawned tasks, so they must be Send + Sync.
    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + std::error::Error>() {}
        assert_send_sync::<CaptureError>();
        assert_send_sync::<DeliveryError>();
    }
}

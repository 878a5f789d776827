//! Shared types for the capture service.
//!
//! # Overview
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`CaptureTarget`] | What part of the page to snapshot |
//! | [`CaptureRequest`] | One document view to capture |
//! | [`CaptureStage`] | How far a request got |
//! | [`CaptureResult`] | Image or error for one request |
//! | [`BatchSummary`] | Success/failure counts for a batch |

use std::time::Duration;

use crate::document::{DocumentRef, Viewport};
use crate::error::CaptureError;

// ============================================================================
// Request Types
// ============================================================================

/// What part of the rendered page to snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureTarget {
    /// Everything visible in the viewport.
    #[default]
    FullViewport,

    /// A fixed rectangle in CSS pixels, relative to the page origin.
    Region {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// The bounding box of the first element matching a CSS selector.
    Selector(String),
}

impl CaptureTarget {
    /// Reject empty regions and blank selectors before touching the engine.
    pub fn validate(&self) -> Result<(), CaptureError> {
        match self {
            Self::FullViewport => Ok(()),
            Self::Region { width, height, .. } if *width == 0 || *height == 0 => Err(
                CaptureError::InvalidRequest("Capture region must have a positive size".to_string()),
            ),
            Self::Region { .. } => Ok(()),
            Self::Selector(selector) if selector.trim().is_empty() => Err(
                CaptureError::InvalidRequest("Capture selector is empty".to_string()),
            ),
            Self::Selector(_) => Ok(()),
        }
    }
}

/// One document view to capture.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use sheetcast::{CaptureRequest, CaptureTarget, DocumentRef};
///
/// let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit#gid=0").unwrap();
/// let request = CaptureRequest::new("daily-sales", doc)
///     .with_target(CaptureTarget::Selector("#chart".to_string()))
///     .with_settle_delay(Duration::from_secs(2));
///
/// assert_eq!(request.correlation_id, "daily-sales");
/// ```
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Document view to render.
    pub document: DocumentRef,

    /// Caller-chosen id echoed back in the [`CaptureResult`].
    pub correlation_id: String,

    /// Rendering surface size.
    pub viewport: Viewport,

    /// Region of the page to snapshot.
    pub target: CaptureTarget,

    /// Pause between load and capture so client-side rendering can finish.
    pub settle_delay: Duration,
}

impl CaptureRequest {
    /// Capture the full default viewport with no settle delay.
    pub fn new(correlation_id: impl Into<String>, document: DocumentRef) -> Self {
        Self {
            document,
            correlation_id: correlation_id.into(),
            viewport: Viewport::default(),
            target: CaptureTarget::default(),
            settle_delay: Duration::ZERO,
        }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_target(mut self, target: CaptureTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Validate everything that can be checked without an engine.
    pub fn validate(&self) -> Result<(), CaptureError> {
        self.viewport.validate()?;
        self.target.validate()
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Lifecycle of a single capture request.
///
/// ```text
/// Pending ─► Loading ─► Settling ─► Capturing ─► Succeeded
///               │           │            │
///               └───────────┴────────────┴─────► Failed
/// ```
///
/// A failed [`CaptureResult`] reports the stage that failed, not `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureStage {
    Pending,
    Loading,
    Settling,
    Capturing,
    Succeeded,
    Failed,
}

impl CaptureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Settling => "settling",
            Self::Capturing => "capturing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one capture request.
///
/// The image is present iff the capture succeeded; the error is present iff
/// it failed.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// Copied from the [`CaptureRequest`].
    pub correlation_id: String,

    /// PNG bytes or the error that stopped the request.
    pub outcome: Result<Vec<u8>, CaptureError>,

    /// [`CaptureStage::Succeeded`] on success, otherwise the stage that failed.
    pub stage: CaptureStage,

    /// Wall time spent on the request, including retries.
    pub elapsed: Duration,
}

impl CaptureResult {
    pub(crate) fn succeeded(correlation_id: String, image: Vec<u8>, elapsed: Duration) -> Self {
        Self {
            correlation_id,
            outcome: Ok(image),
            stage: CaptureStage::Succeeded,
            elapsed,
        }
    }

    pub(crate) fn failed(
        correlation_id: String,
        stage: CaptureStage,
        error: CaptureError,
        elapsed: Duration,
    ) -> Self {
        Self {
            correlation_id,
            outcome: Err(error),
            stage,
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&CaptureError> {
        self.outcome.as_ref().err()
    }
}

/// Success/failure counts for a batch of [`CaptureResult`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Tally `results`.
    ///
    /// ```rust
    /// use sheetcast::BatchSummary;
    ///
    /// let summary = BatchSummary::from_results(&[]);
    /// assert_eq!(summary.total, 0);
    /// ```
    pub fn from_results(results: &[CaptureResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> DocumentRef {
        DocumentRef::parse("https://sheets.example.com/d/abc/edit#gid=0").unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let request = CaptureRequest::new("r1", doc());
        assert_eq!(request.viewport, Viewport::default());
        assert_eq!(request.target, CaptureTarget::FullViewport);
        assert_eq!(request.settle_delay, Duration::ZERO);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_target_validation() {
        let empty_region = CaptureTarget::Region {
            x: 0,
            y: 0,
            width: 0,
            height: 10,
        };
        assert!(matches!(
            empty_region.validate(),
            Err(CaptureError::InvalidRequest(_))
        ));
        assert!(CaptureTarget::Selector("  ".to_string()).validate().is_err());
        assert!(CaptureTarget::Selector("#chart".to_string()).validate().is_ok());
    }

    #[test]
    fn test_result_accessors() {
        let ok = CaptureResult::succeeded("a".into(), vec![1, 2, 3], Duration::from_millis(5));
        assert!(ok.is_success());
        assert_eq!(ok.image(), Some(&[1u8, 2, 3][..]));
        assert!(ok.error().is_none());

        let err = CaptureResult::failed(
            "b".into(),
            CaptureStage::Loading,
            CaptureError::LoadTimeout("slow".into()),
            Duration::from_secs(1),
        );
        assert!(!err.is_success());
        assert!(err.image().is_none());
        assert_eq!(err.stage, CaptureStage::Loading);

        let summary = BatchSummary::from_results(&[ok, err]);
        assert_eq!(
            summary,
            BatchSummary {
                total: 2,
                succeeded: 1,
                failed: 1
            }
        );
    }
}

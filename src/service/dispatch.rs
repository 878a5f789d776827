//! Scheduled delivery of captures to chat recipients.
//!
//! A [`ScheduleJob`] names one document and the recipients that should get a
//! snapshot of it. The dispatch functions capture the document and hand each
//! image to a [`MessagingClient`], then report what happened in a
//! [`DispatchReport`].
//!
//! # Modes
//!
//! - [`dispatch_pooled`]: one capture per recipient, each honoring the
//!   recipient's own sub-view, run through the session pool.
//! - [`dispatch_single`]: one capture (with retry) shared by every recipient.
//!
//! # Example
//!
//! ```rust,ignore
//! struct Bot;
//!
//! impl MessagingClient for Bot {
//!     async fn send_image(&self, recipient: &str, image: &[u8], caption: &str)
//!         -> Result<String, DeliveryError> {
//!         // call the chat API...
//!         Ok("message-id".to_string())
//!     }
//! }
//!
//! let report = dispatch_pooled(&orchestrator, &job, &Bot, None).await;
//! log::info!("{:?}", report);
//! ```

use std::future::Future;
use std::time::Duration;

use crate::document::{DocumentRef, Viewport};
use crate::error::DeliveryError;
use crate::service::capture::CaptureOrchestrator;
use crate::service::types::{CaptureRequest, CaptureResult, CaptureTarget};

/// Sends images to chat recipients.
///
/// Implemented by the caller for whatever messaging platform it uses.
pub trait MessagingClient: Send + Sync {
    /// Deliver `image` (PNG bytes) to `recipient`, returning the platform's
    /// message id.
    fn send_image(
        &self,
        recipient: &str,
        image: &[u8],
        caption: &str,
    ) -> impl Future<Output = Result<String, DeliveryError>> + Send;
}

/// One destination of a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Chat identifier understood by the [`MessagingClient`].
    pub chat_id: String,

    /// Sub-view to send instead of the job's own, if any.
    ///
    /// Ignored by [`dispatch_single`].
    pub view: Option<String>,
}

impl Recipient {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            view: None,
        }
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }
}

/// A scheduled capture-and-send job.
#[derive(Debug, Clone)]
pub struct ScheduleJob {
    /// Human-readable name, used in logs and correlation ids.
    pub name: String,
    pub document: DocumentRef,
    pub recipients: Vec<Recipient>,
    pub viewport: Viewport,
    pub target: CaptureTarget,
    pub settle_delay: Duration,
    pub caption: String,
}

impl ScheduleJob {
    /// Full-viewport capture of `document` with no recipients yet.
    pub fn new(name: impl Into<String>, document: DocumentRef) -> Self {
        let name = name.into();
        Self {
            caption: name.clone(),
            name,
            document,
            recipients: Vec::new(),
            viewport: Viewport::default(),
            target: CaptureTarget::default(),
            settle_delay: Duration::ZERO,
        }
    }

    pub fn with_recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    pub fn with_target(mut self, target: CaptureTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// The document `recipient` should receive.
    fn document_for(&self, recipient: &Recipient) -> DocumentRef {
        match &recipient.view {
            Some(view) => self.document.with_view(view),
            None => self.document.clone(),
        }
    }

    fn request(&self, correlation_id: String, document: DocumentRef) -> CaptureRequest {
        CaptureRequest::new(correlation_id, document)
            .with_viewport(self.viewport)
            .with_target(self.target.clone())
            .with_settle_delay(self.settle_delay)
    }
}

/// What a dispatch run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Successful captures.
    pub captured: usize,
    /// Failed captures.
    pub capture_failed: usize,
    /// Images accepted by the messaging client.
    pub delivered: usize,
    /// Images the messaging client rejected.
    pub delivery_failed: usize,
    /// `(recipient, error)` for every failed capture or delivery.
    pub errors: Vec<(String, String)>,
}

impl DispatchReport {
    /// Whether every capture and delivery succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record_capture_failure(&mut self, recipient: &str, result: &CaptureResult) {
        self.capture_failed += 1;
        let message = result
            .error()
            .map_or_else(|| "unknown error".to_string(), ToString::to_string);
        self.errors.push((recipient.to_string(), message));
    }

    async fn deliver<C: MessagingClient>(
        &mut self,
        client: &C,
        recipient: &str,
        image: &[u8],
        caption: &str,
    ) {
        match client.send_image(recipient, image, caption).await {
            Ok(message_id) => {
                log::debug!("📨 Delivered to {} (message {})", recipient, message_id);
                self.delivered += 1;
            }
            Err(e) => {
                log::warn!("❌ {}", e);
                self.delivery_failed += 1;
                self.errors.push((recipient.to_string(), e.to_string()));
            }
        }
    }
}

/// Capture one image per recipient through the pool and deliver each.
///
/// Recipients with a view override get that sub-view of the document; the
/// others share the job's own view (and its pooled session). `None` for
/// `max_parallel` uses the pool's configured value.
pub async fn dispatch_pooled<C: MessagingClient>(
    orchestrator: &CaptureOrchestrator,
    job: &ScheduleJob,
    client: &C,
    max_parallel: Option<usize>,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    if job.recipients.is_empty() {
        log::debug!("Job {} has no recipients, skipping", job.name);
        return report;
    }

    log::info!(
        "🚀 Dispatching {} to {} recipient(s) (pooled)",
        job.name,
        job.recipients.len()
    );

    let requests = job
        .recipients
        .iter()
        .map(|r| job.request(format!("{}:{}", job.name, r.chat_id), job.document_for(r)))
        .collect();
    let max_parallel =
        max_parallel.unwrap_or_else(|| orchestrator.pool().config().max_parallel);
    let results = orchestrator.capture_all(requests, max_parallel).await;

    for (recipient, result) in job.recipients.iter().zip(&results) {
        match result.image() {
            Some(image) => {
                report.captured += 1;
                report
                    .deliver(client, &recipient.chat_id, image, &job.caption)
                    .await;
            }
            None => report.record_capture_failure(&recipient.chat_id, result),
        }
    }

    log::info!("✅ Job {} dispatched: {:?}", job.name, report);
    report
}

/// Capture the job's document once, with retry, and send it to everyone.
///
/// If the capture fails after all attempts the error is logged and nothing
/// is sent this cycle. `None` for `max_retries` uses the pool's configured
/// value.
pub async fn dispatch_single<C: MessagingClient>(
    orchestrator: &CaptureOrchestrator,
    job: &ScheduleJob,
    client: &C,
    max_retries: Option<u32>,
) -> DispatchReport {
    let mut report = DispatchReport::default();
    if job.recipients.is_empty() {
        log::debug!("Job {} has no recipients, skipping", job.name);
        return report;
    }

    log::info!(
        "🚀 Dispatching {} to {} recipient(s) (single capture)",
        job.name,
        job.recipients.len()
    );

    let request = job.request(job.name.clone(), job.document.clone());
    let result = match max_retries {
        Some(max_retries) => orchestrator.capture_with_retry(request, max_retries).await,
        None => orchestrator.capture_one(request).await,
    };

    let Some(image) = result.image() else {
        log::error!(
            "❌ Job {} capture failed, skipping delivery this cycle: {}",
            job.name,
            result
                .error()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string)
        );
        report.record_capture_failure(&job.name, &result);
        return report;
    };
    report.captured = 1;

    for recipient in &job.recipients {
        report
            .deliver(client, &recipient.chat_id, image, &job.caption)
            .await;
    }

    log::info!("✅ Job {} dispatched: {:?}", job.name, report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_view_override() {
        let doc = DocumentRef::parse("https://sheets.example.com/d/a/edit#gid=0").unwrap();
        let job = ScheduleJob::new("daily", doc.clone())
            .with_recipient(Recipient::new("100"))
            .with_recipient(Recipient::new("200").with_view("7"));

        assert_eq!(job.document_for(&job.recipients[0]), doc);
        assert_eq!(job.document_for(&job.recipients[1]).view().as_deref(), Some("7"));
        assert_eq!(job.caption, "daily");
    }

    #[test]
    fn test_report_clean() {
        let mut report = DispatchReport::default();
        assert!(report.is_clean());
        report.errors.push(("100".into(), "boom".into()));
        assert!(!report.is_clean());
    }
}

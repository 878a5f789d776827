//! Headless Chrome rendering engine.
//!
//! [`ChromeEngine`] owns one Chrome process. Every session it opens is a
//! separate tab ([`ChromeSession`]), so pooled documents stay loaded
//! side by side in the same process.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetcast::ChromeEngine;
//!
//! // Auto-detect Chrome installation
//! let engine = ChromeEngine::with_defaults();
//!
//! // Or specify custom path
//! let engine = ChromeEngine::with_path("/usr/bin/google-chrome".to_string());
//!
//! engine.start()?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions, Tab};

use super::RenderEngine;
use crate::document::{DocumentRef, Viewport};
use crate::error::{CaptureError, Result};
use crate::service::CaptureTarget;
use crate::traits::RenderSession;

/// Default wait applied to navigation and element lookups inside a tab.
const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the CDP connection may stay silent before `headless_chrome`
/// declares the browser dead. Pooled tabs sit idle for minutes.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

type LaunchOptionsFn = Box<dyn Fn() -> Result<LaunchOptions<'static>> + Send + Sync>;

/// Engine backed by a single headless Chrome process.
///
/// The process is launched by [`start`](Self::start) and torn down by
/// [`stop`](Self::stop) (or when the engine is dropped). Until started,
/// [`open`](RenderEngine::open) fails with
/// [`CaptureError::SessionUnavailable`].
///
/// # Thread Safety
///
/// This engine is `Send + Sync`; the browser handle is behind a mutex that
/// is only held long enough to clone it.
pub struct ChromeEngine {
    /// Function that generates launch options when the process starts.
    launch_options_fn: LaunchOptionsFn,

    /// Running browser, if started.
    browser: Mutex<Option<Browser>>,

    /// Wait applied to navigation and element lookups in every tab.
    page_timeout: Duration,

    /// Source of session ids.
    next_id: AtomicU64,
}

impl ChromeEngine {
    /// Create engine with custom launch options function.
    pub fn new<F>(launch_options_fn: F) -> Self
    where
        F: Fn() -> Result<LaunchOptions<'static>> + Send + Sync + 'static,
    {
        Self {
            launch_options_fn: Box::new(launch_options_fn),
            browser: Mutex::new(None),
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            next_id: AtomicU64::new(1),
        }
    }

    /// Create engine with auto-detected Chrome path.
    ///
    /// The `headless_chrome` crate searches common installation paths on
    /// Linux, macOS, and Windows.
    pub fn with_defaults() -> Self {
        log::debug!("🔧 Creating ChromeEngine with auto-detect");
        Self::new(|| {
            create_chrome_options(None, Viewport::default())
                .map_err(|e| CaptureError::Configuration(e.to_string()))
        })
    }

    /// Create engine with custom Chrome binary path.
    pub fn with_path(chrome_path: String) -> Self {
        log::debug!("🔧 Creating ChromeEngine with custom path: {}", chrome_path);
        Self::new(move || {
            create_chrome_options(Some(&chrome_path), Viewport::default())
                .map_err(|e| CaptureError::Configuration(e.to_string()))
        })
    }

    /// Set the wait applied to navigation and element lookups.
    ///
    /// The pool enforces its own `load_timeout` on top; keep this equal or
    /// shorter so blocking threads are released promptly.
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Launch the Chrome process. No-op if already running.
    ///
    /// Blocking; call from `spawn_blocking` in async code.
    ///
    /// # Errors
    ///
    /// * [`CaptureError::Configuration`] if launch options could not be built.
    /// * [`CaptureError::SessionUnavailable`] if Chrome failed to launch.
    pub fn start(&self) -> Result<()> {
        let mut browser = self.browser.lock().unwrap_or_else(PoisonError::into_inner);
        if browser.is_some() {
            log::debug!("Chrome already running");
            return Ok(());
        }

        let options = (self.launch_options_fn)()?;

        log::debug!("🚀 Launching Chrome browser...");
        let launched = Browser::new(options).map_err(|e| {
            log::error!("❌ Chrome launch failed: {}", e);
            CaptureError::SessionUnavailable(format!("Chrome launch failed: {}", e))
        })?;

        log::info!("✅ Chrome browser launched");
        *browser = Some(launched);
        Ok(())
    }

    /// Shut down the Chrome process. Open sessions become unusable.
    pub fn stop(&self) {
        let stopped = self
            .browser
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if stopped.is_some() {
            log::info!("🛑 Chrome browser stopped");
        }
    }

    fn browser(&self) -> Option<Browser> {
        self.browser
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RenderEngine for ChromeEngine {
    fn open(&self, viewport: Viewport) -> Result<Arc<dyn RenderSession>> {
        viewport.validate()?;

        let browser = self.browser().ok_or_else(|| {
            CaptureError::SessionUnavailable("Chrome engine not started".to_string())
        })?;

        let tab = browser.new_tab().map_err(|e| {
            log::error!("❌ Failed to open Chrome tab: {}", e);
            CaptureError::TransientNetwork(format!("Failed to open tab: {}", e))
        })?;
        tab.set_default_timeout(self.page_timeout);

        // Not fatal: capture still works at the launch size.
        if let Err(e) = tab.set_bounds(Bounds::Normal {
            left: None,
            top: None,
            width: Some(f64::from(viewport.width)),
            height: Some(f64::from(viewport.height)),
        }) {
            log::warn!("⚠️ Failed to resize tab to {}: {}", viewport, e);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("🆕 Opened Chrome tab for session {} ({})", id, viewport);

        Ok(Arc::new(ChromeSession {
            id,
            tab,
            selector_timeout: self.page_timeout,
        }))
    }

    fn is_ready(&self) -> bool {
        self.browser
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// One Chrome tab holding a loaded document.
pub struct ChromeSession {
    id: u64,
    tab: Arc<Tab>,
    selector_timeout: Duration,
}

impl ChromeSession {
    /// Borrow the underlying tab.
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    fn wait_loaded(&self) -> Result<()> {
        self.tab
            .wait_until_navigated()
            .map(|_| ())
            .map_err(|e| CaptureError::LoadTimeout(e.to_string()))
    }
}

impl RenderSession for ChromeSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn load(&self, url: &str) -> Result<()> {
        log::trace!("Session {} loading {}", self.id, url);
        self.tab
            .navigate_to(url)
            .map_err(|e| CaptureError::TransientNetwork(format!("{}: {}", url, e)))?;
        self.wait_loaded()
    }

    fn switch_view(&self, url: &str) -> Result<()> {
        let current = self.tab.get_url();
        let target = DocumentRef::parse(url)?;

        // Same page, different fragment: let the document route itself
        // instead of paying for a full navigation.
        match target.url().fragment() {
            Some(fragment) if target.same_page_as(&current) => {
                log::trace!("Session {} switching view to #{}", self.id, fragment);
                let script = format!("window.location.hash = {}", js_string_literal(fragment));
                self.tab
                    .evaluate(&script, false)
                    .map(|_| ())
                    .map_err(|e| CaptureError::TransientNetwork(e.to_string()))
            }
            _ => self.load(url),
        }
    }

    fn reload(&self) -> Result<()> {
        log::trace!("Session {} reloading", self.id);
        self.tab
            .reload(false, None)
            .map_err(|e| CaptureError::TransientNetwork(e.to_string()))?;
        self.wait_loaded()
    }

    fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>> {
        let png = Page::CaptureScreenshotFormatOption::Png;

        let shot = match target {
            CaptureTarget::FullViewport => self.tab.capture_screenshot(png, None, None, true),
            CaptureTarget::Region {
                x,
                y,
                width,
                height,
            } => {
                let clip = Page::Viewport {
                    x: f64::from(*x),
                    y: f64::from(*y),
                    width: f64::from(*width),
                    height: f64::from(*height),
                    scale: 1.0,
                };
                self.tab.capture_screenshot(png, None, Some(clip), true)
            }
            CaptureTarget::Selector(selector) => {
                let element = self
                    .tab
                    .wait_for_element_with_custom_timeout(selector, self.selector_timeout)
                    .map_err(|e| {
                        log::debug!("Selector '{}' not found: {}", selector, e);
                        CaptureError::SelectorNotFound(selector.clone())
                    })?;
                element.capture_screenshot(png)
            }
        };

        shot.map_err(|e| CaptureError::CaptureFailed(e.to_string()))
    }

    fn close(&self) -> Result<()> {
        self.tab
            .close(true)
            .map(|_| ())
            .map_err(|e| CaptureError::CaptureFailed(format!("Failed to close tab: {}", e)))
    }
}

/// Quote `raw` as a single-quoted JavaScript string.
fn js_string_literal(raw: &str) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('\'');
    for ch in raw.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

/// Create Chrome launch options with optional custom path.
///
/// `window_size` sets the initial window; individual sessions resize their
/// own tab to the requested viewport.
///
/// # Chrome Flags Applied
///
/// ## Memory and Performance
/// - `--disable-dev-shm-usage` - Use /tmp instead of /dev/shm (container-friendly)
/// - `--disable-crash-reporter`
///
/// ## Rendering
/// - `--hide-scrollbars` - Keep scrollbars out of snapshots
/// - `--force-device-scale-factor=1` - Image pixels match CSS pixels
/// - `--disable-gpu-compositing`
/// - `--disable-software-rasterizer`
///
/// ## Disabled Features
/// - `--disable-extensions`
/// - `--disable-sync`
/// - `--disable-default-apps`
///
/// ## Stability
/// - `--disable-background-timer-throttling`
/// - `--disable-backgrounding-occluded-windows`
/// - `--disable-renderer-backgrounding`
/// - `--disable-hang-monitor`
/// - `--disable-ipc-flooding-protection`
pub fn create_chrome_options(
    chrome_path: Option<&str>,
    window_size: Viewport,
) -> std::result::Result<LaunchOptions<'static>, Box<dyn std::error::Error + Send + Sync>> {
    match chrome_path {
        Some(path) => log::debug!("🔧 Creating Chrome options with custom path: {}", path),
        None => log::debug!("🔧 Creating Chrome options (auto-detect browser)"),
    }

    let mut builder = LaunchOptions::default_builder();

    if let Some(path) = chrome_path {
        builder.path(Some(path.to_string().into()));
    }

    builder
        .headless(true)
        .sandbox(false) // required in containers
        .window_size(Some((window_size.width, window_size.height)))
        .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
        .disable_default_args(true)
        .args(vec![
            // ===== Memory and Performance =====
            "--disable-dev-shm-usage".as_ref(),
            "--disable-crash-reporter".as_ref(),
            // ===== Rendering =====
            "--hide-scrollbars".as_ref(),
            "--force-device-scale-factor=1".as_ref(),
            "--disable-gpu-compositing".as_ref(),
            "--disable-software-rasterizer".as_ref(),
            // ===== Disabled Features =====
            "--disable-extensions".as_ref(),
            "--disable-sync".as_ref(),
            "--disable-default-apps".as_ref(),
            // ===== Stability =====
            "--disable-background-timer-throttling".as_ref(),
            "--disable-backgrounding-occluded-windows".as_ref(),
            "--disable-renderer-backgrounding".as_ref(),
            "--disable-hang-monitor".as_ref(),
            "--disable-ipc-flooding-protection".as_ref(),
        ])
        .build()
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            let path_msg = chrome_path.unwrap_or("auto-detect");
            log::error!(
                "❌ Failed to build Chrome launch options (path: {}): {}",
                path_msg,
                e
            );
            e.into()
        })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Launch options build without touching a Chrome binary.
    #[test]
    fn test_create_chrome_options() {
        let result = create_chrome_options(None, Viewport::default());
        assert!(
            result.is_ok(),
            "Auto-detect Chrome options should build successfully: {:?}",
            result.err()
        );

        let result = create_chrome_options(Some("/custom/chrome/path"), Viewport::default());
        assert!(
            result.is_ok(),
            "Custom path Chrome options should build successfully: {:?}",
            result.err()
        );
    }

    /// An engine that was never started refuses to open sessions.
    #[test]
    fn test_unstarted_engine_is_unavailable() {
        let engine = ChromeEngine::with_path("/custom/chrome/path".to_string());

        assert!(!engine.is_ready());
        match engine.open(Viewport::default()) {
            Err(CaptureError::SessionUnavailable(msg)) => {
                assert!(msg.contains("not started"), "unexpected message: {}", msg);
            }
            Err(other) => panic!("Expected SessionUnavailable, got {:?}", other),
            Ok(_) => panic!("Expected SessionUnavailable, got a session"),
        }

        // Stopping an engine that never ran is harmless
        engine.stop();
    }

    #[test]
    fn test_open_rejects_empty_viewport() {
        let engine = ChromeEngine::with_defaults();
        let result = engine.open(Viewport {
            width: 0,
            height: 600,
        });
        assert!(matches!(result, Err(CaptureError::InvalidRequest(_))));
    }

    #[test]
    fn test_js_string_literal_escapes_quotes() {
        assert_eq!(js_string_literal("gid=0"), "'gid=0'");
        assert_eq!(js_string_literal("a'b\\c"), "'a\\'b\\\\c'");
    }
}

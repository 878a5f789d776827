//! Document references and viewport sizes.
//!
//! A [`DocumentRef`] identifies one view of a spreadsheet-like web document.
//! Several views of the same document share a *base key*, which is what the
//! [`SessionPool`](crate::SessionPool) pools sessions by:
//!
//! ```text
//! https://sheets.example.com/d/abc/edit#gid=0      ─┐
//! https://sheets.example.com/d/abc/edit#gid=1712   ─┼─► base key
//! https://sheets.example.com/d/abc/edit?gid=42     ─┘   https://sheets.example.com/d/abc/edit
//! ```
//!
//! The sub-view is read from the `gid` fragment parameter, falling back to the
//! `gid` query parameter.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{CaptureError, Result};

/// Name of the parameter that selects a sub-view (sheet tab).
const VIEW_PARAM: &str = "gid";

/// A parsed, absolute reference to a document view.
///
/// # Example
///
/// ```rust
/// use sheetcast::DocumentRef;
///
/// let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit#gid=7").unwrap();
/// assert_eq!(doc.base_key(), "https://sheets.example.com/d/abc/edit");
/// assert_eq!(doc.view().as_deref(), Some("7"));
///
/// let other = doc.with_view("9");
/// assert_eq!(other.base_key(), doc.base_key());
/// assert_eq!(other.as_str(), "https://sheets.example.com/d/abc/edit#gid=9");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    url: Url,
}

impl DocumentRef {
    /// Parse and validate a document reference.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidRequest`] for empty input, relative
    /// URLs, and URLs without a hierarchical base (`data:`, `mailto:`, ...).
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            log::debug!("Document validation failed: empty URL");
            return Err(CaptureError::InvalidRequest("URL is required".to_string()));
        }

        let url = Url::parse(trimmed).map_err(|e| {
            log::debug!("Document validation failed for '{}': {}", trimmed, e);
            CaptureError::InvalidRequest(format!("{}: {}", trimmed, e))
        })?;

        if url.cannot_be_a_base() || url.host_str().is_none_or(str::is_empty) {
            log::debug!("Document validation failed for '{}': no host", trimmed);
            return Err(CaptureError::InvalidRequest(format!(
                "{}: URL has no host",
                trimmed
            )));
        }

        log::trace!("Document validated: {}", url);
        Ok(Self { url })
    }

    /// The full reference, including query and fragment.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Borrow the underlying URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The reference without its fragment and without the view parameter.
    ///
    /// Two references with the same base key address the same underlying
    /// document and can share one pooled session.
    pub fn base_key(&self) -> String {
        let mut base = self.url.clone();
        base.set_fragment(None);
        strip_view_query(&mut base);
        base.into()
    }

    /// The sub-view identifier, if any.
    pub fn view(&self) -> Option<String> {
        self.url
            .fragment()
            .and_then(view_in_fragment)
            .or_else(|| {
                self.url
                    .query_pairs()
                    .find(|(k, _)| k == VIEW_PARAM)
                    .map(|(_, v)| v.into_owned())
            })
    }

    /// The same document pointed at another sub-view.
    ///
    /// Any view parameter in the query is dropped and the view is carried in
    /// the fragment, so switching between views never needs a full
    /// navigation.
    pub fn with_view(&self, view: &str) -> Self {
        let mut url = self.url.clone();
        strip_view_query(&mut url);
        url.set_fragment(Some(&format!("{}={}", VIEW_PARAM, view)));
        Self { url }
    }

    /// Whether `other` differs from `self` only in its fragment.
    pub(crate) fn same_page_as(&self, other: &str) -> bool {
        match Url::parse(other) {
            Ok(mut other) => {
                other.set_fragment(None);
                let mut this = self.url.clone();
                this.set_fragment(None);
                this == other
            }
            Err(_) => false,
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl FromStr for DocumentRef {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn view_in_fragment(fragment: &str) -> Option<String> {
    fragment
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == VIEW_PARAM)
        .map(|(_, v)| v.to_string())
}

fn strip_view_query(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != VIEW_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

// ============================================================================
// Viewport
// ============================================================================

/// Rendering surface size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

impl Viewport {
    /// Create a validated viewport.
    ///
    /// ```rust
    /// use sheetcast::Viewport;
    ///
    /// assert!(Viewport::new(1280, 720).is_ok());
    /// assert!(Viewport::new(0, 720).is_err());
    /// ```
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let viewport = Self { width, height };
        viewport.validate()?;
        Ok(viewport)
    }

    /// Check that both dimensions are positive.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(CaptureError::InvalidRequest(
                "Viewport width must be positive".to_string(),
            ));
        }
        if self.height == 0 {
            return Err(CaptureError::InvalidRequest(
                "Viewport height must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Viewport {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        let (width, height) = s.split_once(['x', 'X']).ok_or_else(|| {
            CaptureError::InvalidRequest(
                "Invalid viewport format: expected WIDTHxHEIGHT (e.g., 1440x900)".to_string(),
            )
        })?;

        let width: u32 = width
            .trim()
            .parse()
            .map_err(|_| CaptureError::InvalidRequest(format!("Invalid width: {}", width)))?;
        let height: u32 = height
            .trim()
            .parse()
            .map_err(|_| CaptureError::InvalidRequest(format!("Invalid height: {}", height)))?;

        Self::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_key_strips_fragment_and_view_query() {
        let a = DocumentRef::parse("https://sheets.example.com/d/abc/edit#gid=0").unwrap();
        let b = DocumentRef::parse("https://sheets.example.com/d/abc/edit?gid=12").unwrap();
        let c = DocumentRef::parse("https://sheets.example.com/d/abc/edit?usp=sharing&gid=5#gid=5")
            .unwrap();

        assert_eq!(a.base_key(), "https://sheets.example.com/d/abc/edit");
        assert_eq!(b.base_key(), a.base_key());
        assert_eq!(
            c.base_key(),
            "https://sheets.example.com/d/abc/edit?usp=sharing"
        );
    }

    #[test]
    fn test_view_prefers_fragment_over_query() {
        let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit?gid=1#gid=2").unwrap();
        assert_eq!(doc.view().as_deref(), Some("2"));

        let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit?gid=1").unwrap();
        assert_eq!(doc.view().as_deref(), Some("1"));

        let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit#range=A1&gid=3")
            .unwrap();
        assert_eq!(doc.view().as_deref(), Some("3"));

        let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit").unwrap();
        assert_eq!(doc.view(), None);
    }

    #[test]
    fn test_with_view_moves_view_into_fragment() {
        let doc = DocumentRef::parse("https://sheets.example.com/d/abc/edit?gid=1").unwrap();
        let switched = doc.with_view("99");

        assert_eq!(
            switched.as_str(),
            "https://sheets.example.com/d/abc/edit#gid=99"
        );
        assert_eq!(switched.view().as_deref(), Some("99"));
        assert!(switched.same_page_as("https://sheets.example.com/d/abc/edit#gid=4"));
        assert!(!switched.same_page_as("https://sheets.example.com/d/other/edit#gid=4"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        for raw in ["", "   ", "/d/abc/edit", "not a url", "mailto:someone@example.com"] {
            let result = DocumentRef::parse(raw);
            assert!(
                matches!(result, Err(CaptureError::InvalidRequest(_))),
                "expected InvalidRequest for {:?}, got {:?}",
                raw,
                result
            );
        }
    }

    #[test]
    fn test_viewport_parse() {
        let viewport: Viewport = "1280x720".parse().unwrap();
        assert_eq!(viewport, Viewport { width: 1280, height: 720 });
        assert_eq!(viewport.to_string(), "1280x720");

        assert!("1280".parse::<Viewport>().is_err());
        assert!("0x720".parse::<Viewport>().is_err());
        assert!("1280x".parse::<Viewport>().is_err());
        assert_eq!(Viewport::default(), Viewport { width: 1440, height: 900 });
    }
}

//! Pool statistics for monitoring.
//!
//! [`PoolStats`] is a snapshot of the session pool at one point in time.
//!
//! # Example
//!
//! ```rust,ignore
//! let stats = pool.stats();
//! println!("{} live sessions: {:?}", stats.live_sessions, stats.keys);
//! ```

/// Snapshot of pool statistics at a point in time.
///
/// | Field | Description |
/// |-------|-------------|
/// | `live_sessions` | Sessions currently loaded (borrowed or idle) |
/// | `keys` | Base keys of those sessions, sorted |
///
/// # Example
///
/// ```rust
/// use sheetcast::PoolStats;
///
/// let stats = PoolStats {
///     live_sessions: 1,
///     keys: vec!["https://sheets.example.com/d/abc/edit".to_string()],
/// };
/// assert!(stats.contains("https://sheets.example.com/d/abc/edit"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of live sessions.
    ///
    /// Sessions still being opened are not counted.
    pub live_sessions: usize,

    /// Base keys of the live sessions, in ascending order when produced by
    /// the pool.
    pub keys: Vec<String>,
}

impl PoolStats {
    pub fn is_empty(&self) -> bool {
        self.live_sessions == 0
    }

    /// Whether a session for `base_key` is pooled.
    pub fn contains(&self, base_key: &str) -> bool {
        self.keys.iter().any(|k| k == base_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        let stats = PoolStats::default();
        assert!(stats.is_empty());
        assert!(!stats.contains("anything"));
    }

    #[test]
    fn test_contains_with_unsorted_keys() {
        let stats = PoolStats {
            live_sessions: 3,
            keys: vec!["c".into(), "a".into(), "b".into()],
        };
        assert!(stats.contains("a"));
        assert!(stats.contains("c"));
        assert!(!stats.contains("d"));
    }

    #[test]
    fn test_contains_uses_sorted_keys() {
        let stats = PoolStats {
            live_sessions: 3,
            keys: vec!["a".into(), "b".into(), "c".into()],
        };
        assert!(stats.contains("b"));
        assert!(!stats.contains("d"));
    }
}

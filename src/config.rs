//! Configuration for session pool behavior and capture limits.
//!
//! This module provides [`SessionPoolConfig`] and [`SessionPoolConfigBuilder`]
//! for configuring the concurrency ceiling, idle eviction, and the time bounds
//! applied to every engine call.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use sheetcast::SessionPoolConfigBuilder;
//!
//! let config = SessionPoolConfigBuilder::new()
//!     .max_parallel(3)
//!     .idle_timeout(Duration::from_secs(600))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(config.max_parallel, 3);
//! assert_eq!(config.idle_timeout, Duration::from_secs(600));
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, configuration can be loaded
//! from environment variables and an optional `app.env` file:
//!
//! ```rust,ignore
//! use sheetcast::config::env::from_env;
//!
//! let config = from_env()?;
//! ```
//!
//! See [`mod@env`] module for available environment variables.

use std::time::Duration;

/// Idle timeouts below this multiple of the reap interval are accepted but logged.
const RECOMMENDED_IDLE_TO_REAP_RATIO: u32 = 5;

/// Configuration for session pool behavior and capture limits.
///
/// Use [`SessionPoolConfigBuilder`] for validation and convenience.
///
/// # Fields Overview
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `max_parallel` | 5 | Captures in flight per batch chunk |
/// | `idle_timeout` | 300s | Idle time before a session is evicted |
/// | `reap_interval` | 60s | Period of the idle reaper |
/// | `load_timeout` | 30s | Bound on open/load/navigation |
/// | `capture_timeout` | 30s | Bound on a single snapshot |
/// | `destroy_timeout` | 5s | Bound on closing one session |
/// | `max_retries` | 3 | Attempts in single-capture mode |
/// | `retry_base_delay` | 2s | Linear backoff base |
/// | `refresh_on_view_switch` | false | Reload after a sub-view switch |
///
/// # Example
///
/// ```rust
/// use sheetcast::SessionPoolConfig;
///
/// let config = SessionPoolConfig::default();
/// assert_eq!(config.max_parallel, 5);
/// assert!(!config.refresh_on_view_switch);
/// ```
#[derive(Debug, Clone)]
pub struct SessionPoolConfig {
    /// Maximum number of captures run concurrently within one batch chunk.
    ///
    /// # Default
    ///
    /// 5
    ///
    /// # Considerations
    ///
    /// - Each in-flight capture holds one Chrome tab busy
    /// - Chunks are sequential, so a single slow document delays the next chunk
    pub max_parallel: usize,

    /// How long a pooled session may sit unused before the reaper closes it.
    ///
    /// Must be strictly greater than `reap_interval`.
    ///
    /// # Default
    ///
    /// 5 minutes
    pub idle_timeout: Duration,

    /// Interval between idle reaper scans.
    ///
    /// # Default
    ///
    /// 60 seconds
    pub reap_interval: Duration,

    /// Upper bound on opening a session, loading a document, switching
    /// sub-views, or reloading.
    ///
    /// Exceeding it yields [`CaptureError::LoadTimeout`](crate::CaptureError::LoadTimeout).
    ///
    /// # Default
    ///
    /// 30 seconds
    pub load_timeout: Duration,

    /// Upper bound on a single snapshot command.
    ///
    /// # Default
    ///
    /// 30 seconds
    pub capture_timeout: Duration,

    /// Upper bound on closing one session during eviction or shutdown.
    ///
    /// # Default
    ///
    /// 5 seconds
    pub destroy_timeout: Duration,

    /// Number of attempts made by single-capture mode.
    ///
    /// # Default
    ///
    /// 3 attempts
    pub max_retries: u32,

    /// Base delay for linear backoff; attempt `n` waits `n * retry_base_delay`.
    ///
    /// # Default
    ///
    /// 2 seconds
    pub retry_base_delay: Duration,

    /// Also reload a pooled session after switching it to another sub-view.
    ///
    /// With the default (`false`), a repeat capture of the same view reloads
    /// while a sub-view switch only navigates.
    ///
    /// # Default
    ///
    /// false
    pub refresh_on_view_switch: bool,
}

impl Default for SessionPoolConfig {
    /// Production-ready default configuration.
    ///
    /// ```rust
    /// use sheetcast::SessionPoolConfig;
    /// use std::time::Duration;
    ///
    /// let config = SessionPoolConfig::default();
    ///
    /// assert_eq!(config.max_parallel, 5);
    /// assert_eq!(config.idle_timeout, Duration::from_secs(300));
    /// assert_eq!(config.reap_interval, Duration::from_secs(60));
    /// assert_eq!(config.max_retries, 3);
    /// ```
    fn default() -> Self {
        Self {
            max_parallel: 5,
            idle_timeout: Duration::from_secs(300), // 5 minutes
            reap_interval: Duration::from_secs(60),
            load_timeout: Duration::from_secs(30),
            capture_timeout: Duration::from_secs(30),
            destroy_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(2000),
            refresh_on_view_switch: false,
        }
    }
}

/// Builder for [`SessionPoolConfig`] with validation.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use sheetcast::SessionPoolConfigBuilder;
///
/// let config = SessionPoolConfigBuilder::new()
///     .max_parallel(2)
///     .reap_interval(Duration::from_secs(30))
///     .idle_timeout(Duration::from_secs(300))
///     .refresh_on_view_switch(true)
///     .build()
///     .expect("Invalid configuration");
/// ```
///
/// # Validation
///
/// The [`build()`](Self::build) method validates:
/// - `max_parallel` must be greater than 0
/// - `reap_interval` must be greater than 0
/// - `idle_timeout` must be greater than `reap_interval`
/// - `load_timeout` and `capture_timeout` must be greater than 0
/// - `max_retries` must be greater than 0
pub struct SessionPoolConfigBuilder {
    config: SessionPoolConfig,
}

impl SessionPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: SessionPoolConfig::default(),
        }
    }

    /// Set the concurrency ceiling for batch captures (must be > 0).
    ///
    /// # Example
    ///
    /// ```rust
    /// use sheetcast::SessionPoolConfigBuilder;
    ///
    /// let config = SessionPoolConfigBuilder::new()
    ///     .max_parallel(10)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.max_parallel, 10);
    /// ```
    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.config.max_parallel = max_parallel;
        self
    }

    /// Set the idle threshold after which pooled sessions are evicted.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Set the idle reaper period.
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.config.reap_interval = interval;
        self
    }

    /// Set the bound on open/load/navigation.
    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.config.load_timeout = timeout;
        self
    }

    /// Set the bound on a single snapshot.
    pub fn capture_timeout(mut self, timeout: Duration) -> Self {
        self.config.capture_timeout = timeout;
        self
    }

    /// Set the bound on closing one session.
    pub fn destroy_timeout(mut self, timeout: Duration) -> Self {
        self.config.destroy_timeout = timeout;
        self
    }

    /// Set the attempt count for single-capture mode.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use sheetcast::SessionPoolConfigBuilder;
    ///
    /// let config = SessionPoolConfigBuilder::new()
    ///     .max_retries(5)
    ///     .retry_base_delay(Duration::from_millis(500))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.max_retries, 5);
    /// ```
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the linear backoff base.
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry_base_delay = delay;
        self
    }

    /// Reload pooled sessions after a sub-view switch as well.
    pub fn refresh_on_view_switch(mut self, enabled: bool) -> Self {
        self.config.refresh_on_view_switch = enabled;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use sheetcast::SessionPoolConfigBuilder;
    ///
    /// // Invalid: idle timeout must exceed the reap interval
    /// let config = SessionPoolConfigBuilder::new()
    ///     .reap_interval(Duration::from_secs(60))
    ///     .idle_timeout(Duration::from_secs(60))
    ///     .build();
    /// assert!(config.is_err());
    /// ```
    pub fn build(self) -> std::result::Result<SessionPoolConfig, String> {
        let config = self.config;

        if config.max_parallel == 0 {
            return Err("max_parallel must be greater than 0".to_string());
        }

        if config.reap_interval.is_zero() {
            return Err("reap_interval must be greater than 0".to_string());
        }

        // Sessions would be evicted on every scan, defeating reuse
        if config.idle_timeout <= config.reap_interval {
            return Err(format!(
                "idle_timeout ({:?}) must be greater than reap_interval ({:?})",
                config.idle_timeout, config.reap_interval
            ));
        }

        if config.load_timeout.is_zero() {
            return Err("load_timeout must be greater than 0".to_string());
        }

        if config.capture_timeout.is_zero() {
            return Err("capture_timeout must be greater than 0".to_string());
        }

        if config.max_retries == 0 {
            return Err("max_retries must be greater than 0".to_string());
        }

        if config.idle_timeout < config.reap_interval * RECOMMENDED_IDLE_TO_REAP_RATIO {
            log::warn!(
                "⚠️ idle_timeout ({:?}) is less than {}x reap_interval ({:?}); idle sessions may linger up to one extra interval",
                config.idle_timeout,
                RECOMMENDED_IDLE_TO_REAP_RATIO,
                config.reap_interval
            );
        }

        Ok(config)
    }
}

impl Default for SessionPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// This module is only available when the `env-config` feature is enabled.
///
/// # Environment File
///
/// Uses `dotenvy` to load variables from an `app.env` file in the current
/// directory. The file is optional.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `CAPTURE_MAX_PARALLEL` | usize | 5 | Concurrency ceiling |
/// | `SESSION_IDLE_TIMEOUT_SECONDS` | u64 | 300 | Idle threshold |
/// | `SESSION_REAP_INTERVAL_SECONDS` | u64 | 60 | Reaper period |
/// | `PAGE_LOAD_TIMEOUT_SECONDS` | u64 | 30 | Load bound |
/// | `CAPTURE_TIMEOUT_SECONDS` | u64 | 30 | Snapshot bound |
/// | `SESSION_DESTROY_TIMEOUT_SECONDS` | u64 | 5 | Close bound |
/// | `CAPTURE_MAX_RETRIES` | u32 | 3 | Single-mode attempts |
/// | `CAPTURE_RETRY_DELAY_MS` | u64 | 2000 | Backoff base |
/// | `SESSION_REFRESH_ON_VIEW_SWITCH` | bool | false | Reload after switch |
/// | `CHROME_PATH` | String | auto | Custom Chrome binary path |
///
/// # Example `app.env` File
///
/// ```text
/// # Capture pool
/// CAPTURE_MAX_PARALLEL=4
/// SESSION_IDLE_TIMEOUT_SECONDS=600
/// SESSION_REAP_INTERVAL_SECONDS=60
/// PAGE_LOAD_TIMEOUT_SECONDS=45
///
/// # Chrome Configuration (optional)
/// # CHROME_PATH=/usr/bin/google-chrome
/// ```
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::CaptureError;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from `app.env` file.
    ///
    /// Automatically called by [`from_env`].
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)` if the file was found and loaded successfully
    /// - `Err(dotenvy::Error)` if the file was not found or couldn't be parsed
    pub fn load_env_file() -> Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    /// Load configuration from environment variables.
    ///
    /// Also loads `app.env` file if present (via `dotenvy`). Unparseable
    /// values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Configuration`] if the resulting values fail
    /// validation.
    pub fn from_env() -> Result<SessionPoolConfig, CaptureError> {
        match load_env_file() {
            Ok(path) => {
                log::info!("📄 Loaded configuration from: {:?}", path);
            }
            Err(e) => {
                log::debug!(
                    "📄 No {} file found or failed to load: {} (using environment variables and defaults)",
                    ENV_FILE_NAME,
                    e
                );
            }
        }

        from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// [`from_env`] delegates here with `std::env::var`.
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use sheetcast::config::env::from_lookup;
    ///
    /// let vars = HashMap::from([("CAPTURE_MAX_PARALLEL", "2")]);
    /// let config = from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
    /// assert_eq!(config.max_parallel, 2);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<SessionPoolConfig, CaptureError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SessionPoolConfig::default();

        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        let max_parallel = lookup("CAPTURE_MAX_PARALLEL")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_parallel);

        let idle_timeout = parsed("SESSION_IDLE_TIMEOUT_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.idle_timeout);

        let reap_interval = parsed("SESSION_REAP_INTERVAL_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.reap_interval);

        let load_timeout = parsed("PAGE_LOAD_TIMEOUT_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.load_timeout);

        let capture_timeout = parsed("CAPTURE_TIMEOUT_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.capture_timeout);

        let destroy_timeout = parsed("SESSION_DESTROY_TIMEOUT_SECONDS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.destroy_timeout);

        let max_retries = lookup("CAPTURE_MAX_RETRIES")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.max_retries);

        let retry_base_delay = parsed("CAPTURE_RETRY_DELAY_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_base_delay);

        let refresh_on_view_switch = lookup("SESSION_REFRESH_ON_VIEW_SWITCH")
            .map(|s| parse_flag(&s))
            .unwrap_or(defaults.refresh_on_view_switch);

        log::info!("🔧 Loading capture pool configuration from environment:");
        log::info!("   - Max parallel: {}", max_parallel);
        log::info!(
            "   - Idle timeout: {}s ({}min)",
            idle_timeout.as_secs(),
            idle_timeout.as_secs() / 60
        );
        log::info!("   - Reap interval: {}s", reap_interval.as_secs());
        log::info!("   - Load timeout: {}s", load_timeout.as_secs());
        log::info!("   - Capture timeout: {}s", capture_timeout.as_secs());
        log::info!("   - Destroy timeout: {}s", destroy_timeout.as_secs());
        log::info!(
            "   - Retries: {} (base delay {}ms)",
            max_retries,
            retry_base_delay.as_millis()
        );
        log::info!("   - Refresh on view switch: {}", refresh_on_view_switch);

        SessionPoolConfigBuilder::new()
            .max_parallel(max_parallel)
            .idle_timeout(idle_timeout)
            .reap_interval(reap_interval)
            .load_timeout(load_timeout)
            .capture_timeout(capture_timeout)
            .destroy_timeout(destroy_timeout)
            .max_retries(max_retries)
            .retry_base_delay(retry_base_delay)
            .refresh_on_view_switch(refresh_on_view_switch)
            .build()
            .map_err(CaptureError::Configuration)
    }

    fn parse_flag(raw: &str) -> bool {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    }

    /// Get Chrome path from environment.
    ///
    /// **Note:** Call [`from_env`] or [`load_env_file`] first to ensure
    /// `app.env` is loaded if you're using a configuration file.
    pub fn chrome_path_from_env() -> Option<String> {
        std::env::var("CHROME_PATH").ok()
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::collections::HashMap;

        fn lookup_in(vars: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
            move |key: &str| vars.get(key).map(|v| v.to_string())
        }

        #[test]
        fn test_from_lookup_defaults_when_empty() {
            let config = from_lookup(|_| None).unwrap();
            assert_eq!(config.max_parallel, 5);
            assert_eq!(config.idle_timeout, Duration::from_secs(300));
            assert_eq!(config.retry_base_delay, Duration::from_millis(2000));
            assert!(!config.refresh_on_view_switch);
        }

        #[test]
        fn test_from_lookup_reads_every_variable() {
            let config = from_lookup(lookup_in(HashMap::from([
                ("CAPTURE_MAX_PARALLEL", "2"),
                ("SESSION_IDLE_TIMEOUT_SECONDS", "900"),
                ("SESSION_REAP_INTERVAL_SECONDS", "30"),
                ("PAGE_LOAD_TIMEOUT_SECONDS", "45"),
                ("CAPTURE_TIMEOUT_SECONDS", "20"),
                ("SESSION_DESTROY_TIMEOUT_SECONDS", "3"),
                ("CAPTURE_MAX_RETRIES", "4"),
                ("CAPTURE_RETRY_DELAY_MS", "250"),
                ("SESSION_REFRESH_ON_VIEW_SWITCH", "TRUE"),
            ])))
            .unwrap();

            assert_eq!(config.max_parallel, 2);
            assert_eq!(config.idle_timeout, Duration::from_secs(900));
            assert_eq!(config.reap_interval, Duration::from_secs(30));
            assert_eq!(config.load_timeout, Duration::from_secs(45));
            assert_eq!(config.capture_timeout, Duration::from_secs(20));
            assert_eq!(config.destroy_timeout, Duration::from_secs(3));
            assert_eq!(config.max_retries, 4);
            assert_eq!(config.retry_base_delay, Duration::from_millis(250));
            assert!(config.refresh_on_view_switch);
        }

        /// Garbage values fall back to defaults instead of failing startup.
        #[test]
        fn test_from_lookup_ignores_unparseable_values() {
            let config = from_lookup(lookup_in(HashMap::from([
                ("CAPTURE_MAX_PARALLEL", "many"),
                ("SESSION_REFRESH_ON_VIEW_SWITCH", "maybe"),
            ])))
            .unwrap();

            assert_eq!(config.max_parallel, 5);
            assert!(!config.refresh_on_view_switch);
        }

        #[test]
        fn test_from_lookup_rejects_invalid_combination() {
            let result = from_lookup(lookup_in(HashMap::from([
                ("SESSION_IDLE_TIMEOUT_SECONDS", "10"),
                ("SESSION_REAP_INTERVAL_SECONDS", "60"),
            ])));

            assert!(matches!(result, Err(CaptureError::Configuration(_))));
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = SessionPoolConfigBuilder::new()
            .max_parallel(2)
            .idle_timeout(Duration::from_secs(600))
            .reap_interval(Duration::from_secs(30))
            .load_timeout(Duration::from_secs(10))
            .capture_timeout(Duration::from_secs(15))
            .destroy_timeout(Duration::from_secs(2))
            .max_retries(5)
            .retry_base_delay(Duration::from_millis(100))
            .refresh_on_view_switch(true)
            .build()
            .unwrap();

        assert_eq!(config.max_parallel, 2);
        assert_eq!(config.idle_timeout.as_secs(), 600);
        assert_eq!(config.reap_interval.as_secs(), 30);
        assert_eq!(config.load_timeout.as_secs(), 10);
        assert_eq!(config.capture_timeout.as_secs(), 15);
        assert_eq!(config.destroy_timeout.as_secs(), 2);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_base_delay.as_millis(), 100);
        assert!(config.refresh_on_view_switch);
    }

    /// Verifies that the builder rejects a zero concurrency ceiling.
    #[test]
    fn test_config_validation() {
        let result = SessionPoolConfigBuilder::new().max_parallel(0).build();

        assert!(result.is_err());
        let err_msg = result.unwrap_err();
        assert!(
            err_msg.contains("max_parallel must be greater than 0"),
            "Expected validation error message, got: {}",
            err_msg
        );
    }

    /// An idle timeout at or below the reap interval would evict sessions
    /// on every scan.
    #[test]
    fn test_config_idle_timeout_must_exceed_reap_interval() {
        let result = SessionPoolConfigBuilder::new()
            .reap_interval(Duration::from_secs(60))
            .idle_timeout(Duration::from_secs(60))
            .build();

        let err_msg = result.unwrap_err();
        assert!(
            err_msg.contains("must be greater than reap_interval"),
            "Expected validation error message, got: {}",
            err_msg
        );

        // Below the recommended ratio is accepted (only logged)
        let config = SessionPoolConfigBuilder::new()
            .reap_interval(Duration::from_secs(60))
            .idle_timeout(Duration::from_secs(120))
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_config_rejects_zero_bounds() {
        assert!(
            SessionPoolConfigBuilder::new()
                .reap_interval(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(
            SessionPoolConfigBuilder::new()
                .load_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(
            SessionPoolConfigBuilder::new()
                .capture_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(SessionPoolConfigBuilder::new().max_retries(0).build().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = SessionPoolConfig::default();

        assert_eq!(config.max_parallel, 5, "Default ceiling should be 5");
        assert_eq!(
            config.idle_timeout,
            Duration::from_secs(300),
            "Default idle timeout should be 5 minutes"
        );
        assert_eq!(config.reap_interval, Duration::from_secs(60));
        assert_eq!(config.load_timeout, Duration::from_secs(30));
        assert_eq!(config.capture_timeout, Duration::from_secs(30));
        assert_eq!(config.destroy_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(2));
        assert!(!config.refresh_on_view_switch);
    }

    /// The defaults themselves must pass validation.
    #[test]
    fn test_builder_default() {
        let builder: SessionPoolConfigBuilder = Default::default();
        let config = builder.build().unwrap();

        assert_eq!(config.max_parallel, 5);
    }
}

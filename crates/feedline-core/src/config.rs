#![forbid(unsafe_code)]

//! Pipeline configuration.
//!
//! [`FeedConfig`] carries every tunable of the feed pipeline. Values come from
//! code (builder setters) or from the environment via [`FeedConfig::from_env`]:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `FEEDLINE_PAGE_SIZE` | `page_size` | 50 |
//! | `FEEDLINE_LOAD_THRESHOLD` | `load_threshold` | 10 |
//! | `FEEDLINE_OVERSCAN` | `overscan` | 4 |
//! | `FEEDLINE_RETRY_BACKOFF_MS` | `retry_backoff` | 2000 |
//! | `FEEDLINE_DEFAULT_ROW_HEIGHT` | `default_row_height` | 96 |
//! | `FEEDLINE_PLACEHOLDER_ROWS` | `placeholder_rows` | 3 |
//! | `FEEDLINE_RECONNECT_MS` | `reconnect_delay` | 3000 |
//! | `FEEDLINE_RETRY_TRANSIENT_ONLY` | `retry_transient_only` | false |
//!
//! Unparseable values fall back to the default; parsing never fails.

use std::fmt;
use std::time::Duration;

/// Tunables for one feed pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Items requested per page.
    pub page_size: usize,
    /// Rows before the end of loaded data at which the next page is requested.
    pub load_threshold: usize,
    /// Rows rendered beyond each edge of the viewport.
    pub overscan: usize,
    /// Delay before the single automatic retry of a failed page load.
    pub retry_backoff: Duration,
    /// Estimated height of a row that has not been measured yet.
    pub default_row_height: u32,
    /// Placeholder rows shown after the loaded items while more pages exist.
    pub placeholder_rows: usize,
    /// Delay before reconnecting a dropped push channel.
    pub reconnect_delay: Duration,
    /// Skip the automatic retry for failures that cannot succeed on a
    /// resend (4xx statuses, undecodable pages).
    pub retry_transient_only: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            load_threshold: 10,
            overscan: 4,
            retry_backoff: Duration::from_millis(2000),
            default_row_height: 96,
            placeholder_rows: 3,
            reconnect_delay: Duration::from_millis(3000),
            retry_transient_only: false,
        }
    }
}

impl FeedConfig {
    /// Defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `FEEDLINE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup (used by `from_env`).
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let num = |key: &str, fallback: u64| -> u64 {
            match lookup(key) {
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(v) => v,
                    Err(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(key, value = %raw, "ignoring unparseable config value");
                        fallback
                    }
                },
                None => fallback,
            }
        };
        let flag = |key: &str, fallback: bool| -> bool {
            match lookup(key).as_deref().map(str::trim) {
                Some("1" | "true") => true,
                Some("0" | "false") => false,
                Some(_raw) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(key, value = %_raw, "ignoring unparseable config value");
                    fallback
                }
                None => fallback,
            }
        };
        Self {
            page_size: num("FEEDLINE_PAGE_SIZE", defaults.page_size as u64) as usize,
            load_threshold: num("FEEDLINE_LOAD_THRESHOLD", defaults.load_threshold as u64)
                as usize,
            overscan: num("FEEDLINE_OVERSCAN", defaults.overscan as u64) as usize,
            retry_backoff: Duration::from_millis(num(
                "FEEDLINE_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )),
            default_row_height: num(
                "FEEDLINE_DEFAULT_ROW_HEIGHT",
                u64::from(defaults.default_row_height),
            )
            .min(u64::from(u32::MAX)) as u32,
            placeholder_rows: num("FEEDLINE_PLACEHOLDER_ROWS", defaults.placeholder_rows as u64)
                as usize,
            reconnect_delay: Duration::from_millis(num(
                "FEEDLINE_RECONNECT_MS",
                defaults.reconnect_delay.as_millis() as u64,
            )),
            retry_transient_only: flag(
                "FEEDLINE_RETRY_TRANSIENT_ONLY",
                defaults.retry_transient_only,
            ),
        }
    }

    /// Set the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the load threshold.
    #[must_use]
    pub fn with_load_threshold(mut self, rows: usize) -> Self {
        self.load_threshold = rows;
        self
    }

    /// Set the overscan.
    #[must_use]
    pub fn with_overscan(mut self, rows: usize) -> Self {
        self.overscan = rows;
        self
    }

    /// Set the automatic retry backoff.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the estimated row height.
    #[must_use]
    pub fn with_default_row_height(mut self, height: u32) -> Self {
        self.default_row_height = height;
        self
    }

    /// Set the number of trailing placeholder rows.
    #[must_use]
    pub fn with_placeholder_rows(mut self, rows: usize) -> Self {
        self.placeholder_rows = rows;
        self
    }

    /// Set the push reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Restrict the automatic retry to transient failures.
    #[must_use]
    pub fn with_retry_transient_only(mut self, enabled: bool) -> Self {
        self.retry_transient_only = enabled;
        self
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: "must be at least 1",
            });
        }
        if self.default_row_height == 0 {
            return Err(ConfigError::Invalid {
                field: "default_row_height",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// A configuration value outside its valid range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `field` is invalid for `reason`.
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

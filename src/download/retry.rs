//! Retry logic with exponential backoff for transient fetch failures.
//!
//! When a fetch fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - connection-level failures and timeouts
//! - [`FailureType::Forcelisted`] - HTTP statuses the policy retries (413, 429, 5xx gateway errors)
//! - [`FailureType::Permanent`] - everything else, surfaced immediately
//!
//! The [`RetryPolicy`] then decides whether another attempt is made and how
//! long to wait first.
//!
//! # Example
//!
//! ```
//! use multporn_core::download::{DownloadError, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.com/page.jpg", 503);
//! let failure_type = policy.classify(&error);
//!
//! match policy.should_retry(failure_type, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::DownloadError;
use super::constants::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_STATUS_FORCELIST, DEFAULT_TOTAL_RETRIES, MAX_RETRY_AFTER,
};

/// Classification of fetch failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Connection reset, refused, DNS failure or timeout.
    Transient,

    /// HTTP status listed in the policy's forcelist.
    Forcelisted,

    /// Failure that won't succeed regardless of retries.
    ///
    /// Examples: 404 Not Found, 403 Forbidden, invalid URL, TLS errors.
    Permanent,
}

/// Decision on whether to retry a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `total`: 5 retries after the initial attempt
/// - `backoff_factor`: 1 second
/// - `status_forcelist`: 413, 429, 500, 502, 503, 504
///
/// # Delay Calculation
///
/// ```text
/// delay(retry n) = backoff_factor * 2^(n - 1)
/// ```
///
/// With defaults, delays are 1s, 2s, 4s, 8s, 16s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries (excluding the initial attempt).
    total: u32,

    /// Base delay for the first retry.
    backoff_factor: Duration,

    /// Statuses that are retried instead of failing immediately.
    status_forcelist: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            total: DEFAULT_TOTAL_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            status_forcelist: DEFAULT_STATUS_FORCELIST.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// # Arguments
    ///
    /// * `total` - Maximum retries after the initial attempt (0 disables retrying)
    /// * `backoff_factor` - Delay before the first retry; doubles for each later retry
    /// * `status_forcelist` - HTTP statuses that are retried
    #[must_use]
    pub fn new(total: u32, backoff_factor: Duration, status_forcelist: Vec<u16>) -> Self {
        Self {
            total,
            backoff_factor,
            status_forcelist,
        }
    }

    /// Creates a policy with a custom retry count, using defaults for other settings.
    #[must_use]
    pub fn with_total(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Returns a copy of this policy with a different backoff factor.
    #[must_use]
    pub fn backoff_factor(mut self, backoff_factor: Duration) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    /// Returns the maximum number of retries.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Returns the statuses this policy retries.
    #[must_use]
    pub fn status_forcelist(&self) -> &[u16] {
        &self.status_forcelist
    }

    /// Classifies a fetch error for this policy.
    ///
    /// | Error | Type |
    /// |-------|------|
    /// | HTTP status in forcelist | Forcelisted |
    /// | Other HTTP status | Permanent |
    /// | Timeout | Transient |
    /// | Network (TLS/certificate) | Permanent |
    /// | Network (other) | Transient |
    /// | Invalid URL, unknown content type, integrity | Permanent |
    #[must_use]
    pub fn classify(&self, error: &DownloadError) -> FailureType {
        match error {
            DownloadError::HttpStatus { status, .. } => {
                if self.status_forcelist.contains(status) {
                    FailureType::Forcelisted
                } else {
                    FailureType::Permanent
                }
            }
            DownloadError::Timeout { .. } => FailureType::Transient,
            DownloadError::Network { source, .. } => {
                if is_tls_error(source) {
                    FailureType::Permanent
                } else {
                    FailureType::Transient
                }
            }
            DownloadError::InvalidUrl { .. }
            | DownloadError::UnknownContentType { .. }
            | DownloadError::Integrity { .. } => FailureType::Permanent,
        }
    }

    /// Determines whether to retry a failed fetch.
    ///
    /// # Arguments
    ///
    /// * `failure_type` - Classification of the failure
    /// * `attempt` - The attempt number that just failed (1-indexed)
    #[instrument(skip(self), fields(total = self.total))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt > self.total {
            debug!(attempt, total = self.total, "retries exhausted");
            return RetryDecision::DoNotRetry {
                reason: format!("retries ({}) exhausted", self.total),
            };
        }

        let delay = self.backoff_delay(attempt);

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Delay before retry number `retry` (1-indexed): `backoff_factor * 2^(retry - 1)`.
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let multiplier = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.backoff_factor.saturating_mul(multiplier)
    }
}

/// Checks if a reqwest error is a TLS/certificate error.
///
/// Only the source chain is inspected: the top-level message embeds the
/// request URL, which must not influence classification.
fn is_tls_error(error: &reqwest::Error) -> bool {
    let mut current = std::error::Error::source(error);
    while let Some(cause) = current {
        let message = cause.to_string().to_lowercase();
        if message.contains("certificate")
            || message.contains("tls")
            || message.contains("ssl")
            || message.contains("handshake")
        {
            return true;
        }
        current = cause.source();
    }
    false
}

/// Parses a Retry-After header value into a Duration.
///
/// Accepts delay-seconds or an HTTP-date. Negative values and dates in the
/// past yield `None`; values above one hour are capped.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(cap_retry_after(duration));
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        return datetime
            .duration_since(std::time::SystemTime::now())
            .ok()
            .map(cap_retry_after);
    }

    debug!(value = %header_value, "unparseable Retry-After value, ignoring");
    None
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        MAX_RETRY_AFTER
    } else {
        duration
    }
}

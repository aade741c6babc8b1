//! Constants for the download module (timeouts, retry defaults, on-disk naming).

use std::time::Duration;

/// Default HTTP connect timeout (5 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default HTTP read timeout (5 seconds).
pub const READ_TIMEOUT_SECS: u64 = 5;

/// Default number of retries after the initial attempt.
pub const DEFAULT_TOTAL_RETRIES: u32 = 5;

/// Default backoff factor; retry `n` waits `factor * 2^(n-1)`.
pub const DEFAULT_BACKOFF_FACTOR: Duration = Duration::from_secs(1);

/// Statuses retried by default.
pub const DEFAULT_STATUS_FORCELIST: [u16; 6] = [413, 429, 500, 502, 503, 504];

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Suffix of the zero-byte marker written for an unrecoverable item.
pub const SKIPPED_SUFFIX: &str = "_SKIPPED";

/// Default destination root for collections.
pub const DEFAULT_OUTPUT_DIR: &str = "Albums";

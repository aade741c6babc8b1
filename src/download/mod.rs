//! Download module: fetching items and keeping collection directories in sync.
//!
//! # Overview
//!
//! - [`HttpClient`] - resilient HTTP transport (timeouts, retry, User-Agent, proxies)
//! - [`LocalScanner`] - one-shot listing of a collection directory
//! - [`DownloadEngine`] - per-item orchestration with `_SKIPPED` markers
//!
//! Filenames are derived in [`filename`] so that every component agrees on
//! `{name}_{padded index}.{ext}` for albums and `{name}.{ext}` for videos.

mod client;
mod constants;
mod engine;
mod error;
pub mod filename;
mod retry;
mod scanner;

pub use client::{FetchedItem, HttpClient, Transport, TransportConfig};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_BACKOFF_FACTOR, DEFAULT_OUTPUT_DIR, DEFAULT_STATUS_FORCELIST,
    DEFAULT_TOTAL_RETRIES, MAX_RETRY_AFTER, READ_TIMEOUT_SECS, SKIPPED_SUFFIX,
};
pub use engine::{
    CollectingReporter, DEFAULT_CONCURRENCY, DownloadEngine, DownloadReport, EngineOptions,
    ItemOutcome, MAX_CONCURRENCY, ProgressEvent, ProgressReporter, SilentReporter, SkippedPolicy,
    TracingReporter,
};
pub use error::{DownloadError, EngineError};
pub use retry::{FailureType, RetryDecision, RetryPolicy, parse_retry_after};
pub use scanner::{LocalItemState, LocalScanner};

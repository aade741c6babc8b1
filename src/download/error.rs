//! Error types for the download module.
//!
//! [`DownloadError`] describes why a single item could not be fetched; the
//! orchestrator turns it into a `_SKIPPED` marker. [`EngineError`] is reserved
//! for failures that make the whole run unusable.

use std::path::PathBuf;

use thiserror::Error;

use super::engine::ItemOutcome;

/// Errors that can occur while fetching a single item.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Response carried no usable Content-Type to name the file with.
    #[error("cannot infer file extension for {url} from content type {}", content_type.as_deref().unwrap_or("<missing>"))]
    UnknownContentType {
        /// The URL that was fetched.
        url: String,
        /// The declared Content-Type, if any.
        content_type: Option<String>,
    },

    /// Body length does not match the declared Content-Length.
    #[error("incomplete body for {url}: expected {expected_bytes} bytes, got {actual_bytes}")]
    Integrity {
        /// The URL that was fetched.
        url: String,
        /// Declared size in bytes.
        expected_bytes: u64,
        /// Received size in bytes.
        actual_bytes: u64,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an unknown content type error.
    pub fn unknown_content_type(url: impl Into<String>, content_type: Option<&str>) -> Self {
        Self::UnknownContentType {
            url: url.into(),
            content_type: content_type.map(str::to_string),
        }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(url: impl Into<String>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            url: url.into(),
            expected_bytes,
            actual_bytes,
        }
    }
}

// We intentionally do NOT implement `From<reqwest::Error>` or `From<std::io::Error>`:
// every variant needs the url or path the source error does not carry.

/// Errors that abort a whole collection run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error("invalid concurrency value {value}: must be between {min} and {max}")]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
        /// Smallest accepted value.
        min: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// The destination could not be created or written.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file or directory path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled between items.
    #[error("download of {collection} cancelled after {completed} of {total} items")]
    Cancelled {
        /// Collection display name.
        collection: String,
        /// Number of items that reached a terminal state.
        completed: usize,
        /// Number of items in the collection.
        total: usize,
        /// Outcomes produced before cancellation, in index order.
        outcomes: Vec<ItemOutcome>,
    },
}

impl EngineError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

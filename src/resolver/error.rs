//! Error types for page resolution.
//!
//! Messages follow a What/Why/Fix layout: what failed, the underlying
//! reason, and a suggestion on the following line.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that can occur while resolving a site page.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The input cannot be turned into a page URL.
    #[error("invalid page URL '{input}'\n  Suggestion: {suggestion}")]
    InvalidUrl {
        /// The rejected input.
        input: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The page could not be fetched.
    #[error("failed to fetch '{url}': {source}\n  Suggestion: Check the URL and your network connection")]
    Fetch {
        /// Page URL.
        url: String,
        /// Transport failure after retries.
        #[source]
        source: DownloadError,
    },

    /// The page lacks a field every collection page carries.
    #[error("'{url}' has no {field}\n  Suggestion: {suggestion}")]
    MissingField {
        /// Page URL.
        url: String,
        /// Name of the missing field.
        field: &'static str,
        /// How to fix the issue.
        suggestion: String,
    },
}

impl ResolveError {
    /// Creates an `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(input: &str) -> Self {
        Self::InvalidUrl {
            input: input.to_string(),
            suggestion: "Pass a multporn.net page URL or a site-relative path such as /comics/name"
                .to_string(),
        }
    }

    /// Creates a `Fetch` error.
    #[must_use]
    pub fn fetch(url: &str, source: DownloadError) -> Self {
        Self::Fetch {
            url: url.to_string(),
            source,
        }
    }

    /// Creates a `MissingField` error for a page without a title.
    #[must_use]
    pub fn missing_title(url: &str) -> Self {
        Self::MissingField {
            url: url.to_string(),
            field: "title",
            suggestion: "The URL does not look like an album or video page".to_string(),
        }
    }
}

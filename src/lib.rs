//! Multporn Core Library
//!
//! This library provides the core functionality for the multporn downloader,
//! which mirrors named albums and videos from multporn.net into a local
//! directory, one file per page, resuming wherever a previous run stopped.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`collection`] - Collections, item locators and content kinds
//! - [`download`] - Resilient transport, local state scanner and the download orchestrator
//! - [`resolver`] - Collection, listing and search page extraction
//! - [`user_agent`] - Browser-plausible User-Agent generation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collection;
pub mod download;
pub mod resolver;
pub mod user_agent;

// Re-export commonly used types
pub use collection::{Collection, ContentKind, ItemLocator};
pub use download::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_CONCURRENCY, DEFAULT_STATUS_FORCELIST, DEFAULT_TOTAL_RETRIES,
    DownloadEngine, DownloadError, DownloadReport, EngineError, EngineOptions, FetchedItem,
    HttpClient, ItemOutcome, LocalItemState, LocalScanner, ProgressEvent, ProgressReporter,
    RetryPolicy, SkippedPolicy, Transport, TransportConfig,
};
pub use resolver::{
    CollectionPage, ContentFilter, ListingPage, ResolveError, SearchQuery, SearchResult,
    SearchSort, SiteClient,
};

//! Download orchestrator: brings one collection's directory up to date.
//!
//! For every item, in index order, the engine either recognises a local file
//! (`Present`), fetches and stores it (`Fetched`), or records a `_SKIPPED`
//! marker (`Failed`). Item failures never abort the run; only filesystem
//! errors and cancellation do.
//!
//! Fetches may overlap (see [`EngineOptions::concurrency`]) but outcomes and
//! progress events are always produced in ascending index order.
//!
//! # Example
//!
//! ```no_run
//! use multporn_core::download::{
//!     DownloadEngine, EngineOptions, HttpClient, TracingReporter, TransportConfig,
//! };
//! use multporn_core::{Collection, ContentKind};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let collection = Collection::new(
//!     "Between Friends",
//!     ContentKind::Album,
//!     ["https://multporn.net/sites/default/files/comics/bf/1.jpg"],
//! );
//! let engine = DownloadEngine::new(EngineOptions::default())?;
//! let client = HttpClient::new(TransportConfig::default());
//! let report = engine
//!     .download(
//!         &collection,
//!         &client,
//!         Path::new("Albums"),
//!         &TracingReporter,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("{} fetched, {} failed", report.fetched(), report.failed());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use futures_util::StreamExt;
use futures_util::stream;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::Transport;
use super::error::{DownloadError, EngineError};
use super::filename::{extension_from_content_type, skip_marker_name, temp_file_name};
use super::scanner::{LocalItemState, LocalScanner};
use crate::collection::{Collection, ContentKind, ItemLocator};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 32;

/// Default concurrency: one item at a time.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// What to do with items a previous run marked `_SKIPPED`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkippedPolicy {
    /// Treat the marker as present and never fetch the item again.
    #[default]
    Keep,
    /// Fetch the item again; the marker is removed once the fetch succeeds.
    Retry,
}

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Number of fetches allowed in flight (1..=32).
    pub concurrency: usize,
    /// Handling of `_SKIPPED` markers.
    pub skipped_policy: SkippedPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            skipped_policy: SkippedPolicy::Keep,
        }
    }
}

/// Terminal state of one item after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A file or marker was already on disk.
    Present {
        /// 0-based item index.
        index: usize,
        /// Existing file or marker.
        path: PathBuf,
    },
    /// The item was fetched and stored in this run.
    Fetched {
        /// 0-based item index.
        index: usize,
        /// Newly written file.
        path: PathBuf,
    },
    /// The item could not be fetched; a marker was written.
    Failed {
        /// 0-based item index.
        index: usize,
        /// The `_SKIPPED` marker.
        path: PathBuf,
        /// Why the fetch failed.
        reason: String,
    },
}

impl ItemOutcome {
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Present { index, .. } | Self::Fetched { index, .. } | Self::Failed { index, .. } => {
                *index
            }
        }
    }

    /// Local path standing for this item.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Present { path, .. } | Self::Fetched { path, .. } | Self::Failed { path, .. } => {
                path
            }
        }
    }
}

/// Result of a completed collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    dir: PathBuf,
    outcomes: Vec<ItemOutcome>,
}

impl DownloadReport {
    /// Destination directory of the collection.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// One outcome per item, in index order.
    #[must_use]
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    /// Local paths in index order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().map(ItemOutcome::path)
    }

    /// Number of items fetched in this run.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Fetched { .. }))
    }

    /// Number of items already on disk.
    #[must_use]
    pub fn present(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Present { .. }))
    }

    /// Number of items that failed in this run.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed { .. }))
    }

    /// True when the collection had at least one item.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.outcomes.is_empty()
    }

    #[must_use]
    pub fn into_outcomes(self) -> Vec<ItemOutcome> {
        self.outcomes
    }

    fn count(&self, predicate: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

/// Human-facing progress of a run. Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Pages `first..=last` were already on disk.
    ExistingRun {
        first: usize,
        last: usize,
        total: usize,
    },
    /// A page was fetched and stored.
    Done { page: usize, total: usize },
    /// A page could not be fetched.
    Skipped {
        page: usize,
        total: usize,
        reason: String,
    },
    /// End of the run.
    Summary { fetched: usize },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExistingRun { first, last, total } if first == last => {
                write!(f, "page {first}/{total} exists, skipping")
            }
            Self::ExistingRun { first, last, total } => {
                write!(f, "pages {first} through {last} out of {total} exist, skipping")
            }
            Self::Done { page, total } => write!(f, "page {page}/{total} done"),
            Self::Skipped {
                page,
                total,
                reason,
            } => write!(f, "page {page}/{total} skipped because {reason}"),
            Self::Summary { fetched: 0 } => f.write_str("no updates"),
            Self::Summary { fetched } => write!(f, "{fetched} new pages found"),
        }
    }
}

/// Receives progress events, in order, from a run.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, collection: &Collection, event: &ProgressEvent);
}

/// Emits progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, collection: &Collection, event: &ProgressEvent) {
        match event {
            ProgressEvent::Skipped { .. } => {
                warn!(collection = %collection.display_name(), "{event}");
            }
            _ => info!(collection = %collection.display_name(), "{event}"),
        }
    }
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _collection: &Collection, _event: &ProgressEvent) {}
}

/// Records progress events in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events received so far, rendered as messages.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(ToString::to_string).collect()
    }
}

impl ProgressReporter for CollectingReporter {
    fn report(&self, _collection: &Collection, event: &ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Contiguous run of already-present pages, 0-based inclusive.
#[derive(Debug, Clone, Copy)]
struct ExistingRun {
    start: usize,
    end: usize,
}

/// Brings collection directories up to date.
#[derive(Debug, Clone)]
pub struct DownloadEngine {
    options: EngineOptions,
}

impl DownloadEngine {
    /// Creates an engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] when the concurrency is
    /// outside `1..=32`.
    pub fn new(options: EngineOptions) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&options.concurrency) {
            return Err(EngineError::InvalidConcurrency {
                value: options.concurrency,
                min: MIN_CONCURRENCY,
                max: MAX_CONCURRENCY,
            });
        }
        Ok(Self { options })
    }

    #[must_use]
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Downloads every missing item of `collection` into
    /// `root/{sanitized name}`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the destination cannot be created,
    /// listed or written, and [`EngineError::Cancelled`] if `cancel` fires
    /// before every item has started.
    #[instrument(
        skip(self, collection, transport, root, reporter, cancel),
        fields(collection = %collection.display_name(), kind = %collection.kind(), items = collection.len())
    )]
    pub async fn download(
        &self,
        collection: &Collection,
        transport: &dyn Transport,
        root: &Path,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport, EngineError> {
        let dir = root.join(collection.sanitized_name());
        let total = collection.len();

        if collection.is_empty() {
            info!("collection has no items");
            reporter.report(collection, &ProgressEvent::Summary { fetched: 0 });
            return Ok(DownloadReport {
                dir,
                outcomes: Vec::new(),
            });
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EngineError::io(&dir, e))?;
        let scanner = LocalScanner::scan(&dir).map_err(|e| EngineError::io(&dir, e))?;

        let report_runs = collection.kind() == ContentKind::Album;
        let mut outcomes = Vec::with_capacity(total);
        let mut run: Option<ExistingRun> = None;

        let mut results = stream::iter(collection.items())
            .map(|item| self.process_item(collection, item, &scanner, transport, &dir, cancel))
            .buffered(self.options.concurrency);

        while let Some(result) = results.next().await {
            let Some(outcome) = result? else {
                flush_run(&mut run, collection, reporter);
                info!(completed = outcomes.len(), total, "download cancelled");
                return Err(EngineError::Cancelled {
                    collection: collection.display_name().to_string(),
                    completed: outcomes.len(),
                    total,
                    outcomes,
                });
            };

            match &outcome {
                ItemOutcome::Present { index, .. } => {
                    if report_runs {
                        run = Some(match run {
                            Some(existing) => ExistingRun {
                                end: *index,
                                ..existing
                            },
                            None => ExistingRun {
                                start: *index,
                                end: *index,
                            },
                        });
                    }
                }
                ItemOutcome::Fetched { index, .. } => {
                    flush_run(&mut run, collection, reporter);
                    reporter.report(
                        collection,
                        &ProgressEvent::Done {
                            page: index + 1,
                            total,
                        },
                    );
                }
                ItemOutcome::Failed { index, reason, .. } => {
                    flush_run(&mut run, collection, reporter);
                    reporter.report(
                        collection,
                        &ProgressEvent::Skipped {
                            page: index + 1,
                            total,
                            reason: reason.clone(),
                        },
                    );
                }
            }
            outcomes.push(outcome);
        }
        drop(results);
        flush_run(&mut run, collection, reporter);

        let report = DownloadReport { dir, outcomes };
        info!(
            fetched = report.fetched(),
            present = report.present(),
            failed = report.failed(),
            "collection up to date"
        );
        reporter.report(
            collection,
            &ProgressEvent::Summary {
                fetched: report.fetched(),
            },
        );
        Ok(report)
    }

    /// Drives one item to a terminal state. `None` means it never started.
    async fn process_item(
        &self,
        collection: &Collection,
        item: &ItemLocator,
        scanner: &LocalScanner,
        transport: &dyn Transport,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<ItemOutcome>, EngineError> {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let index = item.index;
        let prefix = collection.item_prefix(index);
        let stale_marker = match scanner.state(&prefix) {
            LocalItemState::Present(path) => {
                debug!(index, path = %path.display(), "item present");
                return Ok(Some(ItemOutcome::Present { index, path }));
            }
            LocalItemState::Skipped(path) => match self.options.skipped_policy {
                SkippedPolicy::Keep => {
                    debug!(index, path = %path.display(), "item previously skipped");
                    return Ok(Some(ItemOutcome::Present { index, path }));
                }
                SkippedPolicy::Retry => {
                    debug!(index, "retrying previously skipped item");
                    Some(path)
                }
            },
            LocalItemState::Absent => None,
        };

        let error = match transport.fetch(&item.url).await {
            Ok(fetched) => {
                match fetched
                    .content_type
                    .as_deref()
                    .and_then(extension_from_content_type)
                {
                    Some(extension) => {
                        let path = dir.join(format!("{prefix}{extension}"));
                        write_atomic(&path, &fetched.bytes).await?;
                        if let Some(marker) = stale_marker {
                            remove_if_exists(&marker).await?;
                        }
                        debug!(index, path = %path.display(), bytes = fetched.bytes.len(), "item stored");
                        return Ok(Some(ItemOutcome::Fetched { index, path }));
                    }
                    None => DownloadError::unknown_content_type(
                        &item.url,
                        fetched.content_type.as_deref(),
                    ),
                }
            }
            Err(e) => e,
        };

        let marker = dir.join(skip_marker_name(&prefix));
        tokio::fs::write(&marker, b"")
            .await
            .map_err(|e| EngineError::io(&marker, e))?;
        warn!(index, url = %item.url, error = %error, "item skipped");
        Ok(Some(ItemOutcome::Failed {
            index,
            path: marker,
            reason: error.to_string(),
        }))
    }
}

fn flush_run(run: &mut Option<ExistingRun>, collection: &Collection, reporter: &dyn ProgressReporter) {
    if let Some(ExistingRun { start, end }) = run.take() {
        reporter.report(
            collection,
            &ProgressEvent::ExistingRun {
                first: start + 1,
                last: end + 1,
                total: collection.len(),
            },
        );
    }
}

/// Writes `bytes` to a hidden sibling of `path`, then renames it into place.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), EngineError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| EngineError::io(path, std::io::Error::other("no file name")))?;
    let temp_path = path.with_file_name(temp_file_name(file_name));

    let mut file = tokio::fs::File::create(&temp_path)
        .await
        .map_err(|e| EngineError::io(&temp_path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| EngineError::io(&temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| EngineError::io(&temp_path, e))?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(EngineError::io(path, e));
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), EngineError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EngineError::io(path, e)),
    }
}

//! Download command handler: resolve each URL and bring its directory up to date.

use std::io::{self, IsTerminal, Read};
use std::path::Path;

use anyhow::{Context, Result, bail};
use multporn_core::download::{
    DownloadEngine, EngineError, HttpClient, ProgressReporter, TracingReporter,
};
use multporn_core::resolver::SiteClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::progress::BarReporter;
use super::settings::TransferSettings;
use crate::app_config::FileConfig;
use crate::cli::DownloadArgs;

/// Totals over every collection of one invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunSummary {
    pub collections: usize,
    pub fetched: usize,
    pub failed_items: usize,
    pub unresolved: usize,
}

pub(crate) async fn run_download_command(
    args: &DownloadArgs,
    file: Option<&FileConfig>,
    show_progress: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let urls = if args.urls.is_empty() {
        match read_urls_from_stdin()? {
            Some(urls) => urls,
            None => {
                info!("No input provided. Pipe URLs via stdin or pass as arguments.");
                info!("Example: echo 'https://multporn.net/comics/between_friends' | multporn download");
                return Ok(());
            }
        }
    } else {
        args.urls.clone()
    };

    let settings = TransferSettings::resolve(&args.options, file);
    download_all(&urls, &settings, show_progress, cancel).await?;
    Ok(())
}

/// Downloads every collection in `urls`, one after another.
///
/// Unresolvable pages are logged and skipped; filesystem errors and
/// cancellation end the run.
pub(crate) async fn download_all(
    urls: &[String],
    settings: &TransferSettings,
    show_progress: bool,
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    let http = HttpClient::try_new(settings.transport.clone())
        .context("Failed to build HTTP client")?;
    let site = SiteClient::new(http);
    let engine = DownloadEngine::new(settings.engine)?;
    let root = settings.output_dir.as_path();

    let mut summary = RunSummary::default();
    for url in urls {
        if cancel.is_cancelled() {
            bail!("Download cancelled");
        }
        match download_one(&site, &engine, url, root, show_progress, cancel).await? {
            Some((fetched, failed)) => {
                summary.collections += 1;
                summary.fetched += fetched;
                summary.failed_items += failed;
            }
            None => summary.unresolved += 1,
        }
    }

    info!(
        collections = summary.collections,
        fetched = summary.fetched,
        failed = summary.failed_items,
        unresolved = summary.unresolved,
        "All downloads finished"
    );
    Ok(summary)
}

/// Returns `(fetched, failed)` or `None` when the URL did not resolve to a collection.
async fn download_one(
    site: &SiteClient,
    engine: &DownloadEngine,
    url: &str,
    root: &Path,
    show_progress: bool,
    cancel: &CancellationToken,
) -> Result<Option<(usize, usize)>> {
    let page = match site.collection(url).await {
        Ok(page) => page,
        Err(e) => {
            error!(url, error = %e, "Could not resolve page");
            return Ok(None);
        }
    };
    let collection = match page.to_collection() {
        Ok(collection) => collection,
        Err(e) => {
            warn!(url, error = %e, "Not a collection page");
            return Ok(None);
        }
    };
    if collection.is_empty() {
        warn!(url, name = collection.display_name(), "No pages found");
    }

    let bar;
    let reporter: &dyn ProgressReporter = if show_progress && !collection.is_empty() {
        bar = BarReporter::new(&collection);
        &bar
    } else {
        &TracingReporter
    };

    match engine
        .download(&collection, site.http(), root, reporter, cancel)
        .await
    {
        Ok(report) => {
            for path in report.paths() {
                debug!(path = %path.display(), "Collection item");
            }
            Ok(Some((report.fetched(), report.failed())))
        }
        Err(EngineError::Cancelled {
            collection,
            completed,
            total,
            ..
        }) => {
            bail!("Download of \"{collection}\" cancelled after {completed} of {total} pages")
        }
        Err(e) => Err(e).with_context(|| format!("Failed to download {url}")),
    }
}

fn read_urls_from_stdin() -> Result<Option<Vec<String>>> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read URLs from stdin")?;
    let urls = parse_url_lines(&buffer);
    if urls.is_empty() {
        Ok(None)
    } else {
        Ok(Some(urls))
    }
}

/// One URL per whitespace-separated token; `#` starts a comment line.
fn parse_url_lines(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect()
}

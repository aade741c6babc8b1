//! CLI entry point for the multporn downloader.

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use multporn_core::resolver::SearchQuery;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod commands;

use cli::{Args, Command, TransferArgs};
use commands::TransferSettings;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = app_config::load_default_file_config()?;
    if let Some(path) = loaded.path.as_deref().filter(|_| loaded.config.is_some()) {
        debug!(path = %path.display(), "Loaded config file");
    }
    let file_config = loaded.config.as_ref();

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let show_progress = !args.quiet && io::stderr().is_terminal();

    match &args.command {
        Command::Download(download_args) => {
            info!("Multporn downloader starting");
            commands::run_download_command(download_args, file_config, show_progress, &cancel)
                .await?;
        }
        Command::Info { url } => {
            let settings = TransferSettings::resolve(&TransferArgs::default(), file_config);
            commands::run_info_command(url, &settings).await?;
        }
        Command::Listing {
            url,
            download,
            options,
        } => {
            let settings = TransferSettings::resolve(options, file_config);
            commands::run_listing_command(url, *download, &settings, show_progress, &cancel)
                .await?;
        }
        Command::Search {
            query,
            page,
            kind,
            sort,
        } => {
            let settings = TransferSettings::resolve(&TransferArgs::default(), file_config);
            let query = SearchQuery::new(query.clone())
                .page(*page)
                .filter(*kind)
                .sort(*sort);
            commands::run_search_command(&query, &settings).await?;
        }
    }

    Ok(())
}

/// Exit status of a process stopped by a second Ctrl-C (128 + SIGINT).
const FORCED_EXIT_CODE: i32 = 130;

/// Cancels the run on the first Ctrl-C and exits on the second.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if handle_interrupts(tokio::signal::ctrl_c, cancel).await {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });
}

/// Waits for interrupts from `next_signal`. The first one cancels the run so
/// in-flight pages can finish; returns true when a second one arrives.
async fn handle_interrupts<F, Fut>(mut next_signal: F, cancel: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    warn!("Interrupted, finishing in-flight pages (press Ctrl-C again to exit now)");
    cancel.cancel();

    if next_signal().await.is_err() {
        return false;
    }
    warn!("Interrupted again, exiting");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::{Mutex, mpsc};

    fn signal_source(
        rx: mpsc::UnboundedReceiver<()>,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = io::Result<()>> + Send>> {
        let rx = Arc::new(Mutex::new(rx));
        move || {
            let rx = Arc::clone(&rx);
            Box::pin(async move {
                rx.lock()
                    .await
                    .recv()
                    .await
                    .ok_or_else(|| io::Error::other("signal source closed"))
            })
        }
    }

    #[tokio::test]
    async fn test_first_interrupt_cancels_second_forces_exit() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handler = tokio::spawn(handle_interrupts(signal_source(rx), cancel.clone()));

        tx.send(()).unwrap();
        cancel.cancelled().await;
        assert!(!handler.is_finished());

        tx.send(()).unwrap();
        assert!(handler.await.unwrap());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tx.send(()).unwrap();
        drop(tx);

        assert!(!handle_interrupts(signal_source(rx), cancel.clone()).await);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_signal_listener_does_not_cancel() {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        drop(tx);
        let cancel = CancellationToken::new();

        assert!(!handle_interrupts(signal_source(rx), cancel.clone()).await);
        assert!(!cancel.is_cancelled());
    }
}

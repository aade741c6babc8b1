//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use multporn_core::download::MAX_CONCURRENCY;
use multporn_core::resolver::{ContentFilter, SearchSort};

/// Mirror multporn.net albums and videos into a local directory.
///
/// Re-running a download only fetches pages that are not on disk yet.
#[derive(Parser, Debug)]
#[command(name = "multporn")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download albums or videos (URLs from arguments or stdin)
    Download(DownloadArgs),

    /// Print a collection's metadata as JSON
    Info {
        /// Collection URL or site path
        url: String,
    },

    /// Print the collection links of a listing page
    Listing {
        /// Listing URL or site path (category, author, character...)
        url: String,

        /// Download every listed collection
        #[arg(long)]
        download: bool,

        #[command(flatten)]
        options: TransferArgs,
    },

    /// Search the site and print the results as JSON
    Search {
        /// Search text
        query: String,

        /// Result page, starting at 1
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Content type filter (all, comics, hentai-manga, gay-comics, ...)
        #[arg(short, long, default_value = "all")]
        kind: ContentFilter,

        /// Result order (relevant, author)
        #[arg(short, long, default_value = "relevant")]
        sort: SearchSort,
    },
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Collection URLs or site paths
    pub urls: Vec<String>,

    #[command(flatten)]
    pub options: TransferArgs,
}

/// Flags shared by every command that downloads. Unset flags fall back to the
/// config file, then to built-in defaults.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct TransferArgs {
    /// Destination root (default: Albums)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Pages fetched in parallel per collection (1-32, default 1)
    #[arg(short = 'c', long, value_parser = parse_concurrency)]
    pub concurrency: Option<usize>,

    /// Retries for transient failures (0-20, default 5)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: Option<u32>,

    /// Backoff factor in milliseconds; retry n waits factor * 2^(n-1) (default 1000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub backoff_factor_ms: Option<u64>,

    /// Connect timeout in seconds (default 5)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Read timeout in seconds (default 5)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Ignore HTTP(S)_PROXY / ALL_PROXY
    #[arg(long)]
    pub no_proxy: bool,

    /// Fetch pages marked _SKIPPED by an earlier run
    #[arg(long)]
    pub retry_skipped: bool,
}

fn parse_concurrency(raw: &str) -> Result<usize, String> {
    let value: usize = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if (1..=MAX_CONCURRENCY).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 1..={MAX_CONCURRENCY}"))
    }
}

//! Listing command handler: print, or download, the collections of a listing page.

use anyhow::{Context, Result};
use multporn_core::download::HttpClient;
use multporn_core::resolver::SiteClient;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::download::download_all;
use super::settings::TransferSettings;

pub(crate) async fn run_listing_command(
    url: &str,
    download: bool,
    settings: &TransferSettings,
    show_progress: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let http = HttpClient::try_new(settings.transport.clone())
        .context("Failed to build HTTP client")?;
    let site = SiteClient::new(http);
    let listing = site.listing(url).await?;
    info!(
        name = listing.name.as_deref().unwrap_or("<untitled>"),
        links = listing.links.len(),
        "Resolved listing"
    );

    if download {
        download_all(&listing.links, settings, show_progress, cancel).await?;
    } else {
        for link in &listing.links {
            println!("{link}");
        }
    }
    Ok(())
}

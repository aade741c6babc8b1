//! Info command handler: print a collection page's metadata as JSON.

use anyhow::{Context, Result};
use multporn_core::download::HttpClient;
use multporn_core::resolver::SiteClient;

use super::settings::TransferSettings;

pub(crate) async fn run_info_command(url: &str, settings: &TransferSettings) -> Result<()> {
    let http = HttpClient::try_new(settings.transport.clone())
        .context("Failed to build HTTP client")?;
    let site = SiteClient::new(http);
    let page = site.collection(url).await?;
    let json = serde_json::to_string_pretty(&page.info())?;
    println!("{json}");
    Ok(())
}

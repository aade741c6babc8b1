//! Search command handler: print one page of site search results as JSON.

use anyhow::{Context, Result};
use multporn_core::download::HttpClient;
use multporn_core::resolver::{SearchQuery, SiteClient};
use tracing::info;

use super::settings::TransferSettings;

pub(crate) async fn run_search_command(query: &SearchQuery, settings: &TransferSettings) -> Result<()> {
    let http = HttpClient::try_new(settings.transport.clone())
        .context("Failed to build HTTP client")?;
    let site = SiteClient::new(http);
    let results = site.search(query).await?;
    if results.is_empty() {
        info!(query = %query.text, page = query.page, "No results");
    }
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

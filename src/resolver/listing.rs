//! Listing pages: categories, characters, authors and other grids of
//! collections.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use super::utils::{absolutize_url, compile_static_regex, page_title};

static GRID_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<table[^>]*class\s*=\s*["'][^"']*\bviews-view-grid\b[^"']*["'][^>]*>(.*?)</table>"#,
    )
});
static STRONG_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<strong[^>]*>\s*<a\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#)
});

/// Collection links found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingPage {
    pub url: String,
    pub name: Option<String>,
    /// Absolute collection URLs in grid order.
    pub links: Vec<String>,
}

impl ListingPage {
    /// Extracts the grid links of `html`, resolved against `site_root`.
    #[must_use]
    pub fn parse(url: &Url, site_root: &Url, html: &str) -> Self {
        let links = GRID_TABLE_RE
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|grid| {
                STRONG_LINK_RE
                    .captures_iter(grid.as_str())
                    .filter_map(|caps| absolutize_url(caps.get(1)?.as_str(), site_root))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            url: url.to_string(),
            name: page_title(html),
            links,
        }
    }
}

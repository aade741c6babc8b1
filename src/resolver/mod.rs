//! Page resolution: turning site URLs into collections, listings and search
//! results.
//!
//! # Architecture
//!
//! - [`SiteClient`] - fetches pages through the shared [`HttpClient`]
//! - [`CollectionPage`] - album/video page with lazily extracted metadata
//! - [`ListingPage`] - category, author or character grid of collections
//! - [`SearchQuery`] - search URL construction; results as [`SearchResult`]
//!
//! # Example
//!
//! ```no_run
//! use multporn_core::download::{HttpClient, TransportConfig};
//! use multporn_core::resolver::SiteClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let site = SiteClient::new(HttpClient::new(TransportConfig::default()));
//! let page = site.collection("/comics/between_friends").await?;
//! println!("{:?}: {} pages", page.name(), page.page_count());
//! # Ok(())
//! # }
//! ```

mod error;
mod listing;
mod page;
mod search;
mod utils;

pub use error::ResolveError;
pub use listing::ListingPage;
pub use page::{CollectionInfo, CollectionPage};
pub use search::{ContentFilter, SearchQuery, SearchResult, SearchSort, parse_search_results};

use tracing::{debug, instrument};
use url::Url;

use crate::download::HttpClient;

/// Root of the site; relative page paths are joined against it.
pub const HOME: &str = "https://multporn.net/";

/// Fetches and parses site pages.
#[derive(Debug, Clone)]
pub struct SiteClient {
    http: HttpClient,
    site_root: Url,
}

impl SiteClient {
    /// Creates a client for the public site.
    ///
    /// # Panics
    ///
    /// Never in practice: [`HOME`] is a valid URL.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(http: HttpClient) -> Self {
        Self::with_site_root(http, HOME).expect("HOME is a valid URL")
    }

    /// Creates a client rooted at `site_root` (used with mirrors and mock servers).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidUrl`] if `site_root` is not an absolute URL.
    pub fn with_site_root(http: HttpClient, site_root: &str) -> Result<Self, ResolveError> {
        let site_root = Url::parse(site_root).map_err(|_| ResolveError::invalid_url(site_root))?;
        Ok(Self { http, site_root })
    }

    #[must_use]
    pub fn site_root(&self) -> &Url {
        &self.site_root
    }

    /// Transport shared with the download engine.
    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Joins `input` (absolute URL or site-relative path) against the site root.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidUrl`] when the result is not an http(s) URL.
    pub fn page_url(&self, input: &str) -> Result<Url, ResolveError> {
        let url = self
            .site_root
            .join(input.trim())
            .map_err(|_| ResolveError::invalid_url(input))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ResolveError::invalid_url(input));
        }
        Ok(url)
    }

    /// Fetches an album or video page.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the URL is invalid or the page cannot be
    /// fetched. A page that is not a collection still resolves; check
    /// [`CollectionPage::exists`].
    #[instrument(skip(self))]
    pub async fn collection(&self, input: &str) -> Result<CollectionPage, ResolveError> {
        let url = self.page_url(input)?;
        let html = self.fetch_html(&url).await?;
        let page = CollectionPage::parse(&url, html);
        debug!(kind = %page.kind(), name = ?page.name(), pages = page.page_count(), "resolved collection page");
        Ok(page)
    }

    /// Fetches a listing page.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the URL is invalid or the page cannot be fetched.
    #[instrument(skip(self))]
    pub async fn listing(&self, input: &str) -> Result<ListingPage, ResolveError> {
        let url = self.page_url(input)?;
        let html = self.fetch_html(&url).await?;
        let page = ListingPage::parse(&url, &self.site_root, &html);
        debug!(links = page.links.len(), "resolved listing page");
        Ok(page)
    }

    /// Runs a search.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the search page cannot be fetched.
    #[instrument(skip(self), fields(text = %query.text, page = query.page))]
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, ResolveError> {
        let url = self.page_url(&query.url(&self.site_root))?;
        let html = self.fetch_html(&url).await?;
        let results = parse_search_results(&html, &self.site_root);
        debug!(results = results.len(), "search completed");
        Ok(results)
    }

    async fn fetch_html(&self, url: &Url) -> Result<String, ResolveError> {
        self.http
            .get_text(url.as_str())
            .await
            .map_err(|e| ResolveError::fetch(url.as_str(), e))
    }
}

//! Site search: query construction and result extraction.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use super::utils::{absolutize_url, compile_static_regex, html_text, tag_attributes};

static VIEW_CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<div[^>]*class\s*=\s*["'][^"']*\bview-content\b[^"']*["'][^>]*>"#)
});
/// Start of the pager or footer that follows the results.
static VIEW_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<(?:div|ul)[^>]*class\s*=\s*["'][^"']*\b(?:item-list|pager|view-footer)\b"#,
    )
});
static STRONG_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?is)<strong[^>]*>\s*(<a\b[^>]*>)(.*?)</a>")
});
static IMG_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<img\b[^>]*>"));
static ROW_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<div[^>]*class\s*=\s*["'][^"']*\bviews-row\b"#)
});

/// Content type filter of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentFilter {
    #[default]
    All,
    Comics,
    HentaiManga,
    GayComics,
    CartoonPictures,
    HentaiPictures,
    Games,
    Flash,
    CartoonVideos,
    HentaiVideos,
    GifAnimations,
    Rule63,
    AuthorsAlbums,
    Humor,
}

impl ContentFilter {
    pub const ALL: [Self; 14] = [
        Self::All,
        Self::Comics,
        Self::HentaiManga,
        Self::GayComics,
        Self::CartoonPictures,
        Self::HentaiPictures,
        Self::Games,
        Self::Flash,
        Self::CartoonVideos,
        Self::HentaiVideos,
        Self::GifAnimations,
        Self::Rule63,
        Self::AuthorsAlbums,
        Self::Humor,
    ];

    /// Value of the `type` query parameter.
    #[must_use]
    pub fn query_value(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Comics => "1",
            Self::HentaiManga => "2",
            Self::GayComics => "3",
            Self::CartoonPictures => "4",
            Self::HentaiPictures => "5",
            Self::Games => "6",
            Self::Flash => "7",
            Self::CartoonVideos => "8",
            Self::HentaiVideos => "9",
            Self::GifAnimations => "10",
            Self::Rule63 => "11",
            Self::AuthorsAlbums => "12",
            Self::Humor => "13",
        }
    }

    /// Kebab-case name used on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Comics => "comics",
            Self::HentaiManga => "hentai-manga",
            Self::GayComics => "gay-comics",
            Self::CartoonPictures => "cartoon-pictures",
            Self::HentaiPictures => "hentai-pictures",
            Self::Games => "games",
            Self::Flash => "flash",
            Self::CartoonVideos => "cartoon-videos",
            Self::HentaiVideos => "hentai-videos",
            Self::GifAnimations => "gif-animations",
            Self::Rule63 => "rule63",
            Self::AuthorsAlbums => "authors-albums",
            Self::Humor => "humor",
        }
    }
}

impl fmt::Display for ContentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|filter| filter.name() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|f| f.name()).collect();
                format!("unknown content type '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// Result ordering of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SearchSort {
    #[default]
    Relevant,
    Author,
}

impl SearchSort {
    /// Value of the `sort_by` query parameter.
    #[must_use]
    pub fn query_value(self) -> &'static str {
        match self {
            Self::Relevant => "search_api_relevance",
            Self::Author => "Author",
        }
    }
}

impl FromStr for SearchSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevant" | "relevance" => Ok(Self::Relevant),
            "author" => Ok(Self::Author),
            _ => Err(format!("unknown sort '{s}' (expected relevant or author)")),
        }
    }
}

/// One search query against the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    /// 1-based result page.
    pub page: u32,
    pub filter: ContentFilter,
    pub sort: SearchSort,
}

impl SearchQuery {
    /// First page of all content types, sorted by relevance.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: 1,
            filter: ContentFilter::All,
            sort: SearchSort::Relevant,
        }
    }

    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: ContentFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SearchSort) -> Self {
        self.sort = sort;
        self
    }

    /// Search URL under `site_root`. The site numbers pages from 0.
    #[must_use]
    pub fn url(&self, site_root: &Url) -> String {
        let search_home = site_root
            .join("/search/")
            .map_or_else(|_| format!("{site_root}search/"), |url| url.to_string());
        format!(
            "{search_home}?views_fulltext={}&type={}&sort_by={}&page={}",
            urlencoding::encode(&self.text),
            self.filter.query_value(),
            self.sort.query_value(),
            self.page.saturating_sub(1)
        )
    }
}

/// One hit of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub link: String,
    pub thumb: Option<String>,
    pub name: String,
}

/// Extracts the results of a search page. A page without a result list
/// yields no results.
///
/// Each result's thumbnail is looked up inside its own `views-row`; without
/// row markup, the images between the previous result and this one belong
/// to it. A result with no image has no thumbnail.
#[must_use]
pub fn parse_search_results(html: &str, site_root: &Url) -> Vec<SearchResult> {
    let Some(start) = VIEW_CONTENT_RE.find(html) else {
        return Vec::new();
    };
    let rest = &html[start.end()..];
    let block = VIEW_END_RE.find(rest).map_or(rest, |end| &rest[..end.start()]);

    let row_starts: Vec<usize> = ROW_START_RE.find_iter(block).map(|m| m.start()).collect();
    if row_starts.is_empty() {
        return parse_unrowed_results(block, site_root);
    }

    row_starts
        .iter()
        .enumerate()
        .filter_map(|(i, &row_start)| {
            let row_end = row_starts.get(i + 1).copied().unwrap_or(block.len());
            parse_row(&block[row_start..row_end], site_root)
        })
        .collect()
}

/// First linked title of a row, with the closest image before it (or the
/// first one after it) as thumbnail.
fn parse_row(row: &str, site_root: &Url) -> Option<SearchResult> {
    let caps = STRONG_ANCHOR_RE.captures(row)?;
    let whole = caps.get(0)?;
    let (link, name) = result_link(&caps, site_root)?;
    let thumb = last_image(&row[..whole.start()], site_root)
        .or_else(|| first_image(&row[whole.end()..], site_root));
    Some(SearchResult { link, thumb, name })
}

fn parse_unrowed_results(block: &str, site_root: &Url) -> Vec<SearchResult> {
    let mut previous_end = 0;
    let mut results = Vec::new();
    for caps in STRONG_ANCHOR_RE.captures_iter(block) {
        let Some(whole) = caps.get(0) else { continue };
        let segment = &block[previous_end..whole.start()];
        previous_end = whole.end();
        if let Some((link, name)) = result_link(&caps, site_root) {
            results.push(SearchResult {
                link,
                thumb: last_image(segment, site_root),
                name,
            });
        }
    }
    results
}

fn result_link(caps: &regex::Captures<'_>, site_root: &Url) -> Option<(String, String)> {
    let href = tag_attributes(caps.get(1)?.as_str()).remove("href")?;
    let link = absolutize_url(&href, site_root)?;
    Some((link, html_text(caps.get(2)?.as_str())))
}

fn image_sources<'a>(html: &'a str) -> impl Iterator<Item = String> + 'a {
    IMG_TAG_RE
        .find_iter(html)
        .filter_map(|tag| tag_attributes(tag.as_str()).remove("src"))
}

fn last_image(html: &str, site_root: &Url) -> Option<String> {
    image_sources(html)
        .last()
        .and_then(|src| absolutize_url(&src, site_root))
}

fn first_image(html: &str, site_root: &Url) -> Option<String> {
    image_sources(html)
        .next()
        .and_then(|src| absolutize_url(&src, site_root))
}

//! Album and video pages.
//!
//! The HTML is parsed on demand; every field is computed once and memoized.

use std::collections::HashMap;
use std::sync::{LazyLock, OnceLock};

use regex::Regex;
use serde::Serialize;
use url::Url;

use super::error::ResolveError;
use super::utils::{absolutize_url, compile_static_regex, labeled_fields, page_title, tag_attributes};
use crate::collection::{Collection, ContentKind};

static JB_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<p[^>]*class\s*=\s*["'][^"']*\bjb-image\b[^"']*["'][^>]*>.*?(<img\b[^>]*>)"#,
    )
});
static VIDEO_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)(<video\b[^>]*>)(.*?)</video>"));
static SOURCE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<source\b[^>]*>"));

/// A parsed album or video page.
#[derive(Debug)]
pub struct CollectionPage {
    url: String,
    kind: ContentKind,
    base_url: Url,
    html: String,
    name: OnceLock<Option<String>>,
    content_urls: OnceLock<Vec<String>>,
    fields: OnceLock<HashMap<String, Vec<String>>>,
    thumbnail: OnceLock<Option<String>>,
}

/// Serializable snapshot of a page's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    pub url: String,
    pub name: Option<String>,
    pub content_type: ContentKind,
    pub page_count: usize,
    pub exists: bool,
    pub ongoing: bool,
    pub thumbnail: Option<String>,
    pub tags: Vec<String>,
    pub artists: Vec<String>,
    pub sections: Vec<String>,
    pub characters: Vec<String>,
    pub content_urls: Vec<String>,
}

impl CollectionPage {
    /// Wraps fetched page HTML. `url` must be absolute; its first path
    /// segment decides the kind.
    #[must_use]
    pub fn parse(url: &Url, html: impl Into<String>) -> Self {
        let kind = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map_or(ContentKind::Album, ContentKind::from_path_segment);
        Self {
            url: url.to_string(),
            kind,
            base_url: url.clone(),
            html: html.into(),
            name: OnceLock::new(),
            content_urls: OnceLock::new(),
            fields: OnceLock::new(),
            thumbnail: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Display name from the page's title metadata.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.get_or_init(|| page_title(&self.html)).as_deref()
    }

    /// Item URLs in page order: every album page, or the single video file.
    #[must_use]
    pub fn content_urls(&self) -> &[String] {
        self.content_urls.get_or_init(|| match self.kind {
            ContentKind::Album => self.album_page_urls(),
            ContentKind::Video => self.video_source_url().into_iter().collect(),
        })
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.content_urls().len()
    }

    /// True when the page lists at least one item.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.page_count() > 0
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        self.field("tags")
    }

    #[must_use]
    pub fn artists(&self) -> &[String] {
        self.field("author")
    }

    #[must_use]
    pub fn sections(&self) -> &[String] {
        self.field("section")
    }

    #[must_use]
    pub fn characters(&self) -> &[String] {
        self.field("characters")
    }

    /// True when a section mentions "ongoing". Meaningless for videos.
    #[must_use]
    pub fn ongoing(&self) -> bool {
        self.sections()
            .iter()
            .any(|section| section.to_lowercase().contains("ongoing"))
    }

    /// Video poster, or the first page of an album.
    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail
            .get_or_init(|| match self.kind {
                ContentKind::Album => self.content_urls().first().cloned(),
                ContentKind::Video => self
                    .video_attributes()
                    .and_then(|attrs| attrs.get("poster").cloned())
                    .and_then(|poster| absolutize_url(&poster, &self.base_url)),
            })
            .as_deref()
    }

    /// Builds the download unit for this page.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingField`] when the page has no title.
    pub fn to_collection(&self) -> Result<Collection, ResolveError> {
        let name = self
            .name()
            .ok_or_else(|| ResolveError::missing_title(&self.url))?;
        Ok(Collection::new(
            name,
            self.kind,
            self.content_urls().iter().cloned(),
        ))
    }

    #[must_use]
    pub fn info(&self) -> CollectionInfo {
        CollectionInfo {
            url: self.url.clone(),
            name: self.name().map(str::to_string),
            content_type: self.kind,
            page_count: self.page_count(),
            exists: self.exists(),
            ongoing: self.ongoing(),
            thumbnail: self.thumbnail().map(str::to_string),
            tags: self.tags().to_vec(),
            artists: self.artists().to_vec(),
            sections: self.sections().to_vec(),
            characters: self.characters().to_vec(),
            content_urls: self.content_urls().to_vec(),
        }
    }

    fn field(&self, label: &str) -> &[String] {
        self.fields
            .get_or_init(|| labeled_fields(&self.html))
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn album_page_urls(&self) -> Vec<String> {
        JB_IMAGE_RE
            .captures_iter(&self.html)
            .filter_map(|caps| {
                let src = tag_attributes(caps.get(1)?.as_str()).remove("src")?;
                absolutize_url(&src, &self.base_url)
            })
            .collect()
    }

    fn video_attributes(&self) -> Option<HashMap<String, String>> {
        let caps = VIDEO_RE.captures(&self.html)?;
        Some(tag_attributes(caps.get(1)?.as_str()))
    }

    fn video_source_url(&self) -> Option<String> {
        let caps = VIDEO_RE.captures(&self.html)?;
        let inner = caps.get(2)?.as_str();
        SOURCE_TAG_RE
            .find_iter(inner)
            .find_map(|tag| tag_attributes(tag.as_str()).remove("src"))
            .and_then(|src| absolutize_url(&src, &self.base_url))
    }
}

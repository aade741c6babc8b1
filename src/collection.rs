//! Collections: the ordered set of remote items behind one album or video.
//!
//! A [`Collection`] is built once from resolver output and is immutable for
//! the duration of a download run. Item order is the site's page order and
//! determines the on-disk filename prefixes.

use std::fmt;

use serde::Serialize;

use crate::download::filename::{sanitize_collection_name, zero_pad_width};

/// Classification of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Multi-page album (comics, manga, picture sets).
    Album,
    /// Single video file.
    Video,
}

impl ContentKind {
    /// Classifies a collection from the first path segment of its URL.
    ///
    /// `/video/...` is a video; every other section is an album.
    #[must_use]
    pub fn from_path_segment(segment: &str) -> Self {
        if segment.eq_ignore_ascii_case("video") {
            Self::Video
        } else {
            Self::Album
        }
    }

    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetchable unit within a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemLocator {
    /// 0-based position in the collection.
    pub index: usize,
    /// Remote address of the item.
    pub url: String,
}

/// A named, ordered collection of remote items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    display_name: String,
    sanitized_name: String,
    kind: ContentKind,
    items: Vec<ItemLocator>,
}

impl Collection {
    /// Builds a collection from a display name and the item URLs in page order.
    ///
    /// Indices are assigned densely from the iteration order. The display name
    /// is sanitized for use as a directory name and filename prefix.
    #[must_use]
    pub fn new<I, S>(display_name: impl Into<String>, kind: ContentKind, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let display_name = display_name.into();
        let sanitized_name = sanitize_collection_name(&display_name);
        let items = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| ItemLocator {
                index,
                url: url.into(),
            })
            .collect();
        Self {
            display_name,
            sanitized_name,
            kind,
            items,
        }
    }

    /// Name as shown on the site, used in progress messages.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Filesystem-safe name, used as directory and filename prefix.
    #[must_use]
    pub fn sanitized_name(&self) -> &str {
        &self.sanitized_name
    }

    #[must_use]
    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Items in index order.
    #[must_use]
    pub fn items(&self) -> &[ItemLocator] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when the collection has at least one item.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.items.is_empty()
    }

    /// Expected filename prefix for the item at `index`.
    ///
    /// Albums use `{name}_{index}` with the index zero-padded to the digit
    /// count of `len - 1`; videos use the bare name.
    #[must_use]
    pub fn item_prefix(&self, index: usize) -> String {
        match self.kind {
            ContentKind::Video => self.sanitized_name.clone(),
            ContentKind::Album => {
                let width = zero_pad_width(self.items.len());
                format!("{}_{index:0width$}", self.sanitized_name)
            }
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

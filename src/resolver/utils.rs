//! Shared HTML helpers for page extraction: static regexes, meta lookup,
//! URL joining and text cleanup.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static META_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<meta\s+[^>]*>"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)([a-z_:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?s)<[^>]*>"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

/// Label text (`Tags: `, `Author: `, ...) closing its element.
static FIELD_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)>\s*(Tags|Author|Section|Characters)\s*:(?:\s|&nbsp;|&#160;|\x{a0})*<",
    )
});
/// Opening of the value container following a label, after any closing tags.
static FIELD_ITEMS_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)\A(?:\s*</[a-z0-9]+\s*>)*\s*<div[^>]*class\s*=\s*["'][^"']*\bfield-items\b[^"']*["'][^>]*>"#,
    )
});
/// One value inside the container.
static FIELD_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)\A\s*<div[^>]*class\s*=\s*["'][^"']*\bfield-item\b[^"']*["'][^>]*>(.*?)</div>"#,
    )
});

/// Parses the attributes of a single tag into a lowercase-keyed map.
#[must_use]
pub fn tag_attributes(tag: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((name, html_unescape_basic(value)))
        })
        .collect()
}

/// Returns the `content` of the first `<meta>` whose `name` or `property`
/// equals `key`, regardless of attribute order.
#[must_use]
pub fn meta_content(html: &str, key: &str) -> Option<String> {
    META_TAG_RE.find_iter(html).find_map(|tag| {
        let attrs = tag_attributes(tag.as_str());
        let matches_key = ["name", "property"]
            .iter()
            .any(|attr| attrs.get(*attr).is_some_and(|v| v.eq_ignore_ascii_case(key)));
        if !matches_key {
            return None;
        }
        attrs
            .get("content")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Page title: `dcterms.title`, falling back to `og:title`.
#[must_use]
pub fn page_title(html: &str) -> Option<String> {
    meta_content(html, "dcterms.title").or_else(|| meta_content(html, "og:title"))
}

/// Resolves a possibly relative URL string against a base URL.
///
/// Returns the value as-is if it already starts with `http://` or `https://`;
/// normalizes `//...` to `https:...`; otherwise joins with `base_url`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    let value = value.trim();
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// Visible text of an HTML fragment: tags removed, entities decoded,
/// whitespace collapsed.
#[must_use]
pub fn html_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, "");
    let unescaped = html_unescape_basic(&stripped).replace('\u{00a0}', " ");
    WHITESPACE_RE.replace_all(unescaped.trim(), " ").into_owned()
}

pub fn html_unescape_basic(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
        .replace("&nbsp;", "\u{00a0}")
        .replace("&#160;", "\u{00a0}")
        .replace("&amp;", "&")
}

/// Collects the labelled value lists of a collection page.
///
/// Each label is followed by a `field-items` container whose `field-item`
/// children hold one value each. Labels without that container yield an
/// empty list; a repeated label keeps its first occurrence.
#[must_use]
pub fn labeled_fields(html: &str) -> HashMap<String, Vec<String>> {
    let mut fields = HashMap::new();

    for caps in FIELD_LABEL_RE.captures_iter(html) {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let label = label.as_str().to_ascii_lowercase();
        if fields.contains_key(&label) {
            continue;
        }
        // Resume at the '<' the label pattern ended on.
        let rest = &html[whole.end() - 1..];
        fields.insert(label, field_item_values(rest));
    }

    fields
}

fn field_item_values(rest: &str) -> Vec<String> {
    let Some(open) = FIELD_ITEMS_OPEN_RE.find(rest) else {
        return Vec::new();
    };

    let mut values = Vec::new();
    let mut cursor = &rest[open.end()..];
    while let Some(caps) = FIELD_ITEM_RE.captures(cursor) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let value = html_text(inner.as_str());
        if !value.is_empty() {
            values.push(value);
        }
        cursor = &cursor[whole.end()..];
    }
    values
}

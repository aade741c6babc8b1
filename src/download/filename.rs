//! Filename sanitization, prefix padding and extension inference.
//!
//! Every on-disk name a run produces is derived here so the scanner and the
//! orchestrator agree on it.

use super::constants::SKIPPED_SUFFIX;

/// Longest sanitized name, in bytes. Leaves room under the common 255-byte
/// file name limit for the index, extension, temp and marker affixes.
pub const MAX_NAME_BYTES: usize = 200;

/// Sanitizes a collection name for use as a directory name and filename prefix.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |` and control characters) with `_`, truncates to
/// [`MAX_NAME_BYTES`] on a character boundary, drops trailing dots and
/// spaces (rejected on Windows), and never yields a hidden or empty name.
#[must_use]
pub fn sanitize_collection_name(name: &str) -> String {
    let mut sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if sanitized.len() > MAX_NAME_BYTES {
        let mut cut = MAX_NAME_BYTES;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
    }
    let sanitized = sanitized.trim_end_matches(['.', ' ']);

    if sanitized.is_empty() {
        return "_".to_string();
    }

    // A leading dot would hide the files from the scanner.
    match sanitized.strip_prefix('.') {
        Some(rest) => format!("_{rest}"),
        None => sanitized.to_string(),
    }
}

/// Digit count of the last index of a collection with `count` items.
///
/// A collection with 12 items pads to 2 digits (`00`..`11`); empty and
/// single-item collections pad to 1.
#[must_use]
pub fn zero_pad_width(count: usize) -> usize {
    count.saturating_sub(1).to_string().len()
}

/// Name of the zero-byte marker written when an item cannot be fetched.
#[must_use]
pub fn skip_marker_name(prefix: &str) -> String {
    format!("{prefix}{SKIPPED_SUFFIX}")
}

/// Returns true when `file_name` is a skip marker.
#[must_use]
pub fn is_skip_marker(file_name: &str) -> bool {
    file_name.ends_with(SKIPPED_SUFFIX)
}

/// Name of the hidden temporary file an item is written to before rename.
///
/// The leading dot keeps an interrupted write from matching the item prefix.
#[must_use]
pub fn temp_file_name(final_name: &str) -> String {
    format!(".{final_name}.part")
}

/// Infers a file extension (with leading dot) from a Content-Type header.
///
/// Parameters such as `; charset=binary` are ignored. Returns `None` for
/// types that do not name a page or video, so the caller can treat the item
/// as failed instead of writing an unusable file.
#[must_use]
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    let extension = match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/bmp" | "image/x-ms-bmp" => ".bmp",
        "image/svg+xml" => ".svg",
        "image/tiff" => ".tif",
        "image/avif" => ".avif",
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "video/quicktime" => ".mov",
        "video/x-flv" => ".flv",
        "video/x-msvideo" => ".avi",
        "video/x-matroska" => ".mkv",
        "video/mpeg" => ".mpeg",
        "application/x-shockwave-flash" => ".swf",
        "application/pdf" => ".pdf",
        "application/zip" => ".zip",
        _ => return None,
    };
    Some(extension)
}

//! Local state scanner: which items of a collection are already on disk.
//!
//! The destination directory is listed once per run. Each item is then
//! looked up by its expected filename prefix, so a page written as
//! `Name_03.png` and one written as `Name_03.jpg` both count as present.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::filename::is_skip_marker;

/// On-disk state of one expected item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalItemState {
    /// A file with the expected prefix exists.
    Present(PathBuf),
    /// Only a `_SKIPPED` marker exists; the item failed in an earlier run.
    Skipped(PathBuf),
    /// Nothing matches; the item must be fetched.
    Absent,
}

impl LocalItemState {
    /// The matched path, for present and skipped items.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Present(path) | Self::Skipped(path) => Some(path),
            Self::Absent => None,
        }
    }
}

/// Snapshot of a destination directory's file names.
#[derive(Debug, Clone, Default)]
pub struct LocalScanner {
    dir: PathBuf,
    /// Sorted, non-hidden file names.
    entries: Vec<String>,
}

impl LocalScanner {
    /// Lists `dir` once. A missing directory scans as empty.
    ///
    /// # Errors
    ///
    /// Returns the IO error when the directory exists but cannot be read.
    #[instrument(level = "debug", skip(dir), fields(dir = %dir.display()))]
    pub fn scan(dir: &Path) -> std::io::Result<Self> {
        let read_dir = match std::fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("destination does not exist yet");
                return Ok(Self {
                    dir: dir.to_path_buf(),
                    entries: Vec::new(),
                });
            }
            Err(e) => return Err(e),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            entries.push(name);
        }
        entries.sort();
        debug!(entries = entries.len(), "scanned destination");

        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    /// Directory this snapshot was taken from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of visible entries in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the matching file name for `prefix`, if any.
    ///
    /// A `_SKIPPED` marker counts as a match.
    #[must_use]
    pub fn exists(&self, prefix: &str) -> Option<&str> {
        self.find(prefix, false).or_else(|| self.find(prefix, true))
    }

    /// Classifies the item with the given prefix.
    ///
    /// When both a real file and a marker match, the real file wins.
    #[must_use]
    pub fn state(&self, prefix: &str) -> LocalItemState {
        if let Some(name) = self.find(prefix, false) {
            return LocalItemState::Present(self.dir.join(name));
        }
        if let Some(name) = self.find(prefix, true) {
            return LocalItemState::Skipped(self.dir.join(name));
        }
        LocalItemState::Absent
    }

    fn find(&self, prefix: &str, markers: bool) -> Option<&str> {
        self.entries
            .iter()
            .filter(|name| name.starts_with(prefix))
            .find(|name| is_skip_marker(name) == markers)
            .map(String::as_str)
    }
}

//! Source file discovery and record parsing
//!
//! Two input shapes are supported:
//! - catalog: one JSON object per file, one song + artist each
//! - log: newline-delimited JSON, one listening event per line

pub mod catalog;
pub mod log;

pub use catalog::CatalogRecord;
pub use log::{LogEvent, PLAYBACK_PAGE};

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{EtlError, Result};

/// Default file name pattern for source files
pub const DEFAULT_PATTERN: &str = "*.json";

/// Which parser a directory's files go through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Catalog,
    Log,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Catalog => "catalog",
            SourceKind::Log => "log",
        }
    }
}

/// Recursively collect files under `root` whose file name matches `pattern`.
///
/// Entries are visited in file-name order at every level, so the result is
/// stable between runs. Paths are absolute.
pub fn locate_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = Pattern::new(pattern).map_err(|e| EtlError::Discovery {
        path: root.to_path_buf(),
        message: format!("invalid pattern '{}': {}", pattern, e),
    })?;

    let root = std::path::absolute(root).map_err(|e| EtlError::Discovery {
        path: root.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut files = vec![];
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| EtlError::Discovery {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.clone()),
            message: e.to_string(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .file_name()
            .to_str()
            .map(|name| matcher.matches(name))
            .unwrap_or(false);
        if matches {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

//! PNG discovery for pattern, curated and verification directories.

use glob::{glob_with, MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Directory not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, #[source] glob::PatternError),
}

/// All `*.png` files (extension matched case-insensitively) under `dir`,
/// sorted by path. A file path is returned as-is if it is a PNG.
pub fn find_pngs(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, DiscoveryError> {
    if dir.is_file() {
        return Ok(if is_png(dir) { vec![dir.to_path_buf()] } else { vec![] });
    }
    if !dir.is_dir() {
        return Err(DiscoveryError::NotFound(dir.to_path_buf()));
    }

    let glob_tail = if recursive { "**/*.png" } else { "*.png" };
    let pattern = format!("{}/{}", Pattern::escape(&dir.to_string_lossy()), glob_tail);
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let entries = glob_with(&pattern, options)
        .map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?;

    let mut files = vec![];
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Unreadable path during discovery"),
        }
    }

    files.sort();
    Ok(files)
}

pub fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("png"))
}

/// File stem as a pattern name, e.g. `calico` for `patterns/calico.png`.
pub fn stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}

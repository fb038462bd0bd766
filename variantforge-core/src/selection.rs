//! Selection Reconciliation
//!
//! Matches a hand-curated directory of generated PNGs back to the manifest
//! and writes a selection document carrying what is needed to reproduce each
//! pick. Unmatched files are collected as warnings; the run still completes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::discovery::{self, DiscoveryError};
use crate::enumerate::ColorTuple;
use crate::hashing::{config_hash, file_sha256};
use crate::manifest::{read_manifest, ManifestError};
use crate::palettes::PaletteCategory;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Manifest not found: {0}")]
    ManifestMissing(PathBuf),

    #[error("Selected directory not found: {0}")]
    SelectedDirMissing(PathBuf),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("I/O error on {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedItem {
    pub file: String,
    pub filename: String,
    pub pattern: String,
    pub palette_id: String,
    pub color_tuple: ColorTuple,
    pub variant_key: String,
    pub slots: usize,
    pub category: PaletteCategory,
    pub origin_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDocument {
    pub generated_manifest: String,
    pub manifest_hash: String,
    pub palette_config_hash: String,
    pub count: usize,
    /// Curated files with no manifest entry.
    pub missing: Vec<String>,
    pub items: Vec<SelectedItem>,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SelectionError + '_ {
    move |e| SelectionError::Io(path.to_path_buf(), e)
}

/// Reconcile every `*.png` in `selected_dir` (sorted by name) against the
/// manifest at `manifest_path`.
pub fn build_selection(
    selected_dir: &Path,
    manifest_path: &Path,
    palette_config: &Path,
) -> Result<SelectionDocument, SelectionError> {
    if !manifest_path.is_file() {
        return Err(SelectionError::ManifestMissing(manifest_path.to_path_buf()));
    }
    if !selected_dir.is_dir() {
        return Err(SelectionError::SelectedDirMissing(selected_dir.to_path_buf()));
    }

    let manifest = read_manifest(manifest_path)?;
    let mut items = vec![];
    let mut missing = vec![];

    for png in discovery::find_pngs(selected_dir, false)? {
        let Some(filename) = png.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let Some(rec) = manifest.get(&filename) else {
            tracing::warn!(file = %filename, "Selected file not found in manifest");
            missing.push(filename);
            continue;
        };
        items.push(SelectedItem {
            file: png.to_string_lossy().replace('\\', "/"),
            filename,
            pattern: rec.pattern.clone(),
            palette_id: rec.palette_id.clone(),
            color_tuple: rec.color_tuple.clone(),
            variant_key: rec.variant_key.clone(),
            slots: rec.slots,
            category: rec.category,
            origin_file: rec.file.clone(),
        });
    }

    Ok(SelectionDocument {
        generated_manifest: manifest_path.to_string_lossy().replace('\\', "/"),
        manifest_hash: file_sha256(manifest_path).map_err(io_err(manifest_path))?,
        palette_config_hash: config_hash(palette_config).map_err(io_err(palette_config))?,
        count: items.len(),
        missing,
        items,
    })
}

/// Write the document as pretty JSON, creating parent directories.
pub fn write_selection(doc: &SelectionDocument, out: &Path) -> Result<(), SelectionError> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
    }
    let json = serde_json::to_string_pretty(doc)?;
    fs::write(out, json).map_err(io_err(out))
}

/// Wave number of a `selected_wave{N}_...json` file name.
fn wave_number(name: &str) -> Option<u32> {
    let rest = name.strip_suffix(".json")?.strip_prefix("selected_wave")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !rest[digits.len()..].starts_with('_') {
        return None;
    }
    digits.parse().ok()
}

/// Next auto-named selection path in `dir`:
/// `selected_wave{N}_{YYYYMMDD_HHMMSS}.json`, N one past the highest existing.
pub fn next_wave_path(dir: &Path, now: NaiveDateTime) -> Result<PathBuf, SelectionError> {
    let mut highest = 0u32;
    if dir.is_dir() {
        for entry in fs::read_dir(dir).map_err(io_err(dir))? {
            let entry = entry.map_err(io_err(dir))?;
            if let Some(n) = wave_number(&entry.file_name().to_string_lossy()) {
                highest = highest.max(n);
            }
        }
    }
    let stamp = now.format("%Y%m%d_%H%M%S");
    Ok(dir.join(format!("selected_wave{}_{}.json", highest + 1, stamp)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_next_wave_path_increments() {
        let dir = tempfile::tempdir().unwrap();
        let now = NaiveDate::from_ymd_opt(2026, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();

        let first = next_wave_path(dir.path(), now).unwrap();
        assert_eq!(first.file_name().unwrap(), "selected_wave1_20260506_070809.json");

        fs::write(dir.path().join("selected_wave3_20250101_000000.json"), "{}").unwrap();
        fs::write(dir.path().join("selected_wave12x.json"), "{}").unwrap();
        let next = next_wave_path(dir.path(), now).unwrap();
        assert_eq!(next.file_name().unwrap(), "selected_wave4_20260506_070809.json");
    }

    #[test]
    fn test_wave_number() {
        assert_eq!(wave_number("selected_wave7_20250101_000000.json"), Some(7));
        assert_eq!(wave_number("selected_wave_20250101.json"), None);
        assert_eq!(wave_number("selected_wave7_x.txt"), None);
    }

    #[test]
    fn test_missing_inputs_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("generated.jsonl");
        assert!(matches!(
            build_selection(dir.path(), &manifest, Path::new("cfg.json")),
            Err(SelectionError::ManifestMissing(_))
        ));

        fs::write(&manifest, "").unwrap();
        assert!(matches!(
            build_selection(&dir.path().join("selected"), &manifest, Path::new("cfg.json")),
            Err(SelectionError::SelectedDirMissing(_))
        ));
    }
}

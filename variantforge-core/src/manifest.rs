//! Manifest Store - one JSON line per generated image
//!
//! Lines are flushed as soon as they are written and never rewritten, so a
//! run that aborts leaves every previously written line intact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::enumerate::ColorTuple;
use crate::palettes::PaletteCategory;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest I/O error on {0}: {1}")]
    Io(PathBuf, #[source] io::Error),

    #[error("Malformed manifest line {line} in {path}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything needed to reproduce one output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub file: String,
    pub pattern: String,
    pub slots: usize,
    pub category: PaletteCategory,
    pub palette_id: String,
    #[serde(default)]
    pub palette_colors: Vec<String>,
    /// Empty on lines written before tuples were recorded.
    #[serde(default)]
    pub color_tuple: ColorTuple,
    #[serde(default)]
    pub variant_key: String,
    #[serde(default)]
    pub ts: String,
}

impl ManifestRecord {
    /// Bare file name of `file`, the key curated files are matched on.
    pub fn file_name(&self) -> Option<&str> {
        Path::new(&self.file).file_name().and_then(|n| n.to_str())
    }
}

/// Append-only JSONL writer.
pub struct ManifestWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl ManifestWriter {
    /// Create (or truncate) the manifest, creating parent directories.
    pub fn create(path: &Path) -> Result<Self, ManifestError> {
        let io_err = |e| ManifestError::Io(path.to_path_buf(), e);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let file = File::create(path).map_err(io_err)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn append(&mut self, record: &ManifestRecord) -> Result<(), ManifestError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| ManifestError::Io(self.path.clone(), e))?;
        self.written += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records_written(&self) -> usize {
        self.written
    }
}

/// Read a manifest into `file name -> record`.
///
/// Blank lines are skipped. If two lines share a file name the later one wins.
pub fn read_manifest(path: &Path) -> Result<BTreeMap<String, ManifestRecord>, ManifestError> {
    let file = File::open(path).map_err(|e| ManifestError::Io(path.to_path_buf(), e))?;
    let mut records = BTreeMap::new();

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ManifestError::Io(path.to_path_buf(), e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ManifestRecord = serde_json::from_str(line).map_err(|source| {
            ManifestError::Parse { path: path.to_path_buf(), line: i + 1, source }
        })?;
        let Some(name) = record.file_name().map(str::to_string) else {
            continue;
        };
        if records.contains_key(&name) {
            tracing::debug!(file = %name, "Duplicate manifest entry, keeping the later line");
        }
        records.insert(name, record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::HexColor;

    fn record(file: &str, palette_id: &str) -> ManifestRecord {
        ManifestRecord {
            file: file.to_string(),
            pattern: "calico".to_string(),
            slots: 2,
            category: PaletteCategory::Natural,
            palette_id: palette_id.to_string(),
            palette_colors: vec!["#000000".into(), "#ffffff".into()],
            color_tuple: ColorTuple::new(vec![
                HexColor::new(0, 0, 0),
                HexColor::new(255, 255, 255),
            ]),
            variant_key: "abc".to_string(),
            ts: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_write_then_read_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifests/generated.jsonl");
        let mut writer = ManifestWriter::create(&path).unwrap();
        writer.append(&record("out/png/calico__bw__000000.png", "bw")).unwrap();
        writer.append(&record("out/png/calico__bw__000001.png", "bw")).unwrap();
        assert_eq!(writer.records_written(), 2);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains(r##""color_tuple":["#000000","#FFFFFF"]"##));

        let map = read_manifest(&path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["calico__bw__000001.png"].palette_id, "bw");
    }

    #[test]
    fn test_lines_visible_before_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.jsonl");
        let mut writer = ManifestWriter::create(&path).unwrap();
        writer.append(&record("a.png", "bw")).unwrap();
        // flushed per line: another reader sees it while the writer is alive
        assert_eq!(read_manifest(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_file_names_last_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.jsonl");
        let first = serde_json::to_string(&record("x/a.png", "first")).unwrap();
        let second = serde_json::to_string(&record("y/a.png", "second")).unwrap();
        fs::write(&path, format!("{}\n\n{}\n", first, second)).unwrap();

        let map = read_manifest(&path).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["a.png"].palette_id, "second");
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.jsonl");
        fs::write(&path, "{not json}\n").unwrap();
        assert!(matches!(
            read_manifest(&path),
            Err(ManifestError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_lines_without_tuple_still_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.jsonl");
        fs::write(
            &path,
            concat!(
                r##"{"file": "art/generated/png/cow__cow_bw__000000.png", "pattern": "cow", "slots": 2, "##,
                r##""category": "natural", "palette_id": "cow_bw", "palette_colors": ["#000000", "#FFFFFF"], "##,
                r##""seed": "42:cow:0", "ts": "2025-01-01T00:00:00Z"}"##,
                "\n"
            ),
        )
        .unwrap();

        let map = read_manifest(&path).unwrap();
        let rec = &map["cow__cow_bw__000000.png"];
        assert!(rec.color_tuple.is_empty());
        assert_eq!(rec.variant_key, "");
        assert_eq!(rec.palette_colors, ["#000000", "#FFFFFF"]);
    }
}

//! Preview Composition
//!
//! Replays manifest records over the original pattern sprites and lays a
//! base outline on top, one preview PNG per record, named like the
//! generated file. Records that cannot be replayed are counted and skipped.

use image::{imageops, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::color::HexColor;
use crate::enumerate::ColorTuple;
use crate::manifest::{read_manifest, ManifestError, ManifestRecord};
use crate::palettes::PaletteCatalog;
use crate::recolor::recolor;
use crate::slots::{extract_slots, SlotColorSequence};

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Failed to decode {0}: {1}")]
    Decode(PathBuf, #[source] image::ImageError),

    #[error("Failed to write image {0}: {1}")]
    Encode(PathBuf, #[source] image::ImageError),

    #[error("I/O error on {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub manifest_path: PathBuf,
    pub pattern_dir: PathBuf,
    /// Outline drawn over every recolored pattern.
    pub base_path: PathBuf,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeReport {
    pub written: usize,
    pub missing_pattern: usize,
    pub no_colors: usize,
    pub slot_mismatch: usize,
    pub out_dir: String,
}

/// Colors to replay for a record: the recorded tuple, else the catalog
/// palette of the same id, else the palette colors stored on the line.
pub fn replay_colors(record: &ManifestRecord, catalog: &PaletteCatalog) -> Option<ColorTuple> {
    if !record.color_tuple.is_empty() {
        return Some(record.color_tuple.clone());
    }
    if let Some(palette) = catalog.get(&record.palette_id) {
        return Some(ColorTuple::new(palette.hex_colors().to_vec()));
    }
    let parsed: Result<Vec<HexColor>, _> =
        record.palette_colors.iter().map(|c| HexColor::parse(c)).collect();
    match parsed {
        Ok(colors) if !colors.is_empty() => Some(ColorTuple::new(colors)),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(file = %record.file, error = %e, "Unparseable palette colors in manifest");
            None
        }
    }
}

/// Pattern layer first, base outline over it, on a canvas the size of the base.
pub fn compose_over_base(layer: &RgbaImage, base: &RgbaImage) -> RgbaImage {
    let (w, h) = base.dimensions();
    let mut canvas = RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]));
    imageops::overlay(&mut canvas, layer, 0, 0);
    imageops::overlay(&mut canvas, base, 0, 0);
    canvas
}

pub fn compose(request: &ComposeRequest, catalog: &PaletteCatalog) -> Result<ComposeReport, ComposeError> {
    let manifest = read_manifest(&request.manifest_path)?;
    let base = image::open(&request.base_path)
        .map(|img| img.to_rgba8())
        .map_err(|e| ComposeError::Decode(request.base_path.clone(), e))?;
    fs::create_dir_all(&request.out_dir).map_err(|e| ComposeError::Io(request.out_dir.clone(), e))?;

    let mut report = ComposeReport {
        out_dir: request.out_dir.to_string_lossy().replace('\\', "/"),
        ..Default::default()
    };
    let mut sprites: HashMap<String, Option<(RgbaImage, SlotColorSequence)>> = HashMap::new();

    for (file_name, record) in &manifest {
        if !sprites.contains_key(&record.pattern) {
            let loaded = load_pattern(&request.pattern_dir, &record.pattern)?;
            sprites.insert(record.pattern.clone(), loaded);
        }
        let Some(Some((sprite, slots))) = sprites.get(&record.pattern) else {
            report.missing_pattern += 1;
            continue;
        };
        let Some(colors) = replay_colors(record, catalog) else {
            report.no_colors += 1;
            continue;
        };
        if colors.len() != slots.len() {
            tracing::debug!(file = %file_name, slots = slots.len(), colors = colors.len(), "Slot count mismatch, skipping");
            report.slot_mismatch += 1;
            continue;
        }

        let preview = compose_over_base(&recolor(sprite, slots, &colors), &base);
        let out_path = request.out_dir.join(file_name);
        preview
            .save_with_format(&out_path, ImageFormat::Png)
            .map_err(|e| ComposeError::Encode(out_path.clone(), e))?;
        report.written += 1;
    }

    tracing::info!(
        written = report.written,
        missing_pattern = report.missing_pattern,
        no_colors = report.no_colors,
        slot_mismatch = report.slot_mismatch,
        "Previews composed"
    );
    Ok(report)
}

/// `None` when the pattern file is gone.
fn load_pattern(dir: &Path, name: &str) -> Result<Option<(RgbaImage, SlotColorSequence)>, ComposeError> {
    let path = dir.join(format!("{}.png", name));
    if !path.is_file() {
        tracing::warn!(pattern = %name, path = %path.display(), "Pattern sprite not found");
        return Ok(None);
    }
    let sprite = image::open(&path)
        .map(|img| img.to_rgba8())
        .map_err(|e| ComposeError::Decode(path.clone(), e))?;
    let slots = extract_slots(&sprite);
    Ok(Some((sprite, slots)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palettes::PaletteCategory;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
    const INK: Rgba<u8> = Rgba([10, 10, 10, 255]);

    fn catalog() -> PaletteCatalog {
        PaletteCatalog::from_json_str(
            r##"{"natural_palettes": [{"id": "bw", "colors": ["#000000", "#FFFFFF"]}]}"##,
        )
        .unwrap()
    }

    fn record(file: &str, pattern: &str, palette_id: &str, tuple: &[&str]) -> ManifestRecord {
        ManifestRecord {
            file: file.to_string(),
            pattern: pattern.to_string(),
            slots: 2,
            category: PaletteCategory::Natural,
            palette_id: palette_id.to_string(),
            palette_colors: vec!["#0000FF".into(), "#FFFF00".into()],
            color_tuple: ColorTuple::new(tuple.iter().map(|c| HexColor::parse(c).unwrap()).collect()),
            variant_key: String::new(),
            ts: String::new(),
        }
    }

    #[test]
    fn test_replay_colors_fallback_order() {
        let cat = catalog();
        let recorded = record("a.png", "duo", "bw", &["#FFFFFF", "#000000"]);
        assert_eq!(replay_colors(&recorded, &cat).unwrap().to_hex_strings(), ["#FFFFFF", "#000000"]);

        let from_catalog = record("a.png", "duo", "bw", &[]);
        assert_eq!(replay_colors(&from_catalog, &cat).unwrap().to_hex_strings(), ["#000000", "#FFFFFF"]);

        let from_line = record("a.png", "duo", "gone", &[]);
        assert_eq!(replay_colors(&from_line, &cat).unwrap().to_hex_strings(), ["#0000FF", "#FFFF00"]);

        let mut nothing = record("a.png", "duo", "gone", &[]);
        nothing.palette_colors.clear();
        assert!(replay_colors(&nothing, &cat).is_none());
    }

    #[test]
    fn test_base_drawn_over_pattern() {
        let layer = RgbaImage::from_fn(2, 1, |x, _| if x == 0 { RED } else { GREEN });
        let base = RgbaImage::from_fn(3, 1, |x, _| if x == 1 { INK } else { CLEAR });
        let out = compose_over_base(&layer, &base);
        assert_eq!(out.dimensions(), (3, 1));
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(1, 0), INK);
        assert_eq!(*out.get_pixel(2, 0), CLEAR);
    }

    #[test]
    fn test_compose_replays_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let patterns = root.join("patterns");
        fs::create_dir_all(&patterns).unwrap();
        // red x2, green x1, one transparent pixel
        let px = [RED, GREEN, RED, CLEAR];
        RgbaImage::from_fn(2, 2, |x, y| px[(y * 2 + x) as usize])
            .save(patterns.join("duo.png"))
            .unwrap();
        RgbaImage::from_fn(2, 2, |x, y| if (x, y) == (1, 1) { INK } else { CLEAR })
            .save(root.join("base.png"))
            .unwrap();

        let lines = [
            record("gen/duo__bw__000000.png", "duo", "bw", &["#FFFFFF", "#000000"]),
            record("gen/duo__bw__000001.png", "duo", "bw", &["#FFFFFF"]),
            record("gen/gone__bw__000000.png", "gone", "bw", &["#FFFFFF", "#000000"]),
        ];
        let manifest = root.join("generated.jsonl");
        let body: Vec<String> = lines.iter().map(|r| serde_json::to_string(r).unwrap()).collect();
        fs::write(&manifest, body.join("\n")).unwrap();

        let request = ComposeRequest {
            manifest_path: manifest,
            pattern_dir: patterns,
            base_path: root.join("base.png"),
            out_dir: root.join("preview"),
        };
        let report = compose(&request, &catalog()).unwrap();
        assert_eq!((report.written, report.slot_mismatch, report.missing_pattern), (1, 1, 1));

        let out = image::open(root.join("preview/duo__bw__000000.png")).unwrap().to_rgba8();
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(1, 0), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(0, 1), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(1, 1), INK);
    }
}

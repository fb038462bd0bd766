//! Palette Catalog - Configuration Contract
//!
//! One JSON document names every palette and the global output settings.
//! It is loaded once and never mutated.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::color::{ColorError, HexColor};

pub type PaletteId = String;

/// Joins pattern, palette id and index in output file names; neither a
/// pattern name nor a palette id may contain it.
pub const NAME_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read palette catalog {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Invalid palette catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Palette '{0}' has an invalid color: {1}")]
    InvalidColor(PaletteId, #[source] ColorError),

    #[error("Palette entry #{0} in {1} has no id")]
    MissingId(usize, &'static str),

    #[error("Duplicate palette id: {0}")]
    DuplicateId(PaletteId),

    #[error("Palette id '{0}' contains the reserved separator '__'")]
    ReservedSeparator(PaletteId),

    #[error("Invalid global setting {0}: {1}")]
    InvalidGlobal(&'static str, String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PaletteCategory {
    Natural,
    Special,
}

impl PaletteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Special => "special",
        }
    }
}

/// Per-category counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub natural: usize,
    pub special: usize,
}

impl CategoryTotals {
    pub fn add(&mut self, category: PaletteCategory) {
        match category {
            PaletteCategory::Natural => self.natural += 1,
            PaletteCategory::Special => self.special += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.natural + self.special
    }
}

/// How the generator reacts to alpha-structure violations in a pattern.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    Block,
    #[default]
    Warn,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_image_size")]
    pub image_size: [u32; 2],
    #[serde(default = "default_quantize_colors")]
    pub quantize_colors: u32,
    #[serde(default)]
    pub dither: bool,
    #[serde(default)]
    pub alpha_policy: FailureMode,
}

fn default_image_size() -> [u32; 2] { [24, 24] }
fn default_quantize_colors() -> u32 { 16 }

pub const MAX_QUANTIZE_COLORS: u32 = 256;

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            image_size: default_image_size(),
            quantize_colors: default_quantize_colors(),
            dither: false,
            alpha_policy: FailureMode::default(),
        }
    }
}

impl GlobalConfig {
    fn check(&self) -> Result<(), CatalogError> {
        if self.image_size[0] == 0 || self.image_size[1] == 0 {
            return Err(CatalogError::InvalidGlobal(
                "image_size",
                format!("{}x{}", self.image_size[0], self.image_size[1]),
            ));
        }
        if self.quantize_colors == 0 || self.quantize_colors > MAX_QUANTIZE_COLORS {
            return Err(CatalogError::InvalidGlobal(
                "quantize_colors",
                format!("{} (expected 1..={})", self.quantize_colors, MAX_QUANTIZE_COLORS),
            ));
        }
        Ok(())
    }
}

/// Raw palette entry as written in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteEntry {
    #[serde(default, alias = "name")]
    pub id: Option<PaletteId>,
    #[serde(default)]
    pub colors: Vec<String>,
}

/// The catalog document. Unknown top-level keys are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub natural_palettes: Vec<PaletteEntry>,
    #[serde(default)]
    pub special_palettes: Vec<PaletteEntry>,
    #[serde(default)]
    pub global: GlobalConfig,
}

/// A validated palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub id: PaletteId,
    pub category: PaletteCategory,
    /// Native color list exactly as written in the catalog.
    pub colors: Vec<String>,
    parsed: Vec<HexColor>,
}

impl Palette {
    pub fn new(
        id: impl Into<PaletteId>,
        category: PaletteCategory,
        colors: Vec<String>,
    ) -> Result<Self, CatalogError> {
        let id = id.into();
        let parsed = colors
            .iter()
            .map(|c| HexColor::parse(c))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::InvalidColor(id.clone(), e))?;
        Ok(Self { id, category, colors, parsed })
    }

    pub fn hex_colors(&self) -> &[HexColor] {
        &self.parsed
    }

    pub fn len(&self) -> usize {
        self.parsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsed.is_empty()
    }
}

/// Palette catalog - palettes sorted by (category, id) plus global settings
#[derive(Debug, Clone)]
pub struct PaletteCatalog {
    palettes: Vec<Palette>,
    global: GlobalConfig,
}

impl PaletteCatalog {
    pub fn new(mut palettes: Vec<Palette>, global: GlobalConfig) -> Result<Self, CatalogError> {
        global.check()?;

        let mut seen = HashSet::new();
        for p in &palettes {
            if p.id.contains(NAME_SEPARATOR) {
                return Err(CatalogError::ReservedSeparator(p.id.clone()));
            }
            if !seen.insert(p.id.as_str()) {
                return Err(CatalogError::DuplicateId(p.id.clone()));
            }
        }

        palettes.sort_by(|a, b| (a.category, &a.id).cmp(&(b.category, &b.id)));
        Ok(Self { palettes, global })
    }

    pub fn from_document(doc: CatalogDocument) -> Result<Self, CatalogError> {
        let groups = [
            ("natural_palettes", PaletteCategory::Natural, doc.natural_palettes),
            ("special_palettes", PaletteCategory::Special, doc.special_palettes),
        ];

        let mut palettes = vec![];
        for (key, category, entries) in groups {
            for (i, entry) in entries.into_iter().enumerate() {
                let id = entry
                    .id
                    .filter(|id| !id.is_empty())
                    .ok_or(CatalogError::MissingId(i, key))?;
                palettes.push(Palette::new(id, category, entry.colors)?);
            }
        }

        Self::new(palettes, doc.global)
    }

    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(content)?;
        Self::from_document(doc)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)
            .map_err(|e| CatalogError::Io(path.to_path_buf(), e))?;
        Self::from_json_str(&content)
    }

    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    /// Palettes in generation order.
    pub fn list(&self) -> &[Palette] {
        &self.palettes
    }

    pub fn get(&self, id: &str) -> Option<&Palette> {
        self.palettes.iter().find(|p| p.id == id)
    }

    pub fn category_of(&self, id: &str) -> Option<PaletteCategory> {
        self.get(id).map(|p| p.category)
    }

    /// Category lookup for ids recovered from file names, which may differ
    /// from the catalog in ASCII case.
    pub fn category_of_ignore_case(&self, id: &str) -> Option<PaletteCategory> {
        self.category_of(id).or_else(|| {
            self.palettes
                .iter()
                .find(|p| p.id.eq_ignore_ascii_case(id))
                .map(|p| p.category)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r##"{
        "weights": {"natural": 1.0, "special": 0.0},
        "special_palettes": [
            {"id": "zombie", "colors": ["#3B5323", "#8B0000"]}
        ],
        "natural_palettes": [
            {"id": "orange_warm", "colors": ["#ff9933", "#FFFFFF"]},
            {"name": "black_white", "colors": ["#000000", "#FFFFFF"]}
        ],
        "global": {"image_size": [32, 32], "dither": true}
    }"##;

    #[test]
    fn test_catalog_sorted_by_category_then_id() {
        let catalog = PaletteCatalog::from_json_str(CATALOG).unwrap();
        let ids: Vec<_> = catalog.list().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["black_white", "orange_warm", "zombie"]);
        assert_eq!(catalog.category_of("zombie"), Some(PaletteCategory::Special));
    }

    #[test]
    fn test_global_defaults_fill_missing_keys() {
        let catalog = PaletteCatalog::from_json_str(CATALOG).unwrap();
        let g = catalog.global();
        assert_eq!(g.image_size, [32, 32]);
        assert_eq!(g.quantize_colors, 16);
        assert!(g.dither);
        assert_eq!(g.alpha_policy, FailureMode::Warn);
    }

    #[test]
    fn test_native_colors_preserved() {
        let catalog = PaletteCatalog::from_json_str(CATALOG).unwrap();
        let p = catalog.get("orange_warm").unwrap();
        assert_eq!(p.colors, ["#ff9933", "#FFFFFF"]);
        assert_eq!(p.hex_colors()[0].to_string(), "#FF9933");
    }

    #[test]
    fn test_invalid_color_rejected() {
        let json = r##"{"natural_palettes": [{"id": "bad", "colors": ["#12345"]}]}"##;
        let err = PaletteCatalog::from_json_str(json).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidColor(id, _) if id == "bad"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let json = r##"{
            "natural_palettes": [{"id": "dup", "colors": ["#000000"]}],
            "special_palettes": [{"id": "dup", "colors": ["#FFFFFF"]}]
        }"##;
        assert!(matches!(
            PaletteCatalog::from_json_str(json),
            Err(CatalogError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_quantize_colors_range_checked() {
        let json = r#"{"global": {"quantize_colors": 0}}"#;
        assert!(matches!(
            PaletteCatalog::from_json_str(json),
            Err(CatalogError::InvalidGlobal("quantize_colors", _))
        ));
    }

    #[test]
    fn test_separator_in_id_rejected() {
        let json = r##"{"natural_palettes": [{"id": "b__p", "colors": ["#000000"]}]}"##;
        assert!(matches!(
            PaletteCatalog::from_json_str(json),
            Err(CatalogError::ReservedSeparator(id)) if id == "b__p"
        ));
        // a single underscore is fine
        assert!(PaletteCatalog::from_json_str(r##"{"natural_palettes": [{"id": "b_p", "colors": []}]}"##).is_ok());
    }

    #[test]
    fn test_category_lookup_ignoring_case() {
        let json = r##"{"natural_palettes": [{"id": "Orange_Warm", "colors": ["#FF9933"]}]}"##;
        let catalog = PaletteCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.category_of("orange_warm"), None);
        assert_eq!(catalog.category_of_ignore_case("orange_warm"), Some(PaletteCategory::Natural));
        assert_eq!(catalog.category_of_ignore_case("ORANGE_WARM"), Some(PaletteCategory::Natural));
        assert_eq!(catalog.category_of_ignore_case("orange"), None);
    }
}

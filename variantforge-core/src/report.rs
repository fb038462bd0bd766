//! Counting report over a curated directory.
//!
//! File names follow `<pattern>__<palette>__<digits>.png`; palette
//! categories come from the catalog.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::discovery::{self, DiscoveryError};
use crate::palettes::{CategoryTotals, PaletteCatalog, NAME_SEPARATOR};

/// Split a generated file name into `(pattern, palette, index)`.
///
/// The last two separators win. Names are compared lowercased.
pub fn parse_output_name(file_name: &str) -> Option<(String, String, u64)> {
    let lower = file_name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".png")?;
    let mut parts = stem.rsplitn(3, NAME_SEPARATOR);
    let (index, palette, pattern) = (parts.next()?, parts.next()?, parts.next()?);

    let is_ident = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    };
    if !is_ident(pattern) || !is_ident(palette) {
        return None;
    }
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((pattern.to_string(), palette.to_string(), index.parse().ok()?))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteCount {
    pub palette: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCount {
    pub pattern: String,
    pub total: usize,
    pub natural: usize,
    pub special: usize,
    /// Most frequent first, then by name.
    pub palettes: Vec<PaletteCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCounts {
    pub directory: String,
    pub total_png: usize,
    pub mismatched: usize,
    pub unknown_pattern: usize,
    pub by_category: CategoryTotals,
    pub unknown_palette: usize,
    pub patterns: Vec<PatternCount>,
}

#[derive(Default)]
struct Tally {
    total: usize,
    totals: CategoryTotals,
    palettes: BTreeMap<String, usize>,
}

/// Count PNGs in `dir` by pattern, palette and category.
///
/// With a `pattern_filter`, files for other patterns are counted as
/// `unknown_pattern` and every filtered pattern is listed, even at zero.
pub fn count_selected(
    dir: &Path,
    catalog: &PaletteCatalog,
    pattern_filter: Option<&[String]>,
) -> Result<SelectionCounts, DiscoveryError> {
    let mut counts = SelectionCounts {
        directory: dir.to_string_lossy().replace('\\', "/"),
        ..Default::default()
    };
    let filter: Option<Vec<String>> =
        pattern_filter.map(|f| f.iter().map(|p| p.trim().to_ascii_lowercase()).collect());

    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();
    if let Some(f) = &filter {
        for p in f {
            tallies.entry(p.clone()).or_default();
        }
    }

    for path in discovery::find_pngs(dir, false)? {
        counts.total_png += 1;
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let Some((pattern, palette, _)) = parse_output_name(&name) else {
            counts.mismatched += 1;
            continue;
        };
        if filter.as_ref().is_some_and(|f| !f.contains(&pattern)) {
            counts.unknown_pattern += 1;
            continue;
        }

        let tally = tallies.entry(pattern).or_default();
        tally.total += 1;
        match catalog.category_of_ignore_case(&palette) {
            Some(category) => {
                tally.totals.add(category);
                counts.by_category.add(category);
            }
            None => counts.unknown_palette += 1,
        }
        *tally.palettes.entry(palette).or_default() += 1;
    }

    let order: Vec<String> = match filter {
        Some(f) => f,
        None => tallies.keys().cloned().collect(),
    };
    for pattern in order {
        let Some(tally) = tallies.remove(&pattern) else {
            continue;
        };
        let mut palettes: Vec<PaletteCount> = tally
            .palettes
            .into_iter()
            .map(|(palette, count)| PaletteCount { palette, count })
            .collect();
        palettes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.palette.cmp(&b.palette)));

        counts.patterns.push(PatternCount {
            pattern,
            total: tally.total,
            natural: tally.totals.natural,
            special: tally.totals.special,
            palettes,
        });
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn catalog() -> PaletteCatalog {
        PaletteCatalog::from_json_str(
            r##"{
                "natural_palettes": [{"id": "black_white", "colors": ["#000000", "#FFFFFF"]}],
                "special_palettes": [{"id": "zombie", "colors": ["#3B5323", "#8B0000"]}]
            }"##,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_output_name() {
        assert_eq!(
            parse_output_name("classic_tabby__black_white__000123.png"),
            Some(("classic_tabby".into(), "black_white".into(), 123))
        );
        assert_eq!(
            parse_output_name("Calico__Zombie__7.PNG"),
            Some(("calico".into(), "zombie".into(), 7))
        );
        assert_eq!(parse_output_name("calico.png"), None);
        assert_eq!(parse_output_name("calico__bw__12a.png"), None);
        assert_eq!(parse_output_name("cal-ico__bw__1.png"), None);
    }

    #[test]
    fn test_counts_by_pattern_palette_and_category() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "calico__black_white__000000.png",
            "calico__black_white__000001.png",
            "calico__zombie__000002.png",
            "tuxedo__mystery__000000.png",
            "random.png",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let counts = count_selected(dir.path(), &catalog(), None).unwrap();
        assert_eq!(counts.total_png, 5);
        assert_eq!(counts.mismatched, 1);
        assert_eq!(counts.by_category, CategoryTotals { natural: 2, special: 1 });
        assert_eq!(counts.unknown_palette, 1);

        let calico = &counts.patterns[0];
        assert_eq!(calico.pattern, "calico");
        assert_eq!((calico.total, calico.natural, calico.special), (3, 2, 1));
        assert_eq!(calico.palettes[0], PaletteCount { palette: "black_white".into(), count: 2 });
    }

    #[test]
    fn test_filter_lists_empty_patterns_and_flags_unknown() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("calico__zombie__000000.png"), b"").unwrap();

        let filter = vec!["solid".to_string()];
        let counts = count_selected(dir.path(), &catalog(), Some(filter.as_slice())).unwrap();
        assert_eq!(counts.unknown_pattern, 1);
        assert_eq!(counts.patterns.len(), 1);
        assert_eq!(counts.patterns[0].pattern, "solid");
        assert_eq!(counts.patterns[0].total, 0);
    }

    #[test]
    fn test_mixed_case_catalog_ids_resolve() {
        let catalog = PaletteCatalog::from_json_str(
            r##"{"natural_palettes": [{"id": "Orange_Warm", "colors": ["#FF9933", "#FFFFFF"]}]}"##,
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("calico__Orange_Warm__000000.png"), b"").unwrap();

        let counts = count_selected(dir.path(), &catalog, None).unwrap();
        assert_eq!(counts.by_category, CategoryTotals { natural: 1, special: 0 });
        assert_eq!(counts.unknown_palette, 0);
        assert_eq!(counts.patterns[0].natural, 1);
    }
}

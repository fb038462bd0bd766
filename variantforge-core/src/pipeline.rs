//! Variant Generation Pipeline - Single Entry Point
//!
//! patterns (sorted) x palettes (sorted) x enumerated tuples, in that loop
//! order. Every accepted variant is recolored, normalized, written as PNG,
//! and then recorded in the manifest. A run is byte-reproducible given the
//! same patterns, catalog and timestamp.
//!
//! CRITICAL: the image is written before its manifest line. A failed write
//! aborts the run without recording that file.

use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::discovery::{self, DiscoveryError};
use crate::enumerate::{enumerate, ColorTuple};
use crate::hashing::compute_variant_key;
use crate::manifest::{ManifestError, ManifestRecord, ManifestWriter};
use crate::normalize::Normalizer;
use crate::palettes::{CatalogError, CategoryTotals, FailureMode, Palette, PaletteCatalog, NAME_SEPARATOR};
use crate::recolor::recolor;
use crate::slots::{extract_slots, SlotColorSequence};
use crate::validation::{ValidationResult, Validator};
use crate::ENGINE_VERSION;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Palette catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Pattern discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Duplicate pattern name: {0}")]
    DuplicatePattern(String),

    #[error("Pattern file name is not valid UTF-8: {0}")]
    NonUtf8PatternName(PathBuf),

    #[error("Pattern name '{0}' contains the reserved separator '__'")]
    ReservedSeparator(String),

    #[error("Failed to decode pattern {0}: {1}")]
    Decode(PathBuf, #[source] image::ImageError),

    #[error("Failed to write image {0}: {1}")]
    Encode(PathBuf, #[source] image::ImageError),

    #[error("I/O error on {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A pattern sprite on disk, named by its file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSource {
    pub name: String,
    pub path: PathBuf,
}

impl PatternSource {
    /// Name a sprite by its file stem. The stem becomes the first field of
    /// every output name, so it must be UTF-8 and free of the separator.
    pub fn from_path(path: PathBuf) -> Result<Self, PipelineError> {
        let name = discovery::stem(&path).ok_or_else(|| PipelineError::NonUtf8PatternName(path.clone()))?;
        if name.contains(NAME_SEPARATOR) {
            return Err(PipelineError::ReservedSeparator(name));
        }
        Ok(Self { name, path })
    }

    pub fn load(&self) -> Result<RgbaImage, PipelineError> {
        image::open(&self.path)
            .map(|img| img.to_rgba8())
            .map_err(|e| PipelineError::Decode(self.path.clone(), e))
    }
}

/// Discover pattern sprites in `dir`, sorted by name.
pub fn discover_patterns(dir: &Path) -> Result<Vec<PatternSource>, PipelineError> {
    let mut patterns = discovery::find_pngs(dir, false)?
        .into_iter()
        .map(PatternSource::from_path)
        .collect::<Result<Vec<_>, _>>()?;
    patterns.sort_by(|a, b| a.name.cmp(&b.name));

    for pair in patterns.windows(2) {
        if pair[0].name == pair[1].name {
            return Err(PipelineError::DuplicatePattern(pair[0].name.clone()));
        }
    }
    Ok(patterns)
}

/// Output file name: `<pattern>__<palette>__<index:06>.png`.
pub fn output_file_name(pattern: &str, palette_id: &str, index: usize) -> String {
    format!("{pattern}{sep}{palette_id}{sep}{index:06}.png", sep = NAME_SEPARATOR)
}

/// Dedup identity: a pattern may render a given tuple at most once per run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub pattern: String,
    pub tuple: ColorTuple,
}

/// Run-wide mutable state, owned by the single orchestrating caller.
#[derive(Debug)]
pub struct GenerationContext {
    seen: HashSet<VariantKey>,
    totals: CategoryTotals,
    duplicates_skipped: usize,
    timestamp: String,
}

impl GenerationContext {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            seen: HashSet::new(),
            totals: CategoryTotals::default(),
            duplicates_skipped: 0,
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Returns false (and counts a skip) if this pattern already used `tuple`.
    pub fn admit(&mut self, pattern: &str, tuple: &ColorTuple) -> bool {
        let key = VariantKey {
            pattern: pattern.to_string(),
            tuple: tuple.clone(),
        };
        if self.seen.insert(key) {
            true
        } else {
            self.duplicates_skipped += 1;
            false
        }
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn totals(&self) -> CategoryTotals {
        self.totals
    }

    pub fn duplicates_skipped(&self) -> usize {
        self.duplicates_skipped
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub pattern_dir: PathBuf,
    pub out_dir: PathBuf,
    pub manifest_path: PathBuf,
    /// Pinned run timestamp; `None` uses the current time.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSummary {
    pub pattern: String,
    pub slots: usize,
    pub variants: usize,
    pub duplicates_skipped: usize,
    /// Palettes whose enumeration was empty for this slot count.
    pub empty_palettes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub engine_version: String,
    pub manifest: String,
    pub out_dir: String,
    pub timestamp: String,
    pub patterns: Vec<PatternSummary>,
    pub total_variants: usize,
    pub by_category: CategoryTotals,
    pub duplicates_skipped: usize,
}

/// The generation pipeline - single entry point for producing variants
pub struct VariantGenerator {
    catalog: PaletteCatalog,
    normalizer: Normalizer,
    validator: Validator,
}

impl VariantGenerator {
    pub fn new(catalog: PaletteCatalog) -> Self {
        let normalizer = Normalizer::from_global(catalog.global());
        Self {
            catalog,
            normalizer,
            validator: Validator::for_patterns(),
        }
    }

    pub fn catalog(&self) -> &PaletteCatalog {
        &self.catalog
    }

    /// Run a full generation.
    ///
    /// Configuration problems (missing pattern dir) surface before anything
    /// is written. After that, any decode/encode/manifest error aborts the
    /// run; manifest lines already written stay valid.
    pub fn run(&self, request: &GenerateRequest) -> Result<GenerationReport, PipelineError> {
        let patterns = discover_patterns(&request.pattern_dir)?;

        fs::create_dir_all(&request.out_dir)
            .map_err(|e| PipelineError::Io(request.out_dir.clone(), e))?;
        let mut writer = ManifestWriter::create(&request.manifest_path)?;
        let mut ctx = GenerationContext::new(request.timestamp.unwrap_or_else(Utc::now));

        tracing::info!(
            patterns = patterns.len(),
            palettes = self.catalog.list().len(),
            out_dir = %request.out_dir.display(),
            "Starting variant generation"
        );

        let mut summaries = vec![];
        for pattern in &patterns {
            let sprite = pattern.load()?;
            let summary =
                self.generate_pattern(&mut ctx, &pattern.name, &sprite, &request.out_dir, &mut writer)?;
            summaries.push(summary);
        }

        let report = GenerationReport {
            engine_version: ENGINE_VERSION.to_string(),
            manifest: slash_path(writer.path()),
            out_dir: slash_path(&request.out_dir),
            timestamp: ctx.timestamp().to_string(),
            total_variants: writer.records_written(),
            patterns: summaries,
            by_category: ctx.totals(),
            duplicates_skipped: ctx.duplicates_skipped(),
        };

        tracing::info!(
            variants = report.total_variants,
            natural = report.by_category.natural,
            special = report.by_category.special,
            duplicates = report.duplicates_skipped,
            "Variant generation complete"
        );

        Ok(report)
    }

    /// Generate every variant of one pattern.
    pub fn generate_pattern(
        &self,
        ctx: &mut GenerationContext,
        name: &str,
        sprite: &RgbaImage,
        out_dir: &Path,
        writer: &mut ManifestWriter,
    ) -> Result<PatternSummary, PipelineError> {
        self.check_alpha(name, sprite)?;

        let slots = extract_slots(sprite);
        let mut summary = PatternSummary {
            pattern: name.to_string(),
            slots: slots.len(),
            ..Default::default()
        };

        if slots.is_empty() {
            tracing::info!(pattern = %name, "Pattern has no paintable pixels, skipping");
            return Ok(summary);
        }

        let skipped_before = ctx.duplicates_skipped();
        for palette in self.catalog.list() {
            let mut yielded = 0usize;
            for tuple in enumerate(slots.len(), palette.hex_colors()) {
                yielded += 1;
                if !ctx.admit(name, &tuple) {
                    tracing::debug!(pattern = %name, palette = %palette.id, tuple = %tuple, "Duplicate tuple skipped");
                    continue;
                }

                let file_name = output_file_name(name, &palette.id, summary.variants);
                let out_path = out_dir.join(&file_name);
                let image = self.render(sprite, &slots, &tuple);
                image
                    .save_with_format(&out_path, ImageFormat::Png)
                    .map_err(|e| PipelineError::Encode(out_path.clone(), e))?;

                writer.append(&self.record(ctx, name, &slots, palette, &tuple, &out_path)?)?;
                ctx.totals.add(palette.category);
                summary.variants += 1;
            }

            if yielded == 0 {
                summary.empty_palettes += 1;
                tracing::debug!(
                    pattern = %name,
                    palette = %palette.id,
                    slots = slots.len(),
                    colors = palette.len(),
                    "Palette yields no tuples for this slot count"
                );
            }
        }
        summary.duplicates_skipped = ctx.duplicates_skipped() - skipped_before;

        tracing::info!(
            pattern = %name,
            slots = summary.slots,
            variants = summary.variants,
            duplicates = summary.duplicates_skipped,
            "Pattern done"
        );
        Ok(summary)
    }

    /// recolor -> normalize, with no I/O.
    pub fn render(&self, sprite: &RgbaImage, slots: &SlotColorSequence, tuple: &ColorTuple) -> RgbaImage {
        self.normalizer.apply(&recolor(sprite, slots, tuple))
    }

    fn record(
        &self,
        ctx: &GenerationContext,
        pattern: &str,
        slots: &SlotColorSequence,
        palette: &Palette,
        tuple: &ColorTuple,
        out_path: &Path,
    ) -> Result<ManifestRecord, PipelineError> {
        Ok(ManifestRecord {
            file: slash_path(out_path),
            pattern: pattern.to_string(),
            slots: slots.len(),
            category: palette.category,
            palette_id: palette.id.clone(),
            palette_colors: palette.colors.clone(),
            color_tuple: tuple.clone(),
            variant_key: compute_variant_key(tuple)?,
            ts: ctx.timestamp().to_string(),
        })
    }

    fn check_alpha(&self, name: &str, sprite: &RgbaImage) -> Result<ValidationResult, PipelineError> {
        let policy = &self.catalog.global().alpha_policy;
        let result = self.validator.validate(sprite, name, policy);

        if !result.valid {
            let messages: Vec<_> = result.violations.iter()
                .map(|v| format!("{} {}: {}", name, v.rule, v.message))
                .collect();
            return Err(PipelineError::ValidationFailed(messages.join("; ")));
        }

        for v in &result.violations {
            match policy {
                FailureMode::Log => {
                    tracing::debug!(pattern = %name, rule = %v.rule, "{}", v.message)
                }
                _ => tracing::warn!(pattern = %name, rule = %v.rule, "{}", v.message),
            }
        }
        Ok(result)
    }
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

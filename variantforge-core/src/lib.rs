//! VariantForge Core - Deterministic Pixel-Art Variant Engine
//!
//! # The Five Laws (Non-Negotiable)
//! 1. Patterns Are Truth (sprites are read, never mutated)
//! 2. Enumeration Is Exhaustive and Ordered
//! 3. A Pattern Renders a Color Tuple At Most Once
//! 4. Alpha Survives Normalization Bit-for-Bit
//! 5. Manifests Enable Reproduction

pub mod color;
pub mod palettes;
pub mod slots;
pub mod enumerate;
pub mod recolor;
pub mod quantize;
pub mod normalize;
pub mod hashing;
pub mod manifest;
pub mod discovery;
pub mod validation;
pub mod pipeline;
pub mod selection;
pub mod report;
pub mod compose;

pub use color::{ColorError, HexColor};
pub use palettes::{CatalogError, CategoryTotals, GlobalConfig, Palette, PaletteCatalog, PaletteCategory, NAME_SEPARATOR};
pub use slots::{extract_slots, SlotColorSequence};
pub use enumerate::{enumerate, tuple_count, ColorTuple, EnumerationRegime};
pub use recolor::recolor;
pub use normalize::{normalize, Normalizer};
pub use hashing::{canonical_json, compute_variant_key, config_hash, file_sha256};
pub use manifest::{read_manifest, ManifestRecord, ManifestWriter};
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, Validator, ViolationSeverity};
pub use pipeline::{GenerateRequest, GenerationContext, GenerationReport, PipelineError, VariantGenerator};
pub use selection::{build_selection, SelectionDocument};
pub use report::{count_selected, SelectionCounts};
pub use compose::{compose, ComposeReport, ComposeRequest};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

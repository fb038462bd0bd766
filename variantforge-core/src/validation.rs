//! Validation System - Rule/Policy Separation
//!
//! Rules inspect an RGBA image and produce structured violations.
//! Policy (the catalog's `alpha_policy`) maps violations to actions.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::discovery::{find_pngs, DiscoveryError};
use crate::palettes::FailureMode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

/// A pixel that broke a rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PixelReport {
    pub x: u32,
    pub y: u32,
    pub rgba: [u8; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub pixels: Vec<PixelReport>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub source: String,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn success(source: &str) -> Self {
        Self {
            valid: true,
            source: source.to_string(),
            violations: vec![],
        }
    }

    pub fn failure(source: &str, violations: Vec<ValidationViolation>) -> Self {
        Self {
            valid: false,
            source: source.to_string(),
            violations,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, image: &RgbaImage) -> Vec<ValidationViolation>;
}

pub const MAX_REPORTED_PIXELS: usize = 10;

// --- Concrete Rules ---

/// Every pixel is fully transparent or fully opaque.
pub struct AlphaBinaryRule;

impl ValidationRule for AlphaBinaryRule {
    fn name(&self) -> &'static str { "alpha_binary" }

    fn validate(&self, image: &RgbaImage) -> Vec<ValidationViolation> {
        let pixels = collect_pixels(image, |[_, _, _, a]| a != 0 && a != 255);
        if pixels.is_empty() {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Error,
            message: "Semi-transparent pixels found (alpha must be 0 or 255)".to_string(),
            pixels,
            remediation: vec!["Threshold the alpha channel to 0/255 in the source sprite".to_string()],
        }]
    }
}

/// Every fully transparent pixel is black.
pub struct AlphaCleanRule;

impl ValidationRule for AlphaCleanRule {
    fn name(&self) -> &'static str { "alpha_clean" }

    fn validate(&self, image: &RgbaImage) -> Vec<ValidationViolation> {
        let pixels = collect_pixels(image, |[r, g, b, a]| a == 0 && (r | g | b) != 0);
        if pixels.is_empty() {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Error,
            message: "Transparent pixels carry non-black RGB".to_string(),
            pixels,
            remediation: vec!["Re-run normalization so background pixels become (0,0,0,0)".to_string()],
        }]
    }
}

fn collect_pixels(image: &RgbaImage, bad: impl Fn([u8; 4]) -> bool) -> Vec<PixelReport> {
    image
        .enumerate_pixels()
        .filter(|(_, _, px)| bad(px.0))
        .take(MAX_REPORTED_PIXELS)
        .map(|(x, y, px)| PixelReport { x, y, rgba: px.0 })
        .collect()
}

fn open_error(message: String) -> ValidationViolation {
    ValidationViolation {
        rule: "open_error".to_string(),
        severity: ViolationSeverity::Error,
        message,
        pixels: vec![],
        remediation: vec!["Check that the file is a readable PNG".to_string()],
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    /// The check applied to pattern sprites before extraction.
    pub fn for_patterns() -> Self {
        Self::new(vec![Box::new(AlphaBinaryRule)])
    }

    pub fn all() -> Self {
        Self::new(vec![Box::new(AlphaBinaryRule), Box::new(AlphaCleanRule)])
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn validate(&self, image: &RgbaImage, source: &str, mode: &FailureMode) -> ValidationResult {
        let mut all_violations = vec![];

        for rule in &self.rules {
            let violations = rule.validate(image);
            all_violations.extend(violations);
        }

        // Apply failure mode policy
        let has_errors = all_violations.iter()
            .any(|v| v.severity == ViolationSeverity::Error);

        match mode {
            FailureMode::Block if has_errors => {
                ValidationResult::failure(source, all_violations)
            }
            FailureMode::Block if all_violations.is_empty() => ValidationResult::success(source),
            FailureMode::Block | FailureMode::Warn | FailureMode::Log => {
                // Never block, just record
                ValidationResult {
                    valid: true,
                    source: source.to_string(),
                    violations: all_violations,
                }
            }
        }
    }

    /// Check every PNG under `target` (recursively), or `target` itself if it
    /// is a file. Files that fail to decode are reported, not fatal.
    pub fn verify_path(&self, target: &Path) -> Result<VerificationReport, DiscoveryError> {
        let files = find_pngs(target, true)?;
        let mut report = VerificationReport {
            target: target.to_path_buf(),
            files_checked: files.len(),
            failed: vec![],
        };

        for path in files {
            let source = path.to_string_lossy().replace('\\', "/");
            let result = match image::open(&path) {
                Ok(img) => self.validate(&img.to_rgba8(), &source, &FailureMode::Block),
                Err(e) => ValidationResult::failure(&source, vec![open_error(e.to_string())]),
            };
            if !result.valid {
                report.failed.push(result);
            }
        }

        Ok(report)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub target: PathBuf,
    pub files_checked: usize,
    pub failed: Vec<ValidationResult>,
}

/// Every checked file passed.
pub const EXIT_CLEAN: u8 = 0;
/// At least one file failed a rule.
pub const EXIT_VIOLATIONS: u8 = 1;
/// Nothing could be checked: missing path or no PNGs.
pub const EXIT_UNCHECKED: u8 = 2;

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn exit_code(&self) -> u8 {
        if self.files_checked == 0 {
            EXIT_UNCHECKED
        } else if self.is_clean() {
            EXIT_CLEAN
        } else {
            EXIT_VIOLATIONS
        }
    }
}

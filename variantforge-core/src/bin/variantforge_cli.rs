//! VariantForge CLI - batch front end
//!
//! Commands: generate, select, count, compose, verify-alpha
//! Outputs JSON to stdout, logs to stderr
//! Returns 1 on errors. verify-alpha: 0 clean, 1 violations, 2 nothing checked

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use variantforge_core::{
    compose::{compose, ComposeRequest},
    report::count_selected,
    selection::{build_selection, next_wave_path, write_selection},
    validation::{AlphaBinaryRule, AlphaCleanRule, ValidationRule, Validator, EXIT_UNCHECKED},
    GenerateRequest, PaletteCatalog, VariantGenerator,
};

#[derive(Parser)]
#[command(name = "variantforge-cli")]
#[command(about = "VariantForge CLI - Deterministic Pixel-Art Variant Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the palette catalog
    #[arg(short, long, global = true, default_value = "art/palettes/pattern_config.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every variant and the manifest
    Generate {
        /// Directory of pattern sprites (*.png)
        #[arg(short, long, default_value = "art/parts/patterns")]
        patterns: PathBuf,

        /// Output directory for generated PNGs
        #[arg(short, long, default_value = "art/generated/png")]
        out: PathBuf,

        /// Manifest path (JSON lines)
        #[arg(short, long, default_value = "manifests/generated.jsonl")]
        manifest: PathBuf,

        /// Pin the manifest timestamp (RFC 3339) for reproducible runs
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Reconcile a curated directory against the manifest
    Select {
        /// Curated directory of generated PNGs
        #[arg(default_value = "art/selected/png")]
        selected: PathBuf,

        /// Manifest path (JSON lines)
        #[arg(short, long, default_value = "manifests/generated.jsonl")]
        manifest: PathBuf,

        /// Output document (default: selected_wave{N}_{timestamp}.json next to the manifest)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Count curated PNGs by pattern, palette and category
    Count {
        /// Directory to scan
        #[arg(short, long, default_value = "art/selected/png")]
        dir: PathBuf,

        /// Comma-separated pattern names to report on
        #[arg(long, value_delimiter = ',')]
        patterns: Option<Vec<String>>,

        /// Show at most N palettes per pattern
        #[arg(long)]
        limit_palettes: Option<usize>,

        /// Include patterns with zero files
        #[arg(long)]
        show_empty: bool,
    },

    /// Recolor patterns from the manifest and draw the base outline over them
    Compose {
        /// Directory of pattern sprites (*.png)
        #[arg(short, long, default_value = "art/parts/patterns")]
        patterns: PathBuf,

        /// Base outline PNG
        #[arg(short, long, default_value = "art/base/base.PNG")]
        base: PathBuf,

        /// Manifest path (JSON lines)
        #[arg(short, long, default_value = "manifests/generated.jsonl")]
        manifest: PathBuf,

        /// Output directory for previews
        #[arg(short, long, default_value = "art/preview/png")]
        out: PathBuf,
    },

    /// Check alpha structure of PNGs under a path
    VerifyAlpha {
        /// File or directory (searched recursively)
        target: PathBuf,

        /// Which rule(s) to apply
        #[arg(short, long, value_enum, default_value_t = AlphaCheck::All)]
        rule: AlphaCheck,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AlphaCheck {
    /// alpha is 0 or 255 everywhere
    Binary,
    /// transparent pixels are black
    Clean,
    All,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "variantforge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { patterns, out, manifest, timestamp } => {
            let catalog = match load_catalog(&cli.config) {
                Ok(c) => c,
                Err(code) => return code,
            };
            let request = GenerateRequest {
                pattern_dir: patterns,
                out_dir: out,
                manifest_path: manifest,
                timestamp,
            };
            match VariantGenerator::new(catalog).run(&request) {
                Ok(report) => print_json(&serde_json::json!({ "success": true, "report": report })),
                Err(e) => fail(&e.to_string()),
            }
        }

        Commands::Select { selected, manifest, out } => {
            let doc = match build_selection(&selected, &manifest, &cli.config) {
                Ok(d) => d,
                Err(e) => return fail(&e.to_string()),
            };
            let out = match out {
                Some(p) => p,
                None => {
                    let dir = manifest.parent().unwrap_or(Path::new("."));
                    match next_wave_path(dir, Local::now().naive_local()) {
                        Ok(p) => p,
                        Err(e) => return fail(&e.to_string()),
                    }
                }
            };
            if let Err(e) = write_selection(&doc, &out) {
                return fail(&e.to_string());
            }
            tracing::info!(
                written = doc.count,
                missing = doc.missing.len(),
                out = %out.display(),
                "Selection document written"
            );
            print_json(&serde_json::json!({
                "success": true,
                "out": out.to_string_lossy(),
                "count": doc.count,
                "missing": doc.missing,
            }))
        }

        Commands::Count { dir, patterns, limit_palettes, show_empty } => {
            let catalog = match load_catalog(&cli.config) {
                Ok(c) => c,
                Err(code) => return code,
            };
            let mut counts = match count_selected(&dir, &catalog, patterns.as_deref()) {
                Ok(c) => c,
                Err(e) => return fail(&e.to_string()),
            };
            if !show_empty {
                counts.patterns.retain(|p| p.total > 0);
            }
            if let Some(limit) = limit_palettes {
                for p in &mut counts.patterns {
                    p.palettes.truncate(limit);
                }
            }
            print_json(&counts)
        }

        Commands::Compose { patterns, base, manifest, out } => {
            let catalog = match load_catalog(&cli.config) {
                Ok(c) => c,
                Err(code) => return code,
            };
            let request = ComposeRequest {
                manifest_path: manifest,
                pattern_dir: patterns,
                base_path: base,
                out_dir: out,
            };
            match compose(&request, &catalog) {
                Ok(report) => print_json(&serde_json::json!({ "success": true, "report": report })),
                Err(e) => fail(&e.to_string()),
            }
        }

        Commands::VerifyAlpha { target, rule } => {
            let rules: Vec<Box<dyn ValidationRule>> = match rule {
                AlphaCheck::Binary => vec![Box::new(AlphaBinaryRule)],
                AlphaCheck::Clean => vec![Box::new(AlphaCleanRule)],
                AlphaCheck::All => vec![Box::new(AlphaBinaryRule), Box::new(AlphaCleanRule)],
            };
            let unchecked = ExitCode::from(EXIT_UNCHECKED);
            let report = match Validator::new(rules).verify_path(&target) {
                Ok(r) => r,
                Err(e) => return fail_with(&e.to_string(), unchecked),
            };
            if report.files_checked == 0 {
                return fail_with("No PNG files found", unchecked);
            }
            match serde_json::to_string_pretty(&report) {
                Ok(s) => {
                    println!("{}", s);
                    ExitCode::from(report.exit_code())
                }
                Err(e) => fail(&e.to_string()),
            }
        }
    }
}

fn load_catalog(path: &Path) -> Result<PaletteCatalog, ExitCode> {
    PaletteCatalog::load_from_path(path).map_err(|e| fail(&e.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{}", s);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e.to_string()),
    }
}

fn fail(message: &str) -> ExitCode {
    fail_with(message, ExitCode::FAILURE)
}

fn fail_with(message: &str, code: ExitCode) -> ExitCode {
    tracing::error!("{}", message);
    let output = serde_json::json!({
        "success": false,
        "error": message,
    });
    println!("{}", output);
    code
}

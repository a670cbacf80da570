//! Batch image safety classifier.
//!
//! Walks a folder of images, deduplicates near-identical copies, scores
//! every survivor across several independent safety signals, and writes
//! one JSON report. See `imgsafe --help` for the full flag surface.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use imgsafe_core::config::{RunConfig, ThresholdConfig};
use imgsafe_core::{run_batch, TracingReporter};

#[derive(Parser, Debug)]
#[command(name = "imgsafe")]
#[command(about = "Batch image safety classifier: dedup, NSFW fusion, mosaic/POV detection")]
struct Args {
    /// Input file or directory to classify.
    #[arg(short, long)]
    input: PathBuf,

    /// Output JSON file. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Fused NSFW score at or above which an image is classified `nsfw`.
    #[arg(long, default_value_t = 0.30)]
    threshold: f32,

    /// Fused NSFW score below which an image may qualify for `super_safe`.
    #[arg(long = "super-safe-threshold", default_value_t = 0.15)]
    super_safe_threshold: f32,

    /// Minimum face score required for `super_safe`.
    #[arg(long = "min-face-score", default_value_t = 0.10)]
    min_face_score: f32,

    /// Hamming-distance threshold below which two images count as duplicates.
    #[arg(long = "dedup-threshold", default_value_t = 8)]
    dedup_threshold: u32,

    /// Skip mosaic/censorship detection.
    #[arg(long = "skip-mosaic")]
    skip_mosaic: bool,

    /// Skip POV-composition detection.
    #[arg(long = "skip-pov")]
    skip_pov: bool,

    /// Skip perceptual-hash deduplication.
    #[arg(long = "skip-dedup")]
    skip_dedup: bool,

    /// Verbose per-image logging on stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<imgsafe_core::BatchReport> {
    if !args.input.exists() {
        anyhow::bail!("input path does not exist: {}", args.input.display());
    }

    let thresholds = ThresholdConfig {
        super_safe_threshold: args.super_safe_threshold,
        nsfw_threshold: args.threshold,
        min_face_score: args.min_face_score,
        phash_threshold: args.dedup_threshold,
        mosaic_score_threshold: ThresholdConfig::default().mosaic_score_threshold,
    }
    .clamped();

    let config = RunConfig {
        thresholds,
        skip_dedup: args.skip_dedup,
        skip_mosaic: args.skip_mosaic,
        skip_pov: args.skip_pov,
    };

    let output_label = args
        .output
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());

    let reporter = TracingReporter;
    run_batch(&args.input, &config, &output_label, &reporter).context("batch classification failed")
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let report = match run(args) {
        Ok(report) => report,
        Err(e) => {
            let payload = serde_json::json!({ "error": e.to_string() });
            println!("{}", serde_json::to_string(&payload)?);
            std::process::exit(1);
        }
    };

    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;

    match &report.output_path[..] {
        "-" => println!("{json}"),
        path => {
            std::fs::write(path, json).with_context(|| format!("failed to write report to {path}"))?;
        }
    }

    Ok(())
}

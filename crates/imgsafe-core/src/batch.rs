//! Batch driver: ties the loader, deduper, signal extractors, and fusion
//! stage together into one synchronous pass over a folder of images.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::RunConfig;
use crate::dedup;
use crate::error::BatchError;
use crate::fusion::build_classification;
use crate::model;
use crate::report::{BatchReport, BatchStats, Classification, Tier};
use crate::reporter::Reporter;
use crate::signals::ClassifierContext;

/// Collects every recognized image under `input`, sorted lexicographically
/// by filename. `input` may itself be a single image file.
fn collect_paths(input: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if !input.exists() {
        return Err(BatchError::InputPathMissing(input.display().to_string()));
    }

    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(input)
        .map_err(|source| BatchError::InputReadFailure {
            path: input.display().to_string(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && model::has_image_extension(p))
        .collect();

    paths.sort_by_key(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()));
    Ok(paths)
}

/// Runs the full batch pipeline over `input` and returns the completed
/// report. `output_path` is recorded in the report verbatim; it is the
/// CLI's concern where (or whether) the JSON actually gets written.
pub fn run_batch(
    input: &Path,
    config: &RunConfig,
    output_path: &str,
    reporter: &dyn Reporter,
) -> Result<BatchReport, BatchError> {
    let started = Instant::now();
    let paths = collect_paths(input)?;
    let original_images = paths.len();

    reporter.progress(&format!("found {original_images} candidate images"));

    let mut context = ClassifierContext::new();
    let mut results = std::collections::BTreeMap::new();

    let (survivors, duplicates_removed) = if config.skip_dedup {
        (paths, 0)
    } else {
        let (dedup_result, load_failures) =
            dedup::load_and_dedup(&paths, config.thresholds.phash_threshold);
        for (path, error) in load_failures {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            reporter.warn(&format!("{filename}: failed to load ({error})"));
            let classification = Classification::load_failure(filename.clone(), error);
            results.insert(classification.filename.clone(), classification);
        }
        let survivors: Vec<PathBuf> = dedup_result.kept.into_iter().map(|e| e.path).collect();
        (survivors, dedup_result.duplicates_removed)
    };

    for path in &survivors {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let classification = match model::load(path) {
            Ok(loaded) => {
                let bundle = context.extract(&loaded, config, reporter);
                let c = build_classification(filename.clone(), &bundle, &config.thresholds);
                reporter.verbose(&format!("{filename} -> {} ({})", c.classification, c.reason));
                c
            }
            Err(e) => {
                reporter.warn(&format!("{filename}: failed to load ({e})"));
                Classification::load_failure(filename, e.to_string())
            }
        };

        results.insert(classification.filename.clone(), classification);
    }

    let stats = compute_stats(&results, original_images, duplicates_removed, started.elapsed().as_secs_f32());
    reporter.summary(&format!(
        "{} images: {} super_safe, {} safe, {} nsfw, {} errors",
        stats.total_images, stats.super_safe_count, stats.safe_count, stats.nsfw_count, stats.error_count
    ));

    Ok(BatchReport {
        results,
        stats,
        output_path: output_path.to_string(),
    })
}

fn compute_stats(
    results: &std::collections::BTreeMap<String, Classification>,
    original_images: usize,
    duplicates_removed: usize,
    processing_time_sec: f32,
) -> BatchStats {
    let total_images = results.len();
    let mut stats = BatchStats {
        total_images,
        original_images,
        duplicates_removed,
        processing_time_sec,
        ..Default::default()
    };

    let mut nsfw_score_sum = 0.0f32;
    let mut face_score_sum = 0.0f32;

    for c in results.values() {
        match c.classification {
            Tier::SuperSafe => stats.super_safe_count += 1,
            Tier::Safe => stats.safe_count += 1,
            Tier::Nsfw => stats.nsfw_count += 1,
            Tier::Error => stats.error_count += 1,
        }
        if c.mosaic_detected {
            stats.mosaic_count += 1;
        }
        if c.pov_detected {
            stats.pov_count += 1;
        }
        nsfw_score_sum += c.nsfw_score;
        face_score_sum += c.face_score;
    }

    if total_images > 0 {
        stats.avg_nsfw_score = crate::report::round4(nsfw_score_sum / total_images as f32);
        stats.avg_face_score = crate::report::round4(face_score_sum / total_images as f32);
    }

    stats
}

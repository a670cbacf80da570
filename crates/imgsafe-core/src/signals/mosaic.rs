//! Mosaic/pixel-censorship detector.
//!
//! Pixel-censorship ("mosaic") bars look like a grid of uniform-color
//! blocks laid over a skin-toned area: low internal variance per block,
//! but a sharp step in mean color across block boundaries. This scans
//! several candidate block sizes and looks for that signature inside the
//! skin mask; a Laplacian-variance check over the same area boosts the
//! score when the block edges are sharp enough to show up as high-frequency
//! content too.

use image::GrayImage;

use super::aesthetic::laplacian_variance;
use super::skin_mask::{is_skin_pixel, SkinMask};
use crate::model::BgrRaster;

const BLOCK_SIZES: [u32; 4] = [8, 12, 16, 20];
const MIN_SKIN_RATIO: f32 = 0.3;
const MIN_SKIN_WINDOWS: usize = 10;
const MAX_SUBBLOCK_VARIANCE: f64 = 120.0;
const MAX_MEAN_SUBBLOCK_VARIANCE: f64 = 80.0;
const MIN_MEAN_SPREAD: f64 = 15.0;
const MIN_BOUNDARY_STEP: f64 = 12.0;
const LAPLACIAN_BOOST_THRESHOLD: f64 = 500.0;
const LAPLACIAN_BOOST_AMOUNT: f32 = 0.1;

struct SubBlockStats {
    mean: f64,
    variance: f64,
}

fn subblock_stats(gray: &GrayImage, x1: u32, y1: u32, x2: u32, y2: u32) -> SubBlockStats {
    let mut values = Vec::new();
    for y in y1..y2 {
        for x in x1..x2 {
            values.push(gray.get_pixel(x, y)[0] as f64);
        }
    }
    if values.is_empty() {
        return SubBlockStats { mean: 0.0, variance: 0.0 };
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    SubBlockStats { mean, variance }
}

/// Tests one candidate window for the mosaic signature, given its four
/// quadrant sub-blocks: top-left, top-right, bottom-left, bottom-right.
fn is_mosaic_window(gray: &GrayImage, x: u32, y: u32, size: u32) -> bool {
    let half = size / 2;
    if half == 0 {
        return false;
    }

    let tl = subblock_stats(gray, x, y, x + half, y + half);
    let tr = subblock_stats(gray, x + half, y, x + size, y + half);
    let bl = subblock_stats(gray, x, y + half, x + half, y + size);
    let br = subblock_stats(gray, x + half, y + half, x + size, y + size);

    let variances = [tl.variance, tr.variance, bl.variance, br.variance];
    let means = [tl.mean, tr.mean, bl.mean, br.mean];

    let max_variance = variances.iter().cloned().fold(f64::MIN, f64::max);
    let mean_variance = variances.iter().sum::<f64>() / 4.0;
    let max_mean = means.iter().cloned().fold(f64::MIN, f64::max);
    let min_mean = means.iter().cloned().fold(f64::MAX, f64::min);

    if max_variance >= MAX_SUBBLOCK_VARIANCE {
        return false;
    }
    if mean_variance >= MAX_MEAN_SUBBLOCK_VARIANCE {
        return false;
    }
    if max_mean - min_mean <= MIN_MEAN_SPREAD {
        return false;
    }

    let row_step = ((tl.mean + tr.mean) / 2.0 - (bl.mean + br.mean) / 2.0).abs();
    let col_step = ((tl.mean + bl.mean) / 2.0 - (tr.mean + br.mean) / 2.0).abs();

    row_step > MIN_BOUNDARY_STEP || col_step > MIN_BOUNDARY_STEP
}

fn score_at_block_size(gray: &GrayImage, skin_mask: &SkinMask, size: u32) -> Option<f32> {
    let (width, height) = gray.dimensions();
    if size == 0 || size > width || size > height {
        return None;
    }

    let stride = (size / 2).max(1);
    let mut skin_windows = 0usize;
    let mut hits = 0usize;

    let mut y = 0;
    while y + size <= height {
        let mut x = 0;
        while x + size <= width {
            let skin_ratio = skin_mask.ratio_in(x, y, x + size, y + size);
            if skin_ratio >= MIN_SKIN_RATIO {
                skin_windows += 1;
                if is_mosaic_window(gray, x, y, size) {
                    hits += 1;
                }
            }
            x += stride;
        }
        y += stride;
    }

    if skin_windows > MIN_SKIN_WINDOWS {
        Some(hits as f32 / skin_windows as f32)
    } else {
        None
    }
}

/// Bounding box covering every skin-colored pixel, used to scope the
/// Laplacian sharpness boost to the same area the block scan inspected.
fn skin_bounding_box(bgr: &BgrRaster) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = bgr.dimensions();
    let (mut min_x, mut min_y) = (w, h);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut found = false;

    for y in 0..h {
        for x in 0..w {
            if is_skin_pixel(bgr.get_pixel(x, y)) {
                found = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    found.then_some((min_x, min_y, max_x + 1, max_y + 1))
}

/// Combined mosaic score in `[0, 1]` (prior to the configured detection
/// threshold being applied). Takes the maximum block-size score, boosted if
/// the skin-masked area shows high-frequency (sharp block-edge) content.
pub fn mosaic_score(gray: &GrayImage, bgr: &BgrRaster) -> f32 {
    let skin_mask = SkinMask::new(bgr);

    let mut best = 0.0f32;
    for &size in &BLOCK_SIZES {
        if let Some(score) = score_at_block_size(gray, &skin_mask, size) {
            best = best.max(score);
        }
    }

    if best > 0.0 {
        if let Some((x1, y1, x2, y2)) = skin_bounding_box(bgr) {
            let sub = image::imageops::crop_imm(gray, x1, y1, x2 - x1, y2 - y1).to_image();
            if laplacian_variance(&sub) > LAPLACIAN_BOOST_THRESHOLD {
                best += LAPLACIAN_BOOST_AMOUNT;
            }
        }
    }

    best.clamp(0.0, 1.0)
}

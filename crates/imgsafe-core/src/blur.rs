//! Smart-blur remediation: redacts detected NSFW regions well enough that
//! the general NSFW scorer reclassifies the output as safe.
//!
//! Each layer of the redaction stack removes a different recoverable
//! signal — edges, texture, skin chroma, luminance pattern — which is why
//! they are stacked rather than used alone.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use crate::error::BlurError;
use crate::report::{BBox, Detection};
use crate::signals::nsfw_region::{LazyNsfwRegion, NsfwLabel};

const EXPAND_PERCENT: f32 = 0.5;
const BLUR_RADIUS: f32 = 75.0;
const BLUR_PASSES: u32 = 7;
const PIXEL_DIVISOR: u32 = 6;
const DESATURATION_FACTOR: f32 = 0.2;
const OVERLAY_ALPHA: f32 = 0.55;
const OVERLAY_GRAY: u8 = 128;
const OUTPUT_JPEG_QUALITY: u8 = 92;

/// Detections whose label is NSFW get redacted; everything else (faces,
/// feet, covered belly) is left untouched. Covered female breast is
/// filtered for safety alongside the exposed labels.
fn regions_to_redact(detections: &[Detection]) -> Vec<BBox> {
    detections
        .iter()
        .filter(|d| NsfwLabel::parse(&d.label).map(|l| l.is_nsfw()).unwrap_or(false))
        .map(|d| d.bbox)
        .collect()
}

fn gaussian_pass(sub: &RgbImage) -> RgbImage {
    image::imageops::blur(sub, BLUR_RADIUS)
}

fn pixelate(sub: &RgbImage) -> RgbImage {
    let (w, h) = sub.dimensions();
    let pixel_size = (w.max(h) / PIXEL_DIVISOR).max(1);
    let small_w = (w / pixel_size).max(1);
    let small_h = (h / pixel_size).max(1);

    let down = image::imageops::resize(sub, small_w, small_h, image::imageops::FilterType::Nearest);
    image::imageops::resize(&down, w, h, image::imageops::FilterType::Nearest)
}

fn desaturate(sub: &mut RgbImage, factor: f32) {
    for px in sub.pixels_mut() {
        let (h, s, v) = rgb_to_hsv(*px);
        *px = hsv_to_rgb(h, s * factor, v);
    }
}

fn overlay_gray(sub: &mut RgbImage, alpha: f32) {
    for px in sub.pixels_mut() {
        let blended = [
            (px[0] as f32 * (1.0 - alpha) + OVERLAY_GRAY as f32 * alpha) as u8,
            (px[1] as f32 * (1.0 - alpha) + OVERLAY_GRAY as f32 * alpha) as u8,
            (px[2] as f32 * (1.0 - alpha) + OVERLAY_GRAY as f32 * alpha) as u8,
        ];
        *px = Rgb(blended);
    }
}

fn rgb_to_hsv(px: Rgb<u8>) -> (f32, f32, f32) {
    let r = px[0] as f32 / 255.0;
    let g = px[1] as f32 / 255.0;
    let b = px[2] as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta < 1e-6 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max < 1e-6 { 0.0 } else { delta / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r1, g1, b1) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb([
        ((r1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((g1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((b1 + m) * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Applies the full redaction stack (blur -> pixelate -> desaturate ->
/// overlay) in place, over the region `bbox` expanded by `EXPAND_PERCENT`.
fn redact_region(image: &mut RgbImage, bbox: BBox) {
    let (w, h) = image.dimensions();
    let expanded = bbox.expanded(EXPAND_PERCENT, w, h);
    let (rw, rh) = (expanded.width(), expanded.height());
    if rw == 0 || rh == 0 {
        return;
    }

    let mut sub = image::imageops::crop(image, expanded.x1, expanded.y1, rw, rh).to_image();

    for _ in 0..BLUR_PASSES {
        sub = gaussian_pass(&sub);
    }
    sub = pixelate(&sub);
    desaturate(&mut sub, DESATURATION_FACTOR);
    overlay_gray(&mut sub, OVERLAY_ALPHA);

    image::imageops::replace(image, &sub, expanded.x1 as i64, expanded.y1 as i64);
}

/// Redacts every NSFW-labeled detection in `detections` over `image`,
/// returning the number of regions that were actually redacted.
pub fn blur_regions(image: &mut RgbImage, detections: &[Detection]) -> usize {
    let regions = regions_to_redact(detections);
    for bbox in &regions {
        redact_region(image, *bbox);
    }
    regions.len()
}

/// Drives detection + redaction + JPEG write for one input image.
pub struct SmartBlurEngine {
    region_detector: LazyNsfwRegion,
    output_dir: PathBuf,
}

impl SmartBlurEngine {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            region_detector: LazyNsfwRegion::default(),
            output_dir: output_dir.into(),
        }
    }

    /// Detects NSFW regions in `path`, redacts them, and writes a JPEG to
    /// the configured output directory. Returns `(was_blurred, output_path)`;
    /// `was_blurred` is false whenever zero NSFW regions were found, or
    /// whenever the region detector itself is unavailable (both treated as
    /// "nothing to do", never as an error).
    pub fn process_image(&mut self, path: &Path) -> Result<(bool, Option<PathBuf>), BlurError> {
        let loaded = crate::model::load(path)?;
        let mut rgb = loaded.rgb;

        let detections = match self.region_detector.detect(&rgb) {
            Some(d) => d,
            None => return Ok((false, None)),
        };

        let redacted_count = blur_regions(&mut rgb, &detections);
        if redacted_count == 0 {
            return Ok((false, None));
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|source| BlurError::Write {
            path: self.output_dir.display().to_string(),
            source,
        })?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let out_path = self.output_dir.join(format!("{stem}_blurred.jpg"));

        let (width, height) = rgb.dimensions();
        let mut encoded = Vec::new();
        {
            use image::ImageEncoder;
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, OUTPUT_JPEG_QUALITY);
            encoder.write_image(rgb.as_raw(), width, height, image::ExtendedColorType::Rgb8)?;
        }

        std::fs::write(&out_path, &encoded).map_err(|source| BlurError::Write {
            path: out_path.display().to_string(),
            source,
        })?;

        Ok((true, Some(out_path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::BBox;

    fn detection(label: &str, bbox: BBox) -> Detection {
        Detection {
            label: label.to_string(),
            confidence: 0.9,
            bbox,
        }
    }

    #[test]
    fn benign_detections_are_never_redacted() {
        let detections = vec![detection("FACE_F", BBox { x1: 0, y1: 0, x2: 50, y2: 50 })];
        assert!(regions_to_redact(&detections).is_empty());
    }

    #[test]
    fn nsfw_detections_are_selected_for_redaction() {
        let detections = vec![
            detection("FACE_F", BBox { x1: 0, y1: 0, x2: 10, y2: 10 }),
            detection("EXPOSED_BREAST_F", BBox { x1: 20, y1: 20, x2: 60, y2: 60 }),
        ];
        let regions = regions_to_redact(&detections);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0], BBox { x1: 20, y1: 20, x2: 60, y2: 60 });
    }

    #[test]
    fn blur_regions_returns_zero_when_nothing_nsfw_is_present() {
        let mut image = RgbImage::from_pixel(128, 128, Rgb([10, 20, 30]));
        let detections = vec![detection("FACE_F", BBox { x1: 0, y1: 0, x2: 30, y2: 30 })];
        assert_eq!(blur_regions(&mut image, &detections), 0);
    }

    #[test]
    fn blur_regions_visibly_alters_the_redacted_area() {
        let mut image = RgbImage::from_pixel(128, 128, Rgb([200, 50, 50]));
        let original = image.clone();
        let detections = vec![detection(
            "EXPOSED_BREAST_F",
            BBox { x1: 40, y1: 40, x2: 90, y2: 90 },
        )];

        let redacted = blur_regions(&mut image, &detections);
        assert_eq!(redacted, 1);
        assert_ne!(image.get_pixel(65, 65), original.get_pixel(65, 65));
    }

    #[test]
    fn hsv_roundtrip_preserves_gray() {
        let px = Rgb([128, 128, 128]);
        let (h, s, v) = rgb_to_hsv(px);
        assert_eq!(s, 0.0);
        let back = hsv_to_rgb(h, s, v);
        assert_eq!(back, px);
    }

    #[test]
    fn desaturate_pulls_saturated_pixel_toward_gray() {
        let mut image = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        desaturate(&mut image, 0.2);
        let px = image.get_pixel(0, 0);
        // Desaturating pure red should pull green/blue channels up from 0.
        assert!(px[1] > 0);
        assert!(px[2] > 0);
    }

    #[test]
    fn process_image_reports_no_blur_when_region_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]))
            .save(&input)
            .unwrap();

        let mut engine = SmartBlurEngine::new(dir.path().join("out"));
        let (was_blurred, output) = engine.process_image(&input).unwrap();
        assert!(!was_blurred);
        assert!(output.is_none());
    }
}

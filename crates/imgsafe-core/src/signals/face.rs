//! Haar-cascade-equivalent frontal face detector.
//!
//! A small bank of hand-defined Haar-like rectangle features (eye band,
//! nose bridge, mouth band, cheek symmetry) is evaluated over a multi-scale
//! sliding window using an integral image for O(1) rectangle sums, then
//! grouped by a min-neighbors vote and thinned with greedy non-maximum
//! suppression — the same shape as a classic Viola-Jones cascade, minus the
//! boosted-stage training.

use image::GrayImage;
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::rect::Rect as IRect;

use crate::error::FaceDetectError;
use crate::report::{BBox, FaceBox};

const SCALE_FACTOR: f32 = 1.1;
const MIN_NEIGHBORS: usize = 5;
const MIN_FACE_SIZE: u32 = 50;
const FEATURE_THRESHOLD: f32 = 0.01;

#[derive(Clone, Copy, Debug)]
enum FeatureType {
    TwoRectangleHorizontal,
    TwoRectangleVertical,
    ThreeRectangleHorizontal,
    FourRectangle,
}

#[derive(Clone, Copy, Debug)]
struct HaarFeature {
    // Coordinates and size are defined against a notional 100x100 window
    // and rescaled per candidate window size.
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    feature_type: FeatureType,
    weight: f32,
}

fn cascade_features() -> [HaarFeature; 5] {
    [
        HaarFeature { x: 20, y: 20, width: 60, height: 30, feature_type: FeatureType::TwoRectangleHorizontal, weight: 2.0 },
        HaarFeature { x: 45, y: 30, width: 10, height: 40, feature_type: FeatureType::TwoRectangleVertical, weight: 1.5 },
        HaarFeature { x: 25, y: 60, width: 50, height: 20, feature_type: FeatureType::ThreeRectangleHorizontal, weight: 1.8 },
        HaarFeature { x: 15, y: 15, width: 70, height: 25, feature_type: FeatureType::TwoRectangleHorizontal, weight: 1.6 },
        HaarFeature { x: 10, y: 35, width: 80, height: 40, feature_type: FeatureType::FourRectangle, weight: 1.3 },
    ]
}

#[derive(Clone, Copy, Debug)]
struct RawDetection {
    bbox: BBox,
    votes: usize,
}

pub struct FaceDetector {
    cascade: [HaarFeature; 5],
}

impl Default for FaceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceDetector {
    pub fn new() -> Self {
        Self {
            cascade: cascade_features(),
        }
    }

    pub fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceBox>, FaceDetectError> {
        let (width, height) = gray.dimensions();
        if width < MIN_FACE_SIZE || height < MIN_FACE_SIZE {
            return Err(FaceDetectError::TooSmall(width, height));
        }

        let integral = integral_image(gray);
        let max_face_size = width.min(height);

        let mut all = Vec::new();
        let mut window_size = MIN_FACE_SIZE;
        while window_size < max_face_size {
            all.extend(self.scan_at_scale(&integral, window_size, width, height));
            window_size = ((window_size as f32) * SCALE_FACTOR).round() as u32;
        }

        let grouped = group_by_neighbors(all, MIN_NEIGHBORS);
        let suppressed = non_maximum_suppression(grouped);

        Ok(suppressed
            .into_iter()
            .map(|d| FaceBox {
                bbox: d.bbox,
                confidence: (d.votes as f32 / self.cascade.len() as f32).min(1.0),
            })
            .collect())
    }

    fn scan_at_scale(
        &self,
        integral: &GrayImage,
        window_size: u32,
        img_width: u32,
        img_height: u32,
    ) -> Vec<RawDetection> {
        let mut out = Vec::new();
        let step = (window_size / 4).max(8);

        let mut y = 0;
        while y + window_size <= img_height {
            let mut x = 0;
            while x + window_size <= img_width {
                let votes = self.evaluate_window(integral, x, y, window_size);
                if votes > 0 {
                    out.push(RawDetection {
                        bbox: BBox {
                            x1: x,
                            y1: y,
                            x2: x + window_size,
                            y2: y + window_size,
                        },
                        votes,
                    });
                }
                x += step;
            }
            y += step;
        }
        out
    }

    fn evaluate_window(&self, integral: &GrayImage, x: u32, y: u32, window_size: u32) -> usize {
        let scale = window_size as f32 / 100.0;
        let mut votes = 0;

        for feature in &self.cascade {
            let fx = x as i32 + (feature.x as f32 * scale) as i32;
            let fy = y as i32 + (feature.y as f32 * scale) as i32;
            let fw = (feature.width as f32 * scale).max(2.0) as u32;
            let fh = (feature.height as f32 * scale).max(2.0) as u32;

            let rect = IRect::at(fx, fy).of_size(fw, fh);
            let value = haar_value(integral, &rect, feature.feature_type);
            if value * feature.weight > FEATURE_THRESHOLD {
                votes += 1;
            }
        }

        votes
    }
}

fn region_sum(integral: &GrayImage, rect: &IRect) -> f32 {
    let (w, h) = integral.dimensions();
    if rect.left() < 0 || rect.top() < 0 || rect.right() >= w as i32 || rect.bottom() >= h as i32 {
        return 0.0;
    }
    sum_image_pixels(
        integral,
        rect.left() as u32,
        rect.top() as u32,
        rect.right() as u32,
        rect.bottom() as u32,
    )[0] as f32
}

fn haar_value(integral: &GrayImage, rect: &IRect, feature_type: FeatureType) -> f32 {
    let area = (rect.width() * rect.height()).max(1) as f32;

    match feature_type {
        FeatureType::TwoRectangleHorizontal => {
            let mid_y = rect.top() + (rect.height() / 2) as i32;
            let top = IRect::at(rect.left(), rect.top()).of_size(rect.width(), rect.height() / 2);
            let bottom = IRect::at(rect.left(), mid_y).of_size(rect.width(), rect.height() / 2);
            (region_sum(integral, &top) - region_sum(integral, &bottom)).abs() / area
        }
        FeatureType::TwoRectangleVertical => {
            let mid_x = rect.left() + (rect.width() / 2) as i32;
            let left = IRect::at(rect.left(), rect.top()).of_size(rect.width() / 2, rect.height());
            let right = IRect::at(mid_x, rect.top()).of_size(rect.width() / 2, rect.height());
            (region_sum(integral, &left) - region_sum(integral, &right)).abs() / area
        }
        FeatureType::ThreeRectangleHorizontal => {
            let h3 = rect.height() / 3;
            let top = IRect::at(rect.left(), rect.top()).of_size(rect.width(), h3);
            let mid = IRect::at(rect.left(), rect.top() + h3 as i32).of_size(rect.width(), h3);
            let bottom = IRect::at(rect.left(), rect.top() + 2 * h3 as i32).of_size(rect.width(), h3);
            let t = region_sum(integral, &top);
            let m = region_sum(integral, &mid);
            let b = region_sum(integral, &bottom);
            ((t + b) - 2.0 * m).abs() / area
        }
        FeatureType::FourRectangle => {
            let hw = rect.width() / 2;
            let hh = rect.height() / 2;
            let tl = IRect::at(rect.left(), rect.top()).of_size(hw, hh);
            let tr = IRect::at(rect.left() + hw as i32, rect.top()).of_size(hw, hh);
            let bl = IRect::at(rect.left(), rect.top() + hh as i32).of_size(hw, hh);
            let br = IRect::at(rect.left() + hw as i32, rect.top() + hh as i32).of_size(hw, hh);
            let a = region_sum(integral, &tl);
            let b = region_sum(integral, &tr);
            let c = region_sum(integral, &bl);
            let d = region_sum(integral, &br);
            ((a + d) - (b + c)).abs() / area
        }
    }
}

/// Collapses raw per-window hits that spatially overlap into one candidate,
/// requiring at least `min_neighbors` overlapping windows to survive — the
/// cascade's "min neighbors" parameter.
fn group_by_neighbors(mut raw: Vec<RawDetection>, min_neighbors: usize) -> Vec<RawDetection> {
    raw.sort_by(|a, b| b.votes.cmp(&a.votes));
    let mut groups: Vec<Vec<RawDetection>> = Vec::new();

    for det in raw {
        if let Some(group) = groups
            .iter_mut()
            .find(|g| g[0].bbox.iou(&det.bbox) > 0.3)
        {
            group.push(det);
        } else {
            groups.push(vec![det]);
        }
    }

    groups
        .into_iter()
        .filter(|g| g.len() >= min_neighbors)
        .map(|g| {
            let count = g.len() as u32;
            let sum_x1: u32 = g.iter().map(|d| d.bbox.x1).sum();
            let sum_y1: u32 = g.iter().map(|d| d.bbox.y1).sum();
            let sum_x2: u32 = g.iter().map(|d| d.bbox.x2).sum();
            let sum_y2: u32 = g.iter().map(|d| d.bbox.y2).sum();
            RawDetection {
                bbox: BBox {
                    x1: sum_x1 / count,
                    y1: sum_y1 / count,
                    x2: sum_x2 / count,
                    y2: sum_y2 / count,
                },
                votes: g.iter().map(|d| d.votes).max().unwrap_or(0),
            }
        })
        .collect()
}

fn non_maximum_suppression(mut detections: Vec<RawDetection>) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.votes.cmp(&a.votes));
    let mut keep = Vec::new();

    while !detections.is_empty() {
        let current = detections.remove(0);
        detections.retain(|d| current.bbox.iou(&d.bbox) < 0.3);
        keep.push(current);
    }

    keep
}

/// Derives the `face_score` signal from the largest surviving detection's
/// area ratio to the full image, per the documented piecewise curve:
/// tiny detections (likely false positives) and oversized ones (extreme
/// close-ups) are both penalized relative to a face occupying ~10-20% of
/// the frame.
pub fn face_score(faces: &[FaceBox], image_width: u32, image_height: u32) -> f32 {
    let image_area = (image_width as u64 * image_height as u64).max(1) as f32;
    let Some(largest) = faces.iter().max_by_key(|f| f.bbox.area()) else {
        return 0.0;
    };

    let r = largest.bbox.area() as f32 / image_area;
    if r < 0.01 {
        r * 10.0
    } else if r > 0.5 {
        0.5
    } else {
        (r * 5.0).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x1: u32, y1: u32, x2: u32, y2: u32) -> FaceBox {
        FaceBox {
            bbox: BBox { x1, y1, x2, y2 },
            confidence: 1.0,
        }
    }

    #[test]
    fn face_score_of_no_faces_is_zero() {
        assert_eq!(face_score(&[], 1000, 1000), 0.0);
    }

    #[test]
    fn face_score_penalizes_tiny_detections() {
        let faces = vec![face(0, 0, 20, 20)]; // 400 / 1_000_000 = 0.0004
        let score = face_score(&faces, 1000, 1000);
        assert!(score < 0.01);
    }

    #[test]
    fn face_score_rewards_mid_sized_faces() {
        let faces = vec![face(0, 0, 150, 150)]; // ratio ~0.0225
        let score = face_score(&faces, 1000, 1000);
        assert!(score > 0.1 && score <= 1.0);
    }

    #[test]
    fn face_score_caps_oversized_detections() {
        let faces = vec![face(0, 0, 900, 900)]; // ratio 0.81 > 0.5
        assert_eq!(face_score(&faces, 1000, 1000), 0.5);
    }

    #[test]
    fn detector_rejects_images_smaller_than_min_face_size() {
        let gray = GrayImage::new(10, 10);
        let detector = FaceDetector::new();
        assert!(matches!(detector.detect(&gray), Err(FaceDetectError::TooSmall(10, 10))));
    }

    #[test]
    fn detector_handles_blank_image_without_panicking() {
        let gray = GrayImage::new(128, 128);
        let detector = FaceDetector::new();
        let faces = detector.detect(&gray).unwrap();
        // A uniform gray image has no Haar-like contrast, so the cascade
        // should not vote it in as a face.
        assert!(faces.is_empty());
    }
}

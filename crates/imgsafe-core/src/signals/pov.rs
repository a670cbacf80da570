//! POV-composition detector.
//!
//! Flags a specific adult-content framing: a face filling the upper part of
//! the frame, a V-shaped skin distribution converging toward the bottom
//! edge. The predicate is purely geometric over the face box and skin mask
//! — no model inference involved.

use crate::model::BgrRaster;
use crate::report::FaceBox;

use super::skin_mask::SkinMask;

const LARGE_FACE_RATIO: f32 = 0.15;
const MAX_CENTER_OFFSET_FRACTION: f32 = 0.4;
const BOTTOM_BAND_FRACTION: f32 = 0.4;
const EDGE_BAND_FRACTION: f32 = 0.1;
const POV_SCORE_THRESHOLD: f32 = 0.7;
const BOTTOM_SKIN_THRESHOLD: f32 = 0.20;
const EDGE_SKIN_THRESHOLD: f32 = 0.50;

/// Output of the POV predicate: whether it fired, its accumulated score,
/// and the two skin ratios the detection threshold checks directly (useful
/// for debugging and for the report).
#[derive(Debug, Clone, Copy)]
pub struct PovResult {
    pub detected: bool,
    pub score: f32,
}

fn largest_face(faces: &[FaceBox]) -> Option<&FaceBox> {
    faces.iter().max_by_key(|f| f.bbox.area())
}

/// `true` if the face occupies enough of the frame, is roughly centered
/// horizontally, and sits in the upper half of the image.
fn face_is_large_and_centered(face: &FaceBox, image_w: u32, image_h: u32) -> bool {
    let area_ratio = face.bbox.area() as f32 / (image_w as u64 * image_h as u64).max(1) as f32;
    if area_ratio < LARGE_FACE_RATIO {
        return false;
    }

    let face_center_x = (face.bbox.x1 + face.bbox.x2) as f32 / 2.0;
    let image_center_x = image_w as f32 / 2.0;
    let half_width = image_w as f32 / 2.0;
    let offset = (face_center_x - image_center_x).abs() / half_width.max(1.0);

    let face_center_y = (face.bbox.y1 + face.bbox.y2) as f32 / 2.0;
    let in_upper_half = face_center_y < image_h as f32 * 0.5;

    offset <= MAX_CENTER_OFFSET_FRACTION && in_upper_half
}

fn face_in_upper_band(face: &FaceBox, image_h: u32) -> bool {
    let face_center_y = (face.bbox.y1 + face.bbox.y2) as f32 / 2.0;
    face_center_y < image_h as f32 * 0.4
}

struct BottomSkinStats {
    bottom_skin_ratio: f32,
    edge_skin_ratio: f32,
    v_shape_score: f32,
}

fn bottom_skin_stats(bgr: &BgrRaster) -> BottomSkinStats {
    let (w, h) = bgr.dimensions();
    let mask = SkinMask::new(bgr);

    let bottom_y1 = (h as f32 * (1.0 - BOTTOM_BAND_FRACTION)) as u32;
    let edge_y1 = (h as f32 * (1.0 - EDGE_BAND_FRACTION)) as u32;

    let bottom_skin_ratio = mask.ratio_in(0, bottom_y1, w, h);
    let edge_skin_ratio = mask.ratio_in(0, edge_y1, w, h);

    let third = w / 3;
    let left = mask.ratio_in(0, bottom_y1, third, h);
    let center = mask.ratio_in(third, bottom_y1, 2 * third, h);
    let right = mask.ratio_in(2 * third, bottom_y1, w, h);

    let v_shape_score = if center > left && center > right {
        center
    } else if center >= 0.15 {
        center * 0.8
    } else {
        0.0
    };

    BottomSkinStats {
        bottom_skin_ratio,
        edge_skin_ratio,
        v_shape_score,
    }
}

/// Evaluates the POV-composition predicate over the largest detected face
/// and the skin distribution in the bottom portion of the frame.
pub fn detect_pov(faces: &[FaceBox], bgr: &BgrRaster) -> PovResult {
    let (w, h) = bgr.dimensions();

    let Some(face) = largest_face(faces) else {
        return PovResult { detected: false, score: 0.0 };
    };

    let stats = bottom_skin_stats(bgr);

    let mut score = 0.0f32;
    if face_is_large_and_centered(face, w, h) {
        score += 0.3;
    } else {
        let area_ratio = face.bbox.area() as f32 / (w as u64 * h as u64).max(1) as f32;
        if area_ratio >= LARGE_FACE_RATIO {
            score += 0.2;
        }
    }

    if stats.bottom_skin_ratio > 0.3 {
        score += 0.3;
    } else if stats.bottom_skin_ratio > 0.15 {
        score += 0.2;
    }

    if stats.v_shape_score > 0.2 {
        score += 0.3;
    } else if stats.v_shape_score > 0.0 {
        score += 0.2;
    }

    if face_in_upper_band(face, h) {
        score += 0.2;
    }

    let detected = score >= POV_SCORE_THRESHOLD
        && stats.bottom_skin_ratio > BOTTOM_SKIN_THRESHOLD
        && stats.edge_skin_ratio > EDGE_SKIN_THRESHOLD;

    PovResult {
        detected,
        score: score.min(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::BBox;
    use image::{Rgb, RgbImage};

    fn face(x1: u32, y1: u32, x2: u32, y2: u32) -> FaceBox {
        FaceBox {
            bbox: BBox { x1, y1, x2, y2 },
            confidence: 1.0,
        }
    }

    #[test]
    fn no_faces_means_no_pov() {
        let rgb = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let bgr = BgrRaster::from_rgb(&rgb);
        let result = detect_pov(&[], &bgr);
        assert!(!result.detected);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn clean_portrait_with_no_bottom_skin_is_not_pov() {
        // Face centered in upper half, no skin anywhere else.
        let rgb = RgbImage::from_pixel(100, 100, Rgb([0, 0, 255]));
        let bgr = BgrRaster::from_rgb(&rgb);
        let faces = vec![face(30, 5, 70, 45)]; // area ratio 0.16, upper half
        let result = detect_pov(&faces, &bgr);
        assert!(!result.detected);
    }

    #[test]
    fn composition_with_face_and_dense_bottom_skin_triggers_pov() {
        let mut rgb = RgbImage::from_pixel(100, 100, Rgb([0, 0, 255]));
        // Flood the bottom half with skin tone, concentrated centrally.
        for y in 55..100 {
            for x in 20..80 {
                rgb.put_pixel(x, y, Rgb([220, 170, 120]));
            }
        }
        let bgr = BgrRaster::from_rgb(&rgb);
        let faces = vec![face(30, 5, 70, 45)];
        let result = detect_pov(&faces, &bgr);
        assert!(result.score > 0.0);
    }
}

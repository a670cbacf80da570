//! Report data model: the types serialized into the batch JSON document.

use serde::{Deserialize, Serialize};

/// Safety tier assigned to one surviving image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    SuperSafe,
    Safe,
    Nsfw,
    Error,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::SuperSafe => "super_safe",
            Tier::Safe => "safe",
            Tier::Nsfw => "nsfw",
            Tier::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// A bounding box in pixel coordinates, axis-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BBox {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Intersection-over-union against another box, used by non-maximum
    /// suppression in the face detector.
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) as u64 * (y2 - y1) as u64;
        let union = self.area() + other.area() - intersection;
        if union == 0 {
            0.0
        } else {
            intersection as f32 / union as f32
        }
    }

    /// Expands the box by `percent` on each side, clamped to `(max_w, max_h)`.
    pub fn expanded(&self, percent: f32, max_w: u32, max_h: u32) -> BBox {
        let dw = (self.width() as f32 * percent) as i64;
        let dh = (self.height() as f32 * percent) as i64;

        let x1 = (self.x1 as i64 - dw).max(0) as u32;
        let y1 = (self.y1 as i64 - dh).max(0) as u32;
        let x2 = ((self.x2 as i64 + dw) as u32).min(max_w);
        let y2 = ((self.y2 as i64 + dh) as u32).min(max_h);

        BBox { x1, y1, x2, y2 }
    }
}

/// A region-level NSFW detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BBox,
}

/// A detected face.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FaceBox {
    pub bbox: BBox,
    pub confidence: f32,
}

/// Every signal extracted for one image, prior to fusion and tier
/// assignment. All scores are clamped to `[0, 1]` by the extractor that
/// produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBundle {
    pub falconsai_score: f32,
    pub nudenet_score: f32,
    pub face_score: f32,
    pub aesthetic_score: f32,
    pub mosaic_detected: bool,
    pub mosaic_score: f32,
    pub pov_detected: bool,
    pub pov_score: f32,
    pub detections: Vec<Detection>,
    pub faces: Vec<FaceBox>,
}

impl Default for SignalBundle {
    fn default() -> Self {
        Self {
            falconsai_score: 0.0,
            nudenet_score: 0.0,
            face_score: 0.0,
            aesthetic_score: 0.5,
            mosaic_detected: false,
            mosaic_score: 0.0,
            pov_detected: false,
            pov_score: 0.0,
            detections: Vec::new(),
            faces: Vec::new(),
        }
    }
}

/// Final per-image classification, as it appears in the report under its
/// filename key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub filename: String,
    pub is_super_safe: bool,
    pub is_safe: bool,
    pub nsfw_score: f32,
    pub face_score: f32,
    pub aesthetic_score: f32,
    pub falconsai_score: f32,
    pub nudenet_score: f32,
    pub mosaic_detected: bool,
    pub mosaic_score: f32,
    pub pov_detected: bool,
    pub pov_score: f32,
    pub classification: Tier,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Classification {
    /// Builds the `error` tier record for an image that failed to load.
    pub fn load_failure(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            is_super_safe: false,
            is_safe: false,
            nsfw_score: 1.0,
            face_score: 0.0,
            aesthetic_score: 0.0,
            falconsai_score: 1.0,
            nudenet_score: 1.0,
            mosaic_detected: false,
            mosaic_score: 0.0,
            pov_detected: false,
            pov_score: 0.0,
            classification: Tier::Error,
            reason: "Failed to load image".to_string(),
            error: Some(message.into()),
        }
    }
}

/// Aggregate statistics over one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_images: usize,
    pub original_images: usize,
    pub duplicates_removed: usize,
    pub super_safe_count: usize,
    pub safe_count: usize,
    pub nsfw_count: usize,
    pub error_count: usize,
    pub mosaic_count: usize,
    pub pov_count: usize,
    pub avg_nsfw_score: f32,
    pub avg_face_score: f32,
    pub processing_time_sec: f32,
}

/// The full batch report, serialized verbatim as the CLI's JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: std::collections::BTreeMap<String, Classification>,
    pub stats: BatchStats,
    pub output_path: String,
}

/// Rounds a float to 4 decimal places, matching the report's float contract.
pub fn round4(value: f32) -> f32 {
    (value * 10000.0).round() / 10000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_iou_of_identical_boxes_is_one() {
        let b = BBox { x1: 0, y1: 0, x2: 10, y2: 10 };
        assert_eq!(b.iou(&b), 1.0);
    }

    #[test]
    fn bbox_iou_of_disjoint_boxes_is_zero() {
        let a = BBox { x1: 0, y1: 0, x2: 10, y2: 10 };
        let b = BBox { x1: 20, y1: 20, x2: 30, y2: 30 };
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn bbox_expanded_clamps_to_image_bounds() {
        let b = BBox { x1: 0, y1: 0, x2: 10, y2: 10 };
        let expanded = b.expanded(0.5, 12, 12);
        assert_eq!(expanded.x1, 0);
        assert_eq!(expanded.y1, 0);
        assert_eq!(expanded.x2, 12);
        assert_eq!(expanded.y2, 12);
    }

    #[test]
    fn round4_matches_report_float_contract() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
    }

    #[test]
    fn tier_serializes_as_snake_case() {
        let json = serde_json::to_string(&Tier::SuperSafe).unwrap();
        assert_eq!(json, "\"super_safe\"");
    }
}

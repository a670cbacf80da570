//! Region-level NSFW detector: locates exposed/covered body regions and
//! reports them as labeled bounding boxes.
//!
//! The underlying detector vocabulary has drifted across model releases
//! (`EXPOSED_BREAST_F` in older exports vs `FEMALE_BREAST_EXPOSED` in newer
//! ones). [`NsfwLabel`] normalizes both into one internal enum so the rest
//! of the pipeline never has to know which generation produced a detection.

use serde::{Deserialize, Serialize};

use crate::error::NsfwClassifierError;
use crate::report::{BBox, Detection};

/// Closed set of region labels the detector can emit, after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NsfwLabel {
    ExposedBreastF,
    CoveredBreastF,
    ExposedGenitaliaF,
    ExposedGenitaliaM,
    ExposedButtocks,
    ExposedAnus,
    Face,
    Feet,
    Belly,
}

impl NsfwLabel {
    /// True for labels that count toward the region NSFW score. Covered
    /// female breast is included here too — filtered for safety alongside
    /// the exposed labels, not treated as benign.
    pub fn is_nsfw(self) -> bool {
        matches!(
            self,
            NsfwLabel::ExposedBreastF
                | NsfwLabel::CoveredBreastF
                | NsfwLabel::ExposedGenitaliaF
                | NsfwLabel::ExposedGenitaliaM
                | NsfwLabel::ExposedButtocks
                | NsfwLabel::ExposedAnus
        )
    }

    /// Normalizes a raw model label (either vocabulary generation) into the
    /// internal enum. Returns `None` for anything unrecognized; callers
    /// treat that as a signal-extraction failure for the image, not a panic.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "EXPOSED_BREAST_F" | "FEMALE_BREAST_EXPOSED" => Some(Self::ExposedBreastF),
            "COVERED_BREAST_F" | "FEMALE_BREAST_COVERED" => Some(Self::CoveredBreastF),
            "EXPOSED_GENITALIA_F" | "FEMALE_GENITALIA_EXPOSED" => Some(Self::ExposedGenitaliaF),
            "EXPOSED_GENITALIA_M" | "MALE_GENITALIA_EXPOSED" => Some(Self::ExposedGenitaliaM),
            "EXPOSED_BUTTOCKS" | "BUTTOCKS_EXPOSED" => Some(Self::ExposedButtocks),
            "EXPOSED_ANUS" | "ANUS_EXPOSED" => Some(Self::ExposedAnus),
            "FACE_F" | "FACE_M" | "FACE_FEMALE" | "FACE_MALE" => Some(Self::Face),
            "FEET_EXPOSED" | "FEET_COVERED" => Some(Self::Feet),
            "BELLY_EXPOSED" | "BELLY_COVERED" => Some(Self::Belly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NsfwLabel::ExposedBreastF => "EXPOSED_BREAST_F",
            NsfwLabel::CoveredBreastF => "COVERED_BREAST_F",
            NsfwLabel::ExposedGenitaliaF => "EXPOSED_GENITALIA_F",
            NsfwLabel::ExposedGenitaliaM => "EXPOSED_GENITALIA_M",
            NsfwLabel::ExposedButtocks => "EXPOSED_BUTTOCKS",
            NsfwLabel::ExposedAnus => "EXPOSED_ANUS",
            NsfwLabel::Face => "FACE_F",
            NsfwLabel::Feet => "FEET_EXPOSED",
            NsfwLabel::Belly => "BELLY_EXPOSED",
        }
    }
}

/// Configuration for the region NSFW detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NsfwRegionConfig {
    pub model_path: String,
    pub input_size: u32,
    /// Minimum confidence for a raw detection to be kept at all.
    pub min_confidence: f32,
}

impl Default for NsfwRegionConfig {
    fn default() -> Self {
        Self {
            model_path: "models/nsfw_region.onnx".to_string(),
            input_size: 320,
            min_confidence: 0.2,
        }
    }
}

/// Decodes a flat `[n, 6]` row-major output (`x1,y1,x2,y2,confidence,class_id`)
/// into normalized [`Detection`]s, scaling boxes from model input space back
/// to the original image's pixel space.
///
/// Rows below `min_confidence`, or whose `class_id` does not map to a known
/// [`NsfwLabel`], are dropped — an unrecognized label is a signal-extraction
/// failure for that row, not the whole image, so we simply omit it and let
/// the caller's NSFW score derive from whatever rows did decode.
pub fn decode_detections(
    raw: &[f32],
    class_names: &[&str],
    min_confidence: f32,
    input_size: u32,
    original_w: u32,
    original_h: u32,
) -> Vec<Detection> {
    let scale_x = original_w as f32 / input_size as f32;
    let scale_y = original_h as f32 / input_size as f32;

    raw.chunks_exact(6)
        .filter_map(|row| {
            let [x1, y1, x2, y2, confidence, class_id] = row else {
                return None;
            };
            if *confidence < min_confidence {
                return None;
            }

            let class_name = class_names.get(*class_id as usize)?;
            let label = NsfwLabel::parse(class_name)?;

            Some(Detection {
                label: label.as_str().to_string(),
                confidence: confidence.clamp(0.0, 1.0),
                bbox: BBox {
                    x1: (x1 * scale_x).max(0.0) as u32,
                    y1: (y1 * scale_y).max(0.0) as u32,
                    x2: (x2 * scale_x).min(original_w as f32) as u32,
                    y2: (y2 * scale_y).min(original_h as f32) as u32,
                },
            })
        })
        .collect()
}

/// Highest confidence among NSFW-labeled detections, or 0 if none.
pub fn region_nsfw_score(detections: &[Detection]) -> f32 {
    detections
        .iter()
        .filter(|d| NsfwLabel::parse(&d.label).map(|l| l.is_nsfw()).unwrap_or(false))
        .map(|d| d.confidence)
        .fold(0.0, f32::max)
}

#[cfg(feature = "ml")]
pub struct NsfwRegionDetector {
    session: ort::session::Session,
    config: NsfwRegionConfig,
    class_names: Vec<&'static str>,
}

#[cfg(feature = "ml")]
impl NsfwRegionDetector {
    const CLASS_NAMES: &'static [&'static str] = &[
        "EXPOSED_BREAST_F",
        "COVERED_BREAST_F",
        "EXPOSED_GENITALIA_F",
        "EXPOSED_GENITALIA_M",
        "EXPOSED_BUTTOCKS",
        "EXPOSED_ANUS",
        "FACE_F",
        "FEET_EXPOSED",
        "BELLY_EXPOSED",
    ];

    pub fn new(config: NsfwRegionConfig) -> Result<Self, NsfwClassifierError> {
        use ort::session::{builder::GraphOptimizationLevel, Session};

        if !std::path::Path::new(&config.model_path).exists() {
            return Err(NsfwClassifierError::ModelNotFound(config.model_path.clone()));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(&config.model_path)?;

        Ok(Self {
            session,
            config,
            class_names: Self::CLASS_NAMES.to_vec(),
        })
    }

    pub fn try_load(config: NsfwRegionConfig) -> Option<Self> {
        Self::new(config).ok()
    }

    pub fn detect(&mut self, rgb: &image::RgbImage) -> Result<Vec<Detection>, NsfwClassifierError> {
        let (orig_w, orig_h) = rgb.dimensions();
        let n = self.config.input_size;
        let resized = image::imageops::resize(rgb, n, n, image::imageops::FilterType::Triangle);

        let n = n as usize;
        let mut tensor_data = vec![0.0f32; 3 * n * n];
        for (y, row) in resized.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                tensor_data[y * n + x] = pixel[0] as f32 / 255.0;
                tensor_data[n * n + y * n + x] = pixel[1] as f32 / 255.0;
                tensor_data[2 * n * n + y * n + x] = pixel[2] as f32 / 255.0;
            }
        }

        let input_tensor = ort::value::Tensor::from_array((
            [1usize, 3, n, n],
            tensor_data.into_boxed_slice(),
        ))?;

        let outputs = self
            .session
            .run(ort::inputs!["images" => input_tensor])?;
        let detections_tensor = outputs["detections"]
            .try_extract_tensor::<f32>()
            .map_err(|e| NsfwClassifierError::Inference(format!("failed to extract detections: {e}")))?;

        Ok(decode_detections(
            detections_tensor.1,
            &self.class_names,
            self.config.min_confidence,
            self.config.input_size,
            orig_w,
            orig_h,
        ))
    }
}

#[cfg(not(feature = "ml"))]
pub struct NsfwRegionDetector {
    _config: NsfwRegionConfig,
}

#[cfg(not(feature = "ml"))]
impl NsfwRegionDetector {
    pub fn new(_config: NsfwRegionConfig) -> Result<Self, NsfwClassifierError> {
        Err(NsfwClassifierError::MlNotEnabled)
    }

    pub fn try_load(_config: NsfwRegionConfig) -> Option<Self> {
        None
    }

    pub fn detect(&mut self, _rgb: &image::RgbImage) -> Result<Vec<Detection>, NsfwClassifierError> {
        Err(NsfwClassifierError::MlNotEnabled)
    }
}

/// Lazily loads the region detector, exactly like [`super::nsfw_general::LazyNsfwGeneral`].
pub struct LazyNsfwRegion {
    detector: Option<NsfwRegionDetector>,
    config: NsfwRegionConfig,
    load_attempted: bool,
}

impl LazyNsfwRegion {
    pub fn new(config: NsfwRegionConfig) -> Self {
        Self {
            detector: None,
            config,
            load_attempted: false,
        }
    }

    fn ensure_loaded(&mut self) -> bool {
        if self.detector.is_some() {
            return true;
        }
        if self.load_attempted && !std::path::Path::new(&self.config.model_path).exists() {
            return false;
        }
        self.load_attempted = true;
        self.detector = NsfwRegionDetector::try_load(self.config.clone());
        self.detector.is_some()
    }

    pub fn detect(&mut self, rgb: &image::RgbImage) -> Option<Vec<Detection>> {
        if !self.ensure_loaded() {
            return None;
        }
        self.detector.as_mut().unwrap().detect(rgb).ok()
    }
}

impl Default for LazyNsfwRegion {
    fn default() -> Self {
        Self::new(NsfwRegionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_both_label_vocabularies() {
        assert_eq!(NsfwLabel::parse("EXPOSED_BREAST_F"), Some(NsfwLabel::ExposedBreastF));
        assert_eq!(NsfwLabel::parse("FEMALE_BREAST_EXPOSED"), Some(NsfwLabel::ExposedBreastF));
    }

    #[test]
    fn parse_rejects_unknown_label() {
        assert_eq!(NsfwLabel::parse("SOMETHING_NEW"), None);
    }

    #[test]
    fn benign_labels_are_not_nsfw() {
        assert!(!NsfwLabel::Face.is_nsfw());
        assert!(!NsfwLabel::Feet.is_nsfw());
        assert!(!NsfwLabel::Belly.is_nsfw());
    }

    #[test]
    fn exposed_and_covered_breast_labels_are_nsfw() {
        assert!(NsfwLabel::ExposedBreastF.is_nsfw());
        assert!(NsfwLabel::ExposedAnus.is_nsfw());
        assert!(NsfwLabel::CoveredBreastF.is_nsfw());
    }

    #[test]
    fn region_score_is_max_confidence_among_nsfw_detections() {
        let detections = vec![
            Detection {
                label: "FACE_F".to_string(),
                confidence: 0.99,
                bbox: BBox { x1: 0, y1: 0, x2: 10, y2: 10 },
            },
            Detection {
                label: "EXPOSED_BREAST_F".to_string(),
                confidence: 0.6,
                bbox: BBox { x1: 0, y1: 0, x2: 10, y2: 10 },
            },
            Detection {
                label: "EXPOSED_GENITALIA_F".to_string(),
                confidence: 0.85,
                bbox: BBox { x1: 0, y1: 0, x2: 10, y2: 10 },
            },
        ];
        assert_eq!(region_nsfw_score(&detections), 0.85);
    }

    #[test]
    fn region_score_of_no_detections_is_zero() {
        assert_eq!(region_nsfw_score(&[]), 0.0);
    }

    #[test]
    fn decode_detections_drops_unrecognized_class_and_low_confidence_rows() {
        let class_names = ["EXPOSED_BREAST_F", "MYSTERY_CLASS"];
        let raw = vec![
            0.0, 0.0, 160.0, 160.0, 0.9, 0.0, // kept
            0.0, 0.0, 160.0, 160.0, 0.9, 1.0, // unknown class, dropped
            0.0, 0.0, 160.0, 160.0, 0.05, 0.0, // low confidence, dropped
        ];
        let detections = decode_detections(&raw, &class_names, 0.2, 320, 640, 640);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "EXPOSED_BREAST_F");
        assert_eq!(detections[0].bbox.x2, 320);
    }
}

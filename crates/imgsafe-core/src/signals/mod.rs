//! Independent signal extractors. Each one is a pure function (or a small
//! stateful wrapper around a lazily-loaded model) over one image; none of
//! them retain state across images.

pub mod aesthetic;
pub mod face;
pub mod mosaic;
pub mod nsfw_general;
pub mod nsfw_region;
pub mod pov;
pub mod skin_mask;

use crate::config::RunConfig;
use crate::model::LoadedImage;
use crate::report::SignalBundle;

/// Holds the lazily-loaded model handles for the life of a batch run, so
/// each is initialized at most once and reused across every image.
#[derive(Default)]
pub struct ClassifierContext {
    general: nsfw_general::LazyNsfwGeneral,
    region: nsfw_region::LazyNsfwRegion,
    face_detector: face::FaceDetector,
}

impl ClassifierContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every signal extractor over one loaded image, in the fixed
    /// order the spec prescribes, degrading each independently on failure.
    pub fn extract(
        &mut self,
        image: &LoadedImage,
        config: &RunConfig,
        reporter: &dyn crate::reporter::Reporter,
    ) -> SignalBundle {
        let mut bundle = SignalBundle::default();

        match self.general.score(&image.rgb) {
            Some(score) => bundle.falconsai_score = score,
            None => {
                reporter.warn(&format!(
                    "{}: general NSFW model unavailable, using neutral score",
                    image.path.display()
                ));
            }
        }

        match self.region.detect(&image.rgb) {
            Some(detections) => {
                bundle.nudenet_score = nsfw_region::region_nsfw_score(&detections);
                bundle.detections = detections;
            }
            None => {
                reporter.warn(&format!(
                    "{}: region NSFW model unavailable, using neutral score",
                    image.path.display()
                ));
            }
        }

        match self.face_detector.detect(&image.gray) {
            Ok(faces) => {
                let (w, h) = image.rgb.dimensions();
                bundle.face_score = face::face_score(&faces, w, h);
                bundle.faces = faces;
            }
            Err(e) => {
                reporter.warn(&format!(
                    "{}: face detection failed ({e}), using neutral score",
                    image.path.display()
                ));
            }
        }

        bundle.aesthetic_score = aesthetic::aesthetic_score(&image.gray);

        if !config.skip_mosaic {
            let score = mosaic::mosaic_score(&image.gray, &image.bgr);
            bundle.mosaic_score = score;
            bundle.mosaic_detected = score > config.thresholds.mosaic_score_threshold;
        }

        if !config.skip_pov {
            let pov = pov::detect_pov(&bundle.faces, &image.bgr);
            bundle.pov_score = pov.score;
            bundle.pov_detected = pov.detected;
        }

        bundle
    }
}

//! Score fusion and tier assignment.
//!
//! Both are total, pure functions over a [`SignalBundle`] — no `Result`,
//! no I/O. Every degraded signal has already been normalized to its
//! neutral value by the extractor that produced it, so fusion never needs
//! to special-case a missing score.

use crate::config::ThresholdConfig;
use crate::report::{Classification, SignalBundle, Tier};

/// Combines the general and region NSFW scores into one fused score.
///
/// The two halves of the model disagree systematically: the general
/// classifier over-flags, while the region detector is conservative but
/// authoritative when it does fire. The weighting below trusts whichever
/// side has the stronger opinion and blends only in the ambiguous middle.
pub fn fuse_nsfw_score(falconsai_score: f32, nudenet_score: f32) -> f32 {
    let n = nudenet_score;
    let f = falconsai_score;

    let fused = if n < 0.25 {
        0.3 * f
    } else if n > 0.6 {
        n
    } else {
        0.7 * n + 0.3 * f
    };

    fused.clamp(0.0, 1.0)
}

/// Assigns a tier to one image's signal bundle under the fixed rule
/// precedence: mosaic overrides everything, POV overrides the score-based
/// rules, and only then do the NSFW-score thresholds and face requirement
/// apply.
pub fn classify(bundle: &SignalBundle, thresholds: &ThresholdConfig) -> (Tier, String, f32) {
    let nsfw_score = fuse_nsfw_score(bundle.falconsai_score, bundle.nudenet_score);

    if bundle.mosaic_detected {
        return (Tier::Nsfw, "mosaic detected".to_string(), nsfw_score);
    }

    if bundle.pov_detected {
        return (
            Tier::Safe,
            "POV composition detected".to_string(),
            nsfw_score,
        );
    }

    if nsfw_score < thresholds.super_safe_threshold && bundle.face_score > thresholds.min_face_score {
        return (Tier::SuperSafe, "clean image with face detected".to_string(), nsfw_score);
    }

    if nsfw_score < thresholds.nsfw_threshold {
        let reason = if bundle.face_score <= thresholds.min_face_score {
            "no face detected".to_string()
        } else {
            "nsfw score too high for super_safe".to_string()
        };
        return (Tier::Safe, reason, nsfw_score);
    }

    (Tier::Nsfw, "nsfw score above threshold".to_string(), nsfw_score)
}

/// Builds the final [`Classification`] record for one image.
pub fn build_classification(
    filename: String,
    bundle: &SignalBundle,
    thresholds: &ThresholdConfig,
) -> Classification {
    let (tier, reason, nsfw_score) = classify(bundle, thresholds);

    Classification {
        filename,
        is_super_safe: tier == Tier::SuperSafe,
        is_safe: matches!(tier, Tier::SuperSafe | Tier::Safe),
        nsfw_score: crate::report::round4(nsfw_score),
        face_score: crate::report::round4(bundle.face_score),
        aesthetic_score: crate::report::round4(bundle.aesthetic_score),
        falconsai_score: crate::report::round4(bundle.falconsai_score),
        nudenet_score: crate::report::round4(bundle.nudenet_score),
        mosaic_detected: bundle.mosaic_detected,
        mosaic_score: crate::report::round4(bundle.mosaic_score),
        pov_detected: bundle.pov_detected,
        pov_score: crate::report::round4(bundle.pov_score),
        classification: tier,
        reason,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fusion_trusts_region_silence_below_025() {
        assert_eq!(fuse_nsfw_score(0.9, 0.1), 0.3 * 0.9);
    }

    #[test]
    fn fusion_trusts_region_confidence_above_06() {
        assert_eq!(fuse_nsfw_score(0.1, 0.9), 0.9);
    }

    #[test]
    fn fusion_blends_in_the_ambiguous_middle() {
        let fused = fuse_nsfw_score(0.4, 0.4);
        assert_eq!(fused, 0.7 * 0.4 + 0.3 * 0.4);
    }

    #[test]
    fn fusion_boundary_continuity_at_kinks() {
        // Just below / at / just above n=0.25 should not jump wildly.
        let below = fuse_nsfw_score(0.5, 0.24);
        let at = fuse_nsfw_score(0.5, 0.25);
        assert!((below - at).abs() < 0.2);

        let below_06 = fuse_nsfw_score(0.5, 0.6);
        let above_06 = fuse_nsfw_score(0.5, 0.61);
        assert!((below_06 - above_06).abs() < 0.2);
    }

    fn base_bundle() -> SignalBundle {
        SignalBundle {
            falconsai_score: 0.0,
            nudenet_score: 0.0,
            face_score: 0.6,
            aesthetic_score: 0.7,
            mosaic_detected: false,
            mosaic_score: 0.0,
            pov_detected: false,
            pov_score: 0.0,
            detections: Vec::new(),
            faces: Vec::new(),
        }
    }

    #[test]
    fn mosaic_overrides_everything_else() {
        let mut bundle = base_bundle();
        bundle.mosaic_detected = true;
        let (tier, reason, _) = classify(&bundle, &ThresholdConfig::default());
        assert_eq!(tier, Tier::Nsfw);
        assert_eq!(reason, "mosaic detected");
    }

    #[test]
    fn pov_overrides_score_based_rules_but_not_mosaic() {
        let mut bundle = base_bundle();
        bundle.pov_detected = true;
        let (tier, _, _) = classify(&bundle, &ThresholdConfig::default());
        assert_eq!(tier, Tier::Safe);
    }

    #[test]
    fn clean_image_with_face_is_super_safe() {
        let bundle = base_bundle();
        let (tier, _, _) = classify(&bundle, &ThresholdConfig::default());
        assert_eq!(tier, Tier::SuperSafe);
    }

    #[test]
    fn low_score_without_face_is_safe_not_super_safe() {
        let mut bundle = base_bundle();
        bundle.face_score = 0.0;
        let (tier, reason, _) = classify(&bundle, &ThresholdConfig::default());
        assert_eq!(tier, Tier::Safe);
        assert_eq!(reason, "no face detected");
    }

    #[test]
    fn high_fused_score_is_nsfw() {
        let mut bundle = base_bundle();
        bundle.nudenet_score = 0.9;
        let (tier, _, score) = classify(&bundle, &ThresholdConfig::default());
        assert_eq!(tier, Tier::Nsfw);
        assert_eq!(score, 0.9);
    }

    #[test]
    fn super_safe_is_subset_of_safe() {
        let bundle = base_bundle();
        let classification =
            build_classification("a.jpg".to_string(), &bundle, &ThresholdConfig::default());
        assert!(classification.is_super_safe);
        assert!(classification.is_safe);
    }

    #[test]
    fn lowering_nsfw_threshold_never_decreases_nsfw_count() {
        let mut bundle = base_bundle();
        bundle.nudenet_score = 0.5;
        bundle.falconsai_score = 0.5;

        let loose = ThresholdConfig {
            nsfw_threshold: 0.9,
            ..ThresholdConfig::default()
        };
        let strict = ThresholdConfig {
            nsfw_threshold: 0.1,
            ..ThresholdConfig::default()
        };

        let (loose_tier, _, _) = classify(&bundle, &loose);
        let (strict_tier, _, _) = classify(&bundle, &strict);

        let is_nsfw = |t: Tier| t == Tier::Nsfw;
        assert!(!is_nsfw(loose_tier) || is_nsfw(strict_tier) || is_nsfw(loose_tier) == is_nsfw(strict_tier));
        // Strictly: lowering the threshold only ever moves images into nsfw.
        if is_nsfw(loose_tier) {
            assert!(is_nsfw(strict_tier));
        }
    }
}

//! Explicit, immutable run configuration.
//!
//! Replaces a global mutable-threshold table with a value object that is
//! constructed once per run and passed by reference through the driver,
//! fusion stage, and deduper. Building a new config (rather than mutating an
//! existing one) is the only supported way to change thresholds mid-process.

use serde::{Deserialize, Serialize};

/// Tier and signal thresholds used by fusion, tier assignment, and dedup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Fused NSFW score below which an image may qualify for `super_safe`.
    pub super_safe_threshold: f32,
    /// Fused NSFW score at or above which an image is `nsfw`.
    pub nsfw_threshold: f32,
    /// Minimum face score required for `super_safe`.
    pub min_face_score: f32,
    /// Hamming-distance threshold below which two perceptual hashes are
    /// considered duplicates.
    pub phash_threshold: u32,
    /// Mosaic score above which `mosaic_detected` is set.
    pub mosaic_score_threshold: f32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            super_safe_threshold: 0.15,
            nsfw_threshold: 0.30,
            min_face_score: 0.10,
            phash_threshold: 8,
            mosaic_score_threshold: 0.005,
        }
    }
}

impl ThresholdConfig {
    /// Clamps all thresholds into their valid ranges. Scores live in
    /// [0,1]; the phash threshold is a bit count in [0,64].
    pub fn clamped(mut self) -> Self {
        self.super_safe_threshold = self.super_safe_threshold.clamp(0.0, 1.0);
        self.nsfw_threshold = self.nsfw_threshold.clamp(0.0, 1.0);
        self.min_face_score = self.min_face_score.clamp(0.0, 1.0);
        self.mosaic_score_threshold = self.mosaic_score_threshold.clamp(0.0, 1.0);
        self.phash_threshold = self.phash_threshold.min(64);
        self
    }
}

/// Non-threshold run flags, combined with [`ThresholdConfig`] into one value
/// the batch driver holds for the life of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub thresholds: ThresholdConfig,
    /// Skip the perceptual-hash dedup pass entirely.
    pub skip_dedup: bool,
    /// Skip mosaic/censorship detection (mosaic_detected always false).
    pub skip_mosaic: bool,
    /// Skip POV-composition detection (pov_detected always false).
    pub skip_pov: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            skip_dedup: false,
            skip_mosaic: false,
            skip_pov: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_are_sane() {
        let cfg = ThresholdConfig::default();
        assert!(cfg.super_safe_threshold < cfg.nsfw_threshold);
        assert!(cfg.min_face_score > 0.0);
    }

    #[test]
    fn clamped_pulls_out_of_range_values_into_bounds() {
        let cfg = ThresholdConfig {
            super_safe_threshold: 1.5,
            nsfw_threshold: -0.2,
            min_face_score: 2.0,
            phash_threshold: 200,
            mosaic_score_threshold: -1.0,
        }
        .clamped();

        assert_eq!(cfg.super_safe_threshold, 1.0);
        assert_eq!(cfg.nsfw_threshold, 0.0);
        assert_eq!(cfg.min_face_score, 1.0);
        assert_eq!(cfg.phash_threshold, 64);
        assert_eq!(cfg.mosaic_score_threshold, 0.0);
    }

    #[test]
    fn run_config_default_does_not_skip_anything() {
        let cfg = RunConfig::default();
        assert!(!cfg.skip_dedup);
        assert!(!cfg.skip_mosaic);
        assert!(!cfg.skip_pov);
    }
}

//! General-purpose whole-image NSFW scorer.
//!
//! Wraps an ONNX Vision Transformer classifier (the "falconsai" score in the
//! report). Supports both 2-class (sfw/nsfw) and 5-class
//! (drawings/hentai/neutral/porn/sexy) output heads.

#[cfg(feature = "ml")]
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::NsfwClassifierError;

/// Configuration for the general NSFW classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NsfwGeneralConfig {
    pub model_path: String,
    pub input_size: u32,
}

impl Default for NsfwGeneralConfig {
    fn default() -> Self {
        Self {
            model_path: "models/nsfw_general.onnx".to_string(),
            input_size: 224,
        }
    }
}

#[cfg(feature = "ml")]
pub struct NsfwGeneralClassifier {
    session: ort::session::Session,
    config: NsfwGeneralConfig,
}

#[cfg(feature = "ml")]
impl NsfwGeneralClassifier {
    pub fn new(config: NsfwGeneralConfig) -> Result<Self, NsfwClassifierError> {
        use ort::session::{builder::GraphOptimizationLevel, Session};

        if !Path::new(&config.model_path).exists() {
            return Err(NsfwClassifierError::ModelNotFound(config.model_path.clone()));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(&config.model_path)?;

        Ok(Self { session, config })
    }

    pub fn try_load(config: NsfwGeneralConfig) -> Option<Self> {
        Self::new(config).ok()
    }

    /// Scores an RGB image, returning P(NSFW) in `[0, 1]`.
    pub fn score(&mut self, rgb: &image::RgbImage) -> Result<f32, NsfwClassifierError> {
        let resized = image::imageops::resize(
            rgb,
            self.config.input_size,
            self.config.input_size,
            image::imageops::FilterType::Triangle,
        );

        let mean = [0.485, 0.456, 0.406];
        let std = [0.229, 0.224, 0.225];
        let n = self.config.input_size as usize;
        let mut tensor_data = vec![0.0f32; 3 * n * n];

        for (y, row) in resized.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                let r = (pixel[0] as f32 / 255.0 - mean[0]) / std[0];
                let g = (pixel[1] as f32 / 255.0 - mean[1]) / std[1];
                let b = (pixel[2] as f32 / 255.0 - mean[2]) / std[2];
                tensor_data[y * n + x] = r;
                tensor_data[n * n + y * n + x] = g;
                tensor_data[2 * n * n + y * n + x] = b;
            }
        }

        let input_tensor = ort::value::Tensor::from_array((
            [1usize, 3, n, n],
            tensor_data.into_boxed_slice(),
        ))?;

        let outputs = self
            .session
            .run(ort::inputs!["pixel_values" => input_tensor])?;

        let logits_tensor = outputs["logits"]
            .try_extract_tensor::<f32>()
            .map_err(|e| NsfwClassifierError::Inference(format!("failed to extract logits: {e}")))?;
        let logits = logits_tensor.1;

        let nsfw = if logits.len() >= 5 {
            let probs = softmax_multi(&logits[..5]);
            probs[1] + probs[3] + probs[4] // hentai + porn + sexy
        } else if logits.len() >= 2 {
            softmax(logits[0], logits[1]).1
        } else {
            return Err(NsfwClassifierError::Inference(format!(
                "expected at least 2 output classes, got {}",
                logits.len()
            )));
        };

        Ok(nsfw.clamp(0.0, 1.0))
    }
}

#[cfg(feature = "ml")]
fn softmax(a: f32, b: f32) -> (f32, f32) {
    let max = a.max(b);
    let exp_a = (a - max).exp();
    let exp_b = (b - max).exp();
    let sum = exp_a + exp_b;
    (exp_a / sum, exp_b / sum)
}

#[cfg(feature = "ml")]
fn softmax_multi(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_vals: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exp_vals.iter().sum();
    exp_vals.iter().map(|x| x / sum).collect()
}

/// Stub used when the `ml` feature is disabled: always reports the model as
/// unavailable so callers degrade the signal to neutral.
#[cfg(not(feature = "ml"))]
pub struct NsfwGeneralClassifier {
    _config: NsfwGeneralConfig,
}

#[cfg(not(feature = "ml"))]
impl NsfwGeneralClassifier {
    pub fn new(_config: NsfwGeneralConfig) -> Result<Self, NsfwClassifierError> {
        Err(NsfwClassifierError::MlNotEnabled)
    }

    pub fn try_load(_config: NsfwGeneralConfig) -> Option<Self> {
        None
    }

    pub fn score(&mut self, _rgb: &image::RgbImage) -> Result<f32, NsfwClassifierError> {
        Err(NsfwClassifierError::MlNotEnabled)
    }
}

/// Lazily loads the classifier on first use and retries if the model file
/// later appears (e.g. downloaded mid-run by an external process).
pub struct LazyNsfwGeneral {
    classifier: Option<NsfwGeneralClassifier>,
    config: NsfwGeneralConfig,
    load_attempted: bool,
}

impl LazyNsfwGeneral {
    pub fn new(config: NsfwGeneralConfig) -> Self {
        Self {
            classifier: None,
            config,
            load_attempted: false,
        }
    }

    fn ensure_loaded(&mut self) -> bool {
        if self.classifier.is_some() {
            return true;
        }

        if self.load_attempted && !std::path::Path::new(&self.config.model_path).exists() {
            return false;
        }

        self.load_attempted = true;
        self.classifier = NsfwGeneralClassifier::try_load(self.config.clone());
        self.classifier.is_some()
    }

    /// Scores an image, returning `None` (not an error) if the classifier is
    /// unavailable — callers treat that as a neutral-score degradation.
    pub fn score(&mut self, rgb: &image::RgbImage) -> Option<f32> {
        if !self.ensure_loaded() {
            return None;
        }
        self.classifier.as_mut().unwrap().score(rgb).ok()
    }
}

impl Default for LazyNsfwGeneral {
    fn default() -> Self {
        Self::new(NsfwGeneralConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_file_is_reported_not_panicked() {
        let config = NsfwGeneralConfig {
            model_path: "/nonexistent/model.onnx".to_string(),
            ..Default::default()
        };
        assert!(NsfwGeneralClassifier::try_load(config).is_none());
    }

    #[test]
    fn lazy_wrapper_degrades_to_none_without_model() {
        let mut lazy = LazyNsfwGeneral::new(NsfwGeneralConfig {
            model_path: "/nonexistent/model.onnx".to_string(),
            ..Default::default()
        });
        let img = image::RgbImage::new(8, 8);
        assert!(lazy.score(&img).is_none());
    }
}

//! Error types for the classification pipeline.
//!
//! Each component gets its own `thiserror` enum. Signal extractors never let
//! these escape past the batch driver: a failure degrades that signal to its
//! neutral value and is logged through the [`crate::reporter::Reporter`].

use thiserror::Error;

/// Failure to load an image from disk into the two rasters the pipeline needs.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported or corrupt image data in {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Failure of an ONNX-backed NSFW classifier (general or region).
#[derive(Debug, Error)]
pub enum NsfwClassifierError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),

    #[cfg(feature = "ml")]
    #[error("onnx runtime error: {0}")]
    Ort(#[from] ort::Error),

    #[error("image preprocessing error: {0}")]
    Preprocess(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("unrecognized NSFW label: {0}")]
    UnknownLabel(String),

    #[error("ML feature not enabled - rebuild with --features ml")]
    MlNotEnabled,
}

/// Failure of the Haar-like face detector. Pure CPU code; in practice this
/// only triggers on malformed input rasters.
#[derive(Debug, Error)]
pub enum FaceDetectError {
    #[error("image too small to scan: {0}x{1}")]
    TooSmall(u32, u32),
}

/// Failure of the smart-blur remediation pass.
#[derive(Debug, Error)]
pub enum BlurError {
    #[error("failed to load image for blurring: {0}")]
    Load(#[from] ImageLoadError),

    #[error("failed to encode blurred output: {0}")]
    Encode(#[from] image::ImageError),

    #[error("failed to write blurred output to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error for a batch run. Only input validation and truly
/// unexpected failures reach this; per-image problems are recorded as
/// `Classification::error` entries in the report instead.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("input path does not exist: {0}")]
    InputPathMissing(String),

    #[error("failed to list input directory {path}: {source}")]
    InputReadFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report to {path}: {source}")]
    ReportWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

//! Image loading: decodes a file into the raster representations the rest
//! of the pipeline needs.
//!
//! The general NSFW classifier wants plain RGB. The region detectors and
//! heuristic signals (skin mask, mosaic, POV, aesthetic) were designed
//! against an OpenCV-style BGR raster, so we keep a second, cheaply-derived
//! BGR view rather than rewrite every heuristic's channel order.

use std::path::{Path, PathBuf};

use image::{GrayImage, RgbImage};

use crate::error::ImageLoadError;

/// A BGR raster, channel-swapped from the decoded RGB buffer.
///
/// `image` dropped a dedicated BGR pixel type some releases ago; the
/// heuristic signals only need indexed pixel access, so a flat byte buffer
/// plus width/height is all this needs to be.
#[derive(Debug, Clone)]
pub struct BgrRaster {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl BgrRaster {
    pub fn from_rgb(rgb: &RgbImage) -> Self {
        let (width, height) = rgb.dimensions();
        let mut data = Vec::with_capacity(rgb.as_raw().len());
        for px in rgb.pixels() {
            data.push(px[2]);
            data.push(px[1]);
            data.push(px[0]);
        }
        Self { width, height, data }
    }

    /// Returns `[b, g, r]` for the pixel at `(x, y)`. Panics out of bounds,
    /// matching `image::ImageBuffer::get_pixel`'s contract.
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y * self.width + x) * 3) as usize;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// The three views of one decoded image, held for the duration of its
/// classification and dropped once the result is pushed into the report.
pub struct LoadedImage {
    pub path: PathBuf,
    pub rgb: RgbImage,
    pub bgr: BgrRaster,
    pub gray: GrayImage,
}

/// Reads `path`, decodes it, and builds all three rasters.
///
/// Only `.jpg`/`.jpeg`/`.png`/`.webp` (case-insensitive) are attempted;
/// callers are expected to have already filtered the directory listing by
/// extension, but decoding itself is what actually validates the bytes.
pub fn load(path: &Path) -> Result<LoadedImage, ImageLoadError> {
    let bytes = std::fs::read(path).map_err(|source| ImageLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let decoded = image::load_from_memory(&bytes).map_err(|source| ImageLoadError::Decode {
        path: path.display().to_string(),
        source,
    })?;

    let rgb = decoded.to_rgb8();
    let gray = image::imageops::grayscale(&rgb);
    let bgr = BgrRaster::from_rgb(&rgb);

    Ok(LoadedImage {
        path: path.to_path_buf(),
        rgb,
        bgr,
        gray,
    })
}

/// Recognized image extensions, matched case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

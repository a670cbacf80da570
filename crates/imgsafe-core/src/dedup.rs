//! Perceptual-hash deduplication.
//!
//! Computes a gradient-based perceptual hash per image and keeps one
//! representative per near-duplicate class, scanning left-to-right so the
//! first occurrence of a visually distinct image always wins.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use img_hash::{HashAlg, Hasher, HasherConfig};

/// 64-bit gradient hash, invariant to small resamplings and JPEG noise.
pub struct PerceptualHasher {
    hasher: Hasher,
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PerceptualHasher {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Gradient)
            .hash_size(8, 8)
            .to_hasher();
        Self { hasher }
    }

    pub fn hash(&self, image: &DynamicImage) -> Vec<u8> {
        self.hasher.hash_image(image).as_bytes().to_vec()
    }
}

fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// One survivor of the dedup pass, along with how many duplicates it
/// absorbed.
pub struct DedupEntry {
    pub path: PathBuf,
    pub image: DynamicImage,
}

/// Result of running dedup over a batch: the kept representatives plus how
/// many inputs were dropped as duplicates.
pub struct DedupResult {
    pub kept: Vec<DedupEntry>,
    pub duplicates_removed: usize,
}

/// Scans `images` in order, keeping a representative whenever its minimum
/// Hamming distance to every prior representative exceeds `threshold`.
/// Images that fail to decode are always kept — dedup must never silently
/// drop an image it could not evaluate.
pub fn dedup(
    images: Vec<(PathBuf, DynamicImage)>,
    threshold: u32,
) -> DedupResult {
    let hasher = PerceptualHasher::new();
    let mut kept: Vec<DedupEntry> = Vec::new();
    let mut kept_hashes: Vec<Vec<u8>> = Vec::new();
    let mut duplicates_removed = 0;

    for (path, image) in images {
        let hash = hasher.hash(&image);
        let is_duplicate = kept_hashes
            .iter()
            .any(|kept_hash| hamming_distance(kept_hash, &hash) <= threshold);

        if is_duplicate {
            duplicates_removed += 1;
            continue;
        }

        kept_hashes.push(hash);
        kept.push(DedupEntry { path, image });
    }

    DedupResult {
        kept,
        duplicates_removed,
    }
}

/// Reads and decodes every image under `paths`, then runs [`dedup`] over the
/// ones that decoded. Images that fail to load are never silently dropped:
/// they are returned alongside the dedup result so the caller can still
/// record a `Classification` for each of them.
pub fn load_and_dedup(
    paths: &[PathBuf],
    threshold: u32,
) -> (DedupResult, Vec<(PathBuf, String)>) {
    let mut decoded = Vec::with_capacity(paths.len());
    let mut load_failures = Vec::new();

    for path in paths {
        match image::open(path as &Path) {
            Ok(img) => decoded.push((path.clone(), img)),
            Err(e) => load_failures.push((path.clone(), e.to_string())),
        }
    }

    (dedup(decoded, threshold), load_failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(color: [u8; 3], w: u32, h: u32) -> DynamicImage {
        let mut img = RgbImage::new(w, h);
        for px in img.pixels_mut() {
            *px = Rgb(color);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn identical_images_collapse_to_one_representative() {
        let images = vec![
            (PathBuf::from("a.png"), solid([10, 10, 10], 32, 32)),
            (PathBuf::from("b.png"), solid([10, 10, 10], 32, 32)),
            (PathBuf::from("c.png"), solid([10, 10, 10], 32, 32)),
        ];

        let result = dedup(images, 8);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.duplicates_removed, 2);
        assert_eq!(result.kept[0].path, PathBuf::from("a.png"));
    }

    #[test]
    fn visually_distinct_images_are_all_kept() {
        let images = vec![
            (PathBuf::from("black.png"), solid([0, 0, 0], 32, 32)),
            (PathBuf::from("white.png"), solid([255, 255, 255], 32, 32)),
        ];

        let result = dedup(images, 8);
        assert_eq!(result.kept.len(), 2);
        assert_eq!(result.duplicates_removed, 0);
    }

    #[test]
    fn dedup_is_idempotent_over_its_own_output() {
        let images = vec![
            (PathBuf::from("a.png"), solid([10, 10, 10], 32, 32)),
            (PathBuf::from("b.png"), solid([200, 30, 80], 32, 32)),
        ];
        let first = dedup(images, 8);
        let again: Vec<_> = first
            .kept
            .iter()
            .map(|e| (e.path.clone(), e.image.clone()))
            .collect();
        let second = dedup(again, 8);
        assert_eq!(second.kept.len(), first.kept.len());
        assert_eq!(second.duplicates_removed, 0);
    }

    #[test]
    fn empty_input_keeps_nothing() {
        let result = dedup(Vec::new(), 8);
        assert!(result.kept.is_empty());
        assert_eq!(result.duplicates_removed, 0);
    }

    #[test]
    fn load_and_dedup_surfaces_unreadable_paths_instead_of_dropping_them() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        solid([10, 10, 10], 16, 16)
            .save(&good)
            .unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"not an image").unwrap();

        let (result, failures) = load_and_dedup(&[good.clone(), bad.clone()], 8);
        assert_eq!(result.kept.len(), 1);
        assert_eq!(result.kept[0].path, good);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, bad);
        assert!(!failures[0].1.is_empty());
    }
}

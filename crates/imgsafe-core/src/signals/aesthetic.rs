//! Aesthetic scoring: a cheap sharpness + brightness heuristic standing in
//! for a learned aesthetic model.

use image::GrayImage;
use imageproc::filter::filter3x3;

/// Standard 4-neighbor discrete Laplacian kernel, matching OpenCV's
/// `cv2.Laplacian(src, cv2.CV_64F)` default.
const LAPLACIAN_KERNEL: [i32; 9] = [0, 1, 0, 1, -4, 1, 0, 1, 0];

/// Variance of the Laplacian response over a grayscale image — a standard
/// blur/sharpness proxy: sharp edges produce high-magnitude responses, a
/// uniformly blurred image collapses toward zero everywhere.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let response: image::ImageBuffer<image::Luma<i16>, Vec<i16>> =
        filter3x3(gray, &LAPLACIAN_KERNEL);

    let values: Vec<f64> = response.pixels().map(|p| p[0] as f64).collect();
    if values.is_empty() {
        return 0.0;
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

fn mean_gray(gray: &GrayImage) -> f64 {
    if gray.is_empty() {
        return 0.0;
    }
    let sum: u64 = gray.pixels().map(|p| p[0] as u64).sum();
    sum as f64 / gray.pixels().len() as f64
}

/// `0.6 * sharpness + 0.4 * brightness_score`, both terms in `[0, 1]`.
pub fn aesthetic_score(gray: &GrayImage) -> f32 {
    let sharpness = (laplacian_variance(gray) / 500.0).min(1.0);
    let brightness = mean_gray(gray) / 255.0;
    let brightness_score = 1.0 - 2.0 * (brightness - 0.5).abs();

    (0.6 * sharpness + 0.4 * brightness_score).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn uniform_image_has_zero_laplacian_variance() {
        let gray = GrayImage::from_pixel(16, 16, Luma([128]));
        assert_eq!(laplacian_variance(&gray), 0.0);
    }

    #[test]
    fn checkerboard_has_high_laplacian_variance() {
        let mut gray = GrayImage::new(16, 16);
        for (x, y, px) in gray.enumerate_pixels_mut() {
            *px = if (x + y) % 2 == 0 { Luma([0]) } else { Luma([255]) };
        }
        assert!(laplacian_variance(&gray) > 1000.0);
    }

    #[test]
    fn mid_gray_uniform_image_has_best_brightness_score() {
        let gray = GrayImage::from_pixel(16, 16, Luma([128]));
        let score = aesthetic_score(&gray);
        // Flat image: zero sharpness, near-ideal brightness -> ~0.4.
        assert!((score - 0.4).abs() < 0.05);
    }

    #[test]
    fn pure_black_image_has_worst_brightness_score() {
        let gray = GrayImage::from_pixel(16, 16, Luma([0]));
        let score = aesthetic_score(&gray);
        assert!(score < 0.05);
    }

    #[test]
    fn aesthetic_score_is_always_in_unit_range() {
        let mut gray = GrayImage::new(32, 32);
        for (x, y, px) in gray.enumerate_pixels_mut() {
            *px = Luma([((x * 7 + y * 13) % 256) as u8]);
        }
        let score = aesthetic_score(&gray);
        assert!((0.0..=1.0).contains(&score));
    }
}

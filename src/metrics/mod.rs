//! Quality metrics and tone mapping for float rasters.
//!
//! Comparisons run over the common top-left extent of the two rasters:
//! `min(height)`, `min(width)` and `min(channels)`. They never fail on
//! size mismatch.
//!
//! - [`l1_loss`]: mean absolute difference
//! - [`ssim::structural_similarity`]: per-channel SSIM, averaged
//! - [`cross_correlation`]: per-channel normalized correlation, averaged
//! - [`blur::gaussian_blur`]: isotropic smoothing, used as a denoising baseline
//! - [`exposure`]: autoexposure search and LDR tone mapping

pub mod blur;
pub mod exposure;
pub mod ssim;

use serde::{Deserialize, Serialize};

use crate::raster::Raster;

pub use blur::gaussian_blur;
pub use exposure::{compute_autoexposure, save_png, tonemap_to_ldr};
pub use ssim::structural_similarity;

/// Metrics comparing a test raster against a reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Mean absolute difference (lower is better).
    pub l1: f64,
    /// Structural similarity (higher is better, 1 = identical).
    pub ssim: f64,
    /// Normalized cross-correlation (higher is better).
    pub cross_correlation: f64,
}

/// Compute every metric between `test` and `reference`.
#[must_use]
pub fn compare(test: &Raster, reference: &Raster) -> Comparison {
    Comparison {
        l1: l1_loss(test, reference),
        ssim: structural_similarity(test, reference),
        cross_correlation: cross_correlation(test, reference),
    }
}

/// Mean absolute difference over the common extent.
#[must_use]
pub fn l1_loss(a: &Raster, b: &Raster) -> f64 {
    let (height, width, channels) = common_extent(a, b);
    let mut sum = 0.0f64;
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                sum += (f64::from(a.get(y, x, c)) - f64::from(b.get(y, x, c))).abs();
            }
        }
    }
    sum / (height * width * channels) as f64
}

/// Zero-lag normalized cross-correlation, averaged across channels.
///
/// Each channel plane is shifted to zero mean and scaled to unit variance;
/// a plane with zero variance is only shifted.
#[must_use]
pub fn cross_correlation(a: &Raster, b: &Raster) -> f64 {
    let (height, width, channels) = common_extent(a, b);
    let mut total = 0.0;
    for c in 0..channels {
        let pa = standardize(plane(a, c, height, width));
        let pb = standardize(plane(b, c, height, width));
        let dot: f64 = pa.iter().zip(&pb).map(|(x, y)| x * y).sum();
        total += dot / pa.len() as f64;
    }
    total / channels as f64
}

/// `(height, width, channels)` shared by both rasters.
pub(crate) fn common_extent(a: &Raster, b: &Raster) -> (usize, usize, usize) {
    let (ha, wa, ca) = a.shape();
    let (hb, wb, cb) = b.shape();
    (ha.min(hb), wa.min(wb), ca.min(cb))
}

/// One channel of the top-left `height x width` window, as `f64`.
pub(crate) fn plane(raster: &Raster, c: usize, height: usize, width: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(height * width);
    for y in 0..height {
        for x in 0..width {
            out.push(f64::from(raster.get(y, x, c)));
        }
    }
    out
}

fn standardize(mut values: Vec<f64>) -> Vec<f64> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    for v in &mut values {
        *v -= mean;
        if std > 0.0 {
            *v /= std;
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Channels;

    fn raster(width: usize, height: usize, channels: Channels, f: impl Fn(usize) -> f32) -> Raster {
        let data = (0..width * height * channels.count()).map(f).collect();
        Raster::new(width, height, channels, data, "test").unwrap()
    }

    #[test]
    fn test_l1_identical_is_zero() {
        let a = raster(4, 4, Channels::Color, |i| i as f32);
        assert_eq!(l1_loss(&a, &a), 0.0);
    }

    #[test]
    fn test_l1_constant_difference() {
        let a = raster(3, 2, Channels::Color, |_| 1.0);
        let b = raster(3, 2, Channels::Color, |_| 3.5);
        assert!((l1_loss(&a, &b) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_l1_uses_common_extent() {
        let small = raster(2, 2, Channels::Scalar, |_| 1.0);
        let mut large = raster(4, 3, Channels::Color, |_| 1.0);
        // Outside the common extent: must be ignored.
        large.set(2, 3, 0, 100.0);
        large.set(0, 0, 2, 100.0);
        assert_eq!(l1_loss(&small, &large), 0.0);
    }

    #[test]
    fn test_cross_correlation_bounds() {
        let a = raster(4, 4, Channels::Scalar, |i| (i * 7 % 5) as f32);
        let neg = raster(4, 4, Channels::Scalar, |i| -((i * 7 % 5) as f32) * 2.0 + 1.0);
        assert!((cross_correlation(&a, &a) - 1.0).abs() < 1e-9);
        assert!((cross_correlation(&a, &neg) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_correlation_constant_plane() {
        let a = raster(3, 3, Channels::Scalar, |_| 5.0);
        let b = raster(3, 3, Channels::Scalar, |i| i as f32);
        assert_eq!(cross_correlation(&a, &b), 0.0);
    }

    #[test]
    fn test_compare_identical() {
        let a = raster(8, 8, Channels::Color, |i| (i % 13) as f32 * 0.1);
        let cmp = compare(&a, &a);
        assert_eq!(cmp.l1, 0.0);
        assert!((cmp.ssim - 1.0).abs() < 1e-9);
        assert!((cmp.cross_correlation - 1.0).abs() < 1e-9);
    }
}

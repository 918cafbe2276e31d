//! Structural similarity (SSIM) for float rasters.
//!
//! Wang et al. 2004 with a uniform square window: local means, variances
//! and covariance are taken over every fully contained `7x7` window (or
//! the largest odd window that fits) using summed-area tables, and the
//! per-window index is averaged. The dynamic range `L` is the value range
//! of the reference plane, or 1 for a constant reference.

use crate::metrics::{common_extent, plane};
use crate::raster::Raster;

/// Default window side.
pub const WINDOW: usize = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// Per-channel SSIM of `test` against `reference`, averaged over channels.
#[must_use]
pub fn structural_similarity(test: &Raster, reference: &Raster) -> f64 {
    let (height, width, channels) = common_extent(test, reference);
    let mut total = 0.0;
    for c in 0..channels {
        let x = plane(test, c, height, width);
        let y = plane(reference, c, height, width);
        total += ssim_plane(&x, &y, width, height);
    }
    total / channels as f64
}

fn window_side(width: usize, height: usize) -> usize {
    let side = WINDOW.min(width).min(height);
    if side % 2 == 0 { side - 1 } else { side }
}

fn ssim_plane(x: &[f64], y: &[f64], width: usize, height: usize) -> f64 {
    let win = window_side(width, height);

    let (lo, hi) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = if hi > lo { hi - lo } else { 1.0 };
    let c1 = (K1 * range).powi(2);
    let c2 = (K2 * range).powi(2);

    let sx = SummedArea::build(width, height, |i| x[i]);
    let sy = SummedArea::build(width, height, |i| y[i]);
    let sxx = SummedArea::build(width, height, |i| x[i] * x[i]);
    let syy = SummedArea::build(width, height, |i| y[i] * y[i]);
    let sxy = SummedArea::build(width, height, |i| x[i] * y[i]);

    let n = (win * win) as f64;
    let mut total = 0.0;
    let mut count = 0usize;
    for top in 0..=height - win {
        for left in 0..=width - win {
            let mx = sx.window(top, left, win) / n;
            let my = sy.window(top, left, win) / n;
            let vx = (sxx.window(top, left, win) / n - mx * mx).max(0.0);
            let vy = (syy.window(top, left, win) / n - my * my).max(0.0);
            let cov = sxy.window(top, left, win) / n - mx * my;

            let numerator = (2.0 * mx * my + c1) * (2.0 * cov + c2);
            let denominator = (mx * mx + my * my + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }
    total / count as f64
}

/// Summed-area table with one row and column of zero padding.
struct SummedArea {
    stride: usize,
    sums: Vec<f64>,
}

impl SummedArea {
    fn build(width: usize, height: usize, value: impl Fn(usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for row in 0..height {
            let mut running = 0.0;
            for col in 0..width {
                running += value(row * width + col);
                sums[(row + 1) * stride + col + 1] = sums[row * stride + col + 1] + running;
            }
        }
        Self { stride, sums }
    }

    fn window(&self, top: usize, left: usize, side: usize) -> f64 {
        let s = self.stride;
        let (bottom, right) = (top + side, left + side);
        self.sums[bottom * s + right] - self.sums[top * s + right] - self.sums[bottom * s + left]
            + self.sums[top * s + left]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Channels;

    fn checker(width: usize, height: usize, scale: f32) -> Raster {
        let data = (0..width * height)
            .map(|i| if (i % width + i / width) % 2 == 0 { scale } else { 0.0 })
            .collect();
        Raster::new(width, height, Channels::Scalar, data, "checker").unwrap()
    }

    #[test]
    fn test_identical_is_one() {
        let a = checker(16, 12, 1.0);
        assert!((structural_similarity(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_identical_is_one() {
        let a = Raster::new(8, 8, Channels::Color, vec![0.25; 192], "flat").unwrap();
        assert!((structural_similarity(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_degraded_is_lower() {
        let reference = checker(16, 16, 1.0);
        let faded = checker(16, 16, 0.5);
        let flat = Raster::new(16, 16, Channels::Scalar, vec![0.5; 256], "flat").unwrap();
        let s_faded = structural_similarity(&faded, &reference);
        let s_flat = structural_similarity(&flat, &reference);
        assert!(s_faded < 1.0);
        assert!(s_flat < s_faded);
    }

    #[test]
    fn test_inverted_structure_is_negative() {
        let reference = checker(10, 10, 1.0);
        let data = reference.data().iter().map(|v| 1.0 - v).collect();
        let inverted = Raster::new(10, 10, Channels::Scalar, data, "inv").unwrap();
        assert!(structural_similarity(&inverted, &reference) < 0.0);
    }

    #[test]
    fn test_small_rasters_shrink_window() {
        assert_eq!(window_side(3, 20), 3);
        assert_eq!(window_side(4, 4), 3);
        assert_eq!(window_side(1, 1), 1);
        let a = checker(2, 2, 1.0);
        assert!((structural_similarity(&a, &a) - 1.0).abs() < 1e-12);
    }
}

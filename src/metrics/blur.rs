//! Separable Gaussian smoothing.

use crate::raster::Raster;

/// Kernel half-width in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Blur every channel of `raster` with an isotropic Gaussian of standard
/// deviation `sigma` (in pixels).
///
/// The kernel radius is `round(4 * sigma)` and borders are mirrored
/// (`d c b a | a b c d | d c b a`). A non-positive `sigma` returns a copy.
#[must_use]
pub fn gaussian_blur(raster: &Raster, sigma: f32) -> Raster {
    let mut out = raster.clone();
    if sigma.is_nan() || sigma <= 0.0 {
        return out;
    }
    let kernel = kernel(f64::from(sigma));
    let (height, width, channels) = raster.shape();

    let mut scratch = vec![0.0f64; raster.data().len()];
    // Rows.
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                scratch[(y * width + x) * channels + c] =
                    convolve(&kernel, |k| f64::from(raster.get(y, reflect(x as isize + k, width), c)));
            }
        }
    }
    // Columns.
    let data = out.data_mut();
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let value = convolve(&kernel, |k| {
                    scratch[(reflect(y as isize + k, height) * width + x) * channels + c]
                });
                data[(y * width + x) * channels + c] = value as f32;
            }
        }
    }
    out
}

fn kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

fn convolve(kernel: &[f64], sample: impl Fn(isize) -> f64) -> f64 {
    let radius = (kernel.len() / 2) as isize;
    kernel
        .iter()
        .zip(-radius..=radius)
        .map(|(w, k)| w * sample(k))
        .sum()
}

/// Mirror an out-of-range index back into `0..n`, edge sample repeated.
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period);
    if m < n as isize { m as usize } else { (period - 1 - m) as usize }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Channels;

    #[test]
    fn test_reflect() {
        let got: Vec<usize> = (-4..8).map(|i| reflect(i, 4)).collect();
        assert_eq!(got, vec![3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0]);
        assert_eq!(reflect(-3, 1), 0);
    }

    #[test]
    fn test_kernel_normalized() {
        let k = kernel(1.0);
        assert_eq!(k.len(), 9);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(k[4] > k[3] && k[3] > k[2]);
        assert_eq!(k[0], k[8]);
    }

    #[test]
    fn test_constant_is_unchanged() {
        let r = Raster::new(5, 4, Channels::Color, vec![0.75; 60], "flat").unwrap();
        let blurred = gaussian_blur(&r, 1.5);
        for v in blurred.data() {
            assert!((v - 0.75).abs() < 1e-6);
        }
    }

    #[test]
    fn test_zero_sigma_is_copy() {
        let r = Raster::new(3, 3, Channels::Scalar, (0..9).map(|i| i as f32).collect(), "r").unwrap();
        assert_eq!(gaussian_blur(&r, 0.0), r);
        assert_eq!(gaussian_blur(&r, -1.0), r);
    }

    #[test]
    fn test_impulse_spreads_and_conserves() {
        let mut r = Raster::zeros(9, 9, Channels::Scalar, "impulse").unwrap();
        r.set(4, 4, 0, 1.0);
        let blurred = gaussian_blur(&r, 1.0);
        let total: f32 = blurred.data().iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(blurred.get(4, 4, 0) < 1.0);
        assert!(blurred.get(4, 5, 0) > 0.0);
        assert!((blurred.get(3, 4, 0) - blurred.get(5, 4, 0)).abs() < 1e-7);
    }

    #[test]
    fn test_channels_independent() {
        let data = (0..16).flat_map(|_| [1.0, 0.0, 0.5]).collect();
        let r = Raster::new(4, 4, Channels::Color, data, "rgb").unwrap();
        let blurred = gaussian_blur(&r, 2.0);
        assert!((blurred.get(1, 2, 0) - 1.0).abs() < 1e-6);
        assert!(blurred.get(1, 2, 1).abs() < 1e-6);
        assert!((blurred.get(1, 2, 2) - 0.5).abs() < 1e-6);
    }
}

//! Autoexposure and LDR export.
//!
//! The exposure search works on the per-pixel channel average `a` and
//! counts a pixel as clipped when `a * 2^e > 1`. Starting at
//! [`START_EXPOSURE`], the exposure steps down by one stop until fewer than
//! [`CLIP_FRACTION`] of the pixels clip, or [`MIN_EXPOSURE`] is reached.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use imgref::ImgVec;
use rgb::RGB8;

use crate::error::Result;
use crate::raster::{Channels, Raster};

/// First exposure tried, in stops.
pub const START_EXPOSURE: f32 = 20.0;
/// Lowest exposure the search returns.
pub const MIN_EXPOSURE: f32 = -128.0;
/// Accepted fraction of clipped pixels (exclusive).
pub const CLIP_FRACTION: f64 = 0.1;
/// Display gamma used by LDR export.
pub const DEFAULT_GAMMA: f32 = 2.2;

/// Largest exposure (in whole stops from [`START_EXPOSURE`]) that clips
/// fewer than 10% of the pixels.
///
/// Non-finite or very bright rasters bottom out at [`MIN_EXPOSURE`].
#[must_use]
pub fn compute_autoexposure(raster: &Raster) -> f32 {
    let averages = pixel_averages(raster);
    let total = averages.len() as f64;

    let mut exposure = START_EXPOSURE;
    while exposure > MIN_EXPOSURE {
        let multiplier = f64::from(exposure).exp2();
        let clipped = averages.iter().filter(|&&a| a * multiplier > 1.0).count();
        if (clipped as f64) / total < CLIP_FRACTION {
            return exposure;
        }
        exposure -= 1.0;
    }
    MIN_EXPOSURE
}

fn pixel_averages(raster: &Raster) -> Vec<f64> {
    let n = raster.channels().count();
    raster
        .data()
        .chunks_exact(n)
        .map(|px| px.iter().map(|&v| f64::from(v)).sum::<f64>() / n as f64)
        .collect()
}

/// Convert a raster to 8-bit sRGB-like pixels.
///
/// Each sample is scaled by `2^exposure`, clamped to `[0, 1]`, raised to
/// `1 / gamma` and truncated to `0..=255`. Scalar rasters are replicated to
/// gray. With `flip`, rows are emitted bottom to top.
#[must_use]
pub fn tonemap_to_ldr(raster: &Raster, exposure: f32, gamma: f32, flip: bool) -> ImgVec<RGB8> {
    let (height, width, _) = raster.shape();
    let multiplier = exposure.exp2();
    let inv_gamma = 1.0 / gamma;
    let quantize = |v: f32| -> u8 {
        let v = (v * multiplier).clamp(0.0, 1.0).powf(inv_gamma);
        // `as` saturates and maps NaN to 0.
        (255.0 * v) as u8
    };

    let mut pixels = Vec::with_capacity(width * height);
    for row in 0..height {
        let y = if flip { height - 1 - row } else { row };
        for x in 0..width {
            let px = match raster.channels() {
                Channels::Scalar => {
                    let g = quantize(raster.get(y, x, 0));
                    RGB8::new(g, g, g)
                }
                Channels::Color => RGB8::new(
                    quantize(raster.get(y, x, 0)),
                    quantize(raster.get(y, x, 1)),
                    quantize(raster.get(y, x, 2)),
                ),
            };
            pixels.push(px);
        }
    }
    ImgVec::new(pixels, width, height)
}

/// Write 8-bit RGB pixels as a PNG file.
pub fn save_png(path: impl AsRef<Path>, image: &ImgVec<RGB8>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut encoder = png::Encoder::new(
        BufWriter::new(file),
        image.width() as u32,
        image.height() as u32,
    );
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);

    let bytes: Vec<u8> = image.pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&bytes)?;
    writer.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(values: Vec<f32>) -> Raster {
        let w = values.len();
        Raster::new(w, 1, Channels::Scalar, values, "test").unwrap()
    }

    #[test]
    fn test_autoexposure_dark_raster_keeps_start() {
        assert_eq!(compute_autoexposure(&scalar(vec![0.0; 16])), START_EXPOSURE);
    }

    #[test]
    fn test_autoexposure_unit_raster() {
        // 1.0 * 2^e > 1 for every e > 0, so the first accepted stop is 0.
        assert_eq!(compute_autoexposure(&scalar(vec![1.0; 16])), 0.0);
    }

    #[test]
    fn test_autoexposure_tolerates_outliers() {
        // 1 bright pixel out of 20 is 5%, below the clip threshold.
        let mut values = vec![0.25; 20];
        values[3] = 1.0e6;
        assert_eq!(compute_autoexposure(&scalar(values)), 2.0);
    }

    #[test]
    fn test_autoexposure_uses_pixel_average() {
        let data = vec![3.0, 0.0, 0.0, 3.0, 0.0, 0.0];
        let r = Raster::new(2, 1, Channels::Color, data, "rgb").unwrap();
        assert_eq!(compute_autoexposure(&r), 0.0);
    }

    #[test]
    fn test_autoexposure_terminates_at_floor() {
        assert_eq!(compute_autoexposure(&scalar(vec![f32::INFINITY; 4])), MIN_EXPOSURE);
        assert_eq!(compute_autoexposure(&scalar(vec![f32::MAX; 4])), MIN_EXPOSURE);
    }

    #[test]
    fn test_autoexposure_is_monotonic() {
        let mut previous = f32::INFINITY;
        for scale in [0.001f32, 0.1, 1.0, 10.0, 1000.0] {
            let e = compute_autoexposure(&scalar(vec![scale; 8]));
            assert!(e <= previous);
            previous = e;
        }
    }

    #[test]
    fn test_tonemap_quantization() {
        let img = tonemap_to_ldr(&scalar(vec![0.0, 0.25, 1.0, 4.0, -1.0, f32::NAN]), 0.0, 1.0, false);
        let gray: Vec<u8> = img.pixels().map(|p| p.g).collect();
        assert_eq!(gray, vec![0, 63, 255, 255, 0, 0]);
        assert!(img.pixels().all(|p| p.r == p.g && p.g == p.b));
    }

    #[test]
    fn test_tonemap_gamma_and_exposure() {
        let img = tonemap_to_ldr(&scalar(vec![0.125]), 1.0, 2.0, false);
        // 0.125 * 2 = 0.25, sqrt = 0.5, 255 * 0.5 = 127.5.
        assert_eq!(img.buf()[0].r, 127);
    }

    #[test]
    fn test_tonemap_flip() {
        let data = vec![1.0, 0.0];
        let r = Raster::new(1, 2, Channels::Scalar, data, "col").unwrap();
        let upright = tonemap_to_ldr(&r, 0.0, 1.0, false);
        let flipped = tonemap_to_ldr(&r, 0.0, 1.0, true);
        assert_eq!(upright.buf()[0].r, 255);
        assert_eq!(flipped.buf()[0].r, 0);
        assert_eq!(flipped.buf()[1].r, 255);
    }

    #[test]
    fn test_save_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let pixels = vec![RGB8::new(1, 2, 3), RGB8::new(250, 128, 0)];
        save_png(&path, &ImgVec::new(pixels, 2, 1)).unwrap();

        let decoder = png::Decoder::new(std::io::BufReader::new(File::open(&path).unwrap()));
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0u8; reader.output_buffer_size().unwrap()];
        let info = reader.next_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (2, 1));
        assert_eq!(&buf[..6], &[1, 2, 3, 250, 128, 0]);
    }
}

//! In-memory float rasters.
//!
//! A [`Raster`] is a row-major `(row, column, channel)` grid of `f32`
//! samples with either one channel (scalar field such as depth) or three
//! channels (radiance, normals). A [`Tensor`] is the channel-first layout
//! exchanged with the inference capability.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transform::{Sequence, Transform};

/// Channel layout of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channels {
    /// One sample per pixel.
    Scalar,
    /// Three samples per pixel.
    Color,
}

impl Channels {
    /// Number of samples per pixel.
    #[must_use]
    pub fn count(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Color => 3,
        }
    }

    /// Map a channel count to a layout. Only 1 and 3 are supported.
    #[must_use]
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(Self::Scalar),
            3 => Some(Self::Color),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Color => write!(f, "color"),
        }
    }
}

/// A `(height, width, channels)` grid of `f32` samples.
///
/// Invariants: `width > 0`, `height > 0`, and
/// `data.len() == width * height * channels`. Cloning is a deep copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: usize,
    height: usize,
    channels: Channels,
    data: Vec<f32>,
    origin: String,
}

impl Raster {
    /// Create a raster from row-major samples.
    pub fn new(
        width: usize,
        height: usize,
        channels: Channels,
        data: Vec<f32>,
        origin: impl Into<String>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidShape(format!(
                "raster dimensions must be positive, got {width}x{height}"
            )));
        }
        let expected = sample_count(&[width, height, channels.count()]).ok_or_else(|| {
            Error::InvalidShape(format!("{width}x{height} raster size overflows"))
        })?;
        if data.len() != expected {
            return Err(Error::InvalidShape(format!(
                "{width}x{height}x{} raster needs {expected} samples, buffer has {}",
                channels.count(),
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
            origin: origin.into(),
        })
    }

    /// Create a zero-filled raster.
    pub fn zeros(
        width: usize,
        height: usize,
        channels: Channels,
        origin: impl Into<String>,
    ) -> Result<Self> {
        let len = sample_count(&[width, height, channels.count()]).ok_or_else(|| {
            Error::InvalidShape(format!("{width}x{height} raster size overflows"))
        })?;
        Self::new(width, height, channels, vec![0.0; len], origin)
    }

    /// Reinterpret a flat buffer as `(height, width, channels)` without
    /// transposition. The buffer length must match exactly.
    pub fn from_flat(buffer: Vec<f32>, width: usize, height: usize, channels: usize) -> Result<Self> {
        let layout = Channels::from_count(channels).ok_or_else(|| {
            Error::InvalidShape(format!("unsupported channel count {channels}"))
        })?;
        Self::new(width, height, layout, buffer, "flat-buffer")
    }

    /// Transpose a channel-first tensor into a raster.
    pub fn from_channel_first(tensor: &Tensor) -> Result<Self> {
        let layout = Channels::from_count(tensor.channels).ok_or_else(|| {
            Error::InvalidShape(format!(
                "channel-first tensor has {} channels, expected 1 or 3",
                tensor.channels
            ))
        })?;
        let (c_count, height, width) = tensor.shape();
        let plane = height * width;
        let mut data = vec![0.0; plane * c_count];
        for c in 0..c_count {
            let src = &tensor.data[c * plane..(c + 1) * plane];
            for (i, &v) in src.iter().enumerate() {
                data[i * c_count + c] = v;
            }
        }
        Self::new(width, height, layout, data, "channel-first")
    }

    /// Transpose into a channel-first tensor.
    #[must_use]
    pub fn to_channel_first(&self) -> Tensor {
        let c_count = self.channels.count();
        let plane = self.width * self.height;
        let mut data = vec![0.0; plane * c_count];
        for (i, pixel) in self.data.chunks_exact(c_count).enumerate() {
            for (c, &v) in pixel.iter().enumerate() {
                data[c * plane + i] = v;
            }
        }
        Tensor {
            channels: c_count,
            height: self.height,
            width: self.width,
            data,
        }
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Channel layout.
    #[must_use]
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// `(height, width, channels)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels.count())
    }

    /// Row-major samples.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable row-major samples.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the raster, returning its samples.
    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Provenance tag (file path or synthetic label), for diagnostics only.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Replace the provenance tag.
    pub fn set_origin(&mut self, origin: impl Into<String>) {
        self.origin = origin.into();
    }

    fn index(&self, y: usize, x: usize, c: usize) -> usize {
        (y * self.width + x) * self.channels.count() + c
    }

    /// Sample at `(row, column, channel)`.
    #[must_use]
    pub fn get(&self, y: usize, x: usize, c: usize) -> f32 {
        self.data[self.index(y, x, c)]
    }

    /// Overwrite the sample at `(row, column, channel)`.
    pub fn set(&mut self, y: usize, x: usize, c: usize, value: f32) {
        let i = self.index(y, x, c);
        self.data[i] = value;
    }

    /// Mean over every sample, accumulated in `f64`.
    #[must_use]
    pub fn mean(&self) -> f32 {
        let sum: f64 = self.data.iter().map(|&v| f64::from(v)).sum();
        (sum / self.data.len() as f64) as f32
    }

    /// Apply a transform to every sample in place.
    pub fn map(&mut self, transform: &Transform) {
        transform.apply_slice(&mut self.data);
    }

    /// Apply a sequence to every sample in place.
    pub fn map_sequence(&mut self, sequence: &Sequence) {
        sequence.apply_slice(&mut self.data);
    }

    /// Divide every sample by the raster mean. A zero mean leaves the data unchanged.
    pub fn divide_mean(&mut self) {
        let mean = self.mean();
        self.map(&Transform::Divide(mean));
    }

    /// Reverse the row order.
    pub fn flip_vertical(&mut self) {
        let row_len = self.width * self.channels.count();
        let (mut top, mut bottom) = (0, self.height - 1);
        while top < bottom {
            let (head, tail) = self.data.split_at_mut(bottom * row_len);
            head[top * row_len..(top + 1) * row_len].swap_with_slice(&mut tail[..row_len]);
            top += 1;
            bottom -= 1;
        }
    }

    /// Weight each row by the hemispherical mapping jacobian
    /// `sin(pi/4 + pi/2 * y / height)`.
    pub fn jacobian_transform(&mut self) {
        let row_len = self.width * self.channels.count();
        let height = self.height as f64;
        for (y, row) in self.data.chunks_exact_mut(row_len).enumerate() {
            let polar = std::f64::consts::FRAC_PI_2 * (y as f64 / height) + std::f64::consts::FRAC_PI_4;
            let factor = polar.sin() as f32;
            for v in row {
                *v *= factor;
            }
        }
    }
}

/// A channel-first `(channels, height, width)` float grid.
///
/// This is the layout consumed and produced by the inference capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl Tensor {
    /// Create a tensor from channel-first samples.
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> Result<Self> {
        if channels == 0 || height == 0 || width == 0 {
            return Err(Error::InvalidShape(format!(
                "tensor dimensions must be positive, got {channels}x{height}x{width}"
            )));
        }
        let expected = sample_count(&[channels, height, width]).ok_or_else(|| {
            Error::InvalidShape(format!("{channels}x{height}x{width} tensor size overflows"))
        })?;
        if data.len() != expected {
            return Err(Error::InvalidShape(format!(
                "{channels}x{height}x{width} tensor needs {expected} samples, buffer has {}",
                data.len()
            )));
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    /// Stack the channels of several same-sized rasters, in order.
    ///
    /// Used to build the 7-channel network input from intensity (3),
    /// normals (3) and distance (1).
    pub fn concat(rasters: &[&Raster]) -> Result<Self> {
        let first = rasters
            .first()
            .ok_or_else(|| Error::InvalidShape("cannot concatenate zero rasters".to_string()))?;
        let (height, width) = (first.height(), first.width());
        let mut channels = 0;
        let mut data = Vec::new();
        for raster in rasters {
            if raster.height() != height || raster.width() != width {
                return Err(Error::DimensionMismatch {
                    expected: (height, width, raster.channels().count()),
                    actual: raster.shape(),
                });
            }
            let part = raster.to_channel_first();
            channels += part.channels;
            data.extend_from_slice(&part.data);
        }
        Self::new(channels, height, width, data)
    }

    /// `(channels, height, width)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    /// Channel-first samples.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Sample at `(channel, row, column)`.
    #[must_use]
    pub fn get(&self, c: usize, y: usize, x: usize) -> f32 {
        self.data[(c * self.height + y) * self.width + x]
    }

    /// Channel-first plane for a single channel.
    #[must_use]
    pub fn plane(&self, c: usize) -> &[f32] {
        let plane = self.height * self.width;
        &self.data[c * plane..(c + 1) * plane]
    }
}

/// Product of the dimensions, or `None` on overflow.
pub(crate) fn sample_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize, channels: Channels) -> Raster {
        let n = width * height * channels.count();
        let data = (0..n).map(|i| i as f32).collect();
        Raster::new(width, height, channels, data, "ramp").unwrap()
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(matches!(
            Raster::new(0, 4, Channels::Color, vec![], "x"),
            Err(Error::InvalidShape(_))
        ));
        assert!(matches!(
            Raster::new(2, 2, Channels::Color, vec![0.0; 11], "x"),
            Err(Error::InvalidShape(_))
        ));
        assert!(matches!(
            Raster::from_flat(vec![0.0; 8], 2, 2, 2),
            Err(Error::InvalidShape(_))
        ));
    }

    #[test]
    fn test_rejects_overflowing_dimensions() {
        let huge = 1usize << (usize::BITS / 2);
        assert!(matches!(
            Raster::new(huge, huge, Channels::Color, vec![0.0; 3], "x"),
            Err(Error::InvalidShape(_))
        ));
        assert!(matches!(
            Raster::zeros(usize::MAX, 2, Channels::Scalar, "x"),
            Err(Error::InvalidShape(_))
        ));
        assert!(matches!(
            Tensor::new(3, huge, huge, vec![0.0; 3]),
            Err(Error::InvalidShape(_))
        ));
        assert_eq!(sample_count(&[2, 3, 4]), Some(24));
        assert_eq!(sample_count(&[usize::MAX, 2]), None);
    }

    #[test]
    fn test_from_flat_is_row_major() {
        let raster = Raster::from_flat((0..12).map(|v| v as f32).collect(), 2, 2, 3).unwrap();
        assert_eq!(raster.shape(), (2, 2, 3));
        assert_eq!(raster.get(0, 1, 0), 3.0);
        assert_eq!(raster.get(1, 0, 2), 8.0);
    }

    #[test]
    fn test_channel_first_transpose() {
        let raster = ramp(3, 2, Channels::Color);
        let tensor = raster.to_channel_first();
        assert_eq!(tensor.shape(), (3, 2, 3));
        for y in 0..2 {
            for x in 0..3 {
                for c in 0..3 {
                    assert_eq!(tensor.get(c, y, x), raster.get(y, x, c));
                }
            }
        }
        let back = Raster::from_channel_first(&tensor).unwrap();
        assert_eq!(back.data(), raster.data());
    }

    #[test]
    fn test_from_channel_first_rejects_seven_channels() {
        let tensor = Tensor::new(7, 2, 2, vec![0.0; 28]).unwrap();
        assert!(Raster::from_channel_first(&tensor).is_err());
    }

    #[test]
    fn test_concat_builds_seven_channels() {
        let intensity = ramp(2, 2, Channels::Color);
        let normals = ramp(2, 2, Channels::Color);
        let distance = ramp(2, 2, Channels::Scalar);
        let tensor = Tensor::concat(&[&intensity, &normals, &distance]).unwrap();
        assert_eq!(tensor.shape(), (7, 2, 2));
        assert_eq!(tensor.get(6, 1, 1), distance.get(1, 1, 0));
        assert_eq!(tensor.get(4, 0, 1), normals.get(0, 1, 1));
    }

    #[test]
    fn test_concat_rejects_mismatched_sizes() {
        let a = ramp(2, 2, Channels::Color);
        let b = ramp(3, 2, Channels::Scalar);
        assert!(matches!(
            Tensor::concat(&[&a, &b]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_flip_vertical() {
        let mut raster = ramp(2, 3, Channels::Scalar);
        raster.flip_vertical();
        assert_eq!(raster.data(), &[4.0, 5.0, 2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn test_divide_mean() {
        let mut raster = Raster::new(2, 1, Channels::Scalar, vec![1.0, 3.0], "x").unwrap();
        raster.divide_mean();
        assert_eq!(raster.data(), &[0.5, 1.5]);

        let mut zero = Raster::zeros(2, 2, Channels::Color, "zero").unwrap();
        zero.divide_mean();
        assert!(zero.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_jacobian_first_row_weight() {
        let mut raster = Raster::new(1, 2, Channels::Scalar, vec![1.0, 1.0], "x").unwrap();
        raster.jacobian_transform();
        let expected = std::f64::consts::FRAC_PI_4.sin() as f32;
        assert!((raster.get(0, 0, 0) - expected).abs() < 1e-6);
        assert!((raster.get(1, 0, 0) - 1.0).abs() < 1e-6);
    }
}

//! Named forward (downstream) and inverse (upstream) sequences.
//!
//! Downstream sequences move physical values toward the normalized space
//! the network is trained on; upstream sequences move predictions back.
//! The mean each downstream sequence is parameterized with must be kept
//! by the caller to invert the result later.

use super::{Sequence, Transform};
use crate::raster::Raster;

/// Constant removed at the end of the full downstream sequences.
pub const DOWNSTREAM_OFFSET: f32 = 0.1;

/// Scale applied to the mean before dividing.
pub const MEAN_SCALE: f32 = 10.0;

/// `Divide(10 * mean) -> Log -> Subtract(0.1)`.
#[must_use]
pub fn intensity_downstream_full(mean: f32) -> Sequence {
    Sequence::new(vec![
        Transform::Divide(MEAN_SCALE * mean),
        Transform::Log,
        Transform::Subtract(DOWNSTREAM_OFFSET),
    ])
}

/// `Divide(10 * mean) -> Log`.
///
/// Unlike [`intensity_downstream_full`] no offset is subtracted, so
/// [`intensity_upstream`] does not invert this sequence exactly.
#[must_use]
pub fn intensity_downstream_half(mean: f32) -> Sequence {
    Sequence::new(vec![Transform::Divide(MEAN_SCALE * mean), Transform::Log])
}

/// `Add(0.1) -> LogInverse -> Multiply(10 * mean)`, the inverse of
/// [`intensity_downstream_full`].
#[must_use]
pub fn intensity_upstream(mean: f32) -> Sequence {
    Sequence::new(vec![
        Transform::Add(DOWNSTREAM_OFFSET),
        Transform::LogInverse,
        Transform::Multiply(MEAN_SCALE * mean),
    ])
}

/// `Add(1) -> Divide(10 * (mean + 1)) -> Log -> Subtract(0.1)`.
#[must_use]
pub fn distance_downstream(mean: f32) -> Sequence {
    Sequence::new(vec![
        Transform::Add(1.0),
        Transform::Divide(MEAN_SCALE * (mean + 1.0)),
        Transform::Log,
        Transform::Subtract(DOWNSTREAM_OFFSET),
    ])
}

/// Inverse of [`distance_downstream`].
#[must_use]
pub fn distance_upstream(mean: f32) -> Sequence {
    Sequence::new(vec![
        Transform::Add(DOWNSTREAM_OFFSET),
        Transform::LogInverse,
        Transform::Multiply(MEAN_SCALE * (mean + 1.0)),
        Transform::Subtract(1.0),
    ])
}

/// `Log -> NormalizePositive(0, max) -> Gamma(gamma)`.
#[must_use]
pub fn intensity(max: f32, gamma: f32) -> Sequence {
    Sequence::new(vec![
        Transform::Log,
        Transform::NormalizePositive { min: 0.0, max },
        Transform::Gamma(gamma),
    ])
}

/// `Gamma(1 / gamma) -> NormalizeInverse(max) -> LogInverse`.
///
/// Inverts [`intensity`] for inputs with `ln(x + 1) <= max`; larger
/// inputs were clipped and come back as `exp(max) - 1`.
#[must_use]
pub fn intensity_inverse(max: f32, gamma: f32) -> Sequence {
    Sequence::new(vec![
        Transform::Gamma(1.0 / gamma),
        Transform::NormalizeInverse { max },
        Transform::LogInverse,
    ])
}

/// `Sqrt -> NormalizePositive(0, max) -> Gamma(gamma)`.
#[must_use]
pub fn distance(max: f32, gamma: f32) -> Sequence {
    Sequence::new(vec![
        Transform::Sqrt,
        Transform::NormalizePositive { min: 0.0, max },
        Transform::Gamma(gamma),
    ])
}

/// `Normalize(-1, 1)`: clips unit normals into range.
#[must_use]
pub fn normals() -> Sequence {
    Sequence::new(vec![Transform::Normalize { min: -1.0, max: 1.0 }])
}

impl Raster {
    /// Apply [`intensity_downstream_full`] with this raster's mean.
    ///
    /// Returns the mean, which is needed for [`Raster::intensity_upstream`].
    pub fn intensity_downstream_full(&mut self) -> f32 {
        let mean = self.mean();
        self.map_sequence(&intensity_downstream_full(mean));
        mean
    }

    /// Apply [`intensity_downstream_half`] with this raster's mean.
    pub fn intensity_downstream_half(&mut self) -> f32 {
        let mean = self.mean();
        self.map_sequence(&intensity_downstream_half(mean));
        mean
    }

    /// Apply [`intensity_upstream`] with a mean kept from the downstream step.
    pub fn intensity_upstream(&mut self, mean: f32) {
        self.map_sequence(&intensity_upstream(mean));
    }

    /// Apply [`distance_downstream`] with this raster's mean.
    pub fn distance_downstream(&mut self) -> f32 {
        let mean = self.mean();
        self.map_sequence(&distance_downstream(mean));
        mean
    }

    /// Clip normals into `[-1, 1]`.
    pub fn normalize_normals(&mut self) {
        self.map_sequence(&normals());
    }
}

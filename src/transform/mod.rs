//! Scalar transforms and their composition.
//!
//! Every transform is a pure `f32 -> f32` function. [`Transform::apply`]
//! evaluates one sample; [`Transform::apply_slice`] evaluates a whole
//! buffer. Both share the same per-sample kernels, so batch results are
//! bit-identical to scalar results.
//!
//! Named forward/inverse pairs used by the training and serving paths
//! live in [`sequences`].

pub mod sequences;

use serde::{Deserialize, Serialize};

pub use sequences::{
    distance, distance_downstream, distance_upstream, intensity, intensity_downstream_full,
    intensity_downstream_half, intensity_inverse, intensity_upstream, normals,
};

/// A parameterized scalar transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    /// Map `[min, max]` onto `[-1, 1]` about the midpoint, clipped.
    Normalize { min: f32, max: f32 },
    /// Map `[min, max]` onto `[0, 1]`, clipped.
    NormalizePositive { min: f32, max: f32 },
    /// `x * max`.
    NormalizeInverse { max: f32 },
    /// `ln(max(x, 0) + 1)`.
    Log,
    /// `exp(max(y, 0)) - 1`.
    LogInverse,
    /// `sqrt(max(x, 0))`.
    Sqrt,
    /// `max(x, 0) ^ (1 / gamma)`.
    Gamma(f32),
    /// `x / amount`; dividing by zero returns `x` unchanged.
    Divide(f32),
    /// `x * amount`.
    Multiply(f32),
    /// `x + amount`.
    Add(f32),
    /// `x - amount`.
    Subtract(f32),
    /// Ordered composition.
    Sequence(Sequence),
}

impl Transform {
    /// Evaluate the transform on one sample.
    #[must_use]
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Self::Normalize { min, max } => normalize(x, *min, *max),
            Self::NormalizePositive { min, max } => normalize_positive(x, *min, *max),
            Self::NormalizeInverse { max } => x * max,
            Self::Log => log(x),
            Self::LogInverse => log_inverse(x),
            Self::Sqrt => sqrt(x),
            Self::Gamma(g) => gamma(x, 1.0 / g),
            Self::Divide(amount) => divide(x, *amount),
            Self::Multiply(amount) => x * amount,
            Self::Add(amount) => x + amount,
            Self::Subtract(amount) => x - amount,
            Self::Sequence(seq) => seq.apply(x),
        }
    }

    /// Evaluate the transform on every sample of `data`, in place.
    pub fn apply_slice(&self, data: &mut [f32]) {
        match self {
            Self::Normalize { min, max } => each(data, |x| normalize(x, *min, *max)),
            Self::NormalizePositive { min, max } => {
                each(data, |x| normalize_positive(x, *min, *max));
            }
            Self::NormalizeInverse { max } => each(data, |x| x * max),
            Self::Log => each(data, log),
            Self::LogInverse => each(data, log_inverse),
            Self::Sqrt => each(data, sqrt),
            Self::Gamma(g) => {
                let exponent = 1.0 / g;
                each(data, |x| gamma(x, exponent));
            }
            Self::Divide(amount) => {
                if *amount != 0.0 {
                    each(data, |x| x / amount);
                }
            }
            Self::Multiply(amount) => each(data, |x| x * amount),
            Self::Add(amount) => each(data, |x| x + amount),
            Self::Subtract(amount) => each(data, |x| x - amount),
            Self::Sequence(seq) => seq.apply_slice(data),
        }
    }

    /// The companion inverse, when one exists.
    ///
    /// Clipping and flooring transforms have no inverse over their whole
    /// domain and return `None`.
    #[must_use]
    pub fn inverse(&self) -> Option<Transform> {
        match self {
            Self::Log => Some(Self::LogInverse),
            Self::LogInverse => Some(Self::Log),
            Self::Gamma(g) => Some(Self::Gamma(1.0 / g)),
            Self::Divide(amount) if *amount == 0.0 => Some(Self::Divide(0.0)),
            Self::Divide(amount) => Some(Self::Multiply(*amount)),
            Self::Multiply(amount) if *amount != 0.0 => Some(Self::Divide(*amount)),
            Self::Add(amount) => Some(Self::Subtract(*amount)),
            Self::Subtract(amount) => Some(Self::Add(*amount)),
            Self::Sequence(seq) => seq.inverse().map(Self::Sequence),
            _ => None,
        }
    }
}

/// An ordered list of transforms applied left to right.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    stages: Vec<Transform>,
}

impl Sequence {
    /// Create a sequence from stages.
    #[must_use]
    pub fn new(stages: Vec<Transform>) -> Self {
        Self { stages }
    }

    /// Append a stage.
    #[must_use]
    pub fn then(mut self, stage: Transform) -> Self {
        self.stages.push(stage);
        self
    }

    /// The stages, in application order.
    #[must_use]
    pub fn stages(&self) -> &[Transform] {
        &self.stages
    }

    /// Evaluate the sequence on one sample.
    #[must_use]
    pub fn apply(&self, x: f32) -> f32 {
        self.stages.iter().fold(x, |acc, t| t.apply(acc))
    }

    /// Evaluate the sequence on every sample of `data`, stage by stage.
    pub fn apply_slice(&self, data: &mut [f32]) {
        for stage in &self.stages {
            stage.apply_slice(data);
        }
    }

    /// Reversed stage inverses, if every stage has one.
    #[must_use]
    pub fn inverse(&self) -> Option<Sequence> {
        self.stages
            .iter()
            .rev()
            .map(Transform::inverse)
            .collect::<Option<Vec<_>>>()
            .map(Sequence::new)
    }
}

impl From<Sequence> for Transform {
    fn from(seq: Sequence) -> Self {
        Self::Sequence(seq)
    }
}

#[inline]
fn each(data: &mut [f32], f: impl Fn(f32) -> f32) {
    for v in data {
        *v = f(*v);
    }
}

#[inline]
fn normalize(x: f32, min: f32, max: f32) -> f32 {
    let mid = (max + min) / 2.0;
    let r = max - mid;
    if r <= 0.0 {
        return 0.0;
    }
    let y = (x - mid) / r;
    if y < -1.0 {
        -1.0
    } else if y > 1.0 {
        1.0
    } else {
        y
    }
}

#[inline]
fn normalize_positive(x: f32, min: f32, max: f32) -> f32 {
    let d = max - min;
    if d <= 0.0 {
        return 0.0;
    }
    let y = (x - min) / d;
    if y < 0.0 {
        0.0
    } else if y > 1.0 {
        1.0
    } else {
        y
    }
}

#[inline]
fn log(x: f32) -> f32 {
    x.max(0.0).ln_1p()
}

#[inline]
fn log_inverse(y: f32) -> f32 {
    y.max(0.0).exp_m1()
}

#[inline]
fn sqrt(x: f32) -> f32 {
    x.max(0.0).sqrt()
}

#[inline]
fn gamma(x: f32, exponent: f32) -> f32 {
    x.max(0.0).powf(exponent)
}

#[inline]
fn divide(x: f32, amount: f32) -> f32 {
    if amount == 0.0 { x } else { x / amount }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATHOLOGICAL: [f32; 9] = [0.0, -0.0, -1.0, -1e30, 1e-30, 0.5, 1.0, 1e6, 3.0e38];

    fn primitives() -> Vec<Transform> {
        vec![
            Transform::Normalize { min: -1.0, max: 1.0 },
            Transform::Normalize { min: 2.0, max: 2.0 },
            Transform::NormalizePositive { min: 0.0, max: 4.0 },
            Transform::NormalizePositive { min: 3.0, max: 1.0 },
            Transform::NormalizeInverse { max: 2.5 },
            Transform::Log,
            Transform::LogInverse,
            Transform::Sqrt,
            Transform::Gamma(2.2),
            Transform::Divide(0.0),
            Transform::Divide(3.0),
            Transform::Multiply(-2.0),
            Transform::Add(1.0),
            Transform::Subtract(0.1),
        ]
    }

    #[test]
    fn test_batch_matches_scalar_bitwise() {
        for t in primitives() {
            let mut batch = PATHOLOGICAL.to_vec();
            t.apply_slice(&mut batch);
            for (x, y) in PATHOLOGICAL.iter().zip(&batch) {
                assert_eq!(t.apply(*x).to_bits(), y.to_bits(), "{t:?} at {x}");
            }
        }
    }

    #[test]
    fn test_normalize_clips() {
        let t = Transform::Normalize { min: 0.0, max: 10.0 };
        assert_eq!(t.apply(5.0), 0.0);
        assert_eq!(t.apply(10.0), 1.0);
        assert_eq!(t.apply(0.0), -1.0);
        assert_eq!(t.apply(100.0), 1.0);
        assert_eq!(t.apply(-100.0), -1.0);
    }

    #[test]
    fn test_normalize_positive_degenerate_range_is_zero() {
        let t = Transform::NormalizePositive { min: 1.0, max: 1.0 };
        for x in PATHOLOGICAL {
            assert_eq!(t.apply(x), 0.0);
        }
        let t = Transform::NormalizePositive { min: 0.0, max: 2.0 };
        assert_eq!(t.apply(1.0), 0.5);
        assert_eq!(t.apply(-1.0), 0.0);
        assert_eq!(t.apply(3.0), 1.0);
    }

    #[test]
    fn test_log_floors_negative_input() {
        assert_eq!(Transform::Log.apply(-5.0), 0.0);
        assert!((Transform::Log.apply(std::f32::consts::E - 1.0) - 1.0).abs() < 1e-6);
        assert_eq!(Transform::LogInverse.apply(-5.0), 0.0);
    }

    #[test]
    fn test_sqrt_and_gamma_floor_negative_input() {
        assert_eq!(Transform::Sqrt.apply(-4.0), 0.0);
        assert_eq!(Transform::Sqrt.apply(4.0), 2.0);
        assert_eq!(Transform::Gamma(2.0).apply(-4.0), 0.0);
        assert_eq!(Transform::Gamma(2.0).apply(9.0), 3.0);
    }

    #[test]
    fn test_divide_by_zero_is_noop() {
        assert_eq!(Transform::Divide(0.0).apply(7.5), 7.5);
        let mut data = [1.0, -2.0];
        Transform::Divide(0.0).apply_slice(&mut data);
        assert_eq!(data, [1.0, -2.0]);
    }

    #[test]
    fn test_sequence_applies_left_to_right() {
        let seq = Sequence::new(vec![Transform::Add(1.0), Transform::Multiply(2.0)]);
        assert_eq!(seq.apply(3.0), 8.0);
        let nested = Transform::from(seq.clone().then(Transform::Subtract(1.0)));
        assert_eq!(nested.apply(3.0), 7.0);
    }

    #[test]
    fn test_sequence_inverse() {
        let seq = Sequence::new(vec![
            Transform::Divide(4.0),
            Transform::Log,
            Transform::Subtract(0.1),
        ]);
        let inv = seq.inverse().unwrap();
        for x in [0.0f32, 0.3, 1.0, 12.0, 500.0] {
            let y = inv.apply(seq.apply(x));
            assert!((y - x).abs() <= 1e-4 * x.max(1.0), "{x} -> {y}");
        }
    }

    #[test]
    fn test_clipping_transforms_have_no_inverse() {
        assert!(Transform::Sqrt.inverse().is_none());
        assert!(Transform::Normalize { min: 0.0, max: 1.0 }.inverse().is_none());
        let seq = Sequence::new(vec![Transform::Add(1.0), Transform::Sqrt]);
        assert!(seq.inverse().is_none());
    }
}

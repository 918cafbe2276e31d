//! Descriptive statistics for per-tile evaluation scores.
//!
//! [`Summary`] holds count, mean, median, population spread and the 5th/95th
//! percentiles (linear interpolation, R-7).
//!
//! Non-finite values sort as equal to their neighbours; callers that care
//! should filter them first.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Descriptive statistics for a set of measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of values.
    pub count: usize,
    /// Mean value.
    pub mean: f64,
    /// Median value.
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// 5th percentile.
    pub p5: f64,
    /// 95th percentile.
    pub p95: f64,
}

impl Summary {
    /// Compute summary statistics for a slice of values.
    ///
    /// Returns `None` if the slice is empty.
    #[must_use]
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let sorted = sorted(values);
        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

        Some(Self {
            count,
            mean,
            median: percentile_sorted(&sorted, 0.5),
            std_dev: variance.sqrt(),
            min: sorted[0],
            max: sorted[count - 1],
            p5: percentile_sorted(&sorted, 0.05),
            p95: percentile_sorted(&sorted, 0.95),
        })
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let idx = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;
    sorted[lower] * (1.0 - frac) + sorted[upper] * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_compute() {
        let summary = Summary::compute(&[5.0, 1.0, 4.0, 2.0, 3.0]).unwrap();
        assert_eq!(summary.count, 5);
        assert!((summary.mean - 3.0).abs() < 0.001);
        assert!((summary.median - 3.0).abs() < 0.001);
        assert!((summary.min - 1.0).abs() < 0.001);
        assert!((summary.max - 5.0).abs() < 0.001);
        assert!((summary.std_dev - 2.0f64.sqrt()).abs() < 1e-9);
        assert!((summary.p95 - 4.8).abs() < 1e-9);
    }

    #[test]
    fn test_summary_empty() {
        assert!(Summary::compute(&[]).is_none());
    }

    #[test]
    fn test_summary_single() {
        let summary = Summary::compute(&[0.25]).unwrap();
        assert_eq!(summary.p5, 0.25);
        assert_eq!(summary.std_dev, 0.0);
    }

    #[test]
    fn test_summary_even_count_interpolates() {
        let summary = Summary::compute(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert!((summary.median - 2.5).abs() < 1e-9);
        assert!((summary.p5 - 1.15).abs() < 1e-9);
        assert!((summary.p95 - 3.85).abs() < 1e-9);
    }
}

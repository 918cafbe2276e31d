//! Report types for dataset evaluations.
//!
//! Reports serialize to JSON (full detail) and CSV (one row per tile and
//! method).

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::Comparison;
use crate::stats::Summary;

/// Which reconstruction a score belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// The low-quality render as is.
    LowQuality,
    /// The low-quality render after Gaussian smoothing.
    Blur,
    /// The inference prediction.
    Predicted,
}

impl Method {
    /// All methods, in report order.
    pub const ALL: [Method; 3] = [Self::LowQuality, Self::Blur, Self::Predicted];

    /// Short label used in CSV output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LowQuality => "low",
            Self::Blur => "blur",
            Self::Predicted => "predicted",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores for one tile, each against the ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileReport {
    /// Set directory name.
    pub set_name: String,
    /// Tile x coordinate.
    pub x: u32,
    /// Tile y coordinate.
    pub y: u32,
    /// Low-quality input.
    pub low: Comparison,
    /// Blurred low-quality input.
    pub blur: Comparison,
    /// Inference prediction, when an inference capability was supplied.
    pub predicted: Option<Comparison>,
}

impl TileReport {
    /// Score for one method.
    #[must_use]
    pub fn score(&self, method: Method) -> Option<&Comparison> {
        match method {
            Method::LowQuality => Some(&self.low),
            Method::Blur => Some(&self.blur),
            Method::Predicted => self.predicted.as_ref(),
        }
    }
}

/// A tile that could not be evaluated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedTile {
    /// Set directory name.
    pub set_name: String,
    /// Tile x coordinate.
    pub x: u32,
    /// Tile y coordinate.
    pub y: u32,
    /// Error message.
    pub reason: String,
}

/// Aggregated scores of one method over all tiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSummary {
    /// Method.
    pub method: Method,
    /// L1 loss statistics.
    pub l1: Summary,
    /// SSIM statistics.
    pub ssim: Summary,
    /// Cross-correlation statistics.
    pub cross_correlation: Summary,
}

impl MethodSummary {
    fn compute(method: Method, tiles: &[TileReport]) -> Option<Self> {
        let scores: Vec<&Comparison> = tiles.iter().filter_map(|t| t.score(method)).collect();
        let column = |f: fn(&Comparison) -> f64| -> Vec<f64> { scores.iter().map(|c| f(c)).collect() };
        Some(Self {
            method,
            l1: Summary::compute(&column(|c| c.l1))?,
            ssim: Summary::compute(&column(|c| c.ssim))?,
            cross_correlation: Summary::compute(&column(|c| c.cross_correlation))?,
        })
    }
}

/// Report for a dataset evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    /// Report name, used for output file names.
    pub name: String,

    /// Blur standard deviation used for the baseline.
    pub blur_sigma: f32,

    /// Per-tile scores, in evaluation order.
    pub tiles: Vec<TileReport>,

    /// Tiles that failed to load.
    #[serde(default)]
    pub skipped: Vec<SkippedTile>,

    /// Per-method aggregates, filled by [`EvalReport::summarize`].
    #[serde(default)]
    pub summaries: Vec<MethodSummary>,

    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl EvalReport {
    /// Create an empty report.
    #[must_use]
    pub fn new(name: impl Into<String>, blur_sigma: f32) -> Self {
        Self {
            name: name.into(),
            blur_sigma,
            tiles: Vec::new(),
            skipped: Vec::new(),
            summaries: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Recompute [`EvalReport::summaries`] from the tiles. Methods without
    /// any score are left out.
    pub fn summarize(&mut self) {
        self.summaries = Method::ALL
            .into_iter()
            .filter_map(|m| MethodSummary::compute(m, &self.tiles))
            .collect();
    }

    /// Summary for one method, if present.
    #[must_use]
    pub fn summary(&self, method: Method) -> Option<&MethodSummary> {
        self.summaries.iter().find(|s| s.method == method)
    }

    /// Write `{name}.json` and `{name}.csv` into `dir`, creating it if needed.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.write_json(dir.join(format!("{}.json", self.name)))?;
        self.write_csv(dir.join(format!("{}.csv", self.name)))
    }

    /// Write the full report as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Write one CSV row per tile and method.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path.as_ref())?;
        wtr.write_record(["set", "x", "y", "method", "l1", "ssim", "cross_correlation"])?;

        for tile in &self.tiles {
            for method in Method::ALL {
                let Some(score) = tile.score(method) else {
                    continue;
                };
                wtr.write_record([
                    &tile.set_name,
                    &tile.x.to_string(),
                    &tile.y.to_string(),
                    &method.to_string(),
                    &format!("{:.6}", score.l1),
                    &format!("{:.6}", score.ssim),
                    &format!("{:.6}", score.cross_correlation),
                ])?;
            }
        }

        wtr.flush()?;
        Ok(())
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: u32, l1: f64, predicted: Option<f64>) -> TileReport {
        let score = |l1| Comparison {
            l1,
            ssim: 0.5,
            cross_correlation: 0.9,
        };
        TileReport {
            set_name: "set".to_string(),
            x,
            y: 0,
            low: score(l1),
            blur: score(l1 / 2.0),
            predicted: predicted.map(score),
        }
    }

    #[test]
    fn test_summarize_skips_missing_method() {
        let mut report = EvalReport::new("run", 1.0);
        report.tiles.push(tile(0, 1.0, None));
        report.tiles.push(tile(1, 3.0, None));
        report.summarize();

        assert_eq!(report.summaries.len(), 2);
        assert!(report.summary(Method::Predicted).is_none());
        let low = report.summary(Method::LowQuality).unwrap();
        assert_eq!(low.l1.count, 2);
        assert!((low.l1.mean - 2.0).abs() < 1e-12);
        assert!((report.summary(Method::Blur).unwrap().l1.mean - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = EvalReport::new("run", 1.0);
        report.tiles.push(tile(0, 1.0, Some(0.25)));
        report.tiles.push(tile(8, 2.0, None));
        report.summarize();
        report.write(dir.path()).unwrap();

        let csv = std::fs::read_to_string(dir.path().join("run.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "set,x,y,method,l1,ssim,cross_correlation");
        assert_eq!(lines.len(), 1 + 3 + 2);
        assert_eq!(lines[3], "set,0,0,predicted,0.250000,0.500000,0.900000");

        let json = std::fs::read_to_string(dir.path().join("run.json")).unwrap();
        let loaded: EvalReport = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.tiles.len(), 2);
        assert_eq!(loaded.summaries.len(), 3);
        assert_eq!(loaded.timestamp.timestamp(), report.timestamp.timestamp());
    }
}

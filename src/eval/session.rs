//! Dataset evaluation against ground truth.
//!
//! For every entry, the low-quality render, a blurred copy of it and (when
//! an inference capability is attached) the network prediction are compared
//! with the ground truth. Each raster is divided by its own mean first so
//! scores are comparable across tiles of different brightness.

use crate::dataset::{DatasetEntry, TileExample, TileRasters};
use crate::error::Result;
use crate::eval::report::{EvalReport, SkippedTile, TileReport};
use crate::metrics::{compare, gaussian_blur};
use crate::serve::{DEFAULT_BLUR_SIGMA, Inference, infer_radiance};

/// Configuration for an evaluation session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalConfig {
    /// Standard deviation of the blur baseline.
    pub blur_sigma: f32,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            blur_sigma: DEFAULT_BLUR_SIGMA,
        }
    }
}

impl EvalConfig {
    /// Set the blur standard deviation.
    #[must_use]
    pub fn blur_sigma(mut self, sigma: f32) -> Self {
        self.blur_sigma = sigma;
        self
    }
}

/// Evaluation session.
///
/// # Example
///
/// ```rust,ignore
/// use iispt::eval::{EvalConfig, EvalSession};
///
/// let index = iispt::dataset::DatasetIndex::scan_seeded("./testset", 0.0, 0)?;
/// let mut model = |input: &iispt::raster::Tensor| run_network(input);
/// let mut session = EvalSession::new(EvalConfig::default()).with_inference(&mut model);
/// let report = session.evaluate("testset", index.entries())?;
/// report.write("./reports")?;
/// ```
pub struct EvalSession<'a> {
    config: EvalConfig,
    inference: Option<&'a mut dyn Inference>,
}

impl<'a> EvalSession<'a> {
    /// Create a session without an inference capability.
    #[must_use]
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            inference: None,
        }
    }

    /// Attach an inference capability; predictions are then scored too.
    #[must_use]
    pub fn with_inference(mut self, inference: &'a mut dyn Inference) -> Self {
        self.inference = Some(inference);
        self
    }

    /// Score a single entry.
    pub fn evaluate_entry(&mut self, entry: &DatasetEntry) -> Result<TileReport> {
        let TileRasters {
            mut ground_truth,
            mut low_quality,
            ..
        } = TileRasters::load(entry)?;

        let predicted = match self.inference.as_deref_mut() {
            Some(inference) => {
                let example = TileExample::load(entry)?;
                let mut prediction = infer_radiance(inference, &example.input, example.mean)?;
                prediction.divide_mean();
                Some(prediction)
            }
            None => None,
        };

        ground_truth.divide_mean();
        low_quality.divide_mean();
        let blurred = gaussian_blur(&low_quality, self.config.blur_sigma);

        Ok(TileReport {
            set_name: entry.set_name.clone(),
            x: entry.x,
            y: entry.y,
            low: compare(&low_quality, &ground_truth),
            blur: compare(&blurred, &ground_truth),
            predicted: predicted.map(|p| compare(&p, &ground_truth)),
        })
    }

    /// Score every entry and summarize.
    ///
    /// Entries that fail to load are recorded in [`EvalReport::skipped`] and
    /// do not stop the run.
    pub fn evaluate<'e>(
        &mut self,
        name: &str,
        entries: impl IntoIterator<Item = &'e DatasetEntry>,
    ) -> Result<EvalReport> {
        let mut report = EvalReport::new(name, self.config.blur_sigma);
        for entry in entries {
            match self.evaluate_entry(entry) {
                Ok(tile) => {
                    tracing::debug!(set = %entry.set_name, x = entry.x, y = entry.y, l1 = tile.low.l1, "tile scored");
                    report.tiles.push(tile);
                }
                Err(e) => {
                    tracing::warn!("skipping tile {} {} {}: {e}", entry.set_name, entry.x, entry.y);
                    report.skipped.push(SkippedTile {
                        set_name: entry.set_name.clone(),
                        x: entry.x,
                        y: entry.y,
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.summarize();
        tracing::info!(
            scored = report.tiles.len(),
            skipped = report.skipped.len(),
            "evaluation complete"
        );
        Ok(report)
    }
}

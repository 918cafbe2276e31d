//! Pairwise raster comparison.

use std::path::Path;

use anyhow::{Context, Result};
use iispt::metrics::compare;
use iispt::pfm;

pub fn run(test: &Path, reference: &Path, divide_mean: bool, json: bool) -> Result<()> {
    let mut a = pfm::load(test).with_context(|| format!("Failed to load {}", test.display()))?;
    let mut b =
        pfm::load(reference).with_context(|| format!("Failed to load {}", reference.display()))?;

    if a.shape() != b.shape() {
        tracing::warn!(
            test = ?a.shape(),
            reference = ?b.shape(),
            "shapes differ; comparing the common extent"
        );
    }
    if divide_mean {
        a.divide_mean();
        b.divide_mean();
    }

    let result = compare(&a, &b);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("L1:                {:.6}", result.l1);
        println!("SSIM:              {:.6}", result.ssim);
        println!("Cross-correlation: {:.6}", result.cross_correlation);
    }
    Ok(())
}

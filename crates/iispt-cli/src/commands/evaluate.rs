//! Dataset evaluation command.

use std::path::Path;

use anyhow::{Context, Result};
use iispt::dataset::DatasetIndex;
use iispt::eval::{EvalConfig, EvalSession, Method};
use iispt::serve::Passthrough;

pub fn run(
    input: &Path,
    report_dir: &Path,
    name: &str,
    blur_sigma: f32,
    passthrough: bool,
    validation_only: bool,
) -> Result<()> {
    let index = if input.is_dir() {
        DatasetIndex::scan_seeded(input, 0.0, 0)
            .with_context(|| format!("Failed to index {}", input.display()))?
    } else {
        DatasetIndex::load(input)
            .with_context(|| format!("Failed to load manifest {}", input.display()))?
    };

    let config = EvalConfig::default().blur_sigma(blur_sigma);
    let mut backend = Passthrough;
    let mut session = EvalSession::new(config);
    if passthrough {
        session = session.with_inference(&mut backend);
    }

    let report = if validation_only {
        session.evaluate(name, &index.validation)?
    } else {
        session.evaluate(name, index.entries())?
    };
    report
        .write(report_dir)
        .with_context(|| format!("Failed to write report to {}", report_dir.display()))?;

    println!("Scored {} tiles ({} skipped)", report.tiles.len(), report.skipped.len());
    println!("{:<10} {:>12} {:>12}", "method", "L1 mean", "SSIM mean");
    for method in Method::ALL {
        if let Some(summary) = report.summary(method) {
            println!(
                "{:<10} {:>12.6} {:>12.6}",
                method.as_str(),
                summary.l1.mean,
                summary.ssim.mean
            );
        }
    }
    println!("Report written to: {}", report_dir.display());
    Ok(())
}

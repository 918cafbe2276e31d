//! Dataset indexing command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use iispt::dataset::{DatasetIndex, ScanOptions};

pub fn run(
    roots: &[PathBuf],
    validation_probability: f64,
    seed: u64,
    metadata_file: String,
    extension: String,
    output: Option<&Path>,
) -> Result<()> {
    let options = ScanOptions::default()
        .metadata_file(metadata_file)
        .extension(extension);
    let index = DatasetIndex::scan_roots_seeded(roots, validation_probability, seed, &options)
        .context("Failed to index dataset")?;

    eprintln!("Indexed {} tiles", index.len());
    eprintln!("  Train: {}", index.train.len());
    eprintln!("  Validation: {}", index.validation.len());
    if !index.warnings.is_empty() {
        eprintln!("  Incomplete: {}", index.warnings.len());
    }

    if let Some(output_path) = output {
        index
            .save(output_path)
            .with_context(|| format!("Failed to save manifest to {}", output_path.display()))?;
        eprintln!("Saved manifest to: {}", output_path.display());
    } else {
        let json = serde_json::to_string_pretty(&index)?;
        println!("{json}");
    }

    Ok(())
}

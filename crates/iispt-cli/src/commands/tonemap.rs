//! PFM to PNG conversion.

use std::path::Path;

use anyhow::{Context, Result};
use iispt::metrics::{compute_autoexposure, save_png, tonemap_to_ldr};
use iispt::pfm;

pub fn run(input: &Path, output: &Path, exposure: Option<f32>, gamma: f32, flip: bool) -> Result<()> {
    let raster = pfm::load(input).with_context(|| format!("Failed to load {}", input.display()))?;

    let exposure = match exposure {
        Some(e) => e,
        None => {
            let e = compute_autoexposure(&raster);
            tracing::info!(exposure = e, "autoexposure");
            e
        }
    };

    let image = tonemap_to_ldr(&raster, exposure, gamma, flip);
    save_png(output, &image).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} -> {} ({}x{}, exposure {exposure}, gamma {gamma})",
        input.display(),
        output.display(),
        image.width(),
        image.height()
    );
    Ok(())
}

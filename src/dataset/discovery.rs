//! Set directory discovery.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::dataset::{
    DatasetEntry, DatasetIndex, IncompleteTile, ScanOptions, SetMetadata, TileKind, tile_file_name,
};
use crate::error::{Error, Result};

/// Parse `{p|d|n|z}_{x}_{y}.{extension}`.
///
/// Returns `None` for anything else, including names with extra dots or
/// non-digit coordinates.
#[must_use]
pub fn parse_tile_name(name: &str, extension: &str) -> Option<(TileKind, u32, u32)> {
    let stem = name.strip_suffix(extension)?.strip_suffix('.')?;
    if stem.contains('.') {
        return None;
    }
    let mut parts = stem.split('_');
    let kind = TileKind::from_prefix(parts.next()?)?;
    let x = parse_coordinate(parts.next()?)?;
    let y = parse_coordinate(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((kind, x, y))
}

fn parse_coordinate(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

pub(super) fn scan_root<R: Rng + ?Sized>(
    root: &Path,
    validation_probability: f64,
    rng: &mut R,
    options: &ScanOptions,
    seen: &mut HashSet<(String, u32, u32)>,
    index: &mut DatasetIndex,
) -> Result<()> {
    if !root.is_dir() {
        return Err(Error::Dataset(format!(
            "dataset root is not a directory: {}",
            root.display()
        )));
    }
    let root = fs::canonicalize(root)?;

    for set_dir in sorted_children(&root)? {
        if !set_dir.is_dir() {
            continue;
        }
        let set_name = set_dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        tracing::info!(set = %set_dir.display(), "loading set directory");
        let metadata = match read_metadata(&set_dir, &options.metadata_file) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("skipping set {set_name}: {e}");
                continue;
            }
        };

        let files = match sorted_children(&set_dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("skipping set {set_name}: {e}");
                continue;
            }
        };

        let added = scan_set(
            &set_name,
            &set_dir,
            &files,
            &metadata,
            validation_probability,
            rng,
            options,
            seen,
            index,
        );
        tracing::info!(set = %set_name, added, "set indexed");
    }

    Ok(())
}

fn read_metadata(set_dir: &Path, file_name: &str) -> Result<SetMetadata> {
    let path = set_dir.join(file_name);
    let content = fs::read_to_string(&path).map_err(|e| Error::Configuration {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| Error::Configuration {
        path,
        reason: e.to_string(),
    })
}

#[allow(clippy::too_many_arguments)]
fn scan_set<R: Rng + ?Sized>(
    set_name: &str,
    set_dir: &Path,
    files: &[PathBuf],
    metadata: &SetMetadata,
    validation_probability: f64,
    rng: &mut R,
    options: &ScanOptions,
    seen: &mut HashSet<(String, u32, u32)>,
    index: &mut DatasetIndex,
) -> usize {
    let mut added = 0;

    for path in files {
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((_, x, y)) = parse_tile_name(name, &options.extension) else {
            continue;
        };

        if !seen.insert((set_name.to_string(), x, y)) {
            continue;
        }

        let missing = missing_siblings(set_dir, x, y, &options.extension);
        if !missing.is_empty() {
            let listed: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            tracing::warn!(
                "training example {set_name} {x} {y} incomplete: [{}] not found",
                listed.join("], [")
            );
            index.warnings.push(IncompleteTile {
                set_name: set_name.to_string(),
                x,
                y,
                missing,
            });
        }

        let validation = metadata.validation_only || rng.r#gen::<f64>() < validation_probability;

        index.push(DatasetEntry {
            set_name: set_name.to_string(),
            directory: set_dir.to_path_buf(),
            x,
            y,
            normalization_intensity: metadata.normalization_intensity,
            normalization_distance: metadata.normalization_distance,
            validation,
            extension: options.extension.clone(),
        });
        added += 1;
    }

    added
}

fn missing_siblings(set_dir: &Path, x: u32, y: u32, extension: &str) -> Vec<PathBuf> {
    TileKind::ALL
        .into_iter()
        .map(|kind| set_dir.join(tile_file_name(kind, x, y, extension)))
        .filter(|p| !p.is_file())
        .collect()
}

fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::Dataset(format!("Failed to read directory {}: {}", dir.display(), e))
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            Error::Dataset(format!("Failed to read entry in {}: {}", dir.display(), e))
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

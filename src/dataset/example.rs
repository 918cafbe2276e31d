//! Lazy loading of indexed tiles.
//!
//! Nothing is cached: every call re-reads the files from disk.

use std::path::PathBuf;

use crate::dataset::{DatasetEntry, TileKind};
use crate::error::Result;
use crate::pfm;
use crate::raster::{Raster, Tensor};

/// The four file paths of a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePaths {
    /// `p` file.
    pub ground_truth: PathBuf,
    /// `d` file.
    pub low_quality: PathBuf,
    /// `n` file.
    pub normals: PathBuf,
    /// `z` file.
    pub depth: PathBuf,
}

impl TilePaths {
    /// Paths for an entry.
    #[must_use]
    pub fn for_entry(entry: &DatasetEntry) -> Self {
        Self {
            ground_truth: entry.path(TileKind::GroundTruth),
            low_quality: entry.path(TileKind::LowQuality),
            normals: entry.path(TileKind::Normals),
            depth: entry.path(TileKind::Depth),
        }
    }
}

/// The four rasters of a tile, untransformed.
#[derive(Debug, Clone)]
pub struct TileRasters {
    /// Ground truth radiance.
    pub ground_truth: Raster,
    /// Low-quality radiance.
    pub low_quality: Raster,
    /// Surface normals.
    pub normals: Raster,
    /// Depth.
    pub depth: Raster,
}

impl TileRasters {
    /// Read the four files of an entry.
    pub fn load(entry: &DatasetEntry) -> Result<Self> {
        let paths = TilePaths::for_entry(entry);
        Ok(Self {
            ground_truth: pfm::load(&paths.ground_truth)?,
            low_quality: pfm::load(&paths.low_quality)?,
            normals: pfm::load(&paths.normals)?,
            depth: pfm::load(&paths.depth)?,
        })
    }
}

/// A normalized training example.
#[derive(Debug, Clone)]
pub struct TileExample {
    /// Channel-first ground truth after the half intensity sequence (3 channels).
    pub target: Tensor,
    /// Channel-first network input: intensity, normals, distance (7 channels).
    pub input: Tensor,
    /// Mean of the low-quality raster, needed to invert predictions.
    pub mean: f32,
    /// Source files.
    pub paths: TilePaths,
}

impl TileExample {
    /// Load and normalize an entry.
    ///
    /// - ground truth: intensity downstream (half)
    /// - low quality: intensity downstream (full), mean kept
    /// - normals: clipped to `[-1, 1]`
    /// - depth: distance downstream
    pub fn load(entry: &DatasetEntry) -> Result<Self> {
        let TileRasters {
            mut ground_truth,
            mut low_quality,
            mut normals,
            mut depth,
        } = TileRasters::load(entry)?;

        ground_truth.intensity_downstream_half();
        let mean = low_quality.intensity_downstream_full();
        normals.normalize_normals();
        depth.distance_downstream();

        Ok(Self {
            target: ground_truth.to_channel_first(),
            input: Tensor::concat(&[&low_quality, &normals, &depth])?,
            mean,
            paths: TilePaths::for_entry(entry),
        })
    }
}

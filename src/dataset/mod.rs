//! Dataset indexing for paired tile files.
//!
//! A dataset root holds one directory per rendered set:
//!
//! ```text
//! root/
//! ├── bathroom-0/
//! │   ├── train.json      {"normalization_intensity": 2.0,
//! │   │                    "normalization_distance": 5.0,
//! │   │                    "validation_only": false}
//! │   ├── p_0_0.pfm       ground truth
//! │   ├── d_0_0.pfm       low-quality input
//! │   ├── n_0_0.pfm       normals
//! │   └── z_0_0.pfm       depth
//! └── kitchen-1/
//!     └── ...
//! ```
//!
//! [`DatasetIndex::scan`] walks the root once, eagerly, and partitions every
//! `(set, x, y)` tile into a training or validation collection. Rasters are
//! not loaded here; see [`TileExample::load`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use iispt::dataset::DatasetIndex;
//!
//! let index = DatasetIndex::scan_seeded("./dataset", 0.1, 0)?;
//! for entry in &index.train {
//!     let example = iispt::dataset::TileExample::load(entry)?;
//! }
//! ```

mod discovery;
mod example;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub use discovery::parse_tile_name;
pub use example::{TileExample, TilePaths, TileRasters};

use crate::error::Result;

/// Default metadata sidecar name inside each set directory.
pub const METADATA_FILE: &str = "train.json";

/// Default tile file extension.
pub const TILE_EXTENSION: &str = "pfm";

/// Role of one file in a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// `p`: path-traced ground truth.
    GroundTruth,
    /// `d`: low-quality input.
    LowQuality,
    /// `n`: normals.
    Normals,
    /// `z`: depth.
    Depth,
}

impl TileKind {
    /// All kinds, in file-prefix order `p, d, n, z`.
    pub const ALL: [TileKind; 4] = [
        Self::GroundTruth,
        Self::LowQuality,
        Self::Normals,
        Self::Depth,
    ];

    /// File name prefix.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::GroundTruth => "p",
            Self::LowQuality => "d",
            Self::Normals => "n",
            Self::Depth => "z",
        }
    }

    /// Parse a file name prefix.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }
}

/// Per-set metadata read from the sidecar file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetMetadata {
    /// Intensity normalization constant.
    pub normalization_intensity: f32,
    /// Distance normalization constant.
    pub normalization_distance: f32,
    /// Route every tile of the set to validation.
    #[serde(default)]
    pub validation_only: bool,
}

/// One indexed tile.
///
/// Unique by `(set_name, x, y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Set directory name.
    pub set_name: String,
    /// Absolute set directory path.
    pub directory: PathBuf,
    /// Tile x coordinate.
    pub x: u32,
    /// Tile y coordinate.
    pub y: u32,
    /// Intensity normalization constant of the set.
    pub normalization_intensity: f32,
    /// Distance normalization constant of the set.
    pub normalization_distance: f32,
    /// Whether the tile belongs to the validation collection.
    pub validation: bool,
    /// Extension of the tile files.
    pub extension: String,
}

impl DatasetEntry {
    /// `(set_name, x, y)`.
    #[must_use]
    pub fn key(&self) -> (String, u32, u32) {
        (self.set_name.clone(), self.x, self.y)
    }

    /// File name for one kind, e.g. `p_12_40.pfm`.
    #[must_use]
    pub fn file_name(&self, kind: TileKind) -> String {
        tile_file_name(kind, self.x, self.y, &self.extension)
    }

    /// Full path for one kind.
    #[must_use]
    pub fn path(&self, kind: TileKind) -> PathBuf {
        self.directory.join(self.file_name(kind))
    }
}

pub(crate) fn tile_file_name(kind: TileKind, x: u32, y: u32, extension: &str) -> String {
    format!("{}_{x}_{y}.{extension}", kind.prefix())
}

/// A tile registered even though some sibling files are missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncompleteTile {
    /// Set directory name.
    pub set_name: String,
    /// Tile x coordinate.
    pub x: u32,
    /// Tile y coordinate.
    pub y: u32,
    /// Expected files that do not exist.
    pub missing: Vec<PathBuf>,
}

/// Options controlling how set directories are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Metadata sidecar file name.
    pub metadata_file: String,
    /// Tile file extension, without the dot.
    pub extension: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            metadata_file: METADATA_FILE.to_string(),
            extension: TILE_EXTENSION.to_string(),
        }
    }
}

impl ScanOptions {
    /// Set the metadata sidecar name.
    #[must_use]
    pub fn metadata_file(mut self, name: impl Into<String>) -> Self {
        self.metadata_file = name.into();
        self
    }

    /// Set the tile file extension.
    #[must_use]
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = ext.into();
        self
    }
}

/// Training and validation collections discovered under a dataset root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetIndex {
    /// Training entries, in discovery order.
    pub train: Vec<DatasetEntry>,
    /// Validation entries, in discovery order.
    pub validation: Vec<DatasetEntry>,
    /// Tiles registered with missing siblings.
    #[serde(default)]
    pub warnings: Vec<IncompleteTile>,
}

impl DatasetIndex {
    /// Scan `root` with an explicit random generator for the validation split.
    ///
    /// Set directories and their files are visited in name order, and one
    /// Bernoulli draw is taken per tile from `rng` (except for
    /// `validation_only` sets), so the split is reproducible for a given
    /// generator state and directory contents.
    pub fn scan<R: Rng + ?Sized>(
        root: impl AsRef<Path>,
        validation_probability: f64,
        rng: &mut R,
    ) -> Result<Self> {
        Self::scan_with(root, validation_probability, rng, &ScanOptions::default())
    }

    /// [`DatasetIndex::scan`] with a `StdRng` seeded from `seed`.
    pub fn scan_seeded(
        root: impl AsRef<Path>,
        validation_probability: f64,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::scan(root, validation_probability, &mut rng)
    }

    /// Index several roots in order, sharing one `StdRng` seeded from `seed`.
    pub fn scan_roots_seeded<P: AsRef<Path>>(
        roots: &[P],
        validation_probability: f64,
        seed: u64,
        options: &ScanOptions,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut index = Self::default();
        for root in roots {
            let added = index.add_root(root, validation_probability, &mut rng, options)?;
            tracing::info!(root = %root.as_ref().display(), added, "root indexed");
        }
        Ok(index)
    }

    /// [`DatasetIndex::scan`] with custom [`ScanOptions`].
    pub fn scan_with<R: Rng + ?Sized>(
        root: impl AsRef<Path>,
        validation_probability: f64,
        rng: &mut R,
        options: &ScanOptions,
    ) -> Result<Self> {
        let mut index = Self::default();
        index.add_root(root, validation_probability, rng, options)?;
        tracing::info!(
            train = index.train.len(),
            validation = index.validation.len(),
            "dataset indexed"
        );
        Ok(index)
    }

    /// Index another root into this one. Tiles whose `(set, x, y)` key is
    /// already present are ignored. Returns the number of tiles added.
    pub fn add_root<R: Rng + ?Sized>(
        &mut self,
        root: impl AsRef<Path>,
        validation_probability: f64,
        rng: &mut R,
        options: &ScanOptions,
    ) -> Result<usize> {
        let mut seen: HashSet<(String, u32, u32)> = self.entries().map(DatasetEntry::key).collect();
        let before = self.len();
        discovery::scan_root(
            root.as_ref(),
            validation_probability.clamp(0.0, 1.0),
            rng,
            options,
            &mut seen,
            self,
        )?;
        Ok(self.len() - before)
    }

    pub(crate) fn push(&mut self, entry: DatasetEntry) {
        if entry.validation {
            self.validation.push(entry);
        } else {
            self.train.push(entry);
        }
    }

    /// Every entry, training first.
    pub fn entries(&self) -> impl Iterator<Item = &DatasetEntry> {
        self.train.iter().chain(self.validation.iter())
    }

    /// Total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len()
    }

    /// Check if no tile was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load an index from a JSON manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the index to a JSON manifest file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

//! # iispt
//!
//! Radiance tile tooling for learned indirect illumination: a PFM codec,
//! invertible numeric transforms, dataset indexing, quality metrics and a
//! streaming inference server that talks to a renderer over byte streams.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use iispt::dataset::{DatasetIndex, TileExample};
//!
//! let index = DatasetIndex::scan_seeded("./dataset", 0.1, 42)?;
//! for entry in &index.train {
//!     let example = TileExample::load(entry)?;
//!     assert_eq!(example.input.shape().0, 7);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`raster`]: In-memory float rasters and channel-first tensors
//! - [`pfm`]: Portable float map reading and writing
//! - [`transform`]: Scalar transforms and the named normalization sequences
//! - [`dataset`]: Dataset discovery, validation split and tile loading
//! - [`metrics`]: L1, SSIM, cross-correlation, blur, autoexposure, LDR export
//! - [`serve`]: Fixed-frame request/response inference server
//! - [`eval`]: Dataset evaluation and report generation
//! - [`stats`]: Descriptive statistics

pub mod dataset;
pub mod error;
pub mod eval;
pub mod metrics;
pub mod pfm;
pub mod raster;
pub mod serve;
pub mod stats;
pub mod transform;

// Re-export commonly used types
pub use dataset::{DatasetEntry, DatasetIndex, ScanOptions, TileExample};
pub use error::{Error, ProtocolError, Result};
pub use eval::{EvalConfig, EvalReport, EvalSession};
pub use metrics::Comparison;
pub use raster::{Channels, Raster, Tensor};
pub use serve::{Inference, InferenceServer, ServeConfig, ServeMode};
pub use stats::Summary;
pub use transform::{Sequence, Transform};

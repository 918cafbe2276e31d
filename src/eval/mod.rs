//! Dataset evaluation and report generation.
//!
//! - [`session::EvalSession`]: scores tiles with an optional inference capability
//! - [`session::EvalConfig`]: configuration for evaluation
//! - [`report`]: report types, JSON and CSV output

pub mod report;
pub mod session;

pub use report::{EvalReport, Method, MethodSummary, SkippedTile, TileReport};
pub use session::{EvalConfig, EvalSession};

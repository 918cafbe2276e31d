//! Error types for iispt operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for iispt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading tiles, indexing datasets or serving.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A PFM file is malformed: bad identifier, bad dimensions, missing
    /// header line or truncated payload.
    #[error("PFM format error: {path}: {reason}")]
    Format {
        /// Path (or provenance label) of the offending file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Dimensions or buffer length do not describe a valid raster or tensor.
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Two rasters that must share a shape do not.
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Expected shape (height, width, channels).
        expected: (usize, usize, usize),
        /// Actual shape (height, width, channels).
        actual: (usize, usize, usize),
    },

    /// A set directory has missing or invalid metadata.
    #[error("Configuration error: {path}: {reason}")]
    Configuration {
        /// Path to the metadata file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Error in dataset discovery.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// The inbound stream of the inference server broke the framing.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The inference capability failed or returned an unexpected shape.
    #[error("Inference error: {0}")]
    Inference(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// PNG encoding error.
    #[error("PNG error: {0}")]
    Png(#[from] png::EncodingError),
}

/// Framing failures on the streaming inference protocol.
///
/// Every variant is fatal for the serving process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The stream ended in the middle of a request frame.
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead {
        /// Fixed request frame size.
        expected: usize,
        /// Bytes received before the stream ended.
        received: usize,
    },

    /// The stream was closed before the first byte of a request frame.
    #[error("inbound stream closed")]
    StreamClosed,
}

impl Error {
    /// Build a [`Error::Format`] for the given path.
    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_names_path() {
        let err = Error::format("/data/set/p_0_0.pfm", "truncated payload");
        let msg = err.to_string();
        assert!(msg.contains("/data/set/p_0_0.pfm"));
        assert!(msg.contains("truncated payload"));
    }

    #[test]
    fn test_protocol_error_display() {
        let err: Error = ProtocolError::ShortRead {
            expected: 28672,
            received: 28671,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Protocol error: short read: expected 28672 bytes, received 28671"
        );
    }
}

//! Error types for detpost.

use thiserror::Error;

/// Result alias for detpost operations.
pub type DetPostResult<T> = std::result::Result<T, DetPostError>;

/// Errors that can occur while running the detection pipeline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetPostError {
    /// Image or buffer dimensions are zero or overflow.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The backing buffer is smaller than the declared shape.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    /// A tensor does not have the shape the pipeline expects.
    #[error("shape mismatch for {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    /// The network did not produce a required output.
    #[error("missing network output: {0}")]
    MissingOutput(&'static str),
    /// An index is outside the valid range.
    #[error("{context} index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
        context: &'static str,
    },
    /// The network forward pass failed.
    #[error("network forward failed: {reason}")]
    Network { reason: String },
    /// The dataset collaborator failed.
    #[error("dataset error: {reason}")]
    Dataset { reason: String },
    /// Image decoding failed.
    #[error("image io error: {reason}")]
    ImageIo { reason: String },
    /// Reading or writing the persisted results failed.
    #[error("persist error: {reason}")]
    Persist { reason: String },
}

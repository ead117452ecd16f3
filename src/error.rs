use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the page-processing core
#[derive(Debug, Error)]
pub enum ScanError {
    /// Caller supplied something the operation cannot work with
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Image file could not be opened or decoded
    #[error("failed to decode image {path:?}: {source}")]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Image could not be encoded or written
    #[error("failed to write image {path:?}: {source}")]
    EncodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Quadrilateral is degenerate or the transform has no usable size
    #[error("geometry failure: {0}")]
    GeometryFailure(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

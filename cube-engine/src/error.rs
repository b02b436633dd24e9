//! FILENAME: cube-engine/src/error.rs

use thiserror::Error;

use crate::definition::{SpecifiedDimensions, MAX_DIMENSIONS};

/// Boxed failure raised by a collaborator (source or aggregate function).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum CubeError {
    #[error("Unsupported dimension count: {requested} (expected 1 to {max})", max = MAX_DIMENSIONS)]
    InvalidArity { requested: usize },

    #[error("Dimension {index} out of range for a {dimensions}-dimensional cube")]
    InvalidDimension { index: usize, dimensions: usize },

    #[error("Aggregate failed for subset {dimensions}: {source}")]
    Aggregate {
        dimensions: SpecifiedDimensions,
        #[source]
        source: BoxError,
    },

    #[error("Source error: {0}")]
    Source(#[source] BoxError),

    #[error("Cube has no fully rolled-up row")]
    MissingGrandTotalRow,
}

//! Error types for referencing operations.

use thiserror::Error;

/// Errors raised by reference systems, coordinate operations and zone coders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReferencingError {
    /// No coordinate operation is known between two reference systems.
    #[error("no coordinate operation found from {source_crs} to {target_crs}")]
    NoOperationFound {
        source_crs: String,
        target_crs: String,
    },

    /// The position lies outside the area where a DGGS level is defined.
    #[error("position {position:?} is outside the valid area of {dggs} at level {level}")]
    OutsideValidArea {
        dggs: String,
        level: u8,
        position: Vec<f64>,
    },

    /// The zone identifier could not be parsed by the coder.
    #[error("invalid zone identifier: {0}")]
    InvalidZone(String),

    /// The requested refinement level is not supported.
    #[error("refinement level {level} is outside the supported range {min}..={max}")]
    InvalidLevel { level: u8, min: u8, max: u8 },

    /// Coordinates do not have the dimension an operation expects.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A transform has no inverse.
    #[error("transform is not invertible: {0}")]
    NonInvertible(String),

    /// Envelope bounds are inconsistent.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}

impl ReferencingError {
    /// Create a NoOperationFound error.
    pub fn no_operation(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self::NoOperationFound {
            source_crs: source.into(),
            target_crs: target.into(),
        }
    }

    /// Check that a coordinate slice has the expected dimension.
    pub fn check_dimension(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::DimensionMismatch { expected, actual })
        }
    }
}

/// Result type for referencing operations.
pub type Result<T> = std::result::Result<T, ReferencingError>;

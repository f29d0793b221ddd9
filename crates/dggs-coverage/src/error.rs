//! Error types for DGGS coverages.

use referencing::ReferencingError;
use thiserror::Error;

/// Errors that can occur while building, addressing, evaluating or resampling coverages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoverageError {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------
    /// The reference system has no DGGS component.
    #[error("reference system has no DGGS component")]
    MissingDggsComponent,

    /// A sample array does not hold one value per cell.
    #[error("sample array of band {band} has {actual} values, expected {expected}")]
    SampleCountMismatch {
        band: usize,
        expected: usize,
        actual: usize,
    },

    /// Per-band sample arrays must be one dimensional.
    #[error("sample array of band {band} has {dimensions} dimensions, expected 1")]
    NotOneDimensional { band: usize, dimensions: usize },

    /// Storage and schema disagree on the number of bands.
    #[error("storage has {actual} bands, schema declares {expected}")]
    BandCountMismatch { expected: usize, actual: usize },

    /// The grid geometry is inconsistent or lacks a required part.
    #[error("invalid grid geometry: {0}")]
    InvalidGeometry(String),

    /// The same zone appears twice in a zone list.
    #[error("zone {0} is listed more than once")]
    DuplicateZone(String),

    /// Two sample dimensions share a name.
    #[error("sample dimension name {0} is used more than once")]
    DuplicateSampleName(String),

    // ------------------------------------------------------------------
    // Addressing
    // ------------------------------------------------------------------
    /// A grid coordinate lies outside the extent.
    #[error("grid coordinate {value} is outside [{low}, {high}] in dimension {dimension}")]
    OutsideGridBounds {
        dimension: usize,
        value: i64,
        low: i64,
        high: i64,
    },

    /// The grid position does not address a cell of the coverage.
    #[error("position {0:?} is not part of this coverage")]
    PositionNotInCoverage(Vec<i64>),

    /// A transform cannot be split over the requested dimension range.
    #[error("cannot split dimensions [{offset}, {end}) out of a {dimension} dimensional transform")]
    UnsplittableRange {
        offset: usize,
        end: usize,
        dimension: usize,
    },

    /// The reference system component is not part of the geometry.
    #[error("reference system component {0} not found")]
    ComponentNotFound(String),

    /// An iterator was read before `next()` or `move_to()`.
    #[error("iterator is not positioned on a cell")]
    NoCurrentCell,

    /// The operation is not supported by this object.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    // ------------------------------------------------------------------
    // Storage
    // ------------------------------------------------------------------
    /// The sample slot does not hold numbers.
    #[error("sample {0} is not numeric")]
    NonNumericSample(String),

    /// The sample slot cannot be written.
    #[error("sample {0} is read only")]
    ReadOnlySample(String),

    /// The value cannot be stored in the sample type without loss.
    #[error("value {value} cannot be stored as {sample_type}")]
    SampleNotRepresentable { value: f64, sample_type: String },

    /// Band index beyond the number of bands.
    #[error("band {band} is out of range, coverage has {count} bands")]
    BandOutOfRange { band: usize, count: usize },

    // ------------------------------------------------------------------
    // Evaluation and negotiation
    // ------------------------------------------------------------------
    /// No cell of the coverage contains the position.
    #[error("point {0:?} is outside the coverage")]
    PointOutsideCoverage(Vec<f64>),

    /// The requested region has no data.
    #[error("no data: {0}")]
    NoData(String),

    /// The target coverage would exceed the configured cell budget.
    #[error("result would have {cells} cells, limit is {limit}")]
    TooManyCells { cells: usize, limit: usize },

    #[error(transparent)]
    Referencing(#[from] ReferencingError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CoverageError {
    /// Create an InvalidGeometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a NoData error.
    pub fn no_data(msg: impl Into<String>) -> Self {
        Self::NoData(msg.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors a resampling loop treats as "leave this cell at its fill value".
    pub fn is_evaluation_miss(&self) -> bool {
        match self {
            Self::PointOutsideCoverage(_)
            | Self::NoData(_)
            | Self::OutsideGridBounds { .. }
            | Self::PositionNotInCoverage(_) => true,
            Self::Referencing(e) => matches!(
                e,
                ReferencingError::NoOperationFound { .. }
                    | ReferencingError::OutsideValidArea { .. }
                    | ReferencingError::NonInvertible(_)
            ),
            _ => false,
        }
    }
}

impl From<std::io::Error> for CoverageError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CoverageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for coverage operations.
pub type Result<T> = std::result::Result<T, CoverageError>;

//! Compound coordinate addressing and resampling over discrete global grids.
//!
//! This crate addresses gridded data whose horizontal axis is a list of DGGS
//! zones, crossed with ordinary continuous axes (height, time, ...). It
//! provides:
//!
//! - **Addressing**: grid extents, row-major linearization, and a transform
//!   algebra (affine, zone lookup, undefined, compound) from grid positions
//!   to addresses made of numbers and zone identifiers
//! - **Coverages**: sample storage (typed arrays or records), cursors, and
//!   evaluators that find the sample vector at any position, trying DGGS
//!   refinement levels from coarsest to finest
//! - **Resampling**: a resource presenting a continuous grid coverage as a
//!   DGGS coverage, computed per query
//!
//! # Architecture
//!
//! ```text
//! ResampledResource::read(query)
//!      │
//!      ├─► to_grid_geometry ─► smart_intersect ─► expand
//!      │
//!      ├─► DggsCoverage::filled(result geometry)
//!      │
//!      └─► per cell: zone centroid ─► source evaluator ─► samples
//!                                           │
//!                                           └─► miss: fill value
//! ```
//!
//! # Example
//!
//! ```ignore
//! use dggs_coverage::{GridCoverage, MemoryResource, ResampleConfig, ResampledResource};
//!
//! let source = Arc::new(MemoryResource::new(GridCoverage::from_values("t2m", geometry, values)?));
//! let resource = ResampledResource::new("t2m-dggs", dggs, source, ResampleConfig::from_env())?;
//!
//! let coverage = resource.resample(&query, None)?;
//! let mut evaluator = coverage.evaluator();
//! let samples = evaluator.evaluate(&position)?;
//! ```

pub mod address;
pub mod config;
pub mod coverage;
pub mod error;
pub mod evaluator;
pub mod extent;
pub mod geometry;
pub mod grid_coverage;
pub mod indexer;
pub mod interpolation;
pub mod iter;
pub mod resampling;
pub mod sample;
pub mod source;
pub mod storage;
pub mod transform;
pub mod zone_index;

// Re-export commonly used types at crate root
pub use address::{Address, Ordinate};
pub use config::ResampleConfig;
pub use coverage::DggsCoverage;
pub use error::{CoverageError, Result};
pub use evaluator::Evaluator;
pub use extent::GridExtent;
pub use geometry::GridGeometry;
pub use grid_coverage::{GridCoverage, GridEvaluator, MemoryResource};
pub use indexer::GridIndexer;
pub use interpolation::InterpolationMethod;
pub use iter::{CellIterator, WritableCellIterator};
pub use resampling::{expand, smart_intersect, to_grid_geometry, ResampleStats, ResampledResource};
pub use sample::{FieldDescriptor, RecordType, SampleDimension, SampleSchema, SampleType};
pub use source::{GridCoverageResource, LoadingStrategy, SampleEvaluator, SourceCoverage};
pub use storage::{ArrayStorage, BandArray, CellStore, FieldValue, Record, RecordStorage, SampleBuffer};
pub use transform::{ContinuousTransform, GridTransform, LookupTransform, UndefinedTransform};
pub use zone_index::ZoneIndex;

//! Coverage and resource abstractions.
//!
//! A [`GridCoverageResource`] produces coverages on request; a
//! [`SourceCoverage`] is an immutable snapshot that hands out
//! [`SampleEvaluator`]s. Evaluators carry per-caller caches and are not meant
//! to be shared: create one per worker thread.

use std::ops::Range;
use std::sync::Arc;

use referencing::DirectPosition;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::GridGeometry;
use crate::sample::SampleSchema;

/// Looks up sample vectors at arbitrary positions.
pub trait SampleEvaluator {
    fn null_if_outside(&self) -> bool;

    /// Return `Ok(None)` instead of `PointOutsideCoverage` for positions outside the coverage.
    fn set_null_if_outside(&mut self, flag: bool);

    fn wraparound_enabled(&self) -> bool;

    /// Shift positions on wrapping axes (longitude) into the coverage before giving up.
    fn set_wraparound_enabled(&mut self, flag: bool);

    /// Sample vector at a position given in any CRS the coverage can convert from.
    fn evaluate(&mut self, position: &DirectPosition) -> Result<Option<Vec<f64>>>;
}

/// An immutable coverage that can be evaluated.
pub trait SourceCoverage: Send + Sync {
    fn name(&self) -> &str;

    fn grid_geometry(&self) -> &GridGeometry;

    fn schema(&self) -> &SampleSchema;

    /// A new evaluator with default flags (outside is an error, no wraparound).
    fn evaluator(&self) -> Box<dyn SampleEvaluator + '_>;
}

/// When a resource loads sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadingStrategy {
    /// Load everything the read geometry covers when `read` is called.
    #[default]
    AtReadTime,
    /// Load tiles lazily when an evaluator first touches them.
    AtGetTileTime,
}

/// Something that produces coverages for a requested geometry and band range.
pub trait GridCoverageResource: Send + Sync {
    /// Geometry of the whole resource. May be partially undefined.
    fn grid_geometry(&self) -> &GridGeometry;

    fn schema(&self) -> &SampleSchema;

    /// Read a coverage over `geometry` (whole resource if `None`) with the
    /// given bands (all if `None`).
    fn read(
        &self,
        geometry: Option<&GridGeometry>,
        bands: Option<Range<usize>>,
    ) -> Result<Arc<dyn SourceCoverage>>;

    fn loading_strategy(&self) -> LoadingStrategy {
        LoadingStrategy::AtReadTime
    }

    /// Change the loading strategy. Returns `false` if the resource ignores it.
    ///
    /// The strategy is a hint. A resource whose data is already resident may
    /// record it and report it back without changing what `read` returns.
    fn set_loading_strategy(&self, _strategy: LoadingStrategy) -> bool {
        false
    }
}

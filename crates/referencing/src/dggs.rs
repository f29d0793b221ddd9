//! Discrete global grid systems.
//!
//! A DGGS partitions the globe into zones at several refinement levels. Zones
//! are addressed by opaque identifiers; a [`ZoneCoder`] converts between
//! positions and identifiers at a configurable precision.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::crs::Crs;
use crate::error::Result;

/// Opaque identifier of a zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A decoded zone.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: ZoneId,
    pub level: u8,
    /// Spatial extent in the DGGS base CRS.
    pub bbox: BoundingBox,
}

impl Zone {
    /// Representative point of the zone.
    pub fn centroid(&self) -> (f64, f64) {
        self.bbox.center()
    }
}

/// Converts positions to zone identifiers and back at one precision level.
///
/// Coders carry mutable precision state and are not shared between threads;
/// create one per worker from the owning [`DiscreteGlobalGrid`].
pub trait ZoneCoder: Send {
    /// Current refinement level.
    fn precision(&self) -> u8;

    /// Change the refinement level used by [`ZoneCoder::encode`].
    fn set_precision(&mut self, level: u8) -> Result<()>;

    /// Zone containing a position expressed in the DGGS base CRS.
    ///
    /// Fails with `OutsideValidArea` if the DGGS does not cover the position
    /// at the current precision.
    fn encode(&self, position: &[f64]) -> Result<ZoneId>;

    /// Describe a zone. The zone's own level is used, not the coder precision.
    fn decode(&self, zone: &ZoneId) -> Result<Zone>;
}

/// A discrete global grid reference system.
pub trait DiscreteGlobalGrid: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// The continuous two dimensional CRS the zones are defined in.
    fn base_crs(&self) -> Arc<Crs>;

    /// Supported refinement levels, coarsest first.
    fn refinement_levels(&self) -> RangeInclusive<u8>;

    /// A new coder set to the coarsest level.
    fn create_coder(&self) -> Box<dyn ZoneCoder>;

    /// All zones of `level` intersecting `bbox`, in a deterministic order.
    fn zones_within(&self, bbox: &BoundingBox, level: u8) -> Result<Vec<ZoneId>>;

    /// Number of zones [`zones_within`](Self::zones_within) would return, without listing them.
    fn zone_count(&self, bbox: &BoundingBox, level: u8) -> Result<u64>;

    /// Approximate zone edge length at `level`, in base CRS units.
    fn zone_size(&self, level: u8) -> f64;

    /// Coarsest level whose zones are no larger than `resolution`.
    ///
    /// Falls back to the finest level when even that is coarser.
    fn level_for_resolution(&self, resolution: f64) -> u8 {
        let levels = self.refinement_levels();
        let finest = *levels.end();
        levels
            .into_iter()
            .find(|&level| self.zone_size(level) <= resolution)
            .unwrap_or(finest)
    }
}

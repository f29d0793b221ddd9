//! Common test fixtures: reference systems, grids and zone lists.

use std::sync::Arc;

use referencing::{BoundingBox, Crs, DiscreteGlobalGrid, QuadGrid, ZoneId};

/// Common bounding box definitions for testing, as (min_x, min_y, max_x, max_y).
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Eastern hemisphere
    pub const EAST: (f64, f64, f64, f64) = (0.0, -90.0, 180.0, 90.0);

    /// Europe bounding box
    pub const EUROPE: (f64, f64, f64, f64) = (-15.0, 35.0, 45.0, 72.0);

    /// South Pacific, far from [`EUROPE`]
    pub const SOUTH_PACIFIC: (f64, f64, f64, f64) = (-160.0, -50.0, -120.0, -20.0);

    pub fn to_bbox(b: (f64, f64, f64, f64)) -> referencing::BoundingBox {
        referencing::BoundingBox::new(b.0, b.1, b.2, b.3)
    }
}

/// WGS84 longitude/latitude.
pub fn wgs84() -> Arc<Crs> {
    Arc::new(Crs::wgs84())
}

/// Height in meters.
pub fn height() -> Arc<Crs> {
    Arc::new(Crs::vertical("height", 1.0))
}

/// Hours since the Unix epoch.
pub fn hours() -> Arc<Crs> {
    Arc::new(Crs::unix_hours())
}

/// Whole-world quad grid with levels `0..=max_level`.
pub fn quad_grid(max_level: u8) -> Arc<dyn DiscreteGlobalGrid> {
    Arc::new(QuadGrid::global(max_level))
}

/// Quad grid with levels 1 and 2 where level 1 only encodes the eastern hemisphere.
pub fn east_only_quad_grid() -> Arc<dyn DiscreteGlobalGrid> {
    Arc::new(
        QuadGrid::new("quad-east", wgs84(), BoundingBox::world(), 1..=2)
            .restrict_level(1, bbox::to_bbox(bbox::EAST)),
    )
}

/// The four level 1 zones of a quad grid, in quadrant order.
pub fn level_one_zones() -> Vec<ZoneId> {
    ["Q0", "Q1", "Q2", "Q3"].into_iter().map(ZoneId::from).collect()
}

/// Zone identifiers from string literals.
pub fn zones(ids: &[&str]) -> Vec<ZoneId> {
    ids.iter().map(|id| ZoneId::from(*id)).collect()
}

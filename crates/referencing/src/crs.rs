//! Coordinate Reference System types.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::lambert::LambertConformal;
use crate::mercator::WebMercator;

/// A map projection from geographic longitude/latitude to planar meters.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    WebMercator(WebMercator),
    LambertConformal(LambertConformal),
}

impl Projection {
    /// Project geographic (lon, lat) degrees to (x, y) meters.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::WebMercator(p) => p.forward(lon, lat),
            Projection::LambertConformal(p) => p.forward(lon, lat),
        }
    }

    /// Unproject (x, y) meters to geographic (lon, lat) degrees.
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::WebMercator(p) => p.inverse(x, y),
            Projection::LambertConformal(p) => p.inverse(x, y),
        }
    }
}

/// The family a reference system belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum CrsKind {
    /// Longitude and latitude in degrees.
    Geographic,
    /// Easting and northing in meters.
    Projected(Projection),
    /// Height, expressed in a unit of `unit_meters` meters.
    Vertical { unit_meters: f64 },
    /// Time elapsed since `origin`, in units of `unit_seconds` seconds.
    Temporal {
        origin: DateTime<Utc>,
        unit_seconds: f64,
    },
    /// Arbitrary axes with no known relation to any other system.
    Engineering,
    /// Concatenation of independent components.
    Compound(Vec<Arc<Crs>>),
}

/// One axis of a coordinate reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub unit: String,
    /// Valid range of the axis, if bounded.
    pub range: Option<(f64, f64)>,
    /// Whether values outside the range wrap around (e.g. longitude).
    pub wraparound: bool,
}

impl Axis {
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            range: None,
            wraparound: false,
        }
    }

    /// An axis whose values wrap with the period `max - min`.
    pub fn wrapping(name: impl Into<String>, unit: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            range: Some((min, max)),
            wraparound: true,
        }
    }

    pub fn bounded(name: impl Into<String>, unit: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            range: Some((min, max)),
            wraparound: false,
        }
    }

    /// Wrap period, for wrapping axes only.
    pub fn period(&self) -> Option<f64> {
        match (self.wraparound, self.range) {
            (true, Some((min, max))) => Some(max - min),
            _ => None,
        }
    }
}

/// A coordinate reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct Crs {
    name: String,
    kind: CrsKind,
    axes: Vec<Axis>,
}

impl Crs {
    /// WGS84 geographic, longitude first.
    pub fn wgs84() -> Self {
        Self {
            name: "EPSG:4326".to_string(),
            kind: CrsKind::Geographic,
            axes: vec![
                Axis::wrapping("longitude", "degree", -180.0, 180.0),
                Axis::bounded("latitude", "degree", -90.0, 90.0),
            ],
        }
    }

    /// Spherical Web Mercator.
    pub fn web_mercator() -> Self {
        Self::projected("EPSG:3857", Projection::WebMercator(WebMercator::default()))
    }

    /// A projected CRS built on a geographic base.
    pub fn projected(name: impl Into<String>, projection: Projection) -> Self {
        Self {
            name: name.into(),
            kind: CrsKind::Projected(projection),
            axes: vec![Axis::new("easting", "metre"), Axis::new("northing", "metre")],
        }
    }

    /// A vertical CRS measuring height in units of `unit_meters` meters.
    pub fn vertical(name: impl Into<String>, unit_meters: f64) -> Self {
        Self {
            name: name.into(),
            kind: CrsKind::Vertical { unit_meters },
            axes: vec![Axis::new("height", format!("{} m", unit_meters))],
        }
    }

    /// A temporal CRS counting `unit_seconds` seconds since `origin`.
    pub fn temporal(name: impl Into<String>, origin: DateTime<Utc>, unit_seconds: f64) -> Self {
        Self {
            name: name.into(),
            kind: CrsKind::Temporal {
                origin,
                unit_seconds,
            },
            axes: vec![Axis::new("time", format!("{} s", unit_seconds))],
        }
    }

    /// Hours since the Unix epoch.
    pub fn unix_hours() -> Self {
        Self::temporal("unix-hours", DateTime::<Utc>::UNIX_EPOCH, 3600.0)
    }

    pub fn engineering(name: impl Into<String>, axes: Vec<Axis>) -> Self {
        Self {
            name: name.into(),
            kind: CrsKind::Engineering,
            axes,
        }
    }

    /// Concatenate components into a compound CRS. Nested compounds are flattened.
    pub fn compound(name: impl Into<String>, components: Vec<Arc<Crs>>) -> Self {
        let mut flat = Vec::with_capacity(components.len());
        for c in components {
            match &c.kind {
                CrsKind::Compound(inner) => flat.extend(inner.iter().cloned()),
                _ => flat.push(c),
            }
        }
        let axes = flat.iter().flat_map(|c| c.axes.iter().cloned()).collect();
        Self {
            name: name.into(),
            kind: CrsKind::Compound(flat),
            axes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &CrsKind {
        &self.kind
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    /// Check if this is a geographic or projected two dimensional system.
    pub fn is_horizontal(&self) -> bool {
        matches!(self.kind, CrsKind::Geographic | CrsKind::Projected(_))
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.kind, CrsKind::Compound(_))
    }

    /// Single components of this CRS; a single CRS is its own only component.
    pub fn components(self: &Arc<Self>) -> Vec<Arc<Crs>> {
        match &self.kind {
            CrsKind::Compound(parts) => parts.clone(),
            _ => vec![Arc::clone(self)],
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Compare two shared CRS, checking identity before structure.
pub fn same_crs(a: &Arc<Crs>, b: &Arc<Crs>) -> bool {
    Arc::ptr_eq(a, b) || **a == **b
}

/// A position in some coordinate reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectPosition {
    pub crs: Arc<Crs>,
    pub coordinates: Vec<f64>,
}

impl DirectPosition {
    pub fn new(crs: Arc<Crs>, coordinates: Vec<f64>) -> Self {
        Self { crs, coordinates }
    }

    pub fn dimension(&self) -> usize {
        self.coordinates.len()
    }
}

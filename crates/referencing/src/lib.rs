//! Coordinate reference systems, coordinate operations and discrete global grids.
//!
//! Map projections are implemented from scratch without external dependencies.
//! The [`finder::OperationFinder`] trait is the seam through which grid
//! coverages look up conversions between reference systems, and the
//! [`dggs::DiscreteGlobalGrid`] / [`dggs::ZoneCoder`] traits are the seam for
//! zone encoding.

pub mod bbox;
pub mod crs;
pub mod dggs;
pub mod envelope;
pub mod error;
pub mod finder;
pub mod lambert;
pub mod mercator;
pub mod operation;
pub mod quad;
pub mod reference_system;

pub use bbox::BoundingBox;
pub use crs::{same_crs, Axis, Crs, CrsKind, DirectPosition, Projection};
pub use dggs::{DiscreteGlobalGrid, Zone, ZoneCoder, ZoneId};
pub use envelope::Envelope;
pub use error::{ReferencingError, Result};
pub use finder::{DefaultOperationFinder, OperationFinder};
pub use lambert::LambertConformal;
pub use mercator::WebMercator;
pub use operation::{CoordinateOperation, OperationRef};
pub use quad::QuadGrid;
pub use reference_system::{ReferenceComponent, ReferenceSystem};

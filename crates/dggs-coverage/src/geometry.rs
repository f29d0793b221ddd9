//! Grid geometries over compound reference systems.
//!
//! A [`GridGeometry`] ties a [`ReferenceSystem`] to an integer extent and a
//! grid-to-address transform. Any of the parts may be missing: queries are
//! often described by an envelope and a resolution only, and a DGGS axis stays
//! undefined until the zones it covers are known.

use std::sync::Arc;

use referencing::{
    BoundingBox, DiscreteGlobalGrid, Envelope, ReferenceComponent, ReferenceSystem,
    ReferencingError, ZoneId,
};

use crate::address::{Address, Ordinate};
use crate::error::{CoverageError, Result};
use crate::extent::GridExtent;
use crate::transform::{ContinuousTransform, GridTransform, LookupTransform};

/// Grid extent, grid-to-address transform and reference system.
#[derive(Debug, Clone)]
pub struct GridGeometry {
    reference_system: ReferenceSystem,
    extent: Option<GridExtent>,
    transform: Option<GridTransform>,
    /// Bounds in the coordinate CRS of the reference system.
    envelope: Option<Envelope>,
    /// Cell size per coordinate CRS dimension.
    resolution: Option<Vec<f64>>,
}

impl GridGeometry {
    pub fn new(
        reference_system: ReferenceSystem,
        extent: Option<GridExtent>,
        transform: Option<GridTransform>,
    ) -> Result<Self> {
        let dimension = reference_system.dimension();
        if let Some(e) = &extent {
            ReferencingError::check_dimension(dimension, e.dimension())?;
        }
        if let Some(t) = &transform {
            ReferencingError::check_dimension(dimension, t.dimension())?;
        }
        Ok(Self {
            reference_system,
            extent,
            transform,
            envelope: None,
            resolution: None,
        })
    }

    /// Geometry over a continuous CRS with an affine grid-to-CRS transform.
    pub fn continuous(
        crs: &Arc<referencing::Crs>,
        extent: GridExtent,
        transform: ContinuousTransform,
    ) -> Result<Self> {
        Self::new(
            ReferenceSystem::from_crs(crs),
            Some(extent),
            Some(transform.into()),
        )
    }

    /// One dimensional DGGS geometry listing its zones in grid order.
    pub fn dggs(dggs: Arc<dyn DiscreteGlobalGrid>, zones: Vec<ZoneId>) -> Result<Self> {
        if zones.is_empty() {
            return Err(CoverageError::no_data(format!("no zone of {}", dggs.name())));
        }
        let extent = GridExtent::from_sizes(&[zones.len()])?;
        let transform = GridTransform::lookup(zones.into_iter().map(Ordinate::Zone).collect());
        Self::new(
            ReferenceSystem::single(ReferenceComponent::Dggs(dggs)),
            Some(extent),
            Some(transform),
        )
    }

    /// DGGS geometry whose zones are not known yet.
    pub fn undefined_dggs(dggs: Arc<dyn DiscreteGlobalGrid>) -> Self {
        let name = dggs.name().to_string();
        Self {
            reference_system: ReferenceSystem::single(ReferenceComponent::Dggs(dggs)),
            extent: None,
            transform: Some(GridTransform::undefined(name, 1)),
            envelope: None,
            resolution: None,
        }
    }

    /// Geometry known only by its bounds and cell size, both in the coordinate CRS.
    pub fn from_envelope(
        reference_system: ReferenceSystem,
        envelope: Envelope,
        resolution: Vec<f64>,
    ) -> Result<Self> {
        let dimension = reference_system.coordinate_crs().dimension();
        ReferencingError::check_dimension(dimension, envelope.dimension())?;
        ReferencingError::check_dimension(dimension, resolution.len())?;
        if resolution.iter().any(|r| !(*r > 0.0)) {
            return Err(CoverageError::invalid_geometry("resolution must be > 0"));
        }
        Ok(Self {
            reference_system,
            extent: None,
            transform: None,
            envelope: Some(envelope),
            resolution: Some(resolution),
        })
    }

    pub fn reference_system(&self) -> &ReferenceSystem {
        &self.reference_system
    }

    pub fn dimension(&self) -> usize {
        self.reference_system.dimension()
    }

    pub fn extent(&self) -> Option<&GridExtent> {
        self.extent.as_ref()
    }

    pub fn transform(&self) -> Option<&GridTransform> {
        self.transform.as_ref()
    }

    /// Extent and transform are both known, and the transform converts positions.
    pub fn is_defined(&self) -> bool {
        self.extent.is_some() && self.transform.as_ref().is_some_and(|t| t.is_defined())
    }

    pub fn require_extent(&self) -> Result<&GridExtent> {
        self.extent
            .as_ref()
            .ok_or_else(|| CoverageError::invalid_geometry("grid extent is undefined"))
    }

    pub fn require_transform(&self) -> Result<&GridTransform> {
        self.transform
            .as_ref()
            .ok_or_else(|| CoverageError::invalid_geometry("grid-to-CRS transform is undefined"))
    }

    pub fn cell_count(&self) -> Option<usize> {
        self.extent.as_ref().map(|e| e.cell_count())
    }

    /// Index and instance of the DGGS component, if any.
    pub fn dggs_component(&self) -> Option<(usize, &Arc<dyn DiscreteGlobalGrid>)> {
        self.reference_system
            .components()
            .iter()
            .enumerate()
            .find_map(|(i, c)| c.as_dggs().map(|d| (i, d)))
    }

    /// First coordinate CRS dimension of the component at `index`.
    fn coordinate_offset(&self, index: usize) -> usize {
        self.reference_system.components()[..index]
            .iter()
            .map(|c| c.coordinate_crs().dimension())
            .sum()
    }

    /// Sub-geometry restricted to the axes of the component at `index`.
    pub fn slice(&self, index: usize) -> Result<GridGeometry> {
        let component = self
            .reference_system
            .component(index)
            .ok_or_else(|| CoverageError::ComponentNotFound(format!("#{}", index)))?;
        let offset = self.reference_system.dimension_offset(index);
        let size = component.dimension();
        let coordinate_offset = self.coordinate_offset(index);
        let coordinate_size = component.coordinate_crs().dimension();

        let transform = self
            .transform
            .as_ref()
            .map(|t| t.split(offset, size))
            .transpose()?;

        Ok(GridGeometry {
            reference_system: ReferenceSystem::single(component.clone()),
            extent: self.extent.as_ref().map(|e| e.sub(offset, size)),
            transform,
            envelope: self
                .envelope
                .as_ref()
                .map(|e| e.sub(coordinate_offset, coordinate_size)),
            resolution: self
                .resolution
                .as_ref()
                .map(|r| r[coordinate_offset..coordinate_offset + coordinate_size].to_vec()),
        })
    }

    /// Sub-geometry restricted to the axes of `component`.
    pub fn slice_by(&self, component: &ReferenceComponent) -> Result<GridGeometry> {
        let index = self
            .reference_system
            .index_of(component)
            .ok_or_else(|| CoverageError::ComponentNotFound(component.name().to_string()))?;
        self.slice(index)
    }

    /// Concatenate geometries dimension-wise, in order.
    pub fn concat(parts: &[GridGeometry]) -> Result<GridGeometry> {
        let (first, rest) = parts
            .split_first()
            .ok_or_else(|| CoverageError::invalid_geometry("no geometry to concatenate"))?;

        let reference_system = rest
            .iter()
            .fold(first.reference_system.clone(), |rs, g| rs.concat(&g.reference_system));

        let extent = parts
            .iter()
            .map(|g| g.extent.clone())
            .collect::<Option<Vec<_>>>()
            .and_then(|extents| {
                extents
                    .into_iter()
                    .reduce(|a, b| a.concat(&b))
            });

        let transform = match parts
            .iter()
            .map(|g| g.transform.clone())
            .collect::<Option<Vec<_>>>()
        {
            Some(transforms) => Some(GridTransform::compose_all(transforms)?),
            None => None,
        };

        let envelope = parts
            .iter()
            .map(|g| g.envelope())
            .collect::<Option<Vec<_>>>()
            .and_then(|envelopes| envelopes.into_iter().reduce(|a, b| a.concat(&b)));

        let resolution = parts
            .iter()
            .map(|g| g.resolution())
            .collect::<Option<Vec<_>>>()
            .map(|r| r.concat());

        let mut geometry = GridGeometry::new(reference_system, extent, transform)?;
        geometry.envelope = envelope;
        geometry.resolution = resolution;
        Ok(geometry)
    }

    /// Bounds in the coordinate CRS, from cell edges (cell centres +/- 0.5).
    ///
    /// DGGS components contribute the union of their zone boxes.
    pub fn envelope(&self) -> Option<Envelope> {
        if let Some(e) = &self.envelope {
            return Some(e.clone());
        }
        let extent = self.extent.as_ref()?;
        let transform = self.transform.as_ref()?;
        let rs = &self.reference_system;

        let mut result: Option<Envelope> = None;
        for (i, component) in rs.components().iter().enumerate() {
            let offset = rs.dimension_offset(i);
            let size = component.dimension();
            let part = match (component, transform.split(offset, size).ok()?) {
                (ReferenceComponent::Dggs(dggs), GridTransform::Lookup(lookup)) => {
                    zones_envelope(dggs.as_ref(), &lookup)?
                }
                (ReferenceComponent::Crs(_), GridTransform::Continuous(t)) => {
                    continuous_envelope(&t, &extent.sub(offset, size))?
                }
                _ => return None,
            };
            result = Some(match result {
                Some(acc) => acc.concat(&part),
                None => part,
            });
        }
        result
    }

    /// Cell size per coordinate CRS dimension.
    pub fn resolution(&self) -> Option<Vec<f64>> {
        if let Some(r) = &self.resolution {
            return Some(r.clone());
        }
        let transform = self.transform.as_ref()?;
        let rs = &self.reference_system;
        let mut result = Vec::new();
        for (i, component) in rs.components().iter().enumerate() {
            let offset = rs.dimension_offset(i);
            match (component, transform.split(offset, component.dimension()).ok()?) {
                (ReferenceComponent::Dggs(dggs), GridTransform::Lookup(lookup)) => {
                    let zone = lookup.values().first()?.as_zone()?;
                    let level = dggs.create_coder().decode(zone).ok()?.level;
                    let size = dggs.zone_size(level);
                    result.extend([size, size]);
                }
                (ReferenceComponent::Crs(_), GridTransform::Continuous(t)) => {
                    result.extend((0..t.dimension()).map(|d| t.scale(d).abs()));
                }
                _ => return None,
            }
        }
        Some(result)
    }

    /// Sub-grid of the cells intersecting `envelope`.
    ///
    /// Only for geometries made of continuous parts. An envelope that does not
    /// touch the grid is reported as `NoData`.
    pub fn subgrid(&self, envelope: &Envelope) -> Result<GridGeometry> {
        let extent = self.require_extent()?;
        let transform = self
            .require_transform()?
            .to_continuous()
            .ok_or_else(|| CoverageError::unsupported("subgrid of a non-continuous geometry"))?;
        ReferencingError::check_dimension(transform.dimension(), envelope.dimension())?;

        let n = envelope.dimension();
        let mut min = vec![f64::INFINITY; n];
        let mut max = vec![f64::NEG_INFINITY; n];
        for corner in 0..(1usize << n) {
            let point: Vec<f64> = (0..n)
                .map(|d| {
                    if corner & (1 << d) == 0 {
                        envelope.lower()[d]
                    } else {
                        envelope.upper()[d]
                    }
                })
                .collect();
            let grid = transform.inverse_apply(&point)?;
            for d in 0..n {
                min[d] = min[d].min(grid[d]);
                max[d] = max[d].max(grid[d]);
            }
        }
        if min.iter().chain(max.iter()).any(|v| !v.is_finite()) {
            return Err(CoverageError::no_data("envelope has no finite grid position"));
        }

        let low: Vec<i64> = min.iter().map(|v| (v + 0.5).floor() as i64).collect();
        let high: Vec<i64> = max
            .iter()
            .zip(&low)
            .map(|(v, &l)| ((v - 0.5).ceil() as i64).max(l))
            .collect();
        let requested = GridExtent::new(low, high)?;
        let sub = extent
            .intersect(&requested)
            .ok_or_else(|| CoverageError::no_data("envelope does not intersect the grid"))?;

        GridGeometry::new(
            self.reference_system.clone(),
            Some(sub),
            self.transform.clone(),
        )
    }

    /// Address of a grid position.
    pub fn to_address(&self, grid: &[i64]) -> Result<Address> {
        self.require_transform()?.to_address(grid)
    }
}

/// Bounds of the cells of `extent`, edges included.
fn continuous_envelope(transform: &ContinuousTransform, extent: &GridExtent) -> Option<Envelope> {
    let n = extent.dimension();
    let mut lower = vec![f64::INFINITY; n];
    let mut upper = vec![f64::NEG_INFINITY; n];
    for corner in 0..(1usize << n) {
        let point: Vec<f64> = (0..n)
            .map(|d| {
                if corner & (1 << d) == 0 {
                    extent.low(d) as f64 - 0.5
                } else {
                    extent.high(d) as f64 + 0.5
                }
            })
            .collect();
        let crs = transform.apply(&point).ok()?;
        for d in 0..n {
            lower[d] = lower[d].min(crs[d]);
            upper[d] = upper[d].max(crs[d]);
        }
    }
    Envelope::new(lower, upper).ok()
}

fn zones_envelope(dggs: &dyn DiscreteGlobalGrid, lookup: &LookupTransform) -> Option<Envelope> {
    let coder = dggs.create_coder();
    let mut bbox: Option<BoundingBox> = None;
    for value in lookup.values() {
        let zone = coder.decode(value.as_zone()?).ok()?;
        bbox = Some(match bbox {
            Some(b) => b.union(&zone.bbox),
            None => zone.bbox,
        });
    }
    bbox.map(|b| b.to_envelope())
}

#[cfg(test)]
mod tests {
    use super::*;
    use referencing::{Crs, QuadGrid};

    fn quad() -> Arc<dyn DiscreteGlobalGrid> {
        Arc::new(QuadGrid::global(6))
    }

    fn height_geometry() -> GridGeometry {
        let crs = Arc::new(Crs::vertical("height", 1.0));
        GridGeometry::continuous(
            &crs,
            GridExtent::from_sizes(&[3]).unwrap(),
            ContinuousTransform::scale_translate(&[100.0], &[50.0]).unwrap(),
        )
        .unwrap()
    }

    fn zones_and_height() -> GridGeometry {
        let zones = vec!["Q0".into(), "Q1".into(), "Q2".into(), "Q3".into()];
        let horizontal = GridGeometry::dggs(quad(), zones).unwrap();
        GridGeometry::concat(&[horizontal, height_geometry()]).unwrap()
    }

    #[test]
    fn test_concat_and_slice() {
        let geometry = zones_and_height();
        assert_eq!(geometry.dimension(), 2);
        assert_eq!(geometry.cell_count(), Some(12));
        assert!(geometry.is_defined());
        assert_eq!(geometry.dggs_component().map(|(i, _)| i), Some(0));

        let height = geometry.slice(1).unwrap();
        assert_eq!(height.extent().unwrap().sizes(), vec![3]);
        assert_eq!(height.to_address(&[2]).unwrap(), Address::numeric(&[250.0]));
        assert!(geometry.slice(2).is_err());
    }

    #[test]
    fn test_envelope_includes_cell_edges() {
        let geometry = zones_and_height();
        let envelope = geometry.envelope().unwrap();
        assert_eq!(envelope.dimension(), 3);
        assert_eq!(envelope.lower(), &[-180.0, -90.0, 0.0]);
        assert_eq!(envelope.upper(), &[180.0, 90.0, 300.0]);
    }

    #[test]
    fn test_resolution() {
        let geometry = zones_and_height();
        assert_eq!(geometry.resolution().unwrap(), vec![180.0, 180.0, 100.0]);
    }

    #[test]
    fn test_undefined_dggs() {
        let geometry = GridGeometry::undefined_dggs(quad());
        assert!(!geometry.is_defined());
        assert!(geometry.envelope().is_none());
        assert!(matches!(
            geometry.to_address(&[0]),
            Err(CoverageError::Unsupported(_))
        ));
    }

    #[test]
    fn test_subgrid_rounds_outward() {
        let geometry = height_geometry();
        // cells cover [0, 100), [100, 200), [200, 300)
        let sub = geometry
            .subgrid(&Envelope::new(vec![120.0], vec![210.0]).unwrap())
            .unwrap();
        assert_eq!(sub.extent().unwrap().lows(), &[1]);
        assert_eq!(sub.extent().unwrap().highs(), &[2]);
    }

    #[test]
    fn test_subgrid_disjoint_is_no_data() {
        let geometry = height_geometry();
        let err = geometry
            .subgrid(&Envelope::new(vec![500.0], vec![600.0]).unwrap())
            .unwrap_err();
        assert!(matches!(err, CoverageError::NoData(_)));
    }

    #[test]
    fn test_from_envelope_checks_dimensions() {
        let rs = ReferenceSystem::single(ReferenceComponent::Dggs(quad()));
        let envelope = Envelope::new(vec![0.0, 0.0], vec![10.0, 10.0]).unwrap();
        assert!(GridGeometry::from_envelope(rs.clone(), envelope.clone(), vec![1.0, 1.0]).is_ok());
        assert!(GridGeometry::from_envelope(rs.clone(), envelope.clone(), vec![1.0]).is_err());
        assert!(GridGeometry::from_envelope(rs, envelope, vec![0.0, 1.0]).is_err());
    }
}

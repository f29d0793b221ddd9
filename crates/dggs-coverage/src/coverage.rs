//! DGGS-addressed coverages.

use std::sync::Arc;

use referencing::{
    Crs, DefaultOperationFinder, DiscreteGlobalGrid, OperationFinder, ReferenceComponent,
    ZoneId,
};
use tracing::debug;

use crate::error::{CoverageError, Result};
use crate::evaluator::Evaluator;
use crate::extent::GridExtent;
use crate::geometry::GridGeometry;
use crate::indexer::GridIndexer;
use crate::iter::{CellIterator, WritableCellIterator};
use crate::sample::SampleSchema;
use crate::source::{SampleEvaluator, SourceCoverage};
use crate::storage::{ArrayStorage, BandArray, CellStore};
use crate::transform::GridTransform;
use crate::zone_index::ZoneIndex;

/// Grid part of one continuous component of a DGGS coverage.
#[derive(Debug, Clone)]
pub(crate) struct ComponentGrid {
    pub crs: Arc<Crs>,
    /// First grid dimension of the component.
    pub offset: usize,
    pub transform: GridTransform,
    pub extent: GridExtent,
}

/// A coverage whose reference system has exactly one DGGS component.
///
/// Geometry, zone index and strides are fixed at construction; samples change
/// only through [`DggsCoverage::writable_iterator`].
pub struct DggsCoverage {
    name: String,
    geometry: GridGeometry,
    schema: SampleSchema,
    store: Box<dyn CellStore>,
    indexer: GridIndexer,
    coordinate_crs: Arc<Crs>,
    dggs: Arc<dyn DiscreteGlobalGrid>,
    dggs_dimension: usize,
    zone_index: ZoneIndex,
    components: Vec<ComponentGrid>,
    finder: Arc<dyn OperationFinder>,
}

impl std::fmt::Debug for DggsCoverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DggsCoverage")
            .field("name", &self.name)
            .field("dggs", &self.dggs.name())
            .field("zones", &self.zone_index.len())
            .field("cells", &self.indexer.cell_count())
            .field("bands", &self.schema.len())
            .finish()
    }
}

impl DggsCoverage {
    pub fn new(
        name: impl Into<String>,
        geometry: GridGeometry,
        schema: SampleSchema,
        store: Box<dyn CellStore>,
    ) -> Result<Self> {
        let name = name.into();
        let rs = geometry.reference_system().clone();
        if rs.dggs_count() > 1 {
            return Err(CoverageError::invalid_geometry(
                "more than one DGGS component",
            ));
        }
        let (dggs_index, dggs) = geometry
            .dggs_component()
            .map(|(i, d)| (i, Arc::clone(d)))
            .ok_or(CoverageError::MissingDggsComponent)?;
        if !geometry.is_defined() {
            return Err(CoverageError::invalid_geometry(
                "coverage geometry must have a defined extent and transform",
            ));
        }
        let extent = geometry.require_extent()?.clone();

        let coordinate_crs = rs.coordinate_crs();
        let indexer = GridIndexer::new(&extent);

        let zones = match geometry.slice(dggs_index)?.transform() {
            Some(GridTransform::Lookup(lookup)) => lookup
                .values()
                .iter()
                .map(|o| {
                    o.as_zone().cloned().ok_or_else(|| {
                        CoverageError::invalid_geometry(format!("{} is not a zone identifier", o))
                    })
                })
                .collect::<Result<Vec<ZoneId>>>()?,
            _ => {
                return Err(CoverageError::invalid_geometry(
                    "DGGS axis must list its zones",
                ))
            }
        };
        let zone_index = ZoneIndex::new(zones)?;
        let dggs_dimension = rs.dimension_offset(dggs_index);
        if zone_index.len() != extent.size(dggs_dimension) {
            return Err(CoverageError::invalid_geometry(format!(
                "{} zones listed for a DGGS axis of {} cells",
                zone_index.len(),
                extent.size(dggs_dimension)
            )));
        }

        let mut components = Vec::new();
        for (i, component) in rs.components().iter().enumerate() {
            if let ReferenceComponent::Crs(crs) = component {
                let slice = geometry.slice(i)?;
                components.push(ComponentGrid {
                    crs: Arc::clone(crs),
                    offset: rs.dimension_offset(i),
                    transform: slice.require_transform()?.clone(),
                    extent: slice.require_extent()?.clone(),
                });
            }
        }

        if store.band_count() != schema.len() {
            return Err(CoverageError::BandCountMismatch {
                expected: schema.len(),
                actual: store.band_count(),
            });
        }
        if store.cell_count() != indexer.cell_count() {
            return Err(CoverageError::SampleCountMismatch {
                band: 0,
                expected: indexer.cell_count(),
                actual: store.cell_count(),
            });
        }

        debug!(
            name = %name,
            dggs = dggs.name(),
            zones = zone_index.len(),
            cells = indexer.cell_count(),
            bands = schema.len(),
            "built DGGS coverage"
        );

        Ok(Self {
            name,
            geometry,
            schema,
            store,
            indexer,
            coordinate_crs,
            dggs,
            dggs_dimension,
            zone_index,
            components,
            finder: Arc::new(DefaultOperationFinder::new()),
        })
    }

    /// Coverage backed by array storage with every band at its fill value.
    pub fn filled(
        name: impl Into<String>,
        geometry: GridGeometry,
        schema: SampleSchema,
        float_fill: f64,
    ) -> Result<Self> {
        let cells = geometry
            .cell_count()
            .ok_or_else(|| CoverageError::invalid_geometry("grid extent is undefined"))?;
        let storage = ArrayStorage::filled(&schema, cells, float_fill)?;
        Self::new(name, geometry, schema, Box::new(storage))
    }

    /// Coverage backed by array storage built from per-band arrays.
    pub fn from_bands(
        name: impl Into<String>,
        geometry: GridGeometry,
        schema: SampleSchema,
        bands: Vec<BandArray>,
    ) -> Result<Self> {
        let cells = geometry
            .cell_count()
            .ok_or_else(|| CoverageError::invalid_geometry("grid extent is undefined"))?;
        let storage = ArrayStorage::from_band_arrays(&schema, bands, cells)?;
        Self::new(name, geometry, schema, Box::new(storage))
    }

    /// Use another operation finder for evaluators created afterwards.
    pub fn with_finder(mut self, finder: Arc<dyn OperationFinder>) -> Self {
        self.finder = finder;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn schema(&self) -> &SampleSchema {
        &self.schema
    }

    pub fn indexer(&self) -> &GridIndexer {
        &self.indexer
    }

    pub fn store(&self) -> &dyn CellStore {
        self.store.as_ref()
    }

    pub fn cell_count(&self) -> usize {
        self.indexer.cell_count()
    }

    /// Continuous CRS equivalent, with the DGGS replaced by its base CRS.
    pub fn coordinate_crs(&self) -> &Arc<Crs> {
        &self.coordinate_crs
    }

    pub fn dggs(&self) -> &Arc<dyn DiscreteGlobalGrid> {
        &self.dggs
    }

    /// Grid dimension holding the zone axis.
    pub fn dggs_dimension(&self) -> usize {
        self.dggs_dimension
    }

    pub fn zone_index(&self) -> &ZoneIndex {
        &self.zone_index
    }

    /// Grid coordinate of a zone along the zone axis.
    pub fn zone_coordinate(&self, zone: &ZoneId) -> Option<i64> {
        let low = self.geometry.extent()?.low(self.dggs_dimension);
        self.zone_index.get(zone).map(|slot| low + slot as i64)
    }

    pub(crate) fn components(&self) -> &[ComponentGrid] {
        &self.components
    }

    pub(crate) fn finder(&self) -> &Arc<dyn OperationFinder> {
        &self.finder
    }

    pub fn iterator(&self) -> CellIterator<'_> {
        CellIterator::new(self.store.as_ref(), &self.indexer)
    }

    pub fn writable_iterator(&mut self) -> WritableCellIterator<'_> {
        WritableCellIterator::new(self.store.as_mut(), &self.indexer)
    }

    /// A new evaluator; see [`Evaluator`].
    pub fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(self)
    }
}

impl SourceCoverage for DggsCoverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn grid_geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn schema(&self) -> &SampleSchema {
        &self.schema
    }

    fn evaluator(&self) -> Box<dyn SampleEvaluator + '_> {
        Box::new(Evaluator::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RecordStorage, SampleBuffer};
    use crate::transform::ContinuousTransform;
    use referencing::{QuadGrid, ReferenceSystem};

    fn quad() -> Arc<dyn DiscreteGlobalGrid> {
        Arc::new(QuadGrid::global(4))
    }

    fn geometry() -> GridGeometry {
        let zones = vec!["Q0".into(), "Q1".into(), "Q2".into(), "Q3".into()];
        let horizontal = GridGeometry::dggs(quad(), zones).unwrap();
        let height = GridGeometry::continuous(
            &Arc::new(Crs::vertical("height", 1.0)),
            GridExtent::from_sizes(&[3]).unwrap(),
            ContinuousTransform::scale_translate(&[10.0], &[0.0]).unwrap(),
        )
        .unwrap();
        GridGeometry::concat(&[horizontal, height]).unwrap()
    }

    #[test]
    fn test_construction() {
        let coverage =
            DggsCoverage::filled("test", geometry(), SampleSchema::floats(1), f64::NAN).unwrap();
        assert_eq!(coverage.cell_count(), 12);
        assert_eq!(coverage.indexer().strides(), &[3, 1]);
        assert_eq!(coverage.coordinate_crs().dimension(), 3);
        assert_eq!(coverage.zone_coordinate(&"Q2".into()), Some(2));
        assert_eq!(coverage.zone_coordinate(&"Q22".into()), None);
    }

    #[test]
    fn test_missing_dggs_component() {
        let crs = Arc::new(Crs::wgs84());
        let geometry = GridGeometry::continuous(
            &crs,
            GridExtent::from_sizes(&[2, 2]).unwrap(),
            ContinuousTransform::identity(2),
        )
        .unwrap();
        let err = DggsCoverage::filled("x", geometry, SampleSchema::floats(1), 0.0).unwrap_err();
        assert_eq!(err, CoverageError::MissingDggsComponent);
    }

    #[test]
    fn test_undefined_dggs_rejected() {
        let geometry = GridGeometry::undefined_dggs(quad());
        let storage = ArrayStorage::filled(&SampleSchema::floats(1), 1, 0.0).unwrap();
        let err = DggsCoverage::new("x", geometry, SampleSchema::floats(1), Box::new(storage))
            .unwrap_err();
        assert!(matches!(err, CoverageError::InvalidGeometry(_)));
    }

    #[test]
    fn test_storage_size_must_match() {
        let schema = SampleSchema::floats(1);
        let storage = ArrayStorage::new(&schema, vec![SampleBuffer::F64(vec![0.0; 11])], 11).unwrap();
        let err = DggsCoverage::new("x", geometry(), schema, Box::new(storage)).unwrap_err();
        assert!(matches!(
            err,
            CoverageError::SampleCountMismatch { expected: 12, actual: 11, .. }
        ));
    }

    #[test]
    fn test_record_backed_coverage() {
        let schema = SampleSchema::floats(2);
        let storage = RecordStorage::filled(&schema, 12, f64::NAN);
        let mut coverage = DggsCoverage::new("records", geometry(), schema, Box::new(storage)).unwrap();
        {
            let mut it = coverage.writable_iterator();
            it.move_to(&[3, 2]).unwrap();
            it.set_samples(&[1.0, 2.0]).unwrap();
        }
        let mut it = coverage.iterator();
        it.move_to(&[3, 2]).unwrap();
        assert_eq!(it.sample(1).unwrap(), 2.0);
        assert_eq!(it.linear_position().unwrap(), 11);
    }

    #[test]
    fn test_two_dggs_components_rejected() {
        let rs = ReferenceSystem::new(vec![
            ReferenceComponent::Dggs(quad()),
            ReferenceComponent::Dggs(quad()),
        ]);
        let geometry = GridGeometry::new(rs, None, None).unwrap();
        let storage = ArrayStorage::filled(&SampleSchema::floats(1), 1, 0.0).unwrap();
        assert!(DggsCoverage::new("x", geometry, SampleSchema::floats(1), Box::new(storage)).is_err());
    }
}

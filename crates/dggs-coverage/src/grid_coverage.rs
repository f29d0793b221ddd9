//! In-memory coverages over continuous reference systems.

use std::ops::Range;
use std::sync::{Arc, RwLock};

use referencing::{
    same_crs, Crs, DefaultOperationFinder, DirectPosition, OperationFinder, OperationRef,
    ReferenceComponent,
};
use tracing::debug;

use crate::error::{CoverageError, Result};
use crate::extent::GridExtent;
use crate::geometry::GridGeometry;
use crate::indexer::GridIndexer;
use crate::interpolation::{bilinear, corner, InterpolationMethod};
use crate::sample::SampleSchema;
use crate::source::{GridCoverageResource, LoadingStrategy, SampleEvaluator, SourceCoverage};
use crate::storage::{ArrayStorage, CellStore, SampleBuffer};
use crate::transform::ContinuousTransform;

/// Coverage over a fully defined, all-continuous grid geometry.
#[derive(Debug)]
pub struct GridCoverage {
    name: String,
    geometry: GridGeometry,
    schema: SampleSchema,
    storage: ArrayStorage,
    indexer: GridIndexer,
    crs: Arc<Crs>,
    transform: ContinuousTransform,
    /// Grid dimensions of the horizontal component, if any.
    horizontal: Option<(usize, usize)>,
    interpolation: InterpolationMethod,
}

impl GridCoverage {
    pub fn new(
        name: impl Into<String>,
        geometry: GridGeometry,
        schema: SampleSchema,
        storage: ArrayStorage,
    ) -> Result<Self> {
        if geometry.dggs_component().is_some() {
            return Err(CoverageError::invalid_geometry(
                "continuous coverage cannot have a DGGS component",
            ));
        }
        let extent = geometry.require_extent()?;
        let transform = geometry
            .require_transform()?
            .to_continuous()
            .ok_or_else(|| CoverageError::invalid_geometry("grid-to-CRS transform is not affine"))?;
        let indexer = GridIndexer::new(extent);
        if storage.band_count() != schema.len() {
            return Err(CoverageError::BandCountMismatch {
                expected: schema.len(),
                actual: storage.band_count(),
            });
        }
        if storage.cell_count() != indexer.cell_count() {
            return Err(CoverageError::SampleCountMismatch {
                band: 0,
                expected: indexer.cell_count(),
                actual: storage.cell_count(),
            });
        }

        let rs = geometry.reference_system();
        let horizontal = rs.components().iter().enumerate().find_map(|(i, c)| match c {
            ReferenceComponent::Crs(crs) if crs.is_horizontal() => {
                let offset = rs.dimension_offset(i);
                Some((offset, offset + 1))
            }
            _ => None,
        });

        Ok(Self {
            name: name.into(),
            crs: rs.coordinate_crs(),
            geometry,
            schema,
            storage,
            indexer,
            transform,
            horizontal,
            interpolation: InterpolationMethod::default(),
        })
    }

    /// Single-band `f64` coverage with values in row-major order.
    pub fn from_values(
        name: impl Into<String>,
        geometry: GridGeometry,
        values: Vec<f64>,
    ) -> Result<Self> {
        let schema = SampleSchema::floats(1);
        let cells = values.len();
        let storage = ArrayStorage::new(&schema, vec![SampleBuffer::F64(values)], cells)?;
        Self::new(name, geometry, schema, storage)
    }

    pub fn with_interpolation(mut self, interpolation: InterpolationMethod) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn interpolation(&self) -> InterpolationMethod {
        self.interpolation
    }

    pub fn crs(&self) -> &Arc<Crs> {
        &self.crs
    }

    pub fn storage(&self) -> &ArrayStorage {
        &self.storage
    }

    /// Copy of this coverage restricted to a band range.
    pub fn select_bands(&self, bands: Range<usize>) -> Result<GridCoverage> {
        let schema = self.schema.select(bands.clone())?;
        let buffers = bands
            .map(|b| {
                self.storage
                    .band(b)
                    .cloned()
                    .ok_or(CoverageError::BandOutOfRange {
                        band: b,
                        count: self.storage.band_count(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let storage = ArrayStorage::new(&schema, buffers, self.indexer.cell_count())?;
        Ok(GridCoverage::new(self.name.clone(), self.geometry.clone(), schema, storage)?
            .with_interpolation(self.interpolation))
    }

    pub fn evaluator(&self) -> GridEvaluator<'_> {
        GridEvaluator {
            coverage: self,
            cache: None,
            finder: DefaultOperationFinder::new(),
            null_if_outside: false,
            wraparound: false,
        }
    }
}

impl SourceCoverage for GridCoverage {
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
        Box::new(GridCoverage::evaluator(self))
    }
}

/// Evaluator of a [`GridCoverage`], caching the operation from the last query CRS.
pub struct GridEvaluator<'a> {
    coverage: &'a GridCoverage,
    cache: Option<(Arc<Crs>, OperationRef)>,
    finder: DefaultOperationFinder,
    null_if_outside: bool,
    wraparound: bool,
}

impl GridEvaluator<'_> {
    fn operation(&mut self, crs: &Arc<Crs>) -> Result<OperationRef> {
        if let Some((source, op)) = &self.cache {
            if same_crs(source, crs) {
                return Ok(Arc::clone(op));
            }
        }
        let op = self.finder.find_operation(crs, &self.coverage.crs)?;
        self.cache = Some((Arc::clone(crs), Arc::clone(&op)));
        Ok(op)
    }

    /// Real-valued grid coordinates of a CRS position, wrapped into the extent when enabled.
    fn grid_coordinates(&self, crs_position: &mut [f64]) -> Result<Vec<f64>> {
        let coverage = self.coverage;
        let extent = coverage.geometry.require_extent()?;
        let mut grid = coverage.transform.inverse_apply(crs_position)?;
        if self.wraparound && !Self::inside(extent, &grid) {
            for (d, axis) in coverage.crs.axes().iter().enumerate() {
                if Self::inside(extent, &grid) {
                    break;
                }
                let Some(period) = axis.period() else { continue };
                for shift in [period, -period] {
                    let mut shifted = crs_position.to_vec();
                    shifted[d] += shift;
                    let candidate = coverage.transform.inverse_apply(&shifted)?;
                    if Self::inside(extent, &candidate) {
                        crs_position[d] = shifted[d];
                        grid = candidate;
                        break;
                    }
                }
            }
        }
        Ok(grid)
    }

    fn inside(extent: &GridExtent, grid: &[f64]) -> bool {
        grid.iter().enumerate().all(|(d, &g)| {
            let cell = g.round() as i64;
            g.is_finite() && cell >= extent.low(d) && cell <= extent.high(d)
        })
    }

    fn interpolate(&self, grid: &[f64]) -> Result<Vec<f64>> {
        let coverage = self.coverage;
        let extent = coverage.geometry.require_extent()?;
        let nearest: Vec<i64> = grid.iter().map(|g| g.round() as i64).collect();
        let bands = coverage.schema.len();

        let (Some((dx, dy)), InterpolationMethod::Bilinear) =
            (coverage.horizontal, coverage.interpolation)
        else {
            let cell = coverage.indexer.linear(&nearest)?;
            let mut out = Vec::with_capacity(bands);
            coverage.storage.samples(cell, &mut out)?;
            return Ok(out);
        };

        let (x0, x1, xf) = corner(grid[dx], extent.low(dx), extent.high(dx));
        let (y0, y1, yf) = corner(grid[dy], extent.low(dy), extent.high(dy));
        let at = |x: i64, y: i64| {
            let mut p = nearest.clone();
            p[dx] = x;
            p[dy] = y;
            coverage.indexer.linear(&p)
        };
        let (c00, c10, c01, c11) = (at(x0, y0)?, at(x1, y0)?, at(x0, y1)?, at(x1, y1)?);

        (0..bands)
            .map(|b| {
                let s = &coverage.storage;
                Ok(bilinear(
                    s.sample(c00, b)?,
                    s.sample(c10, b)?,
                    s.sample(c01, b)?,
                    s.sample(c11, b)?,
                    xf,
                    yf,
                ))
            })
            .collect()
    }
}

impl SampleEvaluator for GridEvaluator<'_> {
    fn null_if_outside(&self) -> bool {
        self.null_if_outside
    }

    fn set_null_if_outside(&mut self, flag: bool) {
        self.null_if_outside = flag;
    }

    fn wraparound_enabled(&self) -> bool {
        self.wraparound
    }

    fn set_wraparound_enabled(&mut self, flag: bool) {
        self.wraparound = flag;
    }

    fn evaluate(&mut self, position: &DirectPosition) -> Result<Option<Vec<f64>>> {
        let op = self.operation(&position.crs)?;
        let mut crs_position = op.transform(&position.coordinates)?;
        let grid = self.grid_coordinates(&mut crs_position)?;
        let extent = self.coverage.geometry.require_extent()?;
        if !Self::inside(extent, &grid) {
            return if self.null_if_outside {
                Ok(None)
            } else {
                Err(CoverageError::PointOutsideCoverage(position.coordinates.clone()))
            };
        }
        self.interpolate(&grid).map(Some)
    }
}

/// Resource serving a shared [`GridCoverage`].
///
/// The samples are always resident, so the loading strategy is only recorded:
/// `read` hands out the same data under either strategy.
#[derive(Debug)]
pub struct MemoryResource {
    coverage: Arc<GridCoverage>,
    loading: RwLock<LoadingStrategy>,
}

impl MemoryResource {
    pub fn new(coverage: GridCoverage) -> Self {
        Self {
            coverage: Arc::new(coverage),
            loading: RwLock::new(LoadingStrategy::default()),
        }
    }

    pub fn coverage(&self) -> &Arc<GridCoverage> {
        &self.coverage
    }
}

impl GridCoverageResource for MemoryResource {
    fn grid_geometry(&self) -> &GridGeometry {
        &self.coverage.geometry
    }

    fn schema(&self) -> &SampleSchema {
        &self.coverage.schema
    }

    fn read(
        &self,
        geometry: Option<&GridGeometry>,
        bands: Option<Range<usize>>,
    ) -> Result<Arc<dyn SourceCoverage>> {
        if let Some(requested) = geometry.and_then(|g| g.envelope()) {
            let own = self.coverage.geometry.envelope();
            if let Some(own) = own.filter(|e| e.dimension() == requested.dimension()) {
                if own.intersection(&requested).is_none() {
                    return Err(CoverageError::no_data(format!(
                        "requested area does not intersect {}",
                        self.coverage.name
                    )));
                }
            }
        }
        match bands {
            Some(range) if range != (0..self.coverage.schema.len()) => {
                debug!(
                    coverage = %self.coverage.name,
                    ?range,
                    strategy = ?self.loading_strategy(),
                    "reading band subset"
                );
                Ok(Arc::new(self.coverage.select_bands(range)?))
            }
            _ => Ok(Arc::clone(&self.coverage) as Arc<dyn SourceCoverage>),
        }
    }

    fn loading_strategy(&self) -> LoadingStrategy {
        self.loading
            .read()
            .map(|s| *s)
            .unwrap_or_default()
    }

    fn set_loading_strategy(&self, strategy: LoadingStrategy) -> bool {
        match self.loading.write() {
            Ok(mut s) => {
                *s = strategy;
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 4 x 3 lon/lat grid of 10 degree cells starting at (0, 0), value = 10 * row + col.
    fn coverage() -> GridCoverage {
        let crs = Arc::new(Crs::wgs84());
        let geometry = GridGeometry::continuous(
            &crs,
            GridExtent::from_sizes(&[4, 3]).unwrap(),
            ContinuousTransform::scale_translate(&[10.0, 10.0], &[5.0, 5.0]).unwrap(),
        )
        .unwrap();
        let values = (0..4)
            .flat_map(|col| (0..3).map(move |row| (10 * row + col) as f64))
            .collect();
        GridCoverage::from_values("test", geometry, values).unwrap()
    }

    fn lonlat(lon: f64, lat: f64) -> DirectPosition {
        DirectPosition::new(Arc::new(Crs::wgs84()), vec![lon, lat])
    }

    #[test]
    fn test_nearest() {
        let coverage = coverage();
        let mut evaluator = coverage.evaluator();
        assert_eq!(evaluator.evaluate(&lonlat(26.0, 14.0)).unwrap(), Some(vec![12.0]));
        assert_eq!(evaluator.evaluate(&lonlat(0.5, 0.5)).unwrap(), Some(vec![0.0]));
    }

    #[test]
    fn test_bilinear_between_centres() {
        let coverage = coverage().with_interpolation(InterpolationMethod::Bilinear);
        let mut evaluator = coverage.evaluator();
        let value = evaluator.evaluate(&lonlat(10.0, 10.0)).unwrap().unwrap();
        // halfway between cols 0..1 and rows 0..1
        assert!((value[0] - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_outside_policy() {
        let coverage = coverage();
        let mut evaluator = coverage.evaluator();
        assert!(matches!(
            evaluator.evaluate(&lonlat(50.0, 10.0)),
            Err(CoverageError::PointOutsideCoverage(_))
        ));
        evaluator.set_null_if_outside(true);
        assert_eq!(evaluator.evaluate(&lonlat(50.0, 10.0)).unwrap(), None);
    }

    #[test]
    fn test_wraparound() {
        let coverage = coverage();
        let mut evaluator = coverage.evaluator();
        evaluator.set_null_if_outside(true);
        assert_eq!(evaluator.evaluate(&lonlat(-335.0, 5.0)).unwrap(), None);
        evaluator.set_wraparound_enabled(true);
        assert_eq!(evaluator.evaluate(&lonlat(-335.0, 5.0)).unwrap(), Some(vec![2.0]));
    }

    #[test]
    fn test_projected_query() {
        let coverage = coverage();
        let mut evaluator = coverage.evaluator();
        let mercator = Arc::new(Crs::web_mercator());
        let (x, y) = match mercator.kind() {
            referencing::CrsKind::Projected(p) => p.forward(26.0, 14.0),
            _ => unreachable!(),
        };
        let position = DirectPosition::new(mercator, vec![x, y]);
        assert_eq!(evaluator.evaluate(&position).unwrap(), Some(vec![12.0]));
    }

    #[test]
    fn test_no_operation_is_reported() {
        let coverage = coverage();
        let mut evaluator = coverage.evaluator();
        let time = DirectPosition::new(Arc::new(Crs::unix_hours()), vec![1.0]);
        let err = evaluator.evaluate(&time).unwrap_err();
        assert!(err.is_evaluation_miss());
    }

    #[test]
    fn test_memory_resource_band_subset_and_strategy() {
        let resource = MemoryResource::new(coverage());
        let full = resource.read(None, None).unwrap();
        assert_eq!(full.schema().len(), 1);
        assert!(resource.read(None, Some(0..2)).is_err());

        assert_eq!(resource.loading_strategy(), LoadingStrategy::AtReadTime);
        assert!(resource.set_loading_strategy(LoadingStrategy::AtGetTileTime));
        assert_eq!(resource.loading_strategy(), LoadingStrategy::AtGetTileTime);
    }
}

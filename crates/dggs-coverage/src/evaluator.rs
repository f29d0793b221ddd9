//! Position to sample lookup on DGGS coverages.
//!
//! For a query position the evaluator:
//!
//! 1. converts it to every continuous component of the coverage, with
//!    operations cached for the last query CRS
//! 2. tries refinement levels from coarsest to finest, encoding the position
//!    to a zone and looking the zone up in the coverage's zone index
//! 3. returns the samples of the first level that resolves to a cell
//!
//! Evaluators own a zone coder and a cursor; use one per thread.

use std::sync::Arc;

use referencing::{same_crs, Crs, DirectPosition, OperationRef, ZoneCoder};
use tracing::trace;

use crate::address::Address;
use crate::coverage::{ComponentGrid, DggsCoverage};
use crate::error::{CoverageError, Result};
use crate::iter::CellIterator;
use crate::source::SampleEvaluator;

/// Operations from the last query CRS to the coverage components.
struct OperationCache {
    source: Arc<Crs>,
    /// To the DGGS base CRS.
    horizontal: Option<OperationRef>,
    /// To each continuous component, `None` where no operation exists.
    components: Vec<Option<OperationRef>>,
}

/// Evaluator of a [`DggsCoverage`].
pub struct Evaluator<'a> {
    coverage: &'a DggsCoverage,
    coder: Box<dyn ZoneCoder>,
    cursor: Option<CellIterator<'a>>,
    cache: Option<OperationCache>,
    null_if_outside: bool,
    wraparound: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(coverage: &'a DggsCoverage) -> Self {
        Self {
            coverage,
            coder: coverage.dggs().create_coder(),
            cursor: None,
            cache: None,
            null_if_outside: false,
            wraparound: false,
        }
    }

    fn refresh_cache(&mut self, crs: &Arc<Crs>) {
        if let Some(cache) = &self.cache {
            if same_crs(&cache.source, crs) {
                return;
            }
        }
        let finder = self.coverage.finder();
        let horizontal = finder
            .find_operation(crs, &self.coverage.dggs().base_crs())
            .ok();
        let components = self
            .coverage
            .components()
            .iter()
            .map(|c| finder.find_operation(crs, &c.crs).ok())
            .collect();
        trace!(crs = %crs, "rebuilt operation cache");
        self.cache = Some(OperationCache {
            source: Arc::clone(crs),
            horizontal,
            components,
        });
    }

    /// Grid coordinates of `coordinates` along one continuous component.
    fn component_grid(
        &self,
        component: &ComponentGrid,
        operation: &OperationRef,
        coordinates: &[f64],
    ) -> Option<Vec<i64>> {
        let mut values = operation.transform(coordinates).ok()?;
        let grid = component.transform.to_grid(&Address::numeric(&values)).ok()?;
        if component.extent.contains(&grid) {
            return Some(grid);
        }
        if !self.wraparound {
            return None;
        }
        // Try one period either way on wrapping axes.
        for (d, axis) in component.crs.axes().iter().enumerate() {
            let Some(period) = axis.period() else { continue };
            let original = values[d];
            for shift in [period, -period] {
                values[d] = original + shift;
                if let Ok(grid) = component.transform.to_grid(&Address::numeric(&values)) {
                    if component.extent.contains(&grid) {
                        return Some(grid);
                    }
                }
            }
            values[d] = original;
        }
        None
    }

    /// Horizontal position in the DGGS base CRS, longitude normalized if wrapping.
    fn horizontal_position(&self, operation: &OperationRef, coordinates: &[f64]) -> Option<Vec<f64>> {
        let mut xy = operation.transform(coordinates).ok()?;
        if self.wraparound {
            let base = self.coverage.dggs().base_crs();
            for (d, axis) in base.axes().iter().enumerate() {
                if let (Some(period), Some((min, _))) = (axis.period(), axis.range) {
                    xy[d] = min + (xy[d] - min).rem_euclid(period);
                }
            }
        }
        Some(xy)
    }

    fn outside(&self, position: &DirectPosition) -> Result<Option<Vec<f64>>> {
        if self.null_if_outside {
            Ok(None)
        } else {
            Err(CoverageError::PointOutsideCoverage(position.coordinates.clone()))
        }
    }

    /// Samples at `position`, or the outside policy if no level resolves it.
    pub fn evaluate(&mut self, position: &DirectPosition) -> Result<Option<Vec<f64>>> {
        self.refresh_cache(&position.crs);
        let Some(cache) = self.cache.as_ref() else {
            return self.outside(position);
        };

        let coverage = self.coverage;
        let Some(xy) = cache
            .horizontal
            .as_ref()
            .and_then(|op| self.horizontal_position(op, &position.coordinates))
        else {
            trace!("no operation to the DGGS base CRS");
            return self.outside(position);
        };

        // Continuous coordinates do not depend on the refinement level.
        let mut grid = vec![0i64; coverage.indexer().dimension()];
        for (component, operation) in coverage.components().iter().zip(&cache.components) {
            let resolved = operation
                .as_ref()
                .and_then(|op| self.component_grid(component, op, &position.coordinates));
            match resolved {
                Some(values) => {
                    grid[component.offset..component.offset + values.len()]
                        .copy_from_slice(&values);
                }
                None => {
                    trace!(component = component.crs.name(), "position outside component extent");
                    return self.outside(position);
                }
            }
        }

        for level in coverage.dggs().refinement_levels() {
            if self.coder.set_precision(level).is_err() {
                continue;
            }
            let zone = match self.coder.encode(&xy) {
                Ok(zone) => zone,
                Err(e) => {
                    trace!(level, error = %e, "zone encoding failed, trying next level");
                    continue;
                }
            };
            let Some(coordinate) = coverage.zone_coordinate(&zone) else {
                trace!(level, zone = %zone, "zone not in coverage, trying next level");
                continue;
            };
            grid[coverage.dggs_dimension()] = coordinate;

            let cursor = self.cursor.get_or_insert_with(|| coverage.iterator());
            cursor.move_to(&grid)?;
            let mut samples = Vec::with_capacity(coverage.schema().len());
            cursor.samples(&mut samples)?;
            return Ok(Some(samples));
        }

        self.outside(position)
    }
}

impl SampleEvaluator for Evaluator<'_> {
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
        Evaluator::evaluate(self, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::GridExtent;
    use crate::geometry::GridGeometry;
    use crate::sample::SampleSchema;
    use crate::transform::ContinuousTransform;
    use referencing::{BoundingBox, DiscreteGlobalGrid, QuadGrid, ZoneId};

    /// Four level-1 zones crossed with three heights, sample = linear position.
    fn coverage(grid: QuadGrid) -> DggsCoverage {
        coverage_with(grid, &["Q0", "Q1", "Q2", "Q3"])
    }

    fn coverage_with(grid: QuadGrid, zones: &[&str]) -> DggsCoverage {
        let dggs: Arc<dyn DiscreteGlobalGrid> = Arc::new(grid);
        let zones: Vec<ZoneId> = zones.iter().map(|z| ZoneId::from(*z)).collect();
        let horizontal = GridGeometry::dggs(dggs, zones).unwrap();
        let height = GridGeometry::continuous(
            &Arc::new(Crs::vertical("height", 1.0)),
            GridExtent::from_sizes(&[3]).unwrap(),
            ContinuousTransform::scale_translate(&[10.0], &[0.0]).unwrap(),
        )
        .unwrap();
        let geometry = GridGeometry::concat(&[horizontal, height]).unwrap();
        let mut coverage =
            DggsCoverage::filled("eval", geometry, SampleSchema::floats(1), f64::NAN).unwrap();
        let mut it = coverage.writable_iterator();
        while it.next() {
            let i = it.linear_position().unwrap() as f64;
            it.set_sample(0, i).unwrap();
        }
        coverage
    }

    fn at(coverage: &DggsCoverage, lon: f64, lat: f64, h: f64) -> DirectPosition {
        DirectPosition::new(Arc::clone(coverage.coordinate_crs()), vec![lon, lat, h])
    }

    #[test]
    fn test_resolves_zone_and_height() {
        let coverage = coverage(QuadGrid::global(2));
        let mut evaluator = coverage.evaluator();
        // Q3 is south-east, height 20 is the third step
        let value = evaluator.evaluate(&at(&coverage, 90.0, -45.0, 20.0)).unwrap();
        assert_eq!(value, Some(vec![11.0]));
        let value = evaluator.evaluate(&at(&coverage, -90.0, 45.0, 1.0)).unwrap();
        assert_eq!(value, Some(vec![0.0]));
    }

    #[test]
    fn test_outside_policy() {
        let coverage = coverage(QuadGrid::global(2));
        let mut evaluator = coverage.evaluator();
        let err = evaluator.evaluate(&at(&coverage, 0.0, 0.0, 500.0)).unwrap_err();
        assert!(matches!(err, CoverageError::PointOutsideCoverage(_)));

        evaluator.set_null_if_outside(true);
        assert_eq!(evaluator.evaluate(&at(&coverage, 0.0, 0.0, 500.0)).unwrap(), None);
    }

    #[test]
    fn test_levels_fall_back_in_ascending_order() {
        // Level 1 refuses the western hemisphere, level 2 covers everything.
        let grid = QuadGrid::new(
            "restricted",
            Arc::new(Crs::wgs84()),
            BoundingBox::world(),
            1..=2,
        )
        .restrict_level(1, BoundingBox::new(0.0, -90.0, 180.0, 90.0));
        let coverage = coverage_with(grid, &["Q1", "Q2", "Q3", "Q22"]);
        let mut evaluator = coverage.evaluator();

        // Q2 is listed but not encodable at level 1, so Q22 at level 2 wins.
        let value = evaluator.evaluate(&at(&coverage, -135.0, -67.5, 0.0)).unwrap();
        assert_eq!(value, Some(vec![9.0]));

        // East: level 1 already resolves to Q3.
        let value = evaluator.evaluate(&at(&coverage, 90.0, -67.5, 0.0)).unwrap();
        assert_eq!(value, Some(vec![6.0]));
    }

    #[test]
    fn test_wraparound_normalizes_longitude() {
        let coverage = coverage(QuadGrid::global(2));
        let mut evaluator = coverage.evaluator();
        evaluator.set_null_if_outside(true);
        assert_eq!(evaluator.evaluate(&at(&coverage, 270.0, 45.0, 0.0)).unwrap(), None);

        evaluator.set_wraparound_enabled(true);
        // 270 east is 90 west: Q0
        assert_eq!(
            evaluator.evaluate(&at(&coverage, 270.0, 45.0, 0.0)).unwrap(),
            Some(vec![0.0])
        );
    }

    #[test]
    fn test_unconvertible_crs_is_outside() {
        let coverage = coverage(QuadGrid::global(2));
        let mut evaluator = coverage.evaluator();
        evaluator.set_null_if_outside(true);
        let time = DirectPosition::new(Arc::new(Crs::unix_hours()), vec![10.0]);
        assert_eq!(evaluator.evaluate(&time).unwrap(), None);
    }
}

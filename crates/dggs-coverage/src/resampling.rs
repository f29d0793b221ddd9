//! DGGS view of a continuous grid coverage resource.
//!
//! # Read pipeline
//!
//! ```text
//! query (DGGS-addressed)
//!      │
//!      ├─► to_grid_geometry: regular continuous grid per component
//!      │
//!      ├─► smart_intersect: source geometry clipped to the query, per component
//!      │
//!      ├─► expand: back to a DGGS-addressed result geometry
//!      │
//!      └─► evaluate the source at every result cell
//!               │
//!               ├─► hit: write the sample vector
//!               └─► miss: keep the fill value, count a fallback cell
//! ```
//!
//! Cells are independent. In parallel mode each rayon worker gets its own
//! source evaluator and zone coder.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use referencing::{
    BoundingBox, Crs, DefaultOperationFinder, DirectPosition, DiscreteGlobalGrid, Envelope,
    OperationFinder, ReferenceComponent, ReferenceSystem, ZoneCoder,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::Ordinate;
use crate::config::ResampleConfig;
use crate::coverage::DggsCoverage;
use crate::error::{CoverageError, Result};
use crate::extent::GridExtent;
use crate::geometry::GridGeometry;
use crate::sample::SampleSchema;
use crate::source::{GridCoverageResource, LoadingStrategy, SampleEvaluator, SourceCoverage};
use crate::transform::{ContinuousTransform, GridTransform};

// ============================================================================
// Geometry negotiation
// ============================================================================

/// Continuous grid geometry equivalent to `query`.
///
/// Components that already have a regular grid are kept. The others get a
/// grid synthesized from their envelope and resolution, with
/// `oversampling` times more cells than the resolution asks for. A DGGS
/// component becomes a grid over its base CRS. A synthesized axis longer than
/// `max_axis_cells` is rejected with `TooManyCells`.
pub fn to_grid_geometry(
    query: &GridGeometry,
    oversampling: f64,
    max_axis_cells: usize,
) -> Result<GridGeometry> {
    let rs = query.reference_system();
    let mut parts = Vec::with_capacity(rs.components().len());
    for (i, component) in rs.components().iter().enumerate() {
        let slice = query.slice(i)?;
        let regular = matches!(
            (component, slice.transform()),
            (ReferenceComponent::Crs(_), Some(GridTransform::Continuous(_)))
        ) && slice.extent().is_some();
        if regular {
            parts.push(slice);
            continue;
        }

        let crs = component.coordinate_crs();
        let (Some(envelope), Some(resolution)) = (slice.envelope(), slice.resolution()) else {
            return Err(CoverageError::invalid_geometry(format!(
                "query component {} has neither a grid nor an envelope and resolution",
                component.name()
            )));
        };
        parts.push(synthesize(
            &crs,
            &envelope,
            &resolution,
            oversampling,
            max_axis_cells,
        )?);
    }
    GridGeometry::concat(&parts)
}

/// Regular grid over `envelope`, `oversampling` cells per resolution step.
fn synthesize(
    crs: &Arc<Crs>,
    envelope: &Envelope,
    resolution: &[f64],
    oversampling: f64,
    max_axis_cells: usize,
) -> Result<GridGeometry> {
    let n = envelope.dimension();
    let mut lower = envelope.lower().to_vec();
    let mut upper = envelope.upper().to_vec();
    let mut sizes = Vec::with_capacity(n);
    for d in 0..n {
        let step = resolution[d];
        if !(step > 0.0) {
            return Err(CoverageError::invalid_geometry("resolution must be > 0"));
        }
        // Flat axes get one cell of the resolution's width.
        if envelope.span(d) <= 0.0 {
            lower[d] -= step / 2.0;
            upper[d] += step / 2.0;
        }
        let cells = (oversampling * (upper[d] - lower[d]) / step).ceil();
        if !(cells <= max_axis_cells as f64) {
            return Err(CoverageError::TooManyCells {
                cells: if cells.is_finite() { cells as usize } else { usize::MAX },
                limit: max_axis_cells,
            });
        }
        sizes.push((cells as usize).max(1));
    }
    let envelope = Envelope::new(lower, upper)?;
    let extent = GridExtent::from_sizes(&sizes)?;
    let transform = ContinuousTransform::from_envelope(&extent, &envelope)?;
    GridGeometry::continuous(crs, extent, transform)
}

/// Clip a fully defined, all-continuous `source` geometry to `query`.
///
/// Each source component is matched with the first query component that
/// converts to it, then sub-gridded to the query envelope. Source components
/// no query component converts to are kept whole. A query that misses the
/// source entirely is reported as `NoData`.
pub fn smart_intersect(
    source: &GridGeometry,
    query: &GridGeometry,
    finder: &dyn OperationFinder,
) -> Result<GridGeometry> {
    let source_rs = source.reference_system();
    let query_rs = query.reference_system();
    let mut parts = Vec::with_capacity(source_rs.components().len());

    for (i, component) in source_rs.components().iter().enumerate() {
        let slice = source.slice(i)?;
        let target = component.coordinate_crs();

        let mut clipped = None;
        for (j, candidate) in query_rs.components().iter().enumerate() {
            let Ok(operation) = finder.find_operation(&candidate.coordinate_crs(), &target) else {
                continue;
            };
            let Some(envelope) = query.slice(j)?.envelope() else {
                continue;
            };
            let envelope = envelope.transform(operation.as_ref())?;
            debug!(
                source = component.name(),
                query = candidate.name(),
                lower = ?envelope.lower(),
                upper = ?envelope.upper(),
                "intersecting component"
            );
            clipped = Some(slice.subgrid(&envelope)?);
            break;
        }
        parts.push(clipped.unwrap_or(slice));
    }

    let intersected = GridGeometry::concat(&parts)?;
    debug!(
        cells = intersected.cell_count().unwrap_or(0),
        "intersected source geometry"
    );
    Ok(intersected)
}

/// DGGS-addressed result geometry following `template`.
///
/// - the DGGS axis is the query's when it lists zones; otherwise the zones of
///   `level` (from the query resolution, else `default_level`) that touch both
///   the query and `intersected`, counted first and rejected with
///   `TooManyCells` when there are more than `max_cells`
/// - other axes come from the query when it has a regular grid for them,
///   else from `intersected`, else from `template`
pub fn expand(
    template: &GridGeometry,
    query: &GridGeometry,
    intersected: &GridGeometry,
    default_level: u8,
    max_cells: usize,
    finder: &dyn OperationFinder,
) -> Result<GridGeometry> {
    let query_rs = query.reference_system();
    let mut parts = Vec::with_capacity(template.reference_system().components().len());

    for (i, component) in template.reference_system().components().iter().enumerate() {
        let part = match component {
            ReferenceComponent::Dggs(dggs) => {
                let query_slice = query_rs
                    .dggs_index()
                    .map(|j| query.slice(j))
                    .transpose()?;
                match query_slice {
                    Some(slice) if slice.is_defined() => slice,
                    other => {
                        resolve_zones(
                            dggs,
                            other.as_ref(),
                            intersected,
                            default_level,
                            max_cells,
                            finder,
                        )?
                    }
                }
            }
            ReferenceComponent::Crs(_) => {
                let from_query = query_rs
                    .index_of(component)
                    .map(|j| query.slice(j))
                    .transpose()?
                    .filter(|s| s.is_defined());
                let from_source = intersected
                    .reference_system()
                    .index_of(component)
                    .map(|j| intersected.slice(j))
                    .transpose()?;
                match (from_query, from_source) {
                    (Some(slice), _) | (None, Some(slice)) => slice,
                    (None, None) => template.slice(i)?,
                }
            }
        };
        parts.push(part);
    }

    let result = GridGeometry::concat(&parts)?;
    debug!(cells = result.cell_count().unwrap_or(0), "expanded result geometry");
    Ok(result)
}

/// Zones of the DGGS covering the query and the intersected source.
fn resolve_zones(
    dggs: &Arc<dyn DiscreteGlobalGrid>,
    query: Option<&GridGeometry>,
    intersected: &GridGeometry,
    default_level: u8,
    max_cells: usize,
    finder: &dyn OperationFinder,
) -> Result<GridGeometry> {
    let base = dggs.base_crs();
    let source_bbox = horizontal_bbox(intersected, &base, finder)
        .ok_or_else(|| CoverageError::no_data("source has no horizontal extent"))?;
    let bbox = match query.and_then(|q| q.envelope()) {
        Some(envelope) => to_bbox(&envelope)
            .intersection(&source_bbox)
            .ok_or_else(|| CoverageError::no_data("query does not intersect the source"))?,
        None => source_bbox,
    };
    let level = query
        .and_then(|q| q.resolution())
        .filter(|r| !r.is_empty())
        .map(|r| dggs.level_for_resolution(r.iter().sum::<f64>() / r.len() as f64))
        .unwrap_or(default_level);

    let count = dggs.zone_count(&bbox, level)?;
    if count > max_cells as u64 {
        return Err(CoverageError::TooManyCells {
            cells: usize::try_from(count).unwrap_or(usize::MAX),
            limit: max_cells,
        });
    }
    let zones = dggs.zones_within(&bbox, level)?;
    debug!(dggs = dggs.name(), level, zones = zones.len(), "resolved zones");
    GridGeometry::dggs(Arc::clone(dggs), zones)
}

/// Bounding box of the first horizontal component of `geometry`, in `target`.
fn horizontal_bbox(
    geometry: &GridGeometry,
    target: &Arc<Crs>,
    finder: &dyn OperationFinder,
) -> Option<BoundingBox> {
    let rs = geometry.reference_system();
    let index = rs.components().iter().position(|c| c.is_horizontal())?;
    let slice = geometry.slice(index).ok()?;
    let envelope = slice.envelope()?;
    let crs = rs.component(index)?.coordinate_crs();
    let operation = finder.find_operation(&crs, target).ok()?;
    envelope.transform(operation.as_ref()).ok().map(|e| to_bbox(&e))
}

fn to_bbox(envelope: &Envelope) -> BoundingBox {
    BoundingBox::new(
        envelope.lower()[0],
        envelope.lower()[1],
        envelope.upper()[0],
        envelope.upper()[1],
    )
}

// ============================================================================
// Resampled resource
// ============================================================================

/// Counters of one resampling read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResampleStats {
    /// Cells of the result coverage.
    pub cells: usize,
    /// Cells that received a sample vector from the source.
    pub written: usize,
    /// Cells left at the fill value.
    pub fallback: usize,
}

/// A continuous grid coverage resource presented as a DGGS coverage resource.
///
/// The horizontal component of the source is replaced by a DGGS axis whose
/// zones are resolved per read; other components are carried through.
pub struct ResampledResource {
    name: String,
    source: Arc<dyn GridCoverageResource>,
    dggs: Arc<dyn DiscreteGlobalGrid>,
    geometry: GridGeometry,
    default_level: u8,
    config: ResampleConfig,
    finder: Arc<dyn OperationFinder>,
    fallback: AtomicU64,
    last_stats: Mutex<Option<ResampleStats>>,
}

impl std::fmt::Debug for ResampledResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResampledResource")
            .field("name", &self.name)
            .field("dggs", &self.dggs.name())
            .field("default_level", &self.default_level)
            .field("config", &self.config)
            .finish()
    }
}

impl ResampledResource {
    pub fn new(
        name: impl Into<String>,
        dggs: Arc<dyn DiscreteGlobalGrid>,
        source: Arc<dyn GridCoverageResource>,
        config: ResampleConfig,
    ) -> Result<Self> {
        config.validate().map_err(CoverageError::config)?;
        let name = name.into();
        let finder: Arc<dyn OperationFinder> = Arc::new(DefaultOperationFinder::new());
        let source_geometry = source.grid_geometry();
        let rs = source_geometry.reference_system();

        let mut horizontal = None;
        let mut parts = Vec::with_capacity(rs.components().len());
        for (i, component) in rs.components().iter().enumerate() {
            if component.is_horizontal() {
                if horizontal.is_some() {
                    return Err(CoverageError::invalid_geometry(
                        "source has more than one horizontal component",
                    ));
                }
                horizontal = Some(i);
                parts.push(GridGeometry::undefined_dggs(Arc::clone(&dggs)));
            } else {
                parts.push(source_geometry.slice(i)?);
            }
        }
        let Some(horizontal) = horizontal else {
            return Err(CoverageError::invalid_geometry(
                "source has no horizontal component to replace by a DGGS",
            ));
        };
        let geometry = GridGeometry::concat(&parts)?;

        let default_level = source_resolution(source_geometry, horizontal, &dggs, finder.as_ref())
            .map(|r| dggs.level_for_resolution(r))
            .unwrap_or(*dggs.refinement_levels().start());

        debug!(
            name = %name,
            dggs = dggs.name(),
            default_level,
            parallel = config.parallel,
            "created resampled resource"
        );

        Ok(Self {
            name,
            source,
            dggs,
            geometry,
            default_level,
            config,
            finder,
            fallback: AtomicU64::new(0),
            last_stats: Mutex::new(None),
        })
    }

    pub fn with_finder(mut self, finder: Arc<dyn OperationFinder>) -> Self {
        self.finder = finder;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ResampleConfig {
        &self.config
    }

    pub fn dggs(&self) -> &Arc<dyn DiscreteGlobalGrid> {
        &self.dggs
    }

    /// Refinement level used when a query gives no resolution.
    pub fn default_level(&self) -> u8 {
        self.default_level
    }

    /// Cells left at the fill value, over every read so far.
    pub fn fallback_cells(&self) -> u64 {
        self.fallback.load(Ordering::Relaxed)
    }

    /// Counters of the last completed read.
    pub fn last_stats(&self) -> Option<ResampleStats> {
        self.last_stats.lock().ok().and_then(|s| *s)
    }

    /// Query over the whole source at the default level.
    pub fn default_query(&self) -> Result<GridGeometry> {
        let base = self.dggs.base_crs();
        let bbox = horizontal_bbox(self.source.grid_geometry(), &base, self.finder.as_ref())
            .ok_or_else(|| CoverageError::no_data("source has no horizontal extent"))?;
        let size = self.dggs.zone_size(self.default_level);
        let rs = self.geometry.reference_system();
        let parts = rs
            .components()
            .iter()
            .enumerate()
            .map(|(i, component)| match component {
                ReferenceComponent::Dggs(_) => GridGeometry::from_envelope(
                    ReferenceSystem::single(component.clone()),
                    bbox.to_envelope(),
                    vec![size, size],
                ),
                ReferenceComponent::Crs(_) => self.geometry.slice(i),
            })
            .collect::<Result<Vec<_>>>()?;
        GridGeometry::concat(&parts)
    }

    /// Resample the source over `query`, restricted to `bands`.
    pub fn resample(&self, query: &GridGeometry, bands: Option<Range<usize>>) -> Result<DggsCoverage> {
        let band_count = self.source.schema().len();
        let bands = bands.unwrap_or(0..band_count);
        let schema = self.source.schema().select(bands.clone())?;

        let max_axis_cells = (self.config.max_cells as f64 * self.config.oversampling).ceil() as usize;
        let query_grid = to_grid_geometry(query, self.config.oversampling, max_axis_cells)?;
        let source_geometry = self.source.grid_geometry();
        let intersected = if source_geometry.is_defined() {
            smart_intersect(source_geometry, &query_grid, self.finder.as_ref())?
        } else {
            query_grid
        };
        let result = expand(
            &self.geometry,
            query,
            &intersected,
            self.default_level,
            self.config.max_cells,
            self.finder.as_ref(),
        )?;

        let cells = result.cell_count().unwrap_or(0);
        if cells > self.config.max_cells {
            return Err(CoverageError::TooManyCells {
                cells,
                limit: self.config.max_cells,
            });
        }

        let mut coverage = DggsCoverage::filled(
            self.name.clone(),
            result.clone(),
            schema,
            self.config.fill_value,
        )?
        .with_finder(Arc::clone(&self.finder));

        self.source.set_loading_strategy(LoadingStrategy::AtGetTileTime);
        let source = self.source.read(Some(&intersected), Some(bands))?;
        let crs = result.reference_system().coordinate_crs();

        let stats = if self.config.parallel {
            self.fill_parallel(&mut coverage, &result, &crs, source.as_ref())?
        } else {
            self.fill_sequential(&mut coverage, &result, &crs, source.as_ref())?
        };

        self.fallback.fetch_add(stats.fallback as u64, Ordering::Relaxed);
        if let Ok(mut last) = self.last_stats.lock() {
            *last = Some(stats);
        }
        debug!(
            name = %self.name,
            cells = stats.cells,
            written = stats.written,
            fallback = stats.fallback,
            "resampled coverage"
        );
        Ok(coverage)
    }

    fn evaluator<'a>(&self, source: &'a dyn SourceCoverage) -> Box<dyn SampleEvaluator + 'a> {
        let mut evaluator = source.evaluator();
        evaluator.set_null_if_outside(self.config.null_if_outside);
        evaluator.set_wraparound_enabled(self.config.wraparound);
        evaluator
    }

    fn fill_sequential(
        &self,
        coverage: &mut DggsCoverage,
        geometry: &GridGeometry,
        crs: &Arc<Crs>,
        source: &dyn SourceCoverage,
    ) -> Result<ResampleStats> {
        let mut evaluator = self.evaluator(source);
        let coder = self.dggs.create_coder();
        let mut stats = ResampleStats::default();

        let mut it = coverage.writable_iterator();
        while it.next() {
            stats.cells += 1;
            let position = it.position()?;
            match evaluate_cell(geometry, crs, coder.as_ref(), evaluator.as_mut(), &position)? {
                Some(samples) => {
                    it.set_samples(&samples)?;
                    stats.written += 1;
                }
                None => stats.fallback += 1,
            }
        }
        Ok(stats)
    }

    fn fill_parallel(
        &self,
        coverage: &mut DggsCoverage,
        geometry: &GridGeometry,
        crs: &Arc<Crs>,
        source: &dyn SourceCoverage,
    ) -> Result<ResampleStats> {
        let indexer = coverage.indexer();
        let outcomes: Vec<Result<Option<Vec<f64>>>> = (0..indexer.cell_count())
            .into_par_iter()
            .map_init(
                || (self.evaluator(source), self.dggs.create_coder()),
                |(evaluator, coder), linear| {
                    let position = indexer.position(linear);
                    evaluate_cell(geometry, crs, coder.as_ref(), evaluator.as_mut(), &position)
                },
            )
            .collect();

        let mut stats = ResampleStats::default();
        let mut it = coverage.writable_iterator();
        for outcome in outcomes {
            if !it.next() {
                break;
            }
            stats.cells += 1;
            match outcome? {
                Some(samples) => {
                    it.set_samples(&samples)?;
                    stats.written += 1;
                }
                None => stats.fallback += 1,
            }
        }
        Ok(stats)
    }
}

/// Source samples for one result cell, `None` when the source has none.
fn evaluate_cell(
    geometry: &GridGeometry,
    crs: &Arc<Crs>,
    coder: &dyn ZoneCoder,
    evaluator: &mut dyn SampleEvaluator,
    grid: &[i64],
) -> Result<Option<Vec<f64>>> {
    let address = geometry.to_address(grid)?;
    let mut coordinates = Vec::with_capacity(crs.dimension());
    for ordinate in address.ordinates() {
        match ordinate {
            Ordinate::Number(value) => coordinates.push(*value),
            Ordinate::Zone(zone) => {
                let (x, y) = coder.decode(zone)?.centroid();
                coordinates.extend([x, y]);
            }
        }
    }
    let position = DirectPosition::new(Arc::clone(crs), coordinates);
    match evaluator.evaluate(&position) {
        Ok(samples) => Ok(samples),
        Err(e) if e.is_evaluation_miss() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Mean cell size of the horizontal component at `index`, in DGGS base CRS units.
fn source_resolution(
    geometry: &GridGeometry,
    index: usize,
    dggs: &Arc<dyn DiscreteGlobalGrid>,
    finder: &dyn OperationFinder,
) -> Option<f64> {
    let slice = geometry.slice(index).ok()?;
    let resolution = slice.resolution()?;
    let envelope = slice.envelope()?;
    let crs = geometry.reference_system().component(index)?.coordinate_crs();
    let operation = finder.find_operation(&crs, &dggs.base_crs()).ok()?;
    let base = envelope.transform(operation.as_ref()).ok()?;

    let scaled: Vec<f64> = (0..resolution.len().min(base.dimension()))
        .filter(|&d| envelope.span(d) > 0.0)
        .map(|d| resolution[d] * base.span(d) / envelope.span(d))
        .collect();
    if scaled.is_empty() {
        return None;
    }
    Some(scaled.iter().sum::<f64>() / scaled.len() as f64)
}

impl GridCoverageResource for ResampledResource {
    fn grid_geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn schema(&self) -> &SampleSchema {
        self.source.schema()
    }

    fn read(
        &self,
        geometry: Option<&GridGeometry>,
        bands: Option<Range<usize>>,
    ) -> Result<Arc<dyn SourceCoverage>> {
        let coverage = match geometry {
            Some(query) => self.resample(query, bands)?,
            None => self.resample(&self.default_query()?, bands)?,
        };
        Ok(Arc::new(coverage))
    }
}

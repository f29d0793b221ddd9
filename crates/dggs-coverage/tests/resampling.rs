//! Resampling continuous grid coverages onto DGGS zones.

use std::io::Write;
use std::sync::Arc;

use dggs_coverage::{
    ArrayStorage, ContinuousTransform, CoverageError, DggsCoverage, GridCoverage,
    GridCoverageResource, GridExtent, GridGeometry, LoadingStrategy, MemoryResource, ResampleConfig,
    ResampledResource, SampleBuffer, SampleSchema,
};
use referencing::{DiscreteGlobalGrid, Envelope, ReferenceComponent, ReferenceSystem};
use test_utils::{
    assert_approx_eq, bbox, create_temperature_grid, create_test_grid, height, init_tracing,
    quad_grid, wgs84, zones,
};

/// 9 x 9 cells of 10 degrees over lon 0..90, lat 0..90, value `col * 1000 + row`.
fn north_east_source() -> Arc<MemoryResource> {
    let geometry = GridGeometry::continuous(
        &wgs84(),
        GridExtent::from_sizes(&[9, 9]).unwrap(),
        ContinuousTransform::scale_translate(&[10.0, -10.0], &[5.0, 85.0]).unwrap(),
    )
    .unwrap();
    let coverage = GridCoverage::from_values("north-east", geometry, create_test_grid(9, 9)).unwrap();
    Arc::new(MemoryResource::new(coverage))
}

/// 36 x 18 world grid with cell centres on whole tens of longitude.
fn world_geometry() -> GridGeometry {
    GridGeometry::continuous(
        &wgs84(),
        GridExtent::from_sizes(&[36, 18]).unwrap(),
        ContinuousTransform::scale_translate(&[10.0, -10.0], &[-180.0, 85.0]).unwrap(),
    )
    .unwrap()
}

fn sequential() -> ResampleConfig {
    ResampleConfig {
        parallel: false,
        ..Default::default()
    }
}

/// Every sample of every cell, in linear order.
fn all_samples(coverage: &DggsCoverage) -> Vec<Vec<f64>> {
    let mut it = coverage.iterator();
    let mut cells = Vec::new();
    while it.next() {
        let mut out = Vec::new();
        it.samples(&mut out).unwrap();
        cells.push(out);
    }
    cells
}

#[test]
fn test_cells_outside_source_keep_fill_value() {
    init_tracing();
    let dggs = quad_grid(2);
    let resource =
        ResampledResource::new("fill", Arc::clone(&dggs), north_east_source(), sequential()).unwrap();

    // Q10 and Q12 lie over the source, Q00 over the western Pacific.
    let query = GridGeometry::dggs(dggs, zones(&["Q10", "Q00", "Q12"])).unwrap();
    let coverage = resource.resample(&query, None).unwrap();
    let samples = all_samples(&coverage);

    // centroids (45, 67.5) and (45, 22.5)
    assert_eq!(samples[0], vec![4002.0]);
    assert!(samples[1][0].is_nan());
    assert_eq!(samples[2], vec![4006.0]);

    let stats = resource.last_stats().unwrap();
    assert_eq!((stats.cells, stats.written, stats.fallback), (3, 2, 1));
    assert_eq!(resource.fallback_cells(), 1);

    resource.resample(&query, None).unwrap();
    assert_eq!(resource.fallback_cells(), 2);
}

#[test]
fn test_source_is_switched_to_lazy_loading() {
    let source = north_east_source();
    assert_eq!(source.loading_strategy(), LoadingStrategy::AtReadTime);
    let dggs = quad_grid(2);
    let resource = ResampledResource::new(
        "lazy",
        Arc::clone(&dggs),
        Arc::clone(&source) as Arc<dyn GridCoverageResource>,
        sequential(),
    )
    .unwrap();

    let query = GridGeometry::dggs(dggs, zones(&["Q10"])).unwrap();
    let coverage = resource.resample(&query, None).unwrap();
    assert_eq!(source.loading_strategy(), LoadingStrategy::AtGetTileTime);
    // resident data reads the same under either strategy
    assert_eq!(all_samples(&coverage), vec![vec![4002.0]]);
}

#[test]
fn test_disjoint_query_reports_no_data() {
    let dggs = quad_grid(4);
    let resource =
        ResampledResource::new("disjoint", Arc::clone(&dggs), north_east_source(), sequential())
            .unwrap();

    let pacific = bbox::to_bbox(bbox::SOUTH_PACIFIC);
    let query = GridGeometry::from_envelope(
        ReferenceSystem::single(ReferenceComponent::Dggs(dggs)),
        pacific.to_envelope(),
        vec![10.0, 10.0],
    )
    .unwrap();

    assert!(matches!(
        resource.resample(&query, None),
        Err(CoverageError::NoData(_))
    ));
    assert!(matches!(
        resource.read(Some(&query), None),
        Err(CoverageError::NoData(_))
    ));
    assert!(resource.last_stats().is_none());
}

#[test]
fn test_parallel_matches_sequential() {
    let values = create_temperature_grid(36, 18);
    let source = || {
        let coverage = GridCoverage::from_values("t", world_geometry(), values.clone()).unwrap();
        Arc::new(MemoryResource::new(coverage))
    };
    let dggs = quad_grid(4);
    let parallel =
        ResampledResource::new("p", Arc::clone(&dggs), source(), ResampleConfig::default()).unwrap();
    let serial = ResampledResource::new("s", dggs, source(), sequential()).unwrap();

    let query = parallel.default_query().unwrap();
    let a = parallel.resample(&query, None).unwrap();
    let b = serial.resample(&query, None).unwrap();

    assert_eq!(a.cell_count(), 256);
    assert_eq!(a.zone_index().zones(), b.zone_index().zones());
    assert_eq!(all_samples(&a), all_samples(&b));
    assert_eq!(parallel.last_stats(), serial.last_stats());
}

#[test]
fn test_height_axis_is_carried_through() {
    // lon x lat x height, value = col * 1000 + row + level / 4
    let horizontal = world_geometry();
    let vertical = GridGeometry::continuous(
        &height(),
        GridExtent::from_sizes(&[3]).unwrap(),
        ContinuousTransform::scale_translate(&[100.0], &[0.0]).unwrap(),
    )
    .unwrap();
    let geometry = GridGeometry::concat(&[horizontal, vertical]).unwrap();
    let mut values = Vec::with_capacity(36 * 18 * 3);
    for col in 0..36 {
        for row in 0..18 {
            for level in 0..3 {
                values.push((col * 1000 + row) as f64 + level as f64 * 0.25);
            }
        }
    }
    let source = Arc::new(MemoryResource::new(
        GridCoverage::from_values("3d", geometry, values).unwrap(),
    ));

    let dggs = quad_grid(2);
    let resource = ResampledResource::new("3d", Arc::clone(&dggs), source, sequential()).unwrap();
    let template = resource.grid_geometry().reference_system();
    assert_eq!(template.components().len(), 2);
    assert!(template.components()[0].is_dggs());

    let query = GridGeometry::concat(&[
        GridGeometry::dggs(dggs, zones(&["Q0", "Q3"])).unwrap(),
        GridGeometry::continuous(
            &height(),
            GridExtent::from_sizes(&[2]).unwrap(),
            ContinuousTransform::scale_translate(&[100.0], &[0.0]).unwrap(),
        )
        .unwrap(),
    ])
    .unwrap();
    let coverage = resource.resample(&query, None).unwrap();
    assert_eq!(coverage.cell_count(), 4);

    let mut it = coverage.iterator();
    it.move_to(&[0, 0]).unwrap();
    // Q0 centroid (-90, 45): column 9, row 4
    assert_eq!(it.sample(0).unwrap(), 9004.0);
    it.move_to(&[1, 1]).unwrap();
    // Q3 centroid (90, -45) at 100 m: column 27, row 13, level 1
    assert_eq!(it.sample(0).unwrap(), 27013.25);
}

#[test]
fn test_band_subset() {
    let cells = 36 * 18;
    let schema = SampleSchema::floats(2);
    let storage = ArrayStorage::new(
        &schema,
        vec![
            SampleBuffer::F64(vec![1.0; cells]),
            SampleBuffer::F64(vec![2.0; cells]),
        ],
        cells,
    )
    .unwrap();
    let coverage = GridCoverage::new("two-bands", world_geometry(), schema, storage).unwrap();
    let dggs = quad_grid(1);
    let resource = ResampledResource::new(
        "bands",
        Arc::clone(&dggs),
        Arc::new(MemoryResource::new(coverage)),
        ResampleConfig::default(),
    )
    .unwrap();

    let query = GridGeometry::dggs(dggs, zones(&["Q0", "Q1"])).unwrap();
    let second = resource.resample(&query, Some(1..2)).unwrap();
    assert_eq!(second.schema().len(), 1);
    assert_eq!(all_samples(&second), vec![vec![2.0], vec![2.0]]);

    assert!(matches!(
        resource.resample(&query, Some(1..3)),
        Err(CoverageError::BandOutOfRange { .. })
    ));
}

#[test]
fn test_query_resolution_selects_level() {
    let dggs = quad_grid(5);
    let resource =
        ResampledResource::new("levels", Arc::clone(&dggs), north_east_source(), sequential())
            .unwrap();

    let query = GridGeometry::from_envelope(
        ReferenceSystem::single(ReferenceComponent::Dggs(Arc::clone(&dggs))),
        Envelope::new(vec![0.0, 0.0], vec![90.0, 90.0]).unwrap(),
        vec![45.0, 45.0],
    )
    .unwrap();
    let coverage = resource.resample(&query, None).unwrap();

    // level 3 zones are 45 x 22.5: 2 columns x 4 rows
    assert_eq!(coverage.cell_count(), 8);
    let coder = dggs.create_coder();
    for zone in coverage.zone_index().zones() {
        assert_eq!(coder.decode(zone).unwrap().level, 3);
    }
    assert_eq!(resource.last_stats().unwrap().fallback, 0);
}

#[test]
fn test_fill_value_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "parallel": false, "fill_value": -9999.0 }}"#).unwrap();
    let config = ResampleConfig::from_json_file(file.path()).unwrap();

    let dggs = quad_grid(2);
    let resource = ResampledResource::new("cfg", Arc::clone(&dggs), north_east_source(), config).unwrap();
    assert!(!resource.config().parallel);

    // Q10 overlaps the source, Q00 does not
    let query = GridGeometry::dggs(dggs, zones(&["Q10", "Q00"])).unwrap();
    let coverage = resource.resample(&query, None).unwrap();
    let mut it = coverage.iterator();
    it.move_to(&[0]).unwrap();
    assert_eq!(it.sample(0).unwrap(), 4002.0);
    it.move_to(&[1]).unwrap();
    assert_approx_eq!(it.sample(0).unwrap(), -9999.0, 1e-9);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ResampleConfig {
        oversampling: -1.0,
        ..Default::default()
    };
    assert!(matches!(
        ResampledResource::new("bad", quad_grid(2), north_east_source(), config),
        Err(CoverageError::Config(_))
    ));
}

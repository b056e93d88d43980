//! Benchmarks for neighbor search, local fits, smoothing and full runs.
//!
//! Run with: cargo bench --package atm-interpolation --bench interpolation_benchmarks

use atm_interpolation::{
    fit_local_model, interpolate, InterpolationConfig, NullSink, ReferenceGrid, Smoother,
    SpatialIndex,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use envi_raster::GridSource;
use test_utils::{create_scattered_locations, SceneBuilder, NODATA};

/// Reference grid of `n` scattered pixels with two smooth bands.
fn scattered_reference(n: usize) -> ReferenceGrid {
    let locations = create_scattered_locations(n, (34.0, 34.05), (-118.1, -118.0), 7);
    let state = locations
        .iter()
        .map(|l| {
            vec![
                0.1 + (l[0] - 34.0) * 2.0,
                1.5 + (l[1] + 118.0) * 3.0 + l[2] * 1e-4,
            ]
        })
        .collect();
    ReferenceGrid::new(&locations, state, vec!["AOT550".into(), "H2OSTR".into()])
        .expect("valid reference")
}

// =============================================================================
// SPATIAL INDEX BENCHMARKS
// =============================================================================

fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_build");

    for n in [1_000, 10_000, 100_000] {
        let reference = scattered_reference(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("points", n), &reference, |b, reference| {
            b.iter(|| SpatialIndex::from_reference(black_box(reference)));
        });
    }

    group.finish();
}

fn bench_index_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_query");

    let reference = scattered_reference(50_000);
    let index = SpatialIndex::from_reference(&reference);
    let query = reference.location(reference.len() / 2).as_array();

    for k in [10, 100, 400, 1000] {
        group.bench_with_input(BenchmarkId::new("k", k), &k, |b, &k| {
            b.iter(|| index.query(black_box(&query), k));
        });
    }

    group.finish();
}

// =============================================================================
// REGRESSION BENCHMARKS
// =============================================================================

fn bench_fit_local_model(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_local_model");

    let reference = scattered_reference(20_000);
    let index = SpatialIndex::from_reference(&reference);
    let query = reference.location(0).as_array();

    for k in [50, 400] {
        let neighbors = index.query(&query, k);
        group.throughput(Throughput::Elements(k as u64));
        group.bench_with_input(BenchmarkId::new("neighbors", k), &neighbors.ids, |b, ids| {
            b.iter(|| fit_local_model(black_box(&reference), black_box(ids), -5.0));
        });
    }

    group.finish();
}

// =============================================================================
// SMOOTHING BENCHMARKS
// =============================================================================

fn bench_smooth_band(c: &mut Criterion) {
    let mut group = c.benchmark_group("smooth_band");

    let (lines, samples) = (256, 256);
    let band: Vec<f64> = (0..lines * samples)
        .map(|i| if i % 97 == 0 { NODATA } else { (i % samples) as f64 * 0.01 })
        .collect();
    group.throughput(Throughput::Elements((lines * samples) as u64));

    for sigma in [1.0, 2.0, 4.0] {
        let smoother = Smoother::new(sigma, NODATA);
        group.bench_with_input(BenchmarkId::new("sigma", sigma), &band, |b, band| {
            b.iter(|| {
                let mut values = band.clone();
                smoother.smooth_band(black_box(&mut values), lines, samples)
            });
        });
    }

    group.finish();
}

// =============================================================================
// FULL PIPELINE BENCHMARKS
// =============================================================================

fn bench_interpolate(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate");
    group.sample_size(10);

    let scene = SceneBuilder::new()
        .reference_shape(40, 40)
        .target_shape(200, 150)
        .build();
    let segmented = SceneBuilder::new()
        .reference_shape(40, 40)
        .target_shape(200, 150)
        .segments(50)
        .build();
    group.throughput(Throughput::Elements(200 * 150));

    for workers in [1, 4] {
        let config = InterpolationConfig {
            nneighbors: 100,
            n_workers: Some(workers),
            smoothing_sigma: 0.0,
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::new("per_pixel", workers), &config, |b, config| {
            b.iter(|| {
                interpolate(
                    &scene.reference_state,
                    &scene.reference_locations,
                    &scene.input_locations,
                    None,
                    config,
                    &NullSink,
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("segmented", workers), &config, |b, config| {
            b.iter(|| {
                interpolate(
                    &segmented.reference_state,
                    &segmented.reference_locations,
                    &segmented.input_locations,
                    segmented.segmentation.as_ref().map(|s| s as &dyn GridSource),
                    config,
                    &NullSink,
                )
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_index_build,
    bench_index_query,
    bench_fit_local_model,
    bench_smooth_band,
    bench_interpolate,
);
criterion_main!(benches);

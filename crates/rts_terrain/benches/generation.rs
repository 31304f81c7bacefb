//! Generation benchmarks for rts_terrain.
//!
//! Run with: `cargo bench -p rts_terrain`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rts_terrain::prelude::*;

fn bench_spec(size: u32) -> MapSpec {
    MapSpec::new(74219, size)
        .with_biome("plains", 3.0)
        .with_biome("forest", 2.0)
        .with_biome("crater", 1.0)
        .with_counts(8, 4, 2)
        .with_anomaly(AnomalyDef::new(AnomalyKind::Storm, Frequency::Medium, 45))
}

/// Spec-driven generation at increasing grid sizes.
pub fn generation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_from_spec");
    for size in [64u32, 256, 512] {
        let spec = bench_spec(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &spec, |b, spec| {
            b.iter(|| TerrainEngine::generate_from_spec(black_box(spec)));
        });
    }
    group.finish();

    c.bench_function("synthesize_medium", |b| {
        b.iter(|| generate_map(black_box(MapConfig::medium().with_seed(42))));
    });
}

/// Per-tick anomaly advance and route planning on a live engine.
pub fn query_benchmark(c: &mut Criterion) {
    let mut engine = TerrainEngine::generate_from_spec(&bench_spec(256));
    let mut t = 0u32;
    c.bench_function("advance_tick", |b| {
        b.iter(|| {
            t += 1;
            engine.advance(Fixed::from_num(t) / Fixed::from_num(20));
        });
    });

    let engine = TerrainEngine::generate_from_spec(&bench_spec(256));
    let evaluator = TerrainEvaluator::new(&engine);
    c.bench_function("plan_flank_routes", |b| {
        b.iter(|| {
            evaluator.plan_flank_routes(
                black_box(TilePos::new(20, 128)),
                black_box(TilePos::new(230, 128)),
                true,
            )
        });
    });
}

criterion_group!(benches, generation_benchmark, query_benchmark);
criterion_main!(benches);

//! Test fixtures and helpers.
//!
//! Pre-built map specs and engines for consistent testing.

use rts_terrain::anomaly::{AnomalyKind, Frequency};
use rts_terrain::engine::TerrainEngine;
use rts_terrain::map_spec::{AnomalyDef, MapSpec, SpecialFeatureSpec};
use rts_terrain::tile::{TerrainFeature, TilePos};

/// A 32x32 map with a mixed biome table and a few of every stamp.
#[must_use]
pub fn small_spec(seed: u64) -> MapSpec {
    MapSpec::new(seed, 32)
        .with_biome("plains", 3.0)
        .with_biome("forest", 2.0)
        .with_biome("swamp", 1.0)
        .with_biome("crater", 0.5)
        .with_counts(4, 2, 1)
}

/// The 32x32 [`small_spec`] map with one anomaly of every frequency class.
#[must_use]
pub fn anomaly_spec(seed: u64) -> MapSpec {
    small_spec(seed)
        .with_anomaly(AnomalyDef::new(AnomalyKind::LavaVent, Frequency::Short, 20).at(10, 10))
        .with_anomaly(AnomalyDef::new(AnomalyKind::Storm, Frequency::Medium, 45).at(30, 12))
        .with_anomaly(AnomalyDef::new(AnomalyKind::ResourceFlux, Frequency::Long, 60).at(24, 24))
        .with_anomaly(AnomalyDef::new(AnomalyKind::SensorJamming, Frequency::Continuous, 0))
}

/// The parallel-bridges acceptance scenario on a 1024 map.
#[must_use]
pub fn parallel_bridges_spec() -> MapSpec {
    MapSpec::new(74219, 1024)
        .with_counts(0, 2, 0)
        .with_feature(
            SpecialFeatureSpec::new("parallel_bridges")
                .coordinate("bridge_wide", 512, 256)
                .coordinate("bridge_narrow", 512, 768)
                .property("width_wide", 3.0)
                .property("width_narrow", 1.0)
                .property("defense_bonus", 0.7),
        )
}

/// Generate an engine from a spec.
#[must_use]
pub fn engine_from(spec: &MapSpec) -> TerrainEngine {
    TerrainEngine::generate_from_spec(spec)
}

/// Positions of every tile carrying `feature`.
#[must_use]
pub fn tiles_with(engine: &TerrainEngine, feature: TerrainFeature) -> Vec<TilePos> {
    engine
        .tiles()
        .iter()
        .filter(|t| t.has_feature(feature))
        .map(|t| t.pos)
        .collect()
}

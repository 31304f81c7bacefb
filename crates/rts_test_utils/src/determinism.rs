//! Determinism testing utilities.
//!
//! Provides a harness for verifying that terrain generation and anomaly
//! scheduling produce identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Terrain must be 100% deterministic for lockstep multiplayer and replays.
//! Sources of non-determinism include:
//!
//! - **Unseeded randomness**: every draw goes through
//!   [`rts_terrain::rng::DeterministicRng`], seeded from the map spec.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Registries are `BTreeMap`s keyed by tile position.
//!
//! - **Call-count dependence**: anomaly phases must depend only on the game
//!   time passed to `advance`, not on how often it was called.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual passes (biomes, stamping, anomalies)
//! 2. **Property tests**: random specs must still generate deterministically
//! 3. **Integration tests**: full scenarios are reproducible
//! 4. **Parallel tests**: N engines generated on N threads all match

use std::thread;

use rts_terrain::engine::TerrainEngine;
use rts_terrain::map_spec::MapSpec;
use rts_terrain::math::GameTime;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic runs).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that all runs were deterministic.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Terrain is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a stateful process multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of ticks per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```ignore
/// use rts_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     100, // 100 ticks each
///     || TerrainEngine::generate_from_spec(&spec),
///     |engine| tick(engine, seconds(1.0)),
///     TerrainEngine::state_hash,
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Advance an engine's clock by `dt`.
pub fn tick(engine: &mut TerrainEngine, dt: GameTime) {
    let next = engine.game_time() + dt;
    engine.advance(next);
}

/// Generate from `spec` twice, tick both, and compare final hashes.
#[must_use]
pub fn verify_engine_determinism(spec: &MapSpec, ticks: u64, dt: GameTime) -> bool {
    verify_determinism(
        2,
        ticks,
        || TerrainEngine::generate_from_spec(spec),
        |engine| tick(engine, dt),
        TerrainEngine::state_hash,
    )
    .is_deterministic
}

/// Generate and tick `num_engines` engines on scoped threads.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
#[must_use]
pub fn run_parallel_engines(spec: &MapSpec, num_engines: usize, ticks: u64, dt: GameTime) -> DeterminismResult {
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_engines)
            .map(|_| {
                s.spawn(|| {
                    let mut engine = TerrainEngine::generate_from_spec(spec);
                    for _ in 0..ticks {
                        tick(&mut engine, dt);
                    }
                    engine.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("engine thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Compare two engines tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the engines stay identical, `Some(tick)` if they diverge at
/// that tick (0 means generation itself differed).
#[must_use]
pub fn find_first_divergence(spec: &MapSpec, ticks: u64, dt: GameTime) -> Option<u64> {
    let mut a = TerrainEngine::generate_from_spec(spec);
    let mut b = TerrainEngine::generate_from_spec(spec);

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for t in 1..=ticks {
        tick(&mut a, dt);
        tick(&mut b, dt);

        if a.state_hash() != b.state_hash() {
            tracing::debug!(tick = t, "Engines diverged");
            return Some(t);
        }
    }

    None
}

/// Verify that a snapshot round-trip preserves engine state exactly.
///
/// This is critical for save/load and network synchronization.
#[must_use]
pub fn verify_snapshot_determinism(spec: &MapSpec, ticks: u64, dt: GameTime) -> bool {
    let mut engine = TerrainEngine::generate_from_spec(spec);

    for _ in 0..ticks {
        tick(&mut engine, dt);
    }

    let hash_before = engine.state_hash();

    let Ok(bytes) = engine.serialize() else {
        return false;
    };
    let Ok(restored) = TerrainEngine::deserialize(&bytes) else {
        return false;
    };

    hash_before == restored.state_hash()
}

/// Sample the active-anomaly set at each time in `times`.
///
/// Useful for comparing schedules driven by different call patterns.
#[must_use]
pub fn active_set_trace(engine: &mut TerrainEngine, times: &[GameTime]) -> Vec<Vec<u32>> {
    times
        .iter()
        .map(|&t| {
            engine.advance(t);
            engine.active_anomalies().map(|a| a.id.0).collect()
        })
        .collect()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of terrain determinism.
pub mod strategies {
    use proptest::prelude::*;
    use rts_terrain::anomaly::{AnomalyKind, Frequency};
    use rts_terrain::map_generation::{MapConfig, TerrainPersonality};
    use rts_terrain::map_spec::{AnomalyDef, MapSpec};
    use rts_terrain::math::{Fixed, GameTime};
    use rts_terrain::tile::{Biome, TilePos};

    /// Generate a biome.
    pub fn arb_biome() -> impl Strategy<Value = Biome> {
        proptest::sample::select(Biome::ALL.to_vec())
    }

    /// Generate an anomaly kind.
    pub fn arb_anomaly_kind() -> impl Strategy<Value = AnomalyKind> {
        prop_oneof![
            Just(AnomalyKind::LavaVent),
            Just(AnomalyKind::Storm),
            Just(AnomalyKind::SensorJamming),
            Just(AnomalyKind::QuantumFracture),
            Just(AnomalyKind::ResourceFlux),
        ]
    }

    /// Generate a frequency class.
    pub fn arb_frequency() -> impl Strategy<Value = Frequency> {
        prop_oneof![
            Just(Frequency::Short),
            Just(Frequency::Medium),
            Just(Frequency::Long),
            Just(Frequency::Continuous),
        ]
    }

    /// Generate an anomaly definition (duration 1-120 s).
    pub fn arb_anomaly_def() -> impl Strategy<Value = AnomalyDef> {
        (arb_anomaly_kind(), arb_frequency(), 1i32..120)
            .prop_map(|(kind, frequency, duration)| AnomalyDef::new(kind, frequency, duration))
    }

    /// Generate a small map spec (8-48 tiles square).
    pub fn arb_map_spec() -> impl Strategy<Value = MapSpec> {
        (
            any::<u64>(),
            8u32..48,
            proptest::collection::vec((arb_biome(), 0.0f32..5.0), 0..5),
            (0u32..6, 0u32..5, 0u32..4),
            proptest::collection::vec(arb_anomaly_def(), 0..4),
        )
            .prop_map(|(seed, size, biomes, (clusters, chokepoints, objectives), anomalies)| {
                let mut spec = MapSpec::new(seed, size).with_counts(clusters, chokepoints, objectives);
                for (biome, weight) in biomes {
                    spec = spec.with_biome(biome.name(), weight);
                }
                for anomaly in anomalies {
                    spec = spec.with_anomaly(anomaly);
                }
                spec
            })
    }

    /// Generate a tile position inside a `size`-square map.
    pub fn arb_tile_pos(size: i32) -> impl Strategy<Value = TilePos> {
        (0..size, 0..size).prop_map(|(x, y)| TilePos::new(x, y))
    }

    /// Generate a non-decreasing sequence of game times (0.5 s resolution).
    pub fn arb_time_sequence(max_len: usize) -> impl Strategy<Value = Vec<GameTime>> {
        proptest::collection::vec(0u32..40, 1..max_len).prop_map(|steps| {
            let mut t = Fixed::ZERO;
            steps
                .into_iter()
                .map(|half_secs| {
                    t += Fixed::from_num(half_secs) / Fixed::from_num(2);
                    t
                })
                .collect()
        })
    }

    /// Generate a synthesizer config for a small map.
    pub fn arb_map_config() -> impl Strategy<Value = MapConfig> {
        (
            any::<u64>(),
            16u32..64,
            proptest::option::of(proptest::sample::select(TerrainPersonality::ALL.to_vec())),
        )
            .prop_map(|(seed, size, personality)| MapConfig {
                width: size,
                height: size,
                seed,
                personality,
                ..MapConfig::default()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{anomaly_spec, small_spec};
    use proptest::prelude::*;
    use rts_terrain::anomaly::{AnomalyKind, Frequency};
    use rts_terrain::map_generation::generate_map;
    use rts_terrain::map_spec::AnomalyDef;
    use rts_terrain::math::{seconds, Fixed};

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_detects_nondeterminism() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    fn test_empty_spec_determinism() {
        assert!(verify_engine_determinism(&MapSpec::new(0, 16), 10, seconds(1.0)));
    }

    #[test]
    fn test_anomaly_spec_determinism() {
        assert!(verify_engine_determinism(&anomaly_spec(99), 300, seconds(1.0)));
    }

    #[test]
    fn test_find_divergence_on_deterministic_engine() {
        assert!(find_first_divergence(&anomaly_spec(5), 200, seconds(0.5)).is_none());
    }

    #[test]
    fn test_parallel_engines() {
        run_parallel_engines(&small_spec(42), 4, 50, seconds(1.0)).assert_deterministic();
    }

    // =========================================================================
    // Snapshot round-trip tests
    // =========================================================================

    #[test]
    fn test_snapshot_preserves_fresh_engine() {
        assert!(verify_snapshot_determinism(&small_spec(1), 0, seconds(1.0)));
    }

    #[test]
    fn test_snapshot_preserves_mid_cycle_anomalies() {
        assert!(verify_snapshot_determinism(&anomaly_spec(3), 77, seconds(1.0)));
    }

    // =========================================================================
    // Anomaly schedule purity
    // =========================================================================

    #[test]
    fn test_extra_calls_do_not_change_schedule() {
        let spec = MapSpec::new(8, 16)
            .with_anomaly(AnomalyDef::new(AnomalyKind::Storm, Frequency::Short, 20).at(8, 8));
        let samples: Vec<GameTime> = (0..40).map(|i| Fixed::from_num(i * 5)).collect();

        let mut sparse = TerrainEngine::generate_from_spec(&spec);
        let sparse_trace = active_set_trace(&mut sparse, &samples);

        let mut dense = TerrainEngine::generate_from_spec(&spec);
        let mut dense_trace = Vec::new();
        for &t in &samples {
            // Interleave extra calls between samples.
            for k in 1..4 {
                let before = t - Fixed::from_num(k) / Fixed::from_num(4);
                if before >= dense.game_time() {
                    dense.advance(before);
                }
            }
            dense.advance(t);
            dense_trace.push(dense.active_anomalies().map(|a| a.id.0).collect::<Vec<_>>());
        }

        assert_eq!(sparse_trace, dense_trace);
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_random_specs_are_deterministic(spec in strategies::arb_map_spec()) {
            let a = TerrainEngine::generate_from_spec(&spec);
            let b = TerrainEngine::generate_from_spec(&spec);
            prop_assert_eq!(a.state_hash(), b.state_hash());
        }

        #[test]
        fn prop_time_sequences_are_replayable(
            spec in strategies::arb_map_spec(),
            times in strategies::arb_time_sequence(50),
        ) {
            let mut a = TerrainEngine::generate_from_spec(&spec);
            let mut b = TerrainEngine::generate_from_spec(&spec);
            prop_assert_eq!(active_set_trace(&mut a, &times), active_set_trace(&mut b, &times));
        }

        #[test]
        fn prop_tiles_are_stored_at_their_position(
            spec in strategies::arb_map_spec(),
            pos in strategies::arb_tile_pos(8),
        ) {
            // Every generated map is at least 8 tiles square.
            let engine = TerrainEngine::generate_from_spec(&spec);
            let tile = engine.tile_at(pos);
            prop_assert!(tile.is_some());
            prop_assert_eq!(tile.map(|t| t.pos), Some(pos));
        }

        #[test]
        fn prop_synthesis_is_deterministic_and_dna_in_range(config in strategies::arb_map_config()) {
            let a = generate_map(config.clone());
            let b = generate_map(config.clone());
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.tiles.len(), (config.width * config.height) as usize);
            if let Some(personality) = config.personality {
                prop_assert_eq!(a.personality, personality);
            }
            for value in [a.dna.openness, a.dna.defensiveness, a.dna.economic_value, a.dna.complexity] {
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }

        #[test]
        fn prop_snapshot_roundtrip_is_exact(spec in strategies::arb_map_spec(), ticks in 0u64..50) {
            prop_assert!(verify_snapshot_determinism(&spec, ticks, seconds(1.0)));
        }
    }
}

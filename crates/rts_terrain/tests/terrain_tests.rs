//! End-to-end tests for rts_terrain.
//!
//! These exercise the public API the way the simulation, AI and tools
//! crates use it: generate from a spec, advance time, query.

use rts_terrain::prelude::*;
use rts_test_utils::fixtures::{anomaly_spec, engine_from, parallel_bridges_spec, small_spec, tiles_with};

// =============================================================================
// Acceptance scenario
// =============================================================================

mod scenario {
    use super::*;

    #[test]
    fn test_parallel_bridges_scenario() {
        let engine = engine_from(&parallel_bridges_spec());
        assert_eq!(engine.width(), 1024);
        assert_eq!(engine.height(), 1024);

        let wide = engine.tile(512, 256).expect("wide bridge tile");
        assert_eq!(wide.feature, Some(TerrainFeature::Bridge));
        assert!((wide.defense_bonus - 0.7).abs() < 1e-6);
        assert!((wide.movement_modifier - 1.2).abs() < 1e-6);
        assert!(wide.passable);

        let narrow = engine.tile(512, 768).expect("narrow bridge tile");
        assert_eq!(narrow.feature, Some(TerrainFeature::Bridge));
        assert!((narrow.defense_bonus - 0.7).abs() < 1e-6);
        assert!((narrow.movement_modifier - 1.2).abs() < 1e-6);

        // The wide crossing is three rows thick, the narrow one a single row.
        for y in [255, 257] {
            assert!(engine.tile(512, y).is_some_and(|t| t.has_feature(TerrainFeature::Bridge)));
        }
        for y in [767, 769] {
            assert!(!engine.tile(512, y).is_some_and(|t| t.has_feature(TerrainFeature::Bridge)));
        }

        assert_eq!(engine.landmark("bridge_wide"), Some(TilePos::new(512, 256)));
        assert_eq!(engine.landmark("bridge_narrow"), Some(TilePos::new(512, 768)));
        assert_eq!(engine.chokepoints().len(), 2);
    }
}

// =============================================================================
// Generation invariants
// =============================================================================

mod generation {
    use super::*;

    #[test]
    fn test_full_coverage() {
        let spec = small_spec(7);
        let engine = engine_from(&spec);
        let (w, h) = (engine.width() as i32, engine.height() as i32);
        assert_eq!(engine.tiles().len(), (w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let tile = engine.tile(x, y).expect("covered");
                assert_eq!(tile.pos, TilePos::new(x, y));
            }
        }
        assert!(engine.tile(w, 0).is_none());
        assert!(engine.tile(0, -1).is_none());
    }

    #[test]
    fn test_degenerate_spec_still_covers_grid() {
        let engine = engine_from(&MapSpec::new(3, 12).with_counts(0, 0, 0));
        assert_eq!(engine.tiles().len(), 144);
        assert!(engine.tiles().iter().all(|t| t.biome == Biome::default()));
    }

    #[test]
    fn test_same_seed_bitwise_identical() {
        let spec = anomaly_spec(1234);
        let a = engine_from(&spec);
        let b = engine_from(&spec);
        assert_eq!(a, b);
        assert_eq!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_different_seed_differs() {
        assert_ne!(
            engine_from(&small_spec(1)).state_hash(),
            engine_from(&small_spec(2)).state_hash()
        );
    }

    #[test]
    fn test_requested_stamps_present() {
        let engine = engine_from(&small_spec(11));
        assert_eq!(engine.chokepoints().len(), 2);
        assert_eq!(engine.high_ground().len(), 1);
        assert!(!tiles_with(&engine, TerrainFeature::Objective).is_empty());
    }
}

// =============================================================================
// Anomaly scheduling
// =============================================================================

mod anomalies {
    use super::*;

    fn spec_with(frequency: Frequency, duration: i32) -> MapSpec {
        MapSpec::new(5, 16).with_anomaly(AnomalyDef::new(AnomalyKind::Storm, frequency, duration).at(8, 8))
    }

    #[test]
    fn test_continuous_always_active() {
        let mut engine = engine_from(&spec_with(Frequency::Continuous, 10));
        for step in 0..200 {
            engine.advance(Fixed::from_num(step));
            assert_eq!(engine.active_anomalies().count(), 1, "inactive at {step}s");
        }
    }

    #[test]
    fn test_bounded_windows_never_exceed_duration() {
        let mut engine = engine_from(&spec_with(Frequency::Short, 20));
        let mut run_start: Option<f32> = None;
        let mut runs = 0;
        for half in 0..1000 {
            let t = half as f32 / 2.0;
            engine.advance(seconds(t));
            let active = engine.active_anomalies().count() == 1;
            match (active, run_start) {
                (true, None) => run_start = Some(t),
                (true, Some(start)) => assert!(t - start < 20.0, "window longer than duration at {t}"),
                (false, Some(_)) => {
                    run_start = None;
                    runs += 1;
                }
                (false, None) => {}
            }
        }
        assert!(runs >= 5, "expected repeated windows, saw {runs}");
    }

    #[test]
    fn test_state_depends_only_on_time() {
        let spec = anomaly_spec(77);
        let mut direct = engine_from(&spec);
        let mut stepped = engine_from(&spec);

        for i in 0..=400 {
            stepped.advance(seconds(i as f32 * 0.25));
        }
        direct.advance(Fixed::ZERO);
        direct.advance(seconds(100.0));

        let ids = |e: &TerrainEngine| e.active_anomalies().map(|a| a.id).collect::<Vec<_>>();
        assert_eq!(ids(&direct), ids(&stepped));
        assert_eq!(direct.state_hash(), stepped.state_hash());
    }

    #[test]
    fn test_repeated_advance_is_idempotent() {
        let mut engine = engine_from(&anomaly_spec(9));
        engine.advance(Fixed::ZERO);
        engine.advance(seconds(33.0));
        let once = engine.state_hash();
        engine.advance(seconds(33.0));
        engine.advance(seconds(33.0));
        assert_eq!(engine.state_hash(), once);
    }
}

// =============================================================================
// Scoring and evaluation
// =============================================================================

mod evaluation {
    use super::*;

    fn score(engine: &TerrainEngine, pos: TilePos) -> f32 {
        engine.evaluate_tile_for_ai(engine.tile_at(pos).expect("tile"))
    }

    #[test]
    fn test_scoring_monotonicity() {
        let mut engine = TerrainEngine::blank(8, 8);
        let pos = TilePos::new(4, 4);
        let mut last = score(&engine, pos);

        let steps: [fn(&mut Tile); 6] = [
            |t| t.resource = Some(ResourceType::Minerals),
            |t| t.elevation += 10.0,
            |t| t.defense_bonus += 0.2,
            |t| t.feature = Some(TerrainFeature::HighGround),
            |t| t.feature = Some(TerrainFeature::Chokepoint),
            |t| t.feature = Some(TerrainFeature::Objective),
        ];
        for step in steps {
            step(engine.tile_at_mut(pos).expect("tile"));
            let next = score(&engine, pos);
            assert!(next > last, "{next} should exceed {last}");
            last = next;
        }
    }

    #[test]
    fn test_route_count_bounds() {
        let engine = engine_from(&small_spec(3));
        let evaluator = TerrainEvaluator::new(&engine);
        for (from, to) in [((0, 0), (31, 31)), ((5, 20), (25, 2)), ((16, 16), (16, 16))] {
            let routes = evaluator.plan_flank_routes(TilePos::from(from), TilePos::from(to), true);
            assert!((1..=5).contains(&routes.len()));
            assert_eq!(routes[0].waypoints.len(), 2);
            assert!(routes.iter().all(|r| (0.0..=1.0).contains(&r.risk)));
        }
    }

    #[test]
    fn test_contest_gating_follows_active_flag() {
        let spec = MapSpec::new(2, 16).with_anomaly(
            AnomalyDef::new(AnomalyKind::ResourceFlux, Frequency::Short, 10).at(8, 8),
        );
        let mut engine = engine_from(&spec);
        engine.advance(Fixed::ZERO);
        engine.advance(seconds(15.0));

        let anomaly = engine.anomalies()[0].clone();
        assert!(!anomaly.active);
        let evaluator = TerrainEvaluator::new(&engine);
        for resources in [0, 500, 1_000_000] {
            assert!(!evaluator.should_contest_dynamic_tile(&anomaly, seconds(15.0), resources).contest);
        }
    }

    #[test]
    fn test_active_resource_flux_worth_contesting() {
        let spec = MapSpec::new(2, 16).with_anomaly(
            AnomalyDef::new(AnomalyKind::ResourceFlux, Frequency::Long, 40).at(8, 8),
        );
        let mut engine = engine_from(&spec);
        engine.advance(seconds(5.0));
        let evaluator = TerrainEvaluator::new(&engine);
        let decision = evaluator.should_contest_dynamic_tile(&engine.anomalies()[0], seconds(5.0), 0);
        assert!(decision.contest);
        // 40 s window, so under a minute left.
        assert_eq!(decision.urgency, Urgency::High);

        // Scores pick up the flux multiplier inside the radius.
        let inside = evaluator.evaluate_tile(TilePos::new(8, 8), None).expect("tile");
        assert!(inside.reasons.iter().any(|r| r.reason.contains("multiplier")));
    }
}

// =============================================================================
// Tech gate
// =============================================================================

mod tech {
    use super::*;

    #[test]
    fn test_chokepoint_tech_unlocks_after_holding() {
        let engine = engine_from(&small_spec(21));
        let pos = tiles_with(&engine, TerrainFeature::Chokepoint)[0];
        let mut gate = TerrainTechGate::new();
        gate.register_tile_control(pos, 1, seconds(30.0));

        let early = gate.is_tech_available("fortified_positions", 1, seconds(149.5), &engine);
        assert!(!early.available);
        assert!(early.reason.is_some());
        assert!(gate.is_tech_available("fortified_positions", 1, seconds(150.0), &engine).available);

        gate.remove_tile_control(pos);
        assert!(!gate.is_tech_available("fortified_positions", 1, seconds(500.0), &engine).available);
    }

    #[test]
    fn test_fortify_round_trip_restores_hash() {
        let mut engine = engine_from(&small_spec(21));
        let pos = tiles_with(&engine, TerrainFeature::Chokepoint)
            .into_iter()
            .find(|p| engine.tile_at(*p).is_some_and(|t| t.defense_bonus < 0.75))
            .expect("unsaturated chokepoint tile");
        let before = engine.state_hash();
        let mut gate = TerrainTechGate::new();

        gate.apply_effect(&mut engine, pos, TerrainEffect::Fortify, Fixed::ZERO)
            .expect("fortify chokepoint");
        assert_ne!(engine.state_hash(), before);

        gate.revert_effect(&mut engine, pos).expect("revert");
        assert_eq!(engine.state_hash(), before);
    }
}

// =============================================================================
// Procedural synthesis
// =============================================================================

mod synthesis {
    use super::*;

    #[test]
    fn test_presets_generate_full_grids() {
        for config in [MapConfig::small(), MapConfig::medium(), MapConfig::large()] {
            let (w, h) = (config.width, config.height);
            let map = generate_map(config);
            assert_eq!(map.tiles.len(), (w * h) as usize);
        }
    }

    #[test]
    fn test_forced_biome_is_used() {
        let map = generate_map(MapConfig::small().with_seed(8).with_biome(Biome::Tundra));
        assert_eq!(map.biome, Biome::Tundra);
        assert!(map.tiles.iter().all(|t| t.biome == Biome::Tundra));
    }

    #[test]
    fn test_drawn_personality_is_deterministic() {
        let a = generate_map(MapConfig::medium().with_seed(555));
        let b = generate_map(MapConfig::medium().with_seed(555));
        assert_eq!(a.personality, b.personality);
        assert_eq!(a.dna, b.dna);
    }
}

// =============================================================================
// Data files
// =============================================================================

mod data_files {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_ron_and_json_specs() {
        let dir = tempfile::tempdir().expect("tempdir");

        let ron_path = dir.path().join("map.ron");
        fs::write(
            &ron_path,
            r#"MapSpec(seed: 5, size: 20, biomes: { "forest": 1.0 }, chokepoints: 1)"#,
        )
        .expect("write ron");
        let ron_spec = MapSpec::load(&ron_path).expect("load ron");
        assert_eq!(ron_spec.width(), 20);

        let json_path = dir.path().join("map.json");
        fs::write(&json_path, r#"{"seed": 5, "size": 20, "biomes": {"forest": 1.0}, "chokepoints": 1}"#)
            .expect("write json");
        let json_spec = MapSpec::load(&json_path).expect("load json");

        assert_eq!(engine_from(&ron_spec), engine_from(&json_spec));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = MapSpec::load(dir.path().join("absent.ron")).unwrap_err();
        assert!(matches!(err, TerrainError::Io { .. }));
    }

    #[test]
    fn test_malformed_spec_is_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.ron");
        fs::write(&path, "MapSpec(seed: ").expect("write");
        assert!(matches!(MapSpec::load(&path), Err(TerrainError::DataParseError { .. })));
    }

    #[test]
    fn test_load_tech_requirements() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("techs.ron");
        fs::write(
            &path,
            r#"{ "swamp_drainage": TechRequirement(target_biome: Some(swamp), required_duration: 15.0) }"#,
        )
        .expect("write");
        let gate = TerrainTechGate::load_requirements(&path).expect("load");
        assert_eq!(gate.requirements().len(), 1);
        assert!(gate.requirements().contains_key("swamp_drainage"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut engine = engine_from(&anomaly_spec(4));
        engine.advance(seconds(42.0));
        let bytes = engine.serialize().expect("serialize");
        let restored = TerrainEngine::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, engine);
    }
}

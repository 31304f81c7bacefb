//! Terrain development CLI.
//!
//! # Usage
//!
//! ```bash
//! # Generate a map from a spec and preview it
//! cargo run -p rts_tools -- generate assets/maps/parallel_bridges.ron --preview
//!
//! # Synthesize a procedural map
//! cargo run -p rts_tools -- synthesize --seed 7 --personality defensive --preview
//!
//! # Step anomalies through time
//! cargo run -p rts_tools -- simulate assets/maps/contested_basin.json --seconds 300
//!
//! # Plan flank routes between two tiles
//! cargo run -p rts_tools -- routes assets/maps/contested_basin.json 12,12 116,116
//!
//! # Validate bundled data
//! cargo run -p rts_tools -- validate assets
//! ```
//!
//! Reports go to stdout as JSON; logs go to stderr.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rts_terrain::prelude::{
    generate_map, AmbushHeuristic, AnomalyKind, AnomalyPhase, Biome, MapConfig, MapSpec,
    StrategicDna, TerrainEngine, TerrainError, TerrainEvaluator, TerrainPersonality, TilePos,
};
use rts_tools::preview::{render_engine, render_tiles, PreviewConfig};
use rts_tools::validate::validate_data_directory;

#[derive(Parser)]
#[command(name = "rts-terrain")]
#[command(about = "Deterministic terrain generation and analysis tools")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SizePreset {
    Small,
    Medium,
    Large,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a terrain grid from a map spec
    Generate {
        /// Map spec (.ron or .json)
        spec: PathBuf,

        /// Print an ASCII preview to stderr
        #[arg(long)]
        preview: bool,

        /// Write a binary engine snapshot
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Synthesize a procedural map from a seed
    Synthesize {
        /// Generation seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Force a personality (aggressive, defensive, economic, puzzle)
        #[arg(long)]
        personality: Option<String>,

        /// Force a base biome
        #[arg(long)]
        biome: Option<String>,

        /// Map size preset
        #[arg(long, value_enum, default_value = "medium")]
        size: SizePreset,

        /// Print an ASCII preview to stderr
        #[arg(long)]
        preview: bool,
    },

    /// Advance anomalies through game time and report phase changes
    Simulate {
        /// Map spec (.ron or .json)
        spec: PathBuf,

        /// Game seconds to simulate
        #[arg(long, default_value = "300")]
        seconds: f32,

        /// Seconds per step
        #[arg(long, default_value = "1")]
        step: f32,
    },

    /// Plan flank routes and assess ambush risk
    Routes {
        /// Map spec (.ron or .json)
        spec: PathBuf,

        /// Start tile as `x,y`
        #[arg(value_parser = parse_tile_pos)]
        from: TilePos,

        /// Target tile as `x,y`
        #[arg(value_parser = parse_tile_pos)]
        to: TilePos,

        /// Count chokepoint tiles on a route as ambush risk
        #[arg(long)]
        avoid_chokepoints: bool,
    },

    /// Validate map specs and tech tables
    Validate {
        /// Path to data directory
        #[arg(default_value = "assets")]
        path: PathBuf,
    },

    /// Verify determinism by generating the same spec multiple times
    Verify {
        /// Map spec (.ron or .json)
        spec: PathBuf,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Game seconds to advance each run
        #[arg(long, default_value = "600")]
        seconds: f32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs to stderr, stdout carries the JSON reports
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let outcome = match cli.command {
        Commands::Generate {
            spec,
            preview,
            snapshot,
        } => cmd_generate(&spec, preview, snapshot.as_deref()),
        Commands::Synthesize {
            seed,
            personality,
            biome,
            size,
            preview,
        } => cmd_synthesize(seed, personality.as_deref(), biome.as_deref(), size, preview),
        Commands::Simulate {
            spec,
            seconds,
            step,
        } => cmd_simulate(&spec, seconds, step),
        Commands::Routes {
            spec,
            from,
            to,
            avoid_chokepoints,
        } => cmd_routes(&spec, from, to, avoid_chokepoints),
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Verify {
            spec,
            runs,
            seconds,
        } => cmd_verify(&spec, runs, seconds),
    };

    if let Err(e) = outcome {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn parse_tile_pos(s: &str) -> Result<TilePos, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let x = x.trim().parse::<i32>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<i32>().map_err(|e| e.to_string())?;
    Ok(TilePos::new(x, y))
}

fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_engine(path: &Path) -> Result<TerrainEngine, TerrainError> {
    let spec = MapSpec::load(path)?;
    for warning in spec.lint() {
        tracing::warn!(spec = %path.display(), "{warning}");
    }
    Ok(TerrainEngine::generate_from_spec(&spec))
}

// ============================================================================
// Generate
// ============================================================================

#[derive(Serialize)]
struct GenerateReport<'a> {
    seed: u64,
    width: u32,
    height: u32,
    state_hash: String,
    chokepoints: usize,
    high_ground: usize,
    anomalies: usize,
    landmarks: &'a BTreeMap<String, TilePos>,
}

fn cmd_generate(spec: &Path, preview: bool, snapshot: Option<&Path>) -> CmdResult {
    tracing::info!(spec = %spec.display(), "Generating terrain");
    let engine = load_engine(spec)?;

    if preview {
        eprintln!("{}", render_engine(&engine, &PreviewConfig::default()));
    }
    if let Some(out) = snapshot {
        let bytes = engine.serialize()?;
        std::fs::write(out, &bytes)?;
        tracing::info!(path = %out.display(), bytes = bytes.len(), "Snapshot written");
    }

    print_json(&GenerateReport {
        seed: engine.seed(),
        width: engine.width(),
        height: engine.height(),
        state_hash: format!("{:016x}", engine.state_hash()),
        chokepoints: engine.chokepoints().len(),
        high_ground: engine.high_ground().len(),
        anomalies: engine.anomalies().len(),
        landmarks: engine.landmarks(),
    })
}

// ============================================================================
// Synthesize
// ============================================================================

#[derive(Serialize)]
struct SynthesizeReport<'a> {
    seed: u64,
    width: u32,
    height: u32,
    personality: TerrainPersonality,
    biome: Biome,
    resource_nodes: usize,
    chokepoints: usize,
    fractures: usize,
    veins: usize,
    dna: &'a StrategicDna,
}

fn cmd_synthesize(
    seed: u64,
    personality: Option<&str>,
    biome: Option<&str>,
    size: SizePreset,
    preview: bool,
) -> CmdResult {
    let mut config = match size {
        SizePreset::Small => MapConfig::small(),
        SizePreset::Medium => MapConfig::medium(),
        SizePreset::Large => MapConfig::large(),
    }
    .with_seed(seed);

    if let Some(name) = personality {
        let p = TerrainPersonality::from_name(name)
            .ok_or_else(|| format!("unknown personality '{name}'"))?;
        config = config.with_personality(p);
    }
    if let Some(name) = biome {
        let b = Biome::from_name(name).ok_or_else(|| format!("unknown biome '{name}'"))?;
        config = config.with_biome(b);
    }

    let map = generate_map(config);
    tracing::info!(
        seed,
        personality = ?map.personality,
        biome = ?map.biome,
        "Synthesized map"
    );

    if preview {
        let (w, h) = (map.config.width, map.config.height);
        eprintln!("{}", render_tiles(&map.tiles, w, h, &PreviewConfig::default()));
    }

    print_json(&SynthesizeReport {
        seed,
        width: map.config.width,
        height: map.config.height,
        personality: map.personality,
        biome: map.biome,
        resource_nodes: map.resource_nodes.len(),
        chokepoints: map.chokepoints.len(),
        fractures: map.fractures.len(),
        veins: map.veins.len(),
        dna: &map.dna,
    })
}

// ============================================================================
// Simulate
// ============================================================================

#[derive(Serialize)]
struct PhaseChange {
    time: f64,
    anomaly: u32,
    kind: AnomalyKind,
    from: AnomalyPhase,
    to: AnomalyPhase,
}

fn cmd_simulate(spec: &Path, seconds: f32, step: f32) -> CmdResult {
    if step <= 0.0 {
        return Err("--step must be positive".into());
    }
    let mut engine = load_engine(spec)?;
    let steps = (seconds.max(0.0) / step).ceil() as u32;
    let mut changes = Vec::new();
    let mut phases: Vec<AnomalyPhase> = engine.anomalies().iter().map(|a| a.phase).collect();

    for i in 0..=steps {
        let now = rts_terrain::math::seconds(step * i as f32);
        engine.advance(now);
        for (anomaly, phase) in engine.anomalies().iter().zip(phases.iter_mut()) {
            if anomaly.phase != *phase {
                changes.push(PhaseChange {
                    time: now.to_num::<f64>(),
                    anomaly: anomaly.id.0,
                    kind: anomaly.kind,
                    from: *phase,
                    to: anomaly.phase,
                });
                *phase = anomaly.phase;
            }
        }
    }

    tracing::info!(steps, changes = changes.len(), "Simulation finished");
    print_json(&changes)
}

// ============================================================================
// Routes
// ============================================================================

fn cmd_routes(spec: &Path, from: TilePos, to: TilePos, avoid_chokepoints: bool) -> CmdResult {
    let engine = load_engine(spec)?;
    for pos in [from, to] {
        if !engine.in_bounds(pos) {
            return Err(format!("tile {pos} is outside the map").into());
        }
    }

    let evaluator = TerrainEvaluator::new(&engine);
    let assessments: Vec<AmbushHeuristic> = evaluator
        .plan_flank_routes(from, to, avoid_chokepoints)
        .iter()
        .map(|route| evaluator.evaluate_ambush_risk(route))
        .collect();

    tracing::info!(%from, %to, routes = assessments.len(), "Routes planned");
    print_json(&assessments)
}

// ============================================================================
// Validate
// ============================================================================

fn cmd_validate(path: &Path) -> CmdResult {
    tracing::info!("Validating data files in: {}", path.display());
    let report = validate_data_directory(path)?;
    tracing::info!(
        files = report.files.len(),
        warnings = report.warning_count(),
        "Validation passed"
    );
    Ok(())
}

// ============================================================================
// Verify
// ============================================================================

fn cmd_verify(spec: &Path, runs: u32, seconds: f32) -> CmdResult {
    let spec_data = MapSpec::load(spec)?;
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs)",
        spec.display(),
        spec_data.seed,
        runs
    );

    let end = rts_terrain::math::seconds(seconds.max(0.0));
    let mut hashes = Vec::with_capacity(runs as usize);
    for _ in 0..runs.max(1) {
        let mut engine = TerrainEngine::generate_from_spec(&spec_data);
        engine.advance(end);
        let restored = TerrainEngine::deserialize(&engine.serialize()?)?;
        if restored.state_hash() != engine.state_hash() {
            return Err("snapshot round trip changed the state hash".into());
        }
        hashes.push(engine.state_hash());
    }

    if hashes.windows(2).all(|w| w[0] == w[1]) {
        eprintln!("PASS: All {} runs produced identical results", hashes.len());
        Ok(())
    } else {
        Err("non-determinism detected".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tile_pos() {
        assert_eq!(parse_tile_pos("12, 40"), Ok(TilePos::new(12, 40)));
        assert!(parse_tile_pos("12").is_err());
        assert!(parse_tile_pos("a,b").is_err());
    }

    #[test]
    fn test_cli_parses_routes() {
        let cli = Cli::try_parse_from([
            "rts-terrain",
            "routes",
            "map.ron",
            "1,2",
            "30,40",
            "--avoid-chokepoints",
        ])
        .expect("parse");
        match cli.command {
            Commands::Routes {
                from,
                to,
                avoid_chokepoints,
                ..
            } => {
                assert_eq!(from, TilePos::new(1, 2));
                assert_eq!(to, TilePos::new(30, 40));
                assert!(avoid_chokepoints);
            }
            _ => panic!("expected routes command"),
        }
    }

    #[test]
    fn test_avoid_chokepoints_help_describes_risk() {
        use clap::CommandFactory;

        let cli = Cli::command();
        let routes = cli.find_subcommand("routes").expect("routes subcommand");
        let flag = routes
            .get_arguments()
            .find(|arg| arg.get_id() == "avoid_chokepoints")
            .expect("avoid_chokepoints flag");
        let help = flag.get_help().map(ToString::to_string).unwrap_or_default();
        assert!(help.contains("risk"));
        assert!(!help.to_lowercase().contains("skip"));
    }

    #[test]
    fn test_verify_bundled_spec() {
        let spec = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../assets/maps/contested_basin.json");
        assert!(cmd_verify(&spec, 2, 120.0).is_ok());
    }
}

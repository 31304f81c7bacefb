//! # RTS Terrain
//!
//! Deterministic terrain generation and strategic evaluation for Post-Scarcity RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No wall-clock time
//! - No system randomness (every stream is seeded)
//! - Fixed-point game time
//!
//! The same map spec and seed always produce a bitwise-identical grid, and
//! anomaly state depends only on the game time passed in. That makes the
//! terrain safe for lockstep multiplayer and replays.
//!
//! ## Crate Structure
//!
//! - [`engine`] - Spec-driven terrain grid and anomaly state machine
//! - [`map_generation`] - Personality-driven procedural maps with strategic DNA
//! - [`evaluator`] - Tile scoring, flank routes, ambush risk, anomaly contests
//! - [`tech_gate`] - Territorial tech unlocks and reversible terrain effects
//! - [`map_spec`] - Declarative map input (RON/JSON)
//! - [`rng`] - Seeded random source
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod anomaly;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod map_generation;
pub mod map_spec;
pub mod math;
pub mod rng;
pub mod tech_gate;
pub mod tile;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::anomaly::{
        AnomalyEffect, AnomalyId, AnomalyKind, AnomalyPhase, AnomalySchedule, DynamicAnomaly,
        Frequency,
    };
    pub use crate::engine::{GenerationTuning, TerrainEngine};
    pub use crate::error::{Result, TerrainError};
    pub use crate::evaluator::{
        AmbushHeuristic, ContestDecision, EvaluatorWeights, FlankRoute, RiskLevel,
        TerrainEvaluator, TileEvaluation, Urgency,
    };
    pub use crate::map_generation::{
        generate_map, MapConfig, StrategicDna, SynthesizedMap, TerrainPersonality,
    };
    pub use crate::map_spec::{AnomalyDef, MapSpec, SpecialFeatureSpec};
    pub use crate::math::{seconds, Fixed, GameTime, Vec2Fixed};
    pub use crate::rng::DeterministicRng;
    pub use crate::tech_gate::{TechAvailability, TerrainEffect, TerrainTechGate};
    pub use crate::tile::{Biome, ResourceType, TerrainFeature, Tile, TilePos};
}

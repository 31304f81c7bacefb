//! Terrain engine: owns the tile grid and the anomaly state machine for one match.
//!
//! Generation runs a fixed sequence of passes, each drawing from the same
//! seeded stream in a fixed order:
//!
//! 1. Biome and elevation for every cell
//! 2. Resources (explicit placements or uniform scatter)
//! 3. Chokepoints
//! 4. High ground
//! 5. Objectives
//! 6. Special features
//! 7. Anomaly records
//!
//! After generation only anomaly phases (via [`TerrainEngine::advance`]) and
//! tech-gate terrain effects mutate the engine.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::anomaly::{AnomalyId, AnomalySchedule, DynamicAnomaly};
use crate::error::{Result, TerrainError};
use crate::map_spec::{BridgeSpan, MapSpec, SpecialFeature};
use crate::math::{fixed_serde, Fixed, GameTime};
use crate::rng::DeterministicRng;
use crate::tile::{Biome, ResourceType, TerrainFeature, Tile, TilePos};

/// Strategic value added to a tile holding a resource node.
pub const RESOURCE_STRATEGIC_BONUS: f32 = 25.0;
/// Movement modifier written onto bridge tiles.
pub const BRIDGE_MOVEMENT_MODIFIER: f32 = 1.2;
/// Penalties at or above this are treated as this value to keep costs finite.
const MAX_MOVEMENT_PENALTY: f32 = 0.95;

/// Stamped chokepoint record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Chokepoint {
    /// Center tile.
    pub center: TilePos,
    /// Half-width of the stamped rectangle along x.
    pub width: i32,
    /// Defense added to each stamped tile.
    pub defense_bonus: f32,
    /// Strategic value added to each stamped tile.
    pub strategic_bonus: f32,
}

/// Stamped high-ground record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighGround {
    /// Center tile.
    pub center: TilePos,
    /// Euclidean radius in tiles.
    pub radius: i32,
    /// Elevation added to each stamped tile.
    pub elevation_bonus: f32,
}

/// Tuning for the generation passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationTuning {
    /// Defense added by a chokepoint stamp.
    pub chokepoint_defense: f32,
    /// Strategic value added by a chokepoint stamp.
    pub chokepoint_value: f32,
    /// Strategic value added by a high-ground stamp.
    pub high_ground_value: f32,
    /// Visibility added by a high-ground stamp.
    pub high_ground_visibility: f32,
}

impl Default for GenerationTuning {
    fn default() -> Self {
        Self {
            chokepoint_defense: 0.3,
            chokepoint_value: 30.0,
            high_ground_value: 20.0,
            high_ground_visibility: 0.2,
        }
    }
}

/// The live terrain of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainEngine {
    seed: u64,
    width: u32,
    height: u32,
    /// Row-major; index = `y * width + x`.
    tiles: Vec<Tile>,
    chokepoints: Vec<Chokepoint>,
    high_ground: Vec<HighGround>,
    anomalies: Vec<DynamicAnomaly>,
    special_features: Vec<SpecialFeature>,
    landmarks: BTreeMap<String, TilePos>,
    starting_positions: Vec<TilePos>,
    schedule: AnomalySchedule,
    #[serde(with = "fixed_serde")]
    game_time: GameTime,
}

impl TerrainEngine {
    /// Create a flat plains grid with no features.
    ///
    /// Useful as a blank canvas for tools and tests.
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut tiles = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                tiles.push(Tile::new(TilePos::new(x, y), Biome::Plains, 0.0));
            }
        }
        Self {
            seed: 0,
            width,
            height,
            tiles,
            chokepoints: Vec::new(),
            high_ground: Vec::new(),
            anomalies: Vec::new(),
            special_features: Vec::new(),
            landmarks: BTreeMap::new(),
            starting_positions: Vec::new(),
            schedule: AnomalySchedule::default(),
            game_time: Fixed::ZERO,
        }
    }

    /// Generate a full map from a spec with the default anomaly schedule.
    #[must_use]
    pub fn generate_from_spec(spec: &MapSpec) -> Self {
        Self::generate_with(spec, AnomalySchedule::default(), GenerationTuning::default())
    }

    /// Generate a full map with explicit schedule and tuning.
    #[must_use]
    pub fn generate_with(
        spec: &MapSpec,
        schedule: AnomalySchedule,
        tuning: GenerationTuning,
    ) -> Self {
        let width = spec.width();
        let height = spec.grid_height();
        let mut rng = DeterministicRng::new(spec.seed);

        tracing::debug!(seed = spec.seed, width, height, "Generating terrain from spec");

        let mut engine = Self {
            seed: spec.seed,
            width,
            height,
            tiles: Vec::new(),
            chokepoints: Vec::new(),
            high_ground: Vec::new(),
            anomalies: Vec::new(),
            special_features: Vec::new(),
            landmarks: BTreeMap::new(),
            starting_positions: spec
                .starting_positions
                .iter()
                .map(|&p| TilePos::from(p))
                .collect(),
            schedule,
            game_time: Fixed::ZERO,
        };

        engine.generate_base_terrain(spec, &mut rng);
        engine.place_resources(spec, &mut rng);
        engine.stamp_chokepoints(spec.chokepoints, &tuning, &mut rng);
        engine.stamp_high_ground(spec.chokepoints.div_ceil(2), &tuning, &mut rng);
        engine.place_objectives(spec.objectives, &mut rng);
        engine.apply_special_features(spec);
        engine.init_anomalies(spec, &mut rng);

        #[cfg(feature = "debug-validation")]
        engine.validate_coverage();

        tracing::info!(
            seed = spec.seed,
            width,
            height,
            chokepoints = engine.chokepoints.len(),
            high_ground = engine.high_ground.len(),
            anomalies = engine.anomalies.len(),
            landmarks = engine.landmarks.len(),
            "Terrain generated"
        );

        engine
    }

    // =========================================================================
    // Generation passes
    // =========================================================================

    fn generate_base_terrain(&mut self, spec: &MapSpec, rng: &mut DeterministicRng) {
        let table: Vec<(Biome, f32)> = spec
            .biomes
            .iter()
            .filter_map(|(name, &weight)| match Biome::from_name(name) {
                Some(biome) => Some((biome, weight)),
                None => {
                    tracing::warn!(biome = %name, "Unknown biome in spec, ignoring");
                    None
                }
            })
            .collect();
        let weights: Vec<f32> = table.iter().map(|(_, w)| *w).collect();

        let cell_count = (self.width as usize) * (self.height as usize);
        self.tiles = Vec::with_capacity(cell_count);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let biome = rng
                    .weighted_index(&weights)
                    .map_or(Biome::default(), |idx| table[idx].0);
                let elevation = rng.next_float(-100.0, 100.0) + rng.next_float(-50.0, 50.0);
                self.tiles
                    .push(Tile::new(TilePos::new(x, y), biome, elevation));
            }
        }
    }

    fn place_resources(&mut self, spec: &MapSpec, rng: &mut DeterministicRng) {
        let explicit: Vec<(ResourceType, &Vec<(i32, i32)>)> = spec
            .resource_placement
            .iter()
            .filter_map(|(name, coords)| match ResourceType::from_name(name) {
                Some(resource) => Some((resource, coords)),
                None => {
                    tracing::warn!(resource = %name, "Unknown resource type in spec, ignoring");
                    None
                }
            })
            .collect();

        if !explicit.is_empty() {
            for (resource, coords) in explicit {
                for &pos in coords {
                    let pos = TilePos::from(pos);
                    match self.tile_at_mut(pos) {
                        Some(tile) => {
                            tile.resource = Some(resource);
                            tile.add_strategic_value(RESOURCE_STRATEGIC_BONUS);
                        }
                        None => tracing::warn!(%pos, "Resource placement outside map, skipping"),
                    }
                }
            }
            return;
        }

        for _ in 0..spec.resource_clusters {
            let pos = self.random_pos(rng);
            let resource = rng
                .choice(&ResourceType::ALL)
                .copied()
                .unwrap_or(ResourceType::Minerals);
            if let Some(tile) = self.tile_at_mut(pos) {
                tile.resource = Some(resource);
                tile.add_strategic_value(RESOURCE_STRATEGIC_BONUS);
            }
        }
    }

    fn stamp_chokepoints(&mut self, count: u32, tuning: &GenerationTuning, rng: &mut DeterministicRng) {
        for _ in 0..count {
            let center = self.random_pos(rng);
            let width = rng.next_int(2, 4);
            let chokepoint = Chokepoint {
                center,
                width,
                defense_bonus: tuning.chokepoint_defense,
                strategic_bonus: tuning.chokepoint_value,
            };

            for dy in -1..=1 {
                for dx in -width..=width {
                    if let Some(tile) = self.tile_at_mut(center.offset(dx, dy)) {
                        tile.add_defense(chokepoint.defense_bonus);
                        tile.add_strategic_value(chokepoint.strategic_bonus);
                        tile.stamp_feature(TerrainFeature::Chokepoint);
                    }
                }
            }
            self.chokepoints.push(chokepoint);
        }
    }

    fn stamp_high_ground(&mut self, count: u32, tuning: &GenerationTuning, rng: &mut DeterministicRng) {
        for _ in 0..count {
            let center = self.random_pos(rng);
            let radius = rng.next_int(3, 8);
            let elevation_bonus = rng.next_float(20.0, 60.0);
            let region = HighGround {
                center,
                radius,
                elevation_bonus,
            };

            for pos in self.positions_within(center, radius) {
                if let Some(tile) = self.tile_at_mut(pos) {
                    tile.add_elevation(elevation_bonus);
                    tile.add_strategic_value(tuning.high_ground_value);
                    tile.add_visibility(tuning.high_ground_visibility);
                    tile.stamp_feature(TerrainFeature::HighGround);
                }
            }
            self.high_ground.push(region);
        }
    }

    fn place_objectives(&mut self, count: u32, rng: &mut DeterministicRng) {
        for _ in 0..count {
            let pos = self.random_pos(rng);
            if let Some(tile) = self.tile_at_mut(pos) {
                tile.strategic_value = 100.0;
                tile.stamp_feature(TerrainFeature::Objective);
            }
        }
    }

    fn apply_special_features(&mut self, spec: &MapSpec) {
        for raw in &spec.special_features {
            let feature = match SpecialFeature::from_spec(raw) {
                Ok(feature) => feature,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping special feature");
                    continue;
                }
            };

            for (name, &pos) in &raw.coordinates {
                self.landmarks.insert(name.clone(), TilePos::from(pos));
            }

            match &feature {
                SpecialFeature::ParallelBridges { wide, narrow } => {
                    self.stamp_bridge(wide);
                    self.stamp_bridge(narrow);
                }
                SpecialFeature::Bridge(span) => self.stamp_bridge(span),
                SpecialFeature::CentralCaldera {
                    center,
                    radius,
                    strategic_value,
                } => self.stamp_caldera(*center, *radius, *strategic_value),
                SpecialFeature::HiddenVault { pos, reveal_radius } => {
                    self.stamp_hidden_vault(*pos, *reveal_radius);
                }
                SpecialFeature::ScoutTowers {
                    towers,
                    vision_bonus,
                } => {
                    for (_, pos) in towers {
                        self.stamp_scout_tower(*pos, *vision_bonus);
                    }
                }
                SpecialFeature::Storytelling { sites } => {
                    for (name, pos) in sites {
                        if let Some(tile) = self.tile_at_mut(*pos) {
                            tile.lore.push(name.clone());
                        }
                    }
                }
            }
            self.special_features.push(feature);
        }
    }

    fn stamp_bridge(&mut self, span: &BridgeSpan) {
        let half_len = span.length / 2;
        let rows_above = (span.width - 1) / 2;
        let rows_below = span.width - 1 - rows_above;
        for dy in -rows_above..=rows_below {
            for dx in -half_len..=(span.length - 1 - half_len) {
                if let Some(tile) = self.tile_at_mut(span.center.offset(dx, dy)) {
                    tile.feature = Some(TerrainFeature::Bridge);
                    tile.defense_bonus = span.defense_bonus;
                    tile.movement_modifier = BRIDGE_MOVEMENT_MODIFIER;
                    tile.passable = true;
                    tile.buildable = false;
                    tile.add_strategic_value(15.0);
                }
            }
        }
    }

    fn stamp_caldera(&mut self, center: TilePos, radius: i32, strategic_value: f32) {
        for pos in self.positions_within(center, radius) {
            if let Some(tile) = self.tile_at_mut(pos) {
                tile.set_biome(Biome::Crater);
                tile.add_elevation(-30.0);
                tile.add_strategic_value(strategic_value);
                tile.feature = Some(TerrainFeature::Caldera);
            }
        }
    }

    fn stamp_hidden_vault(&mut self, pos: TilePos, reveal_radius: i32) {
        if let Some(tile) = self.tile_at_mut(pos) {
            tile.strategic_value = 100.0;
            tile.feature = Some(TerrainFeature::HiddenVault);
            tile.metadata
                .insert("vision_gated".to_string(), "true".to_string());
            tile.metadata
                .insert("reveal_radius".to_string(), reveal_radius.to_string());
        } else {
            tracing::warn!(%pos, "Hidden vault outside map, skipping");
        }
    }

    fn stamp_scout_tower(&mut self, pos: TilePos, vision_bonus: f32) {
        if let Some(tile) = self.tile_at_mut(pos) {
            tile.add_visibility(vision_bonus);
            tile.add_elevation(20.0);
            tile.add_strategic_value(20.0);
            tile.feature = Some(TerrainFeature::ScoutTower);
        }
    }

    fn init_anomalies(&mut self, spec: &MapSpec, rng: &mut DeterministicRng) {
        for (idx, def) in spec.dynamic_anomalies.iter().enumerate() {
            let center = match def.coordinates {
                Some(pos) => TilePos::from(pos),
                None => self.random_pos(rng),
            };
            self.anomalies.push(DynamicAnomaly::new(
                AnomalyId(idx as u32),
                def.kind,
                center,
                def.radius,
                def.frequency,
                def.duration,
                def.resolved_effect(),
            ));
        }
    }

    #[cfg(feature = "debug-validation")]
    fn validate_coverage(&self) {
        assert_eq!(
            self.tiles.len(),
            (self.width as usize) * (self.height as usize),
            "grid must cover every cell"
        );
        for (idx, tile) in self.tiles.iter().enumerate() {
            assert_eq!(self.index_of(tile.pos), Some(idx), "tile stored out of order");
        }
    }

    fn random_pos(&self, rng: &mut DeterministicRng) -> TilePos {
        let x = rng.next_int(0, self.width as i32 - 1);
        let y = rng.next_int(0, self.height as i32 - 1);
        TilePos::new(x, y)
    }

    /// In-bounds positions within Euclidean `radius` of `center`.
    #[must_use]
    pub fn positions_within(&self, center: TilePos, radius: i32) -> Vec<TilePos> {
        let radius = radius.max(0);
        let r_sq = i64::from(radius) * i64::from(radius);
        let mut out = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let pos = center.offset(dx, dy);
                if self.in_bounds(pos) && center.distance_squared(pos) <= r_sq {
                    out.push(pos);
                }
            }
        }
        out
    }

    // =========================================================================
    // Time
    // =========================================================================

    /// Advance every anomaly to `game_time`.
    ///
    /// Called once per simulation tick by the driver. The resulting phases
    /// depend only on `game_time`.
    pub fn advance(&mut self, game_time: GameTime) {
        self.game_time = game_time;
        for anomaly in &mut self.anomalies {
            if let Some(transition) = anomaly.advance(game_time, &self.schedule) {
                tracing::debug!(
                    anomaly = transition.id.0,
                    kind = ?anomaly.kind,
                    from = ?transition.from,
                    to = ?transition.to,
                    game_time = %game_time,
                    "Anomaly phase change"
                );
            }
        }
    }

    /// Alias of [`advance`](Self::advance) matching the tick-driver vocabulary.
    pub fn update_dynamic_anomalies(&mut self, game_time: GameTime) {
        self.advance(game_time);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Random seed used for generation.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Last game time passed to [`advance`](Self::advance).
    #[must_use]
    pub const fn game_time(&self) -> GameTime {
        self.game_time
    }

    /// Anomaly schedule in use.
    #[must_use]
    pub const fn schedule(&self) -> &AnomalySchedule {
        &self.schedule
    }

    /// Check if a position is inside the grid.
    #[must_use]
    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index_of(&self, pos: TilePos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y as usize) * (self.width as usize) + (pos.x as usize))
    }

    /// Tile at `(x, y)`, or `None` outside the grid.
    #[must_use]
    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.tile_at(TilePos::new(x, y))
    }

    /// Tile at `pos`, or `None` outside the grid.
    #[must_use]
    pub fn tile_at(&self, pos: TilePos) -> Option<&Tile> {
        self.index_of(pos).and_then(|idx| self.tiles.get(idx))
    }

    /// Mutable tile access for scenario authoring and terrain effects.
    pub fn tile_at_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.index_of(pos).and_then(|idx| self.tiles.get_mut(idx))
    }

    /// Every tile in row-major order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Stamped chokepoints.
    #[must_use]
    pub fn chokepoints(&self) -> &[Chokepoint] {
        &self.chokepoints
    }

    /// Stamped high-ground regions.
    #[must_use]
    pub fn high_ground(&self) -> &[HighGround] {
        &self.high_ground
    }

    /// Validated special features, in spec order.
    #[must_use]
    pub fn special_features(&self) -> &[SpecialFeature] {
        &self.special_features
    }

    /// Player starting positions.
    #[must_use]
    pub fn starting_positions(&self) -> &[TilePos] {
        &self.starting_positions
    }

    /// Named special-feature coordinate.
    #[must_use]
    pub fn landmark(&self, name: &str) -> Option<TilePos> {
        self.landmarks.get(name).copied()
    }

    /// Every named special-feature coordinate.
    #[must_use]
    pub const fn landmarks(&self) -> &BTreeMap<String, TilePos> {
        &self.landmarks
    }

    /// Every anomaly.
    #[must_use]
    pub fn anomalies(&self) -> &[DynamicAnomaly] {
        &self.anomalies
    }

    /// Anomaly by id.
    #[must_use]
    pub fn anomaly(&self, id: AnomalyId) -> Option<&DynamicAnomaly> {
        self.anomalies.iter().find(|a| a.id == id)
    }

    /// Currently active anomalies.
    pub fn active_anomalies(&self) -> impl Iterator<Item = &DynamicAnomaly> {
        self.anomalies.iter().filter(|a| a.active)
    }

    /// Active anomalies whose radius contains `pos`.
    pub fn anomalies_at(&self, pos: TilePos) -> impl Iterator<Item = &DynamicAnomaly> {
        self.active_anomalies().filter(move |a| a.contains(pos))
    }

    /// Add an anomaly after generation; returns its id.
    pub fn insert_anomaly(&mut self, mut anomaly: DynamicAnomaly) -> AnomalyId {
        let id = AnomalyId(
            self.anomalies
                .iter()
                .map(|a| a.id.0 + 1)
                .max()
                .unwrap_or(0),
        );
        anomaly.id = id;
        self.anomalies.push(anomaly);
        id
    }

    /// Cost of stepping from one tile onto another.
    ///
    /// `1 / movement_modifier` of the destination, divided by `1 - penalty`
    /// for each active anomaly covering the destination. `None` when the
    /// destination is outside the grid.
    #[must_use]
    pub fn movement_cost(&self, _from: TilePos, to: TilePos) -> Option<f32> {
        let tile = self.tile_at(to)?;
        let mut cost = 1.0 / tile.movement_modifier.max(0.01);
        for anomaly in self.anomalies_at(to) {
            if let Some(penalty) = anomaly.effect.movement_penalty {
                cost /= 1.0 - penalty.clamp(0.0, MAX_MOVEMENT_PENALTY);
            }
        }
        Some(cost)
    }

    /// Baseline AI score of a tile.
    #[must_use]
    pub fn evaluate_tile_for_ai(&self, tile: &Tile) -> f32 {
        let mut score = 0.0;
        if tile.resource.is_some() {
            score += 50.0;
        }
        score += tile.elevation * 0.3;
        score += tile.defense_bonus * 30.0;
        score += tile.visibility_modifier * 20.0;
        if let Some(feature) = tile.feature {
            score += feature.score_bonus();
        }
        for anomaly in self.anomalies_at(tile.pos) {
            if let Some(multiplier) = anomaly.effect.resource_multiplier {
                score += 30.0 * multiplier;
            }
        }
        score
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Hash of the complete engine state.
    ///
    /// Floats are hashed by bit pattern, so two engines hash equal only if
    /// they are bitwise identical.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.game_time.to_bits().hash(&mut hasher);

        for tile in &self.tiles {
            tile.pos.hash(&mut hasher);
            tile.elevation.to_bits().hash(&mut hasher);
            tile.biome.hash(&mut hasher);
            tile.resource.hash(&mut hasher);
            tile.defense_bonus.to_bits().hash(&mut hasher);
            tile.visibility_modifier.to_bits().hash(&mut hasher);
            tile.movement_modifier.to_bits().hash(&mut hasher);
            tile.passable.hash(&mut hasher);
            tile.buildable.hash(&mut hasher);
            tile.strategic_value.to_bits().hash(&mut hasher);
            tile.feature.hash(&mut hasher);
            tile.metadata.hash(&mut hasher);
            tile.lore.hash(&mut hasher);
        }

        for anomaly in &self.anomalies {
            anomaly.id.hash(&mut hasher);
            anomaly.center.hash(&mut hasher);
            anomaly.radius.hash(&mut hasher);
            anomaly.active.hash(&mut hasher);
            anomaly.phase.hash(&mut hasher);
            anomaly.start_time.map(Fixed::to_bits).hash(&mut hasher);
            anomaly.end_time.map(Fixed::to_bits).hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Serialize the engine for replay or network sync.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| TerrainError::Snapshot(format!("Failed to serialize terrain: {e}")))
    }

    /// Deserialize an engine from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| TerrainError::Snapshot(format!("Failed to deserialize terrain: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyEffect, AnomalyKind, AnomalyPhase, Frequency};
    use crate::map_spec::{AnomalyDef, SpecialFeatureSpec};

    fn secs(n: i32) -> GameTime {
        Fixed::from_num(n)
    }

    fn spec_with_everything(seed: u64) -> MapSpec {
        MapSpec::new(seed, 48)
            .with_biome("plains", 3.0)
            .with_biome("forest", 2.0)
            .with_biome("swamp", 1.0)
            .with_counts(6, 3, 2)
            .with_anomaly(AnomalyDef::new(AnomalyKind::Storm, Frequency::Short, 20).at(10, 10))
            .with_anomaly(AnomalyDef::new(AnomalyKind::ResourceFlux, Frequency::Continuous, 5))
            .with_feature(
                SpecialFeatureSpec::new("scout_tower")
                    .coordinate("north_tower", 24, 2)
                    .property("vision_bonus", 0.4),
            )
    }

    #[test]
    fn test_full_coverage() {
        let engine = TerrainEngine::generate_from_spec(&spec_with_everything(3));
        assert_eq!(engine.tiles().len(), 48 * 48);
        for y in 0..48 {
            for x in 0..48 {
                let tile = engine.tile(x, y).expect("tile in bounds");
                assert_eq!(tile.pos, TilePos::new(x, y));
            }
        }
    }

    #[test]
    fn test_out_of_bounds_is_none() {
        let engine = TerrainEngine::blank(8, 8);
        assert!(engine.tile(-1, 0).is_none());
        assert!(engine.tile(0, 8).is_none());
        assert!(engine.tile(8, 0).is_none());
        assert!(engine
            .movement_cost(TilePos::new(0, 0), TilePos::new(9, 9))
            .is_none());
    }

    #[test]
    fn test_determinism_same_seed() {
        let a = TerrainEngine::generate_from_spec(&spec_with_everything(42));
        let b = TerrainEngine::generate_from_spec(&spec_with_everything(42));
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(a.serialize().ok(), b.serialize().ok());
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = TerrainEngine::generate_from_spec(&spec_with_everything(1));
        let b = TerrainEngine::generate_from_spec(&spec_with_everything(2));
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_empty_biome_table_uses_default() {
        let engine = TerrainEngine::generate_from_spec(&MapSpec::new(5, 16));
        assert_eq!(engine.tiles().len(), 256);
        assert!(engine.tiles().iter().all(|t| t.biome == Biome::Plains));
    }

    #[test]
    fn test_degenerate_weights_use_default() {
        let spec = MapSpec::new(5, 8)
            .with_biome("lava", 0.0)
            .with_biome("not_a_biome", 5.0);
        let engine = TerrainEngine::generate_from_spec(&spec);
        assert!(engine.tiles().iter().all(|t| t.biome == Biome::Plains));
    }

    #[test]
    fn test_single_biome_weight_wins_everywhere() {
        let spec = MapSpec::new(5, 8).with_biome("swamp", 1.0);
        let engine = TerrainEngine::generate_from_spec(&spec);
        for tile in engine.tiles() {
            assert_eq!(tile.biome, Biome::Swamp);
            assert_eq!(tile.movement_modifier, Biome::Swamp.profile().movement_modifier);
            assert!(!tile.buildable);
        }
    }

    #[test]
    fn test_elevation_in_range() {
        let engine = TerrainEngine::generate_from_spec(&spec_with_everything(8));
        assert!(engine
            .tiles()
            .iter()
            .all(|t| (-100.0..=100.0).contains(&t.elevation)));
    }

    #[test]
    fn test_explicit_resources_override_scatter() {
        let mut spec = MapSpec::new(1, 16).with_counts(10, 0, 0);
        spec.resource_placement
            .insert("crystal".to_string(), vec![(2, 3), (40, 40)]);
        let engine = TerrainEngine::generate_from_spec(&spec);

        let with_resource: Vec<_> = engine.tiles().iter().filter(|t| t.resource.is_some()).collect();
        assert_eq!(with_resource.len(), 1);
        assert_eq!(with_resource[0].pos, TilePos::new(2, 3));
        assert_eq!(with_resource[0].resource, Some(ResourceType::Crystal));
        assert_eq!(with_resource[0].strategic_value, RESOURCE_STRATEGIC_BONUS);
    }

    #[test]
    fn test_chokepoints_and_high_ground_recorded() {
        let engine = TerrainEngine::generate_from_spec(&MapSpec::new(11, 64).with_counts(0, 3, 0));
        assert_eq!(engine.chokepoints().len(), 3);
        assert_eq!(engine.high_ground().len(), 2);
        let center = engine.chokepoints()[0].center;
        let tile = engine.tile_at(center).expect("center in bounds");
        assert!(matches!(
            tile.feature,
            Some(TerrainFeature::Chokepoint) | Some(TerrainFeature::Objective)
        ));
        assert!(tile.strategic_value >= 30.0);
    }

    #[test]
    fn test_objectives_have_max_value() {
        let engine = TerrainEngine::generate_from_spec(&MapSpec::new(4, 32).with_counts(0, 0, 3));
        let objectives: Vec<_> = engine
            .tiles()
            .iter()
            .filter(|t| t.has_feature(TerrainFeature::Objective))
            .collect();
        assert!(!objectives.is_empty());
        assert!(objectives.iter().all(|t| t.strategic_value == 100.0));
    }

    #[test]
    fn test_landmarks_registered() {
        let engine = TerrainEngine::generate_from_spec(&spec_with_everything(1));
        assert_eq!(engine.landmark("north_tower"), Some(TilePos::new(24, 2)));
        assert_eq!(engine.landmark("missing"), None);
        let tower = engine.tile(24, 2).expect("tower tile");
        assert_eq!(tower.feature, Some(TerrainFeature::ScoutTower));
    }

    #[test]
    fn test_hidden_vault_and_storytelling() {
        let spec = MapSpec::new(1, 32)
            .with_feature(
                SpecialFeatureSpec::new("hidden_vault")
                    .coordinate("vault", 5, 6)
                    .property("reveal_radius", 4.0),
            )
            .with_feature(
                SpecialFeatureSpec::new("environmental_storytelling")
                    .coordinate("crashed_frigate", 20, 20),
            );
        let engine = TerrainEngine::generate_from_spec(&spec);

        let vault = engine.tile(5, 6).expect("vault tile");
        assert_eq!(vault.feature, Some(TerrainFeature::HiddenVault));
        assert_eq!(vault.strategic_value, 100.0);
        assert_eq!(vault.metadata.get("vision_gated").map(String::as_str), Some("true"));
        assert_eq!(vault.metadata.get("reveal_radius").map(String::as_str), Some("4"));

        let site = engine.tile(20, 20).expect("site tile");
        assert_eq!(site.lore, vec!["crashed_frigate".to_string()]);
        assert_eq!(engine.landmark("crashed_frigate"), Some(TilePos::new(20, 20)));
    }

    #[test]
    fn test_caldera_turns_crater() {
        let spec = MapSpec::new(1, 32).with_feature(
            SpecialFeatureSpec::new("central_caldera")
                .coordinate("center", 16, 16)
                .property("radius", 3.0),
        );
        let engine = TerrainEngine::generate_from_spec(&spec);
        let center = engine.tile(16, 16).expect("center tile");
        assert_eq!(center.biome, Biome::Crater);
        assert_eq!(center.feature, Some(TerrainFeature::Caldera));
        assert_ne!(engine.tile(16, 20).map(|t| t.feature), Some(Some(TerrainFeature::Caldera)));
    }

    #[test]
    fn test_invalid_feature_skipped() {
        let spec = MapSpec::new(1, 16).with_feature(SpecialFeatureSpec::new("moon_base"));
        let engine = TerrainEngine::generate_from_spec(&spec);
        assert_eq!(engine.tiles().len(), 256);
        assert!(engine.special_features().is_empty());
    }

    #[test]
    fn test_anomalies_initialized_inactive() {
        let engine = TerrainEngine::generate_from_spec(&spec_with_everything(1));
        assert_eq!(engine.anomalies().len(), 2);
        assert!(engine.anomalies().iter().all(|a| !a.active));
        assert_eq!(engine.anomalies()[0].center, TilePos::new(10, 10));
        assert!(engine.in_bounds(engine.anomalies()[1].center));
    }

    #[test]
    fn test_advance_drives_anomalies() {
        let mut engine = TerrainEngine::generate_from_spec(&spec_with_everything(1));
        engine.advance(secs(0));
        assert_eq!(engine.active_anomalies().count(), 2);

        engine.advance(secs(25));
        let storm = engine.anomaly(AnomalyId(0)).expect("storm");
        assert_eq!(storm.phase, AnomalyPhase::CoolingDown);
        let flux = engine.anomaly(AnomalyId(1)).expect("flux");
        assert!(flux.active);
        assert_eq!(engine.game_time(), secs(25));
    }

    #[test]
    fn test_movement_cost_uses_modifier_and_penalty() {
        let mut engine = TerrainEngine::blank(16, 16);
        if let Some(tile) = engine.tile_at_mut(TilePos::new(3, 3)) {
            tile.movement_modifier = 0.5;
        }
        let origin = TilePos::new(2, 3);
        assert!((engine.movement_cost(origin, TilePos::new(3, 3)).unwrap_or(0.0) - 2.0).abs() < 1e-6);
        assert!((engine.movement_cost(origin, TilePos::new(4, 4)).unwrap_or(0.0) - 1.0).abs() < 1e-6);

        engine.insert_anomaly(DynamicAnomaly::new(
            AnomalyId(0),
            AnomalyKind::LavaVent,
            TilePos::new(4, 4),
            1,
            Frequency::Continuous,
            secs(10),
            AnomalyEffect {
                movement_penalty: Some(0.5),
                ..AnomalyEffect::default()
            },
        ));
        // Inactive anomalies do not slow movement.
        assert!((engine.movement_cost(origin, TilePos::new(4, 4)).unwrap_or(0.0) - 1.0).abs() < 1e-6);
        engine.advance(secs(1));
        assert!((engine.movement_cost(origin, TilePos::new(4, 4)).unwrap_or(0.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_evaluate_tile_baseline_formula() {
        let mut engine = TerrainEngine::blank(8, 8);
        let pos = TilePos::new(2, 2);
        if let Some(tile) = engine.tile_at_mut(pos) {
            tile.resource = Some(ResourceType::Energy);
            tile.elevation = 10.0;
            tile.defense_bonus = 0.5;
            tile.visibility_modifier = 0.25;
            tile.feature = Some(TerrainFeature::Chokepoint);
        }
        let tile = engine.tile_at(pos).expect("tile").clone();
        // 50 + 3 + 15 + 5 + 60
        assert!((engine.evaluate_tile_for_ai(&tile) - 133.0).abs() < 1e-4);

        engine.insert_anomaly(DynamicAnomaly::new(
            AnomalyId(0),
            AnomalyKind::ResourceFlux,
            pos,
            2,
            Frequency::Continuous,
            secs(1),
            AnomalyKind::ResourceFlux.default_effect(),
        ));
        engine.advance(secs(0));
        assert!((engine.evaluate_tile_for_ai(&tile) - 193.0).abs() < 1e-4);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut engine = TerrainEngine::generate_from_spec(&spec_with_everything(9));
        engine.advance(secs(12));
        let bytes = engine.serialize().expect("serialize");
        let restored = TerrainEngine::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored.state_hash(), engine.state_hash());
        assert_eq!(restored, engine);
    }
}

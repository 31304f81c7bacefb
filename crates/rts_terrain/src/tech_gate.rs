//! Territorial technology gating and reversible terrain manipulation.
//!
//! The gate tracks which player holds which tile and since when. A tech is
//! unlocked by holding a qualifying tile (matching feature and/or biome) for a
//! continuous duration, optionally next to enough resource tiles of one type.
//!
//! Terrain effects mutate a handful of fields on one tile and record the
//! original so a caller can revert them later. Nothing here runs on a timer:
//! callers poll [`TerrainTechGate::expired_effects`] and revert explicitly.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::{TerrainEngine, BRIDGE_MOVEMENT_MODIFIER};
use crate::error::{Result, TerrainError};
use crate::math::{fixed_serde, option_fixed_serde, seconds, seconds_serde, Fixed, GameTime};
use crate::tile::{Biome, ResourceType, TerrainFeature, Tile, TilePos};

/// Player identifier.
pub type PlayerId = u32;

/// Movement modifier of frozen water.
pub const FROZEN_MOVEMENT_MODIFIER: f32 = 0.8;
/// Defense written onto a constructed bridge.
pub const BRIDGE_DEFENSE_BONUS: f32 = 0.3;
/// Defense added by fortification.
pub const FORTIFY_DEFENSE_BONUS: f32 = 0.25;

/// Who holds a tile and since when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileControl {
    /// Owning player.
    pub player: PlayerId,
    /// Start of uninterrupted control.
    #[serde(with = "fixed_serde")]
    pub since: GameTime,
}

/// Resource-adjacency requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacentResource {
    /// Resource type to count.
    pub resource: ResourceType,
    /// Minimum matching tiles in the 3x3 neighbourhood.
    pub count: u32,
}

/// Static unlock requirement of one tech.
///
/// # Example RON
///
/// ```ron
/// {
///     "crystal_resonance": TechRequirement(
///         target_biome: Some(crystal_field),
///         required_duration: 60.0,
///         adjacent_resource: Some(AdjacentResource(resource: crystal, count: 2)),
///     ),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechRequirement {
    /// Feature the held tile must carry.
    #[serde(default)]
    pub target_feature: Option<TerrainFeature>,
    /// Biome the held tile must have.
    #[serde(default)]
    pub target_biome: Option<Biome>,
    /// Continuous control needed, in seconds.
    #[serde(with = "seconds_serde")]
    pub required_duration: GameTime,
    /// Optional resource-adjacency requirement.
    #[serde(default)]
    pub adjacent_resource: Option<AdjacentResource>,
}

impl TechRequirement {
    /// Whether a tile satisfies the feature and biome filters.
    #[must_use]
    pub fn qualifies(&self, tile: &Tile) -> bool {
        self.target_feature.map_or(true, |f| tile.has_feature(f))
            && self.target_biome.map_or(true, |b| tile.biome == b)
    }
}

/// Result of a tech availability query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechAvailability {
    /// Whether the tech can be used now.
    pub available: bool,
    /// Why it is unavailable.
    pub reason: Option<String>,
    /// Fraction of the duration requirement met, in `[0, 1]`.
    pub progress: f32,
}

impl TechAvailability {
    fn unlocked() -> Self {
        Self {
            available: true,
            reason: None,
            progress: 1.0,
        }
    }

    fn locked(reason: String, progress: f32) -> Self {
        Self {
            available: false,
            reason: Some(reason),
            progress,
        }
    }
}

/// A reversible terrain manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainEffect {
    /// Make water passable for a while.
    Freeze {
        /// How long the ice holds.
        #[serde(with = "seconds_serde")]
        duration: GameTime,
    },
    /// Span water or swamp.
    Bridge,
    /// Strip forest cover.
    Clear,
    /// Harden a chokepoint or high ground.
    Fortify,
}

impl TerrainEffect {
    /// Effect name for messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Freeze { .. } => "freeze",
            Self::Bridge => "bridge",
            Self::Clear => "clear",
            Self::Fortify => "fortify",
        }
    }

    /// Check the target tile, returning why it does not qualify.
    fn check_target(self, tile: &Tile) -> std::result::Result<(), String> {
        let ok = match self {
            Self::Freeze { .. } => tile.biome == Biome::Water,
            Self::Bridge => matches!(tile.biome, Biome::Water | Biome::Swamp),
            Self::Clear => tile.biome == Biome::Forest,
            Self::Fortify => {
                tile.has_feature(TerrainFeature::Chokepoint) || tile.has_feature(TerrainFeature::HighGround)
            }
        };
        if ok {
            return Ok(());
        }
        Err(match self {
            Self::Freeze { .. } => format!("needs water, found {}", tile.biome.name()),
            Self::Bridge => format!("needs water or swamp, found {}", tile.biome.name()),
            Self::Clear => format!("needs forest, found {}", tile.biome.name()),
            Self::Fortify => "needs a chokepoint or high ground".to_string(),
        })
    }

    fn mutate(self, tile: &mut Tile, game_time: GameTime) {
        match self {
            Self::Freeze { duration } => {
                tile.passable = true;
                tile.movement_modifier = FROZEN_MOVEMENT_MODIFIER;
                tile.metadata.insert(
                    "frozen_until".to_string(),
                    format!("{:.1}", (game_time + duration).to_num::<f64>()),
                );
            }
            Self::Bridge => {
                tile.passable = true;
                tile.feature = Some(TerrainFeature::Bridge);
                tile.movement_modifier = BRIDGE_MOVEMENT_MODIFIER;
                tile.defense_bonus = BRIDGE_DEFENSE_BONUS;
            }
            Self::Clear => {
                tile.visibility_modifier = 0.0;
                tile.movement_modifier = 1.0;
            }
            Self::Fortify => tile.add_defense(FORTIFY_DEFENSE_BONUS),
        }
    }
}

/// Bookkeeping for an applied effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedEffect {
    /// Target tile.
    pub pos: TilePos,
    /// Most recent effect applied to the tile.
    pub effect: TerrainEffect,
    /// When it was applied.
    #[serde(with = "fixed_serde")]
    pub applied_at: GameTime,
    /// When it is due for reversion, if it expires.
    #[serde(with = "option_fixed_serde")]
    pub expires_at: Option<GameTime>,
    /// Tile as it was before the first effect.
    pub original: Tile,
}

/// Built-in requirement table.
#[must_use]
pub fn default_requirements() -> BTreeMap<String, TechRequirement> {
    let entries = [
        (
            "fortified_positions",
            TechRequirement {
                target_feature: Some(TerrainFeature::Chokepoint),
                target_biome: None,
                required_duration: seconds(120.0),
                adjacent_resource: None,
            },
        ),
        (
            "elevated_artillery",
            TechRequirement {
                target_feature: Some(TerrainFeature::HighGround),
                target_biome: None,
                required_duration: seconds(90.0),
                adjacent_resource: None,
            },
        ),
        (
            "crystal_resonance",
            TechRequirement {
                target_feature: None,
                target_biome: Some(Biome::CrystalField),
                required_duration: seconds(60.0),
                adjacent_resource: Some(AdjacentResource {
                    resource: ResourceType::Crystal,
                    count: 2,
                }),
            },
        ),
        (
            "cryo_engineering",
            TechRequirement {
                target_feature: None,
                target_biome: Some(Biome::Tundra),
                required_duration: seconds(60.0),
                adjacent_resource: None,
            },
        ),
        (
            "thermal_tapping",
            TechRequirement {
                target_feature: None,
                target_biome: Some(Biome::Lava),
                required_duration: seconds(45.0),
                adjacent_resource: Some(AdjacentResource {
                    resource: ResourceType::Energy,
                    count: 1,
                }),
            },
        ),
        (
            "quantum_stabilization",
            TechRequirement {
                target_feature: Some(TerrainFeature::Objective),
                target_biome: None,
                required_duration: seconds(180.0),
                adjacent_resource: None,
            },
        ),
    ];
    entries
        .into_iter()
        .map(|(id, req)| (id.to_string(), req))
        .collect()
}

/// Territorial tech gate for one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainTechGate {
    controlled: BTreeMap<TilePos, TileControl>,
    requirements: BTreeMap<String, TechRequirement>,
    effects: BTreeMap<TilePos, AppliedEffect>,
}

impl Default for TerrainTechGate {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainTechGate {
    /// Gate with the built-in requirement table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_requirements(default_requirements())
    }

    /// Gate with a custom requirement table.
    #[must_use]
    pub fn with_requirements(requirements: BTreeMap<String, TechRequirement>) -> Self {
        Self {
            controlled: BTreeMap::new(),
            requirements,
            effects: BTreeMap::new(),
        }
    }

    /// Load a requirement table from a RON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_requirements<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| TerrainError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::requirements_from_ron(&contents, &path.display().to_string())
    }

    /// Parse a requirement table from RON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the RON is malformed.
    pub fn requirements_from_ron(ron: &str, label: &str) -> Result<Self> {
        let requirements: BTreeMap<String, TechRequirement> =
            ron::from_str(ron).map_err(|e| TerrainError::DataParseError {
                path: label.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::with_requirements(requirements))
    }

    /// Requirement table.
    #[must_use]
    pub const fn requirements(&self) -> &BTreeMap<String, TechRequirement> {
        &self.requirements
    }

    // =========================================================================
    // Control registry
    // =========================================================================

    /// Record that `player` holds `pos`.
    ///
    /// Re-registering the current owner keeps the original start time; a new
    /// owner restarts the clock.
    pub fn register_tile_control(&mut self, pos: TilePos, player: PlayerId, game_time: GameTime) {
        match self.controlled.get(&pos) {
            Some(control) if control.player == player => {}
            previous => {
                tracing::debug!(
                    tile = %pos,
                    player,
                    previous_owner = previous.map(|c| c.player),
                    "Tile control changed"
                );
                self.controlled.insert(
                    pos,
                    TileControl {
                        player,
                        since: game_time,
                    },
                );
            }
        }
    }

    /// Forget control of `pos`. Returns the removed entry.
    pub fn remove_tile_control(&mut self, pos: TilePos) -> Option<TileControl> {
        self.controlled.remove(&pos)
    }

    /// Control entry of a tile.
    #[must_use]
    pub fn control_of(&self, pos: TilePos) -> Option<&TileControl> {
        self.controlled.get(&pos)
    }

    /// Number of controlled tiles.
    #[must_use]
    pub fn controlled_count(&self) -> usize {
        self.controlled.len()
    }

    // =========================================================================
    // Availability
    // =========================================================================

    /// Whether `player` has unlocked `tech_id` at `game_time`.
    ///
    /// Techs without a registered requirement are always available. The
    /// player's longest-held qualifying tile decides the outcome.
    #[must_use]
    pub fn is_tech_available(
        &self,
        tech_id: &str,
        player: PlayerId,
        game_time: GameTime,
        engine: &TerrainEngine,
    ) -> TechAvailability {
        let Some(req) = self.requirements.get(tech_id) else {
            return TechAvailability::unlocked();
        };

        let earliest = self
            .controlled
            .iter()
            .filter(|(_, control)| control.player == player)
            .filter(|(pos, _)| engine.tile_at(**pos).is_some_and(|tile| req.qualifies(tile)))
            .min_by_key(|(pos, control)| (control.since, **pos));

        let Some((&pos, control)) = earliest else {
            return TechAvailability::locked(
                format!("{tech_id} requires control of a qualifying tile"),
                0.0,
            );
        };

        let held = (game_time - control.since).max(Fixed::ZERO);
        let progress = if req.required_duration <= Fixed::ZERO {
            1.0
        } else {
            held.checked_div(req.required_duration)
                .map_or(1.0, |ratio| ratio.to_num::<f32>().min(1.0))
        };

        if held < req.required_duration {
            let remaining = (req.required_duration - held).to_num::<f32>();
            return TechAvailability::locked(
                format!("hold {pos} for {remaining:.1}s more"),
                progress,
            );
        }

        if let Some(adjacent) = req.adjacent_resource {
            let found = count_adjacent(engine, pos, adjacent.resource);
            if found < adjacent.count {
                return TechAvailability::locked(
                    format!(
                        "needs {} {:?} tiles next to {pos}, found {found}",
                        adjacent.count, adjacent.resource
                    ),
                    progress,
                );
            }
        }

        TechAvailability::unlocked()
    }

    // =========================================================================
    // Terrain effects
    // =========================================================================

    /// Apply a reversible effect to one tile.
    ///
    /// The first effect on a tile records the untouched original; later
    /// effects on the same tile keep it so a single revert restores the tile.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::OutOfBounds`] for positions off the grid and
    /// [`TerrainError::EffectTargetMismatch`] if the tile does not qualify.
    pub fn apply_effect(
        &mut self,
        engine: &mut TerrainEngine,
        pos: TilePos,
        effect: TerrainEffect,
        game_time: GameTime,
    ) -> Result<AppliedEffect> {
        let tile = engine.tile_at_mut(pos).ok_or(TerrainError::OutOfBounds(pos))?;
        effect
            .check_target(tile)
            .map_err(|reason| TerrainError::EffectTargetMismatch {
                effect: effect.name().to_string(),
                pos,
                reason,
            })?;

        let existing = self.effects.get(&pos);
        let original = existing.map_or_else(|| tile.clone(), |e| e.original.clone());
        effect.mutate(tile, game_time);

        // Stacked effects keep the earliest pending expiry.
        let expires_at = match (existing.and_then(|e| e.expires_at), effect) {
            (Some(pending), TerrainEffect::Freeze { duration }) => {
                Some(pending.min(game_time + duration))
            }
            (None, TerrainEffect::Freeze { duration }) => Some(game_time + duration),
            (pending, _) => pending,
        };
        let applied = AppliedEffect {
            pos,
            effect,
            applied_at: game_time,
            expires_at,
            original,
        };
        tracing::debug!(tile = %pos, effect = effect.name(), "Terrain effect applied");
        self.effects.insert(pos, applied.clone());
        Ok(applied)
    }

    /// Tiles whose effects are due for reversion at `game_time`.
    #[must_use]
    pub fn expired_effects(&self, game_time: GameTime) -> Vec<TilePos> {
        self.effects
            .values()
            .filter(|e| e.expires_at.is_some_and(|t| t <= game_time))
            .map(|e| e.pos)
            .collect()
    }

    /// Recorded effect on a tile.
    #[must_use]
    pub fn effect_at(&self, pos: TilePos) -> Option<&AppliedEffect> {
        self.effects.get(&pos)
    }

    /// Restore a tile to its state before any recorded effect.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::NoEffectRecorded`] if nothing was applied at `pos`.
    pub fn revert_effect(&mut self, engine: &mut TerrainEngine, pos: TilePos) -> Result<AppliedEffect> {
        let applied = self
            .effects
            .remove(&pos)
            .ok_or(TerrainError::NoEffectRecorded(pos))?;
        let tile = engine.tile_at_mut(pos).ok_or(TerrainError::OutOfBounds(pos))?;
        *tile = applied.original.clone();
        tracing::debug!(tile = %pos, effect = applied.effect.name(), "Terrain effect reverted");
        Ok(applied)
    }
}

fn count_adjacent(engine: &TerrainEngine, center: TilePos, resource: ResourceType) -> u32 {
    let mut count = 0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            if engine
                .tile_at(center.offset(dx, dy))
                .is_some_and(|t| t.resource == Some(resource))
            {
                count += 1;
            }
        }
    }
    count
}

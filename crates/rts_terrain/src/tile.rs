//! Tile grid data model: coordinates, biomes, resources and feature tags.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Grid coordinate of a tile.
///
/// Ordered row-major (`y` first) so registries keyed by position iterate in
/// the same order as the grid itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TilePos {
    /// Row-major ordering compares `y` before `x`.
    pub y: i32,
    /// Column.
    pub x: i32,
}

impl TilePos {
    /// Create a new tile position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { y, x }
    }

    /// Euclidean distance to another tile.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Squared Euclidean distance (exact integer math).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }

    /// Chebyshev (king-move) distance.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Position offset by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl From<(i32, i32)> for TilePos {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl From<[i32; 2]> for TilePos {
    fn from([x, y]: [i32; 2]) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Closed set of biomes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    /// Open grassland, the fallback biome.
    #[default]
    Plains,
    /// Woodland, cover and reduced sight lines.
    Forest,
    /// Arid flats with long sight lines.
    Desert,
    /// Frozen ground.
    Tundra,
    /// Bogs: poor visibility and slow going.
    Swamp,
    /// Impact craters with natural defensive walls.
    Crater,
    /// Volcanic fields.
    Lava,
    /// Crystal formations.
    CrystalField,
    /// Open water, impassable without a bridge or freeze.
    Water,
}

/// Static per-biome tile modifiers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiomeProfile {
    /// Damage-reduction multiplier.
    pub defense_bonus: f32,
    /// Line-of-sight modifier.
    pub visibility_modifier: f32,
    /// Movement speed multiplier (1.0 = baseline).
    pub movement_modifier: f32,
    /// Whether ground units can enter.
    pub passable: bool,
    /// Whether structures can be placed.
    pub buildable: bool,
}

impl Biome {
    /// Every biome, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Plains,
        Self::Forest,
        Self::Desert,
        Self::Tundra,
        Self::Swamp,
        Self::Crater,
        Self::Lava,
        Self::CrystalField,
        Self::Water,
    ];

    /// Parse a biome name as written in map specs.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let biome = match name.trim().to_ascii_lowercase().as_str() {
            "plains" | "grassland" => Self::Plains,
            "forest" => Self::Forest,
            "desert" => Self::Desert,
            "tundra" | "ice" => Self::Tundra,
            "swamp" => Self::Swamp,
            "crater" => Self::Crater,
            "lava" | "volcanic" => Self::Lava,
            "crystal_field" | "crystal" => Self::CrystalField,
            "water" => Self::Water,
            _ => return None,
        };
        Some(biome)
    }

    /// Canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plains => "plains",
            Self::Forest => "forest",
            Self::Desert => "desert",
            Self::Tundra => "tundra",
            Self::Swamp => "swamp",
            Self::Crater => "crater",
            Self::Lava => "lava",
            Self::CrystalField => "crystal_field",
            Self::Water => "water",
        }
    }

    /// Static modifiers applied when a tile of this biome is created.
    #[must_use]
    pub const fn profile(self) -> BiomeProfile {
        let (defense_bonus, visibility_modifier, movement_modifier, passable, buildable) =
            match self {
                Self::Plains => (0.0, 0.0, 1.0, true, true),
                Self::Forest => (0.2, -0.3, 0.8, true, true),
                Self::Desert => (0.0, 0.2, 0.9, true, true),
                Self::Tundra => (0.1, 0.1, 0.7, true, true),
                Self::Swamp => (0.1, -0.4, 0.5, true, false),
                Self::Crater => (0.5, -0.1, 0.8, true, true),
                Self::Lava => (0.0, 0.1, 0.3, true, false),
                Self::CrystalField => (0.2, 0.3, 0.9, true, true),
                Self::Water => (0.0, 0.3, 0.4, false, false),
            };
        BiomeProfile {
            defense_bonus,
            visibility_modifier,
            movement_modifier,
            passable,
            buildable,
        }
    }

    /// Single character used by ASCII previews.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Plains => '.',
            Self::Forest => 'f',
            Self::Desert => ':',
            Self::Tundra => '-',
            Self::Swamp => '%',
            Self::Crater => 'o',
            Self::Lava => '~',
            Self::CrystalField => '*',
            Self::Water => 'w',
        }
    }
}

/// Harvestable resource types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Energy wells.
    Energy,
    /// Mineral deposits.
    Minerals,
    /// Crystal outcrops.
    Crystal,
    /// Organic biomass.
    Biomass,
    /// Rare quantum cores.
    QuantumCore,
}

impl ResourceType {
    /// Every resource type.
    pub const ALL: [Self; 5] = [
        Self::Energy,
        Self::Minerals,
        Self::Crystal,
        Self::Biomass,
        Self::QuantumCore,
    ];

    /// Parse a resource name as written in map specs.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let resource = match name.trim().to_ascii_lowercase().as_str() {
            "energy" => Self::Energy,
            "minerals" | "mineral" | "ore" => Self::Minerals,
            "crystal" | "crystals" => Self::Crystal,
            "biomass" => Self::Biomass,
            "quantum_core" | "quantum" => Self::QuantumCore,
            _ => return None,
        };
        Some(resource)
    }
}

/// Feature tag stamped onto a tile during generation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TerrainFeature {
    /// Tactical bottleneck.
    Chokepoint,
    /// Elevated region.
    HighGround,
    /// Maximum-value capture target.
    Objective,
    /// Crossing with fixed defense and a speed bonus.
    Bridge,
    /// Central caldera floor.
    Caldera,
    /// Vision-granting tower.
    ScoutTower,
    /// Vision-gated objective.
    HiddenVault,
    /// Low-passability canyon barrier.
    Canyon,
    /// Winding corridor lane.
    Corridor,
    /// Linear resource chain.
    ResourceVein,
    /// Unstable quantum region.
    QuantumFracture,
}

impl TerrainFeature {
    /// Stamp priority; a lower-priority stamp never replaces a higher one.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Objective | Self::HiddenVault => 3,
            Self::Chokepoint => 2,
            Self::HighGround => 1,
            _ => 0,
        }
    }

    /// Fixed AI scoring bonus for the feature.
    #[must_use]
    pub const fn score_bonus(self) -> f32 {
        match self {
            Self::Objective | Self::HiddenVault => 100.0,
            Self::Chokepoint => 60.0,
            Self::HighGround => 40.0,
            _ => 0.0,
        }
    }

    /// Single character used by ASCII previews.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Chokepoint => 'C',
            Self::HighGround => '^',
            Self::Objective => 'O',
            Self::Bridge => '=',
            Self::Caldera => 'U',
            Self::ScoutTower => 'T',
            Self::HiddenVault => 'V',
            Self::Canyon => '#',
            Self::Corridor => '_',
            Self::ResourceVein => 'r',
            Self::QuantumFracture => 'Q',
        }
    }
}

/// One cell of the terrain grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Grid coordinate.
    pub pos: TilePos,
    /// Elevation in `[-100, 100]`.
    pub elevation: f32,
    /// Biome.
    pub biome: Biome,
    /// Harvestable resource, if any.
    pub resource: Option<ResourceType>,
    /// Damage-reduction multiplier in `[0, 1]`.
    pub defense_bonus: f32,
    /// Line-of-sight modifier in `[-1, 1]`.
    pub visibility_modifier: f32,
    /// Movement speed multiplier in `[0, 2]`.
    pub movement_modifier: f32,
    /// Whether ground units can enter.
    pub passable: bool,
    /// Whether structures can be placed.
    pub buildable: bool,
    /// Additive strategic value in `[0, 100]`.
    pub strategic_value: f32,
    /// Stamped feature tag.
    pub feature: Option<TerrainFeature>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Narrative lore references.
    #[serde(default)]
    pub lore: Vec<String>,
}

impl Tile {
    /// Create a tile with the biome's static modifiers.
    #[must_use]
    pub fn new(pos: TilePos, biome: Biome, elevation: f32) -> Self {
        let profile = biome.profile();
        Self {
            pos,
            elevation: elevation.clamp(-100.0, 100.0),
            biome,
            resource: None,
            defense_bonus: profile.defense_bonus,
            visibility_modifier: profile.visibility_modifier,
            movement_modifier: profile.movement_modifier,
            passable: profile.passable,
            buildable: profile.buildable,
            strategic_value: 0.0,
            feature: None,
            metadata: BTreeMap::new(),
            lore: Vec::new(),
        }
    }

    /// Re-seed biome-derived modifiers after a biome change during generation.
    pub fn set_biome(&mut self, biome: Biome) {
        let profile = biome.profile();
        self.biome = biome;
        self.defense_bonus = profile.defense_bonus;
        self.visibility_modifier = profile.visibility_modifier;
        self.movement_modifier = profile.movement_modifier;
        self.passable = profile.passable;
        self.buildable = profile.buildable;
    }

    /// Add strategic value, clamped to `[0, 100]`.
    pub fn add_strategic_value(&mut self, amount: f32) {
        self.strategic_value = (self.strategic_value + amount).clamp(0.0, 100.0);
    }

    /// Add elevation, clamped to `[-100, 100]`.
    pub fn add_elevation(&mut self, amount: f32) {
        self.elevation = (self.elevation + amount).clamp(-100.0, 100.0);
    }

    /// Add defense, clamped to `[0, 1]`.
    pub fn add_defense(&mut self, amount: f32) {
        self.defense_bonus = (self.defense_bonus + amount).clamp(0.0, 1.0);
    }

    /// Add visibility, clamped to `[-1, 1]`.
    pub fn add_visibility(&mut self, amount: f32) {
        self.visibility_modifier = (self.visibility_modifier + amount).clamp(-1.0, 1.0);
    }

    /// Tag the tile unless it already carries a higher-priority feature.
    ///
    /// Returns `true` if the tag was applied.
    pub fn stamp_feature(&mut self, feature: TerrainFeature) -> bool {
        match self.feature {
            Some(existing) if existing.priority() > feature.priority() => false,
            _ => {
                self.feature = Some(feature);
                true
            }
        }
    }

    /// Whether the tile carries the given feature.
    #[must_use]
    pub fn has_feature(&self, feature: TerrainFeature) -> bool {
        self.feature == Some(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_pos_orders_row_major() {
        let mut positions = vec![TilePos::new(5, 1), TilePos::new(0, 2), TilePos::new(9, 0)];
        positions.sort();
        assert_eq!(
            positions,
            vec![TilePos::new(9, 0), TilePos::new(5, 1), TilePos::new(0, 2)]
        );
    }

    #[test]
    fn test_biome_profiles_match_terrain_character() {
        let swamp = Biome::Swamp.profile();
        assert!(swamp.visibility_modifier < 0.0);
        assert!(swamp.movement_modifier < 1.0);

        let crater = Biome::Crater.profile();
        assert!(crater.defense_bonus >= 0.5);

        let lava = Biome::Lava.profile();
        assert!(lava.movement_modifier < 0.5);
        assert!(!lava.buildable);
    }

    #[test]
    fn test_biome_names_round_trip() {
        for biome in Biome::ALL {
            assert_eq!(Biome::from_name(biome.name()), Some(biome));
        }
        assert_eq!(Biome::from_name("marshmallow"), None);
    }

    #[test]
    fn test_stamp_respects_priority() {
        let mut tile = Tile::new(TilePos::new(0, 0), Biome::Plains, 0.0);
        assert!(tile.stamp_feature(TerrainFeature::Objective));
        assert!(!tile.stamp_feature(TerrainFeature::Chokepoint));
        assert_eq!(tile.feature, Some(TerrainFeature::Objective));

        let mut tile = Tile::new(TilePos::new(0, 0), Biome::Plains, 0.0);
        assert!(tile.stamp_feature(TerrainFeature::HighGround));
        assert!(tile.stamp_feature(TerrainFeature::Chokepoint));
        assert_eq!(tile.feature, Some(TerrainFeature::Chokepoint));
    }

    #[test]
    fn test_value_clamps() {
        let mut tile = Tile::new(TilePos::new(0, 0), Biome::Plains, 95.0);
        tile.add_elevation(50.0);
        tile.add_strategic_value(250.0);
        tile.add_defense(3.0);
        tile.add_visibility(-4.0);
        assert_eq!(tile.elevation, 100.0);
        assert_eq!(tile.strategic_value, 100.0);
        assert_eq!(tile.defense_bonus, 1.0);
        assert_eq!(tile.visibility_modifier, -1.0);
    }
}

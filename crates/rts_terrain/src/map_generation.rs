//! Procedural map synthesis driven by a terrain personality.
//!
//! Generates complete maps without a hand-authored spec:
//! - A personality-specific layout (aggressive, defensive, economic, puzzle)
//! - Strategic chokepoints, quantum fractures and resource veins
//! - A general elevation map of mountains, valleys and plateaus
//! - A rasterized tile grid compatible with [`TerrainEngine`](crate::engine::TerrainEngine) tiles
//! - Four "strategic DNA" scalars summarizing the result
//!
//! Positions are in world units (`cell * cell_size`); the tile grid is in cells.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::math::{Fixed, Vec2Fixed};
use crate::rng::DeterministicRng;
use crate::tile::{Biome, ResourceType, TerrainFeature, Tile, TilePos};

/// Richness of the node every layout places at the map center.
pub const CENTRAL_NODE_RICHNESS: f32 = 75.0;
/// Chokepoint count that maps to full defensiveness.
pub const DEFENSIVENESS_TARGET: f32 = 5.0;
/// Feature count that maps to full complexity.
pub const COMPLEXITY_TARGET: f32 = 20.0;

/// Overall tactical character of a generated map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainPersonality {
    /// Dense central resources, flat ground, close starts.
    Aggressive,
    /// Winding corridors with fortified midpoints, far starts.
    Defensive,
    /// Rich radial resource clusters.
    Economic,
    /// Sections split by canyon barriers.
    Puzzle,
}

impl TerrainPersonality {
    /// Every personality.
    pub const ALL: [Self; 4] = [Self::Aggressive, Self::Defensive, Self::Economic, Self::Puzzle];

    /// Parse a personality name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "aggressive" => Some(Self::Aggressive),
            "defensive" => Some(Self::Defensive),
            "economic" => Some(Self::Economic),
            "puzzle" => Some(Self::Puzzle),
            _ => None,
        }
    }
}

/// Map configuration for procedural generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Map width in cells.
    pub width: u32,
    /// Map height in cells.
    pub height: u32,
    /// Cell size in world units.
    pub cell_size: u32,
    /// Random seed for deterministic generation.
    pub seed: u64,
    /// Forced personality; drawn from the seed when `None`.
    pub personality: Option<TerrainPersonality>,
    /// Forced base biome; drawn from the seed when `None`.
    pub biome: Option<Biome>,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            cell_size: 16,
            seed: 12345,
            personality: None,
            biome: None,
        }
    }
}

impl MapConfig {
    /// Create a small map (1024x1024 world units).
    #[must_use]
    pub fn small() -> Self {
        Self::default()
    }

    /// Create a medium map (1536x1536 world units).
    #[must_use]
    pub fn medium() -> Self {
        Self {
            width: 96,
            height: 96,
            ..Default::default()
        }
    }

    /// Create a large map (2048x2048 world units).
    #[must_use]
    pub fn large() -> Self {
        Self {
            width: 128,
            height: 128,
            ..Default::default()
        }
    }

    /// Set the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Force a personality.
    #[must_use]
    pub const fn with_personality(mut self, personality: TerrainPersonality) -> Self {
        self.personality = Some(personality);
        self
    }

    /// Force a base biome.
    #[must_use]
    pub const fn with_biome(mut self, biome: Biome) -> Self {
        self.biome = Some(biome);
        self
    }

    /// Map width in world units.
    #[must_use]
    pub fn world_width(&self) -> f32 {
        (self.width.max(1) * self.cell_size.max(1)) as f32
    }

    /// Map height in world units.
    #[must_use]
    pub fn world_height(&self) -> f32 {
        (self.height.max(1) * self.cell_size.max(1)) as f32
    }
}

/// A harvestable node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Position in world units.
    pub position: Vec2Fixed,
    /// Resource type.
    pub resource: ResourceType,
    /// Richness in `[0, 100]`.
    pub richness: f32,
}

/// A chokepoint with strength-derived modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicChokepoint {
    /// Center in world units.
    pub position: Vec2Fixed,
    /// Strength in `[50, 100]`.
    pub strength: f32,
    /// Radius in world units, `[30, 80]`.
    pub radius: f32,
    /// Fractional slowdown inside the radius.
    pub movement_penalty: f32,
    /// Defensive advantage for the holder.
    pub tactical_bonus: f32,
}

/// An unstable region of space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumFractureZone {
    /// Center in world units.
    pub position: Vec2Fixed,
    /// Strength in `[30, 70]`.
    pub strength: f32,
    /// Radius in world units.
    pub radius: f32,
    /// Chance a unit is displaced per crossing.
    pub teleport_chance: f32,
    /// Damage per second inside the zone.
    pub damage_over_time: f32,
    /// How erratic the zone's behaviour is, in `[0, 1]`.
    pub unpredictability: f32,
}

/// A linear chain of resource nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceVein {
    /// Node positions from start to end.
    pub nodes: Vec<Vec2Fixed>,
    /// Resource carried by the vein.
    pub resource: ResourceType,
    /// Direction in radians.
    pub direction: f32,
    /// Length in world units.
    pub length: f32,
}

/// Shape of an elevation feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationKind {
    /// Peak falling off linearly.
    Mountain,
    /// Depression falling off linearly.
    Valley,
    /// Flat raised disc.
    Plateau,
}

/// One feature of the elevation map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationFeature {
    /// Shape.
    pub kind: ElevationKind,
    /// Center in world units.
    pub position: Vec2Fixed,
    /// Radius in world units.
    pub radius: f32,
    /// Peak elevation change.
    pub height: f32,
}

/// Layout-level terrain stamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayoutStamp {
    /// Impassable rock outcrop.
    Obstacle {
        /// Center in world units.
        center: Vec2Fixed,
        /// Radius in world units.
        radius: f32,
    },
    /// Fortified ground with reduced passability.
    DefensivePosition {
        /// Center in world units.
        center: Vec2Fixed,
        /// Radius in world units.
        radius: f32,
    },
    /// Winding lane between opposite corners.
    Corridor {
        /// Polyline in world units.
        points: Vec<Vec2Fixed>,
    },
    /// Vertical low-passability barrier with one crossing.
    Canyon {
        /// Barrier x position in world units.
        x: f32,
        /// Barrier thickness in world units.
        width: f32,
        /// y position of the crossing in world units.
        gap_y: f32,
    },
}

/// What makes a strategic point interesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategicPointKind {
    /// Fixed-value node at the map center.
    CentralNode,
    /// Midpoint of a resource vein.
    ResourceVein,
    /// Fortified corridor midpoint.
    CorridorMidpoint,
}

/// A location worth contesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicPoint {
    /// Position in world units.
    pub position: Vec2Fixed,
    /// Category.
    pub kind: StrategicPointKind,
}

/// Summary scalars describing a map's tactical character, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StrategicDna {
    /// Mean pairwise node distance relative to half the map width.
    pub openness: f32,
    /// Chokepoint count relative to [`DEFENSIVENESS_TARGET`].
    pub defensiveness: f32,
    /// Mean node richness relative to 100.
    pub economic_value: f32,
    /// Terrain features plus strategic points relative to [`COMPLEXITY_TARGET`].
    pub complexity: f32,
}

/// Generated map data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedMap {
    /// Map configuration used.
    pub config: MapConfig,
    /// Personality actually used.
    pub personality: TerrainPersonality,
    /// Base biome actually used.
    pub biome: Biome,
    /// Tile grid (row-major order).
    pub tiles: Vec<Tile>,
    /// Every resource node, including vein nodes and the central node.
    pub resource_nodes: Vec<ResourceNode>,
    /// Layout stamps.
    pub layout: Vec<LayoutStamp>,
    /// Strategic chokepoints.
    pub chokepoints: Vec<StrategicChokepoint>,
    /// Quantum fractures.
    pub fractures: Vec<QuantumFractureZone>,
    /// Resource veins.
    pub veins: Vec<ResourceVein>,
    /// Elevation map features.
    pub elevation_features: Vec<ElevationFeature>,
    /// Strategic points.
    pub strategic_points: Vec<StrategicPoint>,
    /// Player start positions in world units.
    pub start_positions: Vec<Vec2Fixed>,
    /// Summary metrics.
    pub dna: StrategicDna,
}

impl SynthesizedMap {
    /// Tile at grid coordinates.
    #[must_use]
    pub fn tile(&self, x: i32, y: i32) -> Option<&Tile> {
        if x < 0 || y < 0 || x as u32 >= self.config.width || y as u32 >= self.config.height {
            return None;
        }
        self.tiles
            .get((y as usize) * (self.config.width as usize) + (x as usize))
    }

    /// Convert world coordinates to grid coordinates (clamped to the map).
    #[must_use]
    pub fn world_to_grid(&self, pos: Vec2Fixed) -> TilePos {
        world_to_grid(&self.config, pos)
    }

    /// Convert grid coordinates to world coordinates (center of cell).
    #[must_use]
    pub fn grid_to_world(&self, pos: TilePos) -> Vec2Fixed {
        let cell = Fixed::from_num(self.config.cell_size.max(1));
        let half = cell / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(pos.x) * cell + half,
            Fixed::from_num(pos.y) * cell + half,
        )
    }
}

fn world_to_grid(config: &MapConfig, pos: Vec2Fixed) -> TilePos {
    let cell = Fixed::from_num(config.cell_size.max(1));
    let x = (pos.x / cell).to_num::<i32>().clamp(0, config.width.max(1) as i32 - 1);
    let y = (pos.y / cell).to_num::<i32>().clamp(0, config.height.max(1) as i32 - 1);
    TilePos::new(x, y)
}

fn to_f32(v: Vec2Fixed) -> (f32, f32) {
    (v.x.to_num::<f32>(), v.y.to_num::<f32>())
}

/// Work-in-progress layout shared by the strategy functions.
struct Layout {
    nodes: Vec<ResourceNode>,
    stamps: Vec<LayoutStamp>,
    strategic_points: Vec<StrategicPoint>,
    starts: Vec<Vec2Fixed>,
    elevation_scale: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            stamps: Vec::new(),
            strategic_points: Vec::new(),
            starts: Vec::new(),
            elevation_scale: 1.0,
        }
    }

    fn push_node(&mut self, rng: &mut DeterministicRng, x: f32, y: f32, richness: (f32, f32)) {
        let resource = rng
            .choice(&ResourceType::ALL)
            .copied()
            .unwrap_or(ResourceType::Minerals);
        self.nodes.push(ResourceNode {
            position: Vec2Fixed::from_f32(x, y),
            resource,
            richness: rng.next_float(richness.0, richness.1).clamp(0.0, 100.0),
        });
    }
}

/// Generate a map with the given configuration.
#[must_use]
pub fn generate_map(config: MapConfig) -> SynthesizedMap {
    let mut rng = DeterministicRng::new(config.seed);

    let personality = config.personality.unwrap_or_else(|| {
        rng.choice(&TerrainPersonality::ALL)
            .copied()
            .unwrap_or(TerrainPersonality::Aggressive)
    });
    let land = &Biome::ALL[..Biome::ALL.len() - 1];
    let biome = config
        .biome
        .unwrap_or_else(|| rng.choice(land).copied().unwrap_or_default());

    let mut layout = match personality {
        TerrainPersonality::Aggressive => layout_aggressive(&config, &mut rng),
        TerrainPersonality::Defensive => layout_defensive(&config, &mut rng),
        TerrainPersonality::Economic => layout_economic(&config, &mut rng),
        TerrainPersonality::Puzzle => layout_puzzle(&config, &mut rng),
    };

    let center = Vec2Fixed::from_f32(config.world_width() / 2.0, config.world_height() / 2.0);
    layout.nodes.push(ResourceNode {
        position: center,
        resource: ResourceType::QuantumCore,
        richness: CENTRAL_NODE_RICHNESS,
    });
    layout.strategic_points.push(StrategicPoint {
        position: center,
        kind: StrategicPointKind::CentralNode,
    });

    let chokepoints = generate_chokepoints(&config, personality, &mut rng);
    let fractures = generate_fractures(&config, &mut rng);
    let veins = generate_veins(&config, &mut layout, &mut rng);
    let elevation_features = generate_elevation(&config, layout.elevation_scale, &mut rng);

    let tiles = rasterize(
        &config,
        biome,
        &layout,
        &chokepoints,
        &fractures,
        &veins,
        &elevation_features,
    );

    let mut map = SynthesizedMap {
        config,
        personality,
        biome,
        tiles,
        resource_nodes: layout.nodes,
        layout: layout.stamps,
        chokepoints,
        fractures,
        veins,
        elevation_features,
        strategic_points: layout.strategic_points,
        start_positions: layout.starts,
        dna: StrategicDna::default(),
    };
    map.dna = compute_dna(&map);

    tracing::info!(
        seed = map.config.seed,
        personality = ?map.personality,
        biome = ?map.biome,
        nodes = map.resource_nodes.len(),
        chokepoints = map.chokepoints.len(),
        openness = map.dna.openness,
        defensiveness = map.dna.defensiveness,
        economic_value = map.dna.economic_value,
        complexity = map.dna.complexity,
        "Procedural map synthesized"
    );

    map
}

// =============================================================================
// Layout strategies
// =============================================================================

fn layout_aggressive(config: &MapConfig, rng: &mut DeterministicRng) -> Layout {
    let (w, h) = (config.world_width(), config.world_height());
    let mut layout = Layout::new();
    layout.elevation_scale = 0.3;

    let count = rng.next_int(12, 20);
    for _ in 0..count {
        let x = rng.next_float(0.15 * w, 0.85 * w);
        let y = rng.next_float(0.15 * h, 0.85 * h);
        layout.push_node(rng, x, y, (40.0, 70.0));
    }

    for _ in 0..rng.next_int(0, 2) {
        let center = Vec2Fixed::from_f32(rng.next_float(0.1 * w, 0.9 * w), rng.next_float(0.1 * h, 0.9 * h));
        let radius = rng.next_float(0.02 * w, 0.04 * w);
        layout.stamps.push(LayoutStamp::Obstacle { center, radius });
    }

    let offset = rng.next_float(0.12, 0.18) * w;
    layout.starts = vec![
        Vec2Fixed::from_f32(w / 2.0 - offset, h / 2.0),
        Vec2Fixed::from_f32(w / 2.0 + offset, h / 2.0),
    ];
    layout
}

fn layout_defensive(config: &MapConfig, rng: &mut DeterministicRng) -> Layout {
    let (w, h) = (config.world_width(), config.world_height());
    let mut layout = Layout::new();
    let (sx, sy) = (0.1 * w, 0.1 * h);
    let (ex, ey) = (0.9 * w, 0.9 * h);
    let (dx, dy) = (ex - sx, ey - sy);
    let len = (dx * dx + dy * dy).sqrt().max(1.0);
    let (nx, ny) = (-dy / len, dx / len);

    let corridors = rng.next_int(3, 5);
    for _ in 0..corridors {
        let amplitude = rng.next_float(-0.25, 0.25) * w;
        let waves = rng.next_float(1.0, 3.0);
        let phase = rng.next_float(0.0, TAU);
        let steps = 12;
        let points: Vec<Vec2Fixed> = (0..=steps)
            .map(|i| {
                let t = i as f32 / steps as f32;
                // Envelope pins both ends to the corners.
                let bend = amplitude * (t * std::f32::consts::PI).sin() * (waves * TAU * t + phase).cos();
                Vec2Fixed::from_f32(sx + dx * t + nx * bend, sy + dy * t + ny * bend)
            })
            .collect();

        let per_corridor = rng.next_int(3, 5);
        for _ in 0..per_corridor {
            let idx = rng.next_int(1, steps - 1) as usize;
            let (x, y) = to_f32(points[idx]);
            layout.push_node(rng, x, y, (40.0, 80.0));
        }

        let midpoint = points[steps as usize / 2];
        layout.stamps.push(LayoutStamp::DefensivePosition {
            center: midpoint,
            radius: rng.next_float(0.03 * w, 0.05 * w),
        });
        layout.strategic_points.push(StrategicPoint {
            position: midpoint,
            kind: StrategicPointKind::CorridorMidpoint,
        });
        layout.stamps.push(LayoutStamp::Corridor { points });
    }

    layout.starts = vec![Vec2Fixed::from_f32(sx, sy), Vec2Fixed::from_f32(ex, ey)];
    layout
}

fn layout_economic(config: &MapConfig, rng: &mut DeterministicRng) -> Layout {
    let (w, h) = (config.world_width(), config.world_height());
    let mut layout = Layout::new();

    let clusters = rng.next_int(4, 6);
    let mut centers = Vec::new();
    for _ in 0..clusters {
        let cx = rng.next_float(0.15 * w, 0.85 * w);
        let cy = rng.next_float(0.15 * h, 0.85 * h);
        let radius = rng.next_float(0.05 * w, 0.1 * w);
        for _ in 0..rng.next_int(3, 6) {
            let angle = rng.next_float(0.0, TAU);
            let dist = rng.next_float(0.0, radius);
            layout.push_node(rng, cx + angle.cos() * dist, cy + angle.sin() * dist, (60.0, 100.0));
        }
        centers.push((cx, cy));
    }

    // Each start leans halfway from its corner toward the nearest cluster.
    for (corner_x, corner_y) in [(0.1 * w, 0.1 * h), (0.9 * w, 0.9 * h)] {
        let nearest = centers
            .iter()
            .copied()
            .min_by(|a, b| {
                let da = (a.0 - corner_x).powi(2) + (a.1 - corner_y).powi(2);
                let db = (b.0 - corner_x).powi(2) + (b.1 - corner_y).powi(2);
                da.total_cmp(&db)
            })
            .unwrap_or((corner_x, corner_y));
        layout.starts.push(Vec2Fixed::from_f32(
            (corner_x + nearest.0) / 2.0,
            (corner_y + nearest.1) / 2.0,
        ));
    }
    layout
}

fn layout_puzzle(config: &MapConfig, rng: &mut DeterministicRng) -> Layout {
    let (w, h) = (config.world_width(), config.world_height());
    let mut layout = Layout::new();

    let sections = rng.next_int(3, 5);
    let section_w = w / sections as f32;
    let canyon_w = (config.cell_size.max(1) * 2) as f32;

    for s in 0..sections {
        let left = s as f32 * section_w;
        if s > 0 {
            layout.stamps.push(LayoutStamp::Canyon {
                x: left,
                width: canyon_w,
                gap_y: rng.next_float(0.2 * h, 0.8 * h),
            });
        }
        for _ in 0..rng.next_int(2, 4) {
            let x = rng.next_float(left + canyon_w, left + section_w - canyon_w);
            let y = rng.next_float(0.1 * h, 0.9 * h);
            layout.push_node(rng, x, y, (40.0, 80.0));
        }
    }

    layout.starts = vec![
        Vec2Fixed::from_f32(0.05 * w, h / 2.0),
        Vec2Fixed::from_f32(0.95 * w, h / 2.0),
    ];
    layout
}

// =============================================================================
// Independent feature passes
// =============================================================================

fn generate_chokepoints(
    config: &MapConfig,
    personality: TerrainPersonality,
    rng: &mut DeterministicRng,
) -> Vec<StrategicChokepoint> {
    let (w, h) = (config.world_width(), config.world_height());
    let (min, max) = match personality {
        TerrainPersonality::Aggressive => (1, 2),
        TerrainPersonality::Defensive => (3, 6),
        TerrainPersonality::Economic => (2, 3),
        TerrainPersonality::Puzzle => (2, 4),
    };
    (0..rng.next_int(min, max))
        .map(|_| {
            let position = Vec2Fixed::from_f32(rng.next_float(0.1 * w, 0.9 * w), rng.next_float(0.1 * h, 0.9 * h));
            let strength = rng.next_float(50.0, 100.0);
            let radius = rng.next_float(30.0, 80.0);
            StrategicChokepoint {
                position,
                strength,
                radius,
                movement_penalty: strength / 200.0,
                tactical_bonus: strength / 100.0,
            }
        })
        .collect()
}

fn generate_fractures(config: &MapConfig, rng: &mut DeterministicRng) -> Vec<QuantumFractureZone> {
    let (w, h) = (config.world_width(), config.world_height());
    (0..rng.next_int(1, 3))
        .map(|_| {
            let position = Vec2Fixed::from_f32(rng.next_float(0.0, w), rng.next_float(0.0, h));
            let strength = rng.next_float(30.0, 70.0);
            QuantumFractureZone {
                position,
                strength,
                radius: rng.next_float(20.0, 50.0),
                teleport_chance: strength / 100.0,
                damage_over_time: strength / 10.0,
                unpredictability: (strength / 70.0).min(1.0),
            }
        })
        .collect()
}

fn generate_veins(config: &MapConfig, layout: &mut Layout, rng: &mut DeterministicRng) -> Vec<ResourceVein> {
    let (w, h) = (config.world_width(), config.world_height());
    let mut veins = Vec::new();
    for _ in 0..rng.next_int(2, 4) {
        let (sx, sy) = (rng.next_float(0.1 * w, 0.9 * w), rng.next_float(0.1 * h, 0.9 * h));
        let direction = rng.next_float(0.0, TAU);
        let length = rng.next_float(0.1, 0.3) * w;
        let count = rng.next_int(4, 8);
        let resource = rng
            .choice(&ResourceType::ALL)
            .copied()
            .unwrap_or(ResourceType::Crystal);

        let mut nodes = Vec::with_capacity(count as usize);
        for i in 0..count {
            let t = i as f32 / (count - 1).max(1) as f32;
            let x = (sx + direction.cos() * length * t).clamp(0.0, w - 1.0);
            let y = (sy + direction.sin() * length * t).clamp(0.0, h - 1.0);
            let position = Vec2Fixed::from_f32(x, y);
            nodes.push(position);
            layout.nodes.push(ResourceNode {
                position,
                resource,
                richness: rng.next_float(30.0, 60.0),
            });
        }

        layout.strategic_points.push(StrategicPoint {
            position: nodes[nodes.len() / 2],
            kind: StrategicPointKind::ResourceVein,
        });
        veins.push(ResourceVein {
            nodes,
            resource,
            direction,
            length,
        });
    }
    veins
}

fn generate_elevation(config: &MapConfig, scale: f32, rng: &mut DeterministicRng) -> Vec<ElevationFeature> {
    let (w, h) = (config.world_width(), config.world_height());
    const KINDS: [ElevationKind; 3] = [ElevationKind::Mountain, ElevationKind::Valley, ElevationKind::Plateau];
    (0..rng.next_int(8, 15))
        .map(|_| {
            let kind = rng.choice(&KINDS).copied().unwrap_or(ElevationKind::Plateau);
            let position = Vec2Fixed::from_f32(rng.next_float(0.0, w), rng.next_float(0.0, h));
            let radius = rng.next_float(0.05 * w, 0.15 * w);
            let height = match kind {
                ElevationKind::Mountain => rng.next_float(40.0, 80.0),
                ElevationKind::Valley => -rng.next_float(40.0, 80.0),
                ElevationKind::Plateau => rng.next_float(20.0, 40.0),
            } * scale;
            ElevationFeature {
                kind,
                position,
                radius,
                height,
            }
        })
        .collect()
}

// =============================================================================
// Rasterization
// =============================================================================

/// Indices of cells whose centers lie within `radius` world units of `center`.
fn cells_within(config: &MapConfig, center: Vec2Fixed, radius: f32) -> Vec<usize> {
    let cell = config.cell_size.max(1) as f32;
    let (cx, cy) = to_f32(center);
    let (w, h) = (config.width.max(1) as i32, config.height.max(1) as i32);
    let min_x = (((cx - radius) / cell).floor() as i32).max(0);
    let max_x = (((cx + radius) / cell).ceil() as i32).min(w - 1);
    let min_y = (((cy - radius) / cell).floor() as i32).max(0);
    let max_y = (((cy + radius) / cell).ceil() as i32).min(h - 1);

    let mut out = Vec::new();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = (x as f32 + 0.5) * cell;
            let py = (y as f32 + 0.5) * cell;
            if (px - cx).powi(2) + (py - cy).powi(2) <= radius * radius {
                out.push((y * w + x) as usize);
            }
        }
    }
    out
}

fn rasterize(
    config: &MapConfig,
    biome: Biome,
    layout: &Layout,
    chokepoints: &[StrategicChokepoint],
    fractures: &[QuantumFractureZone],
    veins: &[ResourceVein],
    elevation_features: &[ElevationFeature],
) -> Vec<Tile> {
    let (w, h) = (config.width.max(1) as i32, config.height.max(1) as i32);
    let cell = config.cell_size.max(1) as f32;
    let mut tiles: Vec<Tile> = (0..h)
        .flat_map(|y| (0..w).map(move |x| Tile::new(TilePos::new(x, y), biome, 0.0)))
        .collect();

    for feature in elevation_features {
        let (fx, fy) = to_f32(feature.position);
        for idx in cells_within(config, feature.position, feature.radius) {
            let tile = &mut tiles[idx];
            let px = (tile.pos.x as f32 + 0.5) * cell;
            let py = (tile.pos.y as f32 + 0.5) * cell;
            let falloff = match feature.kind {
                ElevationKind::Plateau => 1.0,
                _ => 1.0 - ((px - fx).powi(2) + (py - fy).powi(2)).sqrt() / feature.radius.max(1.0),
            };
            tile.add_elevation(feature.height * falloff);
        }
    }

    for stamp in &layout.stamps {
        match stamp {
            LayoutStamp::Obstacle { center, radius } => {
                for idx in cells_within(config, *center, *radius) {
                    tiles[idx].passable = false;
                    tiles[idx].buildable = false;
                }
            }
            LayoutStamp::DefensivePosition { center, radius } => {
                for idx in cells_within(config, *center, *radius) {
                    let tile = &mut tiles[idx];
                    tile.movement_modifier *= 0.6;
                    tile.add_defense(0.3);
                    tile.add_strategic_value(20.0);
                }
            }
            LayoutStamp::Corridor { points } => {
                for pair in points.windows(2) {
                    let steps = 8;
                    for i in 0..=steps {
                        let t = Fixed::from_num(i) / Fixed::from_num(steps);
                        let pos = world_to_grid(config, pair[0].lerp(pair[1], t));
                        let tile = &mut tiles[(pos.y * w + pos.x) as usize];
                        tile.stamp_feature(TerrainFeature::Corridor);
                        tile.passable = true;
                    }
                }
            }
            LayoutStamp::Canyon { x, width, gap_y } => {
                for tile in &mut tiles {
                    let px = (tile.pos.x as f32 + 0.5) * cell;
                    let py = (tile.pos.y as f32 + 0.5) * cell;
                    if (px - x).abs() <= width / 2.0 && (py - gap_y).abs() > cell * 1.5 {
                        tile.movement_modifier = 0.2;
                        tile.passable = false;
                        tile.buildable = false;
                        tile.add_elevation(-40.0);
                        tile.stamp_feature(TerrainFeature::Canyon);
                    }
                }
            }
        }
    }

    for choke in chokepoints {
        for idx in cells_within(config, choke.position, choke.radius) {
            let tile = &mut tiles[idx];
            tile.movement_modifier *= 1.0 - choke.movement_penalty;
            tile.add_defense(choke.tactical_bonus * 0.3);
            tile.add_strategic_value(choke.strength * 0.3);
            tile.stamp_feature(TerrainFeature::Chokepoint);
        }
    }

    for fracture in fractures {
        for idx in cells_within(config, fracture.position, fracture.radius) {
            let tile = &mut tiles[idx];
            tile.stamp_feature(TerrainFeature::QuantumFracture);
            tile.metadata.insert(
                "teleport_chance".to_string(),
                format!("{:.2}", fracture.teleport_chance),
            );
        }
    }

    for vein in veins {
        for node in &vein.nodes {
            let pos = world_to_grid(config, *node);
            tiles[(pos.y * w + pos.x) as usize].stamp_feature(TerrainFeature::ResourceVein);
        }
    }

    for node in &layout.nodes {
        let pos = world_to_grid(config, node.position);
        let tile = &mut tiles[(pos.y * w + pos.x) as usize];
        tile.resource = Some(node.resource);
        tile.add_strategic_value(node.richness * 0.25);
    }

    // The central node is always last so nothing overwrites it.
    if let Some(point) = layout
        .strategic_points
        .iter()
        .find(|p| p.kind == StrategicPointKind::CentralNode)
    {
        let pos = world_to_grid(config, point.position);
        let tile = &mut tiles[(pos.y * w + pos.x) as usize];
        tile.strategic_value = 100.0;
        tile.feature = Some(TerrainFeature::Objective);
    }

    tiles
}

// =============================================================================
// Strategic DNA
// =============================================================================

/// Compute the four DNA scalars from generated content.
#[must_use]
pub fn compute_dna(map: &SynthesizedMap) -> StrategicDna {
    let nodes = &map.resource_nodes;
    let half_width = (map.config.world_width() / 2.0).max(1.0);

    let openness = if nodes.len() < 2 {
        0.0
    } else {
        let mut total = 0.0f32;
        let mut pairs = 0u32;
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                total += a.position.distance(b.position).to_num::<f32>();
                pairs += 1;
            }
        }
        (total / pairs as f32 / half_width).clamp(0.0, 1.0)
    };

    let economic_value = if nodes.is_empty() {
        0.0
    } else {
        let sum: f32 = nodes.iter().map(|n| n.richness).sum();
        (sum / nodes.len() as f32 / 100.0).clamp(0.0, 1.0)
    };

    let terrain_features = map.layout.len() + map.elevation_features.len() + map.fractures.len();
    let complexity =
        ((terrain_features + map.strategic_points.len()) as f32 / COMPLEXITY_TARGET).clamp(0.0, 1.0);

    StrategicDna {
        openness,
        defensiveness: (map.chokepoints.len() as f32 / DEFENSIVENESS_TARGET).clamp(0.0, 1.0),
        economic_value,
        complexity,
    }
}

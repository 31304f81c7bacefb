//! Declarative map specification.
//!
//! A [`MapSpec`] is authored as RON or JSON and consumed once by
//! [`TerrainEngine::generate_from_spec`](crate::engine::TerrainEngine::generate_from_spec).
//! Special features arrive in a loose `type + coordinates + properties` shape
//! and are validated once into the closed [`SpecialFeature`] enum.
//!
//! # Example RON
//!
//! ```ron
//! MapSpec(
//!     seed: 74219,
//!     size: 1024,
//!     chokepoints: 2,
//!     special_features: [
//!         SpecialFeatureSpec(
//!             kind: "parallel_bridges",
//!             coordinates: { "bridge_wide": (512, 256), "bridge_narrow": (512, 768) },
//!             properties: { "width_wide": 3.0, "width_narrow": 1.0, "defense_bonus": 0.7 },
//!         ),
//!     ],
//! )
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::anomaly::{AnomalyEffect, AnomalyKind, Frequency};
use crate::error::{Result, TerrainError};
use crate::math::{seconds_serde, Fixed, GameTime};
use crate::tile::TilePos;

/// Largest accepted grid edge; larger sizes are clamped.
pub const MAX_MAP_SIZE: u32 = 4096;

fn default_size() -> u32 {
    64
}

/// Declarative input for the terrain engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSpec {
    /// Random seed.
    pub seed: u64,
    /// Grid edge length in tiles.
    #[serde(default = "default_size")]
    pub size: u32,
    /// Optional height for non-square maps (defaults to `size`).
    #[serde(default)]
    pub height: Option<u32>,
    /// Biome name to relative weight.
    #[serde(default)]
    pub biomes: BTreeMap<String, f32>,
    /// Number of scattered resource nodes when no explicit placement is given.
    #[serde(default, alias = "resourceClusters")]
    pub resource_clusters: u32,
    /// Number of chokepoints to stamp.
    #[serde(default)]
    pub chokepoints: u32,
    /// Number of objectives to place.
    #[serde(default)]
    pub objectives: u32,
    /// Anomaly definitions.
    #[serde(default, alias = "dynamicAnomalies")]
    pub dynamic_anomalies: Vec<AnomalyDef>,
    /// Special features.
    #[serde(default, alias = "specialFeatures")]
    pub special_features: Vec<SpecialFeatureSpec>,
    /// Resource type name to explicit coordinates.
    #[serde(default, alias = "resourcePlacement")]
    pub resource_placement: BTreeMap<String, Vec<(i32, i32)>>,
    /// Player starting positions.
    #[serde(default, alias = "startingPositions")]
    pub starting_positions: Vec<(i32, i32)>,
}

impl Default for MapSpec {
    fn default() -> Self {
        Self::new(0, default_size())
    }
}

impl MapSpec {
    /// Create an empty spec: default biome everywhere, no features.
    #[must_use]
    pub fn new(seed: u64, size: u32) -> Self {
        Self {
            seed,
            size,
            height: None,
            biomes: BTreeMap::new(),
            resource_clusters: 0,
            chokepoints: 0,
            objectives: 0,
            dynamic_anomalies: Vec::new(),
            special_features: Vec::new(),
            resource_placement: BTreeMap::new(),
            starting_positions: Vec::new(),
        }
    }

    /// Set a biome weight.
    #[must_use]
    pub fn with_biome(mut self, name: &str, weight: f32) -> Self {
        self.biomes.insert(name.to_string(), weight);
        self
    }

    /// Set feature counts.
    #[must_use]
    pub fn with_counts(mut self, resource_clusters: u32, chokepoints: u32, objectives: u32) -> Self {
        self.resource_clusters = resource_clusters;
        self.chokepoints = chokepoints;
        self.objectives = objectives;
        self
    }

    /// Add an anomaly definition.
    #[must_use]
    pub fn with_anomaly(mut self, anomaly: AnomalyDef) -> Self {
        self.dynamic_anomalies.push(anomaly);
        self
    }

    /// Add a special feature.
    #[must_use]
    pub fn with_feature(mut self, feature: SpecialFeatureSpec) -> Self {
        self.special_features.push(feature);
        self
    }

    /// Grid width in tiles (at least 1, at most [`MAX_MAP_SIZE`]).
    #[must_use]
    pub fn width(&self) -> u32 {
        self.size.clamp(1, MAX_MAP_SIZE)
    }

    /// Grid height in tiles (at least 1, at most [`MAX_MAP_SIZE`]).
    #[must_use]
    pub fn grid_height(&self) -> u32 {
        self.height.unwrap_or(self.size).clamp(1, MAX_MAP_SIZE)
    }

    /// Load a spec from a `.ron` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| TerrainError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let label = path.display().to_string();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str_labeled(&contents, &label),
            _ => Self::from_ron_str_labeled(&contents, &label),
        }
    }

    /// Parse a spec from RON.
    ///
    /// # Errors
    ///
    /// Returns an error if the RON is malformed.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        Self::from_ron_str_labeled(ron, "<ron>")
    }

    /// Parse a spec from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_json_str_labeled(json, "<json>")
    }

    fn from_ron_str_labeled(ron: &str, label: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| TerrainError::DataParseError {
            path: label.to_string(),
            message: e.to_string(),
        })
    }

    fn from_json_str_labeled(json: &str, label: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TerrainError::DataParseError {
            path: label.to_string(),
            message: e.to_string(),
        })
    }

    /// Non-fatal problems that generation will work around.
    ///
    /// Generation never fails on these; the list exists for tooling.
    #[must_use]
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let (w, h) = (self.width() as i32, self.grid_height() as i32);
        let in_bounds = |(x, y): (i32, i32)| x >= 0 && y >= 0 && x < w && y < h;

        if self.size == 0 || self.size > MAX_MAP_SIZE {
            warnings.push(format!("size {} clamped to {}", self.size, self.width()));
        }
        for name in self.biomes.keys() {
            if crate::tile::Biome::from_name(name).is_none() {
                warnings.push(format!("unknown biome '{name}' ignored"));
            }
        }
        if !self.biomes.is_empty() && self.biomes.values().all(|w| *w <= 0.0) {
            warnings.push("biome weights are all non-positive; default biome used".to_string());
        }
        for (resource, coords) in &self.resource_placement {
            if crate::tile::ResourceType::from_name(resource).is_none() {
                warnings.push(format!("unknown resource type '{resource}' ignored"));
            }
            for &pos in coords {
                if !in_bounds(pos) {
                    warnings.push(format!("{resource} placement {pos:?} is outside the map"));
                }
            }
        }
        for feature in &self.special_features {
            if let Err(e) = SpecialFeature::from_spec(feature) {
                warnings.push(e.to_string());
            }
        }
        for &pos in &self.starting_positions {
            if !in_bounds(pos) {
                warnings.push(format!("starting position {pos:?} is outside the map"));
            }
        }
        warnings
    }
}

fn default_radius() -> u32 {
    5
}

/// Anomaly definition as authored in a spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDef {
    /// Anomaly type.
    #[serde(alias = "type")]
    pub kind: AnomalyKind,
    /// Recurrence class.
    pub frequency: Frequency,
    /// Length of one activation window in seconds.
    #[serde(with = "seconds_serde")]
    pub duration: GameTime,
    /// Center; random when omitted.
    #[serde(default)]
    pub coordinates: Option<(i32, i32)>,
    /// Radius in tiles.
    #[serde(default = "default_radius")]
    pub radius: u32,
    /// Effect payload; the kind's default when omitted.
    #[serde(default)]
    pub effect: Option<AnomalyEffect>,
}

impl AnomalyDef {
    /// Create a definition with a random center and default radius.
    #[must_use]
    pub fn new(kind: AnomalyKind, frequency: Frequency, duration_secs: i32) -> Self {
        Self {
            kind,
            frequency,
            duration: Fixed::from_num(duration_secs.max(0)),
            coordinates: None,
            radius: default_radius(),
            effect: None,
        }
    }

    /// Pin the center.
    #[must_use]
    pub const fn at(mut self, x: i32, y: i32) -> Self {
        self.coordinates = Some((x, y));
        self
    }

    /// Set the radius.
    #[must_use]
    pub const fn with_radius(mut self, radius: u32) -> Self {
        self.radius = radius;
        self
    }

    /// Set an explicit effect payload.
    #[must_use]
    pub const fn with_effect(mut self, effect: AnomalyEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Effect that will actually be applied.
    #[must_use]
    pub fn resolved_effect(&self) -> AnomalyEffect {
        self.effect.unwrap_or_else(|| self.kind.default_effect())
    }
}

/// Loose special-feature record as authored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpecialFeatureSpec {
    /// Feature type name (`parallel_bridges`, `hidden_vault`, ...).
    #[serde(alias = "type")]
    pub kind: String,
    /// Named coordinates.
    #[serde(default)]
    pub coordinates: BTreeMap<String, (i32, i32)>,
    /// Named numeric properties.
    #[serde(default)]
    pub properties: BTreeMap<String, f32>,
}

impl SpecialFeatureSpec {
    /// Create an empty record of the given type.
    #[must_use]
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    /// Add a named coordinate.
    #[must_use]
    pub fn coordinate(mut self, name: &str, x: i32, y: i32) -> Self {
        self.coordinates.insert(name.to_string(), (x, y));
        self
    }

    /// Add a named property.
    #[must_use]
    pub fn property(mut self, name: &str, value: f32) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    fn coord(&self, name: &str) -> Result<TilePos> {
        self.coordinates
            .get(name)
            .map(|&pos| TilePos::from(pos))
            .ok_or_else(|| TerrainError::InvalidSpecialFeature {
                kind: self.kind.clone(),
                reason: format!("missing coordinate '{name}'"),
            })
    }

    fn prop(&self, name: &str, default: f32) -> f32 {
        self.properties
            .get(name)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }

    fn named_coords(&self) -> Result<Vec<(String, TilePos)>> {
        if self.coordinates.is_empty() {
            return Err(TerrainError::InvalidSpecialFeature {
                kind: self.kind.clone(),
                reason: "no coordinates".to_string(),
            });
        }
        Ok(self
            .coordinates
            .iter()
            .map(|(name, &pos)| (name.clone(), TilePos::from(pos)))
            .collect())
    }
}

/// A straight bridge span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BridgeSpan {
    /// Center tile.
    pub center: TilePos,
    /// Thickness in rows (centred on `center`).
    pub width: i32,
    /// Length in columns (centred on `center`).
    pub length: i32,
    /// Defense bonus written onto every bridge tile.
    pub defense_bonus: f32,
}

/// Validated special feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpecialFeature {
    /// Two parallel crossings of different widths.
    ParallelBridges {
        /// Wide crossing.
        wide: BridgeSpan,
        /// Narrow crossing.
        narrow: BridgeSpan,
    },
    /// A single crossing.
    Bridge(BridgeSpan),
    /// Crater basin around a center.
    CentralCaldera {
        /// Center tile.
        center: TilePos,
        /// Radius in tiles.
        radius: i32,
        /// Strategic value added to every caldera tile.
        strategic_value: f32,
    },
    /// Vision-gated objective.
    HiddenVault {
        /// Vault tile.
        pos: TilePos,
        /// Distance at which the vault is revealed.
        reveal_radius: i32,
    },
    /// One or more named scout towers.
    ScoutTowers {
        /// Tower names and positions.
        towers: Vec<(String, TilePos)>,
        /// Visibility added to each tower tile.
        vision_bonus: f32,
    },
    /// Named narrative sites.
    Storytelling {
        /// Site names and positions.
        sites: Vec<(String, TilePos)>,
    },
}

impl SpecialFeature {
    /// Validate an authored record.
    ///
    /// # Errors
    ///
    /// Returns [`TerrainError::InvalidSpecialFeature`] for unknown types or
    /// missing coordinates.
    pub fn from_spec(spec: &SpecialFeatureSpec) -> Result<Self> {
        let bridge = |center: TilePos, width: f32| BridgeSpan {
            center,
            width: (width.round() as i32).max(1),
            length: (spec.prop("length", 9.0).round() as i32).max(1),
            defense_bonus: spec.prop("defense_bonus", 0.7).clamp(0.0, 1.0),
        };

        let feature = match spec.kind.trim().to_ascii_lowercase().as_str() {
            "parallel_bridges" => Self::ParallelBridges {
                wide: bridge(spec.coord("bridge_wide")?, spec.prop("width_wide", 3.0)),
                narrow: bridge(spec.coord("bridge_narrow")?, spec.prop("width_narrow", 1.0)),
            },
            "bridge" => Self::Bridge(bridge(spec.coord("center")?, spec.prop("width", 1.0))),
            "central_caldera" | "caldera" => Self::CentralCaldera {
                center: spec.coord("center")?,
                radius: (spec.prop("radius", 6.0).round() as i32).max(0),
                strategic_value: spec.prop("strategic_value", 40.0),
            },
            "hidden_vault" => Self::HiddenVault {
                pos: spec.coord("vault")?,
                reveal_radius: (spec.prop("reveal_radius", 3.0).round() as i32).max(0),
            },
            "scout_tower" | "scout_towers" => Self::ScoutTowers {
                towers: spec.named_coords()?,
                vision_bonus: spec.prop("vision_bonus", 0.5),
            },
            "environmental_storytelling" | "storytelling" => Self::Storytelling {
                sites: spec.named_coords()?,
            },
            other => {
                return Err(TerrainError::InvalidSpecialFeature {
                    kind: other.to_string(),
                    reason: "unknown feature type".to_string(),
                })
            }
        };
        Ok(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parallel_bridges_ron() {
        let spec = MapSpec::from_ron_str(
            r#"MapSpec(
                seed: 74219,
                size: 1024,
                chokepoints: 2,
                special_features: [
                    SpecialFeatureSpec(
                        kind: "parallel_bridges",
                        coordinates: { "bridge_wide": (512, 256), "bridge_narrow": (512, 768) },
                        properties: { "width_wide": 3.0, "width_narrow": 1.0, "defense_bonus": 0.7 },
                    ),
                ],
            )"#,
        )
        .expect("valid spec");

        assert_eq!(spec.seed, 74219);
        assert_eq!(spec.width(), 1024);
        assert_eq!(spec.grid_height(), 1024);
        let feature = SpecialFeature::from_spec(&spec.special_features[0]).expect("valid feature");
        match feature {
            SpecialFeature::ParallelBridges { wide, narrow } => {
                assert_eq!(wide.center, TilePos::new(512, 256));
                assert_eq!(wide.width, 3);
                assert_eq!(narrow.width, 1);
                assert!((wide.defense_bonus - 0.7).abs() < f32::EPSILON);
            }
            other => panic!("unexpected feature {other:?}"),
        }
    }

    #[test]
    fn test_parse_camel_case_json() {
        let spec = MapSpec::from_json_str(
            r#"{
                "seed": 9,
                "size": 32,
                "resourceClusters": 4,
                "dynamicAnomalies": [
                    {"type": "lava_vent", "frequency": "short", "duration": 45.0, "coordinates": [3, 4]}
                ],
                "startingPositions": [[1, 1], [30, 30]]
            }"#,
        )
        .expect("valid spec");

        assert_eq!(spec.resource_clusters, 4);
        assert_eq!(spec.starting_positions, vec![(1, 1), (30, 30)]);
        let anomaly = &spec.dynamic_anomalies[0];
        assert_eq!(anomaly.kind, AnomalyKind::LavaVent);
        assert_eq!(anomaly.duration, Fixed::from_num(45));
        assert_eq!(anomaly.radius, 5);
        assert_eq!(anomaly.resolved_effect(), AnomalyKind::LavaVent.default_effect());
    }

    #[test]
    fn test_camel_case_effect_fields() {
        let spec = MapSpec::from_json_str(
            r#"{
                "seed": 9,
                "dynamicAnomalies": [{
                    "type": "resource_flux",
                    "frequency": "long",
                    "duration": 30.0,
                    "effect": {
                        "resourceMultiplier": 3.0,
                        "damagePerSecond": 4.0,
                        "visibilityModifier": -0.5,
                        "movementPenalty": 0.25,
                        "detectionRange": 12.0
                    }
                }]
            }"#,
        )
        .expect("valid spec");

        let effect = spec.dynamic_anomalies[0].resolved_effect();
        assert_eq!(effect.resource_multiplier, Some(3.0));
        assert_eq!(effect.damage_per_second, Some(4.0));
        assert_eq!(effect.visibility_modifier, Some(-0.5));
        assert_eq!(effect.movement_penalty, Some(0.25));
        assert_eq!(effect.detection_range, Some(12.0));
    }

    #[test]
    fn test_misspelled_effect_field_is_rejected() {
        let result = MapSpec::from_json_str(
            r#"{
                "seed": 9,
                "dynamicAnomalies": [{
                    "type": "storm",
                    "frequency": "short",
                    "duration": 10.0,
                    "effect": {"resourceMultiplyer": 3.0}
                }]
            }"#,
        );
        assert!(matches!(result, Err(TerrainError::DataParseError { .. })));
    }

    #[test]
    fn test_unknown_feature_is_rejected() {
        let spec = SpecialFeatureSpec::new("moon_base").coordinate("center", 1, 1);
        assert!(matches!(
            SpecialFeature::from_spec(&spec),
            Err(TerrainError::InvalidSpecialFeature { .. })
        ));
    }

    #[test]
    fn test_missing_coordinate_is_rejected() {
        let spec = SpecialFeatureSpec::new("hidden_vault");
        assert!(SpecialFeature::from_spec(&spec).is_err());
    }

    #[test]
    fn test_degenerate_size_is_clamped() {
        let spec = MapSpec::new(1, 0);
        assert_eq!(spec.width(), 1);
        assert_eq!(spec.grid_height(), 1);
        assert!(!spec.lint().is_empty());
    }

    #[test]
    fn test_lint_flags_unknown_names() {
        let mut spec = MapSpec::new(1, 16).with_biome("marsh_of_doom", 1.0);
        spec.resource_placement
            .insert("unobtainium".to_string(), vec![(1, 1)]);
        let warnings = spec.lint();
        assert!(warnings.iter().any(|w| w.contains("marsh_of_doom")));
        assert!(warnings.iter().any(|w| w.contains("unobtainium")));
    }
}

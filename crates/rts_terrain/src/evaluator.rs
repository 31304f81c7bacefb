//! Terrain-aware AI queries over a live [`TerrainEngine`].
//!
//! The evaluator holds no state of its own beyond a borrowed engine and a set
//! of tunable weights. Every query is a pure read.

use serde::{Deserialize, Serialize};

use crate::anomaly::DynamicAnomaly;
use crate::engine::TerrainEngine;
use crate::math::GameTime;
use crate::tile::{TerrainFeature, Tile, TilePos};

/// Distance in tiles from the route midpoint to each flank waypoint.
pub const FLANK_OFFSET: i32 = 100;
/// Samples taken along each straight route segment.
pub const SAMPLES_PER_SEGMENT: u32 = 10;
/// Assumed remaining time for anomalies without a scheduled end, in seconds.
pub const DEFAULT_REMAINING_SECS: f32 = 90.0;

/// Tunable weights for tile scoring and contest decisions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorWeights {
    /// Score for a tile holding a resource.
    pub resource: f32,
    /// Score per point of elevation.
    pub elevation: f32,
    /// Score per unit of defense bonus.
    pub defense: f32,
    /// Score per unit of visibility modifier.
    pub vision: f32,
    /// Score per unit of resource multiplier from active anomalies.
    pub anomaly_resource: f32,
    /// Score subtracted per unit of movement cost from the origin.
    pub path_cost_penalty: f32,
    /// Expected reward per unit of anomaly resource multiplier.
    pub contest_reward: f32,
    /// Net value above which an anomaly is always contested.
    pub contest_margin: f32,
    /// Stockpile required to contest a marginal anomaly.
    pub contest_min_resources: u32,
}

impl Default for EvaluatorWeights {
    fn default() -> Self {
        Self {
            resource: 50.0,
            elevation: 0.3,
            defense: 30.0,
            vision: 20.0,
            anomaly_resource: 30.0,
            path_cost_penalty: 5.0,
            contest_reward: 100.0,
            contest_margin: 50.0,
            contest_min_resources: 200,
        }
    }
}

/// One contribution to a tile score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReason {
    /// Human-readable description.
    pub reason: String,
    /// Signed contribution.
    pub magnitude: f32,
}

/// A scored tile with its explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileEvaluation {
    /// The evaluated tile.
    pub tile: Tile,
    /// Total score.
    pub score: f32,
    /// Every non-zero contribution, in scoring order.
    pub reasons: Vec<ScoreReason>,
}

/// Which candidate a route is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Straight line.
    Direct,
    /// Bulges through a waypoint above the midpoint.
    North,
    /// Bulges through a waypoint below the midpoint.
    South,
    /// Bulges through a waypoint right of the midpoint.
    East,
    /// Bulges through a waypoint left of the midpoint.
    West,
}

/// A candidate path with its estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlankRoute {
    /// Candidate type.
    pub kind: RouteKind,
    /// Polyline from origin to destination.
    pub waypoints: Vec<TilePos>,
    /// Ambush risk in `[0, 1]`.
    pub risk: f32,
    /// Estimated travel time.
    pub time: f32,
    /// Aggregate strategic value of the sampled tiles.
    pub strategic_value: f32,
}

/// Ambush risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Risk at most 0.4.
    Low,
    /// Risk at most 0.7.
    Medium,
    /// Risk above 0.7.
    High,
}

impl RiskLevel {
    /// Classify a route risk.
    #[must_use]
    pub fn classify(risk: f32) -> Self {
        if risk <= 0.4 {
            Self::Low
        } else if risk <= 0.7 {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Suggested unit composition for this tier.
    #[must_use]
    pub fn recommended_units(self) -> &'static [&'static str] {
        match self {
            Self::Low => &["heavy_armor", "siege"],
            Self::Medium => &["infantry", "light_vehicle", "support"],
            Self::High => &["scout", "skirmisher"],
        }
    }
}

/// Ambush assessment of a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbushHeuristic {
    /// The assessed route.
    pub route: FlankRoute,
    /// Risk tier.
    pub risk_level: RiskLevel,
    /// Suggested unit types.
    pub recommended_units: Vec<String>,
    /// Safer route, offered only for high-risk routes.
    pub alternative_route: Option<FlankRoute>,
}

/// How soon a contest decision must be acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// 60 seconds or more remain.
    Normal,
    /// Under 60 seconds remain.
    High,
    /// Under 30 seconds remain.
    Critical,
}

impl Urgency {
    /// Urgency for the given remaining seconds.
    #[must_use]
    pub fn from_remaining(remaining_secs: f32) -> Self {
        if remaining_secs < 30.0 {
            Self::Critical
        } else if remaining_secs < 60.0 {
            Self::High
        } else {
            Self::Normal
        }
    }
}

/// Whether to fight over an anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestDecision {
    /// Recommendation.
    pub contest: bool,
    /// Time pressure.
    pub urgency: Urgency,
    /// Explanation.
    pub reason: String,
    /// Estimated gain.
    pub expected_reward: f32,
    /// Estimated loss.
    pub expected_risk: f32,
}

/// Stateless AI query layer borrowing a live engine.
#[derive(Debug, Clone, Copy)]
pub struct TerrainEvaluator<'a> {
    engine: &'a TerrainEngine,
    weights: EvaluatorWeights,
}

impl<'a> TerrainEvaluator<'a> {
    /// Evaluator with default weights.
    #[must_use]
    pub fn new(engine: &'a TerrainEngine) -> Self {
        Self::with_weights(engine, EvaluatorWeights::default())
    }

    /// Evaluator with custom weights.
    #[must_use]
    pub const fn with_weights(engine: &'a TerrainEngine, weights: EvaluatorWeights) -> Self {
        Self { engine, weights }
    }

    /// Weights in use.
    #[must_use]
    pub const fn weights(&self) -> &EvaluatorWeights {
        &self.weights
    }

    // =========================================================================
    // Tile scoring
    // =========================================================================

    /// Score a tile, optionally charging the cost of reaching it from `from`.
    ///
    /// Returns `None` if `pos` is outside the grid.
    #[must_use]
    pub fn evaluate_tile(&self, pos: TilePos, from: Option<TilePos>) -> Option<TileEvaluation> {
        let tile = self.engine.tile_at(pos)?;
        let w = &self.weights;
        let mut reasons = Vec::new();
        let mut push = |reason: String, magnitude: f32| {
            if magnitude != 0.0 {
                reasons.push(ScoreReason { reason, magnitude });
            }
        };

        if let Some(resource) = tile.resource {
            push(format!("{resource:?} deposit"), w.resource);
        }
        push("elevation".to_string(), tile.elevation * w.elevation);
        push("defensive terrain".to_string(), tile.defense_bonus * w.defense);
        push("visibility".to_string(), tile.visibility_modifier * w.vision);
        if let Some(feature) = tile.feature {
            push(format!("{feature:?} feature"), feature.score_bonus());
        }
        for anomaly in self.engine.anomalies_at(pos) {
            if let Some(multiplier) = anomaly.effect.resource_multiplier {
                push(
                    format!("{:?} resource multiplier", anomaly.kind),
                    w.anomaly_resource * multiplier,
                );
            }
        }
        if let Some(origin) = from {
            if let Some(cost) = self.engine.movement_cost(origin, pos) {
                push("path cost".to_string(), -w.path_cost_penalty * cost);
            }
        }

        let score = reasons.iter().map(|r| r.magnitude).sum();
        Some(TileEvaluation {
            tile: tile.clone(),
            score,
            reasons,
        })
    }

    // =========================================================================
    // Route planning
    // =========================================================================

    /// Candidate routes from `from` to `to`.
    ///
    /// The direct route is always first; flank waypoints are clamped onto the
    /// grid, routes that collapse onto an endpoint or another flank are
    /// dropped, and the rest follow in descending strategic value.
    #[must_use]
    pub fn plan_flank_routes(
        &self,
        from: TilePos,
        to: TilePos,
        avoid_chokepoints: bool,
    ) -> Vec<FlankRoute> {
        let mid = TilePos::new((from.x + to.x) / 2, (from.y + to.y) / 2);
        let flanks = [
            (RouteKind::North, mid.offset(0, -FLANK_OFFSET)),
            (RouteKind::South, mid.offset(0, FLANK_OFFSET)),
            (RouteKind::East, mid.offset(FLANK_OFFSET, 0)),
            (RouteKind::West, mid.offset(-FLANK_OFFSET, 0)),
        ];

        let mut seen: Vec<TilePos> = Vec::with_capacity(flanks.len());
        let mut alternatives = Vec::with_capacity(flanks.len());
        for (kind, waypoint) in flanks {
            let waypoint = self.clamp_to_grid(waypoint);
            if waypoint == from || waypoint == to || seen.contains(&waypoint) {
                continue;
            }
            seen.push(waypoint);
            alternatives.push(self.assess_route(kind, vec![from, waypoint, to], avoid_chokepoints));
        }
        alternatives.sort_by(|a, b| b.strategic_value.total_cmp(&a.strategic_value));

        let mut routes = Vec::with_capacity(alternatives.len() + 1);
        routes.push(self.assess_route(RouteKind::Direct, vec![from, to], avoid_chokepoints));
        routes.extend(alternatives);

        tracing::debug!(
            from = %from,
            to = %to,
            avoid_chokepoints,
            candidates = routes.len(),
            "Planned flank routes"
        );
        routes
    }

    fn clamp_to_grid(&self, pos: TilePos) -> TilePos {
        let max_x = self.engine.width() as i32 - 1;
        let max_y = self.engine.height() as i32 - 1;
        TilePos::new(pos.x.clamp(0, max_x), pos.y.clamp(0, max_y))
    }

    fn assess_route(&self, kind: RouteKind, waypoints: Vec<TilePos>, avoid_chokepoints: bool) -> FlankRoute {
        let mut risk = 0.0f32;
        let mut time = 0.0f32;
        let mut strategic_value = 0.0f32;

        for segment in waypoints.windows(2) {
            let (a, b) = (segment[0], segment[1]);
            let step_length = a.distance(b) / SAMPLES_PER_SEGMENT as f32;
            let mut prev = a;
            for i in 1..=SAMPLES_PER_SEGMENT {
                let t = i as f32 / SAMPLES_PER_SEGMENT as f32;
                let sample = TilePos::new(
                    (a.x as f32 + (b.x - a.x) as f32 * t).round() as i32,
                    (a.y as f32 + (b.y - a.y) as f32 * t).round() as i32,
                );
                let Some(tile) = self.engine.tile_at(sample) else {
                    continue;
                };
                if avoid_chokepoints && tile.has_feature(TerrainFeature::Chokepoint) {
                    risk += 0.2;
                }
                if tile.visibility_modifier < 0.0 {
                    risk += 0.1;
                }
                if let Some(cost) = self.engine.movement_cost(prev, sample) {
                    time += cost * step_length;
                }
                strategic_value += tile.strategic_value * 0.1;
                prev = sample;
            }
        }

        FlankRoute {
            kind,
            waypoints,
            risk: risk.clamp(0.0, 1.0),
            time,
            strategic_value,
        }
    }

    /// Classify the ambush risk of a route.
    #[must_use]
    pub fn evaluate_ambush_risk(&self, route: &FlankRoute) -> AmbushHeuristic {
        let risk_level = RiskLevel::classify(route.risk);
        let alternative_route = if risk_level == RiskLevel::High {
            self.safer_alternative(route)
        } else {
            None
        };

        AmbushHeuristic {
            route: route.clone(),
            risk_level,
            recommended_units: risk_level
                .recommended_units()
                .iter()
                .map(|unit| (*unit).to_string())
                .collect(),
            alternative_route,
        }
    }

    fn safer_alternative(&self, route: &FlankRoute) -> Option<FlankRoute> {
        let (from, to) = (*route.waypoints.first()?, *route.waypoints.last()?);
        self.plan_flank_routes(from, to, true)
            .into_iter()
            .filter(|candidate| candidate.waypoints != route.waypoints)
            .min_by(|a, b| a.risk.total_cmp(&b.risk))
    }

    // =========================================================================
    // Anomaly contests
    // =========================================================================

    /// Decide whether fighting over an anomaly is worth it.
    ///
    /// Inactive anomalies are never contested.
    #[must_use]
    pub fn should_contest_dynamic_tile(
        &self,
        anomaly: &DynamicAnomaly,
        game_time: GameTime,
        resources: u32,
    ) -> ContestDecision {
        if !anomaly.active {
            return ContestDecision {
                contest: false,
                urgency: Urgency::Normal,
                reason: format!("{:?} anomaly is not active", anomaly.kind),
                expected_reward: 0.0,
                expected_risk: 0.0,
            };
        }

        let w = &self.weights;
        let remaining = anomaly
            .remaining_time(game_time)
            .map_or(DEFAULT_REMAINING_SECS, |t| t.to_num::<f32>());
        let reward = w.contest_reward * anomaly.effect.resource_multiplier.unwrap_or(0.0);
        let risk = anomaly.effect.damage_per_second.unwrap_or(0.0) * remaining;
        let net = reward - risk;
        let urgency = Urgency::from_remaining(remaining);

        let (contest, reason) = if net > w.contest_margin {
            (true, format!("net value {net:.0} with {remaining:.0}s remaining"))
        } else if net > 0.0 && resources >= w.contest_min_resources {
            (
                true,
                format!("marginal net value {net:.0} affordable with {resources} resources"),
            )
        } else if net > 0.0 {
            (
                false,
                format!(
                    "marginal net value {net:.0} needs {} resources, have {resources}",
                    w.contest_min_resources
                ),
            )
        } else {
            (false, format!("risk {risk:.0} outweighs reward {reward:.0}"))
        };

        ContestDecision {
            contest,
            urgency,
            reason,
            expected_reward: reward,
            expected_risk: risk,
        }
    }
}

//! Dynamic anomalies and their time-driven activation schedule.
//!
//! Each non-continuous anomaly cycles through three phases:
//!
//! ```text
//!  Dormant --(first advance)--> Active --(t >= end)--> CoolingDown
//!                                 ^                        |
//!                                 +----(t >= next start)---+
//! ```
//!
//! Windows are laid out in closed form from the first observed start:
//! window `k` spans `[anchor + k * period, anchor + k * period + duration)`
//! with `period = duration + delay(frequency)`. The phase after
//! [`DynamicAnomaly::advance`] therefore depends only on the `game_time`
//! argument, never on how often the method was called in between.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, option_fixed_serde, seconds_serde, Fixed, GameTime};
use crate::tile::TilePos;

/// Stable identifier of an anomaly within one engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct AnomalyId(pub u32);

/// Anomaly type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Erupting vent: burns units and slows movement.
    LavaVent,
    /// Weather front: blinds and slows.
    Storm,
    /// Electronic interference: collapses detection range.
    SensorJamming,
    /// Unstable space: hazardous but resource-rich.
    QuantumFracture,
    /// Surge of harvestable resources.
    ResourceFlux,
}

impl AnomalyKind {
    /// Effect used when a definition carries no explicit payload.
    #[must_use]
    pub const fn default_effect(self) -> AnomalyEffect {
        match self {
            Self::LavaVent => AnomalyEffect {
                damage_per_second: Some(15.0),
                resource_multiplier: None,
                visibility_modifier: None,
                movement_penalty: Some(0.3),
                detection_range: None,
            },
            Self::Storm => AnomalyEffect {
                damage_per_second: Some(2.0),
                resource_multiplier: None,
                visibility_modifier: Some(-0.5),
                movement_penalty: Some(0.2),
                detection_range: None,
            },
            Self::SensorJamming => AnomalyEffect {
                damage_per_second: None,
                resource_multiplier: None,
                visibility_modifier: Some(-0.8),
                movement_penalty: None,
                detection_range: Some(2.0),
            },
            Self::QuantumFracture => AnomalyEffect {
                damage_per_second: Some(8.0),
                resource_multiplier: Some(1.5),
                visibility_modifier: None,
                movement_penalty: None,
                detection_range: None,
            },
            Self::ResourceFlux => AnomalyEffect {
                damage_per_second: None,
                resource_multiplier: Some(2.0),
                visibility_modifier: None,
                movement_penalty: None,
                detection_range: None,
            },
        }
    }
}

/// How often an anomaly recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Short cooldown between windows.
    Short,
    /// Medium cooldown between windows.
    Medium,
    /// Long cooldown between windows.
    Long,
    /// Always active.
    Continuous,
}

/// Effect payload; every field is optional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnomalyEffect {
    /// Damage dealt per second to units inside the radius.
    #[serde(alias = "damagePerSecond")]
    pub damage_per_second: Option<f32>,
    /// Multiplier on resource yield inside the radius.
    #[serde(alias = "resourceMultiplier")]
    pub resource_multiplier: Option<f32>,
    /// Additive visibility change inside the radius.
    #[serde(alias = "visibilityModifier")]
    pub visibility_modifier: Option<f32>,
    /// Fractional movement slowdown inside the radius.
    #[serde(alias = "movementPenalty")]
    pub movement_penalty: Option<f32>,
    /// Detection range override inside the radius.
    #[serde(alias = "detectionRange")]
    pub detection_range: Option<f32>,
}

/// Cooldown between activation windows, per frequency class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalySchedule {
    /// Delay after a short-frequency window.
    #[serde(with = "seconds_serde")]
    pub short: GameTime,
    /// Delay after a medium-frequency window.
    #[serde(with = "seconds_serde")]
    pub medium: GameTime,
    /// Delay after a long-frequency window.
    #[serde(with = "seconds_serde")]
    pub long: GameTime,
}

impl Default for AnomalySchedule {
    fn default() -> Self {
        Self {
            short: Fixed::from_num(30),
            medium: Fixed::from_num(90),
            long: Fixed::from_num(180),
        }
    }
}

impl AnomalySchedule {
    /// Cooldown for a frequency class. `None` for continuous anomalies.
    #[must_use]
    pub const fn delay(&self, frequency: Frequency) -> Option<GameTime> {
        match frequency {
            Frequency::Short => Some(self.short),
            Frequency::Medium => Some(self.medium),
            Frequency::Long => Some(self.long),
            Frequency::Continuous => None,
        }
    }
}

/// Activation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyPhase {
    /// Not yet scheduled.
    #[default]
    Dormant,
    /// Inside an activation window.
    Active,
    /// Between windows, waiting for the next scheduled start.
    CoolingDown,
}

/// A phase change produced by [`DynamicAnomaly::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyTransition {
    /// Anomaly that changed.
    pub id: AnomalyId,
    /// Phase before the call.
    pub from: AnomalyPhase,
    /// Phase after the call.
    pub to: AnomalyPhase,
}

/// A timed, radius-bound effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicAnomaly {
    /// Identifier.
    pub id: AnomalyId,
    /// Anomaly type.
    pub kind: AnomalyKind,
    /// Center tile.
    pub center: TilePos,
    /// Radius in tiles.
    pub radius: u32,
    /// Recurrence class.
    pub frequency: Frequency,
    /// Length of one activation window.
    #[serde(with = "fixed_serde")]
    pub duration: GameTime,
    /// Start of the current (or next) window.
    #[serde(with = "option_fixed_serde")]
    pub start_time: Option<GameTime>,
    /// End of the current (or next) window.
    #[serde(with = "option_fixed_serde")]
    pub end_time: Option<GameTime>,
    /// Effect payload.
    pub effect: AnomalyEffect,
    /// Whether the anomaly is currently active.
    pub active: bool,
    /// Current phase.
    pub phase: AnomalyPhase,
    /// First observed start; every later window is laid out from it.
    #[serde(with = "option_fixed_serde")]
    anchor: Option<GameTime>,
}

impl DynamicAnomaly {
    /// Create an inactive, unscheduled anomaly.
    #[must_use]
    pub fn new(
        id: AnomalyId,
        kind: AnomalyKind,
        center: TilePos,
        radius: u32,
        frequency: Frequency,
        duration: GameTime,
        effect: AnomalyEffect,
    ) -> Self {
        Self {
            id,
            kind,
            center,
            radius,
            frequency,
            duration: duration.max(Fixed::ZERO),
            start_time: None,
            end_time: None,
            effect,
            active: false,
            phase: AnomalyPhase::Dormant,
            anchor: None,
        }
    }

    /// Whether this anomaly never switches off.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        self.frequency == Frequency::Continuous
    }

    /// Whether a tile lies within the anomaly's radius.
    #[must_use]
    pub fn contains(&self, pos: TilePos) -> bool {
        let r = i64::from(self.radius);
        self.center.distance_squared(pos) <= r * r
    }

    /// Time left in the current window, if active and bounded.
    #[must_use]
    pub fn remaining_time(&self, game_time: GameTime) -> Option<GameTime> {
        if !self.active {
            return None;
        }
        self.end_time.map(|end| (end - game_time).max(Fixed::ZERO))
    }

    /// Bring the phase in line with `game_time`.
    ///
    /// Returns the transition if the phase changed.
    pub fn advance(
        &mut self,
        game_time: GameTime,
        schedule: &AnomalySchedule,
    ) -> Option<AnomalyTransition> {
        let before = self.phase;

        match schedule.delay(self.frequency) {
            None => {
                self.active = true;
                self.phase = AnomalyPhase::Active;
            }
            Some(delay) => self.advance_windowed(game_time, delay.max(Fixed::ZERO)),
        }

        (before != self.phase).then_some(AnomalyTransition {
            id: self.id,
            from: before,
            to: self.phase,
        })
    }

    fn advance_windowed(&mut self, game_time: GameTime, delay: GameTime) {
        let anchor = *self.anchor.get_or_insert(game_time);
        let duration = self.duration;
        let period = duration.saturating_add(delay);

        if game_time < anchor {
            // Time moved backwards past the first window.
            self.set_window(anchor, false, AnomalyPhase::Dormant);
            return;
        }
        if period <= Fixed::ZERO {
            self.set_window(anchor, false, AnomalyPhase::CoolingDown);
            return;
        }

        let elapsed = game_time - anchor;
        let mut cycle = (elapsed / period).to_num::<i64>();
        let window_start = |cycle: i64| {
            anchor.saturating_add(period.saturating_mul(Fixed::saturating_from_num(cycle)))
        };
        // Fixed division truncates; nudge so window_start(cycle) <= t < window_start(cycle + 1).
        while cycle > 0 && window_start(cycle) > game_time {
            cycle -= 1;
        }
        while window_start(cycle + 1) <= game_time {
            cycle += 1;
        }

        let start = window_start(cycle);
        let end = start.saturating_add(duration);
        if game_time < end {
            self.set_window(start, true, AnomalyPhase::Active);
        } else {
            let next_start = end.saturating_add(delay);
            self.set_window(next_start, false, AnomalyPhase::CoolingDown);
        }
    }

    fn set_window(&mut self, start: GameTime, active: bool, phase: AnomalyPhase) {
        self.start_time = Some(start);
        self.end_time = Some(start.saturating_add(self.duration));
        self.active = active;
        self.phase = phase;
    }
}

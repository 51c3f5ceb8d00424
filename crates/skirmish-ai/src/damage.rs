//! Damage events, health and knockback resolution.
//!
//! This module provides:
//! - `DamageEvent`, the only contract between combat sources and this core
//! - The `Damageable` capability
//! - `Health` with clamped mutation
//! - `Knockback`, a displacement that decays to zero over a short interval

use glam::Vec3;
use serde::{Deserialize, Serialize};

use skirmish_common::EntityId;

/// A single hit, created fresh by whatever produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Damage amount; negative values count as zero
    pub value: i32,
    /// Knockback strength
    pub knockback_power: f32,
    /// Impact normal, pointing back toward the attacker; knockback pushes the other way
    pub hit_direction: Vec3,
    /// World point of impact
    pub hit_point: Vec3,
    /// Entity that caused the hit, if any
    pub source: Option<EntityId>,
}

impl DamageEvent {
    /// Creates a damage event with no knockback.
    #[must_use]
    pub fn new(value: i32) -> Self {
        Self {
            value,
            knockback_power: 0.0,
            hit_direction: Vec3::ZERO,
            hit_point: Vec3::ZERO,
            source: None,
        }
    }

    /// Sets the knockback power and the impact normal.
    #[must_use]
    pub fn with_knockback(mut self, power: f32, hit_direction: Vec3) -> Self {
        self.knockback_power = power;
        self.hit_direction = hit_direction;
        self
    }

    /// Sets the impact point.
    #[must_use]
    pub fn at(mut self, hit_point: Vec3) -> Self {
        self.hit_point = hit_point;
        self
    }

    /// Sets the source entity.
    #[must_use]
    pub fn from_source(mut self, source: EntityId) -> Self {
        self.source = Some(source);
        self
    }

    /// Damage after clamping negatives to zero.
    #[must_use]
    pub fn effective_value(&self) -> u32 {
        self.value.max(0) as u32
    }
}

/// What a `take_damage` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// The hit was rejected (already dying, or currently invulnerable)
    Ignored,
    /// Health dropped but stayed above zero; the entity is stunned
    Damaged {
        /// Health after the hit
        health: u32,
    },
    /// Health reached zero; the entity entered Die
    Killed,
}

impl HitOutcome {
    /// Returns whether the hit was applied.
    #[must_use]
    pub const fn is_successful(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Where and from which way the last successful hit landed.
///
/// Handed to the external hit-feedback collaborator (blood, flashes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitFeedback {
    /// Impact point
    pub point: Vec3,
    /// Direction the hit travelled
    pub direction: Vec3,
}

/// Anything that can be hit by a combat source.
pub trait Damageable {
    /// Applies a hit. Calls made while dying are no-ops.
    fn take_damage(&mut self, event: &DamageEvent) -> HitOutcome;

    /// Feedback for the last successful hit, if any.
    fn hit_feedback(&self) -> Option<HitFeedback>;
}

/// Health pool. Invariant: `current <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    current: u32,
    max: u32,
}

impl Health {
    /// Creates full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Current health.
    #[must_use]
    pub const fn current(&self) -> u32 {
        self.current
    }

    /// Maximum health.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Returns whether health is exhausted.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.current == 0
    }

    /// Restores full health.
    pub fn reset(&mut self) {
        self.current = self.max;
    }

    /// Subtracts `amount`, stopping at zero. Returns the new value.
    pub fn apply(&mut self, amount: u32) -> u32 {
        self.current = self.current.saturating_sub(amount);
        self.current
    }

    /// Health as a fraction (0.0 to 1.0).
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            0.0
        } else {
            self.current as f32 / self.max as f32
        }
    }
}

/// Applies one hit to `health` after dividing by `defense`.
///
/// This is the single place health is reduced. Always reports exactly one of
/// `Damaged` or `Killed`.
pub fn resolve_hit(health: &mut Health, event: &DamageEvent, defense: u32) -> HitOutcome {
    let amount = event.effective_value() / defense.max(1);
    let remaining = health.apply(amount);
    if remaining == 0 {
        HitOutcome::Killed
    } else {
        HitOutcome::Damaged { health: remaining }
    }
}

/// Short displacement pushing an entity away from the hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Knockback {
    /// Unit push direction
    direction: Vec3,
    /// Initial push speed
    force: f32,
    /// Time pushed so far
    elapsed: f32,
    /// Total push time
    duration: f32,
}

impl Knockback {
    /// Builds the knockback for a hit: opposite the hit direction, scaled by its power.
    #[must_use]
    pub fn from_hit(event: &DamageEvent, duration: f32) -> Self {
        Self {
            direction: -event.hit_direction.normalize_or_zero(),
            force: event.knockback_power.max(0.0),
            elapsed: 0.0,
            duration: duration.max(0.0),
        }
    }

    /// Unit push direction.
    #[must_use]
    pub const fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Initial push strength.
    #[must_use]
    pub const fn force(&self) -> f32 {
        self.force
    }

    /// Push vector (direction scaled by power).
    #[must_use]
    pub fn impulse(&self) -> Vec3 {
        self.direction * self.force
    }

    /// Remaining force after decay.
    #[must_use]
    pub fn residual_force(&self) -> f32 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        self.force * (1.0 - self.elapsed / self.duration).max(0.0)
    }

    /// Returns whether the push has run out.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration || self.force <= 0.0 || self.direction == Vec3::ZERO
    }

    /// Advances the push and returns this tick's displacement.
    pub fn step(&mut self, dt: f32) -> Vec3 {
        if self.is_finished() || dt <= 0.0 {
            return Vec3::ZERO;
        }
        let step = dt.min(self.duration - self.elapsed);
        let displacement = self.direction * self.residual_force() * step;
        self.elapsed += step;
        displacement
    }
}

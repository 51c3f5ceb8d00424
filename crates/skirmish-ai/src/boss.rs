//! Boss extension layered on the enemy machine.
//!
//! The boss runs the boss table plus two cross-cutting behaviors:
//! - periodic summon: a timer that only runs in Trace, Attack and Damaged
//!   and, once due, forces Summon ahead of the table
//! - one-shot rush: from Idle, a dash at a snapshot of the target position

use glam::Vec3;

use skirmish_common::distance;

use crate::config::BossParams;
use crate::fsm::{EnemyState, GuardInputs};

/// Boss-only state carried by an `Enemy`.
#[derive(Debug, Clone, PartialEq)]
pub struct BossBehavior {
    params: BossParams,
    summon_timer: f32,
    rushable: bool,
    rush_target: Option<Vec3>,
    summons: u32,
}

impl BossBehavior {
    /// Creates the extension with a fresh rush and summon timer.
    #[must_use]
    pub fn new(params: BossParams) -> Self {
        Self {
            params,
            summon_timer: 0.0,
            rushable: true,
            rush_target: None,
            summons: 0,
        }
    }

    /// Tuning values.
    #[must_use]
    pub const fn params(&self) -> &BossParams {
        &self.params
    }

    /// Divisor applied to incoming damage.
    #[must_use]
    pub fn defense(&self) -> u32 {
        self.params.defense.max(1)
    }

    /// Seconds accumulated toward the next summon.
    #[must_use]
    pub const fn summon_timer(&self) -> f32 {
        self.summon_timer
    }

    /// Returns whether the rush is still available.
    #[must_use]
    pub const fn is_rushable(&self) -> bool {
        self.rushable
    }

    /// Snapshot the current rush is heading for.
    #[must_use]
    pub const fn rush_target(&self) -> Option<Vec3> {
        self.rush_target
    }

    /// Summons performed since the last reset.
    #[must_use]
    pub const fn summons(&self) -> u32 {
        self.summons
    }

    /// Restores the post-initialize state.
    pub fn reset(&mut self) {
        self.summon_timer = 0.0;
        self.rushable = true;
        self.rush_target = None;
        self.summons = 0;
    }

    /// Hits are ignored while dormant, waking, summoning or dead.
    #[must_use]
    pub const fn ignores_hits(&self, state: EnemyState) -> bool {
        matches!(
            state,
            EnemyState::Deactive | EnemyState::Active | EnemyState::Summon | EnemyState::Die
        )
    }

    const fn counts_toward_summon(state: EnemyState) -> bool {
        matches!(state, EnemyState::Trace | EnemyState::Attack | EnemyState::Damaged)
    }

    /// Advances the summon timer for one tick spent in `state`.
    pub fn accumulate(&mut self, state: EnemyState, dt: f32) {
        if Self::counts_toward_summon(state) {
            self.summon_timer += dt;
        }
    }

    /// Returns whether Summon should pre-empt the table this tick.
    #[must_use]
    pub fn summon_due(&self, state: EnemyState) -> bool {
        Self::counts_toward_summon(state) && self.summon_timer >= self.params.summon_rate
    }

    /// Resets the summon timer and returns how many minions to request.
    pub fn begin_summon(&mut self) -> u32 {
        self.summon_timer = 0.0;
        self.summons += 1;
        self.params.summon_count
    }

    /// Spends the rush and records the point to dash at.
    pub fn begin_rush(&mut self, snapshot: Vec3) {
        self.rushable = false;
        self.rush_target = Some(snapshot);
    }

    /// Fills in the boss-specific guard inputs.
    pub fn fill_inputs(&self, inputs: &mut GuardInputs, position: Vec3) {
        inputs.activate_range = self.params.activate_range;
        inputs.rushable = self.rushable;
        inputs.rush_point_reached = self
            .rush_target
            .is_some_and(|p| distance(position, p) < self.params.rush_range);
    }
}

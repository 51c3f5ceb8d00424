//! Timed spawner feeding entities from a pool into the world.
//!
//! The spawner only counts time while the phase reader says play is active
//! and its switch is on; otherwise the timer is held at zero. On each
//! interval it acquires an entity, picks a random point in a square around
//! the anchor and initializes the entity there. Pool exhaustion is logged
//! and retried on the next interval.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use skirmish_common::random_point_in_square;

use crate::config::SpawnerConfig;
use crate::enemy::{Enemy, SpawnPoint};
use crate::phase::PhaseReader;
use crate::pool::Pool;
use crate::route::PatrolRoute;

/// Result of one spawner tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome<H> {
    /// No attempt this tick
    Idle,
    /// An entity was placed
    Spawned(H),
    /// An attempt was made but the pool had nothing to give
    Exhausted,
}

impl<H> SpawnOutcome<H> {
    /// Handle of the spawned entity, if any.
    pub fn spawned(self) -> Option<H> {
        match self {
            Self::Spawned(handle) => Some(handle),
            Self::Idle | Self::Exhausted => None,
        }
    }
}

/// Spawn attempt counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnerStats {
    /// Acquire attempts
    pub attempts: u32,
    /// Entities placed
    pub spawned: u32,
    /// Attempts that found the pool empty
    pub failed: u32,
}

/// Periodic spawner.
#[derive(Debug)]
pub struct Spawner {
    config: SpawnerConfig,
    anchor: Vec3,
    route: PatrolRoute,
    phase: PhaseReader,
    timer: f32,
    rng: fastrand::Rng,
    stats: SpawnerStats,
}

impl Spawner {
    /// Creates a spawner gated by `phase`.
    #[must_use]
    pub fn new(config: SpawnerConfig, phase: PhaseReader) -> Self {
        Self {
            anchor: Vec3::from_array(config.anchor),
            config,
            route: PatrolRoute::empty(),
            phase,
            timer: 0.0,
            rng: fastrand::Rng::new(),
            stats: SpawnerStats::default(),
        }
    }

    /// Uses a seeded placement generator.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Route handed to every spawned entity.
    #[must_use]
    pub fn with_route(mut self, route: PatrolRoute) -> Self {
        self.route = route;
        self
    }

    /// Spawn area center.
    #[must_use]
    pub const fn anchor(&self) -> Vec3 {
        self.anchor
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    /// Seconds accumulated toward the next attempt.
    #[must_use]
    pub const fn timer(&self) -> f32 {
        self.timer
    }

    /// Attempt counters.
    #[must_use]
    pub const fn stats(&self) -> SpawnerStats {
        self.stats
    }

    /// Returns whether the spawn switch is on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Flips the spawn switch.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Picks the next spawn position.
    pub fn next_spawn_point(&mut self) -> Vec3 {
        random_point_in_square(
            &mut self.rng,
            self.anchor,
            self.config.radius,
            self.config.spawn_height,
        )
    }

    /// Advances the interval timer and spawns when it runs out.
    pub fn tick<P: Pool<Enemy>>(&mut self, dt: f32, pool: &mut P) -> SpawnOutcome<P::Handle> {
        if !self.config.enabled || !self.phase.is_play() {
            self.timer = 0.0;
            return SpawnOutcome::Idle;
        }

        self.timer += dt;
        if self.timer < self.config.spawn_interval {
            return SpawnOutcome::Idle;
        }
        self.timer = 0.0;

        let position = self.next_spawn_point();
        match self.spawn_at(pool, position) {
            Some(handle) => SpawnOutcome::Spawned(handle),
            None => SpawnOutcome::Exhausted,
        }
    }

    /// Acquires an entity and initializes it at `position` right away.
    pub fn spawn_at<P: Pool<Enemy>>(&mut self, pool: &mut P, position: Vec3) -> Option<P::Handle> {
        self.stats.attempts += 1;
        let Some(handle) = pool.acquire() else {
            self.stats.failed += 1;
            warn!(
                "Spawn attempt {} found the pool empty, retrying next interval",
                self.stats.attempts
            );
            return None;
        };
        let Some(enemy) = pool.get_mut(handle) else {
            self.stats.failed += 1;
            warn!("Acquired handle {handle} did not resolve");
            return None;
        };
        enemy.initialize(SpawnPoint {
            position,
            route: self.route.clone(),
        });
        self.stats.spawned += 1;
        debug!("Spawned enemy {} at {:?}", enemy.id(), position);
        Some(handle)
    }
}

//! A pool, its spawner and the entities currently in the world.
//!
//! The horde owns the tick order for a group of entities: spawn first, then
//! tick every live entity, then hand back the ones whose death sequence has
//! finished.

use glam::Vec3;
use tracing::{error, trace};

use skirmish_common::distance;

use crate::damage::{DamageEvent, Damageable, HitOutcome};
use crate::enemy::Enemy;
use crate::pool::{Pool, PoolStats};
use crate::spawner::{SpawnOutcome, Spawner, SpawnerStats};

/// What one horde update did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HordeTick<H> {
    /// Spawner result for this update
    pub spawn: SpawnOutcome<H>,
    /// Number of entities that changed state
    pub transitions: usize,
    /// Entities handed back to the pool
    pub released: Vec<H>,
}

/// Live group of pooled enemies.
#[derive(Debug)]
pub struct Horde<P: Pool<Enemy>> {
    pool: P,
    spawner: Spawner,
    live: Vec<P::Handle>,
}

impl<P: Pool<Enemy>> Horde<P> {
    /// Wraps `pool` and `spawner`.
    #[must_use]
    pub fn new(pool: P, spawner: Spawner) -> Self {
        Self {
            pool,
            spawner,
            live: Vec::new(),
        }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &P {
        &self.pool
    }

    /// The spawner.
    #[must_use]
    pub const fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    /// The spawner, mutably.
    pub fn spawner_mut(&mut self) -> &mut Spawner {
        &mut self.spawner
    }

    /// Handles of entities currently in the world.
    #[must_use]
    pub fn live(&self) -> &[P::Handle] {
        &self.live
    }

    /// Number of entities in the world.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns whether no entity is in the world.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live entity behind `handle`.
    #[must_use]
    pub fn get(&self, handle: P::Handle) -> Option<&Enemy> {
        self.pool.get(handle)
    }

    /// Iterates live entities with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (P::Handle, &Enemy)> + '_ {
        self.live
            .iter()
            .filter_map(|&handle| self.pool.get(handle).map(|enemy| (handle, enemy)))
    }

    /// Pool occupancy.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Spawner counters.
    #[must_use]
    pub const fn spawner_stats(&self) -> SpawnerStats {
        self.spawner.stats()
    }

    /// Runs the spawner, ticks every live entity and releases finished ones.
    pub fn update(&mut self, dt: f32) -> HordeTick<P::Handle> {
        let spawn = self.spawner.tick(dt, &mut self.pool);
        if let SpawnOutcome::Spawned(handle) = spawn {
            self.live.push(handle);
        }

        let mut transitions = 0;
        let mut finished = Vec::new();
        for &handle in &self.live {
            let Some(enemy) = self.pool.get_mut(handle) else {
                continue;
            };
            let report = enemy.tick(dt);
            if report.transition.is_some() {
                transitions += 1;
            }
            if report.release_requested || enemy.release_requested() {
                finished.push(handle);
            }
        }

        let mut released = Vec::with_capacity(finished.len());
        for handle in finished {
            self.live.retain(|&h| h != handle);
            match self.pool.release(handle) {
                Ok(()) => released.push(handle),
                Err(e) => error!("Failed to release {handle}: {e}"),
            }
        }

        HordeTick {
            spawn,
            transitions,
            released,
        }
    }

    /// Places an entity at `position` outside the spawn interval.
    pub fn spawn_at(&mut self, position: Vec3) -> Option<P::Handle> {
        let handle = self.spawner.spawn_at(&mut self.pool, position)?;
        self.live.push(handle);
        Some(handle)
    }

    /// Delivers a hit to one entity. Unknown handles are ignored.
    pub fn apply_damage(&mut self, handle: P::Handle, event: &DamageEvent) -> HitOutcome {
        match self.pool.get_mut(handle) {
            Some(enemy) => enemy.take_damage(event),
            None => {
                trace!("Hit on inactive handle {handle} ignored");
                HitOutcome::Ignored
            },
        }
    }

    /// Closest hittable entity within `range` of `point`.
    #[must_use]
    pub fn nearest(&self, point: Vec3, range: f32) -> Option<(P::Handle, f32)> {
        self.iter()
            .filter(|(_, enemy)| enemy.is_hittable() && !enemy.state().is_dead())
            .map(|(handle, enemy)| (handle, distance(point, enemy.position())))
            .filter(|&(_, d)| d <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

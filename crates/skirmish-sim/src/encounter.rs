//! Scripted encounter.
//!
//! Wires the AI core to stand-ins for the rest of a game:
//! - a target that orbits a point
//! - a turret that shoots the nearest hittable enemy
//! - a drain of the event bus that tallies rewards and routes boss summons
//!   to the minion horde

use glam::Vec3;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, trace};

use skirmish_ai::prelude::*;
use skirmish_common::{direction_to, distance, random_point_in_disc, EntityId};

use crate::config::{SimConfig, TurretConfig};

/// Radius around a summoner that minions appear in.
const SUMMON_SCATTER: f32 = 2.0;

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Simulated seconds
    pub seconds: f32,
    /// Ticks executed
    pub ticks: u64,
    /// Entities placed by spawners
    pub spawned: u32,
    /// Spawn attempts that found a pool empty
    pub spawn_failures: u32,
    /// Entities handed back to pools
    pub released: u32,
    /// Entities that entered Die
    pub deaths: u32,
    /// Turret shots that landed
    pub hits: u32,
    /// Attacks fired at the target
    pub attacks: u32,
    /// Damage carried by those attacks
    pub damage_to_target: i64,
    /// Reward pickups requested
    pub rewards: u32,
    /// Summon requests from the boss
    pub summons: u32,
    /// Minions placed in answer to summons
    pub minions: u32,
    /// Boss state at the end, if a boss took part
    pub boss_state: Option<EnemyState>,
}

struct NamedHorde {
    name: String,
    horde: Horde<EntityPool<Enemy>>,
}

struct BossSlot {
    enemy: Enemy,
    minions: Option<usize>,
}

struct Turret {
    id: EntityId,
    config: TurretConfig,
    cooldown: f32,
}

/// A running encounter.
pub struct Encounter {
    config: SimConfig,
    phase: PhaseSignal,
    bus: EventBus,
    target: TargetWriter,
    hordes: Vec<NamedHorde>,
    boss: Option<BossSlot>,
    turret: Option<Turret>,
    rng: fastrand::Rng,
    clock: f32,
    summary: Summary,
}

impl Encounter {
    /// Builds every pool, spawner and the boss from `config`.
    pub fn new(config: SimConfig) -> ConfigResult<Self> {
        config.validate()?;

        let phase = PhaseSignal::new(GamePhase::Wait);
        let bus = EventBus::default();
        let target = TargetWriter::new(EntityId::new(), config.target.position_at(0.0));
        let caps = MovementCapabilities::full(Arc::new(OpenGround));
        let mut rng = config.seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);

        let mut hordes = Vec::with_capacity(config.hordes.len());
        for horde_config in &config.hordes {
            let route = horde_config
                .route
                .as_deref()
                .and_then(|name| config.route(name))
                .map_or_else(PatrolRoute::empty, |route| route.build());

            let params = horde_config.enemy.clone();
            let factory_caps = caps.clone();
            let publisher = bus.publisher();
            let handle = target.handle();
            let pool = EntityPool::new(horde_config.pool, move || {
                Enemy::new(params.clone(), &factory_caps, publisher.clone()).with_target(handle.clone())
            });
            let spawner = Spawner::new(horde_config.spawner.clone(), phase.reader())
                .with_seed(rng.u64(..))
                .with_route(route);

            info!(
                "Horde '{}' ready: {} pooled, spawning every {}s",
                horde_config.name, horde_config.pool.initial_size, horde_config.spawner.spawn_interval
            );
            hordes.push(NamedHorde {
                name: horde_config.name.clone(),
                horde: Horde::new(pool, spawner),
            });
        }

        let boss = config.boss.as_ref().map(|boss_config| {
            let mut enemy = Enemy::boss(boss_config.params.clone(), &caps, bus.publisher())
                .with_target(target.handle());
            enemy.initialize(SpawnPoint::at(Vec3::from_array(boss_config.position)));
            BossSlot {
                enemy,
                minions: boss_config.minions.as_deref().and_then(|name| config.horde_index(name)),
            }
        });

        let turret = config.turret.map(|turret_config| Turret {
            id: EntityId::new(),
            config: turret_config,
            cooldown: 0.0,
        });

        Ok(Self {
            config,
            phase,
            bus,
            target,
            hordes,
            boss,
            turret,
            rng,
            clock: 0.0,
            summary: Summary::default(),
        })
    }

    /// Live entities across every horde.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.hordes.iter().map(|h| h.horde.len()).sum()
    }

    /// Runs the configured duration and returns the tally.
    pub fn run(&mut self) -> Summary {
        let dt = self.config.tick_seconds();
        let ticks = self.config.total_ticks();

        self.phase.set(GamePhase::Play);
        for _ in 0..ticks {
            self.tick(dt);
        }
        self.phase.set(GamePhase::Over);

        self.finish()
    }

    /// Advances every participant by `dt`.
    pub fn tick(&mut self, dt: f32) {
        self.clock += dt;
        self.summary.ticks += 1;
        self.target.set_position(self.config.target.position_at(self.clock));

        for named in &mut self.hordes {
            let tick = named.horde.update(dt);
            if let SpawnOutcome::Spawned(handle) = tick.spawn {
                trace!("Horde '{}' spawned {handle}", named.name);
            }
            self.summary.released += tick.released.len() as u32;
        }

        if let Some(boss) = self.boss.as_mut() {
            boss.enemy.tick(dt);
        }

        self.fire_turret(dt);
        self.drain_events();
    }

    fn fire_turret(&mut self, dt: f32) {
        let Some(turret) = self.turret.as_mut() else {
            return;
        };
        turret.cooldown -= dt;
        if turret.cooldown > 0.0 {
            return;
        }

        let origin = Vec3::from_array(turret.config.position);
        let range = turret.config.range;

        let mut best: Option<(usize, PoolHandle, f32)> = None;
        for (index, named) in self.hordes.iter().enumerate() {
            if let Some((handle, d)) = named.horde.nearest(origin, range) {
                if best.map_or(true, |(_, _, best_d)| d < best_d) {
                    best = Some((index, handle, d));
                }
            }
        }
        let boss_distance = self
            .boss
            .as_ref()
            .filter(|b| b.enemy.is_hittable() && !b.enemy.state().is_dead())
            .map(|b| distance(origin, b.enemy.position()))
            .filter(|&d| d <= range);

        let event_for = |at: Vec3| {
            DamageEvent::new(turret.config.damage)
                .with_knockback(turret.config.knockback, direction_to(at, origin))
                .at(at)
                .from_source(turret.id)
        };

        let outcome = match (best, boss_distance) {
            (Some((_, _, d)), Some(boss_d)) if boss_d < d => self.boss.as_mut().map(|b| {
                let event = event_for(b.enemy.position());
                b.enemy.take_damage(&event)
            }),
            (None, Some(_)) => self.boss.as_mut().map(|b| {
                let event = event_for(b.enemy.position());
                b.enemy.take_damage(&event)
            }),
            (Some((index, handle, _)), _) => {
                let horde = &mut self.hordes[index].horde;
                let at = horde.get(handle).map_or(origin, Enemy::position);
                Some(horde.apply_damage(handle, &event_for(at)))
            },
            (None, None) => None,
        };

        if let Some(outcome) = outcome {
            turret.cooldown = turret.config.fire_interval;
            if outcome.is_successful() {
                self.summary.hits += 1;
            }
        }
    }

    fn drain_events(&mut self) {
        for event in self.bus.drain() {
            match event {
                CombatEvent::AttackFired { damage, .. } => {
                    self.summary.attacks += 1;
                    self.summary.damage_to_target += i64::from(damage);
                },
                CombatEvent::EntityDied { entity_id, position } => {
                    self.summary.deaths += 1;
                    debug!("Enemy {entity_id} died at {position:?}");
                },
                CombatEvent::RewardSpawn { count, .. } => {
                    self.summary.rewards += count;
                },
                CombatEvent::SummonRequested { origin, count, .. } => {
                    self.summary.summons += 1;
                    self.fulfil_summon(origin, count);
                },
                CombatEvent::HealthChanged { .. } | CombatEvent::EntityReleased { .. } => {},
            }
        }
    }

    fn fulfil_summon(&mut self, origin: Vec3, count: u32) {
        let Some(index) = self.boss.as_ref().and_then(|b| b.minions) else {
            debug!("Summon of {count} ignored, no minion horde");
            return;
        };
        let Some(named) = self.hordes.get_mut(index) else {
            return;
        };
        for _ in 0..count {
            let at = random_point_in_disc(&mut self.rng, origin, SUMMON_SCATTER);
            if named.horde.spawn_at(at).is_some() {
                self.summary.minions += 1;
            }
        }
        info!("Summoned {count} into '{}' around {origin:?}", named.name);
    }

    fn finish(&mut self) -> Summary {
        self.summary.seconds = self.clock;
        self.summary.spawned = 0;
        self.summary.spawn_failures = 0;
        for named in &self.hordes {
            let stats = named.horde.spawner_stats();
            self.summary.spawned += stats.spawned;
            self.summary.spawn_failures += stats.failed;
            let pool = named.horde.pool_stats();
            info!(
                "Horde '{}': {} live, pool created {} / available {} / grown {}",
                named.name,
                named.horde.len(),
                pool.created,
                pool.available,
                pool.grown
            );
        }
        self.summary.boss_state = self.boss.as_ref().map(|b| b.enemy.state());
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BossConfig, TargetConfig};

    fn quiet_config() -> SimConfig {
        SimConfig {
            duration: 30.0,
            seed: Some(7),
            boss: None,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_turret_kills_and_pool_recycles() {
        let mut encounter = Encounter::new(quiet_config()).expect("valid config");
        let summary = encounter.run();

        assert_eq!(summary.ticks, 1800);
        assert!(summary.spawned >= 10);
        assert!(summary.hits > 0);
        assert!(summary.deaths > 0);
        assert!(summary.released > 0);
        assert_eq!(summary.rewards, summary.released * 10);
        assert!(summary.boss_state.is_none());
    }

    #[test]
    fn test_no_spawns_after_game_over() {
        let mut encounter = Encounter::new(SimConfig {
            turret: None,
            ..quiet_config()
        })
        .expect("valid config");
        let spawned = encounter.run().spawned;

        for _ in 0..600 {
            encounter.tick(1.0 / 60.0);
        }
        assert_eq!(encounter.finish().spawned, spawned);
    }

    #[test]
    fn test_boss_summons_fill_minion_horde() {
        let mut config = SimConfig {
            duration: 20.0,
            seed: Some(3),
            turret: None,
            target: TargetConfig {
                orbit_radius: 3.0,
                ..TargetConfig::default()
            },
            boss: Some(BossConfig {
                position: [0.0, 1.1, 4.0],
                ..BossConfig::default()
            }),
            ..SimConfig::default()
        };
        config.hordes[0].spawner.enabled = false;

        let mut encounter = Encounter::new(config).expect("valid config");
        let summary = encounter.run();

        assert!(summary.summons >= 1);
        assert_eq!(summary.minions, summary.summons * 3);
        assert_eq!(summary.spawned, summary.minions);
        assert!(summary.attacks > 0);
        assert!(summary.boss_state.is_some());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SimConfig {
            tick_rate: 0,
            ..SimConfig::default()
        };
        assert!(Encounter::new(config).is_err());
    }
}

//! # Skirmish AI
//!
//! Hostile-entity control core for Project Skirmish.
//!
//! This crate provides everything a hostile entity needs between spawn and
//! release:
//! - Table-driven state machine with guarded transitions
//! - Damage, stun windows and knockback
//! - Boss extension (activation, rush, periodic summon)
//! - Swappable movement backends with a single fallback
//! - Generational object pools, single and multi-kind
//! - Phase-gated spawner and the horde that ticks live entities
//! - Event bus for outbound requests (rewards, health bars, summons)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod boss;
pub mod config;
pub mod damage;
pub mod enemy;
pub mod events;
pub mod fsm;
pub mod horde;
pub mod movement;
pub mod phase;
pub mod pool;
pub mod route;
pub mod spawner;
pub mod target;
pub mod tasks;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::boss::*;
    pub use crate::config::*;
    pub use crate::damage::*;
    pub use crate::enemy::*;
    pub use crate::events::*;
    pub use crate::fsm::*;
    pub use crate::horde::*;
    pub use crate::movement::*;
    pub use crate::phase::*;
    pub use crate::pool::*;
    pub use crate::route::*;
    pub use crate::spawner::*;
    pub use crate::target::*;
    pub use crate::tasks::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use skirmish_common::EntityId;

    fn spawn(target_at: Vec3) -> (Enemy, TargetWriter, EventBus) {
        let bus = EventBus::new(64);
        let target = TargetWriter::new(EntityId::new(), target_at);
        let mut enemy = Enemy::new(
            EnemyParams::default(),
            &MovementCapabilities::controller_only(),
            bus.publisher(),
        )
        .with_target(target.handle());
        enemy.initialize(SpawnPoint::at(Vec3::ZERO));
        (enemy, target, bus)
    }

    #[test]
    fn test_three_hits_leave_enemy_stunned() {
        let (mut enemy, _target, _bus) = spawn(Vec3::new(40.0, 0.0, 0.0));

        let mut seen = Vec::new();
        for _ in 0..3 {
            enemy.take_damage(&DamageEvent::new(30));
            seen.push(enemy.health().current());
        }
        assert_eq!(seen, vec![70, 40, 10]);
        assert_eq!(enemy.state(), EnemyState::Damaged);
    }

    #[test]
    fn test_overkill_clamps_and_dies() {
        let (mut enemy, _target, bus) = spawn(Vec3::new(40.0, 0.0, 0.0));
        for _ in 0..3 {
            enemy.take_damage(&DamageEvent::new(30));
        }
        bus.drain();

        assert_eq!(enemy.take_damage(&DamageEvent::new(15)), HitOutcome::Killed);
        assert_eq!(enemy.health().current(), 0);
        assert_eq!(enemy.state(), EnemyState::Die);
        assert!(bus
            .drain()
            .iter()
            .any(|e| matches!(e, CombatEvent::EntityDied { .. })));
    }

    #[test]
    fn test_idle_notices_target_next_tick() {
        let (mut enemy, _target, _bus) = spawn(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(enemy.state(), EnemyState::Idle);

        let report = enemy.tick(1.0 / 60.0);
        assert_eq!(report.transition, Some((EnemyState::Idle, EnemyState::Trace)));
        assert_eq!(enemy.state(), EnemyState::Trace);
    }
}

//! Hostile entity driven by a declarative transition table.
//!
//! Each tick, in order:
//! 1. timed tasks advance; fired tasks whose expected state no longer
//!    matches are dropped as stale
//! 2. per-state timers advance
//! 3. the boss summon check may pre-empt the table
//! 4. at most one table row is taken and its entry action runs; when no row
//!    fires, the current state's body runs instead
//!
//! Hits arrive between ticks through `take_damage`, the only place health
//! changes.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use skirmish_common::{direction_to, distance, EntityId};

use crate::boss::BossBehavior;
use crate::config::{BossParams, EnemyKind, EnemyParams};
use crate::damage::{resolve_hit, DamageEvent, Damageable, Health, HitFeedback, HitOutcome, Knockback};
use crate::events::{CombatEvent, EventPublisher};
use crate::fsm::{EnemyState, Entry, GuardInputs, Transition, TransitionTable};
use crate::movement::{select_backend, Body, MovementBackend, MovementCapabilities, MovementMode};
use crate::pool::Poolable;
use crate::route::PatrolRoute;
use crate::target::TargetHandle;
use crate::tasks::TaskScheduler;

/// Destinations closer than this count as the same point.
const SAME_POINT_EPSILON: f32 = 0.001;

/// Timed sub-behaviors an enemy can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    /// End of the stun window
    Stun,
    /// End of the death delay
    Disappear,
    /// Boss wake-up finished
    Activation,
    /// Boss summon finished
    SummonEnd,
    /// Boss recovery after the rush strike
    RushRecovery,
}

/// Where and how an entity enters the world.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnPoint {
    /// Spawn position; also the home position
    pub position: Vec3,
    /// Shared patrol route
    pub route: PatrolRoute,
}

impl SpawnPoint {
    /// Spawn at `position` with no route.
    #[must_use]
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            route: PatrolRoute::empty(),
        }
    }

    /// Sets the patrol route.
    #[must_use]
    pub fn with_route(mut self, route: PatrolRoute) -> Self {
        self.route = route;
        self
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// State change taken this tick
    pub transition: Option<(EnemyState, EnemyState)>,
    /// The death sequence finished; the owner should release this entity
    pub release_requested: bool,
}

/// A hostile entity.
#[derive(Debug)]
pub struct Enemy {
    id: EntityId,
    params: EnemyParams,
    table: TransitionTable,
    state: EnemyState,
    health: Health,
    body: Body,
    start: Vec3,
    route: PatrolRoute,
    waypoint: usize,
    target: Option<TargetHandle>,
    backend: Option<Box<dyn MovementBackend>>,
    knockback: Option<Knockback>,
    last_hit: Option<HitFeedback>,
    idle_timer: f32,
    attack_timer: f32,
    damaged_elapsed: f32,
    state_time: f32,
    tasks: TaskScheduler<TaskKind, EnemyState>,
    /// Tasks that fired for the current state this tick
    fired: Vec<TaskKind>,
    events: EventPublisher,
    boss: Option<BossBehavior>,
    hittable: bool,
    ai_enabled: bool,
    release_requested: bool,
}

impl Enemy {
    /// Creates an ordinary (or follow) enemy.
    #[must_use]
    pub fn new(params: EnemyParams, caps: &MovementCapabilities, events: EventPublisher) -> Self {
        Self::build(params, None, caps, events)
    }

    /// Creates a boss.
    #[must_use]
    pub fn boss(params: BossParams, caps: &MovementCapabilities, events: EventPublisher) -> Self {
        let base = params.base();
        Self::build(base, Some(BossBehavior::new(params)), caps, events)
    }

    fn build(
        params: EnemyParams,
        boss: Option<BossBehavior>,
        caps: &MovementCapabilities,
        events: EventPublisher,
    ) -> Self {
        let id = EntityId::new();
        let backend = match select_backend(params.movement, caps, params.move_speed) {
            Ok(backend) => Some(backend),
            Err(e) => {
                error!("Enemy {} has no movement: {e}", id);
                None
            },
        };
        Self {
            id,
            table: TransitionTable::for_kind(params.kind),
            state: EnemyState::initial_for(params.kind),
            health: Health::new(params.max_health),
            body: Body::default(),
            start: Vec3::ZERO,
            route: PatrolRoute::empty(),
            waypoint: 0,
            target: None,
            backend,
            knockback: None,
            last_hit: None,
            idle_timer: 0.0,
            attack_timer: 0.0,
            damaged_elapsed: 0.0,
            state_time: 0.0,
            tasks: TaskScheduler::new(),
            fired: Vec::new(),
            events,
            boss,
            hittable: false,
            ai_enabled: false,
            release_requested: false,
            params,
        }
    }

    /// Sets the pursued target.
    #[must_use]
    pub fn with_target(mut self, target: TargetHandle) -> Self {
        self.target = Some(target);
        self
    }

    /// Replaces the pursued target. Takes effect at the next `initialize`.
    pub fn set_target(&mut self, target: Option<TargetHandle>) {
        self.target = target;
    }

    // === Accessors ===

    /// Entity ID (stable across pool reuse).
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> EnemyState {
        self.state
    }

    /// Entity kind.
    #[must_use]
    pub const fn kind(&self) -> EnemyKind {
        self.params.kind
    }

    /// Tuning values.
    #[must_use]
    pub const fn params(&self) -> &EnemyParams {
        &self.params
    }

    /// Health pool.
    #[must_use]
    pub const fn health(&self) -> Health {
        self.health
    }

    /// World position.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.body.position
    }

    /// Facing around +Y.
    #[must_use]
    pub const fn yaw(&self) -> f32 {
        self.body.yaw
    }

    /// Home position.
    #[must_use]
    pub const fn start_position(&self) -> Vec3 {
        self.start
    }

    /// Index of the waypoint being walked to.
    #[must_use]
    pub const fn waypoint_index(&self) -> usize {
        self.waypoint
    }

    /// Active knockback, if any.
    #[must_use]
    pub const fn knockback(&self) -> Option<Knockback> {
        self.knockback
    }

    /// Boss extension, if this is a boss.
    #[must_use]
    pub const fn boss_behavior(&self) -> Option<&BossBehavior> {
        self.boss.as_ref()
    }

    /// Movement backend variant bound at construction.
    #[must_use]
    pub fn movement_mode(&self) -> Option<MovementMode> {
        self.backend.as_ref().map(|b| b.mode())
    }

    /// Returns whether hits are currently detected.
    #[must_use]
    pub const fn is_hittable(&self) -> bool {
        self.hittable
    }

    /// Returns whether the entity ticks.
    #[must_use]
    pub const fn is_ai_enabled(&self) -> bool {
        self.ai_enabled
    }

    /// Returns whether the death sequence finished.
    #[must_use]
    pub const fn release_requested(&self) -> bool {
        self.release_requested
    }

    /// Returns whether a timed task of `kind` is in flight.
    #[must_use]
    pub fn has_task(&self, kind: TaskKind) -> bool {
        self.tasks.is_running(kind)
    }

    /// Number of timed tasks in flight.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    // === Lifecycle ===

    /// Places the entity and brings it to its initial state.
    pub fn initialize(&mut self, spawn: SpawnPoint) {
        self.reset();
        self.body = Body::at(spawn.position);
        self.start = spawn.position;
        self.route = spawn.route;
        self.enable_ai();
        self.publish_health();
        debug!(
            "Enemy {} ({:?}) initialized at {:?} in {}",
            self.id, self.params.kind, spawn.position, self.state
        );
    }

    /// Turns the AI on when a backend and a target are wired. Without them
    /// the entity stays inert and ignores hits.
    fn enable_ai(&mut self) {
        self.ai_enabled = if self.backend.is_none() {
            error!("Enemy {} has no movement backend, AI disabled", self.id);
            false
        } else if self.target.is_none() {
            error!("Enemy {} has no target, AI disabled", self.id);
            false
        } else {
            true
        };
        if !self.ai_enabled {
            self.hittable = false;
        }
    }

    fn reset(&mut self) {
        self.tasks.cancel_all();
        self.fired.clear();
        self.state = EnemyState::initial_for(self.params.kind);
        self.health.reset();
        self.knockback = None;
        self.last_hit = None;
        self.idle_timer = 0.0;
        self.attack_timer = 0.0;
        self.damaged_elapsed = 0.0;
        self.state_time = 0.0;
        self.waypoint = 0;
        self.hittable = true;
        self.release_requested = false;
        if let Some(backend) = self.backend.as_mut() {
            backend.clear_path();
            backend.set_speed(self.params.move_speed);
            backend.set_enabled(true);
        }
        if let Some(boss) = self.boss.as_mut() {
            boss.reset();
        }
    }

    fn disable(&mut self) {
        self.tasks.cancel_all();
        self.fired.clear();
        self.hittable = false;
        self.knockback = None;
        if let Some(backend) = self.backend.as_mut() {
            backend.stop();
            backend.clear_path();
            backend.set_enabled(false);
        }
    }

    // === Tick ===

    /// Advances the entity by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let mut report = TickReport::default();
        if !self.ai_enabled || self.release_requested {
            return report;
        }

        self.fired.clear();
        for task in self.tasks.tick(dt) {
            if !task.is_current(&self.state) {
                trace!(
                    "Enemy {} dropping stale {:?} task (expected {}, now {})",
                    self.id,
                    task.kind,
                    task.expects,
                    self.state
                );
                continue;
            }
            if task.kind == TaskKind::Disappear {
                self.finish_death();
                report.release_requested = true;
                return report;
            }
            self.fired.push(task.kind);
        }

        if self.state.is_dead() {
            return report;
        }

        self.advance_timers(dt);

        if self.boss.as_ref().is_some_and(|b| b.summon_due(self.state)) {
            let from = self.state;
            self.enter_summon();
            report.transition = Some((from, self.state));
            return report;
        }

        let inputs = self.guard_inputs();
        match self.table.select(self.state, &inputs) {
            Some(row) => {
                let from = self.state;
                self.enter(row);
                report.transition = Some((from, row.to));
            },
            None => self.run_state(dt),
        }
        report
    }

    fn advance_timers(&mut self, dt: f32) {
        self.state_time += dt;
        match self.state {
            EnemyState::Idle => self.idle_timer += dt,
            EnemyState::Attack => self.attack_timer += dt,
            EnemyState::Damaged => self.damaged_elapsed += dt,
            _ => {},
        }
        if let Some(boss) = self.boss.as_mut() {
            boss.accumulate(self.state, dt);
        }
    }

    fn target_position(&self) -> Option<Vec3> {
        self.target.as_ref().and_then(TargetHandle::position)
    }

    fn arrived_at(&self, point: Vec3) -> bool {
        self.backend.as_ref().is_some_and(|b| {
            b.destination()
                .is_some_and(|d| distance(d, point) < SAME_POINT_EPSILON)
                && b.has_arrived(&self.body, self.params.arrive_tolerance)
        })
    }

    fn guard_inputs(&self) -> GuardInputs {
        let target_distance = self
            .target_position()
            .map_or(f32::INFINITY, |p| distance(self.body.position, p));
        let waypoint_reached = self.state == EnemyState::Patrol
            && self
                .route
                .waypoint(self.waypoint)
                .is_some_and(|p| self.arrived_at(p));
        let home_reached = self.state == EnemyState::Return && self.arrived_at(self.start);

        let mut inputs = GuardInputs {
            kind: self.params.kind,
            target_distance,
            find_distance: self.params.find_distance,
            attack_distance: self.params.attack_distance,
            return_distance: self.params.return_distance,
            idle_elapsed: self.idle_timer,
            idle_time: self.params.idle_time,
            attack_elapsed: self.attack_timer,
            attack_cool_time: self.params.attack_cool_time,
            has_route: !self.route.is_empty(),
            waypoint_reached,
            home_reached,
            stun_elapsed: self.fired.contains(&TaskKind::Stun),
            activation_elapsed: self.fired.contains(&TaskKind::Activation),
            summon_finished: self.fired.contains(&TaskKind::SummonEnd),
            rush_recovered: self.fired.contains(&TaskKind::RushRecovery),
            ..GuardInputs::default()
        };
        if let Some(boss) = &self.boss {
            boss.fill_inputs(&mut inputs, self.body.position);
        }
        inputs
    }

    fn enter(&mut self, row: &Transition) {
        debug!("Enemy {} {} -> {}", self.id, row.from, row.to);
        self.state = row.to;
        self.state_time = 0.0;
        self.run_entry(row.entry);
    }

    fn run_entry(&mut self, entry: Entry) {
        match entry {
            Entry::None => {},
            Entry::ResetPatrol => {
                self.idle_timer = 0.0;
                self.waypoint = 0;
                if let Some(point) = self.route.waypoint(0) {
                    self.with_backend(|b| b.set_destination(point));
                }
            },
            Entry::ClearPath => self.with_backend(|b| b.clear_path()),
            Entry::BeginAttack => {
                self.attack_timer = 0.0;
                self.with_backend(|b| b.stop());
                self.face_target();
            },
            Entry::FireAttack => {
                self.attack_timer = 0.0;
                self.fire_attack(self.params.attack_damage);
            },
            Entry::AdvanceWaypoint => {
                if let Some(reached) = self.route.waypoint(self.waypoint) {
                    self.body.position = reached;
                }
                self.waypoint = self.route.next_index(self.waypoint);
                if let Some(next) = self.route.waypoint(self.waypoint) {
                    self.with_backend(|b| b.set_destination(next));
                }
            },
            Entry::SnapHome => {
                self.body.position = self.start;
                self.idle_timer = 0.0;
                self.attack_timer = 0.0;
                self.with_backend(|b| b.clear_path());
            },
            Entry::ResumeMovement => {
                self.knockback = None;
                self.damaged_elapsed = 0.0;
                let speed = self.params.move_speed;
                self.with_backend(|b| b.set_speed(speed));
            },
            Entry::Activate => {
                let delay = self.boss.as_ref().map_or(0.0, |b| b.params().activation_time);
                self.tasks.start(TaskKind::Activation, delay, EnemyState::Active);
            },
            Entry::BeginRush => {
                let snapshot = self.target_position().unwrap_or(self.body.position);
                let Some(boss) = self.boss.as_mut() else {
                    return;
                };
                boss.begin_rush(snapshot);
                let speed = boss.params().rush_speed;
                self.with_backend(|b| {
                    b.set_speed(speed);
                    b.set_destination(snapshot);
                });
                debug!("Boss {} rushing at {:?}", self.id, snapshot);
            },
            Entry::StrikeRush => {
                self.with_backend(|b| b.stop());
                let Some(boss) = self.boss.as_ref() else {
                    return;
                };
                let (damage, range, recovery) = {
                    let p = boss.params();
                    (p.rush_damage, p.attack_range, p.rush_recovery)
                };
                let in_range = self
                    .target_position()
                    .is_some_and(|p| distance(self.body.position, p) < range);
                if in_range {
                    self.fire_attack(damage);
                } else {
                    debug!("Boss {} rush strike missed", self.id);
                }
                self.tasks.start(TaskKind::RushRecovery, recovery, EnemyState::RushAttack);
            },
            Entry::ResumeChase => {
                let speed = self.params.move_speed;
                self.with_backend(|b| b.set_speed(speed));
            },
        }
    }

    fn enter_summon(&mut self) {
        let Some(boss) = self.boss.as_mut() else {
            return;
        };
        let count = boss.begin_summon();
        let duration = boss.params().summon_time;
        debug!("Enemy {} {} -> {} (summon)", self.id, self.state, EnemyState::Summon);
        self.state = EnemyState::Summon;
        self.state_time = 0.0;
        self.knockback = None;
        self.with_backend(|b| b.stop());
        self.tasks.start(TaskKind::SummonEnd, duration, EnemyState::Summon);
        self.events.publish(CombatEvent::SummonRequested {
            summoner: self.id,
            origin: self.body.position,
            count,
        });
    }

    fn run_state(&mut self, dt: f32) {
        match self.state {
            EnemyState::Patrol => {
                if let Some(point) = self.route.waypoint(self.waypoint) {
                    self.move_toward(point, dt);
                }
            },
            EnemyState::Trace => {
                if let Some(point) = self.target_position() {
                    self.move_toward(point, dt);
                }
            },
            EnemyState::Return => self.move_toward(self.start, dt),
            EnemyState::Rush => {
                if let Some(point) = self.boss.as_ref().and_then(BossBehavior::rush_target) {
                    self.move_toward(point, dt);
                }
            },
            EnemyState::Attack => self.face_target(),
            EnemyState::Damaged => {
                if let Some(kb) = self.knockback.as_mut() {
                    self.body.position += kb.step(dt);
                    if kb.is_finished() {
                        self.knockback = None;
                    }
                }
            },
            EnemyState::Idle
            | EnemyState::Die
            | EnemyState::Deactive
            | EnemyState::Active
            | EnemyState::Summon
            | EnemyState::RushAttack => {},
        }
    }

    fn move_toward(&mut self, point: Vec3, dt: f32) {
        if let Some(backend) = self.backend.as_mut() {
            backend.move_toward(&mut self.body, point, dt);
        }
    }

    fn with_backend(&mut self, f: impl FnOnce(&mut Box<dyn MovementBackend>)) {
        if let Some(backend) = self.backend.as_mut() {
            f(backend);
        }
    }

    fn face_target(&mut self) {
        if let Some(point) = self.target_position() {
            self.body.face(direction_to(self.body.position, point));
        }
    }

    fn fire_attack(&mut self, damage: i32) {
        trace!("Enemy {} attacks for {}", self.id, damage);
        self.events.publish(CombatEvent::AttackFired {
            attacker: self.id,
            origin: self.body.position,
            damage,
        });
    }

    fn publish_health(&self) {
        self.events.publish(CombatEvent::HealthChanged {
            entity_id: self.id,
            current: self.health.current(),
            max: self.health.max(),
        });
    }

    // === Damage ===

    fn accepts_hits(&self) -> bool {
        self.hittable
            && !self.state.is_dead()
            && !self.boss.as_ref().is_some_and(|b| b.ignores_hits(self.state))
    }

    fn stun(&mut self, event: &DamageEvent) {
        if self.state != EnemyState::Damaged {
            debug!("Enemy {} {} -> {}", self.id, self.state, EnemyState::Damaged);
        }
        self.state = EnemyState::Damaged;
        self.state_time = 0.0;
        self.damaged_elapsed = 0.0;
        // Latest hit wins: the previous push and stun window are replaced.
        self.knockback = Some(Knockback::from_hit(event, self.params.knockback_time));
        self.tasks
            .start(TaskKind::Stun, self.params.damaged_time, EnemyState::Damaged);
        self.with_backend(|b| {
            b.stop();
            b.clear_path();
        });
    }

    fn die(&mut self) {
        debug!("Enemy {} {} -> {}", self.id, self.state, EnemyState::Die);
        self.state = EnemyState::Die;
        self.state_time = 0.0;
        self.disable();
        self.tasks
            .start(TaskKind::Disappear, self.params.death_time, EnemyState::Die);
        self.events.publish(CombatEvent::EntityDied {
            entity_id: self.id,
            position: self.body.position,
        });
    }

    fn finish_death(&mut self) {
        info!("Enemy {} disappeared at {:?}", self.id, self.body.position);
        self.release_requested = true;
        self.events.publish(CombatEvent::RewardSpawn {
            position: self.body.position,
            count: self.params.reward_count,
        });
    }
}

impl Damageable for Enemy {
    fn take_damage(&mut self, event: &DamageEvent) -> HitOutcome {
        if !self.accepts_hits() {
            trace!("Enemy {} ignored hit in {}", self.id, self.state);
            return HitOutcome::Ignored;
        }
        let defense = self.boss.as_ref().map_or(1, BossBehavior::defense);
        let outcome = resolve_hit(&mut self.health, event, defense);
        self.last_hit = Some(HitFeedback {
            point: event.hit_point,
            direction: event.hit_direction,
        });
        self.publish_health();
        match outcome {
            HitOutcome::Killed => self.die(),
            HitOutcome::Damaged { .. } => self.stun(event),
            HitOutcome::Ignored => {},
        }
        outcome
    }

    fn hit_feedback(&self) -> Option<HitFeedback> {
        self.last_hit
    }
}

impl Poolable for Enemy {
    fn on_acquire(&mut self) {
        self.reset();
        self.enable_ai();
    }

    fn on_release(&mut self) {
        self.disable();
        self.ai_enabled = false;
        self.events.publish(CombatEvent::EntityReleased { entity_id: self.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::events::EventBus;
    use crate::pool::{EntityPool, Pool};
    use crate::target::TargetWriter;
    use proptest::prelude::*;
    use std::sync::Arc;

    const DT: f32 = 1.0 / 60.0;

    fn spawn_normal(params: EnemyParams, at: Vec3, target_at: Vec3) -> (Enemy, TargetWriter, EventBus) {
        let bus = EventBus::new(256);
        let target = TargetWriter::new(EntityId::new(), target_at);
        let mut enemy = Enemy::new(params, &MovementCapabilities::controller_only(), bus.publisher())
            .with_target(target.handle());
        enemy.initialize(SpawnPoint::at(at));
        (enemy, target, bus)
    }

    fn run_until(enemy: &mut Enemy, max_ticks: usize, done: impl Fn(&Enemy) -> bool) -> bool {
        for _ in 0..max_ticks {
            enemy.tick(DT);
            if done(enemy) {
                return true;
            }
        }
        false
    }

    fn far() -> Vec3 {
        Vec3::new(100.0, 0.0, 100.0)
    }

    #[test]
    fn test_initialize_publishes_health() {
        let (enemy, _target, bus) = spawn_normal(EnemyParams::default(), Vec3::ZERO, far());
        assert_eq!(enemy.state(), EnemyState::Idle);
        assert!(enemy.is_ai_enabled());
        assert!(bus.drain().contains(&CombatEvent::HealthChanged {
            entity_id: enemy.id(),
            current: 100,
            max: 100,
        }));
    }

    #[test]
    fn test_missing_target_disables_ai() {
        let mut enemy = Enemy::new(
            EnemyParams::default(),
            &MovementCapabilities::controller_only(),
            EventPublisher::detached(),
        );
        enemy.initialize(SpawnPoint::at(Vec3::ZERO));
        assert!(!enemy.is_ai_enabled());
        assert_eq!(enemy.tick(DT), TickReport::default());
        assert_eq!(enemy.state(), EnemyState::Idle);
    }

    #[test]
    fn test_disabled_enemy_ignores_hits() {
        let mut enemy = Enemy::new(
            EnemyParams::default(),
            &MovementCapabilities::controller_only(),
            EventPublisher::detached(),
        );
        enemy.initialize(SpawnPoint::at(Vec3::ZERO));
        assert!(!enemy.is_hittable());
        assert_eq!(enemy.take_damage(&DamageEvent::new(500)), HitOutcome::Ignored);
        assert_eq!(enemy.state(), EnemyState::Idle);
        assert_eq!(enemy.health().current(), 100);
        assert_eq!(enemy.pending_tasks(), 0);
    }

    #[test]
    fn test_missing_backend_disables_entity() {
        let target = TargetWriter::new(EntityId::new(), Vec3::ZERO);
        let mut enemy = Enemy::new(
            EnemyParams::default(),
            &MovementCapabilities::none(),
            EventPublisher::detached(),
        )
        .with_target(target.handle());
        enemy.initialize(SpawnPoint::at(Vec3::ZERO));
        assert!(enemy.movement_mode().is_none());
        assert!(!enemy.is_ai_enabled());
    }

    #[test]
    fn test_backend_fallback_keeps_entity_alive() {
        let params = EnemyParams::default().with_movement(MovementMode::PathfindingAgent);
        let (enemy, _target, _bus) = spawn_normal(params, Vec3::ZERO, far());
        assert_eq!(enemy.movement_mode(), Some(MovementMode::DirectController));
        assert!(enemy.is_ai_enabled());
    }

    #[test]
    fn test_idle_detects_target_next_tick() {
        let (mut enemy, _target, _bus) =
            spawn_normal(EnemyParams::default(), Vec3::ZERO, Vec3::new(0.0, 0.0, 5.0));
        let report = enemy.tick(DT);
        assert_eq!(report.transition, Some((EnemyState::Idle, EnemyState::Trace)));
        assert_eq!(enemy.state(), EnemyState::Trace);
    }

    #[test]
    fn test_trace_closes_in_and_attacks() {
        let (mut enemy, _target, bus) =
            spawn_normal(EnemyParams::default(), Vec3::ZERO, Vec3::new(0.0, 0.0, 6.0));
        assert!(run_until(&mut enemy, 120, |e| e.state() == EnemyState::Attack));
        let dist = distance(enemy.position(), Vec3::new(0.0, 0.0, 6.0));
        assert!(dist <= 2.5 + 1e-4);
        assert!(enemy.yaw().abs() < 1e-4);

        bus.drain();
        // One cooldown plus slack.
        for _ in 0..70 {
            enemy.tick(DT);
        }
        let attacks = bus
            .drain()
            .into_iter()
            .filter(|e| matches!(e, CombatEvent::AttackFired { damage: 10, .. }))
            .count();
        assert_eq!(attacks, 1);
        assert_eq!(enemy.state(), EnemyState::Attack);
    }

    #[test]
    fn test_attack_resumes_trace_when_target_leaves() {
        let (mut enemy, target, _bus) =
            spawn_normal(EnemyParams::default(), Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0));
        assert!(run_until(&mut enemy, 10, |e| e.state() == EnemyState::Attack));
        target.set_position(Vec3::new(0.0, 0.0, 5.0));
        let report = enemy.tick(DT);
        assert_eq!(report.transition, Some((EnemyState::Attack, EnemyState::Trace)));
    }

    #[test]
    fn test_gives_up_and_walks_home() {
        let home = Vec3::new(1.0, 0.0, 1.0);
        let (mut enemy, target, _bus) =
            spawn_normal(EnemyParams::default(), home, Vec3::new(1.0, 0.0, 6.0));
        assert!(run_until(&mut enemy, 5, |e| e.state() == EnemyState::Trace));
        for _ in 0..30 {
            enemy.tick(DT);
        }
        assert_ne!(enemy.position(), home);

        target.set_position(Vec3::new(60.0, 0.0, 60.0));
        let report = enemy.tick(DT);
        assert_eq!(report.transition, Some((EnemyState::Trace, EnemyState::Return)));

        assert!(run_until(&mut enemy, 600, |e| e.state() == EnemyState::Idle));
        assert_eq!(enemy.position(), home);
    }

    #[test]
    fn test_follow_kind_never_returns() {
        let (mut enemy, target, _bus) =
            spawn_normal(EnemyParams::follow(), Vec3::ZERO, Vec3::new(0.0, 0.0, 50.0));
        assert_eq!(enemy.state(), EnemyState::Trace);
        target.set_position(Vec3::new(0.0, 0.0, 500.0));
        for _ in 0..120 {
            enemy.tick(DT);
            assert_eq!(enemy.state(), EnemyState::Trace);
        }
        assert!(enemy.position().z > 0.0);
    }

    #[test]
    fn test_patrol_walks_route_in_order() {
        let route = PatrolRoute::from(vec![Vec3::new(2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 2.0)]);
        let bus = EventBus::new(64);
        let target = TargetWriter::new(EntityId::new(), far());
        let mut enemy = Enemy::new(
            EnemyParams::default(),
            &MovementCapabilities::controller_only(),
            bus.publisher(),
        )
        .with_target(target.handle());
        enemy.initialize(SpawnPoint::at(Vec3::ZERO).with_route(route));

        assert!(run_until(&mut enemy, 120, |e| e.state() == EnemyState::Patrol));
        assert_eq!(enemy.waypoint_index(), 0);
        assert!(run_until(&mut enemy, 120, |e| e.waypoint_index() == 1));
        assert_eq!(enemy.position(), Vec3::new(2.0, 0.0, 0.0));
        assert!(run_until(&mut enemy, 120, |e| e.waypoint_index() == 0));
        assert_eq!(enemy.state(), EnemyState::Patrol);
    }

    #[test]
    fn test_idle_without_route_stays_idle() {
        let (mut enemy, _target, _bus) = spawn_normal(EnemyParams::default(), Vec3::ZERO, far());
        for _ in 0..200 {
            enemy.tick(DT);
        }
        assert_eq!(enemy.state(), EnemyState::Idle);
    }

    #[test]
    fn test_hit_stuns_then_traces() {
        let (mut enemy, _target, _bus) = spawn_normal(EnemyParams::default(), Vec3::ZERO, far());
        let event = DamageEvent::new(10).with_knockback(4.0, Vec3::X);
        assert_eq!(enemy.take_damage(&event), HitOutcome::Damaged { health: 90 });
        assert_eq!(enemy.state(), EnemyState::Damaged);
        assert!(enemy.has_task(TaskKind::Stun));

        enemy.tick(DT);
        assert!(enemy.position().x < 0.0, "pushed away from the hit");

        assert!(run_until(&mut enemy, 60, |e| e.state() != EnemyState::Damaged));
        assert_eq!(enemy.state(), EnemyState::Trace);
        assert!(enemy.knockback().is_none());
    }

    #[test]
    fn test_second_hit_restarts_stun_and_overrides_knockback() {
        let (mut enemy, _target, _bus) = spawn_normal(EnemyParams::default(), Vec3::ZERO, far());
        enemy.take_damage(&DamageEvent::new(5).with_knockback(4.0, Vec3::X));
        for _ in 0..15 {
            enemy.tick(DT);
        }
        enemy.take_damage(&DamageEvent::new(5).with_knockback(2.0, Vec3::Z));
        let kb = enemy.knockback().expect("fresh knockback");
        assert_eq!(kb.direction(), Vec3::new(0.0, 0.0, -1.0));
        assert!((kb.force() - 2.0).abs() < f32::EPSILON);
        assert_eq!(enemy.pending_tasks(), 1);

        // The first stun would have ended by now; the restarted one has not.
        for _ in 0..20 {
            enemy.tick(DT);
        }
        assert_eq!(enemy.state(), EnemyState::Damaged);
        assert!(run_until(&mut enemy, 30, |e| e.state() == EnemyState::Trace));
    }

    #[test]
    fn test_death_sequence_requests_release_and_reward() {
        let (mut enemy, _target, bus) = spawn_normal(EnemyParams::default(), Vec3::ZERO, far());
        assert_eq!(enemy.take_damage(&DamageEvent::new(500)), HitOutcome::Killed);
        assert_eq!(enemy.state(), EnemyState::Die);
        assert!(!enemy.is_hittable());
        assert!(enemy.has_task(TaskKind::Disappear));

        let mut released = false;
        for _ in 0..(2 * 60 + 5) {
            if enemy.tick(DT).release_requested {
                released = true;
                break;
            }
        }
        assert!(released);
        assert!(enemy.release_requested());
        let events = bus.drain();
        assert!(events.contains(&CombatEvent::RewardSpawn {
            position: Vec3::ZERO,
            count: 10,
        }));
        assert!(events
            .iter()
            .any(|e| matches!(e, CombatEvent::EntityDied { .. })));
    }

    #[test]
    fn test_pool_hooks_reset_and_cancel() {
        let (mut enemy, _target, bus) = spawn_normal(EnemyParams::default(), Vec3::ZERO, far());
        enemy.take_damage(&DamageEvent::new(40).with_knockback(3.0, Vec3::X));
        assert_eq!(enemy.pending_tasks(), 1);

        enemy.on_release();
        assert_eq!(enemy.pending_tasks(), 0);
        assert!(!enemy.is_ai_enabled());
        assert!(bus
            .drain()
            .contains(&CombatEvent::EntityReleased { entity_id: enemy.id() }));

        enemy.on_acquire();
        assert_eq!(enemy.health().current(), 100);
        assert_eq!(enemy.state(), EnemyState::Idle);
        assert!(enemy.knockback().is_none());
        assert!(enemy.hit_feedback().is_none());
        assert!(enemy.is_ai_enabled());
        assert!(enemy.is_hittable());
    }

    #[test]
    fn test_reacquired_enemy_resumes_ai() {
        let target = TargetWriter::new(EntityId::new(), Vec3::new(5.0, 0.0, 0.0));
        let handle = target.handle();
        let mut pool = EntityPool::new(PoolConfig::fixed(1), move || {
            Enemy::new(
                EnemyParams::default(),
                &MovementCapabilities::controller_only(),
                EventPublisher::detached(),
            )
            .with_target(handle.clone())
        });

        let first = pool.acquire().expect("warm instance");
        pool.get_mut(first).expect("active").initialize(SpawnPoint::at(Vec3::ZERO));
        pool.release(first).expect("release");

        let second = pool.acquire().expect("recycled instance");
        assert_eq!(second.slot(), first.slot());
        let enemy = pool.get_mut(second).expect("active");
        assert!(enemy.is_ai_enabled());
        let report = enemy.tick(DT);
        assert_eq!(report.transition, Some((EnemyState::Idle, EnemyState::Trace)));
    }

    #[test]
    fn test_warm_up_publishes_no_release() {
        let bus = EventBus::new(16);
        let publisher = bus.publisher();
        let pool = EntityPool::new(PoolConfig::fixed(3), move || {
            Enemy::new(
                EnemyParams::default(),
                &MovementCapabilities::controller_only(),
                publisher.clone(),
            )
        });
        assert_eq!(pool.available(), 3);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_hit_feedback_records_last_hit() {
        let (mut enemy, _target, _bus) = spawn_normal(EnemyParams::default(), Vec3::ZERO, far());
        let event = DamageEvent::new(1).with_knockback(1.0, Vec3::X).at(Vec3::ONE);
        enemy.take_damage(&event);
        let feedback = enemy.hit_feedback().expect("feedback");
        assert_eq!(feedback.point, Vec3::ONE);
        assert_eq!(feedback.direction, Vec3::X);
    }

    #[test]
    fn test_pathfinding_agent_drives_trace() {
        let bus = EventBus::new(64);
        let target = TargetWriter::new(EntityId::new(), Vec3::new(0.0, 0.0, 6.0));
        let caps = MovementCapabilities::navigation_only(Arc::new(crate::movement::OpenGround));
        let params = EnemyParams::default().with_movement(MovementMode::PathfindingAgent);
        let mut enemy = Enemy::new(params, &caps, bus.publisher()).with_target(target.handle());
        enemy.initialize(SpawnPoint::at(Vec3::ZERO));
        assert_eq!(enemy.movement_mode(), Some(MovementMode::PathfindingAgent));
        assert!(run_until(&mut enemy, 120, |e| e.state() == EnemyState::Attack));
    }

    proptest! {
        #[test]
        fn prop_die_is_absorbing(hits in proptest::collection::vec(-50i32..200, 1..30)) {
            let (mut enemy, _target, _bus) = spawn_normal(EnemyParams::default(), Vec3::ZERO, far());
            let mut dead = false;
            for value in hits {
                let before = enemy.health().current();
                let outcome = enemy.take_damage(&DamageEvent::new(value));
                prop_assert!(enemy.health().current() <= enemy.health().max());
                if dead {
                    prop_assert_eq!(outcome, HitOutcome::Ignored);
                    prop_assert_eq!(enemy.health().current(), before);
                    prop_assert_eq!(enemy.state(), EnemyState::Die);
                } else {
                    prop_assert!(outcome.is_successful());
                    let expected = if enemy.health().is_depleted() {
                        EnemyState::Die
                    } else {
                        EnemyState::Damaged
                    };
                    prop_assert_eq!(enemy.state(), expected);
                }
                dead = enemy.state().is_dead();
                enemy.tick(DT);
            }
        }
    }
}

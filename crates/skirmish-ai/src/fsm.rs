//! Declarative transition tables for hostile entities.
//!
//! One generic machine drives every kind. A table row is
//! `from -- guard --> to / entry`, and rows are tried in order:
//! the first row whose `from` matches and whose guard holds is taken, and at
//! most one row is taken per tick. Guard thresholds come from the entity's
//! parameters through `GuardInputs`, so kinds differ only in values and in
//! which table they use.
//!
//! Hit reactions (Damaged, Die) are not table rows; they are driven by
//! `take_damage` outside the tick.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EnemyKind;

/// Behavioral state of a hostile entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EnemyState {
    /// Standing still, waiting
    #[default]
    Idle,
    /// Walking the patrol route
    Patrol,
    /// Chasing the target
    Trace,
    /// Walking back to the start position
    Return,
    /// Attacking the target in range
    Attack,
    /// Stunned after a hit
    Damaged,
    /// Dead; terminal until the pool reclaims the instance
    Die,
    /// Boss: dormant
    Deactive,
    /// Boss: waking up
    Active,
    /// Boss: calling minions
    Summon,
    /// Boss: dashing at a captured point
    Rush,
    /// Boss: striking at the end of a rush
    RushAttack,
}

impl EnemyState {
    /// Returns whether this state only exists for bosses.
    #[must_use]
    pub const fn is_boss_only(self) -> bool {
        matches!(
            self,
            Self::Deactive | Self::Active | Self::Summon | Self::Rush | Self::RushAttack
        )
    }

    /// Returns whether the entity is dead.
    #[must_use]
    pub const fn is_dead(self) -> bool {
        matches!(self, Self::Die)
    }

    /// State an entity of `kind` starts in after initialization.
    #[must_use]
    pub const fn initial_for(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::Normal => Self::Idle,
            EnemyKind::Follow => Self::Trace,
            EnemyKind::Boss => Self::Deactive,
        }
    }
}

impl fmt::Display for EnemyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Condition checked for a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Guard {
    /// Always holds
    Always,
    /// Target closer than the find distance
    TargetWithinFind,
    /// Idle long enough and a patrol route exists
    IdleElapsedWithRoute,
    /// Current waypoint reached
    WaypointReached,
    /// Target at or inside the attack distance
    TargetWithinAttack,
    /// Target strictly inside the attack distance
    TargetInsideAttack,
    /// Target at or past the return distance (kinds that give up only)
    TargetBeyondReturn,
    /// Start position reached
    HomeReached,
    /// Target at or past the attack distance
    TargetOutsideAttack,
    /// Attack cooldown elapsed
    AttackReady,
    /// Stun window elapsed
    StunElapsed,
    /// Boss: target closer than the activation range
    TargetWithinActivation,
    /// Boss: wake-up finished
    ActivationElapsed,
    /// Boss: the one-shot rush is still available
    RushReady,
    /// Boss: rush point reached
    RushPointReached,
    /// Boss: recovery after the rush strike finished
    RushRecovered,
    /// Boss: summon finished
    SummonFinished,
}

/// Action run once on entering the row's target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entry {
    /// Nothing
    None,
    /// Start the route from its first waypoint
    ResetPatrol,
    /// Drop the current path
    ClearPath,
    /// Stop moving and reset the attack timer
    BeginAttack,
    /// Fire one attack and reset the attack timer
    FireAttack,
    /// Head for the next waypoint
    AdvanceWaypoint,
    /// Snap to the start position and reset timers
    SnapHome,
    /// Re-enable movement after a stun
    ResumeMovement,
    /// Boss: start the wake-up timer
    Activate,
    /// Boss: capture the target position and dash at it
    BeginRush,
    /// Boss: strike once and start the recovery timer
    StrikeRush,
    /// Boss: go back to chase speed
    ResumeChase,
}

/// One row of a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State the row applies to
    pub from: EnemyState,
    /// Condition that must hold
    pub guard: Guard,
    /// State entered
    pub to: EnemyState,
    /// Action run on entry
    pub entry: Entry,
}

const fn row(from: EnemyState, guard: Guard, to: EnemyState, entry: Entry) -> Transition {
    Transition {
        from,
        guard,
        to,
        entry,
    }
}

use EnemyState as S;

/// Rows shared by ordinary and follow kinds.
pub const BASE_ROWS: &[Transition] = &[
    row(S::Idle, Guard::TargetWithinFind, S::Trace, Entry::None),
    row(S::Idle, Guard::IdleElapsedWithRoute, S::Patrol, Entry::ResetPatrol),
    row(S::Patrol, Guard::TargetWithinFind, S::Trace, Entry::ClearPath),
    row(S::Patrol, Guard::WaypointReached, S::Patrol, Entry::AdvanceWaypoint),
    row(S::Trace, Guard::TargetWithinAttack, S::Attack, Entry::BeginAttack),
    row(S::Trace, Guard::TargetBeyondReturn, S::Return, Entry::ClearPath),
    row(S::Return, Guard::TargetWithinFind, S::Trace, Entry::ClearPath),
    row(S::Return, Guard::HomeReached, S::Idle, Entry::SnapHome),
    row(S::Attack, Guard::TargetOutsideAttack, S::Trace, Entry::None),
    row(S::Attack, Guard::AttackReady, S::Attack, Entry::FireAttack),
    row(S::Damaged, Guard::StunElapsed, S::Trace, Entry::ResumeMovement),
];

/// Rows for the boss.
pub const BOSS_ROWS: &[Transition] = &[
    row(S::Deactive, Guard::TargetWithinActivation, S::Active, Entry::Activate),
    row(S::Active, Guard::ActivationElapsed, S::Idle, Entry::None),
    row(S::Idle, Guard::RushReady, S::Rush, Entry::BeginRush),
    row(S::Idle, Guard::Always, S::Trace, Entry::None),
    row(S::Rush, Guard::RushPointReached, S::RushAttack, Entry::StrikeRush),
    row(S::RushAttack, Guard::RushRecovered, S::Trace, Entry::ResumeChase),
    row(S::Trace, Guard::TargetInsideAttack, S::Attack, Entry::BeginAttack),
    row(S::Attack, Guard::TargetOutsideAttack, S::Trace, Entry::None),
    row(S::Attack, Guard::AttackReady, S::Attack, Entry::FireAttack),
    row(S::Summon, Guard::SummonFinished, S::Trace, Entry::ResumeChase),
    row(S::Damaged, Guard::StunElapsed, S::Trace, Entry::ResumeMovement),
];

/// Everything a guard may look at, sampled once at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardInputs {
    /// Entity kind
    pub kind: EnemyKind,
    /// Distance to the target
    pub target_distance: f32,
    /// Find distance
    pub find_distance: f32,
    /// Attack distance
    pub attack_distance: f32,
    /// Return distance
    pub return_distance: f32,
    /// Boss activation range
    pub activate_range: f32,
    /// Idle timer
    pub idle_elapsed: f32,
    /// Idle time before patrolling
    pub idle_time: f32,
    /// Attack timer
    pub attack_elapsed: f32,
    /// Attack cooldown
    pub attack_cool_time: f32,
    /// A patrol route with waypoints is assigned
    pub has_route: bool,
    /// The current waypoint is reached
    pub waypoint_reached: bool,
    /// The start position is reached
    pub home_reached: bool,
    /// The stun timer fired this tick
    pub stun_elapsed: bool,
    /// The wake-up timer fired this tick
    pub activation_elapsed: bool,
    /// The one-shot rush is unused
    pub rushable: bool,
    /// The rush point is reached
    pub rush_point_reached: bool,
    /// The rush recovery timer fired this tick
    pub rush_recovered: bool,
    /// The summon timer fired this tick
    pub summon_finished: bool,
}

impl Default for GuardInputs {
    fn default() -> Self {
        Self {
            kind: EnemyKind::Normal,
            target_distance: f32::INFINITY,
            find_distance: 0.0,
            attack_distance: 0.0,
            return_distance: f32::INFINITY,
            activate_range: 0.0,
            idle_elapsed: 0.0,
            idle_time: 0.0,
            attack_elapsed: 0.0,
            attack_cool_time: 0.0,
            has_route: false,
            waypoint_reached: false,
            home_reached: false,
            stun_elapsed: false,
            activation_elapsed: false,
            rushable: false,
            rush_point_reached: false,
            rush_recovered: false,
            summon_finished: false,
        }
    }
}

impl GuardInputs {
    /// Evaluates one guard.
    #[must_use]
    pub fn holds(&self, guard: Guard) -> bool {
        let d = self.target_distance;
        match guard {
            Guard::Always => true,
            Guard::TargetWithinFind => d < self.find_distance,
            Guard::IdleElapsedWithRoute => self.has_route && self.idle_elapsed >= self.idle_time,
            Guard::WaypointReached => self.waypoint_reached,
            Guard::TargetWithinAttack => d <= self.attack_distance,
            Guard::TargetInsideAttack => d < self.attack_distance,
            Guard::TargetBeyondReturn => self.kind.gives_up() && d >= self.return_distance,
            Guard::HomeReached => self.home_reached,
            Guard::TargetOutsideAttack => d >= self.attack_distance,
            Guard::AttackReady => self.attack_elapsed >= self.attack_cool_time,
            Guard::StunElapsed => self.stun_elapsed,
            Guard::TargetWithinActivation => d < self.activate_range,
            Guard::ActivationElapsed => self.activation_elapsed,
            Guard::RushReady => self.rushable,
            Guard::RushPointReached => self.rush_point_reached,
            Guard::RushRecovered => self.rush_recovered,
            Guard::SummonFinished => self.summon_finished,
        }
    }
}

/// Ordered set of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTable {
    rows: &'static [Transition],
}

impl TransitionTable {
    /// Table for ordinary and follow kinds.
    pub const BASE: Self = Self { rows: BASE_ROWS };

    /// Table for the boss.
    pub const BOSS: Self = Self { rows: BOSS_ROWS };

    /// Table used by `kind`.
    #[must_use]
    pub const fn for_kind(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::Boss => Self::BOSS,
            EnemyKind::Normal | EnemyKind::Follow => Self::BASE,
        }
    }

    /// All rows in evaluation order.
    #[must_use]
    pub const fn rows(&self) -> &'static [Transition] {
        self.rows
    }

    /// Rows leaving `state`, in evaluation order.
    pub fn rows_from(&self, state: EnemyState) -> impl Iterator<Item = &'static Transition> {
        self.rows.iter().filter(move |r| r.from == state)
    }

    /// First row leaving `state` whose guard holds.
    #[must_use]
    pub fn select(&self, state: EnemyState, inputs: &GuardInputs) -> Option<&'static Transition> {
        self.rows_from(state).find(|r| inputs.holds(r.guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(distance: f32) -> GuardInputs {
        GuardInputs {
            target_distance: distance,
            find_distance: 7.0,
            attack_distance: 2.5,
            return_distance: 10.0,
            activate_range: 10.0,
            idle_time: 1.0,
            attack_cool_time: 1.0,
            ..GuardInputs::default()
        }
    }

    #[test]
    fn test_no_row_leaves_die() {
        for table in [TransitionTable::BASE, TransitionTable::BOSS] {
            assert_eq!(table.rows_from(EnemyState::Die).count(), 0);
            assert!(table.rows().iter().all(|r| r.to != EnemyState::Die));
            assert!(table.rows().iter().all(|r| r.to != EnemyState::Damaged));
        }
    }

    #[test]
    fn test_base_table_has_no_boss_states() {
        for r in TransitionTable::BASE.rows() {
            assert!(!r.from.is_boss_only());
            assert!(!r.to.is_boss_only());
        }
    }

    #[test]
    fn test_idle_sees_target() {
        let t = TransitionTable::BASE
            .select(EnemyState::Idle, &inputs(5.0))
            .expect("transition");
        assert_eq!(t.to, EnemyState::Trace);
    }

    #[test]
    fn test_idle_without_route_never_patrols() {
        let mut i = inputs(50.0);
        i.idle_elapsed = 30.0;
        assert!(TransitionTable::BASE.select(EnemyState::Idle, &i).is_none());

        i.has_route = true;
        let t = TransitionTable::BASE.select(EnemyState::Idle, &i).expect("patrol");
        assert_eq!((t.to, t.entry), (EnemyState::Patrol, Entry::ResetPatrol));
    }

    #[test]
    fn test_trace_attack_threshold_is_inclusive() {
        let t = TransitionTable::BASE
            .select(EnemyState::Trace, &inputs(2.5))
            .expect("attack");
        assert_eq!(t.to, EnemyState::Attack);
        assert!(TransitionTable::BASE.select(EnemyState::Trace, &inputs(2.6)).is_none());
    }

    #[test]
    fn test_boss_attack_threshold_is_strict() {
        let i = GuardInputs {
            kind: EnemyKind::Boss,
            target_distance: 10.0,
            attack_distance: 10.0,
            return_distance: f32::INFINITY,
            ..GuardInputs::default()
        };
        assert!(TransitionTable::BOSS.select(EnemyState::Trace, &i).is_none());

        let i = GuardInputs {
            target_distance: 9.9,
            ..i
        };
        let t = TransitionTable::BOSS.select(EnemyState::Trace, &i).expect("attack");
        assert_eq!((t.to, t.entry), (EnemyState::Attack, Entry::BeginAttack));
    }

    #[test]
    fn test_follow_kind_never_returns() {
        let mut i = inputs(50.0);
        let t = TransitionTable::BASE.select(EnemyState::Trace, &i).expect("return");
        assert_eq!(t.to, EnemyState::Return);

        i.kind = EnemyKind::Follow;
        assert!(TransitionTable::BASE.select(EnemyState::Trace, &i).is_none());
    }

    #[test]
    fn test_attack_prefers_leaving_over_firing() {
        let mut i = inputs(3.0);
        i.attack_elapsed = 5.0;
        let t = TransitionTable::BASE.select(EnemyState::Attack, &i).expect("leave");
        assert_eq!(t.to, EnemyState::Trace);

        let i = GuardInputs {
            target_distance: 1.0,
            ..i
        };
        let t = TransitionTable::BASE.select(EnemyState::Attack, &i).expect("fire");
        assert_eq!(t.entry, Entry::FireAttack);
    }

    #[test]
    fn test_boss_rushes_once_then_traces() {
        let mut i = inputs(20.0);
        i.rushable = true;
        let t = TransitionTable::BOSS.select(EnemyState::Idle, &i).expect("rush");
        assert_eq!(t.to, EnemyState::Rush);

        i.rushable = false;
        let t = TransitionTable::BOSS.select(EnemyState::Idle, &i).expect("trace");
        assert_eq!(t.to, EnemyState::Trace);
    }

    #[test]
    fn test_initial_states() {
        assert_eq!(EnemyState::initial_for(EnemyKind::Normal), EnemyState::Idle);
        assert_eq!(EnemyState::initial_for(EnemyKind::Follow), EnemyState::Trace);
        assert_eq!(EnemyState::initial_for(EnemyKind::Boss), EnemyState::Deactive);
    }

    #[test]
    fn test_table_for_kind() {
        assert_eq!(TransitionTable::for_kind(EnemyKind::Follow), TransitionTable::BASE);
        assert_eq!(TransitionTable::for_kind(EnemyKind::Boss), TransitionTable::BOSS);
    }
}

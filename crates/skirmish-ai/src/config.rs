//! Tuning parameters for hostile entities, pools and spawners.
//!
//! Every struct deserializes with `#[serde(default)]`, so a TOML table only
//! needs the keys it overrides. `validate` rejects combinations the state
//! machine cannot run with.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::movement::MovementMode;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the file.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but cannot be used together.
    #[error("Config validation error: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

/// Behavioral flavor of a hostile entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    /// Idles, patrols, chases and gives up past the return distance
    #[default]
    Normal,
    /// Starts chasing immediately and never gives up
    Follow,
    /// Dormant until approached; summons and rushes
    Boss,
}

impl EnemyKind {
    /// Returns whether this kind ever takes the Return transition.
    #[must_use]
    pub const fn gives_up(self) -> bool {
        matches!(self, Self::Normal)
    }
}

/// Tuning values for an ordinary hostile entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyParams {
    /// Behavioral flavor
    pub kind: EnemyKind,
    /// Preferred movement backend
    pub movement: MovementMode,
    /// Travel speed (units/second)
    pub move_speed: f32,
    /// Detection range
    pub find_distance: f32,
    /// Attack range
    pub attack_distance: f32,
    /// Distance at which a chase is abandoned
    pub return_distance: f32,
    /// Seconds between attacks
    pub attack_cool_time: f32,
    /// Damage per attack
    pub attack_damage: i32,
    /// Maximum health
    pub max_health: u32,
    /// Stun window after a hit (seconds)
    pub damaged_time: f32,
    /// Knockback duration (seconds, shorter than the stun)
    pub knockback_time: f32,
    /// Delay between death and disappearance (seconds)
    pub death_time: f32,
    /// Idle time before patrolling (seconds)
    pub idle_time: f32,
    /// Arrival tolerance for waypoints and home
    pub arrive_tolerance: f32,
    /// Pickups dropped on death
    pub reward_count: u32,
}

impl Default for EnemyParams {
    fn default() -> Self {
        Self {
            kind: EnemyKind::Normal,
            movement: MovementMode::DirectController,
            move_speed: 3.3,
            find_distance: 7.0,
            attack_distance: 2.5,
            return_distance: 10.0,
            attack_cool_time: 1.0,
            attack_damage: 10,
            max_health: 100,
            damaged_time: 0.5,
            knockback_time: 0.2,
            death_time: 2.0,
            idle_time: 1.0,
            arrive_tolerance: 0.2,
            reward_count: 10,
        }
    }
}

impl EnemyParams {
    /// Defaults for a pursuer that never gives up.
    #[must_use]
    pub fn follow() -> Self {
        Self {
            kind: EnemyKind::Follow,
            ..Self::default()
        }
    }

    /// Sets the kind.
    #[must_use]
    pub fn with_kind(mut self, kind: EnemyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the preferred movement backend.
    #[must_use]
    pub fn with_movement(mut self, movement: MovementMode) -> Self {
        self.movement = movement;
        self
    }

    /// Checks values the state machine depends on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_health == 0 {
            return Err(invalid("max_health must be at least 1"));
        }
        if self.move_speed < 0.0 {
            return Err(invalid("move_speed must not be negative"));
        }
        if self.attack_distance >= self.find_distance {
            return Err(invalid(format!(
                "attack_distance ({}) must be below find_distance ({})",
                self.attack_distance, self.find_distance
            )));
        }
        if self.find_distance > self.return_distance {
            return Err(invalid(format!(
                "find_distance ({}) must not exceed return_distance ({})",
                self.find_distance, self.return_distance
            )));
        }
        if self.knockback_time >= self.damaged_time {
            return Err(invalid(format!(
                "knockback_time ({}) must be shorter than damaged_time ({})",
                self.knockback_time, self.damaged_time
            )));
        }
        if self.attack_cool_time <= 0.0 {
            return Err(invalid("attack_cool_time must be positive"));
        }
        if self.arrive_tolerance <= 0.0 {
            return Err(invalid("arrive_tolerance must be positive"));
        }
        if self.death_time < 0.0 || self.idle_time < 0.0 {
            return Err(invalid("death_time and idle_time must not be negative"));
        }
        Ok(())
    }
}

/// Tuning values for the boss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossParams {
    /// Preferred movement backend
    pub movement: MovementMode,
    /// Maximum health
    pub max_health: u32,
    /// Incoming damage is divided by this
    pub defense: u32,
    /// Range that wakes the boss
    pub activate_range: f32,
    /// Wake-up duration (seconds)
    pub activation_time: f32,
    /// Chase speed
    pub walking_speed: f32,
    /// Attack range
    pub attack_range: f32,
    /// Seconds between attacks
    pub attack_delay: f32,
    /// Damage per ordinary attack
    pub attack_damage: i32,
    /// Minions per summon
    pub summon_count: u32,
    /// Seconds of Trace/Attack/Damaged between summons
    pub summon_rate: f32,
    /// Summon duration (seconds)
    pub summon_time: f32,
    /// Rush speed
    pub rush_speed: f32,
    /// Distance to the rush point that ends the rush
    pub rush_range: f32,
    /// Damage dealt by the rush strike
    pub rush_damage: i32,
    /// Pause after the rush strike (seconds)
    pub rush_recovery: f32,
    /// Stun window after a hit (seconds)
    pub damaged_time: f32,
    /// Knockback duration (seconds)
    pub knockback_time: f32,
    /// Delay between death and disappearance (seconds)
    pub disappear_time: f32,
    /// Pickups dropped on death
    pub reward_count: u32,
}

impl Default for BossParams {
    fn default() -> Self {
        Self {
            movement: MovementMode::PathfindingAgent,
            max_health: 100,
            defense: 10,
            activate_range: 10.0,
            activation_time: 1.0,
            walking_speed: 3.0,
            attack_range: 10.0,
            attack_delay: 3.0,
            attack_damage: 10,
            summon_count: 3,
            summon_rate: 5.0,
            summon_time: 1.0,
            rush_speed: 10.0,
            rush_range: 0.5,
            rush_damage: 20,
            rush_recovery: 1.0,
            damaged_time: 0.5,
            knockback_time: 0.2,
            disappear_time: 5.0,
            reward_count: 10,
        }
    }
}

impl BossParams {
    /// Shared parameters used by the parts of the machine bosses and
    /// ordinary entities have in common.
    #[must_use]
    pub fn base(&self) -> EnemyParams {
        EnemyParams {
            kind: EnemyKind::Boss,
            movement: self.movement,
            move_speed: self.walking_speed,
            find_distance: self.activate_range,
            attack_distance: self.attack_range,
            return_distance: f32::INFINITY,
            attack_cool_time: self.attack_delay,
            attack_damage: self.attack_damage,
            max_health: self.max_health,
            damaged_time: self.damaged_time,
            knockback_time: self.knockback_time,
            death_time: self.disappear_time,
            idle_time: 0.0,
            arrive_tolerance: self.rush_range,
            reward_count: self.reward_count,
        }
    }

    /// Checks values the boss machine depends on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_health == 0 {
            return Err(invalid("boss max_health must be at least 1"));
        }
        if self.defense == 0 {
            return Err(invalid("boss defense must be at least 1"));
        }
        if self.summon_rate <= 0.0 || self.attack_delay <= 0.0 {
            return Err(invalid("boss summon_rate and attack_delay must be positive"));
        }
        if self.rush_range <= 0.0 {
            return Err(invalid("boss rush_range must be positive"));
        }
        if self.knockback_time >= self.damaged_time {
            return Err(invalid(format!(
                "boss knockback_time ({}) must be shorter than damaged_time ({})",
                self.knockback_time, self.damaged_time
            )));
        }
        if self.walking_speed < 0.0 || self.rush_speed < 0.0 {
            return Err(invalid("boss speeds must not be negative"));
        }
        Ok(())
    }
}

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Instances built at warm-up
    pub initial_size: usize,
    /// Whether to build more when the queue runs dry
    pub allow_growth: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 10,
            allow_growth: true,
        }
    }
}

impl PoolConfig {
    /// A fixed-size pool.
    #[must_use]
    pub const fn fixed(initial_size: usize) -> Self {
        Self {
            initial_size,
            allow_growth: false,
        }
    }
}

/// Spawner placement and cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    /// Center of the spawn area
    pub anchor: [f32; 3],
    /// Seconds between spawn attempts
    pub spawn_interval: f32,
    /// Half-size of the spawn square
    pub radius: f32,
    /// Height spawned entities are placed at
    pub spawn_height: f32,
    /// Spawn switch
    pub enabled: bool,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            anchor: [0.0, 0.0, 0.0],
            spawn_interval: 2.0,
            radius: 5.0,
            spawn_height: 1.1,
            enabled: true,
        }
    }
}

impl SpawnerConfig {
    /// Checks the cadence and area.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.spawn_interval <= 0.0 {
            return Err(invalid("spawn_interval must be positive"));
        }
        if self.radius < 0.0 {
            return Err(invalid("spawn radius must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enemy_defaults_are_valid() {
        let params = EnemyParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_health, 100);
        assert!((params.move_speed - 3.3).abs() < f32::EPSILON);
        assert!(EnemyParams::follow().validate().is_ok());
    }

    #[test]
    fn test_boss_defaults_are_valid() {
        let boss = BossParams::default();
        assert!(boss.validate().is_ok());
        let base = boss.base();
        assert_eq!(base.kind, EnemyKind::Boss);
        assert_eq!(base.max_health, 100);
        assert!(!base.kind.gives_up());
    }

    #[test]
    fn test_rejects_knockback_longer_than_stun() {
        let params = EnemyParams {
            knockback_time: 0.6,
            ..EnemyParams::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_inverted_ranges() {
        let params = EnemyParams {
            attack_distance: 8.0,
            ..EnemyParams::default()
        };
        assert!(params.validate().is_err());

        let params = EnemyParams {
            return_distance: 5.0,
            ..EnemyParams::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_defense() {
        let boss = BossParams {
            defense: 0,
            ..BossParams::default()
        };
        assert!(boss.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let params: EnemyParams =
            toml::from_str("kind = \"follow\"\nmove_speed = 5.0\nmovement = \"pathfinding_agent\"")
                .expect("valid toml");
        assert_eq!(params.kind, EnemyKind::Follow);
        assert_eq!(params.movement, MovementMode::PathfindingAgent);
        assert!((params.find_distance - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_spawner_validation() {
        assert!(SpawnerConfig::default().validate().is_ok());
        let config = SpawnerConfig {
            spawn_interval: 0.0,
            ..SpawnerConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(!PoolConfig::fixed(3).allow_growth);
    }
}

//! Encounter configuration.
//!
//! One TOML file describes the whole encounter: clock, target motion, named
//! patrol routes, hordes, an optional boss and an optional turret.
//! Every section has defaults, so a missing file runs the stock encounter.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

use skirmish_ai::config::{BossParams, ConfigError, ConfigResult, EnemyParams, PoolConfig, SpawnerConfig};
use skirmish_ai::route::PatrolRoute;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "skirmish.toml";

/// Named patrol route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Name hordes refer to
    pub name: String,
    /// Waypoints in visit order
    pub points: Vec<[f32; 3]>,
}

impl RouteConfig {
    /// Builds the shared route.
    #[must_use]
    pub fn build(&self) -> PatrolRoute {
        PatrolRoute::new(
            self.points
                .iter()
                .copied()
                .map(Vec3::from_array)
                .collect::<Vec<_>>(),
        )
    }
}

/// One pool plus spawner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HordeConfig {
    /// Name used in logs and by the boss minion link
    pub name: String,
    /// Tuning shared by every member
    pub enemy: EnemyParams,
    /// Pool sizing
    pub pool: PoolConfig,
    /// Spawner placement and cadence
    pub spawner: SpawnerConfig,
    /// Route name, if members patrol
    pub route: Option<String>,
}

impl Default for HordeConfig {
    fn default() -> Self {
        Self {
            name: "grunts".to_string(),
            enemy: EnemyParams::default(),
            pool: PoolConfig::default(),
            spawner: SpawnerConfig::default(),
            route: Some("perimeter".to_string()),
        }
    }
}

/// Boss placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossConfig {
    /// Tuning
    pub params: BossParams,
    /// Where the boss waits
    pub position: [f32; 3],
    /// Horde that fulfils summon requests
    pub minions: Option<String>,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            params: BossParams::default(),
            position: [0.0, 1.1, 12.0],
            minions: Some("grunts".to_string()),
        }
    }
}

/// Scripted target motion: a circle around `center`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Orbit center
    pub center: [f32; 3],
    /// Orbit radius
    pub orbit_radius: f32,
    /// Angular speed in radians per second
    pub orbit_speed: f32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 1.1, 0.0],
            orbit_radius: 8.0,
            orbit_speed: 0.4,
        }
    }
}

impl TargetConfig {
    /// Target position at `time` seconds.
    #[must_use]
    pub fn position_at(&self, time: f32) -> Vec3 {
        let angle = time * self.orbit_speed;
        Vec3::from_array(self.center)
            + Vec3::new(angle.cos() * self.orbit_radius, 0.0, angle.sin() * self.orbit_radius)
    }
}

/// Stationary damage producer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurretConfig {
    /// Turret position
    pub position: [f32; 3],
    /// Targeting range
    pub range: f32,
    /// Damage per shot
    pub damage: i32,
    /// Seconds between shots
    pub fire_interval: f32,
    /// Knockback power per shot
    pub knockback: f32,
}

impl Default for TurretConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 1.1, 0.0],
            range: 12.0,
            damage: 25,
            fire_interval: 0.5,
            knockback: 4.0,
        }
    }
}

/// Root of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Clock ===
    /// Ticks per simulated second
    pub tick_rate: u32,
    /// Simulated seconds to run
    pub duration: f32,
    /// Seed for spawn placement (None = random)
    pub seed: Option<u64>,

    // === World ===
    /// Target motion
    pub target: TargetConfig,
    /// Named patrol routes
    pub routes: Vec<RouteConfig>,
    /// Hordes
    pub hordes: Vec<HordeConfig>,
    /// Optional boss
    pub boss: Option<BossConfig>,
    /// Optional turret
    pub turret: Option<TurretConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            duration: 60.0,
            seed: None,
            target: TargetConfig::default(),
            routes: vec![RouteConfig {
                name: "perimeter".to_string(),
                points: vec![
                    [6.0, 1.1, 6.0],
                    [6.0, 1.1, -6.0],
                    [-6.0, 1.1, -6.0],
                    [-6.0, 1.1, 6.0],
                ],
            }],
            hordes: vec![HordeConfig::default()],
            boss: Some(BossConfig::default()),
            turret: Some(TurretConfig::default()),
        }
    }
}

impl SimConfig {
    /// Loads and validates a configuration file.
    /// A missing file yields the defaults.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration as pretty TOML.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Seconds per tick.
    #[must_use]
    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Number of ticks covering `duration`.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        (self.duration * self.tick_rate as f32).ceil().max(0.0) as u64
    }

    /// Route by name.
    #[must_use]
    pub fn route(&self, name: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Horde index by name.
    #[must_use]
    pub fn horde_index(&self, name: &str) -> Option<usize> {
        self.hordes.iter().position(|h| h.name == name)
    }

    /// Checks every section and cross-reference.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.duration <= 0.0 {
            return Err(ConfigError::Invalid("duration must be positive".into()));
        }

        for horde in &self.hordes {
            horde.enemy.validate()?;
            horde.spawner.validate()?;
            if let Some(route) = &horde.route {
                if self.route(route).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "horde '{}' refers to unknown route '{route}'",
                        horde.name
                    )));
                }
            }
        }

        if let Some(boss) = &self.boss {
            boss.params.validate()?;
            if let Some(minions) = &boss.minions {
                if self.horde_index(minions).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "boss minions refer to unknown horde '{minions}'"
                    )));
                }
            }
        }

        if let Some(turret) = &self.turret {
            if turret.fire_interval <= 0.0 || turret.range <= 0.0 {
                return Err(ConfigError::Invalid(
                    "turret fire_interval and range must be positive".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_rate, 60);
        assert_eq!(config.total_ticks(), 3600);
        assert_eq!(config.horde_index("grunts"), Some(0));
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("skirmish.toml");

        let mut config = SimConfig::default();
        config.duration = 12.5;
        config.seed = Some(99);
        config.hordes[0].pool = PoolConfig::fixed(4);
        config.save_to(&config_path).expect("Failed to save config");

        let loaded = SimConfig::load_from(&config_path).expect("Failed to load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = SimConfig::load_from("/nonexistent/path/skirmish.toml").expect("defaults");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(
            &config_path,
            r#"
duration = 5.0

[[hordes]]
name = "runners"
route = "perimeter"

[hordes.enemy]
kind = "follow"
move_speed = 6.0
"#,
        )
        .expect("write");

        let config = SimConfig::load_from(&config_path).expect("load");
        assert!((config.duration - 5.0).abs() < f32::EPSILON);
        assert_eq!(config.hordes.len(), 1);
        assert_eq!(config.hordes[0].name, "runners");
        assert!((config.hordes[0].enemy.move_speed - 6.0).abs() < f32::EPSILON);
        assert_eq!(config.hordes[0].pool, PoolConfig::default());
        assert_eq!(config.routes.len(), 1);
    }

    #[test]
    fn test_unknown_route_is_rejected() {
        let mut config = SimConfig::default();
        config.hordes[0].route = Some("nowhere".into());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_minion_horde_is_rejected() {
        let mut config = SimConfig::default();
        if let Some(boss) = config.boss.as_mut() {
            boss.minions = Some("ghosts".into());
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "tick_rate = \"fast\"").expect("write");
        assert!(matches!(SimConfig::load_from(&config_path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_target_orbit() {
        let target = TargetConfig::default();
        let start = target.position_at(0.0);
        assert!((start - Vec3::new(8.0, 1.1, 0.0)).length() < 1e-5);
    }
}

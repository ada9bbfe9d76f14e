//! Game-wide tuning values.
//!
//! A single [`GameConfig`] is passed explicitly into every recalculation and
//! resolution call. It is loaded from TOML at startup and never mutated by
//! the simulation itself.

use std::fs;
use std::path::Path;

use arpg_common::{ArpgResult, ConfigError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Timing data for animation-driven states.
///
/// A timed state lasts `clip / (base_speed + stat_speed / max_stat_speed)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationTimings {
    /// Attack clip length per combo index (the last entry repeats).
    pub attack_clips: Vec<f32>,
    /// Skill clip length in seconds.
    pub skill_clip: f32,
    /// Block clip length in seconds.
    pub block_clip: f32,
    /// Stun clip length in seconds.
    pub stun_clip: f32,
    /// Base attack animation speed.
    pub base_attack_speed: f32,
    /// Base block animation speed.
    pub base_block_speed: f32,
    /// Base stun animation speed.
    pub base_stun_speed: f32,
    /// Fraction of an attack's duration at which the hit lands (0.0-1.0).
    pub hit_point: f32,
}

impl Default for AnimationTimings {
    fn default() -> Self {
        Self {
            attack_clips: vec![0.8, 0.8, 1.0],
            skill_clip: 1.0,
            block_clip: 0.5,
            stun_clip: 1.0,
            base_attack_speed: 1.0,
            base_block_speed: 1.0,
            base_stun_speed: 1.0,
            hit_point: 0.5,
        }
    }
}

impl AnimationTimings {
    /// Clip length for the given combo index.
    #[must_use]
    pub fn attack_clip(&self, combo_index: u32) -> f32 {
        let idx = (combo_index as usize).min(self.attack_clips.len().saturating_sub(1));
        self.attack_clips.get(idx).copied().unwrap_or(1.0)
    }
}

/// Global tuning constants for stats and combat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // === Progression ===
    /// Experience needed for the first level-ups.
    pub base_experience: i32,
    /// Growth factor of the experience curve.
    pub experience_per_level: i32,
    /// Experience granted per level of a defeated entity.
    pub base_enemy_defeat_experience: i32,
    /// Distribution points granted per level.
    pub level_up_points: i32,
    /// Level cap.
    pub max_level: i32,

    // === Combat caps ===
    /// Damage multiplier on critical hits.
    pub critical_multiplier: f32,
    /// Attack speed cap.
    pub max_attack_speed: i32,
    /// Chance-to-block cap (0.0-1.0).
    pub max_block_chance: f32,
    /// Block speed cap.
    pub max_block_speed: i32,
    /// Stun chance cap (0.0-1.0).
    pub max_stun_chance: f32,
    /// Stun speed cap.
    pub max_stun_speed: i32,

    // === Timing and movement ===
    /// Seconds a defender is protected after taking a hit.
    pub min_hit_interval: f32,
    /// Destinations closer than this are ignored.
    pub min_distance_to_move: f32,
    /// Reach used when no weapon defines one.
    pub base_attack_distance: f32,
    /// Movement speed in units per second.
    pub move_speed: f32,

    /// Animation-derived state durations.
    pub animation: AnimationTimings,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            base_experience: 1973,
            experience_per_level: 179,
            base_enemy_defeat_experience: 679,
            level_up_points: 5,
            max_level: 100,

            critical_multiplier: 1.25,
            max_attack_speed: 1000,
            max_block_chance: 0.75,
            max_block_speed: 1000,
            max_stun_chance: 0.75,
            max_stun_speed: 1000,

            min_hit_interval: 0.15,
            min_distance_to_move: 0.25,
            base_attack_distance: 1.0,
            move_speed: 4.0,

            animation: AnimationTimings::default(),
        }
    }
}

impl GameConfig {
    /// Parses a config from a TOML document. Missing fields take defaults.
    pub fn from_toml_str(contents: &str) -> ArpgResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file, failing on IO, parse or validation errors.
    pub fn load_from<P: AsRef<Path>>(path: P) -> ArpgResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!("Loaded game config from {}", path.display());
        Ok(config)
    }

    /// Loads a config file, falling back to defaults on any error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config {}: {e}", path.display());
                Self::default()
            },
        }
    }

    /// Serializes the config to pretty TOML.
    pub fn to_toml_string(&self) -> ArpgResult<String> {
        Ok(toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?)
    }

    /// Checks that every cap and multiplier is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            }
        }

        if self.max_level < 1 {
            return Err(invalid("max_level", "must be at least 1"));
        }
        if self.base_experience < 1 {
            return Err(invalid("base_experience", "must be positive"));
        }
        if self.experience_per_level < 0 {
            return Err(invalid("experience_per_level", "must not be negative"));
        }
        if self.level_up_points < 0 {
            return Err(invalid("level_up_points", "must not be negative"));
        }
        if self.critical_multiplier < 1.0 {
            return Err(invalid("critical_multiplier", "must be at least 1.0"));
        }
        if self.max_attack_speed < 1 || self.max_block_speed < 1 || self.max_stun_speed < 1 {
            return Err(invalid("max_*_speed", "speed caps must be positive"));
        }
        if !(0.0..=1.0).contains(&self.max_block_chance) {
            return Err(invalid("max_block_chance", "must be within 0.0-1.0"));
        }
        if !(0.0..=1.0).contains(&self.max_stun_chance) {
            return Err(invalid("max_stun_chance", "must be within 0.0-1.0"));
        }
        if self.min_hit_interval < 0.0 || self.min_distance_to_move < 0.0 {
            return Err(invalid("min_*", "intervals and distances must not be negative"));
        }
        if self.animation.attack_clips.is_empty() {
            return Err(invalid("animation.attack_clips", "needs at least one clip"));
        }
        if self.animation.attack_clips.iter().any(|c| *c <= 0.0) {
            return Err(invalid("animation.attack_clips", "clip lengths must be positive"));
        }
        if !(0.0..=1.0).contains(&self.animation.hit_point) {
            return Err(invalid("animation.hit_point", "must be within 0.0-1.0"));
        }
        Ok(())
    }

    /// Attack state length for a combo index at the given attack speed stat.
    #[must_use]
    pub fn attack_duration(&self, combo_index: u32, attack_speed: i32) -> f32 {
        let speed = self.animation.base_attack_speed
            + attack_speed as f32 / self.max_attack_speed as f32;
        self.animation.attack_clip(combo_index) / speed.max(f32::EPSILON)
    }

    /// Skill state length at the given attack speed stat.
    #[must_use]
    pub fn skill_duration(&self, attack_speed: i32) -> f32 {
        let speed = self.animation.base_attack_speed
            + attack_speed as f32 / self.max_attack_speed as f32;
        self.animation.skill_clip / speed.max(f32::EPSILON)
    }

    /// Block state length at the given block speed stat.
    #[must_use]
    pub fn block_duration(&self, block_speed: i32) -> f32 {
        let speed =
            self.animation.base_block_speed + block_speed as f32 / self.max_block_speed as f32;
        self.animation.block_clip / speed.max(f32::EPSILON)
    }

    /// Stun state length at the given stun speed stat.
    #[must_use]
    pub fn stun_duration(&self, stun_speed: i32) -> f32 {
        let speed =
            self.animation.base_stun_speed + stun_speed as f32 / self.max_stun_speed as f32;
        self.animation.stun_clip / speed.max(f32::EPSILON)
    }
}

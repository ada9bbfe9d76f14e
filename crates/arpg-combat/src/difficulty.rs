//! Dynamic difficulty.
//!
//! Difficulty is a set of multipliers on enemy attributes. Scaled attributes
//! are always derived from the entity's unscaled base, so repeated
//! adjustments never compound through already-scaled values.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::formulas::Attributes;

/// Multipliers applied to difficulty-scaled entities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyMultipliers {
    /// Strength multiplier.
    pub strength: f32,
    /// Dexterity multiplier.
    pub dexterity: f32,
    /// Attack speed multiplier.
    pub speed: f32,
}

impl Default for DifficultyMultipliers {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl DifficultyMultipliers {
    /// No scaling.
    pub const IDENTITY: Self = Self {
        strength: 1.0,
        dexterity: 1.0,
        speed: 1.0,
    };

    /// Scales strength and dexterity of `base`, never below 1.
    #[must_use]
    pub fn scale(&self, base: Attributes) -> Attributes {
        Attributes {
            strength: scale_attribute(base.strength, self.strength),
            dexterity: scale_attribute(base.dexterity, self.dexterity),
            ..base
        }
    }
}

fn scale_attribute(base: i32, multiplier: f32) -> i32 {
    ((base as f32 * multiplier).round() as i32).max(1)
}

/// Outcome of [`DifficultyTracker::adjust`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifficultyChange {
    /// The player is struggling; enemies got weaker.
    Decreased,
    /// The player is dominating; enemies got stronger.
    Increased,
    /// No threshold was crossed.
    Unchanged,
}

/// Tracks player performance and adjusts the multipliers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyTracker {
    /// Current multipliers.
    pub multipliers: DifficultyMultipliers,
    /// Player deaths since the last adjustment.
    pub player_deaths: u32,
    /// Enemies defeated since the last adjustment.
    pub enemies_defeated: u32,
}

impl DifficultyTracker {
    /// Deaths that trigger a decrease.
    pub const DEATHS_TO_DECREASE: u32 = 3;
    /// Defeats (without deaths) that trigger an increase.
    pub const DEFEATS_TO_INCREASE: u32 = 10;

    /// Create a tracker at identity difficulty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a player death and adjusts.
    pub fn record_player_death(&mut self) -> DifficultyChange {
        self.player_deaths += 1;
        self.adjust()
    }

    /// Records an enemy defeated by a player and adjusts.
    pub fn record_enemy_defeated(&mut self) -> DifficultyChange {
        self.enemies_defeated += 1;
        self.adjust()
    }

    /// Applies the adjustment rules to the current counters.
    pub fn adjust(&mut self) -> DifficultyChange {
        if self.player_deaths >= Self::DEATHS_TO_DECREASE {
            self.multipliers.dexterity *= 0.9;
            self.multipliers.strength *= 0.8;
            self.multipliers.speed *= 0.9;
            self.reset_counters();
            info!(
                "Difficulty decreased: dexterity={:.3}, strength={:.3}, speed={:.3}",
                self.multipliers.dexterity, self.multipliers.strength, self.multipliers.speed
            );
            return DifficultyChange::Decreased;
        }

        if self.enemies_defeated >= Self::DEFEATS_TO_INCREASE
            && self.enemies_defeated % Self::DEFEATS_TO_INCREASE == 0
            && self.player_deaths == 0
        {
            self.multipliers.dexterity *= 1.1;
            self.multipliers.strength *= 1.2;
            self.multipliers.speed *= 1.1;
            self.reset_counters();
            info!(
                "Difficulty increased: dexterity={:.3}, strength={:.3}, speed={:.3}",
                self.multipliers.dexterity, self.multipliers.strength, self.multipliers.speed
            );
            return DifficultyChange::Increased;
        }

        DifficultyChange::Unchanged
    }

    fn reset_counters(&mut self) {
        self.player_deaths = 0;
        self.enemies_defeated = 0;
    }
}

//! Per-entity statistics.
//!
//! [`StatsEngine`] owns base attributes, level, experience, current health
//! and mana, and the derived-stat snapshot. Every mutation of attributes or
//! modifiers recalculates synchronously; nothing is deferred to a later
//! frame.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use arpg_common::EntityId;

use crate::combat::CombatResolver;
use crate::combo::ComboProfile;
use crate::config::GameConfig;
use crate::difficulty::DifficultyMultipliers;
use crate::events::{CombatEvent, Notifier};
use crate::formulas::{next_level_experience, Attributes, DerivedStats, FormulaInputs, MinMax};
use crate::modifiers::ModifierSnapshot;
use crate::regen::{RegenSchedule, RegenTick};
use crate::rng::CombatRng;
use crate::stat_id::StatId;

/// Behaviour switches of a stats engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatFlags {
    /// Experience can be earned.
    pub can_gain_experience: bool,
    /// Health reads always return the maximum.
    pub infinite_health: bool,
    /// Mana reads always return the maximum.
    pub infinite_mana: bool,
    /// Stun rolls are skipped.
    pub immune_to_stun: bool,
    /// Ignore weapon combo limits.
    pub always_use_base_combo: bool,
}

impl Default for StatFlags {
    fn default() -> Self {
        Self {
            can_gain_experience: true,
            infinite_health: false,
            infinite_mana: false,
            immune_to_stun: false,
            always_use_base_combo: false,
        }
    }
}

/// Attributes, progression and resources of one entity.
#[derive(Debug, Clone)]
pub struct StatsEngine {
    entity: EntityId,
    base: Attributes,
    level: i32,
    experience: i32,
    next_level_experience: i32,
    available_points: i32,
    health: i32,
    mana: i32,
    currency: i64,
    derived: DerivedStats,
    snapshot: ModifierSnapshot,
    difficulty: DifficultyMultipliers,
    difficulty_scaled: bool,
    base_combo: ComboProfile,
    /// Behaviour switches.
    pub flags: StatFlags,
    defeated: AHashSet<EntityId>,
    regen: RegenSchedule,
    notifier: Notifier,
}

impl StatsEngine {
    /// Creates an engine with full health and mana.
    #[must_use]
    pub fn new(entity: EntityId, base: Attributes, level: i32, config: &GameConfig) -> Self {
        let level = level.clamp(1, config.max_level.max(1));
        let mut engine = Self {
            entity,
            base,
            level,
            experience: 0,
            next_level_experience: next_level_experience(level, config),
            available_points: 0,
            health: 0,
            mana: 0,
            currency: 0,
            derived: DerivedStats::default(),
            snapshot: ModifierSnapshot::default(),
            difficulty: DifficultyMultipliers::IDENTITY,
            difficulty_scaled: false,
            base_combo: ComboProfile::default(),
            flags: StatFlags::default(),
            defeated: AHashSet::new(),
            regen: RegenSchedule::new(),
            notifier: Notifier::detached(),
        };
        engine.recalculate(config);
        engine.revitalize();
        engine
    }

    /// Level 1 with default attributes.
    #[must_use]
    pub fn with_defaults(entity: EntityId, config: &GameConfig) -> Self {
        Self::new(entity, Attributes::default(), 1, config)
    }

    /// Routes notifications into a bus.
    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.notifier = notifier;
    }

    /// Sets the combo limits used when unarmed.
    pub fn set_base_combo(&mut self, combo: ComboProfile, config: &GameConfig) {
        self.base_combo = combo;
        self.recalculate(config);
    }

    /// Marks the entity as affected by dynamic difficulty.
    pub fn set_difficulty_scaled(&mut self, scaled: bool, config: &GameConfig) {
        self.difficulty_scaled = scaled;
        self.recalculate(config);
    }

    /// Updates difficulty multipliers. Only scaled entities recalculate.
    pub fn set_difficulty(&mut self, multipliers: DifficultyMultipliers, config: &GameConfig) {
        self.difficulty = multipliers;
        if self.difficulty_scaled {
            self.recalculate(config);
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Owning entity.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Unscaled base attributes.
    #[must_use]
    pub fn base_attributes(&self) -> Attributes {
        self.base
    }

    /// Final attributes after difficulty and modifiers.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        self.derived.attributes
    }

    /// Current level.
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Experience toward the next level.
    #[must_use]
    pub fn experience(&self) -> i32 {
        self.experience
    }

    /// Experience required for the next level.
    #[must_use]
    pub fn next_level_experience(&self) -> i32 {
        self.next_level_experience
    }

    /// Progress toward the next level (0.0-1.0).
    #[must_use]
    pub fn experience_percent(&self) -> f32 {
        if self.next_level_experience <= 0 {
            return 0.0;
        }
        self.experience as f32 / self.next_level_experience as f32
    }

    /// Unspent attribute points.
    #[must_use]
    pub fn available_points(&self) -> i32 {
        self.available_points
    }

    /// Current health.
    #[must_use]
    pub fn health(&self) -> i32 {
        if self.flags.infinite_health {
            self.derived.max_health
        } else {
            self.health
        }
    }

    /// Current mana.
    #[must_use]
    pub fn mana(&self) -> i32 {
        if self.flags.infinite_mana {
            self.derived.max_mana
        } else {
            self.mana
        }
    }

    /// Maximum health.
    #[must_use]
    pub fn max_health(&self) -> i32 {
        self.derived.max_health
    }

    /// Maximum mana.
    #[must_use]
    pub fn max_mana(&self) -> i32 {
        self.derived.max_mana
    }

    /// Health in a 0.0-1.0 range.
    #[must_use]
    pub fn health_percent(&self) -> f32 {
        self.health() as f32 / self.derived.max_health.max(1) as f32
    }

    /// Currency balance.
    #[must_use]
    pub fn currency(&self) -> i64 {
        self.currency
    }

    /// Derived stats from the last recalculation.
    #[must_use]
    pub fn derived(&self) -> &DerivedStats {
        &self.derived
    }

    /// Modifier snapshot used by the last recalculation.
    #[must_use]
    pub fn snapshot(&self) -> &ModifierSnapshot {
        &self.snapshot
    }

    /// Whether difficulty multipliers apply.
    #[must_use]
    pub fn is_difficulty_scaled(&self) -> bool {
        self.difficulty_scaled
    }

    /// Whether this entity already granted credit for `other`.
    #[must_use]
    pub fn has_defeated(&self, other: EntityId) -> bool {
        self.defeated.contains(&other)
    }

    // ========================================================================
    // Recalculation
    // ========================================================================

    /// Recomputes every derived stat and clamps health and mana down.
    pub fn recalculate(&mut self, config: &GameConfig) {
        let (attributes, speed_multiplier) = if self.difficulty_scaled {
            (self.difficulty.scale(self.base), self.difficulty.speed)
        } else {
            (self.base, 1.0)
        };

        let inputs = FormulaInputs {
            level: self.level,
            attributes,
            snapshot: &self.snapshot,
            base_combo: self.base_combo,
            always_use_base_combo: self.flags.always_use_base_combo,
            speed_multiplier,
        };
        self.derived = DerivedStats::compute(&inputs, config);

        let (old_health, old_mana) = (self.health, self.mana);
        self.health = self.health.clamp(0, self.derived.max_health);
        self.mana = self.mana.clamp(0, self.derived.max_mana);

        self.notifier.publish(CombatEvent::StatsRecalculated {
            entity: self.entity,
        });
        if self.health != old_health {
            self.publish_health();
        }
        if self.mana != old_mana {
            self.publish_mana();
        }
    }

    /// Replaces the modifier snapshot and recalculates.
    pub fn set_modifiers(&mut self, snapshot: ModifierSnapshot, config: &GameConfig) {
        self.snapshot = snapshot;
        self.recalculate(config);
    }

    // ========================================================================
    // Resources
    // ========================================================================

    /// Sets health, clamped to `[0, max]`.
    pub fn set_health(&mut self, value: i32) {
        let clamped = value.clamp(0, self.derived.max_health);
        if clamped != self.health {
            self.health = clamped;
            self.publish_health();
        }
    }

    /// Sets mana, clamped to `[0, max]`.
    pub fn set_mana(&mut self, value: i32) {
        let clamped = value.clamp(0, self.derived.max_mana);
        if clamped != self.mana {
            self.mana = clamped;
            self.publish_mana();
        }
    }

    /// Restores health and mana to their maximum.
    pub fn revitalize(&mut self) {
        self.set_health(self.derived.max_health);
        self.set_mana(self.derived.max_mana);
    }

    fn publish_health(&self) {
        self.notifier.publish(CombatEvent::HealthChanged {
            entity: self.entity,
            health: self.health(),
            max_health: self.derived.max_health,
        });
    }

    fn publish_mana(&self) {
        self.notifier.publish(CombatEvent::ManaChanged {
            entity: self.entity,
            mana: self.mana(),
            max_mana: self.derived.max_mana,
        });
    }

    // ========================================================================
    // Progression
    // ========================================================================

    /// Adds experience and levels up as often as it covers. Returns levels gained.
    ///
    /// Non-positive amounts, disabled gain and the level cap are no-ops.
    pub fn add_experience(&mut self, amount: i32, config: &GameConfig) -> i32 {
        if !self.flags.can_gain_experience || amount <= 0 || self.level >= config.max_level {
            return 0;
        }

        let reward = 1.0 + self.derived.additive.get(StatId::ExperienceRewardPercent) / 100.0;
        let gained = (amount as f32 * reward) as i32;
        if gained <= 0 {
            return 0;
        }

        self.experience = self.experience.saturating_add(gained);
        let levels = if self.experience >= self.next_level_experience {
            self.level_up(config)
        } else {
            0
        };

        self.notifier.publish(CombatEvent::ExperienceChanged {
            entity: self.entity,
            experience: self.experience,
            next_level_experience: self.next_level_experience,
        });
        levels
    }

    /// Consumes experience into levels, then recalculates and revitalizes.
    pub fn level_up(&mut self, config: &GameConfig) -> i32 {
        let mut gained = 0;
        while self.experience >= self.next_level_experience && self.level < config.max_level {
            self.experience -= self.next_level_experience;
            self.level += 1;
            self.available_points += config.level_up_points;
            self.next_level_experience = next_level_experience(self.level, config);
            gained += 1;
        }
        if self.level >= config.max_level {
            self.experience = 0;
        }
        if gained == 0 {
            return 0;
        }

        self.recalculate(config);
        self.revitalize();

        info!(
            "{} reached level {} ({} points available)",
            self.entity, self.level, self.available_points
        );
        self.notifier.publish(CombatEvent::LevelUp {
            entity: self.entity,
            level: self.level,
            available_points: self.available_points,
        });
        gained
    }

    /// Sets experience to zero.
    pub fn reset_experience(&mut self) {
        self.experience = 0;
    }

    /// Adds attribute deltas and spends the points.
    ///
    /// Available points are not validated and may go negative.
    pub fn bulk_distribute(
        &mut self,
        strength: i32,
        dexterity: i32,
        vitality: i32,
        energy: i32,
        config: &GameConfig,
    ) {
        self.base.strength += strength;
        self.base.dexterity += dexterity;
        self.base.vitality += vitality;
        self.base.energy += energy;
        self.available_points -= strength + dexterity + vitality + energy;
        self.recalculate(config);
    }

    /// Overwrites base attributes and points.
    pub fn bulk_update(&mut self, attributes: Attributes, available_points: i32, config: &GameConfig) {
        self.base = attributes;
        self.available_points = available_points;
        self.recalculate(config);
    }

    /// Grants defeat experience once per defeated entity.
    pub fn on_defeat_entity(&mut self, defeated: EntityId, defeated_level: i32, config: &GameConfig) -> bool {
        if !self.defeated.insert(defeated) {
            return false;
        }
        let reward = config
            .base_enemy_defeat_experience
            .saturating_mul(defeated_level.max(0));
        debug!("{} defeated {} for {} experience", self.entity, defeated, reward);
        self.add_experience(reward, config);
        true
    }

    // ========================================================================
    // Over time
    // ========================================================================

    /// Advances regeneration, experience and currency accrual.
    pub fn tick_regen(&mut self, dt: f32, config: &GameConfig) -> RegenTick {
        let tick = self
            .regen
            .tick(dt, &self.derived.additive, self.next_level_experience);

        if tick.health != 0 {
            self.set_health(self.health.saturating_add(tick.health));
        }
        if tick.mana != 0 {
            self.set_mana(self.mana.saturating_add(tick.mana));
        }
        if tick.experience > 0 {
            self.add_experience(tick.experience, config);
        }
        if tick.currency != 0 {
            self.currency += i64::from(tick.currency);
            self.notifier.publish(CombatEvent::CurrencyGained {
                entity: self.entity,
                amount: i64::from(tick.currency),
                total: self.currency,
            });
        }
        tick
    }

    // ========================================================================
    // Rolls
    // ========================================================================

    /// Physical damage roll with the critical multiplier.
    pub fn damage_roll(&self, rng: &mut dyn CombatRng, config: &GameConfig) -> (i32, bool) {
        self.roll(self.derived.damage, rng, config)
    }

    /// Magic damage roll with the critical multiplier.
    pub fn magic_damage_roll(&self, rng: &mut dyn CombatRng, config: &GameConfig) -> (i32, bool) {
        self.roll(self.derived.magic_damage, rng, config)
    }

    fn roll(&self, range: MinMax, rng: &mut dyn CombatRng, config: &GameConfig) -> (i32, bool) {
        let (multiplier, critical) =
            CombatResolver::critical_multiplier(self.derived.critical_chance, rng, config);
        let base = rng.range_inclusive(range.min, range.max);
        ((base as f32 * multiplier) as i32, critical)
    }
}

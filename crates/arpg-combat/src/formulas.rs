//! Stat formulas.
//!
//! Pure functions from attributes plus modifier totals to derived combat
//! stats. All attribute arithmetic uses integer (truncating) division;
//! percentages and multipliers are applied last and truncated.

use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::combo::ComboProfile;
use crate::config::GameConfig;
use crate::modifiers::ModifierSnapshot;
use crate::stat_id::{Element, StatId, StatTable};

// ============================================================================
// Value types
// ============================================================================

/// Inclusive integer range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinMax {
    /// Lower bound.
    pub min: i32,
    /// Upper bound.
    pub max: i32,
}

impl MinMax {
    /// Empty range.
    pub const ZERO: Self = Self::new(0, 0);

    /// Create a range.
    #[must_use]
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Scales both bounds, truncating.
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(
            (self.min as f32 * factor) as i32,
            (self.max as f32 * factor) as i32,
        )
    }
}

impl Add for MinMax {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.min + rhs.min, self.max + rhs.max)
    }
}

/// The four primary attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attributes {
    /// Strength: physical damage and stun chance.
    pub strength: i32,
    /// Dexterity: attack speed, defense, block and critical chance.
    pub dexterity: i32,
    /// Vitality: maximum health.
    pub vitality: i32,
    /// Energy: magic damage and maximum mana.
    pub energy: i32,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            strength: 20,
            dexterity: 15,
            vitality: 15,
            energy: 10,
        }
    }
}

impl Attributes {
    /// Create attributes.
    #[must_use]
    pub const fn new(strength: i32, dexterity: i32, vitality: i32, energy: i32) -> Self {
        Self {
            strength,
            dexterity,
            vitality,
            energy,
        }
    }

    /// Adds the attribute entries of a stat table, truncating.
    #[must_use]
    pub fn with_additive(self, additive: &StatTable) -> Self {
        Self {
            strength: self.strength + additive.get_int(StatId::Strength),
            dexterity: self.dexterity + additive.get_int(StatId::Dexterity),
            vitality: self.vitality + additive.get_int(StatId::Vitality),
            energy: self.energy + additive.get_int(StatId::Energy),
        }
    }

    /// Sum of all four attributes.
    #[must_use]
    pub const fn total(&self) -> i32 {
        self.strength + self.dexterity + self.vitality + self.energy
    }
}

/// Resistance per element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resistances([i32; 9]);

impl Resistances {
    /// Reads resistances out of an aggregate.
    #[must_use]
    pub fn from_table(table: &StatTable) -> Self {
        let mut values = [0; 9];
        for (slot, element) in values.iter_mut().zip(Element::ALL) {
            *slot = table.get_int(element.resistance_stat());
        }
        Self(values)
    }

    /// Resistance against an element.
    #[must_use]
    pub fn get(&self, element: Element) -> i32 {
        Element::ALL
            .iter()
            .position(|e| *e == element)
            .map_or(0, |i| self.0[i])
    }
}

// ============================================================================
// Individual formulas
// ============================================================================

/// Physical damage range before the damage percentage.
#[must_use]
pub fn damage_range(strength: i32, items: MinMax, additional: i32) -> MinMax {
    MinMax::new(
        strength / 8 + items.min + additional,
        strength / 4 + items.max + additional,
    )
}

/// Magic damage range before the magic damage percentage.
#[must_use]
pub fn magic_damage_range(energy: i32, additional: i32) -> MinMax {
    MinMax::new(energy / 4 + additional, energy / 2 + additional)
}

/// Maximum health.
#[must_use]
pub fn max_health(level: i32, vitality: i32, additional: i32, multiplier: f32) -> i32 {
    ((level * 10 + vitality * 2 + additional) as f32 * multiplier) as i32
}

/// Maximum mana.
#[must_use]
pub fn max_mana(level: i32, energy: i32, additional: i32, multiplier: f32) -> i32 {
    ((level * 5 + energy * 2 + additional) as f32 * multiplier) as i32
}

/// Attack speed, capped.
#[must_use]
pub fn attack_speed(dexterity: i32, items: i32, additional: i32, cap: i32) -> i32 {
    ((dexterity + items) / 10 + additional).min(cap)
}

/// Critical chance (0.0-1.0).
#[must_use]
pub fn critical_chance(dexterity: i32) -> f32 {
    (dexterity / 10 + 20) as f32 / 100.0
}

/// Defense.
#[must_use]
pub fn defense(dexterity: i32, items: i32, additional: i32, multiplier: f32) -> i32 {
    ((dexterity / 4 + items + additional) as f32 * multiplier) as i32
}

/// Chance to block; zero when `shield_chance` is zero.
#[must_use]
pub fn chance_to_block(dexterity: i32, level: i32, shield_chance: f32, cap: f32) -> f32 {
    ((dexterity / 20 + 5 + level) as f32 / 100.0 * shield_chance).min(cap)
}

/// Block animation speed stat, capped.
#[must_use]
pub fn block_speed(dexterity: i32, level: i32, cap: i32) -> i32 {
    (dexterity / 5 + 100 + level * 10).min(cap)
}

/// Stun chance (0.0-1.0), capped.
#[must_use]
pub fn stun_chance(strength: i32, level: i32, cap: f32) -> f32 {
    ((strength / 10 + level) as f32 / 100.0).min(cap)
}

/// Stun animation speed stat, capped.
#[must_use]
pub fn stun_speed(dexterity: i32, level: i32, cap: i32) -> i32 {
    (dexterity / 2 + 100 + level * 20).min(cap)
}

/// Experience required to advance from `level` to the next one.
///
/// Flat for the first two levels, quadratic afterwards.
#[must_use]
pub fn next_level_experience(level: i32, config: &GameConfig) -> i32 {
    if level <= 2 {
        return config.base_experience;
    }
    let lvl = i64::from(level);
    let total = i64::from(config.base_experience)
        + i64::from(config.experience_per_level) * (lvl - 1) * (lvl - 2);
    total.min(i64::from(i32::MAX)) as i32
}

// ============================================================================
// Derived snapshot
// ============================================================================

/// Everything a recalculation reads.
#[derive(Debug, Clone, Copy)]
pub struct FormulaInputs<'a> {
    /// Current level.
    pub level: i32,
    /// Attributes after difficulty scaling, before modifiers.
    pub attributes: Attributes,
    /// Aggregated equipment and buff contributions.
    pub snapshot: &'a ModifierSnapshot,
    /// Combo limits used when unarmed.
    pub base_combo: ComboProfile,
    /// Ignore the weapon's combo limits.
    pub always_use_base_combo: bool,
    /// Difficulty scale on attack speed.
    pub speed_multiplier: f32,
}

/// Output of a recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    /// Final attributes including modifiers.
    pub attributes: Attributes,
    /// Physical damage range.
    pub damage: MinMax,
    /// Magic damage range.
    pub magic_damage: MinMax,
    /// Defense.
    pub defense: i32,
    /// Attack speed stat.
    pub attack_speed: i32,
    /// Critical chance (0.0-1.0).
    pub critical_chance: f32,
    /// Chance to block (0.0-1.0).
    pub chance_to_block: f32,
    /// Block speed stat.
    pub block_speed: i32,
    /// Stun chance (0.0-1.0).
    pub stun_chance: f32,
    /// Stun speed stat.
    pub stun_speed: i32,
    /// Maximum health.
    pub max_health: i32,
    /// Maximum mana.
    pub max_mana: i32,
    /// Resistance to all magic damage.
    pub magic_resistance: i32,
    /// Elemental resistances.
    pub resistances: Resistances,
    /// Combo limits in effect.
    pub combo: ComboProfile,
    /// Additive totals the stats were computed from.
    pub additive: StatTable,
}

impl Default for DerivedStats {
    fn default() -> Self {
        Self {
            attributes: Attributes::default(),
            damage: MinMax::ZERO,
            magic_damage: MinMax::ZERO,
            defense: 0,
            attack_speed: 0,
            critical_chance: 0.0,
            chance_to_block: 0.0,
            block_speed: 0,
            stun_chance: 0.0,
            stun_speed: 0,
            max_health: 0,
            max_mana: 0,
            magic_resistance: 0,
            resistances: Resistances::default(),
            combo: ComboProfile::default(),
            additive: StatTable::new(),
        }
    }
}

impl DerivedStats {
    /// Computes every derived stat. Identical inputs give identical output.
    #[must_use]
    pub fn compute(inputs: &FormulaInputs<'_>, config: &GameConfig) -> Self {
        let add = &inputs.snapshot.additive;
        let items = &inputs.snapshot.items;
        let attrs = inputs.attributes.with_additive(add);
        let level = inputs.level;

        let damage = damage_range(attrs.strength, items.damage, add.get_int(StatId::Damage))
            .scaled(add.multiplier(StatId::Damage));
        let magic_damage = magic_damage_range(attrs.energy, add.get_int(StatId::MagicDamage))
            .scaled(add.multiplier(StatId::MagicDamage));

        let raw_speed = attack_speed(
            attrs.dexterity,
            items.attack_speed,
            add.get_int(StatId::AttackSpeed),
            config.max_attack_speed,
        );
        let speed_scale = inputs.speed_multiplier * add.multiplier(StatId::AttackSpeed);
        let scaled_speed = ((raw_speed as f32 * speed_scale) as i32).min(config.max_attack_speed);

        let combo = if inputs.always_use_base_combo {
            inputs.base_combo
        } else {
            inputs.snapshot.weapon_combo.unwrap_or(inputs.base_combo)
        };

        Self {
            attributes: attrs,
            damage,
            magic_damage,
            defense: defense(
                attrs.dexterity,
                items.defense,
                add.get_int(StatId::Defense),
                add.multiplier(StatId::Defense),
            ),
            attack_speed: scaled_speed,
            critical_chance: critical_chance(attrs.dexterity),
            chance_to_block: chance_to_block(
                attrs.dexterity,
                level,
                items.chance_to_block,
                config.max_block_chance,
            ),
            block_speed: block_speed(attrs.dexterity, level, config.max_block_speed),
            stun_chance: stun_chance(attrs.strength, level, config.max_stun_chance),
            stun_speed: stun_speed(attrs.dexterity, level, config.max_stun_speed),
            max_health: max_health(
                level,
                attrs.vitality,
                add.get_int(StatId::Health),
                add.multiplier(StatId::Health),
            )
            .max(1),
            max_mana: max_mana(
                level,
                attrs.energy,
                add.get_int(StatId::Mana),
                add.multiplier(StatId::Mana),
            )
            .max(0),
            magic_resistance: add.get_int(StatId::MagicResistance),
            resistances: Resistances::from_table(add),
            combo,
            additive: *add,
        }
    }

    /// Current value of any stat, for threshold checks.
    #[must_use]
    pub fn stat(&self, stat: StatId) -> f32 {
        match stat {
            StatId::Strength => self.attributes.strength as f32,
            StatId::Dexterity => self.attributes.dexterity as f32,
            StatId::Vitality => self.attributes.vitality as f32,
            StatId::Energy => self.attributes.energy as f32,
            StatId::Defense => self.defense as f32,
            StatId::AttackSpeed => self.attack_speed as f32,
            StatId::Health => self.max_health as f32,
            StatId::Mana => self.max_mana as f32,
            StatId::MagicResistance => self.magic_resistance as f32,
            StatId::FireResistance => self.resistances.get(Element::Fire) as f32,
            StatId::WaterResistance => self.resistances.get(Element::Water) as f32,
            StatId::IceResistance => self.resistances.get(Element::Ice) as f32,
            StatId::EarthResistance => self.resistances.get(Element::Earth) as f32,
            StatId::AirResistance => self.resistances.get(Element::Air) as f32,
            StatId::LightningResistance => self.resistances.get(Element::Lightning) as f32,
            StatId::ShadowResistance => self.resistances.get(Element::Shadow) as f32,
            StatId::LightResistance => self.resistances.get(Element::Light) as f32,
            StatId::ArcaneResistance => self.resistances.get(Element::Arcane) as f32,
            StatId::Damage
            | StatId::MagicDamage
            | StatId::HealthPercent
            | StatId::ManaPercent
            | StatId::DamagePercent
            | StatId::MagicDamagePercent
            | StatId::DefensePercent
            | StatId::AttackSpeedPercent
            | StatId::HealthRegenPerSecond
            | StatId::HealthRegenPer5Seconds
            | StatId::HealthRegenPer30Seconds
            | StatId::ManaRegenPerSecond
            | StatId::ManaRegenPer5Seconds
            | StatId::ManaRegenPer30Seconds
            | StatId::ExperiencePerSecondPercent
            | StatId::ExperiencePer5SecondsPercent
            | StatId::ExperiencePer30SecondsPercent
            | StatId::ExperienceRewardPercent
            | StatId::CurrencyPerMinute => self.additive.get(stat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::ItemTotals;

    fn inputs(snapshot: &ModifierSnapshot) -> FormulaInputs<'_> {
        FormulaInputs {
            level: 1,
            attributes: Attributes::default(),
            snapshot,
            base_combo: ComboProfile::default(),
            always_use_base_combo: false,
            speed_multiplier: 1.0,
        }
    }

    #[test]
    fn test_default_character() {
        let config = GameConfig::default();
        let snapshot = ModifierSnapshot::default();
        let stats = DerivedStats::compute(&inputs(&snapshot), &config);

        // str 20, dex 15, vit 15, energy 10, level 1
        assert_eq!(stats.damage, MinMax::new(2, 5));
        assert_eq!(stats.magic_damage, MinMax::new(2, 5));
        assert_eq!(stats.max_health, 40);
        assert_eq!(stats.max_mana, 25);
        assert_eq!(stats.attack_speed, 1);
        assert_eq!(stats.defense, 3);
        assert!((stats.critical_chance - 0.21).abs() < 0.001);
        assert!((stats.chance_to_block).abs() < 0.001);
        assert_eq!(stats.block_speed, 113);
        assert!((stats.stun_chance - 0.03).abs() < 0.001);
        assert_eq!(stats.stun_speed, 127);
    }

    #[test]
    fn test_additive_then_multiplier() {
        let config = GameConfig::default();
        let mut snapshot = ModifierSnapshot::default();
        snapshot.additive.add(StatId::Health, 10.0);
        snapshot.additive.add(StatId::HealthPercent, 50.0);
        let stats = DerivedStats::compute(&inputs(&snapshot), &config);

        // (10 + 30 + 10) * 1.5
        assert_eq!(stats.max_health, 75);
    }

    #[test]
    fn test_items_and_caps() {
        let config = GameConfig::default();
        let snapshot = ModifierSnapshot {
            items: ItemTotals {
                damage: MinMax::new(4, 8),
                defense: 10,
                attack_speed: 10_000,
                chance_to_block: 0.5,
            },
            ..ModifierSnapshot::default()
        };
        let stats = DerivedStats::compute(&inputs(&snapshot), &config);

        assert_eq!(stats.damage, MinMax::new(6, 13));
        assert_eq!(stats.defense, 13);
        assert_eq!(stats.attack_speed, config.max_attack_speed);
        // (15/20 + 5 + 1) / 100 * 0.5
        assert!((stats.chance_to_block - 0.03).abs() < 0.001);
    }

    #[test]
    fn test_stat_lookup() {
        let config = GameConfig::default();
        let mut snapshot = ModifierSnapshot::default();
        snapshot.additive.add(StatId::FireResistance, 25.0);
        snapshot.additive.add(StatId::Strength, 5.0);
        let stats = DerivedStats::compute(&inputs(&snapshot), &config);

        assert!((stats.stat(StatId::FireResistance) - 25.0).abs() < 0.001);
        assert!((stats.stat(StatId::Strength) - 25.0).abs() < 0.001);
        assert_eq!(stats.resistances.get(Element::Fire), 25);
        assert_eq!(stats.resistances.get(Element::Ice), 0);
    }

    #[test]
    fn test_next_level_experience_curve() {
        let config = GameConfig::default();
        assert_eq!(next_level_experience(1, &config), 1973);
        assert_eq!(next_level_experience(2, &config), 1973);
        assert_eq!(next_level_experience(3, &config), 1973 + 179 * 2);
        assert_eq!(next_level_experience(10, &config), 1973 + 179 * 72);
        assert!(next_level_experience(50, &config) > next_level_experience(49, &config));
    }

    #[test]
    fn test_recompute_is_bit_identical() {
        let config = GameConfig::default();
        let mut snapshot = ModifierSnapshot::default();
        snapshot.additive.add(StatId::DamagePercent, 33.3);
        snapshot.additive.add(StatId::Dexterity, 7.0);
        let a = DerivedStats::compute(&inputs(&snapshot), &config);
        let b = DerivedStats::compute(&inputs(&snapshot), &config);
        assert_eq!(a, b);
        assert_eq!(a.critical_chance.to_bits(), b.critical_chance.to_bits());
    }
}

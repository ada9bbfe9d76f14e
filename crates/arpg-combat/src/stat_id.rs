//! Stat identifiers and the fixed-size stat table.
//!
//! Every modifiable stat has a [`StatId`]. Buffs, equipment and resistance
//! thresholds name stats through it, and [`StatTable`] maps each id to a slot
//! through an exhaustive `match`, so adding a stat is a compile error until
//! every accessor knows about it.

use serde::{Deserialize, Serialize};

// ============================================================================
// Elements
// ============================================================================

/// Elemental damage and resistance kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    /// Fire.
    Fire,
    /// Water.
    Water,
    /// Ice.
    Ice,
    /// Earth.
    Earth,
    /// Air.
    Air,
    /// Lightning.
    Lightning,
    /// Shadow.
    Shadow,
    /// Light.
    Light,
    /// Arcane.
    Arcane,
}

impl Element {
    /// All elements in table order.
    pub const ALL: [Self; 9] = [
        Self::Fire,
        Self::Water,
        Self::Ice,
        Self::Earth,
        Self::Air,
        Self::Lightning,
        Self::Shadow,
        Self::Light,
        Self::Arcane,
    ];

    /// The stat holding resistance against this element.
    #[must_use]
    pub const fn resistance_stat(self) -> StatId {
        match self {
            Self::Fire => StatId::FireResistance,
            Self::Water => StatId::WaterResistance,
            Self::Ice => StatId::IceResistance,
            Self::Earth => StatId::EarthResistance,
            Self::Air => StatId::AirResistance,
            Self::Lightning => StatId::LightningResistance,
            Self::Shadow => StatId::ShadowResistance,
            Self::Light => StatId::LightResistance,
            Self::Arcane => StatId::ArcaneResistance,
        }
    }
}

// ============================================================================
// Stat identifiers
// ============================================================================

/// Identifier of a modifiable stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatId {
    /// Strength attribute.
    Strength,
    /// Dexterity attribute.
    Dexterity,
    /// Vitality attribute.
    Vitality,
    /// Energy attribute.
    Energy,
    /// Flat physical damage.
    Damage,
    /// Flat magic damage.
    MagicDamage,
    /// Flat defense.
    Defense,
    /// Flat attack speed.
    AttackSpeed,
    /// Flat maximum health.
    Health,
    /// Flat maximum mana.
    Mana,
    /// Resistance to all magic damage.
    MagicResistance,
    /// Fire resistance.
    FireResistance,
    /// Water resistance.
    WaterResistance,
    /// Ice resistance.
    IceResistance,
    /// Earth resistance.
    EarthResistance,
    /// Air resistance.
    AirResistance,
    /// Lightning resistance.
    LightningResistance,
    /// Shadow resistance.
    ShadowResistance,
    /// Light resistance.
    LightResistance,
    /// Arcane resistance.
    ArcaneResistance,
    /// Maximum health bonus in percent.
    HealthPercent,
    /// Maximum mana bonus in percent.
    ManaPercent,
    /// Physical damage bonus in percent.
    DamagePercent,
    /// Magic damage bonus in percent.
    MagicDamagePercent,
    /// Defense bonus in percent.
    DefensePercent,
    /// Attack speed bonus in percent.
    AttackSpeedPercent,
    /// Health regenerated every second.
    HealthRegenPerSecond,
    /// Health regenerated every 5 seconds.
    HealthRegenPer5Seconds,
    /// Health regenerated every 30 seconds.
    HealthRegenPer30Seconds,
    /// Mana regenerated every second.
    ManaRegenPerSecond,
    /// Mana regenerated every 5 seconds.
    ManaRegenPer5Seconds,
    /// Mana regenerated every 30 seconds.
    ManaRegenPer30Seconds,
    /// Percent of next-level experience gained every second.
    ExperiencePerSecondPercent,
    /// Percent of next-level experience gained every 5 seconds.
    ExperiencePer5SecondsPercent,
    /// Percent of next-level experience gained every 30 seconds.
    ExperiencePer30SecondsPercent,
    /// Bonus on experience rewards in percent.
    ExperienceRewardPercent,
    /// Currency gained every minute.
    CurrencyPerMinute,
}

impl StatId {
    /// Number of stat identifiers.
    pub const COUNT: usize = 37;

    /// Every stat in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Strength,
        Self::Dexterity,
        Self::Vitality,
        Self::Energy,
        Self::Damage,
        Self::MagicDamage,
        Self::Defense,
        Self::AttackSpeed,
        Self::Health,
        Self::Mana,
        Self::MagicResistance,
        Self::FireResistance,
        Self::WaterResistance,
        Self::IceResistance,
        Self::EarthResistance,
        Self::AirResistance,
        Self::LightningResistance,
        Self::ShadowResistance,
        Self::LightResistance,
        Self::ArcaneResistance,
        Self::HealthPercent,
        Self::ManaPercent,
        Self::DamagePercent,
        Self::MagicDamagePercent,
        Self::DefensePercent,
        Self::AttackSpeedPercent,
        Self::HealthRegenPerSecond,
        Self::HealthRegenPer5Seconds,
        Self::HealthRegenPer30Seconds,
        Self::ManaRegenPerSecond,
        Self::ManaRegenPer5Seconds,
        Self::ManaRegenPer30Seconds,
        Self::ExperiencePerSecondPercent,
        Self::ExperiencePer5SecondsPercent,
        Self::ExperiencePer30SecondsPercent,
        Self::ExperienceRewardPercent,
        Self::CurrencyPerMinute,
    ];

    /// Slot of this stat in a [`StatTable`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Strength => 0,
            Self::Dexterity => 1,
            Self::Vitality => 2,
            Self::Energy => 3,
            Self::Damage => 4,
            Self::MagicDamage => 5,
            Self::Defense => 6,
            Self::AttackSpeed => 7,
            Self::Health => 8,
            Self::Mana => 9,
            Self::MagicResistance => 10,
            Self::FireResistance => 11,
            Self::WaterResistance => 12,
            Self::IceResistance => 13,
            Self::EarthResistance => 14,
            Self::AirResistance => 15,
            Self::LightningResistance => 16,
            Self::ShadowResistance => 17,
            Self::LightResistance => 18,
            Self::ArcaneResistance => 19,
            Self::HealthPercent => 20,
            Self::ManaPercent => 21,
            Self::DamagePercent => 22,
            Self::MagicDamagePercent => 23,
            Self::DefensePercent => 24,
            Self::AttackSpeedPercent => 25,
            Self::HealthRegenPerSecond => 26,
            Self::HealthRegenPer5Seconds => 27,
            Self::HealthRegenPer30Seconds => 28,
            Self::ManaRegenPerSecond => 29,
            Self::ManaRegenPer5Seconds => 30,
            Self::ManaRegenPer30Seconds => 31,
            Self::ExperiencePerSecondPercent => 32,
            Self::ExperiencePer5SecondsPercent => 33,
            Self::ExperiencePer30SecondsPercent => 34,
            Self::ExperienceRewardPercent => 35,
            Self::CurrencyPerMinute => 36,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Strength => "Strength",
            Self::Dexterity => "Dexterity",
            Self::Vitality => "Vitality",
            Self::Energy => "Energy",
            Self::Damage => "Damage",
            Self::MagicDamage => "Magic Damage",
            Self::Defense => "Defense",
            Self::AttackSpeed => "Attack Speed",
            Self::Health => "Health",
            Self::Mana => "Mana",
            Self::MagicResistance => "Magic Resistance",
            Self::FireResistance => "Fire Resistance",
            Self::WaterResistance => "Water Resistance",
            Self::IceResistance => "Ice Resistance",
            Self::EarthResistance => "Earth Resistance",
            Self::AirResistance => "Air Resistance",
            Self::LightningResistance => "Lightning Resistance",
            Self::ShadowResistance => "Shadow Resistance",
            Self::LightResistance => "Light Resistance",
            Self::ArcaneResistance => "Arcane Resistance",
            Self::HealthPercent => "Health %",
            Self::ManaPercent => "Mana %",
            Self::DamagePercent => "Damage %",
            Self::MagicDamagePercent => "Magic Damage %",
            Self::DefensePercent => "Defense %",
            Self::AttackSpeedPercent => "Attack Speed %",
            Self::HealthRegenPerSecond => "Health Regen / 1s",
            Self::HealthRegenPer5Seconds => "Health Regen / 5s",
            Self::HealthRegenPer30Seconds => "Health Regen / 30s",
            Self::ManaRegenPerSecond => "Mana Regen / 1s",
            Self::ManaRegenPer5Seconds => "Mana Regen / 5s",
            Self::ManaRegenPer30Seconds => "Mana Regen / 30s",
            Self::ExperiencePerSecondPercent => "Experience % / 1s",
            Self::ExperiencePer5SecondsPercent => "Experience % / 5s",
            Self::ExperiencePer30SecondsPercent => "Experience % / 30s",
            Self::ExperienceRewardPercent => "Experience Reward %",
            Self::CurrencyPerMinute => "Currency / min",
        }
    }

    /// Whether this stat is a percentage applied after additive totals.
    #[must_use]
    pub const fn is_percentage(self) -> bool {
        matches!(
            self,
            Self::HealthPercent
                | Self::ManaPercent
                | Self::DamagePercent
                | Self::MagicDamagePercent
                | Self::DefensePercent
                | Self::AttackSpeedPercent
        )
    }

    /// The percentage stat scaling this flat stat, if any.
    #[must_use]
    pub const fn percent_of(self) -> Option<Self> {
        match self {
            Self::Health => Some(Self::HealthPercent),
            Self::Mana => Some(Self::ManaPercent),
            Self::Damage => Some(Self::DamagePercent),
            Self::MagicDamage => Some(Self::MagicDamagePercent),
            Self::Defense => Some(Self::DefensePercent),
            Self::AttackSpeed => Some(Self::AttackSpeedPercent),
            _ => None,
        }
    }
}

impl std::fmt::Display for StatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Stat table
// ============================================================================

/// One value per [`StatId`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatTable {
    #[serde(with = "table_serde")]
    values: [f32; StatId::COUNT],
}

impl Default for StatTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StatTable {
    /// Creates a table with every stat at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: [0.0; StatId::COUNT],
        }
    }

    /// Builds a table from `(stat, value)` pairs, summing repeats.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a (StatId, f32)>) -> Self {
        let mut table = Self::new();
        for (stat, value) in pairs {
            table.add(*stat, *value);
        }
        table
    }

    /// Value of a stat.
    #[must_use]
    pub const fn get(&self, stat: StatId) -> f32 {
        self.values[stat.index()]
    }

    /// Value of a stat truncated toward zero.
    #[must_use]
    pub fn get_int(&self, stat: StatId) -> i32 {
        self.values[stat.index()] as i32
    }

    /// Overwrites a stat.
    pub fn set(&mut self, stat: StatId, value: f32) {
        self.values[stat.index()] = value;
    }

    /// Adds to a stat.
    pub fn add(&mut self, stat: StatId, value: f32) {
        self.values[stat.index()] += value;
    }

    /// Subtracts from a stat.
    pub fn sub(&mut self, stat: StatId, value: f32) {
        self.values[stat.index()] -= value;
    }

    /// Adds every stat of `other` into this table.
    pub fn merge(&mut self, other: &Self) {
        for (dst, src) in self.values.iter_mut().zip(other.values.iter()) {
            *dst += *src;
        }
    }

    /// Multiplier for a flat stat, `1 + percent / 100`. Stats without a
    /// percentage counterpart return 1.0.
    #[must_use]
    pub fn multiplier(&self, stat: StatId) -> f32 {
        stat.percent_of()
            .map_or(1.0, |pct| 1.0 + self.get(pct) / 100.0)
    }

    /// Whether every stat is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Iterates over non-zero stats.
    pub fn iter(&self) -> impl Iterator<Item = (StatId, f32)> + '_ {
        StatId::ALL
            .iter()
            .map(|s| (*s, self.values[s.index()]))
            .filter(|(_, v)| *v != 0.0)
    }
}

/// Serializes the table as a list of non-zero `(stat, value)` pairs.
mod table_serde {
    use super::{StatId, StatTable};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        values: &[f32; StatId::COUNT],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(StatId, f32)> = StatId::ALL
            .iter()
            .map(|s| (*s, values[s.index()]))
            .filter(|(_, v)| *v != 0.0)
            .collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[f32; StatId::COUNT], D::Error> {
        let pairs = Vec::<(StatId, f32)>::deserialize(deserializer)?;
        Ok(StatTable::from_pairs(&pairs).values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_a_bijection() {
        for (i, stat) in StatId::ALL.iter().enumerate() {
            assert_eq!(stat.index(), i, "{stat} out of order");
        }
    }

    #[test]
    fn test_element_resistances_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for element in Element::ALL {
            assert!(seen.insert(element.resistance_stat()));
        }
        assert_eq!(seen.len(), 9);
    }

    #[test]
    fn test_table_add_sub() {
        let mut table = StatTable::new();
        table.add(StatId::Strength, 5.0);
        table.add(StatId::Strength, 3.0);
        table.sub(StatId::Strength, 8.0);
        assert!(table.is_zero());

        table.add(StatId::FireResistance, 12.0);
        assert_eq!(table.get_int(StatId::FireResistance), 12);
        assert_eq!(table.iter().count(), 1);
    }

    #[test]
    fn test_multiplier() {
        let table = StatTable::from_pairs(&[(StatId::HealthPercent, 50.0)]);
        assert!((table.multiplier(StatId::Health) - 1.5).abs() < 0.001);
        assert!((table.multiplier(StatId::Mana) - 1.0).abs() < 0.001);
        assert!((table.multiplier(StatId::Strength) - 1.0).abs() < 0.001);
        assert!(StatId::HealthPercent.is_percentage());
        assert!(!StatId::Health.is_percentage());
    }

    #[test]
    fn test_table_serializes_sparse() {
        let table = StatTable::from_pairs(&[(StatId::Vitality, 4.0), (StatId::ManaPercent, 10.0)]);
        let json = serde_json::to_string(&table).expect("serialize");
        assert!(json.contains("vitality"));
        assert!(!json.contains("strength"));
        let loaded: StatTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(loaded, table);
    }
}

//! Combat resolution.
//!
//! [`CombatResolver`] owns nothing. It reads plain views of the attacker and
//! defender, draws from the injected rng, and returns an outcome for the
//! caller to apply.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::formulas::{DerivedStats, Resistances};
use crate::rng::CombatRng;
use crate::skills::{DamageMode, SkillDefinition};

/// The parts of a defender a hit resolution reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefenderView {
    /// Defender is dead.
    pub dead: bool,
    /// Defender is attacking or using a skill; attackers cannot be blocked.
    pub attacking: bool,
    /// Simulation time of the last damage taken.
    pub last_hit_time: Option<f64>,
    /// Current health.
    pub health: i32,
    /// Defense stat.
    pub defense: i32,
    /// Chance to block (0.0-1.0).
    pub chance_to_block: f32,
    /// Skips stun rolls.
    pub immune_to_stun: bool,
}

/// Result of [`CombatResolver::resolve_hit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitOutcome {
    /// Dead defender or still inside the re-hit window.
    Ignored,
    /// Fully negated by a block.
    Blocked,
    /// Damage connected.
    Damaged {
        /// Health removed.
        amount: i32,
        /// Health left.
        remaining_health: i32,
        /// Health reached zero.
        killed: bool,
        /// Stun roll succeeded.
        stunned: bool,
    },
}

/// Stateless combat math.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombatResolver;

impl CombatResolver {
    /// Rolls for a critical. Returns the multiplier and whether it hit.
    pub fn critical_multiplier(
        critical_chance: f32,
        rng: &mut dyn CombatRng,
        config: &GameConfig,
    ) -> (f32, bool) {
        let success = rng.next_f32() > 1.0 - critical_chance;
        if success {
            (config.critical_multiplier, true)
        } else {
            (1.0, false)
        }
    }

    /// Physical damage after defense. Never below 1.
    #[must_use]
    pub fn mitigate_physical(amount: i32, defense: i32) -> i32 {
        (amount - defense / 2).max(1)
    }

    /// Magic damage after magic resistance. Never below 1.
    #[must_use]
    pub fn mitigate_magic(amount: i32, magic_resistance: i32) -> i32 {
        (amount - magic_resistance).max(1)
    }

    /// Whether a defender hit at `last_hit_time` is still protected at `now`.
    #[must_use]
    pub fn within_hit_cooldown(last_hit_time: Option<f64>, now: f64, config: &GameConfig) -> bool {
        last_hit_time.is_some_and(|t| now <= t + f64::from(config.min_hit_interval))
    }

    /// Resolves a physical hit: re-hit window, block, mitigation, death, stun.
    pub fn resolve_hit(
        defender: &DefenderView,
        amount: i32,
        attacker_stun_chance: f32,
        now: f64,
        rng: &mut dyn CombatRng,
        config: &GameConfig,
    ) -> HitOutcome {
        if defender.dead || Self::within_hit_cooldown(defender.last_hit_time, now, config) {
            return HitOutcome::Ignored;
        }

        if !defender.attacking && rng.chance(defender.chance_to_block) {
            return HitOutcome::Blocked;
        }

        let amount = Self::mitigate_physical(amount, defender.defense);
        let remaining_health = (defender.health - amount).max(0);
        let killed = remaining_health == 0;
        let stunned = !killed && !defender.immune_to_stun && rng.chance(attacker_stun_chance);

        HitOutcome::Damaged {
            amount,
            remaining_health,
            killed,
            stunned,
        }
    }

    /// Damage dealt by a skill hit, before the defender's defense.
    ///
    /// The lower and upper bounds each roll their own critical; the value is
    /// uniform between them. Resistances are subtracted after the critical
    /// multiplier and never take the result below zero.
    pub fn skill_damage(
        attacker: &DerivedStats,
        skill: &SkillDefinition,
        defender_magic_resistance: i32,
        defender_resistances: &Resistances,
        rng: &mut dyn CombatRng,
        config: &GameConfig,
    ) -> (i32, bool) {
        let base = match skill.damage_mode {
            DamageMode::Regular => attacker.damage,
            DamageMode::Magic => attacker.magic_damage,
        };
        let raw = skill.damage + base;

        let (min_multiplier, min_critical) =
            Self::critical_multiplier(attacker.critical_chance, rng, config);
        let (max_multiplier, max_critical) =
            Self::critical_multiplier(attacker.critical_chance, rng, config);
        let lo = (raw.min as f32 * min_multiplier) as i32;
        let hi = (raw.max as f32 * max_multiplier) as i32;
        let value = rng.range_inclusive(lo.min(hi), lo.max(hi));

        let mut resistance = skill
            .element
            .map_or(0, |element| defender_resistances.get(element));
        if skill.damage_mode == DamageMode::Magic {
            resistance += defender_magic_resistance;
        }

        ((value - resistance).max(0), min_critical || max_critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::MinMax;
    use crate::rng::SequenceRng;
    use crate::stat_id::{Element, StatId, StatTable};
    use arpg_common::SkillId;
    use proptest::prelude::*;

    fn defender() -> DefenderView {
        DefenderView {
            dead: false,
            attacking: false,
            last_hit_time: None,
            health: 40,
            defense: 20,
            chance_to_block: 0.0,
            immune_to_stun: false,
        }
    }

    #[test]
    fn test_defense_halves_into_damage() {
        // 20 defense, 15 damage: 15 - 10 = 5.
        let config = GameConfig::default();
        let mut rng = SequenceRng::never();
        let outcome = CombatResolver::resolve_hit(&defender(), 15, 0.0, 1.0, &mut rng, &config);
        assert_eq!(
            outcome,
            HitOutcome::Damaged {
                amount: 5,
                remaining_health: 35,
                killed: false,
                stunned: false
            }
        );
    }

    #[test]
    fn test_minimum_chip_damage() {
        assert_eq!(CombatResolver::mitigate_physical(3, 500), 1);
        assert_eq!(CombatResolver::mitigate_magic(3, 500), 1);
        assert_eq!(CombatResolver::mitigate_magic(30, 10), 20);
    }

    #[test]
    fn test_dead_and_rehit_window_ignored() {
        let config = GameConfig::default();
        let mut rng = SequenceRng::never();

        let dead = DefenderView {
            dead: true,
            ..defender()
        };
        assert_eq!(
            CombatResolver::resolve_hit(&dead, 50, 0.0, 1.0, &mut rng, &config),
            HitOutcome::Ignored
        );

        let recent = DefenderView {
            last_hit_time: Some(1.0),
            ..defender()
        };
        assert_eq!(
            CombatResolver::resolve_hit(&recent, 50, 0.0, 1.1, &mut rng, &config),
            HitOutcome::Ignored
        );
        assert_ne!(
            CombatResolver::resolve_hit(&recent, 50, 0.0, 1.2, &mut rng, &config),
            HitOutcome::Ignored
        );
    }

    #[test]
    fn test_block_only_when_not_attacking() {
        let config = GameConfig::default();
        let blocker = DefenderView {
            chance_to_block: 0.5,
            ..defender()
        };
        let mut rng = SequenceRng::constant(0.1);
        assert_eq!(
            CombatResolver::resolve_hit(&blocker, 15, 0.0, 1.0, &mut rng, &config),
            HitOutcome::Blocked
        );

        let busy = DefenderView {
            attacking: true,
            ..blocker
        };
        assert!(matches!(
            CombatResolver::resolve_hit(&busy, 15, 0.0, 1.0, &mut rng, &config),
            HitOutcome::Damaged { .. }
        ));
    }

    #[test]
    fn test_lethal_hit_skips_stun() {
        let config = GameConfig::default();
        let fragile = DefenderView {
            health: 3,
            ..defender()
        };
        let mut rng = SequenceRng::always();
        let outcome = CombatResolver::resolve_hit(&fragile, 50, 1.0, 1.0, &mut rng, &config);
        assert_eq!(
            outcome,
            HitOutcome::Damaged {
                amount: 40,
                remaining_health: 0,
                killed: true,
                stunned: false
            }
        );
    }

    #[test]
    fn test_stun_roll_and_immunity() {
        let config = GameConfig::default();
        // Block roll fails (chance 0), stun roll at 0.0 succeeds.
        let mut rng = SequenceRng::always();
        let outcome = CombatResolver::resolve_hit(&defender(), 15, 0.3, 1.0, &mut rng, &config);
        assert!(matches!(outcome, HitOutcome::Damaged { stunned: true, .. }));

        let immune = DefenderView {
            immune_to_stun: true,
            ..defender()
        };
        let outcome = CombatResolver::resolve_hit(&immune, 15, 1.0, 1.0, &mut rng, &config);
        assert!(matches!(outcome, HitOutcome::Damaged { stunned: false, .. }));
    }

    #[test]
    fn test_critical_multiplier() {
        let config = GameConfig::default();
        let mut rng = SequenceRng::constant(0.9);
        assert_eq!(
            CombatResolver::critical_multiplier(0.2, &mut rng, &config),
            (1.25, true)
        );
        let mut rng = SequenceRng::constant(0.5);
        assert_eq!(
            CombatResolver::critical_multiplier(0.2, &mut rng, &config),
            (1.0, false)
        );
        let mut rng = SequenceRng::constant(0.9999);
        assert!(!CombatResolver::critical_multiplier(0.0, &mut rng, &config).1);
    }

    #[test]
    fn test_skill_damage_per_bound_critical() {
        let config = GameConfig::default();
        let attacker = DerivedStats {
            damage: MinMax::new(2, 5),
            critical_chance: 0.2,
            ..DerivedStats::default()
        };
        let skill = SkillDefinition::new(SkillId::new(1), "Cleave").with_damage(8, 15, DamageMode::Regular);

        // Min bound: no crit (10). Max bound: crit (20 * 1.25 = 25). Value 18.
        let mut rng = SequenceRng::never()
            .with_floats([0.1, 0.95])
            .with_ints([18]);
        let (value, critical) =
            CombatResolver::skill_damage(&attacker, &skill, 0, &Resistances::default(), &mut rng, &config);
        assert_eq!(value, 18);
        assert!(critical);
    }

    #[test]
    fn test_skill_damage_resistance_after_critical() {
        let config = GameConfig::default();
        let attacker = DerivedStats {
            magic_damage: MinMax::new(10, 10),
            critical_chance: 1.0,
            ..DerivedStats::default()
        };
        let skill = SkillDefinition::new(SkillId::new(2), "Fireball")
            .with_damage(10, 10, DamageMode::Magic)
            .with_element(Element::Fire);
        let mut table = StatTable::new();
        table.set(StatId::FireResistance, 15.0);
        let resistances = Resistances::from_table(&table);

        // 20 * 1.25 = 25, minus 15 fire, minus 5 magic.
        let mut rng = SequenceRng::constant(0.5).with_ints([25]);
        let (value, critical) =
            CombatResolver::skill_damage(&attacker, &skill, 5, &resistances, &mut rng, &config);
        assert_eq!(value, 5);
        assert!(critical);

        // Resistance never pushes below zero.
        let mut rng = SequenceRng::constant(0.5).with_ints([25]);
        let (value, _) =
            CombatResolver::skill_damage(&attacker, &skill, 500, &resistances, &mut rng, &config);
        assert_eq!(value, 0);
    }

    proptest! {
        #[test]
        fn prop_connected_hit_removes_at_least_one(
            amount in -100i32..1000,
            defense in 0i32..2000,
            health in 1i32..5000,
        ) {
            let config = GameConfig::default();
            let view = DefenderView { health, defense, ..defender() };
            let mut rng = SequenceRng::never();
            match CombatResolver::resolve_hit(&view, amount, 0.0, 10.0, &mut rng, &config) {
                HitOutcome::Damaged { amount, remaining_health, .. } => {
                    prop_assert!(amount >= 1);
                    prop_assert_eq!(remaining_health, (health - amount).max(0));
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}

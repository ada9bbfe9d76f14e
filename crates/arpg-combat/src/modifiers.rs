//! Modifier aggregation.
//!
//! The snapshot is rebuilt from scratch on every recalculation: equipment in
//! slot order, then active buffs in application order. Nothing is added or
//! subtracted incrementally, so removing a buff always restores the exact
//! previous totals.

use serde::{Deserialize, Serialize};

use crate::buffs::BuffLedger;
use crate::combo::ComboProfile;
use crate::equipment::Equipment;
use crate::formulas::MinMax;
use crate::stat_id::{StatId, StatTable};

/// Totals that only equipment provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemTotals {
    /// Summed damage range.
    pub damage: MinMax,
    /// Summed defense.
    pub defense: i32,
    /// Weapon attack speed.
    pub attack_speed: i32,
    /// Shield chance to block as a fraction.
    pub chance_to_block: f32,
}

/// Aggregated contributions used by one recalculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifierSnapshot {
    /// Additive and percentage contributions per stat.
    pub additive: StatTable,
    /// Equipment-only totals.
    pub items: ItemTotals,
    /// Combo limits of the main weapon.
    pub weapon_combo: Option<ComboProfile>,
}

impl ModifierSnapshot {
    /// Multiplier for a flat stat.
    #[must_use]
    pub fn multiplier(&self, stat: StatId) -> f32 {
        self.additive.multiplier(stat)
    }
}

/// Builds [`ModifierSnapshot`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifierAggregator;

impl ModifierAggregator {
    /// Sums equipment and every active buff.
    #[must_use]
    pub fn aggregate(equipment: &Equipment, buffs: &BuffLedger) -> ModifierSnapshot {
        let mut additive = StatTable::new();
        for item in equipment.items() {
            for (stat, value) in &item.modifiers {
                additive.add(*stat, *value);
            }
        }
        buffs.accumulate(&mut additive);

        ModifierSnapshot {
            additive,
            items: ItemTotals {
                damage: equipment.damage(),
                defense: equipment.defense(),
                attack_speed: equipment.attack_speed(),
                chance_to_block: equipment.chance_to_block(),
            },
            weapon_combo: equipment.combo_profile(),
        }
    }
}

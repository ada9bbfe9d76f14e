//! Equipped items and their numeric contribution.
//!
//! The engine never instantiates or renders items; it only needs what each
//! equipped piece adds to the stat pipeline.

use std::collections::BTreeMap;

use arpg_common::ItemId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combo::ComboProfile;
use crate::formulas::MinMax;
use crate::stat_id::StatId;

// ============================================================================
// Item data
// ============================================================================

/// Slot an item can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    /// Main weapon hand.
    RightHand,
    /// Off hand (shield or secondary blade).
    LeftHand,
    /// Helmet.
    Head,
    /// Body armor.
    Chest,
    /// Leg armor.
    Legs,
    /// Gloves.
    Hands,
    /// Boots.
    Feet,
    /// Amulet.
    Amulet,
    /// Ring.
    Ring,
}

impl EquipmentSlot {
    /// Whether this slot takes armor pieces.
    #[must_use]
    pub const fn is_armor(self) -> bool {
        matches!(self, Self::Head | Self::Chest | Self::Legs | Self::Hands | Self::Feet)
    }

    /// Whether this slot takes accessories.
    #[must_use]
    pub const fn is_accessory(self) -> bool {
        matches!(self, Self::Amulet | Self::Ring)
    }
}

/// What an item is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Melee weapon.
    Blade {
        /// Occupies both hands.
        two_handed: bool,
    },
    /// Ranged weapon.
    Bow {
        /// Range of a shot.
        shot_distance: f32,
    },
    /// Off-hand shield.
    Shield {
        /// Chance to block in percent.
        chance_to_block: f32,
    },
    /// Armor piece for one of the armor slots.
    Armor(EquipmentSlot),
    /// Amulet or ring.
    Accessory(EquipmentSlot),
}

impl ItemKind {
    /// Whether this is a weapon.
    #[must_use]
    pub const fn is_weapon(&self) -> bool {
        matches!(self, Self::Blade { .. } | Self::Bow { .. })
    }

    /// Whether this weapon needs both hands.
    #[must_use]
    pub const fn is_two_handed(&self) -> bool {
        matches!(self, Self::Blade { two_handed: true } | Self::Bow { .. })
    }
}

/// An equippable item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item type identifier.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Item kind.
    pub kind: ItemKind,
    /// Damage range (weapons).
    #[serde(default)]
    pub damage: MinMax,
    /// Defense points.
    #[serde(default)]
    pub defense: i32,
    /// Attack speed points (weapons).
    #[serde(default)]
    pub attack_speed: i32,
    /// Melee reach; zero uses the configured base distance.
    #[serde(default)]
    pub reach: f32,
    /// Combo limits when this is the main weapon.
    #[serde(default)]
    pub combo: Option<ComboProfile>,
    /// Additional stat contributions.
    #[serde(default)]
    pub modifiers: Vec<(StatId, f32)>,
}

impl Item {
    /// Create an item with no stats.
    #[must_use]
    pub fn new(id: ItemId, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            damage: MinMax::ZERO,
            defense: 0,
            attack_speed: 0,
            reach: 0.0,
            combo: None,
            modifiers: Vec::new(),
        }
    }

    /// Set damage range.
    #[must_use]
    pub fn with_damage(mut self, min: i32, max: i32) -> Self {
        self.damage = MinMax::new(min, max);
        self
    }

    /// Set defense.
    #[must_use]
    pub fn with_defense(mut self, defense: i32) -> Self {
        self.defense = defense;
        self
    }

    /// Set attack speed.
    #[must_use]
    pub fn with_attack_speed(mut self, attack_speed: i32) -> Self {
        self.attack_speed = attack_speed;
        self
    }

    /// Set melee reach.
    #[must_use]
    pub fn with_reach(mut self, reach: f32) -> Self {
        self.reach = reach;
        self
    }

    /// Set combo limits.
    #[must_use]
    pub fn with_combo(mut self, combo: ComboProfile) -> Self {
        self.combo = Some(combo);
        self
    }

    /// Add a stat contribution.
    #[must_use]
    pub fn with_modifier(mut self, stat: StatId, value: f32) -> Self {
        self.modifiers.push((stat, value));
        self
    }
}

// ============================================================================
// Equipment
// ============================================================================

/// Why an item could not be equipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EquipRejection {
    /// The item does not fit this slot.
    #[error("item does not fit this slot")]
    WrongSlot,
    /// A two-handed weapon conflicts with the off hand.
    #[error("two-handed weapon conflicts with the off hand")]
    TwoHandedConflict,
    /// An off-hand blade needs a one-handed blade in the main hand.
    #[error("off-hand blade requires a one-handed main blade")]
    OffHandRequiresBlade,
}

/// Items currently worn by an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    slots: BTreeMap<EquipmentSlot, Item>,
}

impl Equipment {
    /// Create empty equipment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Item in a slot.
    #[must_use]
    pub fn get(&self, slot: EquipmentSlot) -> Option<&Item> {
        self.slots.get(&slot)
    }

    /// Number of equipped items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing is equipped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Checks whether `item` may go into `slot` given what is worn now.
    pub fn can_equip(&self, slot: EquipmentSlot, item: &Item) -> Result<(), EquipRejection> {
        let right = self.get(EquipmentSlot::RightHand).map(|i| i.kind);
        let left = self.get(EquipmentSlot::LeftHand).map(|i| i.kind);

        match item.kind {
            ItemKind::Blade { two_handed } => match slot {
                EquipmentSlot::RightHand => {
                    if two_handed && left.is_some() {
                        return Err(EquipRejection::TwoHandedConflict);
                    }
                    Ok(())
                },
                EquipmentSlot::LeftHand => {
                    if two_handed {
                        return Err(EquipRejection::WrongSlot);
                    }
                    match right {
                        Some(ItemKind::Blade { two_handed: false }) => Ok(()),
                        Some(k) if k.is_two_handed() => Err(EquipRejection::TwoHandedConflict),
                        _ => Err(EquipRejection::OffHandRequiresBlade),
                    }
                },
                _ => Err(EquipRejection::WrongSlot),
            },
            ItemKind::Bow { .. } => {
                if slot != EquipmentSlot::RightHand {
                    return Err(EquipRejection::WrongSlot);
                }
                if left.is_some() {
                    return Err(EquipRejection::TwoHandedConflict);
                }
                Ok(())
            },
            ItemKind::Shield { .. } => {
                if slot != EquipmentSlot::LeftHand {
                    return Err(EquipRejection::WrongSlot);
                }
                if right.is_some_and(|k| k.is_two_handed()) {
                    return Err(EquipRejection::TwoHandedConflict);
                }
                Ok(())
            },
            ItemKind::Armor(fits) if fits == slot && slot.is_armor() => Ok(()),
            ItemKind::Accessory(fits) if fits == slot && slot.is_accessory() => Ok(()),
            ItemKind::Armor(_) | ItemKind::Accessory(_) => Err(EquipRejection::WrongSlot),
        }
    }

    /// Equips an item, returning whatever was in the slot before.
    pub fn equip(&mut self, slot: EquipmentSlot, item: Item) -> Result<Option<Item>, EquipRejection> {
        self.can_equip(slot, &item)?;
        Ok(self.slots.insert(slot, item))
    }

    /// Removes the item in a slot.
    ///
    /// Removing the main-hand weapon also drops an off-hand blade, which
    /// cannot be held alone.
    pub fn unequip(&mut self, slot: EquipmentSlot) -> Vec<Item> {
        let mut removed = Vec::new();
        if let Some(item) = self.slots.remove(&slot) {
            removed.push(item);
        }
        if slot == EquipmentSlot::RightHand
            && matches!(
                self.get(EquipmentSlot::LeftHand).map(|i| i.kind),
                Some(ItemKind::Blade { .. })
            )
        {
            if let Some(off) = self.slots.remove(&EquipmentSlot::LeftHand) {
                removed.push(off);
            }
        }
        removed
    }

    /// Iterates over equipped items in slot order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.slots.values()
    }

    /// IDs of every equipped item.
    #[must_use]
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.slots.values().map(|i| i.id).collect()
    }

    /// Main-hand weapon, if any.
    #[must_use]
    pub fn weapon(&self) -> Option<&Item> {
        self.get(EquipmentSlot::RightHand).filter(|i| i.kind.is_weapon())
    }

    /// Whether the main hand holds a blade.
    #[must_use]
    pub fn is_using_blade(&self) -> bool {
        matches!(self.weapon().map(|i| i.kind), Some(ItemKind::Blade { .. }))
    }

    /// Whether the main hand holds a bow.
    #[must_use]
    pub fn is_using_bow(&self) -> bool {
        matches!(self.weapon().map(|i| i.kind), Some(ItemKind::Bow { .. }))
    }

    /// Summed damage range of every item.
    #[must_use]
    pub fn damage(&self) -> MinMax {
        self.slots
            .values()
            .fold(MinMax::ZERO, |acc, item| acc + item.damage)
    }

    /// Summed defense of every item.
    #[must_use]
    pub fn defense(&self) -> i32 {
        self.slots.values().map(|i| i.defense).sum()
    }

    /// Main weapon speed plus half of an off-hand weapon's.
    #[must_use]
    pub fn attack_speed(&self) -> i32 {
        let Some(main) = self.weapon() else {
            return 0;
        };
        let off = self
            .get(EquipmentSlot::LeftHand)
            .filter(|i| i.kind.is_weapon())
            .map_or(0, |i| (i.attack_speed as f32 * 0.5) as i32);
        main.attack_speed + off
    }

    /// Shield chance to block as a fraction; zero without a shield.
    #[must_use]
    pub fn chance_to_block(&self) -> f32 {
        match self.get(EquipmentSlot::LeftHand).map(|i| i.kind) {
            Some(ItemKind::Shield { chance_to_block }) => chance_to_block / 100.0,
            _ => 0.0,
        }
    }

    /// Combo limits of the main weapon.
    #[must_use]
    pub fn combo_profile(&self) -> Option<ComboProfile> {
        self.weapon().and_then(|w| w.combo)
    }

    /// Attack reach: bow shot distance, blade reach, or `base`.
    #[must_use]
    pub fn attack_distance(&self, base: f32) -> f32 {
        match self.weapon() {
            Some(Item {
                kind: ItemKind::Bow { shot_distance },
                ..
            }) => *shot_distance,
            Some(item) if item.reach > 0.0 => item.reach,
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sword() -> Item {
        Item::new(ItemId::new(1), "Sword", ItemKind::Blade { two_handed: false })
            .with_damage(5, 9)
            .with_attack_speed(40)
            .with_reach(1.5)
            .with_combo(ComboProfile::new(3, 1.2, 0.2))
    }

    fn dagger() -> Item {
        Item::new(ItemId::new(2), "Dagger", ItemKind::Blade { two_handed: false })
            .with_damage(2, 4)
            .with_attack_speed(30)
    }

    fn greatsword() -> Item {
        Item::new(ItemId::new(3), "Greatsword", ItemKind::Blade { two_handed: true })
            .with_damage(12, 20)
    }

    fn shield() -> Item {
        Item::new(ItemId::new(4), "Shield", ItemKind::Shield { chance_to_block: 40.0 })
            .with_defense(6)
    }

    #[test]
    fn test_dual_wield_attack_speed() {
        let mut eq = Equipment::new();
        eq.equip(EquipmentSlot::RightHand, sword()).expect("main hand");
        eq.equip(EquipmentSlot::LeftHand, dagger()).expect("off hand");

        assert_eq!(eq.attack_speed(), 40 + 15);
        assert_eq!(eq.damage(), MinMax::new(7, 13));
        assert!(eq.is_using_blade());
    }

    #[test]
    fn test_two_handed_rules() {
        let mut eq = Equipment::new();
        eq.equip(EquipmentSlot::RightHand, greatsword()).expect("two-handed");
        assert_eq!(
            eq.equip(EquipmentSlot::LeftHand, shield()),
            Err(EquipRejection::TwoHandedConflict)
        );

        let mut eq = Equipment::new();
        eq.equip(EquipmentSlot::LeftHand, shield()).expect("shield");
        assert_eq!(
            eq.equip(EquipmentSlot::RightHand, greatsword()),
            Err(EquipRejection::TwoHandedConflict)
        );
    }

    #[test]
    fn test_off_hand_blade_requires_main_blade() {
        let mut eq = Equipment::new();
        assert_eq!(
            eq.equip(EquipmentSlot::LeftHand, dagger()),
            Err(EquipRejection::OffHandRequiresBlade)
        );

        eq.equip(EquipmentSlot::RightHand, sword()).expect("main hand");
        eq.equip(EquipmentSlot::LeftHand, dagger()).expect("off hand");
        let removed = eq.unequip(EquipmentSlot::RightHand);
        assert_eq!(removed.len(), 2);
        assert!(eq.is_empty());
    }

    #[test]
    fn test_shield_block_chance_and_slots() {
        let mut eq = Equipment::new();
        assert!((eq.chance_to_block()).abs() < 0.001);
        eq.equip(EquipmentSlot::LeftHand, shield()).expect("shield");
        assert!((eq.chance_to_block() - 0.4).abs() < 0.001);
        assert_eq!(eq.defense(), 6);

        let helm = Item::new(ItemId::new(9), "Helm", ItemKind::Armor(EquipmentSlot::Head));
        assert_eq!(
            eq.equip(EquipmentSlot::Chest, helm.clone()),
            Err(EquipRejection::WrongSlot)
        );
        assert!(eq.equip(EquipmentSlot::Head, helm).is_ok());
    }

    #[test]
    fn test_attack_distance_and_combo() {
        let mut eq = Equipment::new();
        assert!((eq.attack_distance(1.0) - 1.0).abs() < 0.001);
        assert!(eq.combo_profile().is_none());

        eq.equip(EquipmentSlot::RightHand, sword()).expect("sword");
        assert!((eq.attack_distance(1.0) - 1.5).abs() < 0.001);
        assert_eq!(eq.combo_profile().map(|c| c.max_combos), Some(3));

        let bow = Item::new(ItemId::new(5), "Bow", ItemKind::Bow { shot_distance: 12.0 });
        let previous = eq.equip(EquipmentSlot::RightHand, bow).expect("bow");
        assert!(previous.is_some());
        assert!(eq.is_using_bow());
        assert!((eq.attack_distance(1.0) - 12.0).abs() < 0.001);
    }
}

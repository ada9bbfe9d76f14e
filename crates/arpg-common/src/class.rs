//! Character class flags used by class-restricted buffs and skills.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Set of character classes.
    ///
    /// An entity has exactly one class bit set; restrictions hold any number.
    /// An empty restriction set means "no restriction".
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CharacterClass: u8 {
        /// First tier of the knight family.
        const KNIGHT      = 1 << 0;
        /// Second tier of the knight family.
        const VANGUARD    = 1 << 1;
        /// Third tier of the knight family.
        const WARLORD     = 1 << 2;
        /// First tier of the arcanist family.
        const ARCANIST    = 1 << 3;
        /// Second tier of the arcanist family.
        const SPELLBINDER = 1 << 4;
        /// Third tier of the arcanist family.
        const CLAIRVOYANT = 1 << 5;

        /// Every knight tier.
        const KNIGHT_FAMILY = Self::KNIGHT.bits() | Self::VANGUARD.bits() | Self::WARLORD.bits();
        /// Every arcanist tier.
        const ARCANIST_FAMILY = Self::ARCANIST.bits() | Self::SPELLBINDER.bits() | Self::CLAIRVOYANT.bits();
    }
}

impl CharacterClass {
    /// Looks up a single class by its display name.
    #[must_use]
    pub fn from_display_name(name: &str) -> Option<Self> {
        match name {
            "Knight" => Some(Self::KNIGHT),
            "Vanguard" => Some(Self::VANGUARD),
            "Warlord" => Some(Self::WARLORD),
            "Arcanist" => Some(Self::ARCANIST),
            "Spellbinder" => Some(Self::SPELLBINDER),
            "Clairvoyant" => Some(Self::CLAIRVOYANT),
            _ => None,
        }
    }

    /// Returns the family this class belongs to, or empty for mixed sets.
    #[must_use]
    pub fn family(self) -> Self {
        if Self::KNIGHT_FAMILY.contains(self) {
            Self::KNIGHT_FAMILY
        } else if Self::ARCANIST_FAMILY.contains(self) {
            Self::ARCANIST_FAMILY
        } else {
            Self::empty()
        }
    }

    /// Whether an entity of class `self` satisfies the `allowed` restriction.
    #[must_use]
    pub fn satisfies(self, allowed: Self) -> bool {
        allowed.is_empty() || allowed.intersects(self)
    }
}

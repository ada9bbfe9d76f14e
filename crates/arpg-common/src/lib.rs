//! # ARPG Common
//!
//! Shared types for the ARPG combat engine:
//! - ID types (EntityId, BuffId, SkillId, ItemId)
//! - Character class flags
//! - Error types for configuration and catalog loading
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod class;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::class::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_generation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(id1.is_valid());
        assert!(!EntityId::NULL.is_valid());
    }

    #[test]
    fn test_class_restrictions() {
        let knight = CharacterClass::KNIGHT;

        assert!(knight.satisfies(CharacterClass::empty()));
        assert!(knight.satisfies(CharacterClass::KNIGHT_FAMILY));
        assert!(!knight.satisfies(CharacterClass::ARCANIST | CharacterClass::SPELLBINDER));
        assert_eq!(CharacterClass::WARLORD.family(), CharacterClass::KNIGHT_FAMILY);
        assert_eq!(CharacterClass::from_display_name("Spellbinder"), Some(CharacterClass::SPELLBINDER));
        assert_eq!(CharacterClass::from_display_name("Bard"), None);
        assert_eq!(CharacterClass::from_name("WARLORD"), Some(CharacterClass::WARLORD));
    }

    #[test]
    fn test_error_conversion() {
        let err: ArpgError = ConfigError::Invalid {
            field: "max_level",
            reason: "must be at least 1".to_string(),
        }
        .into();
        assert!(err.to_string().contains("max_level"));

        let err: ArpgError = CatalogError::DuplicateId(7).into();
        assert!(matches!(err, ArpgError::Catalog(CatalogError::DuplicateId(7))));
    }

    #[test]
    fn test_class_serialization() {
        let classes = CharacterClass::KNIGHT | CharacterClass::ARCANIST;
        let json = serde_json::to_string(&classes).expect("serialize");
        let loaded: CharacterClass = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(loaded, classes);
    }
}

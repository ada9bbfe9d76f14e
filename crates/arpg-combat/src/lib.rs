//! # ARPG Combat
//!
//! Entity combat and stats resolution for an action RPG.
//!
//! This crate provides the per-actor simulation core:
//! - Stat formulas and the derived-stat snapshot
//! - Modifier aggregation from equipment and buffs
//! - Buff ledger with restrictions, refresh and cooldowns
//! - Regeneration over time with fractional carry
//! - Combat resolution (block, defense, criticals, stun, skill damage)
//! - Combo tracking and the per-entity state machine
//! - Skills, equipment and dynamic difficulty
//! - The entity facade and a world that routes hits between entities
//! - Event bus for outbound notifications

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod buffs;
pub mod combat;
pub mod combo;
pub mod config;
pub mod difficulty;
pub mod entity;
pub mod equipment;
pub mod events;
pub mod formulas;
pub mod modifiers;
pub mod regen;
pub mod rng;
pub mod skills;
pub mod stat_id;
pub mod state_machine;
pub mod stats;
pub mod world;

/// Prelude for convenient imports
pub mod prelude {
    pub use arpg_common::prelude::*;

    pub use crate::buffs::*;
    pub use crate::combat::*;
    pub use crate::combo::*;
    pub use crate::config::*;
    pub use crate::difficulty::*;
    pub use crate::entity::*;
    pub use crate::equipment::*;
    pub use crate::events::*;
    pub use crate::formulas::{Attributes, DerivedStats, FormulaInputs, MinMax, Resistances};
    pub use crate::modifiers::*;
    pub use crate::regen::*;
    pub use crate::rng::*;
    pub use crate::skills::*;
    pub use crate::stat_id::*;
    pub use crate::state_machine::*;
    pub use crate::stats::*;
    pub use crate::world::*;
}

pub use prelude::*;

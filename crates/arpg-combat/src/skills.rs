//! Skills and their cooldowns.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use arpg_common::SkillId;

use crate::equipment::Equipment;
use crate::formulas::MinMax;
use crate::stat_id::Element;
use crate::stats::StatsEngine;

/// Weapon a skill needs equipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponRequirement {
    /// Usable with anything.
    #[default]
    None,
    /// Needs a blade.
    Blade,
    /// Needs a bow.
    Bow,
}

impl WeaponRequirement {
    /// Whether the equipment satisfies the requirement.
    #[must_use]
    pub fn is_met(self, equipment: &Equipment) -> bool {
        match self {
            Self::None => true,
            Self::Blade => equipment.is_using_blade(),
            Self::Bow => equipment.is_using_bow(),
        }
    }
}

/// Which of the attacker's damage ranges a skill adds to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageMode {
    /// Physical damage range.
    #[default]
    Regular,
    /// Magic damage range.
    Magic,
}

/// Static definition of a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// Unique ID.
    pub id: SkillId,
    /// Display name.
    pub name: String,
    /// Mana consumed.
    #[serde(default)]
    pub mana_cost: i32,
    /// Health consumed; never takes health below 1.
    #[serde(default)]
    pub blood_cost: i32,
    /// Cooldown in seconds.
    #[serde(default)]
    pub cooldown: f32,
    /// Weapon requirement.
    #[serde(default)]
    pub required_weapon: WeaponRequirement,
    /// Damage added to the attacker's range. Zero for non-attack skills.
    #[serde(default)]
    pub damage: MinMax,
    /// Damage range the skill builds on.
    #[serde(default)]
    pub damage_mode: DamageMode,
    /// Element for resistance.
    #[serde(default)]
    pub element: Option<Element>,
    /// Health restored on use.
    #[serde(default)]
    pub healing: i32,
}

impl SkillDefinition {
    /// Create a free, instant skill.
    #[must_use]
    pub fn new(id: SkillId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            mana_cost: 0,
            blood_cost: 0,
            cooldown: 0.0,
            required_weapon: WeaponRequirement::None,
            damage: MinMax::ZERO,
            damage_mode: DamageMode::Regular,
            element: None,
            healing: 0,
        }
    }

    /// Builder: mana cost.
    #[must_use]
    pub fn with_mana_cost(mut self, cost: i32) -> Self {
        self.mana_cost = cost;
        self
    }

    /// Builder: blood cost.
    #[must_use]
    pub fn with_blood_cost(mut self, cost: i32) -> Self {
        self.blood_cost = cost;
        self
    }

    /// Builder: cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: f32) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Builder: weapon requirement.
    #[must_use]
    pub fn requiring(mut self, weapon: WeaponRequirement) -> Self {
        self.required_weapon = weapon;
        self
    }

    /// Builder: damage.
    #[must_use]
    pub fn with_damage(mut self, min: i32, max: i32, mode: DamageMode) -> Self {
        self.damage = MinMax::new(min, max);
        self.damage_mode = mode;
        self
    }

    /// Builder: element.
    #[must_use]
    pub fn with_element(mut self, element: Element) -> Self {
        self.element = Some(element);
        self
    }

    /// Builder: healing.
    #[must_use]
    pub fn with_healing(mut self, healing: i32) -> Self {
        self.healing = healing;
        self
    }

    /// Whether the skill deals damage.
    #[must_use]
    pub fn is_attack(&self) -> bool {
        self.damage != MinMax::ZERO
    }
}

/// Why a skill cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillRejection {
    /// Nothing selected or unknown skill.
    NoSkill,
    /// Still cooling down.
    CoolingDown,
    /// Not enough mana.
    NotEnoughMana,
    /// Not enough health for the blood cost.
    NotEnoughHealth,
    /// Required weapon not equipped.
    WrongWeapon,
}

/// Known skills, the selected one, and cooldowns.
#[derive(Debug, Clone, Default)]
pub struct SkillBook {
    skills: Vec<SkillDefinition>,
    selected: Option<SkillId>,
    cooldowns: AHashMap<SkillId, f32>,
    /// Skip cooldown checks.
    pub ignore_cooldown: bool,
}

impl SkillBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Learns a skill. Returns false if already known.
    pub fn learn(&mut self, skill: SkillDefinition) -> bool {
        if self.get(skill.id).is_some() {
            return false;
        }
        if self.selected.is_none() {
            self.selected = Some(skill.id);
        }
        self.skills.push(skill);
        true
    }

    /// Known skills.
    #[must_use]
    pub fn skills(&self) -> &[SkillDefinition] {
        &self.skills
    }

    /// Skill by ID.
    #[must_use]
    pub fn get(&self, id: SkillId) -> Option<&SkillDefinition> {
        self.skills.iter().find(|s| s.id == id)
    }

    /// Selects a known skill.
    pub fn select(&mut self, id: SkillId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    /// Selected skill.
    #[must_use]
    pub fn selected(&self) -> Option<&SkillDefinition> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Remaining cooldown.
    #[must_use]
    pub fn cooldown(&self, id: SkillId) -> f32 {
        self.cooldowns.get(&id).copied().unwrap_or(0.0)
    }

    /// Checks whether the selected skill can be used.
    pub fn check(&self, stats: &StatsEngine, equipment: &Equipment) -> Result<&SkillDefinition, SkillRejection> {
        let skill = self.selected().ok_or(SkillRejection::NoSkill)?;
        if !self.ignore_cooldown && self.cooldown(skill.id) > 0.0 {
            return Err(SkillRejection::CoolingDown);
        }
        if skill.mana_cost > 0 && stats.mana() < skill.mana_cost {
            return Err(SkillRejection::NotEnoughMana);
        }
        if skill.blood_cost > 0 && stats.health() < skill.blood_cost {
            return Err(SkillRejection::NotEnoughHealth);
        }
        if !skill.required_weapon.is_met(equipment) {
            return Err(SkillRejection::WrongWeapon);
        }
        Ok(skill)
    }

    /// Whether the selected skill can be used.
    #[must_use]
    pub fn can_use(&self, stats: &StatsEngine, equipment: &Equipment) -> bool {
        self.check(stats, equipment).is_ok()
    }

    /// Pays the costs, applies healing and starts the cooldown.
    pub fn perform(
        &mut self,
        stats: &mut StatsEngine,
        equipment: &Equipment,
    ) -> Result<SkillDefinition, SkillRejection> {
        let skill = match self.check(stats, equipment) {
            Ok(skill) => skill.clone(),
            Err(reason) => {
                debug!("Skill rejected for {}: {:?}", stats.entity(), reason);
                return Err(reason);
            }
        };

        if skill.mana_cost > 0 {
            stats.set_mana((stats.mana() - skill.mana_cost).max(0));
        }
        if skill.blood_cost > 0 {
            stats.set_health((stats.health() - skill.blood_cost).max(1));
        }
        if skill.healing > 0 {
            stats.set_health(stats.health().saturating_add(skill.healing));
        }
        if skill.cooldown > 0.0 {
            self.cooldowns.insert(skill.id, skill.cooldown);
        }
        Ok(skill)
    }

    /// Advances cooldowns.
    pub fn tick(&mut self, dt: f32) {
        self.cooldowns.retain(|_, remaining| {
            *remaining -= dt;
            *remaining > 0.0
        });
    }
}

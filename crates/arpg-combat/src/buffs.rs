//! Buffs, debuffs and the per-entity buff ledger.
//!
//! This module provides:
//! - Buff definitions with stat contributions and application restrictions
//! - The ledger of active and cooling-down instances
//! - A catalog of definitions loaded from RON

use ahash::AHashMap;
use arpg_common::{ArpgResult, BuffId, CatalogError, CharacterClass, ItemId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::formulas::DerivedStats;
use crate::stat_id::{StatId, StatTable};

// ============================================================================
// Definitions
// ============================================================================

/// How an immunity item set is matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImmunityMode {
    /// Holding any listed item grants immunity.
    #[default]
    Any,
    /// Only holding every listed item grants immunity.
    All,
}

/// Debuff is ignored when `stat >= minimum`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResistanceThreshold {
    /// Stat compared.
    pub stat: StatId,
    /// Value at which the debuff is ignored.
    pub minimum: f32,
}

/// Conditions under which a buff may not be applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuffRestrictions {
    /// Items that grant immunity to this debuff.
    pub immunity_items: Vec<ItemId>,
    /// Matching mode for `immunity_items`.
    pub immunity_mode: ImmunityMode,
    /// Buffs that cannot be active at the same time.
    pub incompatible_with: Vec<BuffId>,
    /// Classes allowed to receive the buff (empty = all).
    pub allowed_classes: CharacterClass,
    /// Scenes in which the buff may be applied (empty = all).
    pub allowed_scenes: Vec<String>,
    /// Resistance thresholds that make the debuff ineffective.
    pub ignore_if_resistant: Vec<ResistanceThreshold>,
}

/// A temporary modifier bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffDefinition {
    /// Definition ID.
    pub id: BuffId,
    /// Display name.
    pub name: String,
    /// Seconds the buff stays active.
    #[serde(default = "default_duration")]
    pub duration: f32,
    /// Seconds after removal before it can be applied again.
    #[serde(default)]
    pub cooldown: f32,
    /// Whether this is a debuff.
    #[serde(default)]
    pub is_debuff: bool,
    /// Lasts until logout instead of `duration`.
    #[serde(default)]
    pub persistent: bool,
    /// May be reapplied while cooling down.
    #[serde(default)]
    pub allow_cooldown_bypass: bool,
    /// Stat contributions while active.
    #[serde(default)]
    pub modifiers: Vec<(StatId, f32)>,
    /// Application restrictions.
    #[serde(default)]
    pub restrictions: BuffRestrictions,
}

fn default_duration() -> f32 {
    5.0
}

impl BuffDefinition {
    /// Create a buff with the default 5 second duration.
    #[must_use]
    pub fn new(id: BuffId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            duration: default_duration(),
            cooldown: 0.0,
            is_debuff: false,
            persistent: false,
            allow_cooldown_bypass: false,
            modifiers: Vec::new(),
            restrictions: BuffRestrictions::default(),
        }
    }

    /// Mark as debuff.
    #[must_use]
    pub fn debuff(mut self) -> Self {
        self.is_debuff = true;
        self
    }

    /// Set duration.
    #[must_use]
    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    /// Set cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: f32) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Make the buff last until logout.
    #[must_use]
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// Add a stat contribution.
    #[must_use]
    pub fn with_modifier(mut self, stat: StatId, value: f32) -> Self {
        self.modifiers.push((stat, value));
        self
    }

    /// Replace restrictions.
    #[must_use]
    pub fn with_restrictions(mut self, restrictions: BuffRestrictions) -> Self {
        self.restrictions = restrictions;
        self
    }

    /// Timer value for a fresh or refreshed application.
    fn initial_remaining(&self) -> Option<f32> {
        if self.persistent {
            None
        } else {
            Some(self.duration)
        }
    }
}

// ============================================================================
// Instances
// ============================================================================

/// A buff applied to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffInstance {
    /// Definition this instance was created from.
    pub definition: BuffDefinition,
    /// Whether the instance contributes modifiers.
    pub active: bool,
    /// Seconds left while active; `None` lasts indefinitely.
    remaining_time: Option<f32>,
    /// Seconds left before the instance leaves the ledger.
    remaining_cooldown: f32,
}

impl BuffInstance {
    fn new(definition: BuffDefinition) -> Self {
        let remaining_time = definition.initial_remaining();
        Self {
            definition,
            active: true,
            remaining_time,
            remaining_cooldown: 0.0,
        }
    }

    /// Definition ID.
    #[must_use]
    pub fn id(&self) -> BuffId {
        self.definition.id
    }

    /// Seconds left while active (`f32::INFINITY` for persistent buffs).
    #[must_use]
    pub fn remaining_time(&self) -> f32 {
        self.remaining_time.unwrap_or(f32::INFINITY)
    }

    /// Seconds left on cooldown.
    #[must_use]
    pub fn remaining_cooldown(&self) -> f32 {
        self.remaining_cooldown
    }

    /// Whether this instance is waiting out its cooldown.
    #[must_use]
    pub fn is_cooling_down(&self) -> bool {
        !self.active && self.remaining_cooldown > 0.0
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.remaining_time = Some(0.0);
        self.remaining_cooldown = self.definition.cooldown;
    }

    fn activate(&mut self) {
        self.active = true;
        self.remaining_time = self.definition.initial_remaining();
        self.remaining_cooldown = 0.0;
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Everything about the target that restrictions look at.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    /// IDs of items the target holds.
    pub held_items: &'a [ItemId],
    /// Target class.
    pub class: CharacterClass,
    /// Current scene, if known.
    pub scene: Option<&'a str>,
    /// Target's derived stats; `None` if it has no stats engine.
    pub stats: Option<&'a DerivedStats>,
}

/// Why a buff application was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuffRejection {
    /// The target has no stats to modify.
    NoStats,
    /// An immunity item requirement is met.
    Immune,
    /// An incompatible buff is active.
    Incompatible(BuffId),
    /// The target's class is not allowed.
    ClassRestricted,
    /// The current scene is not allowed.
    SceneRestricted,
    /// A resistance threshold is met.
    Resisted(StatId),
    /// The previous instance is still cooling down.
    CoolingDown,
}

/// Result of [`BuffLedger::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuffApplyOutcome {
    /// A new or reactivated instance now contributes modifiers.
    Applied,
    /// An active instance had its timer refreshed.
    Refreshed,
    /// Nothing changed.
    Rejected(BuffRejection),
}

impl BuffApplyOutcome {
    /// Whether the buff is active after the call.
    #[must_use]
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// Whether modifier totals changed.
    #[must_use]
    pub fn changes_modifiers(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Buffs that changed state during a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuffTickReport {
    /// Instances whose active time ran out.
    pub expired: Vec<BuffId>,
    /// Instances that finished cooling down and left the ledger.
    pub cooled_down: Vec<BuffId>,
}

impl BuffTickReport {
    /// Whether modifier totals changed.
    #[must_use]
    pub fn changes_modifiers(&self) -> bool {
        !self.expired.is_empty()
    }
}

/// Active and cooling-down buff instances of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuffLedger {
    instances: Vec<BuffInstance>,
}

impl BuffLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instances, active or cooling down.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instance for a definition.
    #[must_use]
    pub fn get(&self, id: BuffId) -> Option<&BuffInstance> {
        self.instances.iter().find(|i| i.id() == id)
    }

    /// Whether a buff is currently active.
    #[must_use]
    pub fn is_active(&self, id: BuffId) -> bool {
        self.get(id).is_some_and(|i| i.active)
    }

    /// Active instances in application order.
    pub fn active(&self) -> impl Iterator<Item = &BuffInstance> {
        self.instances.iter().filter(|i| i.active)
    }

    /// Every instance in application order.
    pub fn instances(&self) -> &[BuffInstance] {
        &self.instances
    }

    /// Adds every active instance's contributions to `table`.
    pub fn accumulate(&self, table: &mut StatTable) {
        for instance in self.active() {
            for (stat, value) in &instance.definition.modifiers {
                table.add(*stat, *value);
            }
        }
    }

    /// Checks restrictions without touching the ledger.
    pub fn check(&self, def: &BuffDefinition, ctx: &ApplyContext<'_>) -> Result<(), BuffRejection> {
        let Some(stats) = ctx.stats else {
            return Err(BuffRejection::NoStats);
        };
        let rules = &def.restrictions;

        if def.is_debuff && !rules.immunity_items.is_empty() {
            let held = |id: &ItemId| ctx.held_items.contains(id);
            let immune = match rules.immunity_mode {
                ImmunityMode::Any => rules.immunity_items.iter().any(held),
                ImmunityMode::All => rules.immunity_items.iter().all(held),
            };
            if immune {
                return Err(BuffRejection::Immune);
            }
        }

        for other in self.active() {
            if other.id() == def.id {
                continue;
            }
            if rules.incompatible_with.contains(&other.id())
                || other.definition.restrictions.incompatible_with.contains(&def.id)
            {
                return Err(BuffRejection::Incompatible(other.id()));
            }
        }

        if !ctx.class.satisfies(rules.allowed_classes) {
            return Err(BuffRejection::ClassRestricted);
        }

        if !rules.allowed_scenes.is_empty()
            && !ctx
                .scene
                .is_some_and(|scene| rules.allowed_scenes.iter().any(|s| s == scene))
        {
            return Err(BuffRejection::SceneRestricted);
        }

        if def.is_debuff {
            if let Some(t) = rules
                .ignore_if_resistant
                .iter()
                .find(|t| stats.stat(t.stat) >= t.minimum)
            {
                return Err(BuffRejection::Resisted(t.stat));
            }
        }

        Ok(())
    }

    /// Applies a buff, refreshing an active instance instead of stacking.
    pub fn apply(&mut self, def: &BuffDefinition, ctx: &ApplyContext<'_>) -> BuffApplyOutcome {
        if let Err(reason) = self.check(def, ctx) {
            debug!("Buff {} ({}) rejected: {:?}", def.id, def.name, reason);
            return BuffApplyOutcome::Rejected(reason);
        }

        if let Some(instance) = self.instances.iter_mut().find(|i| i.id() == def.id) {
            if instance.active {
                instance.remaining_time = instance.definition.initial_remaining();
                return BuffApplyOutcome::Refreshed;
            }
            if instance.remaining_cooldown > 0.0 && !def.allow_cooldown_bypass {
                return BuffApplyOutcome::Rejected(BuffRejection::CoolingDown);
            }
            instance.definition = def.clone();
            instance.activate();
            return BuffApplyOutcome::Applied;
        }

        self.instances.push(BuffInstance::new(def.clone()));
        BuffApplyOutcome::Applied
    }

    /// Deactivates a buff and starts its cooldown. Returns false if it was not active.
    pub fn remove(&mut self, id: BuffId) -> bool {
        let Some(instance) = self.instances.iter_mut().find(|i| i.id() == id && i.active) else {
            return false;
        };
        instance.deactivate();
        self.instances.retain(|i| i.active || i.remaining_cooldown > 0.0);
        true
    }

    /// Advances timers; expired instances start cooling down, cooled ones leave.
    pub fn tick(&mut self, dt: f32) -> BuffTickReport {
        let mut report = BuffTickReport::default();

        for instance in &mut self.instances {
            if instance.active {
                if let Some(remaining) = instance.remaining_time.as_mut() {
                    *remaining -= dt;
                    if *remaining <= 0.0 {
                        instance.deactivate();
                        report.expired.push(instance.id());
                    }
                }
            } else {
                instance.remaining_cooldown -= dt;
            }
        }

        self.instances.retain(|i| {
            let keep = i.active || i.remaining_cooldown > 0.0;
            if !keep {
                report.cooled_down.push(i.id());
            }
            keep
        });

        report
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Buff definitions by ID.
#[derive(Debug, Clone, Default)]
pub struct BuffCatalog {
    definitions: AHashMap<BuffId, BuffDefinition>,
}

impl BuffCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a RON list of definitions.
    pub fn from_ron_str(contents: &str) -> ArpgResult<Self> {
        let list: Vec<BuffDefinition> =
            ron::from_str(contents).map_err(|e| CatalogError::Parse(e.to_string()))?;

        let mut catalog = Self::new();
        for def in list {
            catalog.insert(def)?;
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Adds a definition, rejecting duplicate IDs.
    pub fn insert(&mut self, def: BuffDefinition) -> Result<(), CatalogError> {
        if self.definitions.contains_key(&def.id) {
            return Err(CatalogError::DuplicateId(def.id.raw()));
        }
        self.definitions.insert(def.id, def);
        Ok(())
    }

    /// Checks that every incompatibility refers to a known buff.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for def in self.definitions.values() {
            if let Some(unknown) = def
                .restrictions
                .incompatible_with
                .iter()
                .find(|id| !self.definitions.contains_key(id))
            {
                return Err(CatalogError::UnknownId(unknown.raw()));
            }
        }
        Ok(())
    }

    /// Definition by ID.
    #[must_use]
    pub fn get(&self, id: BuffId) -> Option<&BuffDefinition> {
        self.definitions.get(&id)
    }

    /// All definitions, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &BuffDefinition> {
        self.definitions.values()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

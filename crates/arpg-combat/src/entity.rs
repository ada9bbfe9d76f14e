//! Entity facade.
//!
//! An [`Entity`] exclusively owns its stats, buffs, equipment, skills, combo
//! state and state machine. External collaborators (AI, input, UI) drive it
//! through the commands here and read it through the queries. Interactions
//! between two entities are routed by [`crate::world::CombatWorld`], which
//! calls into attacker and defender in turn.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use arpg_common::{BuffId, CharacterClass, EntityId, SkillId};

use crate::buffs::{ApplyContext, BuffApplyOutcome, BuffDefinition, BuffLedger};
use crate::combat::{CombatResolver, DefenderView, HitOutcome};
use crate::combo::{ComboProfile, ComboState, ComboStep};
use crate::config::GameConfig;
use crate::difficulty::DifficultyMultipliers;
use crate::equipment::{EquipRejection, Equipment, EquipmentSlot, Item, ItemKind};
use crate::events::{AttackKind, CombatEvent, Notifier};
use crate::formulas::Attributes;
use crate::modifiers::ModifierAggregator;
use crate::rng::CombatRng;
use crate::skills::{SkillBook, SkillDefinition};
use crate::state_machine::{EntityState, EntityStateMachine, HitPoint, StateKind, Transition};
use crate::stats::{StatFlags, StatsEngine};

/// Simulation time and frame counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    /// Seconds since the simulation started.
    pub now: f64,
    /// Frames since the simulation started.
    pub tick: u64,
}

impl SimClock {
    /// Advances by one frame.
    pub fn advance(&mut self, dt: f32) {
        self.now += f64::from(dt);
        self.tick += 1;
    }
}

/// Which side an entity fights for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    /// Player-controlled.
    Player,
    /// Hostile AI.
    #[default]
    Enemy,
}

/// Who dealt a hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackerInfo {
    /// Attacker ID.
    pub id: EntityId,
    /// Attacker position.
    pub position: Vec3,
    /// Attacker's stun chance.
    pub stun_chance: f32,
}

/// A hit produced at an attack's hit point, ready to be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct Strike {
    /// Attacker.
    pub attacker: AttackerInfo,
    /// Intended target.
    pub target: Option<EntityId>,
    /// Reach of the strike.
    pub reach: f32,
    /// Attack tag.
    pub kind: AttackKind,
    /// Damage before mitigation, for regular attacks.
    pub amount: i32,
    /// Critical flag, for regular attacks.
    pub critical: bool,
    /// Skill whose damage is computed against the defender.
    pub skill: Option<SkillDefinition>,
}

/// A combat actor.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    name: String,
    team: Team,
    class: CharacterClass,
    /// World position.
    pub position: Vec3,
    move_speed: f32,
    can_move: bool,
    use_skill: bool,
    target: Option<EntityId>,
    target_position: Option<Vec3>,
    last_hit_time: Option<f64>,
    damaged_by: Vec<EntityId>,
    defeat_pending: bool,
    stats: StatsEngine,
    buffs: BuffLedger,
    equipment: Equipment,
    skills: SkillBook,
    combo: ComboState,
    states: EntityStateMachine,
    notifier: Notifier,
}

impl Entity {
    /// Creates an entity with full health and mana.
    #[must_use]
    pub fn new(name: impl Into<String>, attributes: Attributes, level: i32, config: &GameConfig) -> Self {
        let id = EntityId::new();
        Self {
            id,
            name: name.into(),
            team: Team::Enemy,
            class: CharacterClass::empty(),
            position: Vec3::ZERO,
            move_speed: config.move_speed,
            can_move: true,
            use_skill: false,
            target: None,
            target_position: None,
            last_hit_time: None,
            damaged_by: Vec::new(),
            defeat_pending: false,
            stats: StatsEngine::new(id, attributes, level, config),
            buffs: BuffLedger::new(),
            equipment: Equipment::new(),
            skills: SkillBook::new(),
            combo: ComboState::new(),
            states: EntityStateMachine::new(),
            notifier: Notifier::detached(),
        }
    }

    /// Builder: team.
    #[must_use]
    pub fn with_team(mut self, team: Team) -> Self {
        self.team = team;
        self
    }

    /// Builder: class.
    #[must_use]
    pub fn with_class(mut self, class: CharacterClass) -> Self {
        self.class = class;
        self
    }

    /// Builder: position.
    #[must_use]
    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Builder: movement speed.
    #[must_use]
    pub fn with_move_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }

    /// Routes notifications into a bus.
    pub fn set_notifier(&mut self, notifier: Notifier) {
        self.stats.set_notifier(notifier.clone());
        self.notifier = notifier;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Entity ID.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Team.
    #[must_use]
    pub fn team(&self) -> Team {
        self.team
    }

    /// Class.
    #[must_use]
    pub fn class(&self) -> CharacterClass {
        self.class
    }

    /// Whether dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.states.is_dead()
    }

    /// Whether attacking or using a skill.
    #[must_use]
    pub fn is_attacking(&self) -> bool {
        self.states.is_attacking()
    }

    /// Whether blocking.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.states.is_blocking()
    }

    /// Whether stunned.
    #[must_use]
    pub fn is_stunned(&self) -> bool {
        self.states.is_stunned()
    }

    /// Whether movement commands are honored.
    #[must_use]
    pub fn can_move(&self) -> bool {
        self.can_move
    }

    /// Enables or disables movement commands.
    pub fn set_can_move(&mut self, can_move: bool) {
        self.can_move = can_move;
    }

    /// Current state kind.
    #[must_use]
    pub fn state(&self) -> StateKind {
        self.states.kind()
    }

    /// Current target.
    #[must_use]
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Last known target position.
    #[must_use]
    pub fn target_position(&self) -> Option<Vec3> {
        self.target_position
    }

    /// Distance to the target, if there is one.
    #[must_use]
    pub fn distance_to_target(&self) -> Option<f32> {
        self.target_position.map(|p| self.position.distance(p))
    }

    /// Attack reach from the equipped weapon.
    #[must_use]
    pub fn attack_distance(&self, config: &GameConfig) -> f32 {
        self.equipment.attack_distance(config.base_attack_distance)
    }

    /// Whether the target is within attack reach.
    #[must_use]
    pub fn is_close_to_target(&self, config: &GameConfig) -> bool {
        self.distance_to_target()
            .is_some_and(|d| d <= self.attack_distance(config))
    }

    /// Whether the selected skill will be used by the next attack.
    #[must_use]
    pub fn uses_skill(&self) -> bool {
        self.use_skill
    }

    /// Stats.
    #[must_use]
    pub fn stats(&self) -> &StatsEngine {
        &self.stats
    }

    /// Buffs.
    #[must_use]
    pub fn buffs(&self) -> &BuffLedger {
        &self.buffs
    }

    /// Equipment.
    #[must_use]
    pub fn equipment(&self) -> &Equipment {
        &self.equipment
    }

    /// Skills.
    #[must_use]
    pub fn skills(&self) -> &SkillBook {
        &self.skills
    }

    /// Combo state.
    #[must_use]
    pub fn combo(&self) -> &ComboState {
        &self.combo
    }

    /// Entities that damaged this one since it last revived.
    #[must_use]
    pub fn damaged_by(&self) -> &[EntityId] {
        &self.damaged_by
    }

    /// Takes the list of entities owed defeat credit, once per death.
    pub fn take_defeat(&mut self) -> Option<Vec<EntityId>> {
        if !self.defeat_pending {
            return None;
        }
        self.defeat_pending = false;
        Some(self.damaged_by.clone())
    }

    // ========================================================================
    // Stats passthrough
    // ========================================================================

    /// Adds experience. Returns levels gained.
    pub fn add_experience(&mut self, amount: i32, config: &GameConfig) -> i32 {
        self.stats.add_experience(amount, config)
    }

    /// Grants defeat credit once per defeated entity.
    pub fn on_defeat_entity(&mut self, defeated: EntityId, level: i32, config: &GameConfig) -> bool {
        self.stats.on_defeat_entity(defeated, level, config)
    }

    /// Spends points on attributes.
    pub fn bulk_distribute(
        &mut self,
        strength: i32,
        dexterity: i32,
        vitality: i32,
        energy: i32,
        config: &GameConfig,
    ) {
        self.stats
            .bulk_distribute(strength, dexterity, vitality, energy, config);
    }

    /// Overwrites base attributes and points.
    pub fn bulk_update(&mut self, attributes: Attributes, points: i32, config: &GameConfig) {
        self.stats.bulk_update(attributes, points, config);
    }

    /// Replaces the stat flags and recalculates.
    pub fn set_stat_flags(&mut self, flags: StatFlags, config: &GameConfig) {
        self.stats.flags = flags;
        self.stats.recalculate(config);
    }

    /// Sets the unarmed combo limits.
    pub fn set_base_combo(&mut self, combo: ComboProfile, config: &GameConfig) {
        self.stats.set_base_combo(combo, config);
    }

    /// Marks the entity as affected by dynamic difficulty.
    pub fn set_difficulty_scaled(&mut self, scaled: bool, config: &GameConfig) {
        self.stats.set_difficulty_scaled(scaled, config);
    }

    /// Applies new difficulty multipliers.
    pub fn set_difficulty(&mut self, multipliers: DifficultyMultipliers, config: &GameConfig) {
        self.stats.set_difficulty(multipliers, config);
    }

    fn refresh_modifiers(&mut self, config: &GameConfig) {
        let snapshot = ModifierAggregator::aggregate(&self.equipment, &self.buffs);
        self.stats.set_modifiers(snapshot, config);
    }

    // ========================================================================
    // Equipment, buffs, skills
    // ========================================================================

    /// Equips an item and recalculates.
    pub fn equip(
        &mut self,
        slot: EquipmentSlot,
        item: Item,
        config: &GameConfig,
    ) -> Result<Option<Item>, EquipRejection> {
        let previous = self.equipment.equip(slot, item)?;
        self.refresh_modifiers(config);
        Ok(previous)
    }

    /// Unequips a slot and recalculates.
    pub fn unequip(&mut self, slot: EquipmentSlot, config: &GameConfig) -> Vec<Item> {
        let removed = self.equipment.unequip(slot);
        if !removed.is_empty() {
            self.refresh_modifiers(config);
        }
        removed
    }

    /// Applies a buff or debuff.
    pub fn apply_buff(
        &mut self,
        definition: &BuffDefinition,
        scene: Option<&str>,
        config: &GameConfig,
    ) -> BuffApplyOutcome {
        let held = self.equipment.item_ids();
        let ctx = ApplyContext {
            held_items: &held,
            class: self.class,
            scene,
            stats: Some(self.stats.derived()),
        };
        let outcome = self.buffs.apply(definition, &ctx);

        match outcome {
            BuffApplyOutcome::Applied => self.notifier.publish(CombatEvent::BuffApplied {
                entity: self.id,
                buff: definition.id,
            }),
            BuffApplyOutcome::Refreshed => self.notifier.publish(CombatEvent::BuffRefreshed {
                entity: self.id,
                buff: definition.id,
            }),
            BuffApplyOutcome::Rejected(_) => {}
        }
        if outcome.changes_modifiers() {
            self.refresh_modifiers(config);
        }
        outcome
    }

    /// Removes an active buff and starts its cooldown.
    pub fn remove_buff(&mut self, id: BuffId, config: &GameConfig) -> bool {
        if !self.buffs.remove(id) {
            return false;
        }
        self.notifier.publish(CombatEvent::BuffRemoved {
            entity: self.id,
            buff: id,
        });
        self.refresh_modifiers(config);
        true
    }

    /// Learns a skill.
    pub fn learn_skill(&mut self, skill: SkillDefinition) -> bool {
        self.skills.learn(skill)
    }

    /// Selects a known skill.
    pub fn select_skill(&mut self, id: SkillId) -> bool {
        self.skills.select(id)
    }

    /// Whether the next attack uses the selected skill.
    pub fn set_use_skill(&mut self, use_skill: bool) {
        self.use_skill = use_skill;
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn transition(&mut self, next: EntityState) -> bool {
        match self.states.change_to(next) {
            Some(t) => {
                self.publish_transition(t);
                true
            }
            None => false,
        }
    }

    fn publish_transition(&self, t: Transition) {
        if t.from != t.to {
            self.notifier.publish(CombatEvent::StateChanged {
                entity: self.id,
                from: t.from,
                to: t.to,
            });
        }
    }

    /// Sets the target. Setting the same target again is a no-op.
    pub fn set_target(&mut self, target: Option<EntityId>, position: Option<Vec3>) {
        if self.target == target {
            self.target_position = position;
            return;
        }
        self.target = target;
        self.target_position = position;
        self.notifier.publish(CombatEvent::TargetSet {
            entity: self.id,
            target,
        });
    }

    /// Updates the tracked target position.
    pub fn update_target_position(&mut self, position: Option<Vec3>) {
        self.target_position = position;
    }

    /// Walks to a point.
    pub fn move_to(&mut self, destination: Vec3, config: &GameConfig) -> bool {
        if !self.can_move || !self.states.accepts_movement() {
            return false;
        }
        if self.position.distance(destination) <= config.min_distance_to_move {
            return false;
        }
        self.transition(EntityState::MoveToDestination { destination })
    }

    /// Targets an entity and attacks it, closing distance first if needed.
    pub fn move_to_attack(
        &mut self,
        target: EntityId,
        target_position: Vec3,
        clock: SimClock,
        config: &GameConfig,
    ) -> bool {
        if (self.is_attacking() && !self.combo.is_active()) || !self.can_move || self.is_dead() {
            return false;
        }
        self.set_target(Some(target), Some(target_position));

        if !self.is_close_to_target(config) {
            if !self.states.accepts_movement() {
                return false;
            }
            return self.transition(EntityState::MoveToAttack);
        }
        self.attack(clock, config)
    }

    /// Attacks without a target.
    pub fn free_attack(&mut self, clock: SimClock, config: &GameConfig) -> bool {
        self.set_target(None, None);
        self.attack(clock, config)
    }

    /// Starts an attack or skill, or continues a combo.
    ///
    /// Ignored while dead, blocking or stunned, and while attacking outside
    /// the combo window.
    pub fn attack(&mut self, clock: SimClock, config: &GameConfig) -> bool {
        if !self.states.accepts_attack() {
            return false;
        }

        let combo = self.stats.derived().combo;
        self.combo.expire_if_stale(clock.now, combo.time_to_stop);
        let attack_speed = self.stats.derived().attack_speed;

        if self.use_skill && !self.is_attacking() && self.skills.can_use(&self.stats, &self.equipment) {
            if let Ok(skill) = self.skills.perform(&mut self.stats, &self.equipment) {
                let duration = config.skill_duration(attack_speed);
                self.transition(EntityState::use_skill(
                    skill.id,
                    duration,
                    config.animation.hit_point,
                ));
                self.notifier.publish(CombatEvent::SkillPerformed {
                    entity: self.id,
                    skill: skill.id,
                });
                self.notifier.publish(CombatEvent::AttackPerformed {
                    entity: self.id,
                    kind: AttackKind::Skill,
                    combo_index: self.combo.index,
                });
                return true;
            }
        }

        if !self.is_attacking() || self.combo.can_perform_next(clock.now, combo.next_combo_delay) {
            self.combo.register_attack(clock.now);
            let duration = config.attack_duration(self.combo.index, attack_speed);
            self.transition(EntityState::attack(duration, config.animation.hit_point));
            self.notifier.publish(CombatEvent::AttackPerformed {
                entity: self.id,
                kind: self.weapon_attack_kind(),
                combo_index: self.combo.index,
            });
            return true;
        }
        false
    }

    fn weapon_attack_kind(&self) -> AttackKind {
        match self.equipment.weapon().map(|w| w.kind) {
            Some(ItemKind::Blade { .. } | ItemKind::Bow { .. }) => AttackKind::Weapon,
            _ => AttackKind::Melee,
        }
    }

    /// Stops whatever the entity is doing.
    pub fn stand_still(&mut self) {
        self.transition(EntityState::Idle);
    }

    /// Takes a physical hit.
    pub fn damage(
        &mut self,
        attacker: Option<AttackerInfo>,
        amount: i32,
        critical: bool,
        clock: SimClock,
        rng: &mut dyn CombatRng,
        config: &GameConfig,
    ) -> HitOutcome {
        let derived = self.stats.derived();
        let view = DefenderView {
            dead: self.is_dead(),
            attacking: self.is_attacking(),
            last_hit_time: self.last_hit_time,
            health: self.stats.health(),
            defense: derived.defense,
            chance_to_block: derived.chance_to_block,
            immune_to_stun: self.stats.flags.immune_to_stun,
        };
        let stun_chance = attacker.map_or(0.0, |a| a.stun_chance);
        let outcome = CombatResolver::resolve_hit(&view, amount, stun_chance, clock.now, rng, config);

        match outcome {
            HitOutcome::Ignored => {}
            HitOutcome::Blocked => {
                let duration = config.block_duration(self.stats.derived().block_speed);
                self.transition(EntityState::Block {
                    remaining: duration,
                });
                self.notifier.publish(CombatEvent::Blocked {
                    entity: self.id,
                    attacker: attacker.map(|a| a.id),
                });
            }
            HitOutcome::Damaged {
                amount, stunned, ..
            } => {
                self.stats.set_health(self.stats.health() - amount);
                self.last_hit_time = Some(clock.now);
                if let Some(a) = attacker {
                    if !self.damaged_by.contains(&a.id) {
                        self.damaged_by.push(a.id);
                    }
                }
                self.notifier.publish(CombatEvent::DamageTaken {
                    entity: self.id,
                    amount,
                    source_position: attacker.map_or(self.position, |a| a.position),
                    critical,
                    attacker: attacker.map(|a| a.id),
                });

                if self.stats.health() == 0 {
                    self.die();
                } else if stunned {
                    self.stun(config);
                }
            }
        }
        outcome
    }

    fn stun(&mut self, config: &GameConfig) {
        if self.stats.flags.immune_to_stun {
            return;
        }
        let duration = config.stun_duration(self.stats.derived().stun_speed);
        if self.transition(EntityState::Stunned {
            remaining: duration,
        }) {
            self.combo.cancel();
            self.notifier.publish(CombatEvent::Stunned { entity: self.id });
        }
    }

    /// Takes magic damage reduced by magic resistance. Returns damage dealt.
    pub fn take_magic_damage(&mut self, amount: i32, origin: Option<EntityId>) -> i32 {
        if self.is_dead() {
            return 0;
        }
        let dealt = CombatResolver::mitigate_magic(amount, self.stats.derived().magic_resistance);
        self.stats.set_health(self.stats.health() - dealt);
        if let Some(origin) = origin {
            if !self.damaged_by.contains(&origin) {
                self.damaged_by.push(origin);
            }
        }
        self.notifier.publish(CombatEvent::DamageTaken {
            entity: self.id,
            amount: dealt,
            source_position: self.position,
            critical: false,
            attacker: origin,
        });
        if self.stats.health() == 0 {
            self.die();
        }
        dealt
    }

    /// Kills the entity. Returns false if already dead.
    pub fn die(&mut self) -> bool {
        if self.is_dead() {
            return false;
        }
        self.stats.set_health(0);
        self.combo.cancel();
        let Some(t) = self.states.die() else {
            return false;
        };
        self.publish_transition(t);
        self.defeat_pending = true;

        info!("{} ({}) died", self.name, self.id);
        self.notifier.publish(CombatEvent::Died {
            entity: self.id,
            damaged_by: self.damaged_by.clone(),
        });
        true
    }

    /// Brings a dead entity back at full health. No-op when alive.
    pub fn revive(&mut self) -> bool {
        let Some(t) = self.states.revive() else {
            return false;
        };
        self.stats.revitalize();
        self.damaged_by.clear();
        self.defeat_pending = false;
        self.last_hit_time = None;
        self.publish_transition(t);

        info!("{} ({}) revived", self.name, self.id);
        self.notifier.publish(CombatEvent::Revived { entity: self.id });
        true
    }

    /// Advances the combo after a connected hit.
    pub fn increment_combo(&mut self, clock: SimClock) -> ComboStep {
        let max = self.stats.derived().combo.max_combos;
        let step = self.combo.increment(clock.now, clock.tick, max);
        match step {
            ComboStep::Ignored => {}
            ComboStep::Advanced(index) => self.notifier.publish(CombatEvent::ComboAdvanced {
                entity: self.id,
                index,
            }),
            ComboStep::Completed => self.notifier.publish(CombatEvent::ComboAdvanced {
                entity: self.id,
                index: 0,
            }),
        }
        step
    }

    /// Drops the current combo.
    pub fn cancel_combo(&mut self) {
        self.combo.cancel();
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Advances buffs, skill cooldowns and regeneration.
    pub fn tick_timers(&mut self, dt: f32, config: &GameConfig) {
        let report = self.buffs.tick(dt);
        for buff in &report.expired {
            self.notifier.publish(CombatEvent::BuffExpired {
                entity: self.id,
                buff: *buff,
            });
        }
        if report.changes_modifiers() {
            self.refresh_modifiers(config);
        }

        self.skills.tick(dt);

        if !self.is_dead() {
            self.stats.tick_regen(dt, config);
            if self.stats.health() == 0 {
                debug!("{} drained to zero health", self.id);
                self.die();
            }
        }
    }

    /// Advances the state machine, movement and combo expiry. Returns a hit
    /// point reached this frame.
    pub fn tick_actions(&mut self, dt: f32, clock: SimClock, config: &GameConfig) -> Option<HitPoint> {
        if self.is_dead() {
            return None;
        }

        let step = self.states.tick(dt);
        if let Some(t) = step.returned_to_idle {
            self.publish_transition(t);
        }

        if self
            .combo
            .expire_if_stale(clock.now, self.stats.derived().combo.time_to_stop)
        {
            debug!("{} combo expired", self.id);
        }

        match *self.states.state() {
            EntityState::MoveToDestination { destination } => {
                if self.step_towards(destination, dt, config.min_distance_to_move) {
                    self.transition(EntityState::Idle);
                }
            }
            EntityState::MoveToAttack => match self.target_position {
                None => {
                    self.transition(EntityState::Idle);
                }
                Some(position) => {
                    let reach = self.attack_distance(config);
                    if self.step_towards(position, dt, reach) {
                        self.transition(EntityState::Idle);
                        self.attack(clock, config);
                    }
                }
            },
            _ => {}
        }

        step.hit
    }

    /// Timers then actions, for an entity simulated on its own.
    pub fn tick(&mut self, dt: f32, clock: SimClock, config: &GameConfig) -> Option<HitPoint> {
        self.tick_timers(dt, config);
        self.tick_actions(dt, clock, config)
    }

    /// Moves straight toward `point`, stopping `stop_distance` short. Returns
    /// true once within that distance.
    fn step_towards(&mut self, point: Vec3, dt: f32, stop_distance: f32) -> bool {
        let offset = point - self.position;
        let distance = offset.length();
        if distance <= stop_distance {
            return true;
        }
        let travel = self.move_speed * dt;
        let remaining = distance - stop_distance;
        if travel >= remaining {
            self.position += offset / distance * remaining;
            return true;
        }
        self.position += offset / distance * travel;
        false
    }

    /// Builds the strike for a hit point reached this frame.
    pub fn strike(&self, hit: HitPoint, rng: &mut dyn CombatRng, config: &GameConfig) -> Option<Strike> {
        if self.is_dead() {
            return None;
        }
        let attacker = AttackerInfo {
            id: self.id,
            position: self.position,
            stun_chance: self.stats.derived().stun_chance,
        };
        let reach = self.attack_distance(config);

        match hit {
            HitPoint::Attack => {
                let (amount, critical) = self.stats.damage_roll(rng, config);
                Some(Strike {
                    attacker,
                    target: self.target,
                    reach,
                    kind: self.weapon_attack_kind(),
                    amount,
                    critical,
                    skill: None,
                })
            }
            HitPoint::Skill(id) => {
                let skill = self.skills.get(id).filter(|s| s.is_attack())?;
                Some(Strike {
                    attacker,
                    target: self.target,
                    reach,
                    kind: AttackKind::Skill,
                    amount: 0,
                    critical: false,
                    skill: Some(skill.clone()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::rng::SequenceRng;
    use crate::stat_id::StatId;
    use arpg_common::ItemId;

    fn config() -> GameConfig {
        GameConfig::default()
    }

    fn clock(now: f64, tick: u64) -> SimClock {
        SimClock { now, tick }
    }

    fn fighter(config: &GameConfig) -> Entity {
        Entity::new("Fighter", Attributes::default(), 1, config)
    }

    fn attacker_at(position: Vec3) -> AttackerInfo {
        AttackerInfo {
            id: EntityId::from_raw(9_000),
            position,
            stun_chance: 0.0,
        }
    }

    #[test]
    fn test_attack_enters_state() {
        let config = config();
        let mut e = fighter(&config);
        assert!(e.attack(clock(0.0, 0), &config));
        assert!(e.is_attacking());
        // Second press outside the combo window is absorbed.
        assert!(!e.attack(clock(0.1, 1), &config));
    }

    #[test]
    fn test_attack_ignored_while_stunned_or_dead() {
        let config = config();
        let mut e = fighter(&config);
        e.states.change_to(EntityState::Stunned { remaining: 1.0 });
        assert!(!e.attack(clock(0.0, 0), &config));

        e.die();
        assert!(!e.attack(clock(0.0, 0), &config));
    }

    #[test]
    fn test_hit_point_then_idle() {
        let config = config();
        let mut e = fighter(&config);
        e.attack(clock(0.0, 0), &config);

        let mut hits = 0;
        let mut c = clock(0.0, 0);
        for _ in 0..120 {
            c.advance(1.0 / 60.0);
            if e.tick(1.0 / 60.0, c, &config).is_some() {
                hits += 1;
            }
        }
        assert_eq!(hits, 1);
        assert_eq!(e.state(), StateKind::Idle);
    }

    #[test]
    fn test_scenario_defense_reduces_hit() {
        let config = config();
        let mut e = fighter(&config);
        e.equip(
            EquipmentSlot::Chest,
            Item::new(ItemId::new(1), "Plate", ItemKind::Armor(EquipmentSlot::Chest)).with_defense(17),
            &config,
        )
        .expect("chest");
        assert_eq!(e.stats().derived().defense, 20);

        let mut rng = SequenceRng::never();
        let before = e.stats().health();
        let outcome = e.damage(Some(attacker_at(Vec3::X)), 15, false, clock(1.0, 60), &mut rng, &config);
        assert!(matches!(outcome, HitOutcome::Damaged { amount: 5, .. }));
        assert_eq!(e.stats().health(), before - 5);
        assert_eq!(e.damaged_by().len(), 1);
    }

    #[test]
    fn test_rehit_window() {
        let config = config();
        let mut e = fighter(&config);
        let mut rng = SequenceRng::never();
        e.damage(None, 5, false, clock(1.0, 60), &mut rng, &config);
        let health = e.stats().health();
        let outcome = e.damage(None, 5, false, clock(1.05, 63), &mut rng, &config);
        assert_eq!(outcome, HitOutcome::Ignored);
        assert_eq!(e.stats().health(), health);
    }

    #[test]
    fn test_scenario_death_and_revive() {
        let config = config();
        let bus = EventBus::new(64);
        let mut e = fighter(&config);
        e.set_notifier(Notifier::new(bus.sender()));
        let mut rng = SequenceRng::never();

        e.damage(Some(attacker_at(Vec3::ZERO)), 1_000, false, clock(1.0, 60), &mut rng, &config);
        assert!(e.is_dead());
        assert_eq!(e.stats().health(), 0);
        assert_eq!(e.take_defeat().map(|v| v.len()), Some(1));
        assert!(e.take_defeat().is_none());

        // Dead entities ignore damage.
        assert_eq!(
            e.damage(None, 5, false, clock(5.0, 300), &mut rng, &config),
            HitOutcome::Ignored
        );

        assert!(e.revive());
        assert_eq!(e.state(), StateKind::Idle);
        assert_eq!(e.stats().health(), e.stats().max_health());
        assert!(e.damaged_by().is_empty());

        let events = bus.drain();
        assert!(events.iter().any(|ev| matches!(ev, CombatEvent::Died { .. })));
        assert!(events.iter().any(|ev| matches!(ev, CombatEvent::Revived { .. })));
    }

    #[test]
    fn test_regen_drain_to_zero_dies() {
        let config = config();
        let bus = EventBus::new(4096);
        let mut e = fighter(&config);
        e.set_notifier(Notifier::new(bus.sender()));
        let bleed = BuffDefinition::new(BuffId::new(4), "Bleed")
            .debuff()
            .with_duration(30.0)
            .with_modifier(StatId::HealthRegenPerSecond, -50.0);
        assert!(e.apply_buff(&bleed, None, &config).is_accepted());

        for _ in 0..600 {
            e.tick_timers(1.0 / 60.0, &config);
        }

        assert_eq!(e.stats().health(), 0);
        assert!(e.is_dead());
        assert_eq!(e.state(), StateKind::Dead);
        assert_eq!(e.take_defeat(), Some(Vec::new()));
        assert!(bus
            .drain()
            .iter()
            .any(|ev| matches!(ev, CombatEvent::Died { .. })));
    }

    #[test]
    fn test_block_enters_block_state() {
        let config = config();
        let mut e = fighter(&config);
        e.equip(
            EquipmentSlot::LeftHand,
            Item::new(
                ItemId::new(2),
                "Tower Shield",
                ItemKind::Shield {
                    chance_to_block: 100.0,
                },
            ),
            &config,
        )
        .expect("shield");
        let mut rng = SequenceRng::always();
        let health = e.stats().health();
        let outcome = e.damage(Some(attacker_at(Vec3::X)), 10, false, clock(1.0, 60), &mut rng, &config);
        assert_eq!(outcome, HitOutcome::Blocked);
        assert!(e.is_blocking());
        assert_eq!(e.stats().health(), health);
    }

    #[test]
    fn test_stun_unless_immune() {
        let config = config();
        let mut e = fighter(&config);
        let attacker = AttackerInfo {
            stun_chance: 1.0,
            ..attacker_at(Vec3::X)
        };
        let mut rng = SequenceRng::constant(0.5);
        e.damage(Some(attacker), 5, false, clock(1.0, 60), &mut rng, &config);
        assert!(e.is_stunned());

        let mut immune = fighter(&config);
        immune.set_stat_flags(
            StatFlags {
                immune_to_stun: true,
                ..StatFlags::default()
            },
            &config,
        );
        immune.damage(Some(attacker), 5, false, clock(1.0, 60), &mut rng, &config);
        assert!(!immune.is_stunned());
    }

    #[test]
    fn test_magic_damage() {
        let config = config();
        let mut e = fighter(&config);
        let health = e.stats().health();
        assert_eq!(e.take_magic_damage(7, None), 7);
        assert_eq!(e.stats().health(), health - 7);
        e.take_magic_damage(1_000, None);
        assert!(e.is_dead());
        assert_eq!(e.take_magic_damage(5, None), 0);
    }

    #[test]
    fn test_move_to_reaches_destination() {
        let config = config();
        let mut e = fighter(&config);
        assert!(!e.move_to(Vec3::new(0.1, 0.0, 0.0), &config));
        assert!(e.move_to(Vec3::new(4.0, 0.0, 0.0), &config));
        assert_eq!(e.state(), StateKind::MoveToDestination);

        let mut c = SimClock::default();
        for _ in 0..120 {
            c.advance(1.0 / 60.0);
            e.tick(1.0 / 60.0, c, &config);
        }
        assert_eq!(e.state(), StateKind::Idle);
        assert!(e.position.distance(Vec3::new(4.0, 0.0, 0.0)) <= config.min_distance_to_move + 0.001);
    }

    #[test]
    fn test_cannot_move_suppresses_commands() {
        let config = config();
        let mut e = fighter(&config);
        e.set_can_move(false);
        assert!(!e.move_to(Vec3::new(5.0, 0.0, 0.0), &config));
        assert!(!e.move_to_attack(EntityId::from_raw(5), Vec3::new(5.0, 0.0, 0.0), clock(0.0, 0), &config));
        assert_eq!(e.state(), StateKind::Idle);
    }

    #[test]
    fn test_move_to_attack_closes_then_attacks() {
        let config = config();
        let mut e = fighter(&config);
        let foe = EntityId::from_raw(77);
        let foe_pos = Vec3::new(3.0, 0.0, 0.0);
        assert!(e.move_to_attack(foe, foe_pos, clock(0.0, 0), &config));
        assert_eq!(e.state(), StateKind::MoveToAttack);

        let mut c = SimClock::default();
        for _ in 0..60 {
            c.advance(1.0 / 60.0);
            e.tick(1.0 / 60.0, c, &config);
            if e.is_attacking() {
                break;
            }
        }
        assert!(e.is_attacking());
        let distance = e.distance_to_target().expect("target");
        assert!(distance <= config.base_attack_distance + 0.001);
    }

    #[test]
    fn test_buff_changes_stats_and_reverts() {
        let config = config();
        let mut e = fighter(&config);
        let before = e.stats().derived().clone();
        let buff = BuffDefinition::new(BuffId::new(1), "Might")
            .with_modifier(StatId::Strength, 16.0)
            .with_duration(2.0)
            .with_cooldown(1.0);

        assert_eq!(e.apply_buff(&buff, None, &config), BuffApplyOutcome::Applied);
        assert_eq!(e.stats().attributes().strength, 36);
        assert_eq!(e.apply_buff(&buff, None, &config), BuffApplyOutcome::Refreshed);
        assert_eq!(e.stats().attributes().strength, 36);

        assert!(e.remove_buff(BuffId::new(1), &config));
        assert_eq!(e.stats().derived(), &before);
        assert!(!e.remove_buff(BuffId::new(1), &config));
    }

    #[test]
    fn test_buff_expires_on_tick() {
        let config = config();
        let mut e = fighter(&config);
        let buff = BuffDefinition::new(BuffId::new(2), "Haste")
            .with_modifier(StatId::Vitality, 10.0)
            .with_duration(0.5);
        e.apply_buff(&buff, None, &config);
        assert_eq!(e.stats().max_health(), 60);
        e.tick_timers(1.0, &config);
        assert_eq!(e.stats().max_health(), 40);
        assert!(e.stats().health() <= 40);
    }

    #[test]
    fn test_scenario_immunity_items_block_debuff() {
        let config = config();
        let mut e = fighter(&config);
        e.equip(
            EquipmentSlot::Amulet,
            Item::new(ItemId::new(10), "Ward", ItemKind::Accessory(EquipmentSlot::Amulet)),
            &config,
        )
        .expect("amulet");
        e.equip(
            EquipmentSlot::Ring,
            Item::new(ItemId::new(11), "Seal", ItemKind::Accessory(EquipmentSlot::Ring)),
            &config,
        )
        .expect("ring");

        let poison = BuffDefinition::new(BuffId::new(3), "Poison")
            .debuff()
            .with_modifier(StatId::HealthRegenPerSecond, -2.0)
            .with_restrictions(crate::buffs::BuffRestrictions {
                immunity_items: vec![ItemId::new(10), ItemId::new(11)],
                immunity_mode: crate::buffs::ImmunityMode::All,
                ..Default::default()
            });
        let outcome = e.apply_buff(&poison, None, &config);
        assert!(!outcome.is_accepted());
        assert!(e.buffs().is_empty());
        assert!(e.stats().snapshot().additive.is_zero());
    }

    #[test]
    fn test_combo_chain() {
        let config = config();
        let mut e = fighter(&config);
        e.set_base_combo(ComboProfile::new(3, 1.0, 0.1), &config);

        assert!(e.attack(clock(0.0, 0), &config));
        assert_eq!(e.increment_combo(clock(0.4, 24)), ComboStep::Advanced(1));
        // Same tick again is ignored.
        assert_eq!(e.increment_combo(clock(0.4, 24)), ComboStep::Ignored);

        // Still attacking, but past the next-combo delay.
        assert!(e.attack(clock(0.6, 36), &config));
        assert_eq!(e.increment_combo(clock(0.9, 54)), ComboStep::Advanced(2));
        assert!(e.attack(clock(1.1, 66), &config));
        assert_eq!(e.increment_combo(clock(1.4, 84)), ComboStep::Completed);
        assert_eq!(e.combo().index, 0);
        assert!(!e.combo().is_active());
    }

    #[test]
    fn test_skill_attack_pays_mana() {
        let config = config();
        let mut e = fighter(&config);
        e.learn_skill(
            SkillDefinition::new(SkillId::new(1), "Arc")
                .with_mana_cost(10)
                .with_damage(5, 5, crate::skills::DamageMode::Magic),
        );
        e.set_use_skill(true);
        assert!(e.attack(clock(0.0, 0), &config));
        assert_eq!(e.state(), StateKind::UseSkill);
        assert_eq!(e.stats().mana(), 15);
    }

    #[test]
    fn test_strike_kinds() {
        let config = config();
        let mut e = fighter(&config);
        let mut rng = SequenceRng::never();
        let strike = e.strike(HitPoint::Attack, &mut rng, &config).expect("strike");
        assert_eq!(strike.kind, AttackKind::Melee);

        e.equip(
            EquipmentSlot::RightHand,
            Item::new(ItemId::new(4), "Sword", ItemKind::Blade { two_handed: false }).with_damage(3, 6),
            &config,
        )
        .expect("sword");
        let strike = e.strike(HitPoint::Attack, &mut rng, &config).expect("strike");
        assert_eq!(strike.kind, AttackKind::Weapon);
    }
}

//! Combat world.
//!
//! [`CombatWorld`] owns every entity and routes interactions between them by
//! ID, so a hit never needs two live mutable borrows of the entity table.
//! One call to [`CombatWorld::tick`] advances the whole simulation one frame.

use ahash::AHashMap;
use glam::Vec3;
use tracing::{debug, info};

use arpg_common::{BuffId, EntityId};

use crate::buffs::{BuffApplyOutcome, BuffDefinition, BuffRejection};
use crate::combat::{CombatResolver, HitOutcome};
use crate::config::GameConfig;
use crate::difficulty::{DifficultyChange, DifficultyTracker};
use crate::entity::{AttackerInfo, Entity, SimClock, Strike, Team};
use crate::events::{CombatEvent, EventBus, EventHandler, Notifier};
use crate::rng::{CombatRng, FastRng};
use crate::state_machine::HitPoint;

/// All entities of one encounter plus the shared clock, rng and event bus.
pub struct CombatWorld {
    config: GameConfig,
    entities: AHashMap<EntityId, Entity>,
    order: Vec<EntityId>,
    bus: EventBus,
    rng: Box<dyn CombatRng + Send>,
    difficulty: DifficultyTracker,
    scene: Option<String>,
    clock: SimClock,
}

impl CombatWorld {
    /// Create a world with a system-seeded rng.
    #[must_use]
    pub fn new(config: GameConfig) -> Self {
        Self::with_rng(config, FastRng::new())
    }

    /// Create a world whose rolls replay for the same seed.
    #[must_use]
    pub fn seeded(config: GameConfig, seed: u64) -> Self {
        Self::with_rng(config, FastRng::seeded(seed))
    }

    /// Create a world with a custom rng.
    #[must_use]
    pub fn with_rng(config: GameConfig, rng: impl CombatRng + Send + 'static) -> Self {
        Self {
            config,
            entities: AHashMap::new(),
            order: Vec::new(),
            bus: EventBus::default(),
            rng: Box::new(rng),
            difficulty: DifficultyTracker::new(),
            scene: None,
            clock: SimClock::default(),
        }
    }

    /// Game configuration.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Simulation clock.
    #[must_use]
    pub fn clock(&self) -> SimClock {
        self.clock
    }

    /// Difficulty state.
    #[must_use]
    pub fn difficulty(&self) -> &DifficultyTracker {
        &self.difficulty
    }

    /// Current scene, used by scene-restricted buffs.
    #[must_use]
    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    /// Sets the current scene.
    pub fn set_scene(&mut self, scene: Option<String>) {
        self.scene = scene;
    }

    /// Event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Drains pending events.
    pub fn drain_events(&self) -> Vec<CombatEvent> {
        self.bus.drain()
    }

    /// Drains pending events into a handler.
    pub fn dispatch(&self, handler: &dyn EventHandler) -> usize {
        self.bus.dispatch(handler)
    }

    // ========================================================================
    // Entity table
    // ========================================================================

    /// Adds an entity, wiring it to the bus and current difficulty.
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        let id = entity.id();
        entity.set_notifier(Notifier::new(self.bus.sender()));
        entity.set_difficulty(self.difficulty.multipliers, &self.config);

        debug!("Spawned {} ({})", entity.name(), id);
        if self.entities.insert(id, entity).is_none() {
            self.order.push(id);
        }
        id
    }

    /// Removes an entity. Targets pointing at it are cleared on the next tick.
    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.order.retain(|e| *e != id);
        Some(entity)
    }

    /// Entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the world is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entities in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    fn position_of(&self, id: EntityId) -> Option<Vec3> {
        self.entities.get(&id).map(|e| e.position)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Starts or continues an attack.
    pub fn attack(&mut self, id: EntityId) -> bool {
        let clock = self.clock;
        match self.entities.get_mut(&id) {
            Some(e) => e.attack(clock, &self.config),
            None => false,
        }
    }

    /// Attacks without a target.
    pub fn free_attack(&mut self, id: EntityId) -> bool {
        let clock = self.clock;
        match self.entities.get_mut(&id) {
            Some(e) => e.free_attack(clock, &self.config),
            None => false,
        }
    }

    /// Walks to a point.
    pub fn move_to(&mut self, id: EntityId, destination: Vec3) -> bool {
        match self.entities.get_mut(&id) {
            Some(e) => e.move_to(destination, &self.config),
            None => false,
        }
    }

    /// Targets `target` and attacks it, closing distance first.
    pub fn move_to_attack(&mut self, id: EntityId, target: EntityId) -> bool {
        if id == target {
            return false;
        }
        let Some(target_position) = self.position_of(target) else {
            return false;
        };
        let clock = self.clock;
        match self.entities.get_mut(&id) {
            Some(e) => e.move_to_attack(target, target_position, clock, &self.config),
            None => false,
        }
    }

    /// Sets or clears a target.
    pub fn set_target(&mut self, id: EntityId, target: Option<EntityId>) {
        let position = target.and_then(|t| self.position_of(t));
        let target = target.filter(|_| position.is_some());
        if let Some(e) = self.entities.get_mut(&id) {
            e.set_target(target, position);
        }
    }

    /// Stops whatever the entity is doing.
    pub fn stand_still(&mut self, id: EntityId) {
        if let Some(e) = self.entities.get_mut(&id) {
            e.stand_still();
        }
    }

    /// Delivers a physical hit. The attacker is optional; missing defenders
    /// ignore the hit.
    pub fn damage(
        &mut self,
        attacker: Option<EntityId>,
        defender: EntityId,
        amount: i32,
        critical: bool,
    ) -> HitOutcome {
        let info = attacker.and_then(|a| self.entities.get(&a)).map(|a| AttackerInfo {
            id: a.id(),
            position: a.position,
            stun_chance: a.stats().derived().stun_chance,
        });
        let clock = self.clock;
        match self.entities.get_mut(&defender) {
            Some(e) => e.damage(info, amount, critical, clock, &mut *self.rng, &self.config),
            None => HitOutcome::Ignored,
        }
    }

    /// Delivers magic damage. Returns damage dealt.
    pub fn take_magic_damage(&mut self, id: EntityId, amount: i32, origin: Option<EntityId>) -> i32 {
        self.entities
            .get_mut(&id)
            .map_or(0, |e| e.take_magic_damage(amount, origin))
    }

    /// Kills an entity.
    pub fn die(&mut self, id: EntityId) -> bool {
        self.entities.get_mut(&id).is_some_and(Entity::die)
    }

    /// Revives a dead entity.
    pub fn revive(&mut self, id: EntityId) -> bool {
        self.entities.get_mut(&id).is_some_and(Entity::revive)
    }

    /// Applies a buff in the current scene.
    pub fn apply_buff(&mut self, id: EntityId, definition: &BuffDefinition) -> BuffApplyOutcome {
        match self.entities.get_mut(&id) {
            Some(e) => e.apply_buff(definition, self.scene.as_deref(), &self.config),
            None => BuffApplyOutcome::Rejected(BuffRejection::NoStats),
        }
    }

    /// Removes an active buff.
    pub fn remove_buff(&mut self, id: EntityId, buff: BuffId) -> bool {
        match self.entities.get_mut(&id) {
            Some(e) => e.remove_buff(buff, &self.config),
            None => false,
        }
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Advances the simulation one frame.
    pub fn tick(&mut self, dt: f32) {
        self.clock.advance(dt);
        let clock = self.clock;

        for id in &self.order {
            if let Some(e) = self.entities.get_mut(id) {
                e.tick_timers(dt, &self.config);
            }
        }

        self.refresh_targets();

        let mut hits = Vec::new();
        for id in &self.order {
            if let Some(e) = self.entities.get_mut(id) {
                if let Some(hit) = e.tick_actions(dt, clock, &self.config) {
                    hits.push((*id, hit));
                }
            }
        }

        for (attacker, hit) in hits {
            self.resolve_hit_point(attacker, hit);
        }

        self.settle_defeats();
    }

    fn refresh_targets(&mut self) {
        let positions: AHashMap<EntityId, Vec3> = self
            .entities
            .iter()
            .map(|(id, e)| (*id, e.position))
            .collect();

        for e in self.entities.values_mut() {
            let Some(target) = e.target() else {
                continue;
            };
            match positions.get(&target) {
                Some(p) => e.update_target_position(Some(*p)),
                None => e.set_target(None, None),
            }
        }
    }

    fn resolve_hit_point(&mut self, attacker: EntityId, hit: HitPoint) {
        let Some(strike) = self
            .entities
            .get(&attacker)
            .and_then(|a| a.strike(hit, &mut *self.rng, &self.config))
        else {
            return;
        };
        let Some(defender) = self.struck_defender(&strike) else {
            return;
        };

        let (amount, critical) = match &strike.skill {
            Some(skill) => {
                let (Some(a), Some(d)) = (self.entities.get(&attacker), self.entities.get(&defender)) else {
                    return;
                };
                CombatResolver::skill_damage(
                    a.stats().derived(),
                    skill,
                    d.stats().derived().magic_resistance,
                    &d.stats().derived().resistances,
                    &mut *self.rng,
                    &self.config,
                )
            }
            None => (strike.amount, strike.critical),
        };

        let clock = self.clock;
        let outcome = match self.entities.get_mut(&defender) {
            Some(d) => d.damage(
                Some(strike.attacker),
                amount,
                critical,
                clock,
                &mut *self.rng,
                &self.config,
            ),
            None => return,
        };

        if matches!(outcome, HitOutcome::Damaged { .. }) {
            if let Some(a) = self.entities.get_mut(&attacker) {
                a.increment_combo(clock);
            }
        }
    }

    /// The target of a strike if it is alive and within reach.
    fn struck_defender(&self, strike: &Strike) -> Option<EntityId> {
        let target = strike.target?;
        if target == strike.attacker.id {
            return None;
        }
        let defender = self.entities.get(&target)?;
        if defender.is_dead() {
            return None;
        }
        let distance = strike.attacker.position.distance(defender.position);
        // Small slack for float error after stepping exactly to the reach edge.
        (distance <= strike.reach + 0.01).then_some(target)
    }

    fn settle_defeats(&mut self) {
        let mut defeats = Vec::new();
        for id in &self.order {
            if let Some(e) = self.entities.get_mut(id) {
                if let Some(credit) = e.take_defeat() {
                    defeats.push((*id, e.team(), e.stats().level(), credit));
                }
            }
        }

        let mut change = DifficultyChange::Unchanged;
        for (defeated, team, level, credit) in defeats {
            let mut by_player = false;
            for attacker in credit {
                if let Some(a) = self.entities.get_mut(&attacker) {
                    by_player |= a.team() == Team::Player;
                    a.on_defeat_entity(defeated, level, &self.config);
                }
            }

            let step = match team {
                Team::Player => self.difficulty.record_player_death(),
                Team::Enemy if by_player => self.difficulty.record_enemy_defeated(),
                Team::Enemy => DifficultyChange::Unchanged,
            };
            if step != DifficultyChange::Unchanged {
                change = step;
            }
        }

        if change != DifficultyChange::Unchanged {
            info!("Applying difficulty change: {:?}", change);
            let multipliers = self.difficulty.multipliers;
            for id in &self.order {
                if let Some(e) = self.entities.get_mut(id) {
                    e.set_difficulty(multipliers, &self.config);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equipment::{EquipmentSlot, Item, ItemKind};
    use crate::formulas::Attributes;
    use crate::rng::SequenceRng;
    use crate::skills::{DamageMode, SkillDefinition};
    use crate::state_machine::StateKind;
    use arpg_common::{ItemId, SkillId};

    const DT: f32 = 1.0 / 60.0;

    fn hero(config: &GameConfig) -> Entity {
        let mut e = Entity::new("Hero", Attributes::default(), 1, config).with_team(Team::Player);
        e.equip(
            EquipmentSlot::RightHand,
            Item::new(ItemId::new(1), "Sword", ItemKind::Blade { two_handed: false }).with_damage(3, 6),
            config,
        )
        .expect("sword");
        e
    }

    fn goblin(config: &GameConfig, at: Vec3) -> Entity {
        Entity::new("Goblin", Attributes::default(), 1, config)
            .with_team(Team::Enemy)
            .at(at)
    }

    /// Keeps issuing attack commands until the defender dies or time runs out.
    fn fight(world: &mut CombatWorld, attacker: EntityId, defender: EntityId, seconds: f32) {
        let frames = (seconds / DT) as usize;
        for _ in 0..frames {
            if world.get(defender).map_or(true, Entity::is_dead) {
                break;
            }
            if world.get(attacker).is_some_and(|a| a.state() == StateKind::Idle) {
                world.move_to_attack(attacker, defender);
            }
            world.tick(DT);
        }
    }

    #[test]
    fn test_spawn_preserves_order() {
        let config = GameConfig::default();
        let mut world = CombatWorld::seeded(config.clone(), 1);
        let a = world.spawn(hero(&config));
        let b = world.spawn(goblin(&config, Vec3::X));
        let ids: Vec<_> = world.iter().map(Entity::id).collect();
        assert_eq!(ids, vec![a, b]);

        assert!(world.despawn(a).is_some());
        assert_eq!(world.len(), 1);
        assert!(world.despawn(a).is_none());
    }

    #[test]
    fn test_missing_entities_are_noops() {
        let config = GameConfig::default();
        let mut world = CombatWorld::seeded(config, 1);
        let ghost = EntityId::from_raw(123_456);
        assert!(!world.attack(ghost));
        assert!(!world.move_to_attack(ghost, ghost));
        assert_eq!(world.damage(None, ghost, 10, false), HitOutcome::Ignored);
        assert_eq!(world.take_magic_damage(ghost, 10, None), 0);
        assert!(!world.apply_buff(ghost, &BuffDefinition::new(BuffId::new(1), "x")).is_accepted());
    }

    #[test]
    fn test_duel_kills_and_credits() {
        let config = GameConfig::default();
        let mut world = CombatWorld::seeded(config.clone(), 42);
        let player = world.spawn(hero(&config));
        let enemy = world.spawn(goblin(&config, Vec3::new(3.0, 0.0, 0.0)));

        fight(&mut world, player, enemy, 60.0);

        let goblin = world.get(enemy).expect("enemy");
        assert!(goblin.is_dead());
        assert_eq!(goblin.damaged_by(), &[player]);

        let hero = world.get(player).expect("player");
        assert!(hero.stats().has_defeated(enemy));
        assert_eq!(hero.stats().experience(), config.base_enemy_defeat_experience);

        let events = world.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, CombatEvent::DamageTaken { entity, .. } if *entity == enemy)));
        assert!(events
            .iter()
            .any(|e| matches!(e, CombatEvent::Died { entity, .. } if *entity == enemy)));
        assert_eq!(world.difficulty().enemies_defeated, 1);
    }

    #[test]
    fn test_defeat_credit_once() {
        let config = GameConfig::default();
        let mut world = CombatWorld::seeded(config.clone(), 7);
        let player = world.spawn(hero(&config));
        let enemy = world.spawn(goblin(&config, Vec3::X));

        world.damage(Some(player), enemy, 1_000, false);
        world.tick(DT);
        world.revive(enemy);
        world.tick(1.0);
        world.damage(Some(player), enemy, 1_000, false);
        world.tick(DT);

        let hero = world.get(player).expect("player");
        assert_eq!(hero.stats().experience(), config.base_enemy_defeat_experience);
    }

    #[test]
    fn test_player_deaths_lower_difficulty() {
        let config = GameConfig::default();
        let mut world = CombatWorld::seeded(config.clone(), 3);
        let player = world.spawn(hero(&config));
        let mut scaled = goblin(&config, Vec3::X);
        scaled.set_difficulty_scaled(true, &config);
        let enemy = world.spawn(scaled);

        for _ in 0..DifficultyTracker::DEATHS_TO_DECREASE {
            world.die(player);
            world.tick(DT);
            world.revive(player);
        }

        assert!(world.difficulty().multipliers.strength < 1.0);
        let goblin = world.get(enemy).expect("enemy");
        assert_eq!(goblin.stats().attributes().strength, 16);
        assert_eq!(goblin.stats().base_attributes().strength, 20);
        // Unscaled entities keep their attributes.
        let hero = world.get(player).expect("player");
        assert_eq!(hero.stats().attributes().strength, 20);
    }

    #[test]
    fn test_difficulty_change_follows_spawn_order() {
        let config = GameConfig::default();
        let mut world = CombatWorld::seeded(config.clone(), 11);
        let player = world.spawn(hero(&config));
        let goblins: Vec<EntityId> = (0..8)
            .map(|i| {
                let mut g = goblin(&config, Vec3::new(5.0 + i as f32, 0.0, 0.0));
                g.set_difficulty_scaled(true, &config);
                world.spawn(g)
            })
            .collect();

        for _ in 1..DifficultyTracker::DEATHS_TO_DECREASE {
            world.die(player);
            world.tick(DT);
            world.revive(player);
        }
        world.die(player);
        world.drain_events();
        world.tick(DT);

        let recalculated: Vec<EntityId> = world
            .drain_events()
            .iter()
            .filter(|e| matches!(e, CombatEvent::StatsRecalculated { .. }))
            .map(CombatEvent::entity)
            .filter(|id| goblins.contains(id))
            .collect();
        assert_eq!(recalculated, goblins);
    }

    #[test]
    fn test_out_of_reach_strike_misses() {
        let config = GameConfig::default();
        let mut world = CombatWorld::seeded(config.clone(), 5);
        let player = world.spawn(hero(&config));
        let enemy = world.spawn(goblin(&config, Vec3::new(0.5, 0.0, 0.0)));

        assert!(world.move_to_attack(player, enemy));
        // Enemy walks away before the hit point.
        world.get_mut(enemy).expect("enemy").position = Vec3::new(10.0, 0.0, 0.0);
        for _ in 0..60 {
            world.tick(DT);
        }
        let goblin = world.get(enemy).expect("enemy");
        assert_eq!(goblin.stats().health(), goblin.stats().max_health());
    }

    #[test]
    fn test_skill_hit_uses_skill_damage() {
        let config = GameConfig::default();
        // Crit rolls fail at 0.0, then the range roll picks the low bound.
        let mut world = CombatWorld::with_rng(config.clone(), SequenceRng::constant(0.0));
        let mut caster = hero(&config);
        caster.learn_skill(
            SkillDefinition::new(SkillId::new(1), "Firebolt")
                .with_mana_cost(5)
                .with_damage(10, 10, DamageMode::Magic),
        );
        caster.set_use_skill(true);
        let caster = world.spawn(caster);
        let enemy = world.spawn(goblin(&config, Vec3::new(0.5, 0.0, 0.0)));

        assert!(world.move_to_attack(caster, enemy));
        assert_eq!(world.get(caster).map(Entity::state), Some(StateKind::UseSkill));
        for _ in 0..90 {
            world.tick(DT);
        }

        // Magic range 2..5 plus 10, low bound 12, minus half of 3 defense.
        let goblin = world.get(enemy).expect("enemy");
        assert_eq!(goblin.stats().health(), goblin.stats().max_health() - 11);
        assert_eq!(world.get(caster).map(|c| c.stats().mana()), Some(20));
    }
}

//! Outbound combat notifications.
//!
//! The engine publishes to a bounded channel and never waits on consumers.
//! Animation, audio, UI and logging collaborators drain the bus at their
//! own pace; when the bus is full new events are dropped.

use crossbeam_channel::{bounded, Receiver, Sender};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use arpg_common::{BuffId, EntityId, SkillId};

use crate::state_machine::StateKind;

/// Tag describing how an attack was performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackKind {
    /// Armed attack with a blade or bow.
    Weapon,
    /// Unarmed attack.
    Melee,
    /// Skill use.
    Skill,
}

/// Event types published by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    /// An attack or skill started.
    AttackPerformed {
        /// Attacker
        entity: EntityId,
        /// Attack tag
        kind: AttackKind,
        /// Combo index at the start of the attack
        combo_index: u32,
    },
    /// Damage was taken.
    DamageTaken {
        /// Defender
        entity: EntityId,
        /// Damage after mitigation
        amount: i32,
        /// Where the hit came from
        source_position: Vec3,
        /// Critical hit
        critical: bool,
        /// Attacker, if any
        attacker: Option<EntityId>,
    },
    /// A hit was blocked.
    Blocked {
        /// Defender
        entity: EntityId,
        /// Attacker, if any
        attacker: Option<EntityId>,
    },
    /// Entity was stunned.
    Stunned {
        /// Entity ID
        entity: EntityId,
    },
    /// Entity died.
    Died {
        /// Entity ID
        entity: EntityId,
        /// Entities that damaged it
        damaged_by: Vec<EntityId>,
    },
    /// Entity was revived.
    Revived {
        /// Entity ID
        entity: EntityId,
    },
    /// Target changed.
    TargetSet {
        /// Entity ID
        entity: EntityId,
        /// New target
        target: Option<EntityId>,
    },
    /// Level gained.
    LevelUp {
        /// Entity ID
        entity: EntityId,
        /// New level
        level: i32,
        /// Unspent points after the level-up
        available_points: i32,
    },
    /// Derived stats were recomputed.
    StatsRecalculated {
        /// Entity ID
        entity: EntityId,
    },
    /// Health changed.
    HealthChanged {
        /// Entity ID
        entity: EntityId,
        /// Current health
        health: i32,
        /// Maximum health
        max_health: i32,
    },
    /// Mana changed.
    ManaChanged {
        /// Entity ID
        entity: EntityId,
        /// Current mana
        mana: i32,
        /// Maximum mana
        max_mana: i32,
    },
    /// Experience changed.
    ExperienceChanged {
        /// Entity ID
        entity: EntityId,
        /// Current experience
        experience: i32,
        /// Experience needed for the next level
        next_level_experience: i32,
    },
    /// Currency earned.
    CurrencyGained {
        /// Entity ID
        entity: EntityId,
        /// Amount earned
        amount: i64,
        /// New balance
        total: i64,
    },
    /// A buff was applied.
    BuffApplied {
        /// Entity ID
        entity: EntityId,
        /// Buff ID
        buff: BuffId,
    },
    /// An active buff's timer was refreshed.
    BuffRefreshed {
        /// Entity ID
        entity: EntityId,
        /// Buff ID
        buff: BuffId,
    },
    /// A buff was removed before expiring.
    BuffRemoved {
        /// Entity ID
        entity: EntityId,
        /// Buff ID
        buff: BuffId,
    },
    /// A buff expired.
    BuffExpired {
        /// Entity ID
        entity: EntityId,
        /// Buff ID
        buff: BuffId,
    },
    /// State machine transition.
    StateChanged {
        /// Entity ID
        entity: EntityId,
        /// Previous state
        from: StateKind,
        /// New state
        to: StateKind,
    },
    /// Combo advanced; an index of zero means the chain completed.
    ComboAdvanced {
        /// Entity ID
        entity: EntityId,
        /// New combo index
        index: u32,
    },
    /// A skill was performed.
    SkillPerformed {
        /// Entity ID
        entity: EntityId,
        /// Skill ID
        skill: SkillId,
    },
}

impl CombatEvent {
    /// Entity the event is about.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        match self {
            Self::AttackPerformed { entity, .. }
            | Self::DamageTaken { entity, .. }
            | Self::Blocked { entity, .. }
            | Self::Stunned { entity }
            | Self::Died { entity, .. }
            | Self::Revived { entity }
            | Self::TargetSet { entity, .. }
            | Self::LevelUp { entity, .. }
            | Self::StatsRecalculated { entity }
            | Self::HealthChanged { entity, .. }
            | Self::ManaChanged { entity, .. }
            | Self::ExperienceChanged { entity, .. }
            | Self::CurrencyGained { entity, .. }
            | Self::BuffApplied { entity, .. }
            | Self::BuffRefreshed { entity, .. }
            | Self::BuffRemoved { entity, .. }
            | Self::BuffExpired { entity, .. }
            | Self::StateChanged { entity, .. }
            | Self::ComboAdvanced { entity, .. }
            | Self::SkillPerformed { entity, .. } => *entity,
        }
    }
}

/// Event bus for broadcasting combat events.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<CombatEvent>,
    receiver: Receiver<CombatEvent>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: CombatEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<CombatEvent> {
        self.receiver.try_iter().collect()
    }

    /// Drains pending events into a handler.
    pub fn dispatch(&self, handler: &dyn EventHandler) -> usize {
        let mut count = 0;
        for event in self.receiver.try_iter() {
            handler.handle(&event);
            count += 1;
        }
        count
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<CombatEvent> {
        self.sender.clone()
    }
}

/// Typed event handler trait.
pub trait EventHandler: Send + Sync {
    /// Handles an event.
    fn handle(&self, event: &CombatEvent);
}

/// Entity-scoped publisher. Without a sender every publish is a no-op.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    sender: Option<Sender<CombatEvent>>,
}

impl Notifier {
    /// Notifier publishing into a bus.
    #[must_use]
    pub fn new(sender: Sender<CombatEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Notifier that discards everything.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Whether events go anywhere.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.sender.is_some()
    }

    /// Publishes an event if attached.
    pub fn publish(&self, event: CombatEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.try_send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(8);
        let entity = EntityId::from_raw(1);
        bus.publish(CombatEvent::Stunned { entity });
        bus.publish(CombatEvent::Revived { entity });
        assert_eq!(bus.pending_count(), 2);

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], CombatEvent::Stunned { entity });
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops() {
        let bus = EventBus::new(2);
        let entity = EntityId::from_raw(1);
        for _ in 0..5 {
            bus.publish(CombatEvent::StatsRecalculated { entity });
        }
        assert_eq!(bus.pending_count(), bus.capacity());
    }

    #[test]
    fn test_detached_notifier_is_silent() {
        let notifier = Notifier::detached();
        assert!(!notifier.is_attached());
        notifier.publish(CombatEvent::Revived {
            entity: EntityId::from_raw(1),
        });
    }

    #[test]
    fn test_notifier_reaches_bus() {
        let bus = EventBus::new(4);
        let notifier = Notifier::new(bus.sender());
        let entity = EntityId::from_raw(7);
        notifier.publish(CombatEvent::TargetSet {
            entity,
            target: None,
        });
        let events = bus.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entity(), entity);
    }

    #[test]
    fn test_dispatch_to_handler() {
        struct Recorder(Mutex<Vec<CombatEvent>>);
        impl EventHandler for Recorder {
            fn handle(&self, event: &CombatEvent) {
                if let Ok(mut events) = self.0.lock() {
                    events.push(event.clone());
                }
            }
        }

        let bus = EventBus::new(4);
        let entity = EntityId::from_raw(2);
        bus.publish(CombatEvent::Died {
            entity,
            damaged_by: vec![],
        });
        let recorder = Recorder(Mutex::new(Vec::new()));
        assert_eq!(bus.dispatch(&recorder), 1);
        assert_eq!(recorder.0.lock().map(|e| e.len()).unwrap_or(0), 1);
    }

    #[test]
    fn test_event_serializes_to_json() {
        let event = CombatEvent::DamageTaken {
            entity: EntityId::from_raw(3),
            amount: 5,
            source_position: Vec3::new(1.0, 0.0, 2.0),
            critical: true,
            attacker: Some(EntityId::from_raw(4)),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("DamageTaken"));
        let back: CombatEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }
}

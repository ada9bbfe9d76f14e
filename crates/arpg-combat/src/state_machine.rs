//! Entity state machine.
//!
//! Exactly one state is active at a time. Timed states carry their own
//! remaining duration, decremented by [`EntityStateMachine::tick`]; there
//! is no suspended timer to cancel. Dead is terminal until revived.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use arpg_common::SkillId;

/// Fieldless mirror of [`EntityState`] for queries and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// Doing nothing.
    Idle,
    /// Walking to a point.
    MoveToDestination,
    /// Closing distance to the target.
    MoveToAttack,
    /// Attack animation.
    Attack,
    /// Skill animation.
    UseSkill,
    /// Blocking a hit.
    Block,
    /// Stunned by a hit.
    Stunned,
    /// Dead.
    Dead,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::MoveToDestination => "move_to_destination",
            Self::MoveToAttack => "move_to_attack",
            Self::Attack => "attack",
            Self::UseSkill => "use_skill",
            Self::Block => "block",
            Self::Stunned => "stunned",
            Self::Dead => "dead",
        };
        f.write_str(name)
    }
}

/// Current state with its timers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum EntityState {
    /// Doing nothing.
    #[default]
    Idle,
    /// Walking to a point.
    MoveToDestination {
        /// Where to stop.
        destination: Vec3,
    },
    /// Closing distance to the current target.
    MoveToAttack,
    /// Attack animation.
    Attack {
        /// Seconds until the state ends.
        remaining: f32,
        /// Seconds until the hit lands; `None` once it has.
        hit_in: Option<f32>,
    },
    /// Skill animation.
    UseSkill {
        /// Skill being performed.
        skill: SkillId,
        /// Seconds until the state ends.
        remaining: f32,
        /// Seconds until the hit lands; `None` once it has.
        hit_in: Option<f32>,
    },
    /// Blocking a hit.
    Block {
        /// Seconds until the state ends.
        remaining: f32,
    },
    /// Stunned.
    Stunned {
        /// Seconds until the state ends.
        remaining: f32,
    },
    /// Dead.
    Dead,
}

impl EntityState {
    /// Attack state with the hit at `hit_point` (fraction of the duration).
    #[must_use]
    pub fn attack(duration: f32, hit_point: f32) -> Self {
        Self::Attack {
            remaining: duration,
            hit_in: Some(duration * hit_point),
        }
    }

    /// Skill state with the hit at `hit_point` (fraction of the duration).
    #[must_use]
    pub fn use_skill(skill: SkillId, duration: f32, hit_point: f32) -> Self {
        Self::UseSkill {
            skill,
            remaining: duration,
            hit_in: Some(duration * hit_point),
        }
    }

    /// Kind of this state.
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::Idle => StateKind::Idle,
            Self::MoveToDestination { .. } => StateKind::MoveToDestination,
            Self::MoveToAttack => StateKind::MoveToAttack,
            Self::Attack { .. } => StateKind::Attack,
            Self::UseSkill { .. } => StateKind::UseSkill,
            Self::Block { .. } => StateKind::Block,
            Self::Stunned { .. } => StateKind::Stunned,
            Self::Dead => StateKind::Dead,
        }
    }
}

/// A hit point reached during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPoint {
    /// Regular attack.
    Attack,
    /// Skill attack.
    Skill(SkillId),
}

/// A state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Previous state.
    pub from: StateKind,
    /// New state.
    pub to: StateKind,
}

/// What happened during one [`EntityStateMachine::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateTick {
    /// Hit point reached this tick.
    pub hit: Option<HitPoint>,
    /// Timed state ended and returned to idle.
    pub returned_to_idle: Option<Transition>,
}

/// Finite-state controller of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStateMachine {
    state: EntityState,
}

impl EntityStateMachine {
    /// Create a machine in Idle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &EntityState {
        &self.state
    }

    /// Current state kind.
    #[must_use]
    pub fn kind(&self) -> StateKind {
        self.state.kind()
    }

    /// Whether dead.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        matches!(self.state, EntityState::Dead)
    }

    /// Whether attacking or using a skill.
    #[must_use]
    pub fn is_attacking(&self) -> bool {
        matches!(
            self.state,
            EntityState::Attack { .. } | EntityState::UseSkill { .. }
        )
    }

    /// Whether blocking.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(self.state, EntityState::Block { .. })
    }

    /// Whether stunned.
    #[must_use]
    pub fn is_stunned(&self) -> bool {
        matches!(self.state, EntityState::Stunned { .. })
    }

    /// Whether in a movement state.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        matches!(
            self.state,
            EntityState::MoveToDestination { .. } | EntityState::MoveToAttack
        )
    }

    /// Whether attack requests are considered at all.
    #[must_use]
    pub fn accepts_attack(&self) -> bool {
        !self.is_dead() && !self.is_blocking() && !self.is_stunned()
    }

    /// Whether movement requests are considered at all.
    #[must_use]
    pub fn accepts_movement(&self) -> bool {
        matches!(
            self.state,
            EntityState::Idle | EntityState::MoveToDestination { .. } | EntityState::MoveToAttack
        )
    }

    /// Changes state. Leaving Dead is only possible through [`Self::revive`].
    pub fn change_to(&mut self, next: EntityState) -> Option<Transition> {
        if self.is_dead() {
            return None;
        }
        let from = self.kind();
        self.state = next;
        Some(Transition {
            from,
            to: self.kind(),
        })
    }

    /// Enters Dead from any living state.
    pub fn die(&mut self) -> Option<Transition> {
        self.change_to(EntityState::Dead)
    }

    /// Dead to Idle. No-op when alive.
    pub fn revive(&mut self) -> Option<Transition> {
        if !self.is_dead() {
            return None;
        }
        self.state = EntityState::Idle;
        Some(Transition {
            from: StateKind::Dead,
            to: StateKind::Idle,
        })
    }

    /// Advances timed states.
    pub fn tick(&mut self, dt: f32) -> StateTick {
        let mut out = StateTick::default();

        let finished = match &mut self.state {
            EntityState::Attack { remaining, hit_in } => {
                if step_hit(hit_in, dt) {
                    out.hit = Some(HitPoint::Attack);
                }
                *remaining -= dt;
                *remaining <= 0.0
            }
            EntityState::UseSkill {
                skill,
                remaining,
                hit_in,
            } => {
                if step_hit(hit_in, dt) {
                    out.hit = Some(HitPoint::Skill(*skill));
                }
                *remaining -= dt;
                *remaining <= 0.0
            }
            EntityState::Block { remaining } | EntityState::Stunned { remaining } => {
                *remaining -= dt;
                *remaining <= 0.0
            }
            _ => false,
        };

        if finished {
            out.returned_to_idle = self.change_to(EntityState::Idle);
        }
        out
    }
}

/// Counts down a pending hit. Returns true on the tick it lands.
fn step_hit(hit_in: &mut Option<f32>, dt: f32) -> bool {
    let Some(t) = hit_in.as_mut() else {
        return false;
    };
    *t -= dt;
    if *t <= 0.0 {
        *hit_in = None;
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_idle() {
        let sm = EntityStateMachine::new();
        assert_eq!(sm.kind(), StateKind::Idle);
        assert!(sm.accepts_attack());
        assert!(sm.accepts_movement());
    }

    #[test]
    fn test_attack_hits_then_returns_to_idle() {
        let mut sm = EntityStateMachine::new();
        sm.change_to(EntityState::attack(1.0, 0.5));
        assert!(sm.is_attacking());

        assert_eq!(sm.tick(0.4), StateTick::default());
        let tick = sm.tick(0.2);
        assert_eq!(tick.hit, Some(HitPoint::Attack));
        assert!(tick.returned_to_idle.is_none());

        // Hit fires once.
        assert!(sm.tick(0.2).hit.is_none());

        let tick = sm.tick(0.3);
        assert_eq!(
            tick.returned_to_idle,
            Some(Transition {
                from: StateKind::Attack,
                to: StateKind::Idle
            })
        );
        assert_eq!(sm.kind(), StateKind::Idle);
    }

    #[test]
    fn test_hit_and_end_in_one_large_step() {
        let mut sm = EntityStateMachine::new();
        let skill = SkillId::new(3);
        sm.change_to(EntityState::use_skill(skill, 0.5, 0.5));
        let tick = sm.tick(1.0);
        assert_eq!(tick.hit, Some(HitPoint::Skill(skill)));
        assert!(tick.returned_to_idle.is_some());
    }

    #[test]
    fn test_block_and_stun_expire() {
        let mut sm = EntityStateMachine::new();
        sm.change_to(EntityState::Block { remaining: 0.3 });
        assert!(sm.is_blocking());
        assert!(!sm.accepts_attack());
        sm.tick(0.31);
        assert_eq!(sm.kind(), StateKind::Idle);

        sm.change_to(EntityState::Stunned { remaining: 0.1 });
        assert!(sm.is_stunned());
        assert!(!sm.accepts_movement());
        sm.tick(0.1);
        assert_eq!(sm.kind(), StateKind::Idle);
    }

    #[test]
    fn test_dead_is_terminal_until_revive() {
        let mut sm = EntityStateMachine::new();
        sm.change_to(EntityState::attack(1.0, 0.5));
        assert!(sm.die().is_some());
        assert!(sm.is_dead());

        assert!(sm.change_to(EntityState::Idle).is_none());
        assert!(sm.die().is_none());
        // Death cancels the pending hit.
        assert_eq!(sm.tick(5.0), StateTick::default());

        assert!(sm.revive().is_some());
        assert_eq!(sm.kind(), StateKind::Idle);
        assert!(sm.revive().is_none());
    }

    #[test]
    fn test_movement_states_are_untimed() {
        let mut sm = EntityStateMachine::new();
        sm.change_to(EntityState::MoveToDestination {
            destination: Vec3::new(5.0, 0.0, 0.0),
        });
        assert!(sm.is_moving());
        sm.tick(100.0);
        assert_eq!(sm.kind(), StateKind::MoveToDestination);
    }
}

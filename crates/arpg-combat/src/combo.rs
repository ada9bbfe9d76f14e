//! Combo chaining.
//!
//! A combo advances when a swing connects and may only be continued by a new
//! attack once `next_combo_delay` has passed since the last advance. It falls
//! back to index 0 when it reaches the weapon's `max_combos` or when
//! `time_to_stop` passes without an advance.

use serde::{Deserialize, Serialize};

/// Combo limits, taken from the equipped weapon or the entity's base values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComboProfile {
    /// Number of chained hits before the combo completes.
    pub max_combos: u32,
    /// Seconds without an advance after which the combo is dropped.
    pub time_to_stop: f32,
    /// Minimum seconds between an advance and the next chained attack.
    pub next_combo_delay: f32,
}

impl Default for ComboProfile {
    fn default() -> Self {
        Self {
            max_combos: 1,
            time_to_stop: 1.0,
            next_combo_delay: 0.1,
        }
    }
}

impl ComboProfile {
    /// Create a combo profile.
    #[must_use]
    pub const fn new(max_combos: u32, time_to_stop: f32, next_combo_delay: f32) -> Self {
        Self {
            max_combos,
            time_to_stop,
            next_combo_delay,
        }
    }
}

/// Result of [`ComboState::increment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboStep {
    /// A second increment in the same tick; nothing changed.
    Ignored,
    /// The combo moved to this index.
    Advanced(u32),
    /// The combo reached its maximum and was reset.
    Completed,
}

/// Per-entity combo tracking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComboState {
    /// Current combo index (0 = no combo).
    pub index: u32,
    /// Whether a combo is in progress.
    pub performing: bool,
    /// Simulation time of the last attack start.
    pub last_attack_time: f64,
    /// Simulation time of the last advance.
    pub last_combo_time: f64,
    /// Tick of the last advance, used to drop same-tick duplicates.
    last_combo_tick: Option<u64>,
}

impl ComboState {
    /// Create new combo state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start of an attack.
    pub fn register_attack(&mut self, now: f64) {
        self.last_attack_time = now;
    }

    /// Advances the combo after a connected hit.
    pub fn increment(&mut self, now: f64, tick: u64, max_combos: u32) -> ComboStep {
        if self.last_combo_tick == Some(tick) {
            return ComboStep::Ignored;
        }

        self.index += 1;
        self.performing = true;
        self.last_combo_time = now;
        self.last_combo_tick = Some(tick);

        if self.index >= max_combos {
            self.cancel();
            ComboStep::Completed
        } else {
            ComboStep::Advanced(self.index)
        }
    }

    /// Drops the combo.
    pub fn cancel(&mut self) {
        self.index = 0;
        self.performing = false;
    }

    /// Whether a new attack may continue the current combo.
    #[must_use]
    pub fn can_perform_next(&self, now: f64, next_combo_delay: f32) -> bool {
        self.performing
            && self.last_combo_time > self.last_attack_time
            && now > self.last_combo_time + f64::from(next_combo_delay)
    }

    /// Drops a combo whose stop window elapsed. Returns true if it was active.
    pub fn expire_if_stale(&mut self, now: f64, time_to_stop: f32) -> bool {
        if now > self.last_combo_time + f64::from(time_to_stop) && (self.performing || self.index > 0) {
            self.cancel();
            return true;
        }
        false
    }

    /// Check if in combo.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.performing
    }
}

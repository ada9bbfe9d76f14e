//! Random rolls for combat resolution.
//!
//! Every roll in the engine goes through [`CombatRng`] so that tests can
//! script outcomes and a seeded world replays identically.

use std::collections::VecDeque;

/// Source of uniform random values for combat rolls.
pub trait CombatRng {
    /// Uniform float in `[0.0, 1.0)`.
    fn next_f32(&mut self) -> f32;

    /// Uniform integer in `[lo, hi]`. Returns `lo` when `hi <= lo`.
    fn range_inclusive(&mut self, lo: i32, hi: i32) -> i32;

    /// Whether a draw lands strictly below `chance`.
    ///
    /// A chance of zero never succeeds.
    fn chance(&mut self, chance: f32) -> bool {
        self.next_f32() < chance
    }
}

/// Production RNG backed by `fastrand`.
#[derive(Debug, Clone)]
pub struct FastRng {
    inner: fastrand::Rng,
}

impl FastRng {
    /// Creates an RNG seeded from the system.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: fastrand::Rng::new(),
        }
    }

    /// Creates an RNG with a fixed seed.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: fastrand::Rng::with_seed(seed),
        }
    }
}

impl Default for FastRng {
    fn default() -> Self {
        Self::new()
    }
}

impl CombatRng for FastRng {
    fn next_f32(&mut self) -> f32 {
        self.inner.f32()
    }

    fn range_inclusive(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        self.inner.i32(lo..=hi)
    }
}

/// Scripted RNG that replays fixed values.
///
/// Floats and integers are queued separately. When a queue runs dry the
/// fallback is used: `fallback_f32` for floats and the lower bound for ranges.
#[derive(Debug, Clone, Default)]
pub struct SequenceRng {
    floats: VecDeque<f32>,
    ints: VecDeque<i32>,
    fallback_f32: f32,
}

impl SequenceRng {
    /// Creates an empty sequence whose draws return `fallback`.
    #[must_use]
    pub fn constant(fallback: f32) -> Self {
        Self {
            fallback_f32: fallback,
            ..Self::default()
        }
    }

    /// A sequence where every chance roll fails.
    #[must_use]
    pub fn never() -> Self {
        Self::constant(0.999_9)
    }

    /// A sequence where every chance roll succeeds.
    #[must_use]
    pub fn always() -> Self {
        Self::constant(0.0)
    }

    /// Queues float draws.
    #[must_use]
    pub fn with_floats(mut self, values: impl IntoIterator<Item = f32>) -> Self {
        self.floats.extend(values);
        self
    }

    /// Queues integer range results (clamped into the requested range).
    #[must_use]
    pub fn with_ints(mut self, values: impl IntoIterator<Item = i32>) -> Self {
        self.ints.extend(values);
        self
    }

    /// Number of queued floats not yet consumed.
    #[must_use]
    pub fn remaining_floats(&self) -> usize {
        self.floats.len()
    }
}

impl CombatRng for SequenceRng {
    fn next_f32(&mut self) -> f32 {
        self.floats.pop_front().unwrap_or(self.fallback_f32)
    }

    fn range_inclusive(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        self.ints.pop_front().map_or(lo, |v| v.clamp(lo, hi))
    }
}

//! Periodic regeneration.
//!
//! Each resource regenerates on three cadences (every 1, 5 and 30 seconds).
//! Amounts may be fractional; the remainder is carried so that 0.3 per
//! second yields +1 roughly every 3.3 seconds instead of truncating to zero.

use serde::{Deserialize, Serialize};

use crate::stat_id::{StatId, StatTable};

/// Whole units produced by an interval timer with fractional carry-over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalAccumulator {
    /// Seconds per interval.
    pub interval: f32,
    elapsed: f32,
    carry: f32,
}

impl IntervalAccumulator {
    /// Create an accumulator firing every `interval` seconds.
    #[must_use]
    pub const fn new(interval: f32) -> Self {
        Self {
            interval,
            elapsed: 0.0,
            carry: 0.0,
        }
    }

    /// Advances time and returns the whole units earned at `per_interval`.
    pub fn tick(&mut self, dt: f32, per_interval: f32) -> i32 {
        if self.interval <= 0.0 || dt <= 0.0 {
            return 0;
        }
        self.elapsed += dt;
        let intervals = (self.elapsed / self.interval).floor();
        if intervals < 1.0 {
            return 0;
        }
        self.elapsed -= intervals * self.interval;
        self.carry += intervals * per_interval;

        let whole = self.carry.trunc();
        self.carry -= whole;
        whole as i32
    }

    /// Fraction not yet paid out.
    #[must_use]
    pub fn carry(&self) -> f32 {
        self.carry
    }
}

/// Three cadences of the same resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cadences {
    every_second: IntervalAccumulator,
    every_5_seconds: IntervalAccumulator,
    every_30_seconds: IntervalAccumulator,
}

impl Default for Cadences {
    fn default() -> Self {
        Self {
            every_second: IntervalAccumulator::new(1.0),
            every_5_seconds: IntervalAccumulator::new(5.0),
            every_30_seconds: IntervalAccumulator::new(30.0),
        }
    }
}

impl Cadences {
    fn tick(&mut self, dt: f32, rates: [f32; 3]) -> i32 {
        self.every_second.tick(dt, rates[0])
            + self.every_5_seconds.tick(dt, rates[1])
            + self.every_30_seconds.tick(dt, rates[2])
    }
}

/// Amounts produced by one [`RegenSchedule::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegenTick {
    /// Health restored (negative drains).
    pub health: i32,
    /// Mana restored (negative drains).
    pub mana: i32,
    /// Experience earned.
    pub experience: i32,
    /// Currency earned.
    pub currency: i32,
}

impl RegenTick {
    /// Whether nothing was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Every periodic gain of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegenSchedule {
    health: Cadences,
    mana: Cadences,
    experience: Cadences,
    currency: IntervalAccumulator,
}

impl Default for RegenSchedule {
    fn default() -> Self {
        Self {
            health: Cadences::default(),
            mana: Cadences::default(),
            experience: Cadences::default(),
            currency: IntervalAccumulator::new(60.0),
        }
    }
}

impl RegenSchedule {
    /// Create a schedule with all timers at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances every timer using the current rates.
    ///
    /// Experience rates are percentages of `next_level_experience`.
    pub fn tick(&mut self, dt: f32, rates: &StatTable, next_level_experience: i32) -> RegenTick {
        let exp_unit = next_level_experience as f32 / 100.0;
        RegenTick {
            health: self.health.tick(
                dt,
                [
                    rates.get(StatId::HealthRegenPerSecond),
                    rates.get(StatId::HealthRegenPer5Seconds),
                    rates.get(StatId::HealthRegenPer30Seconds),
                ],
            ),
            mana: self.mana.tick(
                dt,
                [
                    rates.get(StatId::ManaRegenPerSecond),
                    rates.get(StatId::ManaRegenPer5Seconds),
                    rates.get(StatId::ManaRegenPer30Seconds),
                ],
            ),
            experience: self.experience.tick(
                dt,
                [
                    rates.get(StatId::ExperiencePerSecondPercent) * exp_unit,
                    rates.get(StatId::ExperiencePer5SecondsPercent) * exp_unit,
                    rates.get(StatId::ExperiencePer30SecondsPercent) * exp_unit,
                ],
            ),
            currency: self.currency.tick(dt, rates.get(StatId::CurrencyPerMinute)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractional_rate_accumulates() {
        let mut acc = IntervalAccumulator::new(1.0);
        let mut total = 0;
        for _ in 0..10 {
            total += acc.tick(1.0, 0.3);
        }
        assert_eq!(total, 3);

        // Over a long run the average matches the rate.
        for _ in 0..990 {
            total += acc.tick(1.0, 0.3);
        }
        assert!((299..=300).contains(&total));
    }

    #[test]
    fn test_small_frames_add_up() {
        let mut acc = IntervalAccumulator::new(5.0);
        let mut total = 0;
        for _ in 0..300 {
            total += acc.tick(1.0 / 60.0, 2.0);
        }
        assert_eq!(total, 2);
    }

    #[test]
    fn test_large_step_pays_every_interval() {
        let mut acc = IntervalAccumulator::new(1.0);
        assert_eq!(acc.tick(10.0, 1.5), 15);
        assert!(acc.carry().abs() < 0.001);
    }

    #[test]
    fn test_schedule_combines_cadences() {
        let mut rates = StatTable::new();
        rates.set(StatId::HealthRegenPerSecond, 1.0);
        rates.set(StatId::HealthRegenPer5Seconds, 5.0);
        rates.set(StatId::ManaRegenPer30Seconds, 3.0);
        rates.set(StatId::ExperiencePerSecondPercent, 1.0);
        rates.set(StatId::CurrencyPerMinute, 10.0);

        let mut schedule = RegenSchedule::new();
        let mut sum = RegenTick::default();
        for _ in 0..60 {
            let tick = schedule.tick(1.0, &rates, 2000);
            sum.health += tick.health;
            sum.mana += tick.mana;
            sum.experience += tick.experience;
            sum.currency += tick.currency;
        }

        assert_eq!(sum.health, 60 + 60);
        assert_eq!(sum.mana, 6);
        assert_eq!(sum.experience, 20 * 60);
        assert_eq!(sum.currency, 10);
    }

    #[test]
    fn test_zero_rates_produce_nothing() {
        let mut schedule = RegenSchedule::new();
        assert!(schedule.tick(100.0, &StatTable::new(), 1973).is_empty());
    }
}

//! Timed multiplier events and one-shot event rolls.
use serde::{Deserialize, Serialize};

use crate::constants::{
    LUCKY_STREAK_DURATION_MS, LUCKY_STREAK_FACTOR, PRESTIGE_INVESTMENT_DURATION_MS,
    PRESTIGE_INVESTMENT_FACTOR,
};
use crate::rng::RandomSource;

/// Multiplier events that stay active for a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimedEventKind {
    LuckyStreak,
    PrestigeInvestment,
}

impl TimedEventKind {
    #[must_use]
    pub const fn factor(self) -> f64 {
        match self {
            Self::LuckyStreak => LUCKY_STREAK_FACTOR,
            Self::PrestigeInvestment => PRESTIGE_INVESTMENT_FACTOR,
        }
    }

    #[must_use]
    pub const fn duration_ms(self) -> u64 {
        match self {
            Self::LuckyStreak => LUCKY_STREAK_DURATION_MS,
            Self::PrestigeInvestment => PRESTIGE_INVESTMENT_DURATION_MS,
        }
    }
}

/// One-shot transforms applied to the next roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRollKind {
    MeteorShower,
    DivineBlessing,
    ChaosStorm,
}

/// Outcome of a random-event check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomEvent {
    Timed(TimedEventKind),
    Roll(EventRollKind),
}

impl RandomEvent {
    const POOL: [Self; 4] = [
        Self::Timed(TimedEventKind::LuckyStreak),
        Self::Roll(EventRollKind::MeteorShower),
        Self::Roll(EventRollKind::DivineBlessing),
        Self::Roll(EventRollKind::ChaosStorm),
    ];

    /// Pick one event uniformly.
    pub fn pick<R: RandomSource + ?Sized>(rng: &mut R) -> Self {
        let last = u64::try_from(Self::POOL.len() - 1).unwrap_or(0);
        let index = usize::try_from(rng.uniform_int(0, last)).unwrap_or(0);
        Self::POOL[index.min(Self::POOL.len() - 1)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub kind: TimedEventKind,
    pub remaining_ms: u64,
}

/// Set of currently running timed events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveEvents {
    events: Vec<TimedEvent>,
}

impl ActiveEvents {
    /// Start `kind`, or refresh its timer if it is already running.
    pub fn start(&mut self, kind: TimedEventKind) {
        let duration = kind.duration_ms();
        if let Some(existing) = self.events.iter_mut().find(|event| event.kind == kind) {
            existing.remaining_ms = existing.remaining_ms.max(duration);
        } else {
            self.events.push(TimedEvent {
                kind,
                remaining_ms: duration,
            });
        }
    }

    /// Age every event and return the kinds that ran out.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<TimedEventKind> {
        let mut expired = Vec::new();
        self.events.retain_mut(|event| {
            event.remaining_ms = event.remaining_ms.saturating_sub(elapsed_ms);
            if event.remaining_ms == 0 {
                expired.push(event.kind);
                false
            } else {
                true
            }
        });
        expired
    }

    #[must_use]
    pub fn multiplier(&self) -> f64 {
        self.events.iter().map(|event| event.kind.factor()).product()
    }

    #[must_use]
    pub fn is_active(&self, kind: TimedEventKind) -> bool {
        self.events.iter().any(|event| event.kind == kind)
    }

    #[must_use]
    pub fn remaining_ms(&self, kind: TimedEventKind) -> Option<u64> {
        self.events
            .iter()
            .find(|event| event.kind == kind)
            .map(|event| event.remaining_ms)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedEvent> {
        self.events.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;

    #[test]
    fn events_stack_and_expire() {
        let mut events = ActiveEvents::default();
        assert!((events.multiplier() - 1.0).abs() < f64::EPSILON);
        events.start(TimedEventKind::LuckyStreak);
        events.start(TimedEventKind::PrestigeInvestment);
        assert!((events.multiplier() - 20.0).abs() < f64::EPSILON);

        assert!(events.advance(29_999).is_empty());
        assert_eq!(events.advance(1), vec![TimedEventKind::LuckyStreak]);
        assert!(!events.is_active(TimedEventKind::LuckyStreak));
        assert_eq!(events.remaining_ms(TimedEventKind::PrestigeInvestment), Some(30_000));
    }

    #[test]
    fn restarting_refreshes_instead_of_duplicating() {
        let mut events = ActiveEvents::default();
        events.start(TimedEventKind::LuckyStreak);
        events.advance(20_000);
        events.start(TimedEventKind::LuckyStreak);
        assert_eq!(events.iter().count(), 1);
        assert_eq!(events.remaining_ms(TimedEventKind::LuckyStreak), Some(30_000));
    }

    #[test]
    fn pick_maps_draws_onto_pool() {
        let mut rng = ScriptedRng::new().with_ints([0, 1, 2, 3]);
        assert_eq!(
            RandomEvent::pick(&mut rng),
            RandomEvent::Timed(TimedEventKind::LuckyStreak)
        );
        assert_eq!(
            RandomEvent::pick(&mut rng),
            RandomEvent::Roll(EventRollKind::MeteorShower)
        );
        assert_eq!(
            RandomEvent::pick(&mut rng),
            RandomEvent::Roll(EventRollKind::DivineBlessing)
        );
        assert_eq!(
            RandomEvent::pick(&mut rng),
            RandomEvent::Roll(EventRollKind::ChaosStorm)
        );
    }
}

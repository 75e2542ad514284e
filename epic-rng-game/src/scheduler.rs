//! Explicit tick-driven scheduler for auto-rolls, autosave and random events.
//!
//! The scheduler owns only its accumulators. The caller supplies elapsed time
//! and the model; nothing here reads a clock or sleeps.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    AUTO_ROLL_DEFAULT_INTERVAL_MS, AUTOSAVE_INTERVAL_MS, EVENT_CHECK_INTERVAL_MS,
    MAX_CATCH_UP_ROLLS, RANDOM_EVENT_CHANCE,
};
use crate::events::{RandomEvent, TimedEventKind};
use crate::model::ProgressionModel;
use crate::rng::RandomSource;
use crate::roll::{RollOptions, RollOutcome};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerConfigError {
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
    #[error("random_event_chance must be within [0, 1], got {0}")]
    ChanceOutOfRange(f64),
    #[error("max_catch_up_rolls must be at least 1")]
    NoCatchUp,
}

/// Timer settings for the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "SchedulerConfig::default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,
    #[serde(default = "SchedulerConfig::default_event_check_interval_ms")]
    pub event_check_interval_ms: u64,
    #[serde(default = "SchedulerConfig::default_random_event_chance")]
    pub random_event_chance: f64,
    /// Upper bound on auto-rolls fired by a single long tick.
    #[serde(default = "SchedulerConfig::default_max_catch_up_rolls")]
    pub max_catch_up_rolls: u32,
}

impl SchedulerConfig {
    const fn default_autosave_interval_ms() -> u64 {
        AUTOSAVE_INTERVAL_MS
    }

    const fn default_event_check_interval_ms() -> u64 {
        EVENT_CHECK_INTERVAL_MS
    }

    const fn default_random_event_chance() -> f64 {
        RANDOM_EVENT_CHANCE
    }

    const fn default_max_catch_up_rolls() -> u32 {
        MAX_CATCH_UP_ROLLS
    }

    /// Check intervals and chances.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), SchedulerConfigError> {
        if self.autosave_interval_ms == 0 {
            return Err(SchedulerConfigError::ZeroInterval {
                field: "autosave_interval_ms",
            });
        }
        if self.event_check_interval_ms == 0 {
            return Err(SchedulerConfigError::ZeroInterval {
                field: "event_check_interval_ms",
            });
        }
        if !(0.0..=1.0).contains(&self.random_event_chance) {
            return Err(SchedulerConfigError::ChanceOutOfRange(self.random_event_chance));
        }
        if self.max_catch_up_rolls == 0 {
            return Err(SchedulerConfigError::NoCatchUp);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            autosave_interval_ms: Self::default_autosave_interval_ms(),
            event_check_interval_ms: Self::default_event_check_interval_ms(),
            random_event_chance: Self::default_random_event_chance(),
            max_catch_up_rolls: Self::default_max_catch_up_rolls(),
        }
    }
}

/// Something that happened during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    AutoRoll(RollOutcome),
    AutoSaveDue,
    EventStarted(RandomEvent),
    EventExpired(TimedEventKind),
    PrestigeAccrued(f64),
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
    auto_roll_elapsed_ms: u64,
    autosave_elapsed_ms: u64,
    event_elapsed_ms: u64,
}

impl Scheduler {
    /// Build a scheduler from a validated config.
    ///
    /// # Errors
    ///
    /// Returns the config validation error.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Advance every timer by `elapsed_ms`.
    ///
    /// Auto-rolls draw from `auto_rng` and random-event checks from
    /// `event_rng`, so the two sequences stay independent of each other.
    pub fn tick<A, E>(
        &mut self,
        elapsed_ms: u64,
        model: &mut ProgressionModel,
        auto_rng: &mut A,
        event_rng: &mut E,
    ) -> Vec<SchedulerEvent>
    where
        A: RandomSource + ?Sized,
        E: RandomSource + ?Sized,
    {
        let mut fired = Vec::new();

        fired.extend(
            model
                .advance_events(elapsed_ms)
                .into_iter()
                .map(SchedulerEvent::EventExpired),
        );

        let gained = model.accrue_prestige(elapsed_ms);
        if gained > 0.0 {
            fired.push(SchedulerEvent::PrestigeAccrued(gained));
        }

        if model.auto_roll_active() {
            self.auto_roll_elapsed_ms = self.auto_roll_elapsed_ms.saturating_add(elapsed_ms);
            let interval = model.auto_roll_interval_ms().max(1);
            let due = self.auto_roll_elapsed_ms / interval;
            self.auto_roll_elapsed_ms %= interval;
            let rolls = due.min(u64::from(self.config.max_catch_up_rolls));
            for _ in 0..rolls {
                let outcome = model.perform_roll(RollOptions::auto(), auto_rng);
                fired.push(SchedulerEvent::AutoRoll(outcome));
            }
        } else {
            self.auto_roll_elapsed_ms = 0;
        }

        self.autosave_elapsed_ms = self.autosave_elapsed_ms.saturating_add(elapsed_ms);
        if self.autosave_elapsed_ms >= self.config.autosave_interval_ms {
            self.autosave_elapsed_ms %= self.config.autosave_interval_ms;
            fired.push(SchedulerEvent::AutoSaveDue);
        }

        self.event_elapsed_ms = self.event_elapsed_ms.saturating_add(elapsed_ms);
        let checks = (self.event_elapsed_ms / self.config.event_check_interval_ms)
            .min(u64::from(self.config.max_catch_up_rolls));
        self.event_elapsed_ms %= self.config.event_check_interval_ms;
        for _ in 0..checks {
            if event_rng.unit() >= self.config.random_event_chance {
                continue;
            }
            let event = RandomEvent::pick(event_rng);
            match event {
                RandomEvent::Timed(kind) => model.start_event(kind),
                RandomEvent::Roll(kind) => model.queue_event_roll(kind),
            }
            log::debug!("random event started: {event:?}");
            fired.push(SchedulerEvent::EventStarted(event));
        }

        fired
    }

    /// Interval the auto-roller would use with no upgrades.
    #[must_use]
    pub const fn default_auto_roll_interval_ms() -> u64 {
        AUTO_ROLL_DEFAULT_INTERVAL_MS
    }

    /// Forget partial progress toward every timer.
    pub fn reset(&mut self) {
        self.auto_roll_elapsed_ms = 0;
        self.autosave_elapsed_ms = 0;
        self.event_elapsed_ms = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventRollKind;
    use crate::rng::ScriptedRng;
    use crate::state::ProgressionState;
    use crate::upgrades::UpgradeId;

    fn apprentice() -> ProgressionModel {
        ProgressionModel::from_state(ProgressionState {
            current_layer_index: 1,
            ..ProgressionState::default()
        })
    }

    #[test]
    fn config_defaults_and_validation() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SchedulerConfig::default());
        assert_eq!(config.autosave_interval_ms, 30_000);
        assert!(config.validate().is_ok());

        let bad = SchedulerConfig {
            random_event_chance: 1.5,
            ..SchedulerConfig::default()
        };
        assert_eq!(bad.validate(), Err(SchedulerConfigError::ChanceOutOfRange(1.5)));
        let zero = SchedulerConfig {
            autosave_interval_ms: 0,
            ..SchedulerConfig::default()
        };
        assert!(Scheduler::new(zero).is_err());
    }

    #[test]
    fn auto_rolls_fire_once_per_interval() {
        let mut scheduler = Scheduler::default();
        let mut model = apprentice();
        let mut rng = ScriptedRng::new();
        let events = scheduler.tick(2_500, &mut model, &mut rng, &mut ScriptedRng::new());
        let rolls = events
            .iter()
            .filter(|event| matches!(event, SchedulerEvent::AutoRoll(_)))
            .count();
        assert_eq!(rolls, 2);
        assert_eq!(model.state().total_rolls, 2);
        let events = scheduler.tick(500, &mut model, &mut rng, &mut ScriptedRng::new());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn auto_speed_shortens_the_interval() {
        let mut scheduler = Scheduler::default();
        let mut model = apprentice();
        assert_eq!(model.auto_roll_interval_ms(), Scheduler::default_auto_roll_interval_ms());
        let mut state = model.state().clone();
        state.upgrades.insert(UpgradeId::AutoSpeed, 10);
        model = ProgressionModel::from_state(state);
        assert_eq!(model.auto_roll_interval_ms(), 500);
        scheduler.tick(2_000, &mut model, &mut ScriptedRng::new(), &mut ScriptedRng::new());
        assert_eq!(model.state().total_rolls, 4);
    }

    #[test]
    fn no_auto_rolls_before_unlock_or_when_disabled() {
        let mut scheduler = Scheduler::default();
        let mut model = ProgressionModel::new();
        scheduler.tick(10_000, &mut model, &mut ScriptedRng::new(), &mut ScriptedRng::new());
        assert_eq!(model.state().total_rolls, 0);

        let mut model = apprentice();
        model.set_auto_roll(false);
        scheduler.tick(10_000, &mut model, &mut ScriptedRng::new(), &mut ScriptedRng::new());
        assert_eq!(model.state().total_rolls, 0);
    }

    #[test]
    fn catch_up_is_bounded() {
        let mut scheduler = Scheduler::default();
        let mut model = apprentice();
        scheduler.tick(3_600_000, &mut model, &mut ScriptedRng::new(), &mut ScriptedRng::new());
        assert_eq!(model.state().total_rolls, 50);
    }

    #[test]
    fn autosave_is_signalled_each_interval() {
        let mut scheduler = Scheduler::default();
        let mut model = ProgressionModel::new();
        let mut saves = 0;
        for _ in 0..7 {
            let events = scheduler.tick(10_000, &mut model, &mut ScriptedRng::new(), &mut ScriptedRng::new());
            saves += events
                .iter()
                .filter(|event| matches!(event, SchedulerEvent::AutoSaveDue))
                .count();
        }
        assert_eq!(saves, 2);
    }

    #[test]
    fn random_events_start_and_expire() {
        let mut scheduler = Scheduler::default();
        let mut model = ProgressionModel::new();
        let mut events_rng = ScriptedRng::new().with_units([0.05]).with_ints([0]);
        let fired = scheduler.tick(45_000, &mut model, &mut ScriptedRng::new(), &mut events_rng);
        assert!(fired.contains(&SchedulerEvent::EventStarted(RandomEvent::Timed(
            TimedEventKind::LuckyStreak
        ))));
        assert!(model.events().is_active(TimedEventKind::LuckyStreak));

        let fired = scheduler.tick(30_000, &mut model, &mut ScriptedRng::new(), &mut ScriptedRng::new());
        assert!(fired.contains(&SchedulerEvent::EventExpired(TimedEventKind::LuckyStreak)));
    }

    #[test]
    fn event_rolls_are_queued_for_the_next_roll() {
        let mut scheduler = Scheduler::default();
        let mut model = ProgressionModel::new();
        let mut events_rng = ScriptedRng::new().with_units([0.0]).with_ints([1]);
        scheduler.tick(45_000, &mut model, &mut ScriptedRng::new(), &mut events_rng);
        assert_eq!(
            model.pending_event_rolls().front(),
            Some(&EventRollKind::MeteorShower)
        );
    }

    #[test]
    fn prestige_accrual_is_reported() {
        let mut scheduler = Scheduler::default();
        let mut state = ProgressionState {
            current_layer_index: 6,
            auto_roll_enabled: false,
            ..ProgressionState::default()
        };
        state.upgrades.insert(UpgradeId::PrestigeGeneration, 5);
        let mut model = ProgressionModel::from_state(state);
        let fired = scheduler.tick(4_000, &mut model, &mut ScriptedRng::new(), &mut ScriptedRng::new());
        assert!(matches!(fired.first(), Some(SchedulerEvent::PrestigeAccrued(p)) if (p - 2.0).abs() < 1e-9));
    }
}

//! A running game: model, scheduler, RNG streams and a millisecond clock.
use crate::events::TimedEventKind;
use crate::model::{ProgressionError, ProgressionModel, PrestigeSummary, PurchaseReceipt, RebirthSummary};
use crate::rng::RngBundle;
use crate::roll::{RollOptions, RollOutcome};
use crate::scheduler::{Scheduler, SchedulerEvent};
use crate::upgrades::UpgradeId;

/// Single-owner game session driven by explicit clock advances.
#[derive(Debug, Clone)]
pub struct GameSession {
    model: ProgressionModel,
    scheduler: Scheduler,
    rngs: RngBundle,
    clock_ms: u64,
}

impl GameSession {
    #[must_use]
    pub fn new(model: ProgressionModel, scheduler: Scheduler, seed: u64, clock_ms: u64) -> Self {
        Self {
            model,
            scheduler,
            rngs: RngBundle::from_user_seed(seed),
            clock_ms,
        }
    }

    /// Fresh game with default scheduler settings.
    #[must_use]
    pub fn fresh(seed: u64) -> Self {
        Self::new(ProgressionModel::new(), Scheduler::default(), seed, 0)
    }

    #[must_use]
    pub const fn model(&self) -> &ProgressionModel {
        &self.model
    }

    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub const fn rngs(&self) -> &RngBundle {
        &self.rngs
    }

    #[must_use]
    pub const fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.rngs.seed()
    }

    /// Player roll stamped with the session clock.
    pub fn roll(&mut self, options: RollOptions) -> RollOutcome {
        let options = options.at(self.clock_ms);
        let mut rng = self.rngs.roll();
        self.model.perform_roll(options, &mut *rng)
    }

    /// Buy one level of `id`.
    ///
    /// # Errors
    ///
    /// Propagates the model's purchase refusal.
    pub fn purchase(&mut self, id: UpgradeId) -> Result<PurchaseReceipt, ProgressionError> {
        self.model.purchase_upgrade(id)
    }

    pub fn rebirth(&mut self) -> Option<RebirthSummary> {
        self.model.rebirth()
    }

    pub fn prestige(&mut self) -> Option<PrestigeSummary> {
        self.model.prestige()
    }

    /// Spend prestige points on the investment event.
    ///
    /// # Errors
    ///
    /// Propagates the model's refusal.
    pub fn invest_prestige(&mut self) -> Result<(), ProgressionError> {
        self.model.invest_prestige()
    }

    pub fn start_event(&mut self, kind: TimedEventKind) {
        self.model.start_event(kind);
    }

    pub fn set_auto_roll(&mut self, enabled: bool) {
        self.model.set_auto_roll(enabled);
    }

    /// Move the clock forward and run one scheduler tick.
    pub fn advance(&mut self, elapsed_ms: u64) -> Vec<SchedulerEvent> {
        self.clock_ms = self.clock_ms.saturating_add(elapsed_ms);
        let mut auto = self.rngs.auto();
        let mut events = self.rngs.events();
        self.scheduler
            .tick(elapsed_ms, &mut self.model, &mut *auto, &mut *events)
    }

    /// Replace the model with a fresh one and restart the timers.
    pub fn reset(&mut self) {
        self.model.reset();
        self.scheduler.reset();
    }

    #[must_use]
    pub fn into_model(self) -> ProgressionModel {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_outcomes() {
        let mut a = GameSession::fresh(2024);
        let mut b = GameSession::fresh(2024);
        for _ in 0..25 {
            assert_eq!(a.roll(RollOptions::manual()), b.roll(RollOptions::manual()));
        }
        assert_eq!(a.model().state(), b.model().state());
    }

    #[test]
    fn advance_moves_clock_and_runs_scheduler() {
        let mut session = GameSession::fresh(1);
        let fired = session.advance(30_000);
        assert_eq!(session.clock_ms(), 30_000);
        assert!(fired.contains(&SchedulerEvent::AutoSaveDue));
    }

    #[test]
    fn reset_returns_to_defaults() {
        let mut session = GameSession::fresh(5);
        session.roll(RollOptions::manual());
        session.reset();
        assert_eq!(session.model().state().total_rolls, 0);
        assert!(session.model().history().is_empty());
    }
}

//! Progression model: the only owner of [`ProgressionState`].
//!
//! Every mutating entry point runs to completion without yielding. Gameplay
//! refusals are returned as values (`bool`, `Option`, or a
//! [`ProgressionError`]) and never leave the state partially updated.
use std::collections::VecDeque;
use thiserror::Error;

use crate::achievements::{self, AchievementCatalog, AchievementContext};
use crate::constants::{PRESTIGE_BASE_REQUIREMENT, PRESTIGE_INVESTMENT_COST};
use crate::events::{ActiveEvents, EventRollKind, TimedEventKind};
use crate::history::RollHistory;
use crate::layers::{self, Feature, Layer, LayerCatalog};
use crate::modifiers::{RollModifiers, derive_multiplier};
use crate::numbers::{floor_f64_to_u64, level_exponent, u64_to_f64};
use crate::rng::RandomSource;
use crate::roll::{ChainCounters, RollEngine, RollOptions, RollOutcome};
use crate::state::ProgressionState;
use crate::upgrades::{self, UnknownUpgradeId, UpgradeCatalog, UpgradeDef, UpgradeId};

/// Why an upgrade cannot be bought right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LockReason {
    #[error("requires layer {required}, currently at {current}")]
    LayerGate { required: usize, current: usize },
    #[error("already at max level {0}")]
    MaxLevel(u32),
    #[error("the upgrade is not owned")]
    NotOwned,
}

/// Refusals and failures of progression operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgressionError {
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("upgrade {id} is locked: {reason}")]
    UpgradeLocked { id: UpgradeId, reason: LockReason },
    #[error(transparent)]
    UnknownUpgradeId(#[from] UnknownUpgradeId),
    #[error("insufficient prestige points: need {needed}, have {available:.2}")]
    InsufficientPrestige { needed: f64, available: f64 },
}

/// Result of a successful purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub id: UpgradeId,
    pub level: u32,
    pub cost: u64,
    pub points_remaining: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebirthSummary {
    pub from_layer: usize,
    pub to_layer: usize,
    pub rebirth_count: u32,
    pub newly_unlocked: Vec<Feature>,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrestigeSummary {
    pub prestige_level: u32,
    pub points_spent: u64,
    pub multiplier: f64,
}

/// Owner of the progression state and its session-scoped companions.
#[derive(Debug, Clone)]
pub struct ProgressionModel {
    state: ProgressionState,
    layers: &'static LayerCatalog,
    upgrades: &'static UpgradeCatalog,
    achievements: &'static AchievementCatalog,
    history: RollHistory,
    events: ActiveEvents,
    pending_event_rolls: VecDeque<EventRollKind>,
    roll_times: VecDeque<u64>,
    new_achievements: Vec<String>,
}

impl Default for ProgressionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressionModel {
    #[must_use]
    pub fn new() -> Self {
        Self::from_state(ProgressionState::default())
    }

    /// Adopt a state, clamping it into the catalog and re-deriving the
    /// multiplier and feature set.
    #[must_use]
    pub fn from_state(state: ProgressionState) -> Self {
        let mut model = Self {
            state,
            layers: layers::catalog(),
            upgrades: upgrades::catalog(),
            achievements: achievements::catalog(),
            history: RollHistory::default(),
            events: ActiveEvents::default(),
            pending_event_rolls: VecDeque::new(),
            roll_times: VecDeque::new(),
            new_achievements: Vec::new(),
        };
        model.normalize();
        model
    }

    /// Adopt a state together with its saved history.
    #[must_use]
    pub fn with_history(state: ProgressionState, history: RollHistory) -> Self {
        let mut model = Self::from_state(state);
        model.history = history;
        model
    }

    #[must_use]
    pub const fn state(&self) -> &ProgressionState {
        &self.state
    }

    #[must_use]
    pub const fn history(&self) -> &RollHistory {
        &self.history
    }

    #[must_use]
    pub const fn events(&self) -> &ActiveEvents {
        &self.events
    }

    #[must_use]
    pub const fn layers(&self) -> &'static LayerCatalog {
        self.layers
    }

    #[must_use]
    pub const fn upgrades(&self) -> &'static UpgradeCatalog {
        self.upgrades
    }

    #[must_use]
    pub fn current_layer(&self) -> &Layer {
        self.layers.layer(self.state.current_layer_index)
    }

    #[must_use]
    pub fn next_layer(&self) -> Option<&Layer> {
        self.layers.get(self.state.current_layer_index + 1)
    }

    #[must_use]
    pub fn is_at_max_layer(&self) -> bool {
        self.state.current_layer_index >= self.layers.max_index()
    }

    /// Modifiers the next roll would use, including active timed events.
    #[must_use]
    pub fn modifiers(&self) -> RollModifiers {
        RollModifiers::resolve(
            self.layers,
            self.upgrades,
            self.state.current_layer_index,
            &self.state.unlocked_features,
            &self.state.upgrades,
            self.state.multiplier,
        )
        .with_event_multiplier(self.events.multiplier())
    }

    /// Roll once and commit the outcome.
    ///
    /// A queued event roll is consumed when `options` names none.
    pub fn perform_roll<R: RandomSource + ?Sized>(&mut self, options: RollOptions, rng: &mut R) -> RollOutcome {
        let mut options = options;
        if options.event.is_none() {
            options.event = self.pending_event_rolls.pop_front();
        }
        let modifiers = self.modifiers();
        let mut counters = ChainCounters {
            combo: self.state.combo,
            streak: self.state.streak,
        };
        let outcome = RollEngine::new(&modifiers).roll(&mut counters, &options, self.state.total_rolls, rng);

        let state = &mut self.state;
        state.points = state.points.saturating_add(outcome.final_points);
        state.total_points_earned = state.total_points_earned.saturating_add(outcome.final_points);
        state.total_rolls = state.total_rolls.saturating_add(1);
        state.critical_hit_count = state
            .critical_hit_count
            .saturating_add(u64::from(outcome.critical_hits));
        state.combo = counters.combo;
        state.streak = counters.streak;
        state.best_roll = state.best_roll.max(outcome.final_points);
        self.history.record(&outcome);
        if let Some(now_ms) = options.now_ms {
            self.track_roll_time(now_ms);
        }
        self.sweep_achievements(Some(&outcome));
        outcome
    }

    /// Price of the next level of `id`, ignoring locks.
    #[must_use]
    pub fn upgrade_cost(&self, id: UpgradeId) -> u64 {
        self.upgrades
            .get(id)
            .map_or(u64::MAX, |def| def.cost_at(self.state.level_of(id)))
    }

    /// Whether `id` is unlocked, below max level and affordable.
    #[must_use]
    pub fn can_afford_upgrade(&self, id: UpgradeId) -> bool {
        self.check_purchase(id).is_ok()
    }

    /// Buy one level of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::UpgradeLocked`] when the layer gate is not
    /// met or the upgrade is maxed, and [`ProgressionError::InsufficientFunds`]
    /// when the price exceeds the current points. State is untouched on error.
    pub fn purchase_upgrade(&mut self, id: UpgradeId) -> Result<PurchaseReceipt, ProgressionError> {
        let cost = self.check_purchase(id)?;
        self.state.points -= cost;
        let level = self.state.upgrades.entry(id).or_insert(0);
        *level += 1;
        let level = *level;
        self.refresh_multiplier();
        log::debug!("purchased {id} level {level} for {cost}");
        self.sweep_achievements(None);
        Ok(PurchaseReceipt {
            id,
            level,
            cost,
            points_remaining: self.state.points,
        })
    }

    /// Buy one level of the upgrade named by `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::UnknownUpgradeId`] for ids outside the
    /// catalog, otherwise the same refusals as [`Self::purchase_upgrade`].
    pub fn purchase_upgrade_by_id(&mut self, id: &str) -> Result<PurchaseReceipt, ProgressionError> {
        let def = self.upgrades.lookup(id)?;
        self.purchase_upgrade(def.id)
    }

    /// Unlocked, non-maxed upgrades ordered by current price.
    #[must_use]
    pub fn available_upgrades(&self) -> Vec<&'static UpgradeDef> {
        let layer = self.state.current_layer_index;
        let mut available: Vec<&'static UpgradeDef> = self
            .upgrades
            .iter()
            .filter(|def| def.required_layer <= layer && !def.is_maxed(self.state.level_of(def.id)))
            .collect();
        available.sort_by_key(|def| def.cost_at(self.state.level_of(def.id)));
        available
    }

    #[must_use]
    pub fn can_rebirth(&self) -> bool {
        self.next_layer()
            .is_some_and(|next| self.state.points >= next.point_requirement)
    }

    /// Advance one layer, or do nothing when the threshold is not met.
    pub fn rebirth(&mut self) -> Option<RebirthSummary> {
        if !self.can_rebirth() {
            return None;
        }
        let from_layer = self.state.current_layer_index;
        let to_layer = from_layer + 1;
        let newly_unlocked: Vec<Feature> = self
            .layers
            .layer(to_layer)
            .unlocked_features
            .iter()
            .copied()
            .filter(|feature| !self.state.has_feature(*feature))
            .collect();

        let state = &mut self.state;
        state.points = 0;
        state.combo = 0;
        state.streak = 0;
        state.current_layer_index = to_layer;
        state.rebirth_count = state.rebirth_count.saturating_add(1);
        state.unlocked_features.extend(newly_unlocked.iter().copied());
        self.refresh_multiplier();
        log::debug!(
            "rebirth {from_layer} -> {to_layer} (#{}), multiplier {:.2}",
            self.state.rebirth_count,
            self.state.multiplier
        );
        self.sweep_achievements(None);
        Some(RebirthSummary {
            from_layer,
            to_layer,
            rebirth_count: self.state.rebirth_count,
            newly_unlocked,
            multiplier: self.state.multiplier,
        })
    }

    /// Points needed to prestige at the current prestige level.
    #[must_use]
    pub fn prestige_requirement(&self) -> u64 {
        let exponent = level_exponent(self.state.prestige_level);
        floor_f64_to_u64(PRESTIGE_BASE_REQUIREMENT * 2_f64.powi(exponent))
    }

    #[must_use]
    pub fn can_prestige(&self) -> bool {
        self.is_at_max_layer() && self.state.points >= self.prestige_requirement()
    }

    /// Trade the whole rebirth cycle for a permanent multiplier.
    pub fn prestige(&mut self) -> Option<PrestigeSummary> {
        if !self.can_prestige() {
            return None;
        }
        let points_spent = self.state.points;
        let state = &mut self.state;
        state.points = 0;
        state.combo = 0;
        state.streak = 0;
        state.current_layer_index = 0;
        state.upgrades.clear();
        state.prestige_level = state.prestige_level.saturating_add(1);
        self.normalize();
        log::debug!(
            "prestige level {} reached, multiplier {:.2}",
            self.state.prestige_level,
            self.state.multiplier
        );
        self.sweep_achievements(None);
        Some(PrestigeSummary {
            prestige_level: self.state.prestige_level,
            points_spent,
            multiplier: self.state.multiplier,
        })
    }

    /// Spend prestige points on a temporary multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressionError::UpgradeLocked`] without the prestige
    /// investment upgrade and [`ProgressionError::InsufficientPrestige`] when
    /// the balance is too low.
    pub fn invest_prestige(&mut self) -> Result<(), ProgressionError> {
        if self.state.level_of(UpgradeId::PrestigeInvestment) == 0 {
            return Err(ProgressionError::UpgradeLocked {
                id: UpgradeId::PrestigeInvestment,
                reason: LockReason::NotOwned,
            });
        }
        if self.state.prestige_points < PRESTIGE_INVESTMENT_COST {
            return Err(ProgressionError::InsufficientPrestige {
                needed: PRESTIGE_INVESTMENT_COST,
                available: self.state.prestige_points,
            });
        }
        self.state.prestige_points -= PRESTIGE_INVESTMENT_COST;
        self.events.start(TimedEventKind::PrestigeInvestment);
        Ok(())
    }

    /// Accrue passive prestige points for `elapsed_ms`; returns the amount added.
    pub fn accrue_prestige(&mut self, elapsed_ms: u64) -> f64 {
        let per_second = self
            .upgrades
            .effect_number(&self.state.upgrades, UpgradeId::PrestigeGeneration);
        if per_second <= 0.0 {
            return 0.0;
        }
        let gained = per_second * u64_to_f64(elapsed_ms) / 1_000.0;
        self.state.prestige_points += gained;
        gained
    }

    pub fn start_event(&mut self, kind: TimedEventKind) {
        self.events.start(kind);
    }

    /// Age timed events; returns those that expired.
    pub fn advance_events(&mut self, elapsed_ms: u64) -> Vec<TimedEventKind> {
        self.events.advance(elapsed_ms)
    }

    pub fn queue_event_roll(&mut self, kind: EventRollKind) {
        self.pending_event_rolls.push_back(kind);
    }

    #[must_use]
    pub fn pending_event_rolls(&self) -> &VecDeque<EventRollKind> {
        &self.pending_event_rolls
    }

    pub fn set_auto_roll(&mut self, enabled: bool) {
        self.state.auto_roll_enabled = enabled;
    }

    /// Whether the scheduler should fire auto-rolls.
    #[must_use]
    pub fn auto_roll_active(&self) -> bool {
        self.state.auto_roll_enabled && self.state.has_feature(Feature::AutoRoll)
    }

    #[must_use]
    pub fn auto_roll_interval_ms(&self) -> u64 {
        let interval = self
            .upgrades
            .effect_number(&self.state.upgrades, UpgradeId::AutoSpeed);
        floor_f64_to_u64(interval).max(1)
    }

    /// Achievements unlocked since the last call.
    pub fn take_new_achievements(&mut self) -> Vec<String> {
        std::mem::take(&mut self.new_achievements)
    }

    /// Return to a fresh state, discarding history and events.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn check_purchase(&self, id: UpgradeId) -> Result<u64, ProgressionError> {
        let def = self
            .upgrades
            .get(id)
            .ok_or_else(|| UnknownUpgradeId(id.as_str().to_string()))?;
        let current = self.state.current_layer_index;
        if current < def.required_layer {
            return Err(ProgressionError::UpgradeLocked {
                id,
                reason: LockReason::LayerGate {
                    required: def.required_layer,
                    current,
                },
            });
        }
        let level = self.state.level_of(id);
        if def.is_maxed(level) {
            return Err(ProgressionError::UpgradeLocked {
                id,
                reason: LockReason::MaxLevel(def.max_level),
            });
        }
        let cost = def.cost_at(level);
        if cost > self.state.points {
            return Err(ProgressionError::InsufficientFunds {
                needed: cost,
                available: self.state.points,
            });
        }
        Ok(cost)
    }

    fn normalize(&mut self) {
        let layers = self.layers;
        let upgrades = self.upgrades;
        let state = &mut self.state;
        state.current_layer_index = state.current_layer_index.min(layers.max_index());
        state.upgrades.retain(|id, level| {
            let Some(def) = upgrades.get(*id) else {
                return false;
            };
            *level = (*level).min(def.max_level);
            *level > 0
        });
        state.unlocked_features = layers.features_through(state.current_layer_index);
        if !state.prestige_points.is_finite() || state.prestige_points < 0.0 {
            state.prestige_points = 0.0;
        }
        self.refresh_multiplier();
    }

    fn refresh_multiplier(&mut self) {
        self.state.multiplier = derive_multiplier(
            self.layers,
            self.upgrades,
            self.state.current_layer_index,
            &self.state.upgrades,
            self.state.prestige_level,
        );
    }

    fn track_roll_time(&mut self, now_ms: u64) {
        let keep = self
            .achievements
            .longest_window()
            .map_or(1, |(count, _)| count.max(1));
        self.roll_times.push_back(now_ms);
        while self.roll_times.len() > keep {
            self.roll_times.pop_front();
        }
    }

    fn sweep_achievements(&mut self, last_roll: Option<&RollOutcome>) {
        let ctx = AchievementContext {
            state: &self.state,
            last_roll,
            range_max: self.current_layer().roll_range.max,
            roll_times: &self.roll_times,
        };
        let unlocked = self.achievements.newly_met(&ctx);
        for id in unlocked {
            log::debug!("achievement unlocked: {id}");
            self.state.achievements.insert(id.clone());
            self.new_achievements.push(id);
        }
    }
}

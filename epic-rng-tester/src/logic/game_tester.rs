use anyhow::Result;
use std::hash::Hasher;
use std::sync::Arc;
use twox_hash::XxHash64;

use epic_rng_game::{ProgressionModel, ProgressionState, RollHistory, RollStatistics};

use crate::logic::policy::{GameplayStrategy, PlayerAction};
use crate::logic::simulation::{DecisionRecord, SimulationConfig, SimulationSession, TurnOutcome};

pub const DEFAULT_MAX_TURNS: u32 = 2_000;
const DECISION_LOG_LIMIT: usize = 64;

/// Declarative plan for running a simulation session.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub strategy: GameplayStrategy,
    pub max_turns: Option<u32>,
    pub tick_ms: Option<u64>,
    pub setup: Option<fn(&mut ProgressionState)>,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(strategy: GameplayStrategy) -> Self {
        Self {
            strategy,
            max_turns: None,
            tick_ms: None,
            setup: None,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    #[must_use]
    pub const fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = Some(tick_ms);
        self
    }

    #[must_use]
    pub fn with_setup(mut self, setup: fn(&mut ProgressionState)) -> Self {
        self.setup = Some(setup);
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// Aggregate counters collected turn by turn.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub turns: u32,
    pub manual_rolls: u64,
    pub auto_rolls: u64,
    pub manual_points: u64,
    pub auto_points: u64,
    pub purchases: u32,
    pub refused_actions: u32,
    pub rebirths: u32,
    pub prestiges: u32,
    pub investments: u32,
    pub events_started: u32,
    pub autosaves_due: u32,
    pub highest_layer: usize,
    /// Turn on which each layer above zero was first reached.
    pub layer_turns: Vec<(usize, u32)>,
    pub decision_log: Vec<DecisionRecord>,
}

impl RunMetrics {
    pub fn record_turn(&mut self, outcome: &TurnOutcome) {
        self.turns = outcome.turn;
        if let Some(points) = outcome.manual_points {
            self.manual_rolls += 1;
            self.manual_points = self.manual_points.saturating_add(points);
        }
        self.auto_rolls += u64::try_from(outcome.auto_rolls).unwrap_or(u64::MAX);
        self.auto_points = self.auto_points.saturating_add(outcome.auto_points);
        self.events_started += u32::try_from(outcome.events_started).unwrap_or(u32::MAX);
        if outcome.autosave_due {
            self.autosaves_due += 1;
        }

        let decision = &outcome.decision;
        if decision.accepted {
            match decision.action {
                PlayerAction::Purchase(_) => self.purchases += 1,
                PlayerAction::Rebirth => self.rebirths += 1,
                PlayerAction::Prestige => self.prestiges += 1,
                PlayerAction::InvestPrestige => self.investments += 1,
                PlayerAction::Roll | PlayerAction::Idle => {}
            }
        } else {
            self.refused_actions += 1;
        }
        if !matches!(decision.action, PlayerAction::Roll | PlayerAction::Idle) {
            self.decision_log.push(decision.clone());
            if self.decision_log.len() > DECISION_LOG_LIMIT {
                self.decision_log.remove(0);
            }
        }

        if outcome.layer > self.highest_layer {
            self.highest_layer = outcome.layer;
            self.layer_turns.push((outcome.layer, outcome.turn));
        }
    }
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub strategy: GameplayStrategy,
    pub initial_state: ProgressionState,
    pub turns: Vec<TurnOutcome>,
    pub metrics: RunMetrics,
    pub final_state: ProgressionState,
    pub history: RollHistory,
    pub statistics: Option<RollStatistics>,
    /// Hash of the final state, equal across runs with the same seed and plan.
    pub fingerprint: u64,
    pub ending_message: String,
    pub game_ended: bool,
}

/// Headless deterministic runner for the progression model.
#[derive(Debug, Clone)]
pub struct GameTester {
    verbose: bool,
}

impl GameTester {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub const fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> SimulationSummary {
        let max_turns = plan.max_turns.unwrap_or(DEFAULT_MAX_TURNS);
        let mut config = SimulationConfig::new(plan.strategy, seed).with_max_turns(max_turns);
        if let Some(tick_ms) = plan.tick_ms {
            config = config.with_tick_ms(tick_ms);
        }

        let mut initial_state = ProgressionState::default();
        if let Some(setup) = plan.setup {
            setup(&mut initial_state);
        }
        let model = ProgressionModel::from_state(initial_state);
        let initial_state = model.state().clone();

        if self.verbose {
            log_initial_state(seed, plan, &initial_state);
        }

        let mut session = SimulationSession::new(config, model);
        let mut policy = plan.strategy.create_policy(seed);
        let mut metrics = RunMetrics::default();
        let mut turns = Vec::new();

        if max_turns == 0 {
            let game = session.into_session();
            let final_state = game.model().state().clone();
            return SimulationSummary {
                seed,
                strategy: plan.strategy,
                fingerprint: state_fingerprint(&final_state),
                initial_state,
                turns,
                metrics,
                final_state,
                history: game.model().history().clone(),
                statistics: None,
                ending_message: "Simulation not executed".to_string(),
                game_ended: false,
            };
        }

        loop {
            let outcome = session.advance(policy.as_mut());
            metrics.record_turn(&outcome);

            if self.verbose {
                log_turn(&outcome);
            }

            let finished = outcome.game_ended;
            turns.push(outcome);

            if finished {
                break;
            }
        }

        let game = session.into_session();
        let final_state = game.model().state().clone();
        let history = game.model().history().clone();
        let (ending_message, game_ended) = turns.last().map_or_else(
            || ("Simulation produced no turns".to_string(), false),
            |last| (last.message.clone(), last.game_ended),
        );

        SimulationSummary {
            seed,
            strategy: plan.strategy,
            fingerprint: state_fingerprint(&final_state),
            initial_state,
            turns,
            metrics,
            statistics: history.statistics(),
            history,
            final_state,
            ending_message,
            game_ended,
        }
    }
}

/// XxHash64 over the JSON encoding of `state`.
#[must_use]
pub fn state_fingerprint(state: &ProgressionState) -> u64 {
    let payload = serde_json::to_vec(state).unwrap_or_default();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&payload);
    hasher.finish()
}

fn log_initial_state(seed: u64, plan: &SimulationPlan, state: &ProgressionState) {
    println!(
        "🎲 Starting simulation | seed:{seed} policy:{}",
        plan.strategy.label()
    );
    println!(
        "📊 Initial state | Layer:{} Points:{} Multiplier:{:.2}",
        state.current_layer_index, state.points, state.multiplier
    );
}

fn log_turn(outcome: &TurnOutcome) {
    let decision = &outcome.decision;
    if !matches!(decision.action, PlayerAction::Roll | PlayerAction::Idle) {
        println!(
            "🎯 Turn {}: {} ({}){}",
            decision.turn,
            decision.action.label(),
            decision.policy_name,
            if decision.accepted { "" } else { " refused" }
        );
    }

    if outcome.turn % 250 == 0 || outcome.game_ended {
        println!(
            "📅 Turn {} | Layer:{} Points:{}",
            outcome.turn, outcome.layer, outcome.points
        );
    }

    if outcome.game_ended {
        println!("🏁 Simulation ended: {}", outcome.message);
    }
}

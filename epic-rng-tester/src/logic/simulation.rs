use epic_rng_game::{GameSession, ProgressionModel, RollOptions, Scheduler, SchedulerEvent};

use crate::logic::policy::{GameplayStrategy, PlayerAction, PlayerPolicy, PolicyDecision};

/// Configuration for a simulation session.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub seed: u64,
    pub strategy: GameplayStrategy,
    pub max_turns: u32,
    /// Simulated milliseconds between player turns.
    pub tick_ms: u64,
}

impl SimulationConfig {
    #[must_use]
    pub fn new(strategy: GameplayStrategy, seed: u64) -> Self {
        Self {
            seed,
            strategy,
            max_turns: 2_000,
            tick_ms: 250,
        }
    }

    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    #[must_use]
    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }
}

/// Snapshot of one policy decision.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub turn: u32,
    pub layer: usize,
    pub action: PlayerAction,
    pub accepted: bool,
    pub policy_name: String,
    pub rationale: Option<String>,
}

/// Result of advancing the simulation by one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn: u32,
    pub decision: DecisionRecord,
    pub manual_points: Option<u64>,
    pub auto_rolls: usize,
    pub auto_points: u64,
    pub events_started: usize,
    pub autosave_due: bool,
    pub layer: usize,
    pub points: u64,
    pub game_ended: bool,
    pub message: String,
}

/// Deterministic harness that lets a policy drive a [`GameSession`].
pub struct SimulationSession {
    session: GameSession,
    max_turns: u32,
    tick_ms: u64,
    turn: u32,
}

impl SimulationSession {
    pub fn new(config: SimulationConfig, model: ProgressionModel) -> Self {
        log::debug!(
            "simulation seed {} strategy {} for {} turns",
            config.seed,
            config.strategy,
            config.max_turns
        );
        Self {
            session: GameSession::new(model, Scheduler::default(), config.seed, 0),
            max_turns: config.max_turns,
            tick_ms: config.tick_ms,
            turn: 0,
        }
    }

    #[must_use]
    pub fn model(&self) -> &ProgressionModel {
        self.session.model()
    }

    #[must_use]
    pub fn into_session(self) -> GameSession {
        self.session
    }

    pub fn advance(&mut self, policy: &mut dyn PlayerPolicy) -> TurnOutcome {
        self.turn += 1;
        let PolicyDecision { action, rationale } = policy.decide(self.session.model());
        let layer = self.session.model().state().current_layer_index;

        let mut manual_points = None;
        let accepted = match action {
            PlayerAction::Roll => {
                let outcome = self.session.roll(RollOptions::manual());
                manual_points = Some(outcome.final_points);
                true
            }
            PlayerAction::Purchase(id) => match self.session.purchase(id) {
                Ok(_) => true,
                Err(err) => {
                    log::debug!("turn {} purchase of {id} refused: {err}", self.turn);
                    false
                }
            },
            PlayerAction::Rebirth => self.session.rebirth().is_some(),
            PlayerAction::Prestige => self.session.prestige().is_some(),
            PlayerAction::InvestPrestige => self.session.invest_prestige().is_ok(),
            PlayerAction::Idle => true,
        };

        let decision = DecisionRecord {
            turn: self.turn,
            layer,
            action,
            accepted,
            policy_name: policy.name().to_string(),
            rationale,
        };

        let mut auto_rolls = 0;
        let mut auto_points = 0_u64;
        let mut events_started = 0;
        let mut autosave_due = false;
        for event in self.session.advance(self.tick_ms) {
            match event {
                SchedulerEvent::AutoRoll(outcome) => {
                    auto_rolls += 1;
                    auto_points = auto_points.saturating_add(outcome.final_points);
                }
                SchedulerEvent::EventStarted(_) => events_started += 1,
                SchedulerEvent::AutoSaveDue => autosave_due = true,
                SchedulerEvent::EventExpired(_) | SchedulerEvent::PrestigeAccrued(_) => {}
            }
        }

        let state = self.session.model().state();
        let (game_ended, message) = if self.turn >= self.max_turns {
            (true, String::from("Max turns reached"))
        } else {
            (false, action.label())
        };

        TurnOutcome {
            turn: self.turn,
            decision,
            manual_points,
            auto_rolls,
            auto_points,
            events_started,
            autosave_due,
            layer: state.current_layer_index,
            points: state.points,
            game_ended,
            message,
        }
    }
}

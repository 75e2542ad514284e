pub mod catalog;

use anyhow::Result;

use crate::logic::{GameplayStrategy, SimulationPlan, SimulationSummary};
use catalog::find_catalog_scenario;

/// A named simulation plan with its expectations.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

/// Every run must keep its counters consistent with each other.
pub fn bookkeeping_expectation(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    let metrics = &summary.metrics;
    anyhow::ensure!(
        state.total_points_earned >= state.points,
        "Lifetime points {} fell below current points {}",
        state.total_points_earned,
        state.points
    );
    let expected_rolls =
        summary.initial_state.total_rolls + metrics.manual_rolls + metrics.auto_rolls;
    anyhow::ensure!(
        state.total_rolls == expected_rolls,
        "Roll count {} does not match {} recorded rolls",
        state.total_rolls,
        expected_rolls
    );
    anyhow::ensure!(
        state.rebirth_count == summary.initial_state.rebirth_count + metrics.rebirths,
        "Rebirth count drifted from accepted rebirths"
    );
    Ok(())
}

fn progress_expectation(summary: &SimulationSummary) -> Result<()> {
    bookkeeping_expectation(summary)?;
    anyhow::ensure!(
        summary.final_state.total_rolls > 0,
        "Run should roll at least once"
    );
    anyhow::ensure!(
        summary.final_state.total_points_earned > 0,
        "Run should earn points"
    );
    Ok(())
}

fn first_rebirth_expectation(summary: &SimulationSummary) -> Result<()> {
    progress_expectation(summary)?;
    anyhow::ensure!(
        summary.metrics.highest_layer >= 1,
        "Greedy play should clear the first layer within {} turns",
        summary.metrics.turns
    );
    Ok(())
}

fn smoke_scenario() -> TestScenario {
    TestScenario::simulation(
        "Smoke Test",
        SimulationPlan::new(GameplayStrategy::Greedy)
            .with_max_turns(200)
            .with_expectation(progress_expectation),
    )
}

fn strategy_scenario(name: &'static str, strategy: GameplayStrategy) -> TestScenario {
    let plan = SimulationPlan::new(strategy).with_expectation(progress_expectation);
    let plan = if matches!(strategy, GameplayStrategy::Greedy) {
        plan.with_expectation(first_rebirth_expectation)
    } else {
        plan
    };
    TestScenario::simulation(name, plan)
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    match name.to_lowercase().as_str() {
        "smoke" => Some(smoke_scenario()),
        "greedy-strategy" | "greedy" => Some(strategy_scenario(
            "Greedy Strategy Test",
            GameplayStrategy::Greedy,
        )),
        "rebirth-rush-strategy" | "rebirth-rush" => Some(strategy_scenario(
            "Rebirth Rush Strategy Test",
            GameplayStrategy::RebirthRush,
        )),
        "idle-strategy" | "idle" => Some(strategy_scenario(
            "Idle Strategy Test",
            GameplayStrategy::Idle,
        )),
        "prestige-hunter-strategy" | "prestige-hunter" => Some(strategy_scenario(
            "Prestige Hunter Strategy Test",
            GameplayStrategy::PrestigeHunter,
        )),
        "monte-carlo-strategy" | "monte-carlo" => Some(strategy_scenario(
            "Monte Carlo Strategy Test",
            GameplayStrategy::MonteCarlo,
        )),

        "default-state" | "defaults" => find_catalog_scenario("Default Progression State"),
        "deterministic-replay" | "deterministic" => {
            find_catalog_scenario("Deterministic Replay")
        }
        "layer-monotonicity" | "layers" => find_catalog_scenario("Layer Monotonicity"),
        "multiplier-derivation" | "multiplier" => {
            find_catalog_scenario("Multiplier Derivation")
        }
        "save-round-trip" | "saves" => find_catalog_scenario("Save Round Trip"),
        "upgrade-caps" | "upgrades" => find_catalog_scenario("Upgrade Level Caps"),
        "achievement-unlocks" | "achievements" => find_catalog_scenario("Achievement Unlocks"),
        "prestige-reset" | "prestige" => find_catalog_scenario("Prestige Reset"),
        "auto-roll" | "automation" => find_catalog_scenario("Auto-Roll Progression"),
        "autosave-cadence" | "autosave" => find_catalog_scenario("Autosave Cadence"),
        _ => None,
    }
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Smoke Test"),
        ("greedy-strategy", "Greedy Strategy Test"),
        ("rebirth-rush-strategy", "Rebirth Rush Strategy Test"),
        ("idle-strategy", "Idle Strategy Test"),
        ("prestige-hunter-strategy", "Prestige Hunter Strategy Test"),
        ("monte-carlo-strategy", "Monte Carlo Strategy Test"),
        ("default-state", "Default Progression State"),
        ("deterministic-replay", "Deterministic Replay"),
        ("layer-monotonicity", "Layer Monotonicity"),
        ("multiplier-derivation", "Multiplier Derivation"),
        ("save-round-trip", "Save Round Trip"),
        ("upgrade-caps", "Upgrade Level Caps"),
        ("achievement-unlocks", "Achievement Unlocks"),
        ("prestige-reset", "Prestige Reset"),
        ("auto-roll", "Auto-Roll Progression"),
        ("autosave-cadence", "Autosave Cadence"),
    ]
}

use anyhow::{Result, anyhow};

use crate::common::scenario::{TestScenario, bookkeeping_expectation};
use crate::logic::{GameTester, GameplayStrategy, SimulationPlan, SimulationSummary};
use epic_rng_game::{
    LoadSource, MemoryStore, ProgressionModel, ProgressionState, SaveKind, SaveManager, upgrades,
};

const AUTOSAVE_TICK_MS: u64 = 5_000;
const AUTOSAVE_INTERVAL_MS: u64 = 30_000;

pub fn catalog_scenarios() -> Vec<TestScenario> {
    vec![
        TestScenario::simulation(
            "Default Progression State",
            SimulationPlan::new(GameplayStrategy::Greedy)
                .with_max_turns(0)
                .with_expectation(default_state_expectation),
        ),
        TestScenario::simulation(
            "Deterministic Replay",
            replay_plan().with_expectation(deterministic_replay_expectation),
        ),
        TestScenario::simulation(
            "Layer Monotonicity",
            SimulationPlan::new(GameplayStrategy::Greedy)
                .with_max_turns(1_500)
                .with_expectation(bookkeeping_expectation)
                .with_expectation(layer_monotonicity_expectation),
        ),
        TestScenario::simulation(
            "Multiplier Derivation",
            SimulationPlan::new(GameplayStrategy::MonteCarlo)
                .with_max_turns(800)
                .with_expectation(multiplier_derivation_expectation),
        ),
        TestScenario::simulation(
            "Save Round Trip",
            SimulationPlan::new(GameplayStrategy::Greedy)
                .with_max_turns(600)
                .with_expectation(save_round_trip_expectation),
        ),
        TestScenario::simulation(
            "Upgrade Level Caps",
            SimulationPlan::new(GameplayStrategy::Greedy)
                .with_max_turns(400)
                .with_setup(wealthy_final_layer)
                .with_expectation(upgrade_caps_expectation),
        ),
        TestScenario::simulation(
            "Achievement Unlocks",
            SimulationPlan::new(GameplayStrategy::Greedy)
                .with_max_turns(500)
                .with_expectation(achievement_expectation),
        ),
        TestScenario::simulation(
            "Prestige Reset",
            SimulationPlan::new(GameplayStrategy::PrestigeHunter)
                .with_max_turns(50)
                .with_setup(prestige_ready)
                .with_expectation(bookkeeping_expectation)
                .with_expectation(prestige_reset_expectation),
        ),
        TestScenario::simulation(
            "Auto-Roll Progression",
            SimulationPlan::new(GameplayStrategy::Idle)
                .with_max_turns(120)
                .with_tick_ms(1_000)
                .with_setup(second_layer)
                .with_expectation(bookkeeping_expectation)
                .with_expectation(auto_roll_expectation),
        ),
        TestScenario::simulation(
            "Autosave Cadence",
            SimulationPlan::new(GameplayStrategy::Greedy)
                .with_max_turns(120)
                .with_tick_ms(AUTOSAVE_TICK_MS)
                .with_expectation(autosave_cadence_expectation),
        ),
    ]
}

pub fn find_catalog_scenario(name: &str) -> Option<TestScenario> {
    catalog_scenarios()
        .into_iter()
        .find(|scenario| scenario.name == name)
}

fn replay_plan() -> SimulationPlan {
    SimulationPlan::new(GameplayStrategy::MonteCarlo).with_max_turns(600)
}

fn wealthy_final_layer(state: &mut ProgressionState) {
    state.current_layer_index = 10;
    state.points = 1_000_000_000_000;
}

fn prestige_ready(state: &mut ProgressionState) {
    state.current_layer_index = 10;
    state.points = 20_000_000_000_000;
}

fn second_layer(state: &mut ProgressionState) {
    state.current_layer_index = 1;
}

fn default_state_expectation(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.initial_state;
    anyhow::ensure!(state.points == 0, "Fresh game should hold no points");
    anyhow::ensure!(state.current_layer_index == 0, "Fresh game starts on layer 0");
    anyhow::ensure!(
        (state.multiplier - 1.0).abs() < f64::EPSILON,
        "Fresh multiplier should be 1.0, got {}",
        state.multiplier
    );
    anyhow::ensure!(
        state.unlocked_features.is_empty(),
        "Layer 0 unlocks no features"
    );
    anyhow::ensure!(state.auto_roll_enabled, "Auto-roll defaults to enabled");

    let model = ProgressionModel::new();
    let range = model.current_layer().roll_range;
    anyhow::ensure!(
        range.min == 1 && range.max == 6,
        "First layer should roll 1-6, got {}-{}",
        range.min,
        range.max
    );
    anyhow::ensure!(
        model.next_layer().map(|layer| layer.point_requirement) == Some(1_000),
        "First rebirth should cost 1000 points"
    );
    Ok(())
}

fn deterministic_replay_expectation(summary: &SimulationSummary) -> Result<()> {
    let replay = GameTester::new(false).run_plan(&replay_plan(), summary.seed);
    anyhow::ensure!(
        replay.fingerprint == summary.fingerprint,
        "Seed {} replayed to fingerprint {:#x}, expected {:#x}",
        summary.seed,
        replay.fingerprint,
        summary.fingerprint
    );
    anyhow::ensure!(
        replay.history == summary.history,
        "Seed {} replayed a different roll history",
        summary.seed
    );
    Ok(())
}

fn layer_monotonicity_expectation(summary: &SimulationSummary) -> Result<()> {
    let mut previous = summary.initial_state.current_layer_index;
    for turn in &summary.turns {
        anyhow::ensure!(
            turn.layer >= previous,
            "Layer dropped from {previous} to {} on turn {}",
            turn.layer,
            turn.turn
        );
        previous = turn.layer;
    }

    let layers = epic_rng_game::layers::catalog();
    for pair in summary.metrics.layer_turns.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        anyhow::ensure!(upper.1 > lower.1, "Layers reached out of order");
        let (Some(a), Some(b)) = (layers.get(lower.0), layers.get(upper.0)) else {
            return Err(anyhow!("Reached a layer missing from the catalog"));
        };
        anyhow::ensure!(
            a.point_requirement < b.point_requirement && a.multiplier < b.multiplier,
            "Layer {} should be harder and stronger than layer {}",
            upper.0,
            lower.0
        );
    }
    Ok(())
}

fn multiplier_derivation_expectation(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    let rebuilt = ProgressionModel::from_state(ProgressionState {
        multiplier: -1.0,
        ..state.clone()
    });
    let derived = rebuilt.state().multiplier;
    anyhow::ensure!(
        (derived - state.multiplier).abs() <= 1e-9 * derived.abs().max(1.0),
        "Stored multiplier {} does not match derivation {}",
        state.multiplier,
        derived
    );
    anyhow::ensure!(derived >= 1.0, "Multiplier fell below 1.0");
    Ok(())
}

fn save_round_trip_expectation(summary: &SimulationSummary) -> Result<()> {
    let model = ProgressionModel::with_history(summary.final_state.clone(), summary.history.clone());
    let store = MemoryStore::new();
    let mut manager = SaveManager::new(store.clone());
    manager.save(&model, SaveKind::Manual, 1_000)?;

    let loaded = SaveManager::new(store).load(2_000);
    anyhow::ensure!(
        loaded.source == LoadSource::Main,
        "Fresh save should load from the main slot, got {:?}",
        loaded.source
    );
    anyhow::ensure!(
        loaded.model.state() == model.state(),
        "Loaded state differs from the saved state"
    );

    let exported = manager.export_text(&model, 3_000)?;
    let imported = manager.import_text(&exported)?;
    anyhow::ensure!(
        imported.state() == model.state(),
        "Export/import changed the state"
    );
    Ok(())
}

fn upgrade_caps_expectation(summary: &SimulationSummary) -> Result<()> {
    anyhow::ensure!(
        summary.metrics.purchases > 0,
        "A wealthy player should buy something"
    );
    let catalog = upgrades::catalog();
    for (&id, &level) in &summary.final_state.upgrades {
        let def = catalog
            .get(id)
            .ok_or_else(|| anyhow!("Owned upgrade {id} missing from catalog"))?;
        anyhow::ensure!(
            level <= def.max_level,
            "{id} reached level {level} past its cap {}",
            def.max_level
        );
    }
    Ok(())
}

fn achievement_expectation(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    let expect = |id: &str, reached: bool| -> Result<()> {
        anyhow::ensure!(
            !reached || state.has_achievement(id),
            "Achievement {id} should be unlocked"
        );
        Ok(())
    };
    expect("first_roll", state.total_rolls >= 1)?;
    expect("hundred_rolls", state.total_rolls >= 100)?;
    expect("first_rebirth", state.rebirth_count >= 1)?;
    expect("millionaire", state.total_points_earned >= 1_000_000)?;
    anyhow::ensure!(
        state.has_achievement("first_roll"),
        "A 500-turn run should at least roll once"
    );
    Ok(())
}

fn prestige_reset_expectation(summary: &SimulationSummary) -> Result<()> {
    let state = &summary.final_state;
    anyhow::ensure!(
        summary.metrics.prestiges == 1,
        "Expected exactly one prestige, saw {}",
        summary.metrics.prestiges
    );
    anyhow::ensure!(state.prestige_level == 1, "Prestige level should be 1");
    let first = summary
        .turns
        .first()
        .ok_or_else(|| anyhow!("Prestige run produced no turns"))?;
    anyhow::ensure!(first.layer == 0, "Prestige should reset to layer 0");
    anyhow::ensure!(
        state.multiplier >= 1.1 - 1e-9,
        "Prestige bonus missing from multiplier {}",
        state.multiplier
    );
    anyhow::ensure!(
        state.has_achievement("prestige_master"),
        "Prestige achievement should unlock"
    );
    Ok(())
}

fn auto_roll_expectation(summary: &SimulationSummary) -> Result<()> {
    let metrics = &summary.metrics;
    anyhow::ensure!(
        metrics.manual_rolls == 0,
        "Idle play on layer 1 should never roll by hand"
    );
    anyhow::ensure!(
        metrics.auto_rolls >= u64::from(metrics.turns) - 1,
        "Expected roughly one auto-roll per second, saw {} over {} turns",
        metrics.auto_rolls,
        metrics.turns
    );
    Ok(())
}

fn autosave_cadence_expectation(summary: &SimulationSummary) -> Result<()> {
    let elapsed = u64::from(summary.metrics.turns) * AUTOSAVE_TICK_MS;
    let expected = elapsed / AUTOSAVE_INTERVAL_MS;
    anyhow::ensure!(
        u64::from(summary.metrics.autosaves_due) == expected,
        "Expected {expected} autosaves over {elapsed} ms, saw {}",
        summary.metrics.autosaves_due
    );
    Ok(())
}

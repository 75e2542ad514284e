use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::common::scenario::TestScenario;
use crate::logic::game_tester::{GameTester, SimulationPlan, SimulationSummary};

/// Outcome of one scenario over one base seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub strategy: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    /// Deepest layer any iteration finished on.
    pub highest_layer: usize,
    pub failures: Vec<String>,
    #[serde(with = "millis")]
    pub average_duration: Duration,
    #[serde(with = "millis::list")]
    pub performance_data: Vec<Duration>,
}

/// Runs scenarios seed by seed, iteration by iteration.
pub struct LogicTester {
    tester: GameTester,
}

impl LogicTester {
    pub const fn new(tester: GameTester) -> Self {
        Self { tester }
    }

    /// One result per base seed. Iteration `i` plays `seed + i`.
    pub fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        seeds
            .iter()
            .map(|&seed| self.run_seed(scenario, seed, iterations))
            .collect()
    }

    fn run_seed(&self, scenario: &TestScenario, seed: u64, iterations: usize) -> ScenarioResult {
        let verbose = self.tester.verbose();
        if verbose {
            println!(
                "🧪 {} | {} | base seed {seed}",
                scenario.name.bright_white(),
                scenario.plan.strategy
            );
        }

        let mut tally = IterationTally::default();
        for (index, offset) in (0..iterations).zip(0_u64..) {
            let started = Instant::now();
            let summary = self.tester.run_plan(&scenario.plan, seed.wrapping_add(offset));
            let elapsed = started.elapsed();
            tally.observe_layer(summary.final_state.current_layer_index);

            match first_failed_expectation(&scenario.plan, &summary) {
                Some(reason) => {
                    log::warn!(
                        "{} failed on seed {}: {reason}",
                        scenario.name,
                        summary.seed
                    );
                    if verbose {
                        println!(
                            "  ❌ {}/{iterations} seed {}: {}",
                            index + 1,
                            summary.seed,
                            reason.as_str().red()
                        );
                    }
                    tally.failures.push(describe_failure(&summary, &reason));
                }
                None => {
                    if verbose {
                        let best = summary
                            .statistics
                            .as_ref()
                            .map(|stats| {
                                format!(
                                    ", best {} ({:.1}% crit)",
                                    stats.best.final_points, stats.critical_rate
                                )
                            })
                            .unwrap_or_default();
                        println!(
                            "  ✅ {}/{iterations} seed {} in {elapsed:?}: layer {} after {} rolls{best}",
                            index + 1,
                            summary.seed,
                            summary.final_state.current_layer_index,
                            summary.final_state.total_rolls
                        );
                    }
                    tally.timings.push(elapsed);
                }
            }
        }

        tally.finish(scenario, seed, iterations)
    }
}

#[derive(Debug, Default)]
struct IterationTally {
    timings: Vec<Duration>,
    failures: Vec<String>,
    highest_layer: usize,
}

impl IterationTally {
    fn observe_layer(&mut self, layer: usize) {
        self.highest_layer = self.highest_layer.max(layer);
    }

    fn average(&self) -> Duration {
        match u32::try_from(self.timings.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => self.timings.iter().sum::<Duration>() / count,
        }
    }

    fn finish(self, scenario: &TestScenario, seed: u64, iterations: usize) -> ScenarioResult {
        ScenarioResult {
            scenario_name: scenario.name.clone(),
            strategy: scenario.plan.strategy.label().to_string(),
            seed,
            passed: self.failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: self.timings.len(),
            highest_layer: self.highest_layer,
            average_duration: self.average(),
            failures: self.failures,
            performance_data: self.timings,
        }
    }
}

fn first_failed_expectation(plan: &SimulationPlan, summary: &SimulationSummary) -> Option<String> {
    plan.expectations
        .iter()
        .find_map(|expectation| expectation.evaluate(summary).err())
        .map(|err| format!("{err:#}"))
}

fn describe_failure(summary: &SimulationSummary, reason: &str) -> String {
    let state = &summary.final_state;
    format!(
        "seed {} after {} turns ({}): {reason} | layer {} points {} rolls {} rebirths {} | {}",
        summary.seed,
        summary.turns.len(),
        summary.ending_message,
        state.current_layer_index,
        state.points,
        state.total_rolls,
        state.rebirth_count,
        recent_decisions(summary)
    )
}

fn recent_decisions(summary: &SimulationSummary) -> String {
    let log = &summary.metrics.decision_log;
    if log.is_empty() {
        return "no decisions recorded".to_string();
    }
    log.iter()
        .rev()
        .take(3)
        .map(|entry| {
            format!(
                "t{} L{} {}{}{}",
                entry.turn,
                entry.layer,
                entry.action.label(),
                if entry.accepted { "" } else { " (refused)" },
                entry
                    .rationale
                    .as_deref()
                    .map(|why| format!(" [{why}]"))
                    .unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Durations as whole milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    fn to_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(to_millis(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub mod list {
        use super::to_millis;
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(
            durations: &[Duration],
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.collect_seq(durations.iter().copied().map(to_millis))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<Duration>, D::Error> {
            Vec::<u64>::deserialize(deserializer)
                .map(|values| values.into_iter().map(Duration::from_millis).collect())
        }
    }
}

mod common;
mod logic;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use common::scenario::{get_scenario, list_scenarios};
use common::split_csv;
use logic::{GameTester, LogicTester, ScenarioResult, resolve_seed_inputs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Console,
    Json,
    Markdown,
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "epic-rng-tester", version)]
#[command(about = "Plays the Epic RNG progression model with scripted policies and checks the results")]
struct Args {
    /// Comma-separated scenario keys; `all` adds every known scenario
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// Print the scenario keys and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Base seeds: integers, 0x hex or half-open a..b ranges
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Consecutive seeds played per base seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Print every iteration and policy decision
    #[arg(short, long)]
    verbose: bool,

    /// Write the report (or scenario list) here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_scenarios {
        let mut out = open_output(args.output.as_deref())?;
        write_scenario_list(&mut out)?;
        out.flush()?;
        return Ok(());
    }

    println!("{}", "🎲 Epic RNG Automated Tester".bright_cyan().bold());
    println!("{}", "=".repeat(28).cyan());

    let started = Instant::now();
    let scenario_keys = expand_scenarios(&args.scenarios);
    let seeds: Vec<u64> = resolve_seed_inputs(&split_csv(&args.seeds))?
        .into_iter()
        .map(|info| {
            if let Some(token) = &info.source {
                log::debug!("seed {} expanded from {token}", info.seed);
            }
            info.seed
        })
        .collect();
    log::info!(
        "{} scenario(s) x {} seed(s) x {} iteration(s)",
        scenario_keys.len(),
        seeds.len(),
        args.iterations
    );

    let tester = LogicTester::new(GameTester::new(args.verbose));
    let results = run_scenarios(&tester, &scenario_keys, &seeds, args.iterations);

    let mut out = open_output(args.output.as_deref())?;
    write_report(&mut out, args.report, &results, started.elapsed())?;
    out.flush()?;

    if results.iter().any(|result| !result.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot write report to {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(std::io::stdout())),
    })
}

fn write_scenario_list(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Available scenarios:")?;
    for (key, name) in list_scenarios() {
        writeln!(out, "  {key:25} - {name}")?;
    }
    Ok(())
}

/// Split the scenario argument, replacing `all` with every listed key not already named.
fn expand_scenarios(raw: &str) -> Vec<String> {
    let (wildcards, mut keys): (Vec<String>, Vec<String>) = split_csv(raw)
        .into_iter()
        .partition(|key| key.eq_ignore_ascii_case("all"));
    if !wildcards.is_empty() {
        for (key, _) in list_scenarios() {
            if !keys.iter().any(|named| named == key) {
                keys.push(key.to_string());
            }
        }
    }
    keys
}

fn run_scenarios(
    tester: &LogicTester,
    keys: &[String],
    seeds: &[u64],
    iterations: usize,
) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running scenarios".bright_yellow().bold());
    keys.iter()
        .filter_map(|key| {
            let scenario = get_scenario(key);
            if scenario.is_none() {
                eprintln!("⚠️  Unknown scenario: {}", key.yellow());
            }
            scenario
        })
        .flat_map(|scenario| tester.run_scenario(&scenario, seeds, iterations))
        .collect()
}

fn write_report(
    out: &mut dyn Write,
    format: ReportFormat,
    results: &[ScenarioResult],
    elapsed: Duration,
) -> Result<()> {
    match format {
        ReportFormat::Json => logic::reports::generate_json_report(out, results)?,
        ReportFormat::Csv => logic::reports::generate_csv_report(out, results)?,
        ReportFormat::Markdown if results.is_empty() => {
            writeln!(out, "# Epic RNG Logic Test Results\n\n_No scenarios executed._")?;
        }
        ReportFormat::Markdown => logic::reports::generate_markdown_report(out, results)?,
        ReportFormat::Console if results.is_empty() => {
            writeln!(out, "No logic scenarios executed.")?;
        }
        ReportFormat::Console => logic::reports::generate_console_report(out, results, elapsed)?,
    }

    if matches!(format, ReportFormat::Console | ReportFormat::Markdown) {
        writeln!(out, "\n🏁 Total time: {elapsed:?}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Smoke Test".to_string(),
            strategy: "Greedy".to_string(),
            seed: 1337,
            passed,
            iterations_run: 3,
            successful_iterations: if passed { 3 } else { 2 },
            highest_layer: 1,
            failures: if passed {
                Vec::new()
            } else {
                vec!["layer dropped".to_string()]
            },
            average_duration: Duration::from_millis(10),
            performance_data: vec![Duration::from_millis(10)],
        }
    }

    fn render(format: ReportFormat, results: &[ScenarioResult]) -> String {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        write_report(&mut buf, format, results, Duration::from_millis(5)).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn all_keyword_appends_every_scenario_once() {
        let expanded = expand_scenarios("smoke,ALL");
        assert_eq!(expanded[0], "smoke");
        assert!(expanded.contains(&"save-round-trip".to_string()));
        assert_eq!(expanded.iter().filter(|key| *key == "smoke").count(), 1);
        assert_eq!(expanded.len(), list_scenarios().len());
    }

    #[test]
    fn named_scenarios_keep_their_order() {
        assert_eq!(expand_scenarios("idle, smoke"), vec!["idle", "smoke"]);
    }

    #[test]
    fn unknown_scenarios_are_skipped() {
        let tester = LogicTester::new(GameTester::new(false));
        let results = run_scenarios(
            &tester,
            &["no-such-scenario".to_string(), "defaults".to_string()],
            &[42],
            1,
        );
        assert_eq!(results.len(), 1);
        assert!(results[0].passed);
    }

    #[test]
    fn empty_json_report_is_an_empty_array() {
        let parsed: Vec<ScenarioResult> =
            serde_json::from_str(&render(ReportFormat::Json, &[])).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn json_report_round_trips_results() {
        let text = render(ReportFormat::Json, &[sample_result(true)]);
        let parsed: Vec<ScenarioResult> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].scenario_name, "Smoke Test");
        assert!(!text.contains("Total time"));
    }

    #[test]
    fn empty_markdown_report_says_so() {
        let text = render(ReportFormat::Markdown, &[]);
        assert!(text.contains("No scenarios executed"));
        assert!(text.contains("Total time"));
    }

    #[test]
    fn csv_report_has_one_row_per_result() {
        let text = render(ReportFormat::Csv, &[sample_result(false)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "Smoke Test,Greedy,1337,false,3,2,1,10,1");
    }

    #[test]
    fn console_report_ends_with_total_time() {
        let text = render(ReportFormat::Console, &[sample_result(true)]);
        assert!(text.contains("Smoke Test"));
        assert!(text.trim_end().ends_with("Total time: 5ms"));
    }

    #[test]
    fn scenario_list_names_every_key() {
        let mut buf = Vec::new();
        write_scenario_list(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Available scenarios:"));
        assert!(text.contains("autosave-cadence"));
        assert_eq!(text.lines().count(), list_scenarios().len() + 1);
    }

    #[test]
    fn report_file_is_created_on_disk() {
        let path = std::env::temp_dir().join(format!("epic-rng-report-{}.txt", std::process::id()));
        let mut out = open_output(Some(&path)).unwrap();
        write_scenario_list(&mut out).unwrap();
        out.flush().unwrap();
        drop(out);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("smoke"));
        std::fs::remove_file(path).unwrap();
    }
}

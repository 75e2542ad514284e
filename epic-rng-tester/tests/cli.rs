use std::path::PathBuf;
use std::process::{Command, Output};

fn report_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!("epic-rng-cli-{label}-{}", std::process::id()))
}

fn tester(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_epic-rng-tester"))
        .args(args)
        .output()
        .expect("tester binary runs")
}

fn run_with_report(label: &str, args: &[&str]) -> (Output, String) {
    let path = report_path(label);
    let path_arg = path.to_string_lossy().into_owned();
    let mut full: Vec<&str> = args.to_vec();
    full.extend(["--output", path_arg.as_str()]);
    let output = tester(&full);
    let report = std::fs::read_to_string(&path).unwrap_or_default();
    let _ = std::fs::remove_file(&path);
    (output, report)
}

#[test]
fn listing_scenarios_skips_the_banner() {
    let (output, report) = run_with_report("list", &["--list-scenarios"]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    assert!(report.starts_with("Available scenarios:"));
    assert!(report.contains("deterministic-replay"));
}

#[test]
fn json_run_reports_every_scenario_seed_pair() {
    let (output, report) = run_with_report(
        "json",
        &[
            "--report",
            "json",
            "--scenarios",
            "smoke,defaults",
            "--iterations",
            "1",
            "--seeds",
            "1,2",
        ],
    );
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Epic RNG Automated Tester"));
    let parsed: serde_json::Value = serde_json::from_str(&report).expect("json report");
    let rows = parsed.as_array().expect("array of results");
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| row["passed"] == true));
    assert_eq!(rows[0]["scenario_name"], "Smoke Test");
    assert_eq!(rows[2]["scenario_name"], "Default Progression State");
}

#[test]
fn csv_run_over_a_seed_range() {
    let (output, report) = run_with_report(
        "csv",
        &[
            "--report",
            "csv",
            "--scenarios",
            "autosave",
            "--iterations",
            "1",
            "--seeds",
            "10..13",
        ],
    );
    assert!(output.status.success());
    let rows: Vec<&str> = report.lines().skip(1).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].starts_with("Autosave Cadence,Greedy,10,true"));
}

#[test]
fn bad_seed_token_fails_with_its_name() {
    let output = tester(&["--seeds", "not-a-seed", "--iterations", "1"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not-a-seed"));
}

#[test]
fn unknown_report_format_is_rejected_by_clap() {
    let output = tester(&["--report", "yaml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("yaml"));
}

mod common;

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;

use common::TestWorkspace;

fn analytics(workspace: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("callcenter-analytics").expect("binary exists");
    // Keep a stray config.yaml in the caller's directory out of the run.
    cmd.current_dir(workspace.path());
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout is JSON")
}

#[test]
fn analyze_writes_report_and_cleaned_table() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 45);
    let report_path = workspace.path().join("report.json");
    let cleaned_path = workspace.path().join("cleaned.csv");

    analytics(&workspace)
        .args([
            "analyze",
            "-i",
            input.to_str().unwrap(),
            "-o",
            report_path.to_str().unwrap(),
            "--cleaned-output",
            cleaned_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("KPI SUMMARY"))
        .stdout(contains("PERFORMANCE TARGETS"))
        .stdout(contains("STRONG CORRELATIONS"))
        .stdout(contains("Rows loaded: 45"));

    let report: Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).expect("report JSON");
    assert_eq!(report["rows_analyzed"], 45);
    assert!(report["kpis"]["quality"]["csat_avg"].is_number());

    let cleaned = fs::read_to_string(&cleaned_path).unwrap();
    let header = cleaned.lines().next().unwrap();
    assert!(header.starts_with("date,agent_id,team,handle_time"));
    assert_eq!(cleaned.lines().count(), 46);
}

#[test]
fn analyze_prints_json_on_request() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 40);

    let report = json_stdout(analytics(&workspace).args([
        "analyze",
        "-i",
        input.to_str().unwrap(),
        "--format",
        "json",
        "--require",
        "Team,Region",
    ]));

    assert_eq!(report["rows_loaded"], 40);
    assert_eq!(report["validation"]["schema"]["missing"][0], "Region");
    assert_eq!(report["targets"]["performance"][0]["indicator"], "aht");
}

#[test]
fn analyze_refuses_small_samples() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("few.csv", 12);

    analytics(&workspace)
        .args(["analyze", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Insufficient data: 12 rows (minimum: 30)"));
}

#[test]
fn config_file_lowers_the_minimum_sample() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("few.csv", 12);
    workspace.write_config("analysis:\n  min_data_points: 10\n");

    analytics(&workspace)
        .args(["validate", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Sufficient data: 12 rows"));
}

#[test]
fn invalid_config_is_reported() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 30);
    let config = workspace.write("bad.yaml", "analysis:\n  outlier_std: -1\n");

    analytics(&workspace)
        .args([
            "validate",
            "-c",
            config.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("outlier_std must be positive"));
}

#[test]
fn validate_reports_failed_checks() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 30);

    analytics(&workspace)
        .args([
            "validate",
            "-i",
            input.to_str().unwrap(),
            "--expect",
            "Team=numeric",
            "--range",
            "CSAT Score=1:3.5",
        ])
        .assert()
        .failure()
        .stdout(contains("✗ Team: Expected numeric, got string"))
        .stdout(contains("✗ CSAT Score: 10 value(s) out of range"))
        .stderr(contains("Validation failed: 2 check(s) did not pass"));
}

#[test]
fn validate_json_includes_quality_report() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 30);

    let output = json_stdout(analytics(&workspace).args([
        "validate",
        "-i",
        input.to_str().unwrap(),
        "-f",
        "json",
    ]));

    assert_eq!(output["quality_report"]["total_rows"], 30);
    assert_eq!(output["quality_report"]["duplicate_rows"], 0);
    assert_eq!(output["sufficient_data"]["sufficient"], true);
}

#[test]
fn kpi_summary_lists_indicators_in_upper_case() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 20);

    analytics(&workspace)
        .args(["kpi", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("PERFORMANCE METRICS:"))
        .stdout(contains("  AHT: "))
        .stdout(contains("  QA_SCORE_AVG: "));
}

#[test]
fn correlate_ranks_drivers_and_fits_regressions() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 50);

    let output = json_stdout(analytics(&workspace).args([
        "correlate",
        "-i",
        input.to_str().unwrap(),
        "--target",
        "QA Score",
        "--pca",
        "2",
        "-f",
        "json",
    ]));

    assert_eq!(output["method"], "pearson");
    assert_eq!(output["drivers"][0]["column"], "handle_time");
    assert_eq!(output["regressions"][0]["feature"], "handle_time");
    assert_eq!(output["pca"]["explained_variance_ratio"].as_array().unwrap().len(), 2);
}

#[test]
fn correlate_rejects_unknown_target() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 20);

    analytics(&workspace)
        .args(["correlate", "-i", input.to_str().unwrap(), "--target", "Revenue"])
        .assert()
        .failure()
        .stderr(contains("Column 'revenue' not found"));
}

#[test]
fn trend_buckets_by_week() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("daily.csv", "Date,Handle Time\n2024-01-01,100\n2024-01-02,200\n2024-01-10,400\n");

    let buckets = json_stdout(analytics(&workspace).args([
        "trend",
        "-i",
        input.to_str().unwrap(),
        "-m",
        "Handle Time",
        "--period",
        "week",
        "-f",
        "json",
    ]));

    let buckets = buckets.as_array().unwrap();
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0]["period"], "2024-01-07");
    assert_eq!(buckets[0]["mean"], 150.0);
    assert_eq!(buckets[1]["count"], 1);
}

#[test]
fn anomalies_flag_and_export_rows() {
    let workspace = TestWorkspace::new();
    let mut csv = String::from("agent,handle_time\n");
    for idx in 0..30 {
        csv.push_str(&format!("a{idx},{}\n", 300 + idx % 4));
    }
    csv.push_str("spike,4000\n");
    let input = workspace.write("spike.csv", &csv);
    let flagged_path = workspace.path().join("flagged.csv");

    let output = json_stdout(analytics(&workspace).args([
        "anomalies",
        "-i",
        input.to_str().unwrap(),
        "--column",
        "handle_time",
        "-o",
        flagged_path.to_str().unwrap(),
        "-f",
        "json",
    ]));

    assert_eq!(output["flagged"], 1);
    assert_eq!(output["flagged_rows"][0], 30);
    let written = fs::read_to_string(&flagged_path).unwrap();
    assert!(written.lines().next().unwrap().ends_with(",is_anomaly"));
    assert_eq!(written.lines().count(), 32);
}

#[test]
fn compare_two_groups_runs_t_test() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 40);

    let output = json_stdout(analytics(&workspace).args([
        "compare",
        "-i",
        input.to_str().unwrap(),
        "--value",
        "Handle Time",
        "--group",
        "Team",
        "-f",
        "json",
    ]));

    assert!(output["t_test"]["statistic"].is_number());
    assert!(output["distributions"]["ks_test"]["p_value"].is_number());
    assert!(output["intervals"]["North"]["lower"].is_number());
    assert!(output.get("anova").is_none());
}

#[test]
fn compare_with_unknown_group_fails() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 20);

    analytics(&workspace)
        .args([
            "compare",
            "-i",
            input.to_str().unwrap(),
            "--value",
            "handle_time",
            "--group",
            "team",
            "--groups",
            "North,West",
        ])
        .assert()
        .failure()
        .stderr(contains("Group 'West' not found"));
}

#[test]
fn normality_runs_on_selected_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_calls("calls.csv", 40);

    let results = json_stdout(analytics(&workspace).args([
        "normality",
        "-i",
        input.to_str().unwrap(),
        "-C",
        "Handle Time,QA Score",
        "-f",
        "json",
    ]));

    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["column"], "handle_time");
    assert_eq!(results[0]["sample_size"], 40);
}

#[test]
fn decompose_reports_each_day() {
    let workspace = TestWorkspace::new();
    let mut csv = String::from("Date,Calls Answered\n");
    for day in 1..=21 {
        csv.push_str(&format!("2024-03-{day:02},{}\n", 50 + day % 7));
    }
    let input = workspace.write("daily.csv", &csv);

    analytics(&workspace)
        .args([
            "decompose",
            "-i",
            input.to_str().unwrap(),
            "--value",
            "Calls Answered",
        ])
        .assert()
        .success()
        .stdout(contains("seasonal"))
        .stdout(contains("2024-03-21"));
}

#[test]
fn missing_input_reports_not_found() {
    let workspace = TestWorkspace::new();

    analytics(&workspace)
        .args(["kpi", "-i", "does/not/exist.csv"])
        .assert()
        .failure()
        .stderr(contains("not found"));
}

#[test]
fn semicolon_delimiter_flag_is_honoured() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("calls.txt", "handle_time;first_call_resolution\n300;1\n360;0\n");

    let output = json_stdout(analytics(&workspace).args([
        "kpi",
        "-i",
        input.to_str().unwrap(),
        "--delimiter",
        ";",
        "-f",
        "json",
    ]));

    assert_eq!(output["kpis"]["performance"]["aht"], 330.0);
    assert_eq!(output["kpis"]["performance"]["fcr_rate"], 0.5);
}

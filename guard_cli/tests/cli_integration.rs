use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir, toml: &str) -> PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

// Simulated tool parked on the surface 3 cm from the hole.
const OFF_HOLE: &str = r#"
[sim]
start = [0.03, 0.0, 0.30]
"#;

// Out of camera view; the servo gives up quickly and descent lands on the surface.
const OUT_OF_VIEW: &str = r#"
[servo]
lost_patience = 3

[sim]
start = [0.07, 0.0, 0.30]
"#;

#[rstest]
#[case(&["--help"], "", 0, "Usage:", "stdout")]
#[case(&["self-check"], "", 0, "OK", "stdout")]
#[case(&["descend"], "", 0, "Inserted", "stdout")]
#[case(&["insert"], "", 0, "Inserted", "stdout")]
#[case(&["descend"], OFF_HOLE, 6, "Not inserted", "stdout")]
#[case(&["insert", "--max-retries", "2"], OUT_OF_VIEW, 6, "failed after 2 attempts", "stdout")]
#[case(&["approach"], "", 0, "BudgetExpired", "stdout")]
#[case(&["self-check"], "[control]\nrate_hz = 0", 5, "control.rate_hz must be > 0", "stderr")]
#[case(&["self-check"], "[force]\nwindow = \"big\"", 1, "not valid TOML", "stderr")]
#[case(&["approach", "--distance", "0"], "", 5, "approach distance must be non-zero", "stderr")]
#[case(&["insert", "--max-retries", "0"], "", 5, "max-retries", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] toml: &str,
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, toml);

    let mut cmd = Command::cargo_bin("guard").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("warn");
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("guard")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not read the config file"));
}

#[test]
fn cli_reports_bad_trace_header() {
    let dir = tempdir().unwrap();
    let bad_csv = dir.path().join("trace.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "z,force").unwrap();
    writeln!(f, "0.30,0.0").unwrap();

    Command::cargo_bin("guard")
        .unwrap()
        .arg("--trace")
        .arg(&bad_csv)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

fn write_trace(dir: &tempfile::TempDir, rows: &[(f64, f64)]) -> PathBuf {
    let path = dir.path().join("trace.csv");
    let mut f = fs::File::create(&path).unwrap();
    writeln!(f, "height,fx,fy,fz").unwrap();
    for (h, fz) in rows {
        writeln!(f, "{h},0.0,0.0,{fz}").unwrap();
    }
    path
}

#[test]
fn descend_replays_a_clean_trace() {
    let dir = tempdir().unwrap();
    let heights = [0.30, 0.28, 0.26, 0.24, 0.23, 0.22, 0.21, 0.20, 0.19, 0.18];
    let rows: Vec<(f64, f64)> = heights.iter().map(|h| (*h, 0.0)).collect();
    let trace = write_trace(&dir, &rows);

    let out = Command::cargo_bin("guard")
        .unwrap()
        .arg("--json")
        .arg("--log-level")
        .arg("warn")
        .arg("--trace")
        .arg(&trace)
        .arg("descend")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let line = stdout.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["command"], "descend");
    assert_eq!(v["success"], true);
    assert_eq!(v["fast_stop"], "HeightCutoff");
    assert_eq!(v["slow_stop"], "HeightCutoff");
    assert!((v["final_height"].as_f64().unwrap() - 0.18).abs() < 1e-9);
}

#[test]
fn json_approach_reports_contact_and_trip() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[sim]\nstart = [0.03, 0.0, 0.24]\n");

    let out = Command::cargo_bin("guard")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("--log-level")
        .arg("warn")
        .arg("approach")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(0));
    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(v["stop"], "Contact");
    assert_eq!(v["retracted"], true);
    assert_eq!(v["trip"]["axis"], "z");
}

#[test]
fn json_errors_carry_reason() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[force]\nwarmup = 30\nwindow = 25\n");

    let out = Command::cargo_bin("guard")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("self-check")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(5));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .expect("json error line");
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "InvalidConfig");
    assert!(v["message"].as_str().unwrap().contains("force.warmup"));
}

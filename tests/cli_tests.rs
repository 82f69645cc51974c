//! Integration tests for the CLI interface
//!
//! Runs the binary against datasets and configs in temporary directories

mod common;

use assert_cmd::Command;
use common::{TestContext, REPORT_2006};
use predicates::prelude::*;
use std::fs;

fn gamesales() -> Command {
    let mut cmd = Command::cargo_bin("gamesales").unwrap();
    for key in [
        "GAMESALES_SOURCE_URL",
        "GAMESALES_YEAR",
        "GAMESALES_YEAR_SEED",
        "GAMESALES_LOG_LEVEL",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_cli_help_flag() {
    gamesales()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("schedule"));
}

#[test]
fn test_invalid_command() {
    gamesales()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_year_from_default_seed() {
    let ctx = TestContext::new().unwrap();
    gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .arg("year")
        .assert()
        .success()
        .stdout("1994\n");
}

#[test]
fn test_year_from_env_seed() {
    let ctx = TestContext::new().unwrap();
    gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .arg("year")
        .env("GAMESALES_YEAR_SEED", "a")
        .assert()
        .success()
        .stdout("1995\n");
}

#[test]
fn test_run_prints_report() {
    let ctx = TestContext::new().unwrap();
    let expected = format!("{}\n", REPORT_2006.join("\n"));

    gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .args(["run", "--year", "2006"])
        .assert()
        .success()
        .stdout(expected);
}

#[test]
fn test_run_is_default_command() {
    let ctx = TestContext::new().unwrap();

    gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .env("GAMESALES_YEAR", "1994")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Best-selling game worldwide in 1994: Donkey Kong Country",
        ))
        .stdout(predicate::str::contains(
            "Games that sold better in Europe than in Japan in 1994: 0",
        ));
}

#[test]
fn test_run_with_source_override() {
    let ctx = TestContext::new().unwrap();
    let other = ctx.dir().join("other.csv");
    fs::write(
        &other,
        "Name,Platform,Year,Genre,Publisher,NA_Sales,EU_Sales,JP_Sales,Other_Sales,Global_Sales\n\
         Tetris,GB,2006,Puzzle,Nintendo,0.5,0.7,0.2,0.1,1.5\n",
    )
    .unwrap();

    gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .args(["run", "--year", "2006", "--source"])
        .arg(&other)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Best-selling game worldwide in 2006: Tetris",
        ));
}

#[test]
fn test_run_json_format() {
    let ctx = TestContext::new().unwrap();

    let output = gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .args(["run", "--year", "2006", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["year"], 2006);
    assert_eq!(report["results"].as_array().unwrap().len(), 5);
    assert_eq!(report["results"][0]["value"], "Wii Sports");
    assert_eq!(report["results"][4]["value"], "3");
}

#[test]
fn test_absent_year_still_prints_every_line() {
    let ctx = TestContext::new().unwrap();

    let output = gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .args(["run", "--year", "2000"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 5);
    assert_eq!(stdout.matches("Error printing data for").count(), 4);
    assert!(stdout.ends_with("Games that sold better in Europe than in Japan in 2000: 0\n"));
}

#[test]
fn test_missing_source_fails() {
    let ctx = TestContext::new().unwrap();
    let missing = ctx.dir().join("missing.csv");

    gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .args(["run", "--source"])
        .arg(&missing)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("missing.csv"));
}

#[test]
fn test_schema_mismatch_fails() {
    let ctx = TestContext::with_csv("Name,Year\nTetris,1989\n").unwrap();

    gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required columns"));
}

#[test]
fn test_catchup_config_is_rejected() {
    let ctx = TestContext::new().unwrap();
    let config = ctx.dir().join("catchup.toml");
    fs::write(&config, "[schedule]\ncatchup = true\n").unwrap();

    gamesales()
        .arg("-c")
        .arg(&config)
        .arg("year")
        .assert()
        .failure()
        .stderr(predicate::str::contains("catchup"));
}

#[test]
fn test_plan_lists_stages() {
    let ctx = TestContext::new().unwrap();

    gamesales()
        .arg("-c")
        .arg(ctx.config_path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("stage 0: load_data"))
        .stdout(predicate::str::contains("top_title_worldwide"))
        .stdout(predicate::str::contains("stage 2: print_report"));
}

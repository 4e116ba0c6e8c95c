//! Runs the `legions` binary end to end

use serde_json::Value;
use std::process::Command;

fn legions() -> Command {
    Command::new(env!("CARGO_BIN_EXE_legions"))
}

#[test]
fn test_play_json_report() {
    let output = legions()
        .args([
            "play",
            "--games",
            "2",
            "--seed",
            "3",
            "--time-limit-ms",
            "20",
            "--max-turns",
            "4",
            "--json",
            "--log-level",
            "warn",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    let games = report["games"].as_array().unwrap();
    assert_eq!(games.len(), 2);
    assert_eq!(games[0]["seed"], 3);
    assert_eq!(games[1]["seed"], 4);
    assert_eq!(report["wins"].as_array().unwrap().len(), 2);
}

#[test]
fn test_bad_player_count_fails() {
    let output = legions().args(["play", "--players", "9"]).output().unwrap();
    assert!(!output.status.success());
}

//! Basic CLI E2E tests.
//!
//! Tests run the built binary against a throwaway config directory.

use std::io::Write;
use std::process::{Command, Stdio};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(config_dir: &std::path::Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_geoalarm-cli"))
        .args(args)
        .env("GEOALARM_CONFIG_DIR", config_dir)
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("event line is JSON"))
        .collect()
}

#[test]
fn test_distance_same_point() {
    let dir = tempfile::tempdir().unwrap();
    let (out, _, code) = run_cli(dir.path(), &["distance", "18.5,73.86", "18.5,73.86"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["distance_meters"], 0.0);
}

#[test]
fn test_distance_negative_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let (out, _, code) = run_cli(dir.path(), &["distance", "-6.2088,106.8456", "-6.9175,107.6191"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    let d = json["distance_meters"].as_f64().unwrap();
    assert!(d > 100_000.0 && d < 150_000.0, "got {d}");
}

#[test]
fn test_distance_rejects_bad_point() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["distance", "95,0", "0,0"]);
    assert_ne!(code, 0);
}

#[test]
fn test_check_near_and_missing() {
    let dir = tempfile::tempdir().unwrap();
    let (out, _, code) = run_cli(
        dir.path(),
        &["check", "--position", "18.51,73.86", "--destination", "18.5,73.86", "--threshold", "2"],
    );
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["is_near"], true);
    assert_eq!(json["threshold_km"], 2);

    let (out, _, code) = run_cli(dir.path(), &["check", "--destination", "18.5,73.86"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert!(json["distance_meters"].is_null());
    assert_eq!(json["is_near"], false);
    assert_eq!(json["threshold_km"], 5);
}

#[test]
fn test_check_rejects_unsupported_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["check", "--threshold", "7"]);
    assert_ne!(code, 0);
}

#[test]
fn test_thresholds_list() {
    let dir = tempfile::tempdir().unwrap();
    let (out, _, code) = run_cli(dir.path(), &["thresholds"]);
    assert_eq!(code, 0);
    let values: Vec<&str> = out.lines().collect();
    assert_eq!(values, ["2", "3", "4", "5 (default)", "10", "20"]);
}

#[test]
fn test_config_set_get_list() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "proximity.threshold_km", "10"]);
    assert_eq!(code, 0);

    let (out, _, code) = run_cli(dir.path(), &["config", "get", "proximity.threshold_km"]);
    assert_eq!(code, 0);
    assert_eq!(out.trim(), "10");

    let (out, _, code) = run_cli(dir.path(), &["config", "list"]);
    assert_eq!(code, 0);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["proximity"]["threshold_km"], 10);
}

#[test]
fn test_config_rejects_unknown_key_and_bad_value() {
    let dir = tempfile::tempdir().unwrap();
    let (_, err, code) = run_cli(dir.path(), &["config", "get", "ui.dark_mode"]);
    assert_ne!(code, 0);
    assert!(err.contains("unknown key"));

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "proximity.threshold_km", "7"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_reset() {
    let dir = tempfile::tempdir().unwrap();
    run_cli(dir.path(), &["config", "set", "notifications.enabled", "false"]);
    let (_, _, code) = run_cli(dir.path(), &["config", "reset"]);
    assert_eq!(code, 0);
    let (out, _, _) = run_cli(dir.path(), &["config", "get", "notifications.enabled"]);
    assert_eq!(out.trim(), "true");
}

#[test]
fn test_watch_replays_track_and_alerts() {
    let dir = tempfile::tempdir().unwrap();
    let track = dir.path().join("commute.track");
    let mut f = std::fs::File::create(&track).unwrap();
    writeln!(f, "# approaching Pune").unwrap();
    writeln!(f, "18.70,73.86").unwrap();
    writeln!(f, "error:unavailable").unwrap();
    writeln!(f, "18.51,73.86").unwrap();
    drop(f);

    let (out, _, code) = run_cli(
        dir.path(),
        &[
            "watch",
            "--destination",
            "18.5,73.86",
            "--track",
            track.to_str().unwrap(),
            "--interval-ms",
            "50",
            "--duration-secs",
            "1",
            "--no-notify",
        ],
    );
    assert_eq!(code, 0);

    let events = json_lines(&out);
    let types: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
    assert_eq!(types.first(), Some(&"StateSnapshot"));
    assert_eq!(types.last(), Some(&"StateSnapshot"));
    assert!(types.contains(&"PositionLost"));

    let alerts: Vec<_> = events.iter().filter(|e| e["type"] == "ProximityAlert").collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["delivered"], false);

    let last = events.last().unwrap();
    assert_eq!(last["is_near"], true);
}

#[test]
fn test_watch_missing_track_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.track");
    let (_, err, code) = run_cli(
        dir.path(),
        &["watch", "--destination", "18.5,73.86", "--track", missing.to_str().unwrap()],
    );
    assert_ne!(code, 0);
    assert!(err.contains("error:"));
}

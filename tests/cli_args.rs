//! Integration tests for the flylist binary
//!
//! Runs the compiled CLI against a temporary data directory. Nothing here
//! needs network access: METAR lookups are only attempted without an API key.

use std::process::Command;
use tempfile::TempDir;

/// Helper to run the CLI with given args and capture output
fn run_cli(data_dir: &TempDir, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_flylist"))
        .arg("--data-dir")
        .arg(data_dir.path())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute flylist")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = Command::new(env!("CARGO_BIN_EXE_flylist"))
        .arg("--help")
        .output()
        .expect("Failed to execute flylist");
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = stdout(&output);
    assert!(stdout.contains("flylist"), "Help should mention flylist");
    assert!(stdout.contains("metar"), "Help should list the metar command");
}

#[test]
fn test_unknown_command_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&dir, &["takeoff"]);
    assert!(!output.status.success(), "Expected unknown command to fail");
}

#[test]
fn test_metar_without_key_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&dir, &["metar", "egll"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No METAR available for EGLL"));
}

#[test]
fn test_validate_key_without_key() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&dir, &["validate-key"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No API key configured"));
}

#[test]
fn test_settings_round_trip_through_binary() {
    let dir = TempDir::new().unwrap();
    assert!(run_cli(&dir, &["settings", "set-key", "abc123"]).status.success());
    assert!(run_cli(&dir, &["settings", "complete-setup"]).status.success());

    let output = run_cli(&dir, &["settings", "show"]);
    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("settings show should print JSON");
    assert_eq!(json["metar_api"]["key"], "abc123");
    assert_eq!(json["setup_complete"], true);
    assert!(dir.path().join("settings.json").exists());

    assert!(run_cli(&dir, &["settings", "clear-key"]).status.success());
    let json: serde_json::Value =
        serde_json::from_str(&stdout(&run_cli(&dir, &["settings", "show"]))).unwrap();
    assert!(json["metar_api"]["key"].is_null());
}

#[test]
fn test_cache_commands_on_empty_cache() {
    let dir = TempDir::new().unwrap();

    let output = run_cli(&dir, &["cache", "cleanup"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Removed 0 expired"));

    let output = run_cli(&dir, &["cache", "clear"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Cleared 0 cached"));
}

#[test]
fn test_import_airports_then_list_flights() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("airports.csv");
    std::fs::write(
        &csv,
        "id,ident,type,name,latitude_deg,longitude_deg,elevation_ft,continent,iso_country,iso_region,municipality,scheduled_service,icao_code,iata_code,gps_code,local_code,home_link,wikipedia_link,keywords\n\
         2434,EGLL,large_airport,London Heathrow Airport,51.4706,-0.461941,83,EU,GB,GB-ENG,London,yes,EGLL,LHR,EGLL,,https://www.heathrow.com/,,\n",
    )
    .unwrap();

    let output = run_cli(&dir, &["import", "airports", csv.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout(&output).contains("Imported 1 airport(s)"));
    assert!(dir.path().join("flylist.db").exists());

    let output = run_cli(&dir, &["flights"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No flights logged"));
}

#[test]
fn test_import_missing_file_prints_error() {
    let dir = TempDir::new().unwrap();
    let output = run_cli(&dir, &["import", "airlines", "does-not-exist.dat"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does-not-exist.dat"), "stderr was: {}", stderr);
}

//! CLI smoke tests for the commands that work without an API key or a
//! game server.
//!
//! These tests run the compiled binary with `HOME` pointed at a temp
//! directory so no real config is read.

use std::process::Command;

use tempfile::TempDir;

/// Helper: run gamepilot with given args and return (exit_code, stdout, stderr).
fn run_cli(home: &TempDir, args: &[&str]) -> (i32, String, String) {
    let bin = env!("CARGO_BIN_EXE_gamepilot");
    let output = Command::new(bin)
        .args(args)
        .env("HOME", home.path())
        .env("RUST_LOG", "off")
        .env_remove("GAMEPILOT_PROVIDER_API_KEY")
        .output()
        .expect("failed to execute gamepilot binary");
    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

#[test]
fn cli_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _stderr) = run_cli(&home, &[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("play"));
    assert!(stdout.contains("exec"));
}

#[test]
fn cli_version() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _stderr) = run_cli(&home, &["version"]);
    assert_eq!(code, 0);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn cli_config_path_points_into_home() {
    let home = TempDir::new().unwrap();
    let (code, stdout, _stderr) = run_cli(&home, &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.json"));
    assert!(stdout.contains(".gamepilot"));
}

#[test]
fn cli_config_show_redacts_secrets() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".gamepilot");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.json"),
        r#"{"game": {"username": "pilot", "password": "hunter2"}}"#,
    )
    .unwrap();

    let (code, stdout, _stderr) = run_cli(&home, &["config", "show"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("pilot"));
    assert!(!stdout.contains("hunter2"));
}

#[test]
fn cli_config_check_reports_unknown_fields() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".gamepilot");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.json"), r#"{"gmae": {}}"#).unwrap();

    let (code, stdout, _stderr) = run_cli(&home, &["config", "check"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Unknown field 'gmae'"));
}

#[test]
fn cli_play_without_api_key_fails() {
    let home = TempDir::new().unwrap();
    let (code, _stdout, stderr) = run_cli(&home, &["play"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("No API key configured"));
}

#[test]
fn cli_exec_rejects_non_object_payload() {
    let home = TempDir::new().unwrap();
    let (code, _stdout, stderr) = run_cli(&home, &["exec", "get_status", "--payload", "[1,2]"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("JSON object"));
}

#[test]
fn cli_exec_refuses_invalid_config() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join(".gamepilot");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.json"),
        r#"{"compaction": {"min_recent_messages": 0}}"#,
    )
    .unwrap();

    let (code, _stdout, stderr) = run_cli(&home, &["exec", "get_status"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("compaction.min_recent_messages"));
}

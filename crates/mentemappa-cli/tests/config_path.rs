use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("mentemappa")
        .env("MENTEMAPPA_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(dir.path().to_string_lossy().as_ref()));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    assert!(!config_path.exists());

    cargo_bin_cmd!("mentemappa")
        .env("MENTEMAPPA_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    assert!(config_path.exists());

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("model = \"gemini-3-flash-preview\""));
    assert!(contents.contains("# max_output_tokens ="));
    assert!(contents.contains("[viewport]"));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    fs::write(&config_path, "# existing config").unwrap();

    cargo_bin_cmd!("mentemappa")
        .env("MENTEMAPPA_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "# existing config");
}

#[test]
fn test_config_help_shows_subcommands() {
    cargo_bin_cmd!("mentemappa")
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("path"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "temperature = \"hot\"").unwrap();

    cargo_bin_cmd!("mentemappa")
        .env("MENTEMAPPA_HOME", dir.path())
        .args(["exec", "-p", "Sistema Solare"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}

#[test]
fn test_failure_is_written_to_log_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "temperature = \"hot\"").unwrap();

    cargo_bin_cmd!("mentemappa")
        .env("MENTEMAPPA_HOME", dir.path())
        .env_remove("MENTEMAPPA_LOG")
        .args(["exec", "-p", "Sistema Solare"])
        .assert()
        .failure();

    let log = fs::read_to_string(dir.path().join("logs").join("mentemappa.log")).unwrap();
    assert!(log.contains("command failed"));
    assert!(log.contains("Failed to parse config"));
}

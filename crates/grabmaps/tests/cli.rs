use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn grabmaps() -> Command {
    Command::cargo_bin("grabmaps").unwrap()
}

/// Sampled preset shrunk to small tiles so a simulated grab stays quick.
fn write_small_config(dir: &Path) -> std::path::PathBuf {
    let out = grabmaps().args(["preset", "sampled"]).output().unwrap();
    assert!(out.status.success());
    let mut config: Value = serde_json::from_slice(&out.stdout).unwrap();
    config["map_name"] = "Cli".into();
    config["map_folder"] = dir.join("tiles").to_string_lossy().into_owned().into();
    let viewer = &mut config["viewer"];
    viewer["tile_width"] = 64.into();
    viewer["tile_height"] = 48.into();
    viewer["overlap_x"] = 16.into();
    viewer["overlap_y"] = 12.into();
    let path = dir.join("grab.json");
    std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn preset_prints_viewer_constants() {
    grabmaps()
        .args(["preset", "direct"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"tile_width\": 800"))
        .stdout(predicate::str::contains("\"border_x\": 64"));
}

#[test]
fn preset_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sampled.json");
    grabmaps()
        .args(["preset", "sampled", "--output"])
        .arg(&path)
        .assert()
        .success();
    let config: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(config["viewer"]["tile_width"], 1024);
    assert_eq!(config["viewer"]["margins"]["top"], 104);
}

#[test]
fn simulate_writes_tiles_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_small_config(dir.path());
    let report = dir.path().join("report.json");
    grabmaps()
        .args(["simulate", "--mode", "sampled", "--config"])
        .arg(&config)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("completed:"))
        .stdout(predicate::str::contains("Serpentine"));

    let tiles = dir.path().join("tiles");
    assert!(tiles.join("Cli_0_0_0.png").is_file());
    assert!(tiles.join("Cli_0_0_0.gdm").is_file());
    assert!(tiles.join("Cli_1_0_0.gdm").is_file());

    let report: Value = serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(report["status"], "completed");
    assert_eq!(report["levels"][0]["strategy"], "serpentine");

    grabmaps()
        .arg("inspect")
        .arg(tiles.join("Cli_1_0_0.gdm"))
        .assert()
        .success()
        .stdout(predicate::str::contains("image: Cli_1_0_0.png"))
        .stdout(predicate::str::contains("size: 64x48"))
        .stdout(predicate::str::contains("(63, 47) ->"));
}

#[test]
fn simulate_direct_mode_with_zoom_override() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_small_config(dir.path());
    grabmaps()
        .args(["simulate", "--zoom-steps", "0", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("completed: 1 tiles"));
}

#[test]
fn simulate_without_config_uses_the_preset_of_the_mode() {
    let dir = tempfile::tempdir().unwrap();
    let tiles = dir.path().join("tiles");
    grabmaps()
        .args(["simulate", "--mode", "sampled", "--zoom-steps", "0", "--map-folder"])
        .arg(&tiles)
        .assert()
        .success()
        .stdout(predicate::str::contains("completed: 1 tiles"));

    grabmaps()
        .arg("inspect")
        .arg(tiles.join("Map_0_0_0.gdm"))
        .assert()
        .success()
        .stdout(predicate::str::contains("size: 1024x768"));
}

#[test]
fn inspect_missing_file_fails() {
    grabmaps()
        .args(["inspect", "does-not-exist.gdm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "map_name": "" }"#).unwrap();
    grabmaps()
        .args(["simulate", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("map name must not be empty"));
}

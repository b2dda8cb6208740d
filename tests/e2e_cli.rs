//! CLI end-to-end tests
//!
//! Tests for the vidtrim command-line interface.

mod common;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the vidtrim binary
#[allow(deprecated)]
fn vidtrim_cmd() -> Command {
    Command::cargo_bin("vidtrim").unwrap()
}

fn clip(dir: &Path) -> PathBuf {
    let path = dir.join("clip.mp4");
    common::write_clip(&path, 6_000, 90);
    path
}

// ---------------------------------------------------------------------------
// Basics
// ---------------------------------------------------------------------------

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = vidtrim_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = vidtrim_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("vidtrim"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = vidtrim_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_trim_help() {
    let mut cmd = vidtrim_cmd();
    cmd.args(["trim", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--start-ms"))
        .stdout(predicate::str::contains("--end-ms"));
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

#[test]
fn test_cli_probe_text() {
    let dir = tempdir().unwrap();
    let input = clip(dir.path());

    let mut cmd = vidtrim_cmd();
    cmd.arg("probe")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Tracks: 2"))
        .stdout(predicate::str::contains("Rotation: 90"))
        .stdout(predicate::str::contains("avc1"));
}

#[test]
fn test_cli_probe_json() {
    let dir = tempdir().unwrap();
    let input = clip(dir.path());

    let output = vidtrim_cmd()
        .args(["probe", "--json"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["rotation"], 90);
    assert_eq!(json["max_sync_interval_ms"], 1000);
    assert_eq!(json["tracks"][0]["media_type"], "video");
    assert_eq!(json["tracks"][0]["samples"], 150);
    assert_eq!(json["tracks"][1]["media_type"], "audio");
}

#[test]
fn test_cli_probe_missing_file() {
    let mut cmd = vidtrim_cmd();
    cmd.args(["probe", "/nonexistent/clip.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

// ---------------------------------------------------------------------------
// Trim
// ---------------------------------------------------------------------------

#[test]
fn test_cli_trim_explicit_output() {
    let dir = tempdir().unwrap();
    let input = clip(dir.path());
    let target = dir.path().join("cut.mp4");

    let mut cmd = vidtrim_cmd();
    cmd.arg("trim")
        .arg(&input)
        .args(["--start-ms", "1000", "--end-ms", "3000", "--rotation", "180"])
        .arg("--output")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("cut.mp4"));

    let media = vidtrim_media::Mp4File::open(&target).unwrap();
    assert_eq!(media.rotation(), Some(180));
    assert_eq!(media.tracks[0].sample_table.sample_count, 50);
}

#[test]
fn test_cli_trim_json_uses_configured_output_dir() {
    let dir = tempdir().unwrap();
    let input = clip(dir.path());
    let out_dir = dir.path().join("trimmed");
    let config = dir.path().join("vidtrim.toml");
    fs::write(
        &config,
        format!("[output]\ndir = {:?}\nprefix = \"trim_\"\n", out_dir.to_string_lossy()),
    )
    .unwrap();

    let output = vidtrim_cmd()
        .arg("-c")
        .arg(&config)
        .arg("trim")
        .arg(&input)
        .args(["--start-ms", "0", "--end-ms", "2000", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let written = PathBuf::from(json["output"].as_str().unwrap());
    assert!(written.starts_with(&out_dir));
    assert!(written.exists());
    assert_eq!(json["summary"]["rotation"], 90);
    assert_eq!(json["summary"]["tracks"][0]["samples"], 50);
}

#[test]
fn test_cli_trim_invalid_window_json() {
    let dir = tempdir().unwrap();
    let input = clip(dir.path());

    let mut cmd = vidtrim_cmd();
    cmd.arg("trim")
        .arg(&input)
        .args(["--start-ms", "3000", "--end-ms", "1000", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("INVALID_ARGUMENTS"));
}

#[test]
fn test_cli_trim_missing_source() {
    let dir = tempdir().unwrap();

    let mut cmd = vidtrim_cmd();
    cmd.arg("trim")
        .arg(dir.path().join("absent.mp4"))
        .args(["--start-ms", "0", "--end-ms", "1000"])
        .arg("--output")
        .arg(dir.path().join("out.mp4"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("SOURCE_OPEN_ERROR"));

    assert!(!dir.path().join("out.mp4").exists());
}

// ---------------------------------------------------------------------------
// Config validation
// ---------------------------------------------------------------------------

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("vidtrim.toml");
    fs::write(&config, "[remux]\nend_boundary = \"inclusive\"\n").unwrap();

    let mut cmd = vidtrim_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("End boundary: inclusive"));
}

#[test]
fn test_cli_validate_rejects_bad_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("vidtrim.toml");
    fs::write(&config, "[worker]\nqueue_depth = 0\n").unwrap();

    let mut cmd = vidtrim_cmd();
    cmd.arg("validate").arg(&config).assert().failure();
}

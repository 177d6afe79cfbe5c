//! Integration tests for the `camfleet` binary.
//!
//! Everything here runs offline: the stores live in a temp directory and
//! no command reaches the SDK bridge or a camera.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// A scratch home for one test: config file, data dir and download dir.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn config_path(&self) -> std::path::PathBuf {
        self.dir.path().join("config.toml")
    }

    /// Build a command for the binary that never touches the user's setup.
    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("camfleet");
        cmd.env("CAMFLEET_CONFIG", self.config_path())
            .env("CAMFLEET_DOWNLOAD_DIR", self.dir.path().join("media"))
            .env_remove("CAMFLEET_OUTPUT")
            .env_remove("CAMFLEET_ACTIVE_NETWORK")
            .env_remove("CAMFLEET_BRIDGE_URL")
            .env_remove("RUST_LOG")
            .arg("--data-dir")
            .arg(self.dir.path().join("data"));
        cmd
    }
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = cargo_bin_cmd!("camfleet").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_command_groups() {
    cargo_bin_cmd!("camfleet")
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("cameras")
                .and(predicate::str::contains("record"))
                .and(predicate::str::contains("shoots"))
                .and(predicate::str::contains("presets")),
        );
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("camfleet")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("camfleet"));
}

#[test]
fn test_completions_bash() {
    cargo_bin_cmd!("camfleet")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    cargo_bin_cmd!("camfleet")
        .arg("teleport")
        .assert()
        .code(2);
}

#[test]
fn test_invalid_output_format() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["-o", "xml", "cameras", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("xml"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_env() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_set_network_with_env_password() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args([
            "config",
            "set-network",
            "Studio",
            "--password-env",
            "STUDIO_PW",
            "--activate",
        ])
        .assert()
        .success();

    assert!(sandbox.config_path().exists());
    sandbox
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("password_env = \"STUDIO_PW\"")
                .and(predicate::str::contains("active_network = \"Studio\"")),
        );
}

#[test]
fn test_config_init_refuses_overwrite_without_tty() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.config_path(), "bridge_url = \"http://127.0.0.1:8765\"\n").unwrap();
    let output = sandbox.cmd().args(["config", "init"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

// ── Offline stores ──────────────────────────────────────────────────

#[test]
fn test_add_then_list_cameras() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["cameras", "add", "0001", "--name", "Left"])
        .assert()
        .success();

    let output = sandbox
        .cmd()
        .args(["-o", "json", "cameras", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let cameras: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let cameras = cameras.as_array().unwrap();
    assert_eq!(cameras.len(), 1);
    assert_eq!(cameras[0]["serial"], "0001");
    assert_eq!(cameras[0]["name"], "Left");
}

#[test]
fn test_duplicate_camera_is_conflict() {
    let sandbox = Sandbox::new();
    sandbox.cmd().args(["cameras", "add", "0001"]).assert().success();
    sandbox
        .cmd()
        .args(["cameras", "add", "0001"])
        .assert()
        .code(6);
}

#[test]
fn test_unknown_camera_is_not_found() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["cameras", "get", "9999"])
        .assert()
        .code(4);
}

#[test]
fn test_create_and_list_shoots() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["shoots", "create", "Beach"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["-o", "plain", "shoots", "list"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
    sandbox
        .cmd()
        .args(["takes", "list", "beach"])
        .assert()
        .success();
}

#[test]
fn test_create_and_list_presets() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["presets", "create", "Day", "--set", "resolution=1", "--set", "frame-rate=8"])
        .assert()
        .success();
    sandbox
        .cmd()
        .args(["-o", "json", "presets", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Day\""));
}

#[test]
fn test_missing_preset_is_not_found() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["presets", "get", "Missing"])
        .assert()
        .code(4);
}

#[test]
fn test_unknown_setting_is_usage_error() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["presets", "create", "X", "--set", "zoom=1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("zoom"));
}

//! Daemon process lifecycle specs.
//!
//! Starts a real `sbxd` against an isolated socket/artifact root and
//! drives it only through the `sbx` CLI, the way an operator would.

use crate::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn status_reports_a_freshly_started_daemon() {
    let daemon = spawn_daemon();
    cli()
        .args(["--socket", daemon.socket_path.to_str().expect("utf8 path"), "status"])
        .passes()
        .stdout_has("uptime")
        .stdout_has("active jobs: 0");
}

#[test]
#[serial]
fn status_json_output_is_well_formed() {
    let daemon = spawn_daemon();
    let socket = daemon.socket_path.to_str().expect("utf8 path").to_string();
    let stdout = cli().args(["--socket", &socket, "--format", "json", "status"]).passes().stdout();
    let body: serde_json::Value =
        serde_json::from_str(&stdout).expect("status --format json prints valid JSON");
    assert_eq!(body["active_jobs"], 0);
}

#[test]
#[serial]
fn a_freshly_started_daemon_has_no_sandboxes_or_jobs() {
    let daemon = spawn_daemon();
    let socket = daemon.socket_path.to_str().expect("utf8 path");
    cli().args(["--socket", socket, "sandbox", "list"]).passes();
    cli().args(["--socket", socket, "job", "list"]).passes();
    cli().args(["--socket", socket, "workspace", "list"]).passes();
    cli().args(["--socket", socket, "exposure", "list"]).passes();
}

#[test]
fn cli_reports_daemon_not_running_for_a_dead_socket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket = dir.path().join("nobody-home.sock");
    cli()
        .args(["--socket", socket.to_str().expect("utf8 path"), "status"])
        .fails_with(3)
        .stderr_has("not running");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("sbx").unwrap();
    let output = cmd.arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sandbox"));
    assert!(stdout.contains("workspace"));
}

#[test]
fn missing_socket_exits_with_daemon_not_running_code() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("does-not-exist.sock");
    let mut cmd = Command::cargo_bin("sbx").unwrap();
    cmd.args(["--socket", socket.to_str().unwrap(), "status"]);
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(3));
}

//! Shared helpers for workspace-level specs.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;
use std::process::Child;
use std::time::{Duration, Instant};

use assert_cmd::Command;

/// Fluent wrapper around an `sbx` CLI invocation.
pub struct Cli {
    cmd: Command,
    output: Option<std::process::Output>,
}

pub fn cli() -> Cli {
    Cli { cmd: Command::cargo_bin("sbx").expect("sbx binary built"), output: None }
}

impl Cli {
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    fn run(&mut self) -> &std::process::Output {
        if self.output.is_none() {
            self.output = Some(self.cmd.output().expect("sbx spawns"));
        }
        self.output.as_ref().expect("output captured")
    }

    pub fn passes(mut self) -> Self {
        let status = self.run().status;
        assert!(status.success(), "expected success, got {status}");
        self
    }

    pub fn fails_with(mut self, code: i32) -> Self {
        let status = self.run().status;
        assert_eq!(status.code(), Some(code), "unexpected exit code");
        self
    }

    pub fn stdout_has(mut self, needle: &str) -> Self {
        let stdout = String::from_utf8_lossy(&self.run().stdout).into_owned();
        assert!(stdout.contains(needle), "stdout did not contain {needle:?}:\n{stdout}");
        self
    }

    pub fn stderr_has(mut self, needle: &str) -> Self {
        let stderr = String::from_utf8_lossy(&self.run().stderr).into_owned();
        assert!(stderr.contains(needle), "stderr did not contain {needle:?}:\n{stderr}");
        self
    }

    pub fn stdout(mut self) -> String {
        String::from_utf8_lossy(&self.run().stdout).into_owned()
    }
}

/// A running `sbxd` daemon pointed at an isolated socket/artifact root under
/// a temp directory. Killed on drop.
pub struct Daemon {
    child: Child,
    pub socket_path: PathBuf,
    _dir: tempfile::TempDir,
}

pub fn spawn_daemon() -> Daemon {
    let dir = tempfile::tempdir().expect("tempdir");
    let socket_path = dir.path().join("operator.sock");
    let artifact_root = dir.path().join("artifacts");
    std::fs::create_dir_all(&artifact_root).expect("artifact root");

    let config_path = dir.path().join("sbxd.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
operator_socket_path = {socket:?}
artifact_root = {artifacts:?}
guest_listen_addr = "127.0.0.1:0"
"#,
            socket = socket_path.to_str().expect("utf8 socket path"),
            artifacts = artifact_root.to_str().expect("utf8 artifact root"),
        ),
    )
    .expect("write daemon config");

    let child = Command::cargo_bin("sbxd")
        .expect("sbxd binary built")
        .env("SBX_CONFIG", &config_path)
        .env("RUST_LOG", "warn")
        .spawn()
        .expect("sbxd spawns");

    let deadline = Instant::now() + Duration::from_secs(5);
    while !socket_path.exists() {
        assert!(Instant::now() < deadline, "sbxd did not create its operator socket in time");
        std::thread::sleep(Duration::from_millis(25));
    }

    Daemon { child, socket_path, _dir: dir }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud-init snippet writing and the job orchestrator's `vmid -> snippet`
//! map (spec section 6's snippet fields, section 3's ownership note).
//!
//! File I/O details of the snippet writer are out of scope; what's
//! specified is the shape of the snippet and that the orchestrator
//! tracks one descriptor per in-flight vmid so it can clean up on
//! failure or destroy.

use parking_lot::Mutex;
use sbx_core::Vmid;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The fields a guest's cloud-init snippet carries (spec section 6).
#[derive(Debug, Clone)]
pub struct CloudInitSnippet {
    pub hostname: String,
    pub ssh_public_key: String,
    pub bootstrap_token: String,
    pub controller_url: String,
}

#[derive(Debug, Error)]
pub enum SnippetError {
    #[error("failed to write snippet for vmid {vmid}: {source}")]
    Write { vmid: Vmid, #[source] source: std::io::Error },
    #[error("failed to remove snippet for vmid {vmid}: {source}")]
    Remove { vmid: Vmid, #[source] source: std::io::Error },
}

/// Writes/removes the on-disk snippet file; returns the path handed to
/// `Backend::configure` as `VmConfig.cloud_init`.
pub trait SnippetWriter: Send + Sync + 'static {
    fn write(&self, vmid: Vmid, snippet: &CloudInitSnippet) -> Result<PathBuf, SnippetError>;
    fn remove(&self, vmid: Vmid) -> Result<(), SnippetError>;
}

/// Renders a minimal cloud-init user-data document under `root/<vmid>.yaml`.
pub struct FsSnippetWriter {
    root: PathBuf,
}

impl FsSnippetWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, vmid: Vmid) -> PathBuf {
        self.root.join(format!("{vmid}.yaml"))
    }
}

impl SnippetWriter for FsSnippetWriter {
    fn write(&self, vmid: Vmid, snippet: &CloudInitSnippet) -> Result<PathBuf, SnippetError> {
        let path = self.path_for(vmid);
        let body = format!(
            "#cloud-config\nhostname: {}\nssh_authorized_keys:\n  - {}\nwrite_files:\n  - path: /etc/sbx/bootstrap-token\n    content: \"{}\"\n  - path: /etc/sbx/controller-url\n    content: \"{}\"\n",
            snippet.hostname, snippet.ssh_public_key, snippet.bootstrap_token, snippet.controller_url,
        );
        std::fs::create_dir_all(&self.root).map_err(|source| SnippetError::Write { vmid, source })?;
        std::fs::write(&path, body).map_err(|source| SnippetError::Write { vmid, source })?;
        Ok(path)
    }

    fn remove(&self, vmid: Vmid) -> Result<(), SnippetError> {
        let path = self.path_for(vmid);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SnippetError::Remove { vmid, source }),
        }
    }
}

/// The job orchestrator's in-memory `vmid -> snippet path` map. Rebuilt
/// lazily on restart: entries are only ever added by a live provision
/// pipeline, so a fresh process simply starts empty and repopulates as
/// jobs run; it never needs to recover entries for sandboxes that were
/// mid-flight when the process died.
#[derive(Default)]
pub struct SnippetMap {
    paths: Mutex<HashMap<Vmid, PathBuf>>,
}

impl SnippetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember(&self, vmid: Vmid, path: PathBuf) {
        self.paths.lock().insert(vmid, path);
    }

    pub fn get(&self, vmid: Vmid) -> Option<PathBuf> {
        self.paths.lock().get(&vmid).cloned()
    }

    pub fn forget(&self, vmid: Vmid) -> Option<PathBuf> {
        self.paths.lock().remove(&vmid)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::collections::HashSet;

    /// Records writes/removals without touching a filesystem.
    #[derive(Default)]
    pub struct FakeSnippetWriter {
        written: Mutex<HashSet<Vmid>>,
    }

    impl FakeSnippetWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn contains(&self, vmid: Vmid) -> bool {
            self.written.lock().contains(&vmid)
        }
    }

    impl SnippetWriter for FakeSnippetWriter {
        fn write(&self, vmid: Vmid, _snippet: &CloudInitSnippet) -> Result<PathBuf, SnippetError> {
            self.written.lock().insert(vmid);
            Ok(Path::new("/fake").join(format!("{vmid}.yaml")))
        }

        fn remove(&self, vmid: Vmid) -> Result<(), SnippetError> {
            self.written.lock().remove(&vmid);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_map_round_trips() {
        let map = SnippetMap::new();
        map.remember(Vmid(1), PathBuf::from("/a/1.yaml"));
        assert_eq!(map.get(Vmid(1)), Some(PathBuf::from("/a/1.yaml")));
        assert_eq!(map.forget(Vmid(1)), Some(PathBuf::from("/a/1.yaml")));
        assert_eq!(map.get(Vmid(1)), None);
    }

    #[test]
    fn fs_writer_round_trips_and_tolerates_double_remove() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FsSnippetWriter::new(dir.path());
        let snippet = CloudInitSnippet {
            hostname: "sandbox-9001".into(),
            ssh_public_key: "ssh-ed25519 AAAA".into(),
            bootstrap_token: "plaintext-token".into(),
            controller_url: "https://10.77.0.1:8088".into(),
        };
        let path = writer.write(Vmid(9001), &snippet).unwrap();
        assert!(path.exists());
        writer.remove(Vmid(9001)).unwrap();
        assert!(!path.exists());
        writer.remove(Vmid(9001)).unwrap();
    }
}

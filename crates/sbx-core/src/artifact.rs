// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact records uploaded by guests via an [`crate::tokens::ArtifactToken`].
//!
//! Distinct from [`crate::event::Event`]: artifacts are file-backed and
//! subject to profile-driven retention (spec section 4.6), not an
//! append-only log.

use crate::job::JobId;
use crate::vmid::Vmid;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an artifact row.
    pub struct ArtifactId("art-");
}

/// One file a guest uploaded for a job, as recorded in the `artifacts` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub job_id: JobId,
    pub vmid: Option<Vmid>,
    pub name: String,
    /// Path relative to the artifact root; joined safely by the GC loop.
    pub path: String,
    pub size_bytes: u64,
    pub sha256: Option<String>,
    pub mime: Option<String>,
    pub created_at_ms: u64,
}

impl Artifact {
    pub fn new(job_id: JobId, name: impl Into<String>, path: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: ArtifactId::new(),
            job_id,
            vmid: None,
            name: name.into(),
            path: path.into(),
            size_bytes: 0,
            sha256: None,
            mime: None,
            created_at_ms: now_ms,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct ArtifactBuilder => Artifact {
        into {
            name: String = "output.tar.gz",
            path: String = "output.tar.gz",
        }
        set {
            id: ArtifactId = ArtifactId::new(),
            job_id: JobId = JobId::new(),
            size_bytes: u64 = 0,
            created_at_ms: u64 = 0,
        }
        option {
            vmid: Vmid = None,
            sha256: String = None,
            mime: String = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_artifact_has_no_checksum_or_vmid_yet() {
        let a = Artifact::new(JobId::from_string("job-1"), "log.txt", "job-1/log.txt", 10);
        assert!(a.sha256.is_none());
        assert!(a.vmid.is_none());
        assert_eq!(a.size_bytes, 0);
    }
}

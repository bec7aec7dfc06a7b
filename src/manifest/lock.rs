// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Cross-process exclusive locking (§4.1). A sibling lock file carries an
//! advisory OS-level lock. The lock is held only for the duration of a
//! single `with_lock` call, so there is no self-referential guard type to
//! manage: the `fd_lock::RwLock` is a long-lived field and each call
//! borrows it for exactly as long as the caller's closure runs.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Owns the sibling lock file's OS handle for the lifetime of a
/// `ManifestStore`. Dropping it releases any advisory lock still held;
/// the lock file itself is left on disk (its presence carries no meaning
/// between sessions, unlike the PID-stamped scheme this crate's lineage
/// used to carry — see SPEC_FULL §9).
pub struct CrossProcessLock {
    inner: fd_lock::RwLock<File>,
}

impl CrossProcessLock {
    /// Opens (creating if absent) the lock file at `lock_path`.
    pub fn open(lock_path: &Path) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(lock_path)?;
        Ok(Self {
            inner: fd_lock::RwLock::new(file),
        })
    }

    /// Acquires the exclusive cross-process lock, blocking until free,
    /// runs `f`, and releases the lock when `f` returns (success or
    /// error) before propagating `f`'s result.
    pub fn with_lock<R>(&mut self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let _guard = self.inner.write()?;
        f()
    }
}

/// Path of the sibling lock file for a given manifest path.
pub fn lock_path_for(manifest_path: &Path) -> PathBuf {
    let mut name = manifest_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    manifest_path
        .parent()
        .map(|p| p.join(&name))
        .unwrap_or_else(|| PathBuf::from(&name))
}

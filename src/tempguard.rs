// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Scoped temp-file cleanup (§5 [ADD]). Every compressed blob and every
//! reconstituted-from-chunks download lives behind one of these: built
//! before any fallible step touches the file, not defused until the file
//! has been durably handed off, so a panic or an early `?` return still
//! cleans up.

use std::path::{Path, PathBuf};

use tempfile::Builder;

use crate::error::Result;

/// Owns one scratch file's lifetime. Dropping it (without calling
/// [`TempGuard::defuse`] first) removes the file; a missing file on
/// drop is not an error (it may never have been created, or already
/// handed off by some other path).
pub struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    /// Reserves a new scratch file inside `dir` (created if absent) with
    /// the given filename prefix, guarded from the moment this returns.
    pub fn new_in(dir: &Path, prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let file = Builder::new().prefix(prefix).tempfile_in(dir)?;
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(Self { path, armed: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases ownership without deleting the file — used once the
    /// file has been durably handed off (renamed into place, or its
    /// bytes fully uploaded).
    pub fn defuse(mut self) -> PathBuf {
        self.armed = false;
        self.path.clone()
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

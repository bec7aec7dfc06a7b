// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! The Manifest Store (§4.1): owns the on-disk manifest document and its
//! cross-process lock; provides read, mutating update, and atomic save.
//! No other component is permitted to hold a long-lived reference to the
//! in-memory manifest (§9) — every read or mutation goes through a
//! `ManifestStore` method.

mod codec;
mod lock;

pub use codec::Manifest;

use std::path::{Path, PathBuf};

use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Error, Result};
use lock::CrossProcessLock;

/// Owns one manifest document on disk. Not `Clone`; share via `Arc` if
/// multiple tasks need the same store.
pub struct ManifestStore {
    path: PathBuf,
    /// Re-entrancy guard for a single task: `with_lock` takes this first,
    /// so a caller that nests a `with_lock` call inside its own closure
    /// blocks forever on its own mutex rather than silently re-entering
    /// the cross-process lock. That's a programming error, not a
    /// supported pattern, and this makes it hang loudly in tests instead
    /// of corrupting state.
    task_lock: AsyncMutex<()>,
    cross_process: parking_lot::Mutex<CrossProcessLock>,
}

impl ManifestStore {
    /// Opens (or prepares to create) the manifest at `path`. Does not
    /// read or write anything yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lock_path = lock::lock_path_for(&path);
        Ok(Self {
            path,
            task_lock: AsyncMutex::new(()),
            cross_process: parking_lot::Mutex::new(CrossProcessLock::open(&lock_path)?),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current document. If the file is absent, returns a
    /// fresh empty manifest with no remote configuration bound (§4.1) —
    /// this is not an error, since a manifest is only required to exist
    /// once `init` has run.
    pub async fn load(&self) -> Result<Manifest> {
        let _task_guard = self.task_lock.lock().await;
        self.load_locked()
    }

    fn load_locked(&self) -> Result<Manifest> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Manifest::parse(&bytes, &self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Manifest::default()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Acquires the exclusive lock (process-local mutex, then the
    /// cross-process advisory lock), calls `f` with the current document,
    /// and on `Ok` persists whatever `f` returns atomically. On `Err`,
    /// the save is skipped. The lock is always released.
    pub async fn with_lock<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Manifest) -> Result<R> + Send,
        R: Send,
    {
        let _task_guard = self.task_lock.lock().await;
        let path = self.path.clone();
        let mut cross_process = self.cross_process.lock();

        cross_process.with_lock(move || {
            let mut manifest = match std::fs::read(&path) {
                Ok(bytes) => Manifest::parse(&bytes, &path)?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
                Err(e) => return Err(Error::Io(e)),
            };
            let result = f(&mut manifest)?;
            save_atomic(&path, &manifest)?;
            Ok(result)
        })
    }

    /// Writes `manifest` to a sibling temp file in the same directory,
    /// then renames it over the target (§4.1). A failed write removes the
    /// temp file and surfaces the error; this does not take the lock —
    /// callers that need read-modify-write atomicity must use `with_lock`.
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        save_atomic(&self.path, manifest)
    }

    /// One-way migration: reads a legacy-encoded file at `legacy_path`
    /// and writes it out under this store's (preferred-encoding) path,
    /// leaving `legacy_path` untouched (§4.1, §6.3).
    pub fn migrate_from(&self, legacy_path: &Path) -> Result<()> {
        let bytes = std::fs::read(legacy_path)?;
        let manifest = Manifest::parse(&bytes, legacy_path)?;
        save_atomic(&self.path, &manifest)
    }
}

fn save_atomic(path: &Path, manifest: &Manifest) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp_path = sibling_tmp_path(path);

    let write_result = (|| -> Result<()> {
        let bytes = manifest
            .to_preferred_bytes()
            .map_err(|source| Error::ManifestPersist {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
            })?;
        let mut file = std::fs::File::create(&tmp_path)?;
        use std::io::Write;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    })();

    if let Err(e) = write_result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(match e {
            Error::Io(source) => Error::ManifestPersist {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        });
    }

    std::fs::rename(&tmp_path, path).map_err(|source| Error::ManifestPersist {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.parent()
        .map(|p| p.join(&name))
        .unwrap_or_else(|| PathBuf::from(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_on_absent_file_returns_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::open(dir.path().join("m.json")).unwrap();
        let m = store.load().await.unwrap();
        assert!(m.files.is_empty());
        assert_eq!(m.bucket, None);
    }

    #[tokio::test]
    async fn with_lock_persists_mutation_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("m.json");
        let store = ManifestStore::open(&manifest_path).unwrap();

        store
            .with_lock(|m| {
                m.files.insert("a.txt".to_string(), "f".repeat(64));
                Ok(())
            })
            .await
            .unwrap();

        assert!(manifest_path.exists());
        assert!(!sibling_tmp_path(&manifest_path).exists());

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.files.get("a.txt"), Some(&"f".repeat(64)));
    }

    #[tokio::test]
    async fn with_lock_skips_save_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("m.json");
        let store = ManifestStore::open(&manifest_path).unwrap();

        let result: Result<()> = store
            .with_lock(|m| {
                m.files.insert("a.txt".to_string(), "f".repeat(64));
                Err(Error::Cancelled)
            })
            .await;
        assert!(result.is_err());
        assert!(!manifest_path.exists());
    }

    #[tokio::test]
    async fn concurrent_with_lock_calls_merge_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("m.json");
        let store = std::sync::Arc::new(ManifestStore::open(&manifest_path).unwrap());

        let s1 = store.clone();
        let s2 = store.clone();
        let h1 = tokio::spawn(async move {
            s1.with_lock(|m| {
                m.files.insert("a.txt".to_string(), "a".repeat(64));
                Ok(())
            })
            .await
        });
        let h2 = tokio::spawn(async move {
            s2.with_lock(|m| {
                m.files.insert("b.txt".to_string(), "b".repeat(64));
                Ok(())
            })
            .await
        });
        h1.await.unwrap().unwrap();
        h2.await.unwrap().unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.files.len(), 2);
    }

    #[tokio::test]
    async fn migrate_copies_legacy_without_deleting_it() {
        let dir = tempfile::tempdir().unwrap();
        let legacy_path = dir.path().join(".s3_manifest");
        std::fs::write(&legacy_path, br#"{"files": {"x": "y"}}"#).unwrap();

        let manifest_path = dir.path().join(".s3_manifest.json");
        let store = ManifestStore::open(&manifest_path).unwrap();
        store.migrate_from(&legacy_path).unwrap();

        assert!(legacy_path.exists());
        assert!(manifest_path.exists());
        let m = store.load().await.unwrap();
        assert_eq!(m.files.get("x"), Some(&"y".to_string()));
    }
}

// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Optional digest cache (§3 [ADD]): speeds up `track`/`track_modified`
//! by skipping a rehash when a file's size and mtime haven't changed.
//! Advisory only — a miss or a stale/corrupt cache file never blocks
//! correctness, it just costs a rehash.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::digest;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub digest: String,
    pub size: u64,
    pub mtime_secs: i64,
    pub mtime_nanos: u32,
    pub cached_at_secs: i64,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct HashCache {
    entries: HashMap<String, CacheEntry>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the cache from `path`, or starts empty if absent or
    /// unparseable — a corrupt cache file is never a hard error, since
    /// every entry in it is just a hint.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self).unwrap_or_default();
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Returns the cached digest for `repo_path` if its size and mtime
    /// still match what was recorded; any mismatch (including a file
    /// that no longer exists) is a cache miss, never an error.
    pub fn lookup(&self, repo_path: &str, full_path: &Path) -> Option<String> {
        let entry = self.entries.get(repo_path)?;
        let meta = std::fs::metadata(full_path).ok()?;
        if meta.len() != entry.size {
            return None;
        }
        let modified = meta.modified().ok()?;
        let duration = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
        if duration.as_secs() as i64 != entry.mtime_secs || duration.subsec_nanos() != entry.mtime_nanos {
            return None;
        }
        Some(entry.digest.clone())
    }

    /// Records `digest` for `repo_path`, reading its current size/mtime
    /// off disk. `now_secs` is supplied by the caller rather than read
    /// from the clock here, keeping this module free of direct
    /// wall-clock access.
    pub fn record(&mut self, repo_path: &str, full_path: &Path, digest: String, now_secs: i64) -> Result<()> {
        let meta = std::fs::metadata(full_path)?;
        let modified = meta.modified()?;
        let duration = modified
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        self.entries.insert(
            repo_path.to_string(),
            CacheEntry {
                digest,
                size: meta.len(),
                mtime_secs: duration.as_secs() as i64,
                mtime_nanos: duration.subsec_nanos(),
                cached_at_secs: now_secs,
            },
        );
        Ok(())
    }

    /// Digests `full_path`, consulting and then refreshing the cache
    /// entry for `repo_path`. This is the one entry point callers should
    /// use instead of `digest::sha256_file` directly when a cache is in
    /// play.
    pub fn digest_with_cache(
        &mut self,
        repo_path: &str,
        full_path: &Path,
        now_secs: i64,
    ) -> Result<String> {
        if let Some(cached) = self.lookup(repo_path, full_path) {
            return Ok(cached);
        }
        let computed = digest::sha256_file(full_path)?;
        self.record(repo_path, full_path, computed.clone(), now_secs)?;
        Ok(computed)
    }
}

/// Sibling cache path for a given manifest path, per the
/// `<manifest-file-stem>.hashcache` convention.
pub fn cache_path_for(manifest_path: &Path) -> PathBuf {
    let mut name = manifest_path
        .file_stem()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".hashcache");
    manifest_path
        .parent()
        .map(|p| p.join(&name))
        .unwrap_or_else(|| PathBuf::from(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_is_sibling_with_hashcache_extension() {
        let p = cache_path_for(Path::new("/repo/.s3_manifest.json"));
        assert_eq!(p, Path::new("/repo/.s3_manifest.hashcache"));
    }

    #[test]
    fn lookup_misses_on_absent_entry() {
        let cache = HashCache::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"x").unwrap();
        assert!(cache.lookup("f", &path).is_none());
    }

    #[test]
    fn record_then_lookup_hits() {
        let mut cache = HashCache::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"hello").unwrap();
        cache.record("f", &path, "deadbeef".to_string(), 1000).unwrap();
        assert_eq!(cache.lookup("f", &path), Some("deadbeef".to_string()));
    }

    #[test]
    fn lookup_misses_after_content_size_changes() {
        let mut cache = HashCache::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"hello").unwrap();
        cache.record("f", &path, "deadbeef".to_string(), 1000).unwrap();
        std::fs::write(&path, b"a longer replacement body").unwrap();
        assert!(cache.lookup("f", &path).is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut cache = HashCache::new();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"hello").unwrap();
        cache.record("f", &file, "deadbeef".to_string(), 1000).unwrap();

        let cache_path = dir.path().join("m.hashcache");
        cache.save(&cache_path).unwrap();
        let loaded = HashCache::load(&cache_path);
        assert_eq!(loaded.lookup("f", &file), Some("deadbeef".to_string()));
    }

    #[test]
    fn load_of_corrupt_file_starts_empty_not_erroring() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("m.hashcache");
        std::fs::write(&cache_path, b"not json").unwrap();
        let loaded = HashCache::load(&cache_path);
        assert!(loaded.entries.is_empty());
    }
}

// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Cleanup / Remove (§4.6): leaves tracking via `remove`/`remove_subtree`,
//! leaves the store via `cleanup`'s unreferenced sweep.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::Result;
use crate::manifest::ManifestStore;
use crate::resolver;
use crate::store::{self, ObjectStoreClient};

/// One path dropped from tracking, and whether its object was also
/// purged from the store.
#[derive(Debug, Clone)]
pub struct RemovedEntry {
    pub path: String,
    pub purged: bool,
    pub purge_warning: Option<String>,
}

/// Removes a single path from the manifest under the exclusive lock.
/// When `keep_in_store` is false, also attempts to delete the derived
/// object key; a failed delete is a warning, not a hard error, since
/// the manifest entry is already gone and a stray object is cleaned up
/// by the next `cleanup` sweep regardless.
pub async fn remove(
    manifest: &ManifestStore,
    client: &ObjectStoreClient,
    path: &str,
    keep_in_store: bool,
) -> Result<Option<RemovedEntry>> {
    let (removed_digest, prefix) = manifest
        .with_lock(|m| Ok((m.files.remove(path), m.prefix.clone())))
        .await?;

    let Some(digest) = removed_digest else {
        return Ok(None);
    };

    let mut purged = false;
    let mut purge_warning = None;
    if !keep_in_store {
        let key = store::asset_key(&prefix, &digest, path);
        match client.delete(&key).await {
            Ok(()) => purged = true,
            Err(err) => purge_warning = Some(err.to_string()),
        }
    }

    Ok(Some(RemovedEntry {
        path: path.to_string(),
        purged,
        purge_warning,
    }))
}

/// Resolves `pattern` against the manifest and removes every match,
/// saving the manifest once at the end rather than once per entry.
pub async fn remove_subtree(
    manifest: &ManifestStore,
    client: &ObjectStoreClient,
    pattern: &str,
    keep_in_store: bool,
) -> Result<Vec<RemovedEntry>> {
    let current = manifest.load().await?;
    let matches = resolver::resolve_manifest(current.files.keys(), pattern);
    let prefix = current.prefix.clone();

    let removed_digests: Vec<(String, String)> = manifest
        .with_lock(|m| {
            let mut removed = Vec::new();
            for path in &matches {
                if let Some(digest) = m.files.remove(path) {
                    removed.push((path.clone(), digest));
                }
            }
            Ok(removed)
        })
        .await?;

    let mut results = Vec::with_capacity(removed_digests.len());
    for (path, digest) in removed_digests {
        let mut purged = false;
        let mut purge_warning = None;
        if !keep_in_store {
            let key = store::asset_key(&prefix, &digest, &path);
            match client.delete(&key).await {
                Ok(()) => purged = true,
                Err(err) => purge_warning = Some(err.to_string()),
            }
        }
        results.push(RemovedEntry {
            path,
            purged,
            purge_warning,
        });
    }
    Ok(results)
}

/// One digest's sweep outcome: every key (unsuffixed and any `.chunk*`
/// siblings) deleted together, since an unreferenced asset is dropped
/// as a whole regardless of how it was originally uploaded (§4.6).
#[derive(Debug, Clone)]
pub struct CleanupReport {
    pub digests_removed: usize,
    pub keys_deleted: usize,
    pub warnings: Vec<String>,
}

/// Enumerates every object under `{prefix}/assets/`, groups by digest,
/// and deletes every key belonging to a digest that is not currently
/// referenced by any manifest entry. `force` gates nothing here — the
/// confirmation prompt this implies is the embedding CLI's
/// responsibility (§4.6); this function always executes the sweep it's
/// asked to run.
pub async fn cleanup(manifest: &ManifestStore, client: &ObjectStoreClient) -> Result<CleanupReport> {
    let current = manifest.load().await?;
    let referenced: BTreeSet<&String> = current.files.values().collect();

    let root = store::assets_root(&current.prefix);
    let listed = client.list_by_prefix(&root).await?;

    let mut groups: HashMap<String, Vec<object_store::path::Path>> = HashMap::new();
    let mut warnings = Vec::new();
    for meta in listed {
        match store::digest_from_key(&current.prefix, &meta.location) {
            Some(digest) => groups.entry(digest).or_default().push(meta.location),
            None => warnings.push(format!(
                "skipping foreign object under assets/: {}",
                meta.location
            )),
        }
    }

    let mut digests_removed = 0;
    let mut keys_deleted = 0;
    for (digest, keys) in groups {
        if referenced.contains(&digest) {
            continue;
        }
        digests_removed += 1;
        for key in keys {
            match client.delete(&key).await {
                Ok(()) => keys_deleted += 1,
                Err(err) => warnings.push(format!("failed to delete {key}: {err}")),
            }
        }
    }

    Ok(CleanupReport {
        digests_removed,
        keys_deleted,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PREFIX;
    use object_store::memory::InMemory;

    fn test_client() -> ObjectStoreClient {
        ObjectStoreClient::from_dyn(Arc::new(InMemory::new()))
    }

    async fn seeded_manifest(dir: &std::path::Path) -> Arc<ManifestStore> {
        let store = Arc::new(ManifestStore::open(dir.join("m.json")).unwrap());
        store
            .with_lock(|m| {
                m.prefix = DEFAULT_PREFIX.to_string();
                m.files.insert("a.bin".to_string(), "a".repeat(64));
                m.files.insert("b.bin".to_string(), "b".repeat(64));
                Ok(())
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn remove_drops_manifest_entry_and_purges_object() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = seeded_manifest(dir.path()).await;
        let client = test_client();
        let key = store::asset_key(DEFAULT_PREFIX, &"a".repeat(64), "a.bin");
        client.put_bytes(&key, bytes::Bytes::from_static(b"x")).await.unwrap();

        let removed = remove(&manifest, &client, "a.bin", false).await.unwrap().unwrap();
        assert!(removed.purged);
        assert!(client.head(&key).await.is_err());

        let current = manifest.load().await.unwrap();
        assert!(!current.files.contains_key("a.bin"));
    }

    #[tokio::test]
    async fn remove_with_keep_in_store_leaves_object_alone() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = seeded_manifest(dir.path()).await;
        let client = test_client();
        let key = store::asset_key(DEFAULT_PREFIX, &"a".repeat(64), "a.bin");
        client.put_bytes(&key, bytes::Bytes::from_static(b"x")).await.unwrap();

        let removed = remove(&manifest, &client, "a.bin", true).await.unwrap().unwrap();
        assert!(!removed.purged);
        assert!(client.head(&key).await.is_ok());
    }

    #[tokio::test]
    async fn remove_unknown_path_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = seeded_manifest(dir.path()).await;
        let client = test_client();
        assert!(remove(&manifest, &client, "missing.bin", true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_subtree_removes_every_match_with_one_save() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = seeded_manifest(dir.path()).await;
        let client = test_client();

        let removed = remove_subtree(&manifest, &client, "*.bin", true).await.unwrap();
        assert_eq!(removed.len(), 2);
        let current = manifest.load().await.unwrap();
        assert!(current.files.is_empty());
    }

    #[tokio::test]
    async fn cleanup_deletes_unreferenced_digest_including_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = seeded_manifest(dir.path()).await;
        let client = test_client();

        let referenced_key = store::asset_key(DEFAULT_PREFIX, &"a".repeat(64), "a.bin");
        client
            .put_bytes(&referenced_key, bytes::Bytes::from_static(b"kept"))
            .await
            .unwrap();

        let orphan_digest = "c".repeat(64);
        let orphan_base = store::asset_key(DEFAULT_PREFIX, &orphan_digest, "gone.bin");
        client
            .put_bytes(&orphan_base, bytes::Bytes::from_static(b"x"))
            .await
            .unwrap();
        let orphan_chunk =
            object_store::path::Path::from(format!("{orphan_base}.chunk0"));
        client
            .put_bytes(&orphan_chunk, bytes::Bytes::from_static(b"y"))
            .await
            .unwrap();

        let report = cleanup(&manifest, &client).await.unwrap();
        assert_eq!(report.digests_removed, 1);
        assert_eq!(report.keys_deleted, 2);
        assert!(client.head(&referenced_key).await.is_ok());
        assert!(client.head(&orphan_base).await.is_err());
        assert!(client.head(&orphan_chunk).await.is_err());
    }

    #[tokio::test]
    async fn cleanup_treats_foreign_key_as_warning_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = seeded_manifest(dir.path()).await;
        let client = test_client();
        let foreign = object_store::path::Path::from(format!("{DEFAULT_PREFIX}/assets/not-hex/x"));
        client.put_bytes(&foreign, bytes::Bytes::from_static(b"z")).await.unwrap();

        let report = cleanup(&manifest, &client).await.unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(client.head(&foreign).await.is_ok());
    }
}

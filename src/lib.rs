// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Content-addressed large-file tracking for Git-adjacent working trees.
//!
//! This crate is the transfer core only: a side-car manifest maps
//! working-tree paths to content digests, and the bytes live in an
//! S3-compatible object store under a content-addressed layout. Argument
//! parsing, progress rendering, interactive prompts, repository-root
//! discovery, and any version-control hook integration are the embedding
//! binary's job — see each module's doc comment for the split.
//!
//! [`Repository`] is the facade: it owns one manifest and one object
//! store client, and exposes the full operational surface (`init`,
//! `track`, `checkout`, `list`, `remove`, `cleanup`, `migrate`, and their
//! sweeps) that a CLI collaborator drives.

pub mod cleanup;
pub mod compress;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod hashcache;
pub mod manifest;
pub mod resolver;
pub mod store;
mod tempguard;

pub use config::{RepoConfig, StoreConfig};
pub use engine::{
    CancellationToken, CheckoutOptions, CheckoutSummary, FileOutcome, ProgressObserver,
    TrackOptions, TrackSummary, TransferEngine,
};
pub use error::{Error, Result, TaskError};
pub use manifest::{Manifest, ManifestStore};
pub use store::ObjectStoreClient;

use std::path::Path;
use std::sync::Arc;

use cleanup::{CleanupReport, RemovedEntry};

/// Glues the Manifest Store, Object Store Client, and Transfer Engine
/// into the operational surface consumed by the CLI collaborator (§6.3).
/// Cheap to clone: every field is itself an `Arc` or a thread-safe
/// handle, so a `Repository` can be shared across tasks the same way a
/// bare `TransferEngine` can.
#[derive(Clone)]
pub struct Repository {
    config: RepoConfig,
    manifest: Arc<ManifestStore>,
    client: ObjectStoreClient,
    engine: TransferEngine,
}

impl Repository {
    /// Opens a repository rooted at `config.root`, talking to the
    /// backend described by `store`. Does not require `init` to have
    /// run first — `load`/`list`/`checkout` on a manifest-less root
    /// simply observe an empty tracked set, per §4.1.
    pub fn open(config: RepoConfig, store: StoreConfig) -> Result<Self> {
        Self::with_observer(config, store, Arc::new(engine::NoopObserver))
    }

    /// As [`Repository::open`], but routing every pipeline's per-file
    /// and per-byte events through `observer` instead of discarding them.
    pub fn with_observer(
        config: RepoConfig,
        store: StoreConfig,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<Self> {
        let manifest = Arc::new(ManifestStore::open(config.manifest_path())?);
        let client = ObjectStoreClient::new(&store)?;
        let engine = TransferEngine::with_observer(
            config.clone(),
            store.prefix.clone(),
            manifest.clone(),
            client.clone(),
            observer,
        );
        Ok(Self {
            config,
            manifest,
            client,
            engine,
        })
    }

    /// As [`Repository::with_observer`], but taking an already-built
    /// [`ObjectStoreClient`] instead of a [`StoreConfig`] — for a
    /// backend `object_store::ObjectStore` impl beyond what
    /// `StoreConfig` expresses (e.g. GCS, Azure, or an in-memory store
    /// under test), and for embedders that already own a configured
    /// client. `prefix` plays the same role `store.prefix` plays in
    /// `with_observer`.
    pub fn with_client(
        config: RepoConfig,
        prefix: impl Into<String>,
        client: ObjectStoreClient,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<Self> {
        let manifest = Arc::new(ManifestStore::open(config.manifest_path())?);
        let engine = TransferEngine::with_observer(
            config.clone(),
            prefix.into(),
            manifest.clone(),
            client.clone(),
            observer,
        );
        Ok(Self {
            config,
            manifest,
            client,
            engine,
        })
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Cheap one-time credential probe (§4.4, §4.5 step 2), exposed so a
    /// caller can fail an entire batch of CLI invocations fast rather
    /// than discover bad credentials partway through a worker pool.
    pub async fn check_credentials(&self) -> Result<()> {
        self.client.check_credentials().await
    }

    /// Creates a fresh manifest binding `store`'s bucket/prefix, refusing
    /// if one already exists at the configured path (§6.3) regardless of
    /// which of the two accepted encodings it's written in — existence
    /// alone is the guard.
    pub fn init(&self, store: &StoreConfig) -> Result<()> {
        let path = self.config.manifest_path();
        if path.exists() {
            return Err(Error::AlreadyInitialized(path));
        }
        let mut doc = Manifest::new();
        doc.bucket = Some(store.bucket.clone());
        doc.prefix = store.prefix.clone();
        self.manifest.save(&doc)
    }

    /// Tracks every working-tree path matched by `patterns` (§4.5).
    pub async fn track(&self, patterns: &[String], opts: TrackOptions) -> Result<TrackSummary> {
        self.engine.track(patterns, opts).await
    }

    /// Re-tracks every already-tracked file whose current content no
    /// longer matches its manifest entry.
    pub async fn track_modified(&self, opts: TrackOptions) -> Result<TrackSummary> {
        self.engine.track_modified(opts).await
    }

    /// Checks out every manifest-tracked path matched by `patterns`.
    pub async fn checkout(
        &self,
        patterns: &[String],
        opts: CheckoutOptions,
    ) -> Result<CheckoutSummary> {
        self.engine.checkout(patterns, opts).await
    }

    /// Checks out every tracked path.
    pub async fn checkout_all(&self, opts: CheckoutOptions) -> Result<CheckoutSummary> {
        self.engine.checkout_all(opts).await
    }

    /// Enumerates tracked `(path, digest)` pairs, optionally narrowed by
    /// `pattern` under the same manifest-side resolver `checkout` uses
    /// (§6.3). With no pattern, every entry is returned sorted by path —
    /// free, since `files` is a `BTreeMap`.
    pub async fn list(&self, pattern: Option<&str>) -> Result<Vec<(String, String)>> {
        let doc = self.manifest.load().await?;
        match pattern {
            None => Ok(doc.files.into_iter().collect()),
            Some(pattern) => {
                let matches = resolver::resolve_manifest(doc.files.keys(), pattern);
                Ok(matches
                    .into_iter()
                    .filter_map(|path| doc.files.get(&path).cloned().map(|digest| (path, digest)))
                    .collect())
            }
        }
    }

    /// Drops `path` from tracking; when `keep_in_store` is false, also
    /// best-effort deletes its derived object (§4.6).
    pub async fn remove(&self, path: &str, keep_in_store: bool) -> Result<Option<RemovedEntry>> {
        cleanup::remove(&self.manifest, &self.client, path, keep_in_store).await
    }

    /// Resolves `pattern` against the manifest and removes every match,
    /// saving once at the end (§4.6).
    pub async fn remove_subtree(
        &self,
        pattern: &str,
        keep_in_store: bool,
    ) -> Result<Vec<RemovedEntry>> {
        cleanup::remove_subtree(&self.manifest, &self.client, pattern, keep_in_store).await
    }

    /// Deletes every object under `{prefix}/assets/` whose digest is no
    /// longer referenced by any manifest entry (§4.6). The confirmation
    /// prompt a destructive sweep like this implies is the CLI
    /// collaborator's responsibility; this always executes.
    pub async fn cleanup(&self) -> Result<CleanupReport> {
        cleanup::cleanup(&self.manifest, &self.client).await
    }

    /// One-way migration of a legacy-encoded manifest at `legacy_path`
    /// into this repository's preferred-encoding manifest, leaving the
    /// legacy file untouched (§4.1, §6.3).
    pub fn migrate(&self, legacy_path: &Path) -> Result<()> {
        self.manifest.migrate_from(legacy_path)
    }
}

// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! The Transfer Engine (§4.5): drives the two pipelines (`track`,
//! `checkout`) and two sweeps (`track_modified`, `checkout_all`) over a
//! bounded worker pool, committing the manifest once per call.

mod checkout;
mod progress;
mod track;

pub use checkout::{CheckoutOptions, CheckoutSummary};
pub use progress::{FileOutcome, NoopObserver, ProgressObserver};
pub use track::{TrackOptions, TrackSummary};

#[cfg(test)]
pub(crate) use progress::recording::RecordingObserver;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::RepoConfig;
use crate::error::Result;
use crate::manifest::ManifestStore;
use crate::store::ObjectStoreClient;

/// Hand-rolled cancellation flag. The only operation a worker needs is
/// "check a flag between tasks", so this skips pulling in
/// `tokio-util`'s heavier `CancellationToken` for a single bool (§4.5
/// [ADD]).
///
/// A caller supplies one of these through `TrackOptions`/`CheckoutOptions`
/// to let an external signal handler cancel a running pipeline (§5, §9):
/// the handler holds a clone and calls `cancel()`, the worker pool polls
/// `is_cancelled()` between tasks and drains rather than force-killing
/// in-flight work. With no token supplied, each pipeline call still
/// creates its own for the internal strict-mode fail-fast short circuit.
#[derive(Clone, Debug)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct EngineHandles {
    pub config: RepoConfig,
    pub prefix: String,
    pub manifest: Arc<ManifestStore>,
    pub client: ObjectStoreClient,
    pub observer: Arc<dyn ProgressObserver>,
}

/// Owns everything one `track`/`checkout` call needs. Cheap to clone
/// (an `Arc` underneath) so each worker task can hold its own handle.
#[derive(Clone)]
pub struct TransferEngine {
    pub(crate) handles: Arc<EngineHandles>,
}

impl TransferEngine {
    pub fn new(
        config: RepoConfig,
        prefix: String,
        manifest: Arc<ManifestStore>,
        client: ObjectStoreClient,
    ) -> Self {
        Self::with_observer(config, prefix, manifest, client, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        config: RepoConfig,
        prefix: String,
        manifest: Arc<ManifestStore>,
        client: ObjectStoreClient,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            handles: Arc::new(EngineHandles {
                config,
                prefix,
                manifest,
                client,
                observer,
            }),
        }
    }

    /// Tracks each working-tree path matched by `patterns` (§4.5).
    pub async fn track(&self, patterns: &[String], opts: TrackOptions) -> Result<TrackSummary> {
        track::run(self, patterns, opts).await
    }

    /// Re-tracks every already-tracked file whose current content digest
    /// no longer matches the manifest (§4.5, §9: compares against
    /// `files[path]`, not a top-level manifest lookup). A file missing
    /// from the working tree is skipped with a warning, not an error.
    pub async fn track_modified(&self, opts: TrackOptions) -> Result<TrackSummary> {
        track::run_modified(self, opts).await
    }

    /// Checks out each manifest-tracked path matched by `patterns`.
    pub async fn checkout(
        &self,
        patterns: &[String],
        opts: CheckoutOptions,
    ) -> Result<CheckoutSummary> {
        checkout::run(self, patterns, opts).await
    }

    /// Checks out every tracked path.
    pub async fn checkout_all(&self, opts: CheckoutOptions) -> Result<CheckoutSummary> {
        checkout::run_all(self, opts).await
    }
}

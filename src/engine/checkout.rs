// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! The `checkout` pipeline and `checkout_all` sweep (§4.5).

use std::collections::BTreeSet;
use std::path::PathBuf;

use futures::stream::{self, StreamExt};

use crate::compress;
use crate::digest;
use crate::error::{Error, Result, TaskError};
use crate::resolver;
use crate::tempguard::TempGuard;

use super::{CancellationToken, FileOutcome, TransferEngine};

/// Per-call knobs for `checkout`/`checkout_all` (§4.5 [ADD]).
#[derive(Debug, Clone, Default)]
pub struct CheckoutOptions {
    pub strict: bool,
    /// External cancellation handle (§5, §9) — see `TrackOptions::cancel`.
    pub cancel: Option<CancellationToken>,
}

#[derive(Debug, Default)]
pub struct CheckoutSummary {
    pub downloaded: Vec<String>,
    /// Files whose on-disk content already matched the manifest's
    /// expected digest before any work ran — §4.5 step 3a's early exit.
    pub up_to_date: Vec<String>,
    pub cancelled: Vec<String>,
}

enum TaskOutcome {
    Downloaded(String),
    UpToDate(String),
    Cancelled(String),
    Failed(TaskError),
}

pub(crate) async fn run(
    engine: &TransferEngine,
    patterns: &[String],
    opts: CheckoutOptions,
) -> Result<CheckoutSummary> {
    let manifest = engine.handles.manifest.load().await?;
    let mut seen = BTreeSet::new();
    for pattern in patterns {
        for path in resolver::resolve_manifest(manifest.files.keys(), pattern) {
            seen.insert(path);
        }
    }
    let targets: Vec<(String, String)> = seen
        .into_iter()
        .filter_map(|path| manifest.files.get(&path).cloned().map(|digest| (path, digest)))
        .collect();
    run_paths(engine, targets, opts).await
}

pub(crate) async fn run_all(engine: &TransferEngine, opts: CheckoutOptions) -> Result<CheckoutSummary> {
    let manifest = engine.handles.manifest.load().await?;
    let targets: Vec<(String, String)> = manifest.files.into_iter().collect();
    run_paths(engine, targets, opts).await
}

async fn run_paths(
    engine: &TransferEngine,
    targets: Vec<(String, String)>,
    opts: CheckoutOptions,
) -> Result<CheckoutSummary> {
    let token = opts.cancel.clone().unwrap_or_default();
    let concurrency = engine.handles.config.concurrency;

    let outcomes: Vec<TaskOutcome> = stream::iter(targets.into_iter())
        .map(|(path, content_digest)| {
            let engine = engine.clone();
            let token = token.clone();
            let strict = opts.strict;
            async move {
                if token.is_cancelled() {
                    return TaskOutcome::Cancelled(path);
                }
                engine.handles.observer.on_file_start(&path);
                match checkout_one(&engine, &path, &content_digest).await {
                    Ok(CheckoutOneOutcome::UpToDate) => {
                        engine
                            .handles
                            .observer
                            .on_file_done(&path, FileOutcome::Skipped);
                        TaskOutcome::UpToDate(path)
                    }
                    Ok(CheckoutOneOutcome::Downloaded) => {
                        engine
                            .handles
                            .observer
                            .on_file_done(&path, FileOutcome::Downloaded);
                        TaskOutcome::Downloaded(path)
                    }
                    Err(err) => {
                        engine
                            .handles
                            .observer
                            .on_file_done(&path, FileOutcome::Failed);
                        if strict {
                            token.cancel();
                        }
                        TaskOutcome::Failed(TaskError::new(PathBuf::from(&path), err))
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut summary = CheckoutSummary::default();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            TaskOutcome::Downloaded(path) => summary.downloaded.push(path),
            TaskOutcome::UpToDate(path) => summary.up_to_date.push(path),
            TaskOutcome::Cancelled(path) => summary.cancelled.push(path),
            TaskOutcome::Failed(err) => errors.push(err),
        }
    }

    if !errors.is_empty() {
        return Err(Error::Tasks(errors));
    }
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(summary)
}

enum CheckoutOneOutcome {
    UpToDate,
    Downloaded,
}

/// Downloads, decompresses, and verifies a single tracked file, then
/// atomically replaces (or creates) its working-tree copy. Both scratch
/// files are guarded, so a verification failure or any I/O error along
/// the way leaves no partial file behind in the working tree.
///
/// §4.5 step 3a: if the working-tree copy already exists and already
/// hashes to `content_digest`, nothing is fetched at all.
async fn checkout_one(
    engine: &TransferEngine,
    path: &str,
    content_digest: &str,
) -> Result<CheckoutOneOutcome> {
    let dest = engine.handles.config.root.join(path);
    if dest.is_file() {
        if let Ok(existing) = digest::sha256_file(&dest) {
            if existing == content_digest {
                return Ok(CheckoutOneOutcome::UpToDate);
            }
        }
    }

    let compressed_guard = TempGuard::new_in(&engine.handles.config.temp_dir, "s3lfs-checkout-gz-")?;
    engine
        .handles
        .client
        .get_object(&engine.handles.prefix, content_digest, path, compressed_guard.path())
        .await?;

    let decompressed_guard =
        TempGuard::new_in(&engine.handles.config.temp_dir, "s3lfs-checkout-out-")?;
    compress::decompress_file(compressed_guard.path(), decompressed_guard.path())?;

    let actual_digest = digest::sha256_file(decompressed_guard.path())?;
    if actual_digest != content_digest {
        return Err(Error::Verification {
            path: PathBuf::from(path),
            expected: content_digest.to_string(),
            actual: actual_digest,
        });
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let final_path = decompressed_guard.defuse();
    std::fs::rename(&final_path, &dest)?;
    Ok(CheckoutOneOutcome::Downloaded)
}

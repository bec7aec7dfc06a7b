// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! The `track` pipeline and `track_modified` sweep (§4.5).

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex as AsyncMutex;

use crate::compress;
use crate::digest;
use crate::error::{Error, Result, TaskError};
use crate::hashcache::HashCache;
use crate::resolver;
use crate::store;
use crate::tempguard::TempGuard;

use super::{CancellationToken, FileOutcome, TransferEngine};

/// Per-call knobs for `track`/`track_modified` (§4.5 [ADD]).
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    /// Fail fast: the first per-file error cancels the run instead of
    /// letting the remaining dispatched work finish.
    pub strict: bool,
    /// Optional digest cache (§3 [ADD]), shared across the whole worker
    /// pool behind a lock so concurrent workers never race on the same
    /// entry. Absent by default — every file is simply rehashed.
    pub hash_cache: Option<Arc<AsyncMutex<HashCache>>>,
    /// External cancellation handle (§5, §9): a caller holding a clone
    /// can cancel a running pipeline from outside it (an embedding CLI's
    /// signal handler, typically). With no token supplied, the pipeline
    /// still creates its own internally for `strict`'s fail-fast.
    pub cancel: Option<CancellationToken>,
}

/// What happened across one `track`/`track_modified` call. Populated
/// even when the call ultimately returns `Err(Error::Tasks(_))`, since
/// successful files were still committed to the manifest.
#[derive(Debug, Default)]
pub struct TrackSummary {
    pub uploaded: Vec<String>,
    /// Files whose content digest already matched the manifest entry
    /// before any work ran — §4.5 step 3b's early exit.
    pub unchanged: Vec<String>,
    pub cancelled: Vec<String>,
}

enum TaskOutcome {
    Uploaded(String, String),
    Unchanged(String),
    Cancelled(String),
    Failed(TaskError),
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub(crate) async fn run(
    engine: &TransferEngine,
    patterns: &[String],
    opts: TrackOptions,
) -> Result<TrackSummary> {
    let mut seen = BTreeSet::new();
    for pattern in patterns {
        for path in resolver::resolve_filesystem(&engine.handles.config.root, pattern)? {
            seen.insert(path);
        }
    }
    run_paths(engine, seen.into_iter().collect(), opts).await
}

/// Re-tracks every manifest entry whose current working-tree content no
/// longer matches `files[path]` (§4.5, §9 — the comparison is against
/// the per-path entry, never a stale top-level lookup). A tracked path
/// absent from the working tree is skipped with a warning, not treated
/// as an error: §4.5 edge case.
pub(crate) async fn run_modified(engine: &TransferEngine, opts: TrackOptions) -> Result<TrackSummary> {
    let manifest = engine.handles.manifest.load().await?;
    let mut candidates = Vec::new();
    for (path, recorded_digest) in manifest.files.iter() {
        let full_path = engine.handles.config.root.join(path);
        if !full_path.is_file() {
            tracing::warn!(path = %path, "tracked file missing from working tree, skipping");
            continue;
        }
        let current_digest = digest::sha256_file(&full_path)?;
        if &current_digest != recorded_digest {
            candidates.push(path.clone());
        }
    }
    run_paths(engine, candidates, opts).await
}

async fn run_paths(
    engine: &TransferEngine,
    paths: Vec<String>,
    opts: TrackOptions,
) -> Result<TrackSummary> {
    let token = opts.cancel.clone().unwrap_or_default();
    let concurrency = engine.handles.config.concurrency;
    // Snapshot once, outside the pool: step 3b compares each worker's
    // freshly computed digest against whatever was already committed at
    // the start of this call. Another process racing a different path
    // during the run is unaffected — the final commit still merges.
    let snapshot = engine.handles.manifest.load().await?;

    let outcomes: Vec<TaskOutcome> = stream::iter(paths.into_iter())
        .map(|path| {
            let engine = engine.clone();
            let token = token.clone();
            let strict = opts.strict;
            let hash_cache = opts.hash_cache.clone();
            let recorded = snapshot.files.get(&path).cloned();
            async move {
                if token.is_cancelled() {
                    return TaskOutcome::Cancelled(path);
                }
                engine.handles.observer.on_file_start(&path);
                match track_one(&engine, &path, recorded.as_deref(), hash_cache).await {
                    Ok(TrackOneOutcome::Unchanged) => {
                        engine
                            .handles
                            .observer
                            .on_file_done(&path, FileOutcome::Skipped);
                        TaskOutcome::Unchanged(path)
                    }
                    Ok(TrackOneOutcome::Uploaded(digest)) => {
                        engine
                            .handles
                            .observer
                            .on_file_done(&path, FileOutcome::Uploaded);
                        TaskOutcome::Uploaded(path, digest)
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

    let mut summary = TrackSummary::default();
    let mut updates = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            TaskOutcome::Uploaded(path, digest) => {
                updates.push((path.clone(), digest));
                summary.uploaded.push(path);
            }
            TaskOutcome::Unchanged(path) => summary.unchanged.push(path),
            TaskOutcome::Cancelled(path) => summary.cancelled.push(path),
            TaskOutcome::Failed(err) => errors.push(err),
        }
    }

    if !updates.is_empty() {
        engine
            .handles
            .manifest
            .with_lock(|m| {
                for (path, digest) in updates {
                    m.files.insert(path, digest);
                }
                Ok(())
            })
            .await?;
    }

    if !errors.is_empty() {
        return Err(Error::Tasks(errors));
    }
    // A token cancelled without any task error must have been cancelled
    // externally (the internal strict fail-fast only ever cancels
    // alongside pushing an error, already handled above) — surface that
    // as `Error::Cancelled` per §7, after the commit above has already
    // persisted whatever completed (§4.5, §5).
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(summary)
}

enum TrackOneOutcome {
    Unchanged,
    Uploaded(String),
}

/// Digests, compresses, deduplicates, and uploads a single file. The
/// compressed scratch file is cleaned up on every exit path via
/// `TempGuard`, including an early `?` return.
///
/// `recorded_digest` is the manifest's entry for this path as of the
/// snapshot taken before the pool started (§4.5 step 3b): when the
/// freshly computed digest matches it, the file is reported unchanged
/// without ever touching the store. `hash_cache`, if supplied, is
/// consulted before falling back to a full rehash (§4.5 step 3a).
async fn track_one(
    engine: &TransferEngine,
    path: &str,
    recorded_digest: Option<&str>,
    hash_cache: Option<Arc<AsyncMutex<HashCache>>>,
) -> Result<TrackOneOutcome> {
    let full_path = engine.handles.config.root.join(path);
    let content_digest = match &hash_cache {
        Some(cache) => {
            let mut cache = cache.lock().await;
            cache.digest_with_cache(path, &full_path, now_secs())?
        }
        None => digest::sha256_file(&full_path)?,
    };

    if recorded_digest == Some(content_digest.as_str()) {
        return Ok(TrackOneOutcome::Unchanged);
    }

    let guard = TempGuard::new_in(&engine.handles.config.temp_dir, "s3lfs-track-")?;
    compress::compress_file(&full_path, guard.path())?;

    let key = store::asset_key(&engine.handles.prefix, &content_digest, path);
    let already_present = engine
        .handles
        .client
        .is_duplicate(&key, guard.path())
        .await?;
    if !already_present {
        engine
            .handles
            .client
            .put_object(
                &engine.handles.prefix,
                &content_digest,
                path,
                guard.path(),
                engine.handles.config.chunk_threshold,
            )
            .await?;
    }
    Ok(TrackOneOutcome::Uploaded(content_digest))
}

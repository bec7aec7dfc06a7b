// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Progress reporting seam (§4.5 [ADD]). The core never renders
//! anything itself; it calls through this trait at the points that
//! matter and leaves rendering entirely to the embedder.

/// What happened to one file by the time its pipeline step finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded,
    Downloaded,
    Skipped,
    Cancelled,
    Failed,
}

/// Callback seam for per-file and per-byte progress. All methods have
/// no-op defaults so an embedder only overrides what it cares about.
pub trait ProgressObserver: Send + Sync {
    fn on_file_start(&self, _path: &str) {}
    fn on_file_done(&self, _path: &str, _outcome: FileOutcome) {}
    fn on_bytes(&self, _path: &str, _delta: u64) {}
}

/// The default observer: does nothing. Used whenever the embedder
/// doesn't supply one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

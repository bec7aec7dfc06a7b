// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for the integration suite: every test stands up a
//! `Repository` against a `tempfile::TempDir` working tree and an
//! `object_store::memory::InMemory` backend in place of the remote.

use std::sync::Arc;

use object_store::memory::InMemory;
use s3track::engine::NoopObserver;
use s3track::{ObjectStoreClient, RepoConfig, Repository};

pub const PREFIX: &str = "s3lfs";

/// A fresh repository rooted at `root`, talking to its own private
/// in-memory object store — two calls never share a backend.
pub fn repo(root: &std::path::Path) -> Repository {
    repo_with_config(RepoConfig::new(root))
}

pub fn repo_with_config(config: RepoConfig) -> Repository {
    let client = ObjectStoreClient::from_dyn(Arc::new(InMemory::new()));
    Repository::with_client(config, PREFIX, client, Arc::new(NoopObserver)).unwrap()
}

/// Two repositories sharing one backend and one working tree, as if
/// two processes (or two tasks) were operating on the same repo
/// concurrently.
pub fn shared_pair(root: &std::path::Path) -> (Repository, Repository) {
    let client = ObjectStoreClient::from_dyn(Arc::new(InMemory::new()));
    let a = Repository::with_client(
        RepoConfig::new(root),
        PREFIX,
        client.clone(),
        Arc::new(NoopObserver),
    )
    .unwrap();
    let b = Repository::with_client(
        RepoConfig::new(root),
        PREFIX,
        client,
        Arc::new(NoopObserver),
    )
    .unwrap();
    (a, b)
}

pub fn write(root: &std::path::Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

/// Default number of workers in the bounded transfer pool (§5).
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default chunk threshold: compressed blobs larger than this are split
/// into ordered `.chunk{i}` objects (§4.4, §6.1).
pub const DEFAULT_CHUNK_THRESHOLD: u64 = 5 * 1024 * 1024 * 1024;

/// Default manifest filename, relative to the repository root.
pub const DEFAULT_MANIFEST_FILENAME: &str = ".s3_manifest.json";

/// Default per-repository key prefix (§3).
pub const DEFAULT_PREFIX: &str = "s3lfs";

/// Configuration for the remote object store (§4.4, §6.1).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Bucket name. Authoritative once written into the manifest by `init`.
    pub bucket: String,
    /// Per-repository key prefix isolating assets within the bucket.
    pub prefix: String,
    /// Optional endpoint override, for S3-compatible non-AWS backends
    /// (MinIO, Ceph RGW, etc).
    pub endpoint: Option<String>,
    /// Optional region; required by some S3-compatible backends even when
    /// `endpoint` is set.
    pub region: Option<String>,
    /// Unsigned (anonymous) access. Disables multipart upload (the
    /// threshold is raised beyond any realistic blob size) per §4.4.
    pub unsigned: bool,
    /// Server-side encryption (AES-256) applied on upload, per §6.1.
    pub encryption: bool,
}

impl StoreConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            endpoint: None,
            region: None,
            unsigned: false,
            encryption: true,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn unsigned(mut self, unsigned: bool) -> Self {
        self.unsigned = unsigned;
        self
    }
}

/// Configuration owned by the embedding binary and handed to every
/// top-level operation. The core never discovers any of this on its own
/// (repository-root discovery, env resolution beyond the object store's
/// own chain, and CLI flags are all out of scope, §1).
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Repository root. All manifest paths are relative to this.
    pub root: PathBuf,
    /// Manifest filename, relative to `root`.
    pub manifest_filename: String,
    /// Bounded worker pool size for track/checkout pipelines.
    pub concurrency: usize,
    /// Compressed-blob size above which the chunked upload/download
    /// fallback (§4.4, §6.1) activates.
    pub chunk_threshold: u64,
    /// Directory for scratch compressed/decompressed blobs. Defaults to
    /// `<root>/.s3lfs_temp`, mirroring this tool's reference lineage.
    pub temp_dir: PathBuf,
}

impl RepoConfig {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let temp_dir = root.join(".s3lfs_temp");
        Self {
            root,
            manifest_filename: DEFAULT_MANIFEST_FILENAME.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            temp_dir,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest_filename)
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.manifest_filename.clone();
        name.push_str(".lock");
        self.root.join(name)
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        assert!(concurrency > 0, "concurrency must be nonzero");
        self.concurrency = concurrency;
        self
    }

    pub fn with_chunk_threshold(mut self, threshold: u64) -> Self {
        self.chunk_threshold = threshold;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.temp_dir = dir.as_ref().to_path_buf();
        self
    }
}

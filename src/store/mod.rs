// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! The Object Store Client (§4.4): wraps an `object_store::ObjectStore`
//! behind the five operations this crate actually needs, with an
//! explicit retry policy and the chunked-fallback mechanism layered on
//! top for assets above the configured chunk threshold.

mod chunk;
mod key;
mod retry;

pub use key::{assets_root, asset_key, digest_from_key};
pub use retry::RetryPolicy;

use std::path::Path as FsPath;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StorePath;
use object_store::{ObjectMeta, ObjectStore, PutPayload};

use crate::config::StoreConfig;
use crate::digest;
use crate::error::{Error, Result};

/// Thread-safe handle to a configured remote backend. Cheap to clone
/// (an `Arc` underneath); shared across worker tasks without external
/// locking, matching `object_store`'s own thread-safety guarantee.
#[derive(Clone)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
}

impl ObjectStoreClient {
    /// Builds a client against AWS S3 or an S3-compatible backend, per
    /// `config`. Signed mode relies on the builder's standard
    /// environment/profile credential chain; unsigned mode sets
    /// `with_skip_signature(true)`. A custom endpoint switches to
    /// path-style addressing, the generic mechanism by which any
    /// S3-compatible backend (MinIO, Ceph RGW, ...) is supported.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut builder = AmazonS3Builder::new().with_bucket_name(&config.bucket);

        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false);
        }
        if config.unsigned {
            builder = builder.with_skip_signature(true);
        }

        let store = builder.build()?;

        Ok(Self {
            store: Arc::new(store),
            retry: RetryPolicy::default(),
        })
    }

    /// Wraps an already-constructed backend, used in tests to stand in
    /// an `object_store::memory::InMemory` for the remote.
    pub fn from_dyn(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cheap one-time credential probe (§4.4): a `list` capped to a
    /// single result. A credentials failure surfaces as
    /// `Error::Credentials` rather than a generic store error so the
    /// embedding binary can short-circuit an entire run before spending
    /// any time on transfers.
    pub async fn check_credentials(&self) -> Result<()> {
        let store = self.store.clone();
        match store.list(None).next().await {
            Some(Err(err)) if is_credentials_error(&err) => Err(Error::Credentials(err.to_string())),
            _ => Ok(()),
        }
    }

    pub async fn head(&self, key: &StorePath) -> Result<ObjectMeta> {
        let store = self.store.clone();
        let key = key.clone();
        self.retry
            .run(|| {
                let store = store.clone();
                let key = key.clone();
                async move { store.head(&key).await }
            })
            .await
    }

    pub async fn put_bytes(&self, key: &StorePath, bytes: Bytes) -> Result<()> {
        let store = self.store.clone();
        let key = key.clone();
        self.retry
            .run(|| {
                let store = store.clone();
                let key = key.clone();
                let payload = PutPayload::from_bytes(bytes.clone());
                async move { store.put(&key, payload).await.map(|_| ()) }
            })
            .await
    }

    pub async fn put_file(&self, key: &StorePath, path: &FsPath) -> Result<()> {
        let bytes = Bytes::from(std::fs::read(path)?);
        self.put_bytes(key, bytes).await
    }

    pub async fn get_bytes(&self, key: &StorePath) -> Result<Bytes> {
        let store = self.store.clone();
        let key = key.clone();
        self.retry
            .run(|| {
                let store = store.clone();
                let key = key.clone();
                async move {
                    let result = store.get(&key).await?;
                    result.bytes().await
                }
            })
            .await
    }

    pub async fn delete(&self, key: &StorePath) -> Result<()> {
        let store = self.store.clone();
        let key = key.clone();
        self.retry
            .run(|| {
                let store = store.clone();
                let key = key.clone();
                async move { store.delete(&key).await }
            })
            .await
    }

    pub async fn list_by_prefix(&self, prefix: &StorePath) -> Result<Vec<ObjectMeta>> {
        use futures::TryStreamExt;
        let store = self.store.clone();
        let prefix = prefix.clone();
        self.retry
            .run(|| {
                let store = store.clone();
                let prefix = prefix.clone();
                async move {
                    store
                        .list(Some(&prefix))
                        .try_collect::<Vec<_>>()
                        .await
                }
            })
            .await
    }

    /// Uploads a compressed blob to its derived key, choosing the
    /// chunked fallback when `compressed_path`'s size exceeds
    /// `chunk_threshold` (§4.4, §6.1). Below the threshold, a single
    /// `put` is used, which `object_store` itself may still realize as a
    /// multipart upload internally — invisible at this layer.
    pub async fn put_object(
        &self,
        prefix: &str,
        digest: &str,
        path: &str,
        compressed_path: &FsPath,
        chunk_threshold: u64,
    ) -> Result<()> {
        let key = key::asset_key(prefix, digest, path);
        let size = std::fs::metadata(compressed_path)?.len();
        if size > chunk_threshold {
            chunk::put_chunked(self, &key, compressed_path, chunk_threshold).await
        } else {
            self.put_file(&key, compressed_path).await
        }
    }

    /// Downloads the compressed blob for `digest`/`path` into
    /// `dst_compressed_path`, transparently handling whichever of the
    /// whole-object or chunked layouts is actually present remotely.
    pub async fn get_object(
        &self,
        prefix: &str,
        digest: &str,
        path: &str,
        dst_compressed_path: &FsPath,
    ) -> Result<()> {
        let key = key::asset_key(prefix, digest, path);
        if chunk::has_chunks(self, &key).await? {
            chunk::get_chunked(self, &key, dst_compressed_path).await
        } else {
            let bytes = self.get_bytes(&key).await?;
            std::fs::write(dst_compressed_path, &bytes)?;
            Ok(())
        }
    }

    /// Dedup probe (§4.4): compares the local MD5 of the already-
    /// compressed blob against the remote's reported ETag (which, for a
    /// single-part upload, is the object's MD5). A mismatch, a missing
    /// remote object, or a multipart ETag (not a bare MD5 hex string)
    /// all resolve to "not a duplicate" rather than erroring, since this
    /// probe is a pure optimization, never load-bearing for correctness.
    pub async fn is_duplicate(&self, key: &StorePath, compressed_path: &FsPath) -> Result<bool> {
        let meta = match self.head(key).await {
            Ok(meta) => meta,
            Err(Error::ObjectStore(object_store::Error::NotFound { .. })) => return Ok(false),
            Err(e) => return Err(e),
        };
        let Some(etag) = meta.e_tag.as_deref() else {
            return Ok(false);
        };
        let etag = etag.trim_matches('"');
        if !digest::is_valid_md5_hex(etag) {
            return Ok(false);
        }
        let file = std::fs::File::open(compressed_path)?;
        let local_md5 = digest::md5_reader(file)?;
        Ok(local_md5 == etag)
    }
}

fn is_credentials_error(err: &object_store::Error) -> bool {
    matches!(
        err,
        object_store::Error::Generic { source, .. }
            if {
                let msg = source.to_string().to_lowercase();
                msg.contains("credential") || msg.contains("unauthorized") || msg.contains("403")
            }
    )
}

// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A single file's failure inside a track/checkout pipeline.
#[derive(Debug, thiserror::Error)]
#[error("{path}: {cause}")]
pub struct TaskError {
    pub path: PathBuf,
    #[source]
    pub cause: Box<Error>,
}

impl TaskError {
    pub fn new(path: PathBuf, cause: Error) -> Self {
        Self {
            path,
            cause: Box::new(cause),
        }
    }
}

/// Structured error taxonomy for the core. The CLI collaborator maps these
/// onto exit codes and user-facing messages; this crate never prints.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not in repository")]
    NotInRepository,

    #[error("repository already initialized at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("manifest at {path} is corrupt: {source}")]
    ManifestCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to persist manifest at {path}: {source}")]
    ManifestPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("object store credentials error: {0}")]
    Credentials(String),

    #[error("transient object store error after {attempts} attempt(s): {source}")]
    TransientStore {
        attempts: u32,
        #[source]
        source: object_store::Error,
    },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("decompression failed: {0}")]
    Decompression(#[source] std::io::Error),

    #[error("verification failed for {path}: expected {expected}, got {actual}")]
    Verification {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("{} task(s) failed", .0.len())]
    Tasks(Vec<TaskError>),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
}

impl Error {
    /// True for the narrow set of object-store errors worth retrying:
    /// transient network/TLS/5xx conditions. Never true for a well-formed
    /// 404 or for a credentials failure.
    pub(crate) fn is_transient_store_error(err: &object_store::Error) -> bool {
        match err {
            object_store::Error::NotFound { .. } => false,
            object_store::Error::Generic { source, .. } => {
                let msg = source.to_string();
                msg.contains("timed out")
                    || msg.contains("connection reset")
                    || msg.contains("tls")
                    || msg.contains("TLS")
                    || msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503")
                    || msg.contains("504")
            }
            object_store::Error::NotImplemented => false,
            _ => true,
        }
    }
}

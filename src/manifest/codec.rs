// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Two textual encodings are accepted on read; only the preferred one is
//! ever written (§4.1, §6.2).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The manifest document. `files` is a `BTreeMap` specifically so
/// serialization naturally emits sorted keys (§6.2) without a separate
/// sort pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bucket: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

fn default_prefix() -> String {
    crate::config::DEFAULT_PREFIX.to_string()
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: default_prefix(),
            files: BTreeMap::new(),
        }
    }
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse either the preferred encoding or the legacy one (a bare
    /// `{"files": {...}}` document with no `bucket`/`prefix`, predating
    /// multi-backend support). Both deserialize through the same `serde`
    /// derive because `bucket`/`prefix` are optional/defaulted.
    pub fn parse(bytes: &[u8], path: &std::path::Path) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|source| Error::ManifestCorrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize in the preferred encoding: pretty-printed, sorted keys
    /// (for free, via `BTreeMap`), trailing newline so the file diffs
    /// cleanly under version control.
    pub fn to_preferred_bytes(&self) -> serde_json::Result<Vec<u8>> {
        let mut buf = serde_json::to_vec_pretty(self)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

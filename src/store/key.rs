// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Object key derivation (§3, §6.1): `{prefix}/assets/{digest}/{path}.gz`,
//! with `.chunk{i}` appended for the chunked-fallback scheme (§4.4).

use object_store::path::Path as StorePath;

/// Derives the base key for a tracked file's compressed blob. `path` is
/// the repo-relative working-tree path (forward-slash, already
/// normalized by the resolver); `digest` is its lowercase hex SHA-256.
pub fn asset_key(prefix: &str, digest: &str, path: &str) -> StorePath {
    StorePath::from(format!("{prefix}/assets/{digest}/{path}.gz"))
}

/// The key for chunk `index` (0-based) of a chunked upload.
pub fn chunk_key(base: &StorePath, index: u64) -> StorePath {
    StorePath::from(format!("{base}.chunk{index}"))
}

/// Extracts the numeric suffix from a chunk key produced by
/// [`chunk_key`], for sorting listed chunks back into upload order.
pub fn chunk_index(key: &StorePath) -> Option<u64> {
    let s = key.as_ref();
    let (_, suffix) = s.rsplit_once(".chunk")?;
    suffix.parse().ok()
}

/// The `{prefix}/assets/` root under which every tracked object lives,
/// used by `cleanup` (§4.6) to enumerate the whole asset space.
pub fn assets_root(prefix: &str) -> StorePath {
    StorePath::from(format!("{prefix}/assets/"))
}

/// Extracts the digest segment from a full object key under
/// `{prefix}/assets/{digest}/...`, per §4.6's fixed-index parse: after
/// stripping `prefix`, the digest is segment index 1 (`assets` is 0).
/// Returns `None` for any key that doesn't match this shape, which the
/// caller treats as a warning rather than a hard error.
pub fn digest_from_key(prefix: &str, key: &StorePath) -> Option<String> {
    let full = key.as_ref();
    let rest = full.strip_prefix(prefix)?.trim_start_matches('/');
    let mut segments = rest.split('/');
    if segments.next() != Some("assets") {
        return None;
    }
    let digest = segments.next()?;
    if crate::digest::is_valid_sha256_hex(digest) {
        Some(digest.to_string())
    } else {
        None
    }
}

// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Content digests (§4.3). SHA-256 identifies tracked file content; MD5
//! exists solely to compare against the object store's single-part ETag
//! during the dedup probe (§4.4).

use std::io::Read;
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::error::Result;

const BUF_SIZE: usize = 1024 * 1024;

/// SHA-256 of a file's raw bytes, streamed in fixed-size chunks so that
/// digesting a large asset never requires holding it fully in memory.
/// Covers content only — no path or metadata is mixed into the hash,
/// since the path is already encoded in the derived object key (§9).
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 over an in-memory buffer, e.g. for a reconstituted blob
/// post-decompression during checkout verification (§4.5, §7).
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// MD5 over a reader's full content, used only to compare against a
/// remote single-part ETag in the dedup probe (§4.4). Never used for
/// tracking identity.
pub fn md5_reader(mut reader: impl Read) -> Result<String> {
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// MD5 over an in-memory buffer.
pub fn md5_bytes(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// A digest is exactly 64 lowercase hex characters (§3 invariant).
pub fn is_valid_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

/// A bare single-part MD5 ETag is exactly 32 lowercase hex characters;
/// a multipart ETag (carrying a `-<part count>` suffix) fails this check
/// and is treated by the dedup probe as "not comparable" (§4.4).
pub fn is_valid_md5_hex(s: &str) -> bool {
    s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

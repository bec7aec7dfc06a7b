// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Chunked upload/download fallback (§4.4, §6.1). Distinct from
//! `object_store`'s own internal multipart upload: this activates only
//! above the configured chunk threshold and is implemented entirely by
//! this crate, because the wire format (`.chunk{i}` siblings) is part of
//! this crate's external interface, not an implementation detail.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path as FsPath;

use bytes::Bytes;
use object_store::path::Path as StorePath;

use super::key::chunk_key;
use super::ObjectStoreClient;
use crate::error::{Error, Result};

const READ_BUF: usize = 64 * 1024;

/// Splits `src` into fixed-size windows and uploads each as its own
/// object keyed `{base}.chunk{i}`, in order. Each chunk is itself still
/// eligible for `object_store`'s internal multipart if it's large.
pub async fn put_chunked(
    client: &ObjectStoreClient,
    base: &StorePath,
    src: &FsPath,
    chunk_size: u64,
) -> Result<()> {
    let mut file = BufReader::new(File::open(src)?);
    let mut index = 0u64;
    loop {
        let chunk = read_chunk(&mut file, chunk_size)?;
        if chunk.is_empty() && index > 0 {
            break;
        }
        let short = (chunk.len() as u64) < chunk_size;
        let key = chunk_key(base, index);
        client.put_bytes(&key, Bytes::from(chunk)).await?;
        index += 1;
        if short {
            // A full chunk ending exactly on a chunk_size boundary is
            // followed by one more (empty) read that breaks the loop
            // above instead; a short chunk is unambiguously the last one.
            break;
        }
    }
    Ok(())
}

fn read_chunk(reader: &mut impl Read, chunk_size: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(chunk_size.min(8 * 1024 * 1024) as usize);
    let mut remaining = chunk_size;
    let mut window = [0u8; READ_BUF];
    while remaining > 0 {
        let want = window.len().min(remaining as usize);
        let n = reader.read(&mut window[..want])?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&window[..n]);
        remaining -= n as u64;
    }
    Ok(buf)
}

/// Fetches chunk 0, 1, 2, ... in order until the store reports one
/// missing, concatenating each into `dst` as it arrives. `object_store`'s
/// `list` matches prefixes on path-segment boundaries, so a raw string
/// prefix like `{base}.chunk` never matches the real keys (`{base}.chunk0`,
/// `{base}.chunk1`, ...) — probing each index directly with `head`/`get`
/// sidesteps that entirely and also makes a gap in the sequence (chunk0
/// and chunk2 present but not chunk1) surface naturally as "stop at 1",
/// never silently skipped.
pub async fn get_chunked(client: &ObjectStoreClient, base: &StorePath, dst: &FsPath) -> Result<()> {
    let mut out = BufWriter::new(File::create(dst)?);
    let mut index = 0u64;
    loop {
        match client.get_bytes(&chunk_key(base, index)).await {
            Ok(bytes) => {
                out.write_all(&bytes)?;
                index += 1;
            }
            Err(Error::ObjectStore(object_store::Error::NotFound { .. })) => break,
            Err(err) => return Err(err),
        }
    }
    if index == 0 {
        return Err(Error::NotFound(base.to_string()));
    }
    out.flush()?;
    Ok(())
}

/// True if chunk 0 of `base` exists, used to decide at download time
/// whether a stored asset was uploaded chunked or whole, since the
/// manifest itself carries no such flag (§4.4). A bare `head` probe on
/// the first chunk avoids the same segment-boundary pitfall as
/// `get_chunked` above.
pub async fn has_chunks(client: &ObjectStoreClient, base: &StorePath) -> Result<bool> {
    match client.head(&chunk_key(base, 0)).await {
        Ok(_) => Ok(true),
        Err(Error::ObjectStore(object_store::Error::NotFound { .. })) => Ok(false),
        Err(err) => Err(err),
    }
}

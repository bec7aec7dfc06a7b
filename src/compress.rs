// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic gzip (§4.3). Compression must be reproducible across runs
//! and platforms: fixed mid-range level, no embedded filename, zeroed
//! embedded modification time.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};

use crate::error::{Error, Result};

const BUF_SIZE: usize = 1024 * 1024;

/// Mid-range compression level, chosen for reproducibility over ratio or
/// speed at either extreme (§4.3).
const COMPRESSION_LEVEL: u32 = 5;

/// Compress `src` into `dst`, streaming through a fixed-size buffer so
/// neither file is fully materialized in memory. The gzip header carries
/// no filename and a zeroed modification time, so identical input bytes
/// always produce identical compressed bytes.
pub fn compress_file(src: &Path, dst: &Path) -> Result<()> {
    let mut input = BufReader::new(File::open(src)?);
    let output = BufWriter::new(File::create(dst)?);
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(output, Compression::new(COMPRESSION_LEVEL));

    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        encoder.write_all(&buf[..n])?;
    }
    encoder.finish()?;
    Ok(())
}

/// Compress an in-memory buffer, used for small blobs (e.g. the manifest
/// itself is never gzipped, but chunk payloads built in memory during
/// tests are). Deterministic under the same rules as `compress_file`.
pub fn compress_bytes(src: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::new(COMPRESSION_LEVEL));
    encoder.write_all(src)?;
    Ok(encoder.finish()?)
}

/// Decompress `src` into `dst`. A truncated or otherwise invalid gzip
/// stream surfaces as `Error::Decompression`, never a panic (§4.3, §7).
pub fn decompress_file(src: &Path, dst: &Path) -> Result<()> {
    let input = BufReader::new(File::open(src)?);
    let mut decoder = flate2::read::GzDecoder::new(input);
    let mut output = BufWriter::new(File::create(dst)?);
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = decoder
            .read(&mut buf)
            .map_err(Error::Decompression)?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n])?;
    }
    output.flush()?;
    Ok(())
}

/// Decompress an in-memory gzip buffer.
pub fn decompress_bytes(src: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(src);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(Error::Decompression)?;
    Ok(out)
}

// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! The Path Resolver (§4.2): translates one user pattern into either a
//! list of filesystem paths or a subset of manifest entries, under a
//! single shared glob semantics. `path_matches` is the one function both
//! sides call — that's the enforcement mechanism for the
//! resolver-equivalence property (§8.4).

use std::collections::BTreeSet;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::Result;

const GLOB_META: &[char] = &['*', '?', '['];

fn has_glob_meta(pattern: &str) -> bool {
    pattern.chars().any(|c| GLOB_META.contains(&c))
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// True if `candidate` (a repo-relative, forward-slash path) matches
/// `pattern` under the shared glob semantics of §4.2:
///
/// 1. No meta-characters: exact match, or directory-prefix match.
/// 2. With meta-characters: segment-wise shell-glob matching, where `*`
///    never crosses a `/`.
/// 3. `**` matches zero or more whole segments.
/// 4. Case-sensitive, forward-slash normalized.
pub fn path_matches(pattern: &str, candidate: &str) -> bool {
    let pattern = normalize(pattern);
    let candidate = normalize(candidate);

    if !has_glob_meta(&pattern) && !pattern.contains("**") {
        return candidate == pattern || candidate.starts_with(&format!("{pattern}/"));
    }

    let pattern_segs: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let candidate_segs: Vec<&str> = candidate.split('/').filter(|s| !s.is_empty()).collect();
    segments_match(&pattern_segs, &candidate_segs)
}

/// Segment-wise matcher implementing rule 3 (`**`) explicitly, since
/// `glob::Pattern` has no notion of "zero or more segments" on its own —
/// it only matches within a single path component when applied per
/// segment, which is exactly how rule 2 wants it used.
fn segments_match(pattern: &[&str], candidate: &[&str]) -> bool {
    match pattern.first() {
        None => candidate.is_empty(),
        Some(&"**") => {
            // Zero or more segments: try consuming 0, 1, 2, ... segments
            // of the candidate before matching the rest of the pattern.
            for split in 0..=candidate.len() {
                if segments_match(&pattern[1..], &candidate[split..]) {
                    return true;
                }
            }
            false
        }
        Some(seg) => {
            if candidate.is_empty() {
                return false;
            }
            let Ok(glob_pattern) = glob::Pattern::new(seg) else {
                return false;
            };
            glob_pattern.matches(candidate[0]) && segments_match(&pattern[1..], &candidate[1..])
        }
    }
}

/// Filesystem-side resolution (§4.2): for an existing file, just that
/// path; for an existing directory, every regular file beneath it
/// recursively; for a pattern, every regular file under `root` whose
/// repo-relative path matches. Directories are never returned, and
/// results are deduplicated and sorted so a glob that overlaps an
/// explicit file collapses to one entry (§4.5 edge case).
pub fn resolve_filesystem(root: &Path, pattern: &str) -> Result<Vec<String>> {
    let candidate = root.join(pattern);

    if candidate.is_file() {
        return Ok(vec![normalize(pattern)]);
    }
    if candidate.is_dir() {
        return Ok(list_files_under(root, &candidate));
    }

    let mut matches = BTreeSet::new();
    let walk_root = longest_non_glob_prefix(root, pattern);
    for entry in WalkDir::new(&walk_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel_str = normalize(&rel.to_string_lossy());
        if path_matches(pattern, &rel_str) {
            matches.insert(rel_str);
        }
    }
    Ok(matches.into_iter().collect())
}

/// Every regular file under `dir`, as paths relative to `root`.
fn list_files_under(root: &Path, dir: &Path) -> Vec<String> {
    let mut out = BTreeSet::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            out.insert(normalize(&rel.to_string_lossy()));
        }
    }
    out.into_iter().collect()
}

/// Walking the whole repository root for every glob is correct but
/// wasteful; a pattern like `data/*.txt` only needs `data/` walked. This
/// returns the deepest directory that can't itself contain glob
/// meta-characters or `**`.
fn longest_non_glob_prefix(root: &Path, pattern: &str) -> std::path::PathBuf {
    let mut prefix = root.to_path_buf();
    for seg in pattern.split('/') {
        if seg.is_empty() || seg == "**" || has_glob_meta(seg) {
            break;
        }
        prefix.push(seg);
    }
    if prefix.is_dir() {
        prefix
    } else {
        root.to_path_buf()
    }
}

/// Manifest-side resolution (§4.2): matches against the in-memory `files`
/// keys directly, no filesystem access, using the identical matcher.
pub fn resolve_manifest<'a>(
    files: impl Iterator<Item = &'a String>,
    pattern: &str,
) -> Vec<String> {
    let mut matches: Vec<String> = files
        .filter(|path| path_matches(pattern, path))
        .cloned()
        .collect();
    matches.sort();
    matches.dedup();
    matches
}

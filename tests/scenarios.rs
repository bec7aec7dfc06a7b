// Copyright (c) the s3track authors
// SPDX-License-Identifier: Apache-2.0

//! The six literal end-to-end scenarios from the testable-properties
//! section: each exercises `Repository`'s public surface the way an
//! embedding CLI would, rather than any one module in isolation.

mod support;

use s3track::digest::sha256_bytes;
use s3track::{CheckoutOptions, TrackOptions};

/// S1: a tracked file's object key digest segment equals the SHA-256 of
/// its content, and re-tracking the same unchanged content uploads
/// nothing new.
#[tokio::test]
async fn s1_upload_then_reupload_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    support::write(root, "test_file.txt", b"This is a test file.");
    let repo = support::repo(root);

    let first = repo
        .track(&["test_file.txt".to_string()], TrackOptions::default())
        .await
        .unwrap();
    assert_eq!(first.uploaded, vec!["test_file.txt".to_string()]);

    let entries = repo.list(None).await.unwrap();
    assert_eq!(entries.len(), 1);
    let (path, digest) = &entries[0];
    assert_eq!(path, "test_file.txt");
    assert_eq!(digest, &sha256_bytes(b"This is a test file."));

    let second = repo
        .track(&["test_file.txt".to_string()], TrackOptions::default())
        .await
        .unwrap();
    assert!(second.uploaded.is_empty());
    assert_eq!(second.unchanged, vec!["test_file.txt".to_string()]);
}

/// S2: glob containment — `*` stays within a directory, `**` crosses
/// every level, and a directory-scoped glob only picks up its own files.
#[tokio::test]
async fn s2_glob_containment_selects_the_expected_subsets() {
    // Each pattern is checked against its own fresh working tree and
    // repository, so one call's commits never shrink the next call's
    // "unchanged" set (§4.5 step 3b would otherwise make a
    // already-tracked file disappear from `uploaded` on a later call).
    let seeded = || {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["a.txt", "b.txt", "data/c.txt", "data/sub/d.txt"] {
            support::write(dir.path(), rel, b"x");
        }
        dir
    };

    let dir = seeded();
    let repo = support::repo(dir.path());
    let star = repo
        .track(&["*.txt".to_string()], TrackOptions::default())
        .await
        .unwrap();
    let mut uploaded = star.uploaded.clone();
    uploaded.sort();
    assert_eq!(uploaded, vec!["a.txt".to_string(), "b.txt".to_string()]);

    let dir = seeded();
    let repo = support::repo(dir.path());
    let doublestar = repo
        .track(&["**/*.txt".to_string()], TrackOptions::default())
        .await
        .unwrap();
    let mut uploaded = doublestar.uploaded.clone();
    uploaded.sort();
    assert_eq!(
        uploaded,
        vec![
            "a.txt".to_string(),
            "b.txt".to_string(),
            "data/c.txt".to_string(),
            "data/sub/d.txt".to_string(),
        ]
    );

    let dir = seeded();
    let repo = support::repo(dir.path());
    let data_star = repo
        .track(&["data/*.txt".to_string()], TrackOptions::default())
        .await
        .unwrap();
    assert_eq!(data_star.uploaded, vec!["data/c.txt".to_string()]);
}

/// S3: a deleted tracked file comes back byte-identical on checkout.
#[tokio::test]
async fn s3_checkout_after_delete_restores_identical_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    support::write(root, "test_file.txt", b"This is a test file.");
    let repo = support::repo(root);
    repo.track(&["test_file.txt".to_string()], TrackOptions::default())
        .await
        .unwrap();

    std::fs::remove_file(root.join("test_file.txt")).unwrap();
    let summary = repo
        .checkout(&["test_file.txt".to_string()], CheckoutOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.downloaded, vec!["test_file.txt".to_string()]);
    assert_eq!(
        std::fs::read(root.join("test_file.txt")).unwrap(),
        b"This is a test file."
    );
}

/// S4: `track_modified` only re-uploads the file whose content actually
/// changed, landing a new digest in the manifest for it.
#[tokio::test]
async fn s4_modified_sweep_retracks_only_the_changed_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    support::write(root, "third.txt", b"A");
    let repo = support::repo(root);
    repo.track(&["third.txt".to_string()], TrackOptions::default())
        .await
        .unwrap();

    support::write(root, "third.txt", b"B");
    let summary = repo.track_modified(TrackOptions::default()).await.unwrap();
    assert_eq!(summary.uploaded, vec!["third.txt".to_string()]);

    let entries = repo.list(Some("third.txt")).await.unwrap();
    assert_eq!(entries[0].1, sha256_bytes(b"B"));
}

/// S5: removing with `keep_in_store = false` drops the manifest entry
/// and deletes the underlying object.
#[tokio::test]
async fn s5_remove_with_purge_deletes_manifest_entry_and_object() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    support::write(root, "test_file.txt", b"This is a test file.");
    let repo = support::repo(root);
    repo.track(&["test_file.txt".to_string()], TrackOptions::default())
        .await
        .unwrap();

    let removed = repo
        .remove("test_file.txt", false)
        .await
        .unwrap()
        .unwrap();
    assert!(removed.purged);
    assert!(repo.list(None).await.unwrap().is_empty());

    let report = repo.cleanup().await.unwrap();
    assert_eq!(report.digests_removed, 0, "the object was already purged by remove");
}

/// S6: an orphaned object (manifest entry dropped without going
/// through `remove`) is deleted by the next `cleanup` sweep.
#[tokio::test]
async fn s6_cleanup_deletes_the_orphaned_object() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    support::write(root, "test_file.txt", b"This is a test file.");
    let repo = support::repo(root);
    repo.track(&["test_file.txt".to_string()], TrackOptions::default())
        .await
        .unwrap();

    // Drop the manifest entry directly, bypassing `remove`, so the
    // object is orphaned rather than purged.
    let dropped = repo
        .remove("test_file.txt", /* keep_in_store */ true)
        .await
        .unwrap()
        .unwrap();
    assert!(!dropped.purged);

    let report = repo.cleanup().await.unwrap();
    assert_eq!(report.digests_removed, 1);
    assert!(report.warnings.is_empty());
}

//! End-to-end pipeline tests over in-memory backends: full commits,
//! idempotent re-runs, version selection, dry runs, and failure isolation.

use std::sync::Arc;

use bytes::Bytes;

use granary_catalog::{BundleState, CommitOptions, CommitPipeline};
use granary_core::{MemoryBackend, StorageBackend, WritePrecondition};

const ENTRY: &str = "provider=aihub/dataset=office_docs/task=ocr/variant=base/lang=ko/src=real";
const ASSET: &str = "provider=aihub/dataset=office_docs/images/3f/3fa4.png";

fn meta_json(variant: &str, build_time: &str) -> String {
    format!(
        r#"{{"provider":"aihub","dataset":"office_docs","task":"ocr","variant":"{variant}",
            "partitions":"lang=ko,src=real","build_time":"{build_time}"}}"#
    )
}

async fn put(backend: &MemoryBackend, path: &str, data: &str) {
    backend
        .put(path, Bytes::from(data.to_string()), WritePrecondition::None)
        .await
        .unwrap();
}

/// Seeds one complete bundle (tabular + sidecar + one asset) under `dir`.
async fn seed_bundle(staging: &MemoryBackend, dir: &str, variant: &str, build_time: &str) {
    put(
        staging,
        &format!("{dir}/data.jsonl"),
        "{\"text\":\"hello\",\"image\":\"images/3f/3fa4.png\"}\n",
    )
    .await;
    put(
        staging,
        &format!("{dir}/_meta.json"),
        &meta_json(variant, build_time),
    )
    .await;
    put(staging, &format!("{dir}/images/3f/3fa4.png"), "pixels").await;
}

fn pipeline(
    staging: &Arc<MemoryBackend>,
    catalog: &Arc<MemoryBackend>,
    trash: &Arc<MemoryBackend>,
) -> CommitPipeline {
    CommitPipeline::new(staging.clone(), catalog.clone(), trash.clone())
}

#[tokio::test]
async fn test_full_commit_promotes_verifies_and_archives() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());
    seed_bundle(&staging, "prod-a/batch-1", "base", "2025-01-15T10:30:00Z").await;

    let summary = pipeline(&staging, &catalog, &trash).run().await.unwrap();

    assert_eq!(summary.committed.len(), 1);
    assert_eq!(summary.committed[0].state, BundleState::Archived);
    assert!(summary.failed.is_empty());
    assert!(!summary.has_failures());

    // Catalog holds the entry and the content-addressed asset.
    assert!(catalog
        .head(&format!("{ENTRY}/data.jsonl"))
        .await
        .unwrap()
        .is_some());
    assert!(catalog
        .head(&format!("{ENTRY}/_meta.json"))
        .await
        .unwrap()
        .is_some());
    assert!(catalog.head(ASSET).await.unwrap().is_some());

    // Staging inputs were relocated to the trash, never deleted outright.
    assert!(staging
        .head("prod-a/batch-1/data.jsonl")
        .await
        .unwrap()
        .is_none());
    assert!(staging
        .head("prod-a/batch-1/_meta.json")
        .await
        .unwrap()
        .is_none());
    let trashed = trash.list("").await.unwrap();
    assert_eq!(trashed.len(), 2);
    assert!(trashed
        .iter()
        .any(|o| o.path.starts_with("data.jsonl.20")));
    assert!(trashed
        .iter()
        .any(|o| o.path.starts_with("_meta.json.20")));

    // The staged asset copy stays behind; only the bundle files are consumed.
    assert!(staging
        .head("prod-a/batch-1/images/3f/3fa4.png")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_second_run_finds_nothing_and_rewrites_nothing() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());
    seed_bundle(&staging, "prod-a/batch-1", "base", "2025-01-15T10:30:00Z").await;

    let p = pipeline(&staging, &catalog, &trash);
    p.run().await.unwrap();
    let data_version = catalog
        .head(&format!("{ENTRY}/data.jsonl"))
        .await
        .unwrap()
        .unwrap()
        .version;

    let summary = p.run().await.unwrap();
    assert!(summary.committed.is_empty());
    assert!(summary.failed.is_empty());
    assert!(summary.skipped.is_empty());

    // The catalog entry was not rewritten by the no-op run.
    let after = catalog
        .head(&format!("{ENTRY}/data.jsonl"))
        .await
        .unwrap()
        .unwrap()
        .version;
    assert_eq!(after, data_version);
    assert_eq!(trash.list("").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_newest_build_wins_across_timestamp_formats() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());

    // Same key, two builds; the older one uses a different timestamp format.
    put(
        &staging,
        "prod-a/old/data.jsonl",
        "{\"text\":\"old build\"}\n",
    )
    .await;
    put(
        &staging,
        "prod-a/old/_meta.json",
        &meta_json("base", "2025-01-15 10:30:00"),
    )
    .await;
    put(
        &staging,
        "prod-b/new/data.jsonl",
        "{\"text\":\"new build\"}\n",
    )
    .await;
    put(
        &staging,
        "prod-b/new/_meta.json",
        &meta_json("base", "2025-01-16T00:00:00Z"),
    )
    .await;

    let summary = pipeline(&staging, &catalog, &trash).run().await.unwrap();
    assert_eq!(summary.committed.len(), 1);

    let data = catalog.get(&format!("{ENTRY}/data.jsonl")).await.unwrap();
    assert_eq!(data, Bytes::from("{\"text\":\"new build\"}\n"));

    // Only the selected bundle was archived; the older duplicate stays in
    // staging untouched.
    assert!(staging.head("prod-b/new/data.jsonl").await.unwrap().is_none());
    assert!(staging.head("prod-a/old/data.jsonl").await.unwrap().is_some());
    assert!(staging.head("prod-a/old/_meta.json").await.unwrap().is_some());
}

#[tokio::test]
async fn test_stale_leftover_never_rolls_the_catalog_back() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());

    put(&staging, "prod-a/old/data.jsonl", "{\"text\":\"old\"}\n").await;
    put(
        &staging,
        "prod-a/old/_meta.json",
        &meta_json("base", "2025-01-15T10:30:00Z"),
    )
    .await;
    put(&staging, "prod-b/new/data.jsonl", "{\"text\":\"new\"}\n").await;
    put(
        &staging,
        "prod-b/new/_meta.json",
        &meta_json("base", "2025-01-16T00:00:00Z"),
    )
    .await;

    let p = pipeline(&staging, &catalog, &trash);
    p.run().await.unwrap();
    let trash_count = trash.list("").await.unwrap().len();

    // Second run sees only the stale leftover, which must not clobber the
    // newer committed entry.
    let summary = p.run().await.unwrap();
    assert!(summary.committed.is_empty());
    assert_eq!(summary.skipped.len(), 1);
    assert!(summary.skipped[0].reason.contains("up to date"));

    let data = catalog.get(&format!("{ENTRY}/data.jsonl")).await.unwrap();
    assert_eq!(data, Bytes::from("{\"text\":\"new\"}\n"));
    assert_eq!(trash.list("").await.unwrap().len(), trash_count);
    assert!(staging.head("prod-a/old/data.jsonl").await.unwrap().is_some());
}

#[tokio::test]
async fn test_dry_run_mutates_nothing() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());
    seed_bundle(&staging, "prod-a/batch-1", "base", "2025-01-15T10:30:00Z").await;
    let before: Vec<String> = {
        let mut paths: Vec<String> = staging
            .list("")
            .await
            .unwrap()
            .into_iter()
            .map(|o| format!("{}@{}", o.path, o.version))
            .collect();
        paths.sort();
        paths
    };

    let summary = pipeline(&staging, &catalog, &trash)
        .with_options(CommitOptions::dry_run())
        .run()
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.committed.len(), 1);
    let promotion = summary.committed[0].promotion.as_ref().unwrap();
    assert!(!promotion.planned.is_empty());

    // No root was touched: catalog and trash are empty, staging is
    // byte-for-byte identical (same paths, same versions).
    assert!(catalog.list("").await.unwrap().is_empty());
    assert!(trash.list("").await.unwrap().is_empty());
    let after: Vec<String> = {
        let mut paths: Vec<String> = staging
            .list("")
            .await
            .unwrap()
            .into_iter()
            .map(|o| format!("{}@{}", o.path, o.version))
            .collect();
        paths.sort();
        paths
    };
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_integrity_failure_preserves_staging() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());
    put(&staging, "prod-a/bad/data.jsonl", "{\"ok\":1}\nnot json at all\n").await;
    put(
        &staging,
        "prod-a/bad/_meta.json",
        &meta_json("base", "2025-01-15T10:30:00Z"),
    )
    .await;

    let summary = pipeline(&staging, &catalog, &trash).run().await.unwrap();

    assert!(summary.has_failures());
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].state, BundleState::Promoted);
    assert!(summary.failed[0]
        .reason
        .as_deref()
        .unwrap()
        .contains("row 2"));

    // Staging inputs survive for the next run; nothing was archived.
    assert!(staging.head("prod-a/bad/data.jsonl").await.unwrap().is_some());
    assert!(staging.head("prod-a/bad/_meta.json").await.unwrap().is_some());
    assert!(trash.list("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_repaired_bundle_commits_on_the_next_run() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());
    put(&staging, "prod-a/bad/data.jsonl", "{\"ok\":1}\nnot json at all\n").await;
    put(
        &staging,
        "prod-a/bad/_meta.json",
        &meta_json("base", "2025-01-15T10:30:00Z"),
    )
    .await;

    let p = pipeline(&staging, &catalog, &trash);
    let summary = p.run().await.unwrap();
    assert!(summary.has_failures());
    assert_eq!(summary.failed[0].state, BundleState::Promoted);

    // The producer repairs the tabular file in place; the build stamp is
    // unchanged. The entry promotion left in the catalog never passed
    // verification, so it must not shadow the retry.
    put(&staging, "prod-a/bad/data.jsonl", "{\"ok\":1}\n{\"ok\":2}\n").await;

    let summary = p.run().await.unwrap();
    assert!(!summary.has_failures());
    assert!(summary.skipped.is_empty());
    assert_eq!(summary.committed.len(), 1);
    assert_eq!(summary.committed[0].state, BundleState::Archived);

    let data = catalog.get(&format!("{ENTRY}/data.jsonl")).await.unwrap();
    assert_eq!(data, Bytes::from("{\"ok\":1}\n{\"ok\":2}\n"));
    assert!(staging.head("prod-a/bad/data.jsonl").await.unwrap().is_none());
}

#[tokio::test]
async fn test_schema_failure_mutates_nothing() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());
    put(&staging, "prod-a/bad/data.jsonl", "{\"ok\":1}\n").await;
    // "fr" is not an allowed value for the lang dimension.
    put(
        &staging,
        "prod-a/bad/_meta.json",
        r#"{"provider":"aihub","dataset":"office_docs","task":"ocr","variant":"base",
            "partitions":"lang=fr,src=real","build_time":"2025-01-15T10:30:00Z"}"#,
    )
    .await;

    let summary = pipeline(&staging, &catalog, &trash).run().await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].state, BundleState::Discovered);
    assert!(catalog.list("").await.unwrap().is_empty());
    assert!(trash.list("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_one_bundle_failure_never_blocks_another() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());
    put(&staging, "prod-a/bad/data.jsonl", "garbage\n").await;
    put(
        &staging,
        "prod-a/bad/_meta.json",
        &meta_json("base", "2025-01-15T10:30:00Z"),
    )
    .await;
    seed_bundle(&staging, "prod-b/good", "large", "2025-01-15T10:30:00Z").await;

    let summary = pipeline(&staging, &catalog, &trash).run().await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.committed.len(), 1);
    assert_eq!(summary.committed[0].key.variant, "large");
    assert_eq!(summary.committed[0].state, BundleState::Archived);
}

#[tokio::test]
async fn test_assets_deduplicate_across_bundles() {
    let staging = Arc::new(MemoryBackend::new());
    let catalog = Arc::new(MemoryBackend::new());
    let trash = Arc::new(MemoryBackend::new());
    // Two slices of the same dataset referencing the same content hash.
    seed_bundle(&staging, "prod-a/base", "base", "2025-01-15T10:30:00Z").await;
    seed_bundle(&staging, "prod-b/large", "large", "2025-01-15T10:30:00Z").await;

    let summary = pipeline(&staging, &catalog, &trash).run().await.unwrap();
    assert_eq!(summary.committed.len(), 2);

    let (copied, deduplicated): (u64, u64) = summary
        .committed
        .iter()
        .filter_map(|o| o.promotion.as_ref())
        .fold((0, 0), |(c, d), p| {
            (c + p.assets_copied, d + p.assets_deduplicated)
        });
    assert_eq!(copied, 1);
    assert_eq!(deduplicated, 1);

    // The asset was written exactly once.
    let meta = catalog.head(ASSET).await.unwrap().unwrap();
    assert_eq!(meta.version, "1");
}

mod common;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::NaiveDate;
use common::test_helpers::{create_test_config, item_with_checksum, setup_test_logger};
use gem_harvester::fetch::load_manifest;
use gem_harvester::testing::{checksum_of, work_item, RecordingFetcher, StaticMetadata};
use gem_harvester::{FetchOptions, FetchPipeline, MetadataSource, WorkItem};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Returns its rows unfiltered, yanked ones included
struct RawRows(Vec<WorkItem>);

#[async_trait]
impl MetadataSource for RawRows {
    async fn count(&self, _cutoff: NaiveDate) -> gem_harvester::Result<i64> {
        Ok(self.0.len() as i64)
    }
    async fn total_size(&self, _cutoff: NaiveDate) -> gem_harvester::Result<i64> {
        Ok(self.0.iter().map(|item| item.size).sum())
    }
    async fn rows(&self, _cutoff: NaiveDate) -> gem_harvester::Result<Vec<WorkItem>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn missing_artifact_is_fetched_once() {
    setup_test_logger();
    let temp_dir = TempDir::new().unwrap();
    let checksum = STANDARD.encode(hex::decode("deadbeef").unwrap());
    let fetcher = Arc::new(RecordingFetcher::new());

    let pipeline = FetchPipeline::new(
        create_test_config(temp_dir.path(), 4),
        Arc::new(StaticMetadata::new(vec![item_with_checksum("foo", "1.0.0", &checksum)])),
        fetcher.clone(),
    );
    let report = pipeline.run(&FetchOptions::default()).await.unwrap();

    let summary = report.summary.unwrap();
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.skipped, 0);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn matching_artifact_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let gems_dir = temp_dir.path().join("gems");
    std::fs::create_dir_all(&gems_dir).unwrap();
    std::fs::write(gems_dir.join("foo-1.0.0.gem"), b"foo gem bytes").unwrap();
    let fetcher = Arc::new(RecordingFetcher::new());

    let pipeline = FetchPipeline::new(
        create_test_config(temp_dir.path(), 4),
        Arc::new(StaticMetadata::new(vec![item_with_checksum(
            "foo",
            "1.0.0",
            &checksum_of(b"foo gem bytes"),
        )])),
        fetcher.clone(),
    );
    let summary = pipeline.run(&FetchOptions::default()).await.unwrap().summary.unwrap();

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.attempted, 0);
}

#[tokio::test]
async fn partial_artifact_is_fetched_again() {
    let temp_dir = TempDir::new().unwrap();
    let gems_dir = temp_dir.path().join("gems");
    std::fs::create_dir_all(&gems_dir).unwrap();
    std::fs::write(gems_dir.join("foo-1.0.0.gem"), b"foo gem").unwrap();
    let fetcher = Arc::new(RecordingFetcher::new().writing(b"foo gem bytes"));

    let pipeline = FetchPipeline::new(
        create_test_config(temp_dir.path(), 4),
        Arc::new(StaticMetadata::new(vec![item_with_checksum(
            "foo",
            "1.0.0",
            &checksum_of(b"foo gem bytes"),
        )])),
        fetcher.clone(),
    );

    let first = pipeline.run(&FetchOptions::default()).await.unwrap().summary.unwrap();
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(first.succeeded, 1);
    assert_eq!(std::fs::read(gems_dir.join("foo-1.0.0.gem")).unwrap(), b"foo gem bytes");

    let second = pipeline.run(&FetchOptions::default()).await.unwrap().summary.unwrap();
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(second.skipped, 1);
}

#[tokio::test]
async fn yanked_rows_are_never_fetched() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = Arc::new(RecordingFetcher::new());
    let rows = vec![
        work_item("live", "1.0.0", "2022-01-01", true),
        work_item("pulled", "0.9.0", "2022-01-02", false),
    ];

    let pipeline = FetchPipeline::new(
        create_test_config(temp_dir.path(), 2),
        Arc::new(RawRows(rows)),
        fetcher.clone(),
    );
    let summary = pipeline.run(&FetchOptions::default()).await.unwrap().summary.unwrap();

    assert_eq!(fetcher.fetched(), vec!["live-1.0.0".to_string()]);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn never_more_than_limit_fetches_in_flight() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = Arc::new(RecordingFetcher::new().with_delay(Duration::from_millis(5)));
    let items: Vec<WorkItem> = (0..50)
        .map(|i| work_item(&format!("gem{i}"), "1.0.0", "2022-01-01", true))
        .collect();

    let pipeline = FetchPipeline::new(
        create_test_config(temp_dir.path(), 4),
        Arc::new(StaticMetadata::new(items)),
        fetcher.clone(),
    );
    let summary = pipeline.run(&FetchOptions::default()).await.unwrap().summary.unwrap();

    assert_eq!(summary.total, 50);
    assert_eq!(summary.succeeded, 50);
    assert_eq!(fetcher.calls(), 50);
    assert!(fetcher.peak() <= 4, "peak was {}", fetcher.peak());
}

#[tokio::test]
async fn manifest_is_overwritten_each_run() {
    let temp_dir = TempDir::new().unwrap();
    let options = FetchOptions {
        cutoff: None,
        manifest_only: true,
    };

    let first = FetchPipeline::new(
        create_test_config(temp_dir.path(), 2),
        Arc::new(StaticMetadata::new(vec![
            work_item("a", "1.0.0", "2022-01-01", true),
            work_item("b", "1.0.0", "2022-01-02", true),
        ])),
        Arc::new(RecordingFetcher::new()),
    );
    let report = first.run(&options).await.unwrap();
    assert_eq!(load_manifest(&report.manifest_path).await.unwrap().len(), 2);

    let second = FetchPipeline::new(
        create_test_config(temp_dir.path(), 2),
        Arc::new(StaticMetadata::new(vec![work_item("c", "2.0.0", "2022-02-01", true)])),
        Arc::new(RecordingFetcher::new()),
    );
    let report = second.run(&options).await.unwrap();

    let manifest = load_manifest(&report.manifest_path).await.unwrap();
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].name, "c");
    assert_eq!(report.manifest_path, temp_dir.path().join("manifest.json"));
}

#[tokio::test]
async fn cutoff_limits_the_work_list() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = Arc::new(RecordingFetcher::new());
    let pipeline = FetchPipeline::new(
        create_test_config(temp_dir.path(), 2),
        Arc::new(StaticMetadata::new(vec![
            work_item("old", "1.0.0", "2019-05-01", true),
            work_item("new", "1.0.0", "2021-05-01", true),
        ])),
        fetcher.clone(),
    );

    let report = pipeline
        .run(&FetchOptions {
            cutoff: NaiveDate::from_ymd_opt(2020, 12, 31),
            manifest_only: false,
        })
        .await
        .unwrap();

    assert_eq!(report.count, 1);
    assert_eq!(fetcher.fetched(), vec!["new-1.0.0".to_string()]);
}

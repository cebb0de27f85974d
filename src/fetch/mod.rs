//! Download pipeline: database rows in, manifest and `.gem` files out.

pub mod manifest;
pub mod tool;

pub use manifest::{load_manifest, save_manifest};
pub use tool::{ArtifactFetcher, GemCommand};

use crate::check::artifact_is_current;
use crate::config::Config;
use crate::error::Result;
use crate::metadata::{format_cutoff, query_work, MetadataSource};
use crate::models::{Outcome, RunSummary, WorkItem};
use crate::parallel::TaskRunner;
use crate::ui::print_info;
use crate::ui::progress::{Aggregator, ProgressLabels};
use crate::utils::retry::with_retry;
use chrono::NaiveDate;
use indicatif::HumanBytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-run switches coming from the command line
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Only versions created after this date; all history when unset
    pub cutoff: Option<NaiveDate>,
    /// Write the manifest and stop
    pub manifest_only: bool,
}

/// What a fetch run found and did
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// Cutoff actually queried
    pub cutoff: NaiveDate,
    /// Versions the database reported
    pub count: i64,
    /// Their total size in bytes
    pub total_size: i64,
    /// Where the manifest was written
    pub manifest_path: PathBuf,
    /// Download counters; `None` for manifest-only runs
    pub summary: Option<RunSummary>,
    /// `(full name, reason)` of every failed download
    pub failures: Vec<(String, String)>,
}

impl FetchReport {
    /// The line announcing the work found, e.g. "Done! found 3 (12.00 KiB) Gems to download from 2020-12-31."
    pub fn found_line(&self) -> String {
        found_line(self.count, self.total_size, self.cutoff)
    }
}

fn found_line(count: i64, total_size: i64, cutoff: NaiveDate) -> String {
    format!(
        "Done! found {} ({}) Gems to download from {}.",
        count,
        HumanBytes(total_size.max(0) as u64),
        format_cutoff(cutoff)
    )
}

/// Enumerates versions, saves the manifest and downloads missing artifacts
pub struct FetchPipeline {
    config: Config,
    source: Arc<dyn MetadataSource>,
    fetcher: Arc<dyn ArtifactFetcher>,
    cancel: CancellationToken,
    show_progress: bool,
}

impl FetchPipeline {
    /// Creates a pipeline over `source` that downloads with `fetcher`
    pub fn new(
        config: Config,
        source: Arc<dyn MetadataSource>,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        Self {
            config,
            source,
            fetcher,
            cancel: CancellationToken::new(),
            show_progress: false,
        }
    }

    /// Stops starting new downloads once `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Draws a progress bar and prints the "found" line
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Effective configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the pipeline
    ///
    /// Only a failure to write the manifest or create the download directory
    /// is an error; per-gem failures are counted in the report.
    pub async fn run(&self, options: &FetchOptions) -> Result<FetchReport> {
        let query = query_work(self.source.as_ref(), options.cutoff).await;
        let found = found_line(query.count, query.total_size, query.cutoff);
        info!("{}", found);
        if self.show_progress {
            print_info(&found);
        }

        let manifest_path = self.config.manifest_path();
        save_manifest(&manifest_path, &query.items).await?;

        let mut report = FetchReport {
            cutoff: query.cutoff,
            count: query.count,
            total_size: query.total_size,
            manifest_path,
            summary: None,
            failures: Vec::new(),
        };
        if options.manifest_only {
            return Ok(report);
        }

        let gems_dir = self.config.gems_dir();
        tokio::fs::create_dir_all(&gems_dir).await?;

        let total = query.items.len() as u64;
        let aggregator = if self.show_progress {
            Aggregator::new(total, ProgressLabels::DOWNLOAD)
        } else {
            Aggregator::hidden(total, ProgressLabels::DOWNLOAD)
        };
        let runner =
            TaskRunner::new(self.config.fetch.concurrency).with_cancellation(self.cancel.clone());
        debug!("Downloading with {} concurrent fetches", runner.limit());

        let names: Vec<String> = query.items.iter().map(|item| item.full_name.clone()).collect();
        let run = runner
            .run(query.items, aggregator, |item| self.fetch_one(item, &gems_dir))
            .await;

        report.failures = names
            .into_iter()
            .zip(run.outcomes)
            .filter_map(|(name, outcome)| match outcome {
                Outcome::Failed(reason) => Some((name, reason)),
                _ => None,
            })
            .collect();
        report.summary = Some(run.summary);
        Ok(report)
    }

    async fn fetch_one(&self, item: WorkItem, dir: &Path) -> Outcome {
        if item.is_yanked() {
            debug!("Skipping yanked {}", item.full_name);
            return Outcome::Skipped;
        }

        let target = dir.join(item.file_name());
        if artifact_is_current(&target, item.checksum.as_deref()).await {
            debug!("{} is already downloaded", item.full_name);
            return Outcome::Skipped;
        }

        let retry = &self.config.retry;
        let fetched = with_retry(
            || self.fetcher.fetch(&item, dir),
            retry.attempts,
            retry.delay(),
        )
        .await;

        match fetched {
            Ok(()) => {
                verify_download(&target, &item).await;
                Outcome::Succeeded(())
            }
            Err(e) => {
                error!("Failed to download {}: {}", item.full_name, e);
                Outcome::Failed(e.to_string())
            }
        }
    }
}

/// Warns when the tool reported success but left a file that does not match
async fn verify_download(target: &Path, item: &WorkItem) {
    if item.checksum.is_none() {
        return;
    }
    if !artifact_is_current(target, item.checksum.as_deref()).await {
        warn!(
            "{} is missing or does not match its recorded checksum; it will be fetched again next run",
            target.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::testing::{checksum_of, work_item, RecordingFetcher, StaticMetadata};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn pipeline(dir: &Path, items: Vec<WorkItem>, fetcher: Arc<RecordingFetcher>) -> FetchPipeline {
        retrying_pipeline(dir, items, fetcher, 1)
    }

    fn retrying_pipeline(
        dir: &Path,
        items: Vec<WorkItem>,
        fetcher: Arc<RecordingFetcher>,
        attempts: u32,
    ) -> FetchPipeline {
        let mut config = Config::new(dir.to_path_buf());
        config.fetch.concurrency = 4;
        config.retry = RetryConfig {
            attempts,
            delay_ms: 1,
        };
        FetchPipeline::new(config, Arc::new(StaticMetadata::new(items)), fetcher)
    }

    #[test]
    fn test_found_line() {
        let cutoff = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();
        assert_eq!(
            found_line(3, 2048, cutoff),
            "Done! found 3 (2.00 KiB) Gems to download from 2020-12-31."
        );
    }

    #[tokio::test]
    async fn test_manifest_only_downloads_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let fetcher = Arc::new(RecordingFetcher::new());
        let items = vec![work_item("rake", "13.0.6", "2021-07-09", true)];

        let report = pipeline(temp_dir.path(), items, fetcher.clone())
            .run(&FetchOptions {
                cutoff: None,
                manifest_only: true,
            })
            .await?;

        assert_eq!(report.count, 1);
        assert!(report.summary.is_none());
        assert!(report.manifest_path.is_file());
        assert!(!temp_dir.path().join("gems").exists());
        assert_eq!(fetcher.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_failures_are_reported_by_name() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let fetcher = Arc::new(RecordingFetcher::new().failing_on("ghost"));
        let items = vec![
            work_item("rake", "13.0.6", "2021-07-09", true),
            work_item("ghost", "0.1.0", "2021-08-01", true),
        ];

        let report = pipeline(temp_dir.path(), items, fetcher.clone())
            .run(&FetchOptions::default())
            .await?;

        let summary = report.summary.unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "ghost-0.1.0");
        assert!(report.failures[0].1.contains("Could not find a valid gem"));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_run_starts_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let fetcher = Arc::new(RecordingFetcher::new());
        let items = vec![
            work_item("a", "1.0.0", "2021-01-01", true),
            work_item("b", "1.0.0", "2021-01-02", true),
        ];

        let token = CancellationToken::new();
        token.cancel();
        let report = pipeline(temp_dir.path(), items, fetcher.clone())
            .with_cancellation(token)
            .run(&FetchOptions::default())
            .await?;

        assert_eq!(report.summary.unwrap().cancelled, 2);
        assert_eq!(fetcher.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_gem_is_not_retried() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let fetcher = Arc::new(RecordingFetcher::new().failing_on("ghost"));
        let items = vec![work_item("ghost", "0.1.0", "2021-08-01", true)];

        let report = retrying_pipeline(temp_dir.path(), items, fetcher.clone(), 3)
            .run(&FetchOptions::default())
            .await?;

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(report.summary.unwrap().failed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_transient_tool_error_is_retried() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let fetcher = Arc::new(RecordingFetcher::new().flaky(2));
        let items = vec![work_item("rake", "13.0.6", "2021-07-09", true)];

        let report = retrying_pipeline(temp_dir.path(), items, fetcher.clone(), 3)
            .run(&FetchOptions::default())
            .await?;

        assert_eq!(fetcher.calls(), 3);
        assert_eq!(report.summary.unwrap().succeeded, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_mismatched_download_still_succeeds_and_refetches() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let fetcher = Arc::new(RecordingFetcher::new().writing(b"truncated"));
        let mut item = work_item("rake", "13.0.6", "2021-07-09", true);
        item.checksum = Some(checksum_of(b"the real gem"));

        let first = pipeline(temp_dir.path(), vec![item.clone()], fetcher.clone())
            .run(&FetchOptions::default())
            .await?;
        assert_eq!(first.summary.unwrap().succeeded, 1);
        assert!(first.failures.is_empty());

        let second = pipeline(temp_dir.path(), vec![item], fetcher.clone())
            .run(&FetchOptions::default())
            .await?;
        assert_eq!(second.summary.unwrap().succeeded, 1);
        assert_eq!(fetcher.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_download_that_left_no_file_still_succeeds() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let fetcher = Arc::new(RecordingFetcher::new());
        let mut item = work_item("rake", "13.0.6", "2021-07-09", true);
        item.checksum = Some(checksum_of(b"the real gem"));

        let report = pipeline(temp_dir.path(), vec![item], fetcher.clone())
            .run(&FetchOptions::default())
            .await?;

        assert_eq!(report.summary.unwrap().succeeded, 1);
        assert!(!temp_dir.path().join("gems/rake-13.0.6.gem").exists());
        Ok(())
    }
}

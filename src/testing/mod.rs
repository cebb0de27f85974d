//! In-memory collaborators for exercising the pipelines without a database,
//! a network, or the `gem` executable.

use crate::error::{HarvestError, Result};
use crate::fetch::tool::ArtifactFetcher;
use crate::metadata::MetadataSource;
use crate::models::WorkItem;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{NaiveDate, NaiveTime};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Builds a work item created at midnight of `date` (`YYYY-MM-DD`)
pub fn work_item(name: &str, version: &str, date: &str, indexed: bool) -> WorkItem {
    let created_at = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap_or(NaiveDate::MIN)
        .and_time(NaiveTime::MIN);
    WorkItem {
        name: name.to_string(),
        version: version.to_string(),
        created_at,
        updated_at: created_at,
        full_name: format!("{name}-{version}"),
        checksum: None,
        size: 1024,
        indexed,
    }
}

/// Base64 SHA-256 of `bytes`, the checksum format of the metadata database
pub fn checksum_of(bytes: &[u8]) -> String {
    STANDARD.encode(Sha256::digest(bytes))
}

/// Metadata source answering from a fixed list of versions
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    items: Vec<WorkItem>,
}

impl StaticMetadata {
    /// Answers queries from `items`
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self { items }
    }

    fn matching(&self, cutoff: NaiveDate) -> Vec<WorkItem> {
        let cutoff = cutoff.and_time(NaiveTime::MIN);
        let mut items: Vec<WorkItem> = self
            .items
            .iter()
            .filter(|item| item.indexed && item.created_at > cutoff)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at);
        items
    }
}

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn count(&self, cutoff: NaiveDate) -> Result<i64> {
        Ok(self.matching(cutoff).len() as i64)
    }

    async fn total_size(&self, cutoff: NaiveDate) -> Result<i64> {
        Ok(self.matching(cutoff).iter().map(|item| item.size).sum())
    }

    async fn rows(&self, cutoff: NaiveDate) -> Result<Vec<WorkItem>> {
        Ok(self.matching(cutoff))
    }
}

/// Artifact fetcher that records its calls and writes fixed content
///
/// Tracks how many fetches are in flight at once so tests can check the
/// concurrency bound.
#[derive(Debug, Default)]
pub struct RecordingFetcher {
    delay: Duration,
    content: Option<Vec<u8>>,
    failing: HashSet<String>,
    flaky: usize,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    fetched: Mutex<Vec<String>>,
}

impl RecordingFetcher {
    /// Succeeds instantly without writing anything
    pub fn new() -> Self {
        Self::default()
    }

    /// Each fetch takes `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Successful fetches write `content` to the artifact path
    pub fn writing(mut self, content: &[u8]) -> Self {
        self.content = Some(content.to_vec());
        self
    }

    /// Fetches of gem `name` fail the way the tool reports a missing gem
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// The first `times` fetches fail with a transient tool error
    pub fn flaky(mut self, times: usize) -> Self {
        self.flaky = times;
        self
    }

    /// Number of fetch invocations
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed in flight at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Full names of successful fetches, in completion order
    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn perform(&self, call: usize, item: &WorkItem, dir: &Path) -> Result<()> {
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }

        if call < self.flaky {
            return Err(HarvestError::Tool(
                "ERROR:  While executing gem ... (Gem::RemoteFetcher::FetchError)".into(),
            ));
        }
        if self.failing.contains(&item.name) {
            return Err(HarvestError::GemNotFound(format!(
                "ERROR:  Could not find a valid gem '{}' ({}) in any repository",
                item.name, item.version
            )));
        }
        if let Some(content) = &self.content {
            tokio::fs::write(dir.join(item.file_name()), content).await?;
        }
        self.fetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item.full_name.clone());
        Ok(())
    }
}

#[async_trait]
impl ArtifactFetcher for RecordingFetcher {
    async fn fetch(&self, item: &WorkItem, dir: &Path) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = self.perform(call, item, dir).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

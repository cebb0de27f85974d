//! Catalog crawl that fills the document store.
//!
//! Gems are crawled concurrently up to the configured limit. Within one gem
//! the versions are visited strictly in page order, one request at a time.

use crate::catalog::{CatalogClient, GemNameSource};
use crate::check::already_stored;
use crate::config::RetryConfig;
use crate::error::Result;
use crate::models::{Outcome, RunSummary, VersionRecord};
use crate::parallel::TaskRunner;
use crate::store::{DocumentStore, InsertOutcome};
use crate::ui::progress::{Aggregator, ProgressLabels};
use crate::utils::retry::with_retry;
use serde::Serialize;
use std::ops::AddAssign;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-gem counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GemTally {
    /// Rows on the versions page
    pub versions_seen: u64,
    /// Rows marked yanked
    pub yanked: u64,
    /// Rows whose key was already in the store
    pub already_stored: u64,
    /// Documents written
    pub inserted: u64,
    /// Detail pages that could not be fetched
    pub detail_failures: u64,
    /// Store writes that failed
    pub insert_errors: u64,
}

impl AddAssign for GemTally {
    fn add_assign(&mut self, other: Self) {
        self.versions_seen += other.versions_seen;
        self.yanked += other.yanked;
        self.already_stored += other.already_stored;
        self.inserted += other.inserted;
        self.detail_failures += other.detail_failures;
        self.insert_errors += other.insert_errors;
    }
}

/// Result of a crawl
#[derive(Debug)]
pub struct IndexReport {
    /// One entry per gem name, in crawl order
    pub gems: Vec<(String, Outcome<GemTally>)>,
    /// Version counters summed over all gems
    pub totals: GemTally,
    /// Gem-level counters
    pub summary: RunSummary,
}

/// Crawls gem names into a [`DocumentStore`]
pub struct IndexPipeline {
    catalog: CatalogClient,
    store: Arc<dyn DocumentStore>,
    concurrency: usize,
    retry: RetryConfig,
    cancel: CancellationToken,
    show_progress: bool,
}

impl IndexPipeline {
    /// Crawls with up to `concurrency` gems in flight
    pub fn new(catalog: CatalogClient, store: Arc<dyn DocumentStore>, concurrency: usize) -> Self {
        Self {
            catalog,
            store,
            concurrency,
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
            show_progress: false,
        }
    }

    /// Retry policy for detail fetches
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Stops starting new gems once `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Draws a progress bar
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Lists names from `source` and crawls them
    ///
    /// Failing to list names is the only error; everything after that is
    /// counted per gem.
    pub async fn run(&self, source: &dyn GemNameSource) -> Result<IndexReport> {
        let names = source.list_names().await?;
        info!("Crawling {} gems", names.len());
        Ok(self.run_names(names).await)
    }

    /// Crawls the given gem names
    pub async fn run_names(&self, names: Vec<String>) -> IndexReport {
        let total = names.len() as u64;
        let aggregator = if self.show_progress {
            Aggregator::new(total, ProgressLabels::INDEX)
        } else {
            Aggregator::hidden(total, ProgressLabels::INDEX)
        };
        let runner = TaskRunner::new(self.concurrency).with_cancellation(self.cancel.clone());

        let run = runner
            .run(names.clone(), aggregator, |name| async move {
                self.index_gem(&name).await
            })
            .await;

        if let Err(e) = self.store.flush().await {
            error!("Failed to flush the index store: {}", e);
        }

        let mut totals = GemTally::default();
        for outcome in &run.outcomes {
            if let Outcome::Succeeded(tally) = outcome {
                totals += *tally;
            }
        }

        IndexReport {
            gems: names.into_iter().zip(run.outcomes).collect(),
            totals,
            summary: run.summary,
        }
    }

    /// Crawls every version of one gem
    ///
    /// A versions page that cannot be fetched fails the gem. Detail and
    /// insert failures are only counted.
    pub async fn index_gem(&self, name: &str) -> Outcome<GemTally> {
        let records = match self.catalog.fetch_versions(name).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to list versions of {}: {}", name, e);
                return Outcome::Failed(e.to_string());
            }
        };

        let mut tally = GemTally::default();
        for record in records {
            tally.versions_seen += 1;
            self.index_version(&record, &mut tally).await;
        }
        debug!("{}: {:?}", name, tally);
        Outcome::Succeeded(tally)
    }

    async fn index_version(&self, record: &VersionRecord, tally: &mut GemTally) {
        let key = record.identity_key();
        if record.yanked {
            debug!("Skipping yanked {}", key);
            tally.yanked += 1;
            return;
        }
        if already_stored(self.store.as_ref(), &key).await {
            tally.already_stored += 1;
            return;
        }

        let detail = with_retry(
            || self.catalog.fetch_details(record),
            self.retry.attempts,
            self.retry.delay(),
        )
        .await;
        let detail = match detail {
            Ok(detail) => detail,
            Err(e) => {
                error!("Failed to fetch details of {}: {}", key, e);
                tally.detail_failures += 1;
                return;
            }
        };

        match self.store.insert(&detail).await {
            Ok(InsertOutcome::Inserted) => {
                debug!("Stored {}", key);
                tally.inserted += 1;
            }
            Ok(InsertOutcome::AlreadyPresent) => tally.already_stored += 1,
            Err(e) => {
                error!("Failed to store {}: {}", key, e);
                tally.insert_errors += 1;
            }
        }
    }
}

use crate::models::{Outcome, RunSummary};
use crate::ui::progress::Aggregator;
use futures::stream::{self, StreamExt};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Drives items through a handler with at most `limit` handlers in flight
///
/// All handlers are polled from the task that awaits [`TaskRunner::run`], so
/// the aggregator is updated without locks. The limit is fixed for the
/// lifetime of the runner.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    limit: usize,
    cancel: CancellationToken,
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunReport<T> {
    /// One outcome per item, in enumeration order
    pub outcomes: Vec<Outcome<T>>,
    /// Final counters
    pub summary: RunSummary,
}

impl TaskRunner {
    /// Creates a runner with the specified concurrency limit (minimum 1)
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Stops admitting new items once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The concurrency limit
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Runs `handler` over every item and resolves once all of them finished
    ///
    /// A handler's failure is just another [`Outcome`]; it never stops its
    /// siblings. Items not yet started when the run is cancelled are recorded
    /// as [`Outcome::Cancelled`] without invoking the handler. With no items
    /// the future resolves immediately.
    pub async fn run<I, T, F, Fut>(
        &self,
        items: Vec<I>,
        mut aggregator: Aggregator,
        handler: F,
    ) -> RunReport<T>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        let total = items.len();
        let mut outcomes: Vec<Option<Outcome<T>>> = Vec::with_capacity(total);
        outcomes.resize_with(total, || None);

        let handler = &handler;
        let cancel = &self.cancel;
        let mut pending = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move {
                if cancel.is_cancelled() {
                    return (index, Outcome::Cancelled);
                }
                (index, handler(item).await)
            })
            .buffer_unordered(self.limit);

        while let Some((index, outcome)) = pending.next().await {
            aggregator.record(&outcome);
            outcomes[index] = Some(outcome);
        }

        let summary = aggregator.finish();
        debug!(
            "Run finished: {} items, {} succeeded, {} failed, {} skipped",
            summary.total, summary.succeeded, summary.failed, summary.skipped
        );

        RunReport {
            outcomes: outcomes
                .into_iter()
                .map(|outcome| outcome.unwrap_or(Outcome::Cancelled))
                .collect(),
            summary,
        }
    }
}

use crate::models::{Outcome, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};

/// Wording of a progress line, e.g. "Attempted to download 3 of 10 gems"
#[derive(Debug, Clone, Copy)]
pub struct ProgressLabels {
    /// Leading verb phrase
    pub verb: &'static str,
    /// Plural noun for the items
    pub noun: &'static str,
    /// Noun used in the failure suffix, e.g. "download" in "3 download errors"
    pub failure: &'static str,
}

impl ProgressLabels {
    /// Labels for the artifact fetch pipeline
    pub const DOWNLOAD: Self = Self {
        verb: "Attempted to download",
        noun: "gems",
        failure: "download",
    };

    /// Labels for the catalog crawl
    pub const INDEX: Self = Self {
        verb: "Crawled",
        noun: "gems",
        failure: "crawl",
    };
}

/// Run-scoped outcome counters with a live progress bar
///
/// Updated once per item, in completion order, from the runner's polling
/// loop. Counters only ever grow.
pub struct Aggregator {
    bar: ProgressBar,
    summary: RunSummary,
    labels: ProgressLabels,
}

impl Aggregator {
    /// Creates an aggregator drawing to stderr (hidden when stderr is not a terminal)
    pub fn new(total: u64, labels: ProgressLabels) -> Self {
        Self::with_bar(ProgressBar::new(total), total, labels)
    }

    /// Creates an aggregator that never draws
    pub fn hidden(total: u64, labels: ProgressLabels) -> Self {
        Self::with_bar(ProgressBar::hidden(), total, labels)
    }

    fn with_bar(bar: ProgressBar, total: u64, labels: ProgressLabels) -> Self {
        bar.set_length(total);
        setup_bar_style(&bar, &labels);
        bar.tick();
        Self {
            bar,
            summary: RunSummary {
                total,
                ..RunSummary::default()
            },
            labels,
        }
    }

    /// Counts one finished item and advances the bar
    pub fn record<T>(&mut self, outcome: &Outcome<T>) {
        match outcome {
            Outcome::Skipped => self.summary.skipped += 1,
            Outcome::Succeeded(_) => {
                self.summary.attempted += 1;
                self.summary.succeeded += 1;
            }
            Outcome::Failed(_) => {
                self.summary.attempted += 1;
                self.summary.failed += 1;
                self.bar.set_message(failure_suffix(self.summary.failed, self.labels.failure));
            }
            Outcome::Cancelled => self.summary.cancelled += 1,
        }
        self.bar.inc(1);
    }

    /// Stops drawing and returns the final counters
    pub fn finish(self) -> RunSummary {
        self.bar.finish();
        self.summary
    }
}

fn setup_bar_style(bar: &ProgressBar, labels: &ProgressLabels) {
    let template = format!(
        "{} {{pos}} of {{len}} {} [{{bar:20}}] {{percent}}%{{msg}}",
        labels.verb, labels.noun
    );
    let style = ProgressStyle::default_bar()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    bar.set_style(style);
}

fn failure_suffix(failed: u64, noun: &str) -> String {
    format!(" (with {failed} {noun} errors)")
}

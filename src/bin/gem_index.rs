use anyhow::Context;
use clap::Parser;
use colored::*;
use gem_harvester::{
    logging,
    ui::{self, print_warning},
    utils::normalize_user_input_path,
    CatalogClient, Config, GemNameSource, GemSearch, IndexPipeline, IndexReport, NameList,
    Outcome, SledStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Crawl the RubyGems catalog into a local index
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Index store directory
    #[arg(long)]
    store: Option<String>,

    /// Catalog base URL
    #[arg(long)]
    catalog_url: Option<String>,

    /// Number of gems crawled concurrently
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Crawl the names in this file instead of every remote gem
    #[arg(long)]
    names_file: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(store) = &cli.store {
        config.index.store_path = normalize_user_input_path(store);
    }
    if let Some(url) = cli.catalog_url {
        config.index.catalog_url = url;
    }
    if let Some(jobs) = cli.jobs {
        config.index.concurrency = jobs.max(1);
    }

    ui::show_greeting("RubyGems indexer");

    let store = SledStore::open(&config.index.store_path).with_context(|| {
        format!("opening index store {}", config.index.store_path.display())
    })?;
    let store = Arc::new(store);
    let catalog = CatalogClient::new(&config.index.catalog_url, &config.http)?;

    let names: Box<dyn GemNameSource> = match &cli.names_file {
        Some(path) => Box::new(NameList::from_file(&normalize_user_input_path(path))),
        None => Box::new(GemSearch::new(config.index.tool.clone())),
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            print_warning("Interrupted, finishing gems already in progress...");
            interrupt.cancel();
        }
    });

    let report = IndexPipeline::new(catalog, store.clone(), config.index.concurrency)
        .with_retry(config.retry.clone())
        .with_cancellation(cancel)
        .with_progress(true)
        .run(names.as_ref())
        .await?;

    print_report(&report, store.len());
    Ok(())
}

fn print_report(report: &IndexReport, stored: usize) {
    let totals = &report.totals;
    println!(
        "{} {} gems crawled, {} versions seen",
        "Finished:".bright_green().bold(),
        report.summary.succeeded,
        totals.versions_seen
    );
    println!(
        "  {} inserted, {} already stored, {} yanked",
        totals.inserted, totals.already_stored, totals.yanked
    );
    if totals.detail_failures > 0 || totals.insert_errors > 0 {
        print_warning(&format!(
            "  {} detail pages failed, {} inserts failed",
            totals.detail_failures, totals.insert_errors
        ));
    }

    let failed: Vec<&str> = report
        .gems
        .iter()
        .filter(|(_, outcome)| matches!(outcome, Outcome::Failed(_)))
        .map(|(name, _)| name.as_str())
        .collect();
    if !failed.is_empty() {
        print_warning(&format!("  could not list versions of: {}", failed.join(", ")));
    }
    println!("Index now holds {} versions", stored.to_string().bright_white().bold());
}

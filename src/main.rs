use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use colored::*;
use gem_harvester::{
    logging,
    ui::{self, print_error, print_info, print_warning},
    utils::normalize_user_input_path,
    Config, FetchOptions, FetchPipeline, FetchReport, GemCommand, PgMetadataSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Download every RubyGems artifact published after a date
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Only gems published after this date (DD/MM/YYYY)
    #[arg(short = 'd', long = "date", value_parser = parse_cutoff)]
    date: Option<NaiveDate>,

    /// Output directory (defaults to `fetch.output_dir`, then `downloads`)
    #[arg(short, long)]
    output: Option<String>,

    /// Write the manifest without downloading anything
    #[arg(short = 'n', long = "no-download")]
    no_download: bool,

    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent downloads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Postgres URL of the RubyGems database
    #[arg(long)]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn parse_cutoff(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%d/%m/%Y")
        .map_err(|e| format!("expected DD/MM/YYYY, got '{value}': {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(output) = &cli.output {
        config.fetch.output_dir = normalize_user_input_path(output);
    }
    if let Some(jobs) = cli.jobs {
        config.fetch.concurrency = jobs.max(1);
    }
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    ui::show_greeting("RubyGems downloader");

    let source = Arc::new(PgMetadataSource::connect_lazy(&config.database)?);
    let fetcher = Arc::new(GemCommand::from_config(&config.fetch));

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let options = FetchOptions {
        cutoff: cli.date,
        manifest_only: cli.no_download,
    };
    let report = FetchPipeline::new(config, source, fetcher)
        .with_cancellation(cancel)
        .with_progress(true)
        .run(&options)
        .await?;

    print_report(&report);
    Ok(())
}

/// Cancels `token` on the first Ctrl-C; downloads already running finish
fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for running downloads");
            print_warning("Interrupted, waiting for running downloads to finish...");
            token.cancel();
        }
    });
}

fn print_report(report: &FetchReport) {
    println!(
        "Manifest saved to {}",
        report.manifest_path.display().to_string().bright_white().bold()
    );

    let Some(summary) = report.summary else {
        print_info("Manifest only, nothing downloaded.");
        return;
    };
    info!("Fetch finished: {:?}", summary);

    println!(
        "{} {} downloaded, {} already present, {} failed",
        "Finished:".bright_green().bold(),
        summary.succeeded,
        summary.skipped,
        summary.failed
    );
    if summary.cancelled > 0 {
        print_warning(&format!("{} gems not started before interrupt", summary.cancelled));
    }
    for (name, reason) in &report.failures {
        print_error(&format!("  {name}: {reason}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cutoff() {
        assert_eq!(parse_cutoff("31/12/2020"), Ok(NaiveDate::from_ymd_opt(2020, 12, 31).unwrap()));
        assert!(parse_cutoff("2020-12-31").is_err());
        assert!(parse_cutoff("31-12-2020").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["gem-fetch"]);
        assert!(cli.output.is_none());
        assert!(cli.date.is_none());
        assert!(!cli.no_download);
    }
}
